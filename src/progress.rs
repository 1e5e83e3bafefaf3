//src/progress.rs

use indicatif::{ProgressBar, ProgressStyle};

const TICKS: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Braille spinner with a coloured glyph (`blue`, `green`, `yellow`, ...).
pub fn spinner(color: &str, message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template(&format!("{{spinner:.{}}} {{msg}}", color))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&TICKS);
    spinner.set_style(style);
    spinner.set_message(message.into());
    spinner
}
