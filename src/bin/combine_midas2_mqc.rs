use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use mag_mqc::combine_midas2_reports;
use mag_mqc::progress::spinner;

/// Merge MIDAS2 species reports into one MultiQC table.
#[derive(Parser, Debug)]
#[command(name = "combine-midas2-mqc", version, about)]
struct Args {
    /// MIDAS2 species report(s), plain or gzipped
    #[arg(short, long, value_name = "FILE", num_args = 1.., required = true)]
    input: Vec<PathBuf>,

    /// Output YAML
    #[arg(short, long, value_name = "FILE")]
    yaml: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let progress = spinner("blue", format!("Merging {} MIDAS2 report(s)...", args.input.len()));
    match combine_midas2_reports(&args.input, &args.yaml) {
        Ok(doc) => progress.finish_with_message(format!(
            "{} records written to {}",
            doc.data.len(),
            args.yaml.display()
        )),
        Err(e) => {
            progress.abandon();
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
