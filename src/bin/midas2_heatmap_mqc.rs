use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use mag_mqc::midas2_heatmap;
use mag_mqc::progress::spinner;

/// Heatmap of MIDAS2 lineage coverage across a declared set of samples.
#[derive(Parser, Debug)]
#[command(name = "midas2-heatmap-mqc", version, about)]
struct Args {
    /// Merged MIDAS2 YAML table
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Every sample of the run, comma-separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    samples: Vec<String>,

    /// Fraction of samples a lineage must exceed to be plotted
    #[arg(short, long, default_value_t = 0.25)]
    threshold: f64,

    #[arg(long = "matrix_out", value_name = "FILE", default_value = "midas2_heatmap_mqc.txt")]
    matrix_out: PathBuf,

    /// Heatmap image (.png, or .svg for a labelled vector image)
    #[arg(long = "plot_out", value_name = "FILE", default_value = "midas2_heatmap.png")]
    plot_out: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let samples: Vec<String> = args
        .samples
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let progress = spinner("green", "Building the lineage heatmap...");
    match midas2_heatmap(&args.input, &samples, args.threshold, &args.matrix_out, &args.plot_out) {
        Ok(matrix) => progress.finish_with_message(format!(
            "{} lineages x {} samples plotted.",
            matrix.n_rows(),
            matrix.n_cols()
        )),
        Err(e) => {
            progress.abandon();
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
