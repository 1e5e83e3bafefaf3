use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use mag_mqc::progress::spinner;
use mag_mqc::{depth_data_path, plot_mag_depths};

/// Clustered heatmap of log10 bin depths, columns coloured by sample group.
#[derive(Parser, Debug)]
#[command(name = "plot-mag-depths", version, about)]
struct Args {
    /// Bin depth matrix (bin ids in the first column)
    #[arg(short = 'd', long = "bin_depths", value_name = "FILE")]
    bin_depths: PathBuf,

    /// Header-less sample<TAB>group table
    #[arg(short, long, value_name = "FILE")]
    groups: PathBuf,

    /// Heatmap image (.png, or .svg for a labelled vector image)
    #[arg(short, long, value_name = "FILE")]
    out: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let progress = spinner("cyan", "Plotting bin depths...");
    match plot_mag_depths(&args.bin_depths, &args.groups, &args.out) {
        Ok(_) => progress.finish_with_message(format!(
            "Wrote {} and {}",
            args.out.display(),
            depth_data_path(&args.out).display()
        )),
        Err(e) => {
            progress.abandon();
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
