use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use mag_mqc::bins::AnalysisThresholds;
use mag_mqc::errors::{Error, Result};
use mag_mqc::narrative::{AnsiPalette, ReportStyle};
use mag_mqc::progress::spinner;
use mag_mqc::quality::QualityThresholds;
use mag_mqc::{generate_mag_report, ReportInputs};

/// Summarise widely distributed MAGs as a text and an HTML narrative.
#[derive(Parser, Debug)]
#[command(name = "mag-epi-report", version, about)]
struct Args {
    /// Bin depth summary (bin + one column per sample)
    #[arg(long = "depth_data", value_name = "FILE")]
    depth_data: PathBuf,

    /// CheckM quality table
    #[arg(long = "checkm_data", value_name = "FILE")]
    checkm_data: PathBuf,

    /// GTDB-Tk summary table
    #[arg(long = "gtdb_data", value_name = "FILE")]
    gtdb_data: PathBuf,

    /// MIDAS2 species abundance table
    #[arg(long = "midas_data", value_name = "FILE")]
    midas_data: PathBuf,

    /// Text report
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    /// HTML report
    #[arg(long = "html_output", value_name = "FILE", default_value = "mag_analysis_report.html")]
    html_output: PathBuf,

    /// A bin must be detected in more than this many samples
    #[arg(long = "min_samples", default_value_t = 2)]
    min_samples: usize,

    #[arg(long = "bin_min_completeness", default_value_t = 50.0)]
    bin_min_completeness: f64,

    #[arg(long = "bin_max_contamination", default_value_t = 10.0)]
    bin_max_contamination: f64,

    /// Fraction of MIDAS2 samples a lineage must exceed to be common
    #[arg(long = "midas_threshold", default_value_t = 0.25)]
    midas_threshold: f64,

    /// Good quality: minimum completeness (%)
    #[arg(long = "min_completeness", default_value_t = 80.0)]
    min_completeness: f64,

    /// Good quality: maximum contamination (%)
    #[arg(long = "max_contamination", default_value_t = 10.0)]
    max_contamination: f64,

    /// Good quality: minimum ANI (%)
    #[arg(long = "min_ani", default_value_t = 97.0)]
    min_ani: f64,

    /// Good quality: minimum aligned fraction
    #[arg(long = "min_af", default_value_t = 0.8)]
    min_af: f64,

    /// Write the text report without ANSI colours
    #[arg(long = "no-color")]
    no_color: bool,

    /// Stylesheet replacing the default one in the HTML report
    #[arg(long, value_name = "FILE")]
    css: Option<PathBuf>,
}

fn report_style(args: &Args) -> Result<ReportStyle> {
    let mut style = ReportStyle {
        ansi: AnsiPalette { enabled: !args.no_color, ..Default::default() },
        ..Default::default()
    };
    if let Some(path) = &args.css {
        style.css = std::fs::read_to_string(path).map_err(|e| Error::file_io(path, e))?;
    }
    Ok(style)
}

fn run(args: &Args) -> Result<()> {
    let analysis = AnalysisThresholds {
        min_samples: args.min_samples,
        min_completeness: args.bin_min_completeness,
        max_contamination: args.bin_max_contamination,
        midas_threshold: args.midas_threshold,
    };
    let quality = QualityThresholds {
        min_completeness: args.min_completeness,
        max_contamination: args.max_contamination,
        min_ani: args.min_ani,
        min_af: args.min_af,
    };
    let style = report_style(args)?;

    let inputs = ReportInputs {
        depth_data: args.depth_data.clone(),
        checkm_data: args.checkm_data.clone(),
        gtdb_data: args.gtdb_data.clone(),
        midas_data: args.midas_data.clone(),
    };

    let progress = spinner("green", "Analysing MAGs...");
    let report = match generate_mag_report(&inputs, &analysis, &quality, &style) {
        Ok(report) => report,
        Err(e) => {
            progress.abandon();
            return Err(e);
        }
    };
    progress.finish_with_message(format!("{} bins summarised.", report.analysis.bins.len()));

    let progress = spinner("yellow", "Writing reports...");
    report.write(&args.output, &args.html_output)?;
    progress.finish_with_message("Reports written.");
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
