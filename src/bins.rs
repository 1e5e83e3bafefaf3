//src/bins.rs

use std::path::Path;

use ahash::AHashMap;

use crate::errors::Result;
use crate::matrix::LabeledMatrix;
use crate::midas::{common_lineages, distinct_samples, lineage_stats, species_support, AbundanceRow, MidasSupport};
use crate::taxonomy::parse_lineage;
use crate::tsv::read_tsv;
use crate::types::{round_to, BinSummary};

pub const BIN_COLUMN: &str = "bin";
/// CheckM tables name the bin column differently depending on the workflow
pub const CHECKM_ID_COLUMNS: [&str; 3] = ["Bin Id", "Sample", "bin"];
pub const GTDB_ID_COLUMN: &str = "user_genome";

/// Analysis-level thresholds deciding which bins get summarised.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisThresholds {
    /// A bin must be detected in strictly more samples than this
    pub min_samples: usize,
    pub min_completeness: f64,
    pub max_contamination: f64,
    /// Fraction of MIDAS2 samples a lineage must exceed to count as common
    pub midas_threshold: f64,
}

impl Default for AnalysisThresholds {
    fn default() -> Self {
        Self {
            min_samples: 2,
            min_completeness: 50.0,
            max_contamination: 10.0,
            midas_threshold: 0.25,
        }
    }
}

/// CheckM quality metrics of one bin.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckmStats {
    pub completeness: f64,
    pub contamination: f64,
    pub strain_heterogeneity: f64,
    /// Genome size in bp
    pub genome_size: f64,
    pub gc: f64,
}

/// Best-reference FastANI placement reported by GTDB-Tk.
#[derive(Debug, Clone, PartialEq)]
pub struct GtdbHit {
    pub taxonomy: String,
    pub ani: Option<f64>,
    pub af: Option<f64>,
}

pub fn strip_fa_suffix(bin: &str) -> &str {
    bin.strip_suffix(".fa").unwrap_or(bin)
}

/// Reads the bin depth summary: a `bin` column and one depth column per sample.
pub fn read_depths<P: AsRef<Path>>(path: P) -> Result<LabeledMatrix> {
    let table = read_tsv(path)?;
    let bin_col = table.column(BIN_COLUMN)?;
    let mut depths = LabeledMatrix::from_table(&table, bin_col)?;
    for bin in depths.rows.iter_mut() {
        *bin = strip_fa_suffix(bin).to_string();
    }
    Ok(depths)
}

/// Rows with a non-numeric metric (`NA`, empty) are skipped with a warning.
pub fn read_checkm<P: AsRef<Path>>(path: P) -> Result<AHashMap<String, CheckmStats>> {
    let table = read_tsv(path)?;
    let id_col = table.column_any(&CHECKM_ID_COLUMNS)?;
    let metric_cols = [
        table.column("Completeness")?,
        table.column("Contamination")?,
        table.column("Strain heterogeneity")?,
        table.column("Genome size (bp)")?,
        table.column("GC")?,
    ];

    let mut stats = AHashMap::with_capacity(table.len());
    for i in 0..table.len() {
        let bin = strip_fa_suffix(&table.rows[i][id_col]).to_string();
        let metrics = metric_cols.map(|col| table.lookup_f64(i, col));
        let [Some(completeness), Some(contamination), Some(strain_heterogeneity), Some(genome_size), Some(gc)] = metrics
        else {
            log::warn!("{}: skipping {} with a non-numeric CheckM metric", table.source, bin);
            continue;
        };
        stats.insert(
            bin,
            CheckmStats {
                completeness,
                contamination,
                strain_heterogeneity,
                genome_size,
                gc,
            },
        );
    }
    log::debug!("{}: {} CheckM records", table.source, stats.len());
    Ok(stats)
}

pub fn read_gtdb<P: AsRef<Path>>(path: P) -> Result<AHashMap<String, GtdbHit>> {
    let table = read_tsv(path)?;
    let id = table.column(GTDB_ID_COLUMN)?;
    let taxonomy = table.column("fastani_taxonomy")?;
    let ani = table.column("fastani_ani")?;
    let af = table.column("fastani_af")?;

    let mut hits = AHashMap::with_capacity(table.len());
    for i in 0..table.len() {
        hits.insert(
            strip_fa_suffix(&table.rows[i][id]).to_string(),
            GtdbHit {
                taxonomy: table.rows[i][taxonomy].clone(),
                ani: table.lookup_f64(i, ani),
                af: table.lookup_f64(i, af),
            },
        );
    }
    log::debug!("{}: {} GTDB-Tk records", table.source, hits.len());
    Ok(hits)
}

/// Frequency and quality gate: detected in more than `min_samples` samples,
/// complete enough and not too contaminated.
pub fn is_valid_bin(present_in: usize, stats: &CheckmStats, thresholds: &AnalysisThresholds) -> bool {
    present_in > thresholds.min_samples
        && stats.completeness >= thresholds.min_completeness
        && stats.contamination <= thresholds.max_contamination
}

/// Everything the narrative needs from the four input tables.
#[derive(Debug, Clone)]
pub struct MagAnalysis {
    /// Valid bins, most widely detected first
    pub bins: Vec<BinSummary>,
    /// Lineages common across the MIDAS2 samples
    pub common_lineages: Vec<String>,
}

/// Joins depths, CheckM, GTDB-Tk and MIDAS2 data into per-bin summaries.
pub fn analyze_bins(
    depths: &LabeledMatrix,
    checkm: &AHashMap<String, CheckmStats>,
    gtdb: &AHashMap<String, GtdbHit>,
    midas: &[AbundanceRow],
    thresholds: &AnalysisThresholds,
) -> MagAnalysis {
    let stats = lineage_stats(midas);
    let midas_samples = distinct_samples(midas).len();
    let common = common_lineages(&stats, thresholds.midas_threshold, midas_samples);
    log::info!(
        "{} of {} MIDAS2 lineages are found in more than {} of {} samples",
        common.len(),
        stats.len(),
        thresholds.midas_threshold,
        midas_samples
    );

    let presence = depths.positive_counts();
    let mut bins = Vec::new();
    for (i, bin) in depths.rows.iter().enumerate() {
        let Some(quality) = checkm.get(bin) else {
            log::debug!("{} has no CheckM record", bin);
            continue;
        };
        if !is_valid_bin(presence[i], quality, thresholds) {
            continue;
        }

        let present_in: Vec<String> = depths.columns
            .iter()
            .zip(&depths.values[i])
            .filter(|(_, &depth)| depth > 0.0)
            .map(|(sample, _)| sample.clone())
            .collect();

        let hit = gtdb.get(bin);
        let lineage = parse_lineage(hit.map(|h| h.taxonomy.as_str()).unwrap_or("NA"));
        let (genus, species) = lineage.genus_species();
        let support = lineage
            .search_term()
            .map(|term| species_support(midas, term))
            .unwrap_or_else(MidasSupport::none);

        bins.push(BinSummary {
            bin: bin.clone(),
            samples: present_in.len(),
            present_in,
            completeness: round_to(quality.completeness, 1),
            contamination: round_to(quality.contamination, 1),
            strain_heterogeneity: round_to(quality.strain_heterogeneity, 1),
            genome_size: round_to(quality.genome_size / 1_000_000.0, 2),
            gc: round_to(quality.gc, 1),
            genus: genus.to_string(),
            species: species.to_string(),
            ani: hit.and_then(|h| h.ani).map(|v| round_to(v, 2)),
            af: hit.and_then(|h| h.af).map(|v| round_to(v, 3)),
            midas_samples: support.samples,
            midas_coverage: support.mean_coverage.map(|v| round_to(v, 3)),
        });
    }

    log::info!("{} of {} bins pass the frequency and quality filters", bins.len(), depths.n_rows());
    bins.sort_by_key(|b| std::cmp::Reverse(b.samples));

    MagAnalysis {
        bins,
        common_lineages: common,
    }
}
