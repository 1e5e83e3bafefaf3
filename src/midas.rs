//src/midas.rs

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::errors::{Error, Result};
use crate::tsv::{open_reader, read_tsv, TsvTable};
use crate::types::Cell;

pub const SAMPLE_COLUMN: &str = "sample_name";
pub const SPECIES_COLUMN: &str = "species_id";
pub const LINEAGE_COLUMN: &str = "Lineage";
pub const COVERAGE_COLUMN: &str = "fraction_covered";

pub const SECTION_ID: &str = "midas2_species_abundance";
pub const SECTION_NAME: &str = "MIDAS2 Species Abundance";

/// Reads MIDAS2 species reports and concatenates their rows in file order.
/// Every report must carry exactly the columns of the first one.
pub fn read_midas_reports<P: AsRef<Path>>(paths: &[P]) -> Result<TsvTable> {
    let (first, rest) = paths
        .split_first()
        .ok_or_else(|| Error::EmptyInput("no MIDAS2 reports given".to_string()))?;

    let mut combined = read_tsv(first)?;
    combined.column(SAMPLE_COLUMN)?;
    combined.column(SPECIES_COLUMN)?;
    log::debug!("{}: {} rows", combined.source, combined.len());

    for path in rest {
        let table = read_tsv(path)?;
        if table.header != combined.header {
            return Err(Error::SchemaMismatch {
                file: table.source,
                expected: combined.header.join("\t"),
                found: table.header.join("\t"),
            });
        }
        log::debug!("{}: {} rows", table.source, table.len());
        combined.rows.extend(table.rows);
    }

    combined.source = format!("{} MIDAS2 reports", paths.len());
    Ok(combined)
}

/// Keys every row by `<sample_name>_<species_id>`.
/// Keys keep first-seen order; a repeated key replaces the earlier row.
pub fn merge_rows(table: &TsvTable) -> Result<Mapping> {
    let sample_col = table.column(SAMPLE_COLUMN)?;
    let species_col = table.column(SPECIES_COLUMN)?;

    let mut data = Mapping::new();
    for row in &table.rows {
        let key = format!("{}_{}", row[sample_col], row[species_col]);

        let mut record = Mapping::new();
        for (name, raw) in table.header.iter().zip(row) {
            record.insert(Value::String(name.clone()), Value::from(&Cell::parse(raw)));
        }

        if data.insert(Value::String(key.clone()), Value::Mapping(record)).is_some() {
            log::warn!("Duplicate row for {}; keeping the last one", key);
        }
    }
    Ok(data)
}

/// Column title, description and display format for the dashboard table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnHeader {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ColumnHeader {
    fn new(title: &str, description: &str, format: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            description: Some(description.to_string()),
            format: format.map(str::to_string),
        }
    }
}

/// Headers of the MIDAS2 species table, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbundanceHeaders {
    pub sample_name: ColumnHeader,
    pub species_id: ColumnHeader,
    pub genome_length: ColumnHeader,
    pub covered_bases: ColumnHeader,
    pub total_depth: ColumnHeader,
    pub aligned_reads: ColumnHeader,
    pub mapped_reads: ColumnHeader,
    pub fraction_covered: ColumnHeader,
    pub mean_coverage: ColumnHeader,
    #[serde(rename = "Lineage")]
    pub lineage: ColumnHeader,
    #[serde(rename = "Continent")]
    pub continent: ColumnHeader,
}

impl Default for AbundanceHeaders {
    fn default() -> Self {
        let count = Some("{:,.0f}");
        let fraction = Some("{:,.1f}");
        Self {
            sample_name: ColumnHeader::new("Sample", "Input mNGS read name", None),
            species_id: ColumnHeader::new("Species ID", "Six-digit species ID", count),
            genome_length: ColumnHeader::new(
                "Genome Length",
                "Length of reference genome in MIDAS2 database",
                count,
            ),
            covered_bases: ColumnHeader::new(
                "Covered Bases",
                "Number of bases covered by at least one post-filtered reads",
                count,
            ),
            total_depth: ColumnHeader::new(
                "Total Depth",
                "Total read depth across all covered bases",
                count,
            ),
            aligned_reads: ColumnHeader::new(
                "Aligned Reads",
                "Total read counts across covered bases before post-alignment filter",
                count,
            ),
            mapped_reads: ColumnHeader::new(
                "Mapped Reads",
                "Total read counts across covered bases after post-alignment filter",
                count,
            ),
            fraction_covered: ColumnHeader::new(
                "Fraction Covered",
                "Fraction of covered bases (horizontal genome coverage)",
                fraction,
            ),
            mean_coverage: ColumnHeader::new(
                "Mean Coverage",
                "Mean read depth across all covered bases (vertical genome coverage)",
                fraction,
            ),
            lineage: ColumnHeader::new(
                "Lineage",
                "Genus (g_) and species (s_) for microbe identified by MIDAS2",
                None,
            ),
            continent: ColumnHeader::new(
                "Continent",
                "Source of reference genome in MIDAS2 database",
                None,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub id: String,
    pub title: String,
    pub col1_header: String,
    pub scale: bool,
}

/// MultiQC custom-content document: section metadata, headers and keyed rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiqcTable {
    pub id: String,
    pub section_name: String,
    pub description: String,
    pub plot_type: String,
    pub pconfig: TableConfig,
    pub headers: AbundanceHeaders,
    pub data: Mapping,
}

pub fn build_document(data: Mapping) -> MultiqcTable {
    MultiqcTable {
        id: SECTION_ID.to_string(),
        section_name: SECTION_NAME.to_string(),
        description: "MIDAS2 species abundance results for all samples".to_string(),
        plot_type: "table".to_string(),
        pconfig: TableConfig {
            id: SECTION_ID.to_string(),
            title: SECTION_NAME.to_string(),
            col1_header: "SampleName_SpeciesID".to_string(),
            scale: false,
        },
        headers: AbundanceHeaders::default(),
        data,
    }
}

pub fn write_document<P: AsRef<Path>>(doc: &MultiqcTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::file_io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_yaml::to_writer(&mut writer, doc)?;
    writer.flush().map_err(|e| Error::file_io(path, e))?;
    Ok(())
}

/// Only the keyed rows are needed downstream; headers may come from any producer.
#[derive(Deserialize)]
struct DataSection {
    data: Mapping,
}

/// Reads the `data` section of a table document.
pub fn read_document_data<P: AsRef<Path>>(path: P) -> Result<Mapping> {
    let reader = open_reader(path)?;
    let section: DataSection = serde_yaml::from_reader(reader)?;
    Ok(section.data)
}

/// The three MIDAS2 fields used for lineage statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct AbundanceRow {
    pub sample_name: String,
    /// Empty when the row has no lineage
    pub lineage: String,
    pub fraction_covered: Option<f64>,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Extracts abundance rows from the `data` section of a table document.
pub fn abundance_rows_from_data(data: &Mapping, source: &str) -> Result<Vec<AbundanceRow>> {
    let missing = |column: &str| Error::MissingColumn {
        column: column.to_string(),
        file: source.to_string(),
    };

    let mut rows = Vec::with_capacity(data.len());
    for record in data.values() {
        let sample = record.get(SAMPLE_COLUMN).ok_or_else(|| missing(SAMPLE_COLUMN))?;
        let lineage = record.get(LINEAGE_COLUMN).ok_or_else(|| missing(LINEAGE_COLUMN))?;
        let coverage = record.get(COVERAGE_COLUMN).ok_or_else(|| missing(COVERAGE_COLUMN))?;

        rows.push(AbundanceRow {
            sample_name: value_to_string(sample),
            lineage: value_to_string(lineage),
            fraction_covered: coverage.as_f64().filter(|v| v.is_finite()),
        });
    }
    Ok(rows)
}

/// Extracts abundance rows from a raw MIDAS2 table.
pub fn abundance_rows_from_table(table: &TsvTable) -> Result<Vec<AbundanceRow>> {
    let sample_col = table.column(SAMPLE_COLUMN)?;
    let lineage_col = table.column(LINEAGE_COLUMN)?;
    let coverage_col = table.column(COVERAGE_COLUMN)?;

    Ok((0..table.len())
        .map(|i| {
            let lineage = &table.rows[i][lineage_col];
            AbundanceRow {
                sample_name: table.rows[i][sample_col].clone(),
                lineage: if lineage == "NA" { String::new() } else { lineage.clone() },
                fraction_covered: table.lookup_f64(i, coverage_col),
            }
        })
        .collect())
}

/// Distinct sample names in first-seen order.
pub fn distinct_samples(rows: &[AbundanceRow]) -> Vec<String> {
    let mut seen = AHashSet::new();
    rows.iter()
        .filter(|r| seen.insert(r.sample_name.as_str()))
        .map(|r| r.sample_name.clone())
        .collect()
}

/// Per-lineage reduction of the abundance rows.
#[derive(Debug, Clone, PartialEq)]
pub struct LineageStats {
    /// Distinct samples the lineage was detected in
    pub samples: usize,
    pub mean_fraction_covered: Option<f64>,
}

/// Groups rows by lineage (rows without a lineage are skipped), sorted by lineage.
pub fn lineage_stats(rows: &[AbundanceRow]) -> BTreeMap<String, LineageStats> {
    let mut groups: AHashMap<&str, (AHashSet<&str>, f64, usize)> = AHashMap::new();
    for row in rows.iter().filter(|r| !r.lineage.is_empty()) {
        let entry = groups.entry(row.lineage.as_str()).or_default();
        entry.0.insert(row.sample_name.as_str());
        if let Some(cov) = row.fraction_covered {
            entry.1 += cov;
            entry.2 += 1;
        }
    }

    groups
        .into_iter()
        .map(|(lineage, (samples, sum, n))| {
            let stats = LineageStats {
                samples: samples.len(),
                mean_fraction_covered: (n > 0).then(|| sum / n as f64),
            };
            (lineage.to_string(), stats)
        })
        .collect()
}

/// Lineages seen in more than `threshold * sample_total` samples, in lineage order.
pub fn common_lineages(
    stats: &BTreeMap<String, LineageStats>,
    threshold: f64,
    sample_total: usize,
) -> Vec<String> {
    let cutoff = sample_total as f64 * threshold;
    stats
        .iter()
        .filter(|(_, s)| s.samples as f64 > cutoff)
        .map(|(lineage, _)| lineage.clone())
        .collect()
}

/// How strongly the raw-read MIDAS2 profile supports a MAG taxon.
#[derive(Debug, Clone, PartialEq)]
pub struct MidasSupport {
    pub samples: usize,
    /// Mean `fraction_covered` of matching rows; `None` without (positive) support
    pub mean_coverage: Option<f64>,
}

impl MidasSupport {
    pub fn none() -> Self {
        Self { samples: 0, mean_coverage: None }
    }
}

/// Case-insensitive literal substring match of `term` against MIDAS2 lineages.
pub fn species_support(rows: &[AbundanceRow], term: &str) -> MidasSupport {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return MidasSupport::none();
    }

    let matches: Vec<&AbundanceRow> = rows
        .iter()
        .filter(|r| r.lineage.to_lowercase().contains(&needle))
        .collect();
    if matches.is_empty() {
        return MidasSupport::none();
    }

    let samples: AHashSet<&str> = matches.iter().map(|r| r.sample_name.as_str()).collect();
    let covs: Vec<f64> = matches.iter().filter_map(|r| r.fraction_covered).collect();
    let mean = if covs.is_empty() {
        None
    } else {
        Some(covs.iter().sum::<f64>() / covs.len() as f64)
    };

    MidasSupport {
        samples: samples.len(),
        mean_coverage: mean.filter(|m| *m > 0.0),
    }
}
