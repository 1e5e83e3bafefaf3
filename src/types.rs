//src/types.rs

use serde_yaml::Value;

/// A table value with its type inferred from the text, so that numeric columns
/// stay numeric when the table is serialized.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Infers the cell type. Empty, `NA`, `N/A` and `nan` are missing values.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "" | "NA" | "N/A" | "nan" | "NaN" => return Cell::Missing,
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            Cell::Int(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            Cell::Float(f)
        } else {
            Cell::Text(raw.to_string())
        }
    }
}

impl From<&Cell> for Value {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Int(i) => Value::Number((*i).into()),
            Cell::Float(f) => Value::Number((*f).into()),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Missing => Value::Null,
        }
    }
}

/// One analysed MAG: the join of its depth, CheckM and GTDB-Tk rows plus MIDAS2 support.
/// Numeric fields are already rounded to their display precision.
#[derive(Debug, Clone, PartialEq)]
pub struct BinSummary {
    pub bin: String,
    /// Number of samples with positive depth
    pub samples: usize,
    /// Names of those samples, in depth-table column order
    pub present_in: Vec<String>,
    pub completeness: f64,
    pub contamination: f64,
    pub strain_heterogeneity: f64,
    /// Genome size in Mbp
    pub genome_size: f64,
    pub gc: f64,
    pub genus: String,
    pub species: String,
    /// `None` when the bin has no numeric GTDB-Tk ANI
    pub ani: Option<f64>,
    pub af: Option<f64>,
    pub midas_samples: usize,
    /// `None` when no MIDAS2 row supports the bin
    pub midas_coverage: Option<f64>,
}

impl BinSummary {
    pub fn taxonomy(&self) -> String {
        format!("{} {}", self.genus, self.species)
    }

    pub fn has_midas_support(&self) -> bool {
        self.midas_samples > 0
    }
}

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Float rendering used in reports and matrix dumps: shortest round-trip
/// form, but integral values keep one decimal (`85.0`, `-6.0`).
pub fn display_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// `display_float` for optional metrics, `NA` when absent.
pub fn display_metric(value: Option<f64>) -> String {
    value.map(display_float).unwrap_or_else(|| "NA".to_string())
}
