//src/quality.rs

use crate::types::BinSummary;

/// Narrative-level quality thresholds (stricter than the analysis filter).
#[derive(Debug, Clone, PartialEq)]
pub struct QualityThresholds {
    pub min_completeness: f64,
    pub max_contamination: f64,
    pub min_ani: f64,
    pub min_af: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_completeness: 80.0,
            max_contamination: 10.0,
            min_ani: 97.0,
            min_af: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Good,
    Fair,
}

impl Quality {
    pub fn label(&self) -> &'static str {
        match self {
            Quality::Good => "Good quality",
            Quality::Fair => "Fair quality",
        }
    }
}

/// Quality class plus a message for every criterion the bin failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub quality: Quality,
    pub failed_metrics: Vec<String>,
}

/// Good only when all four criteria hold; a missing ANI or AF fails its criterion.
pub fn classify(
    completeness: f64,
    contamination: f64,
    ani: Option<f64>,
    af: Option<f64>,
    t: &QualityThresholds,
) -> Assessment {
    let mut failed_metrics = Vec::new();
    if completeness < t.min_completeness {
        failed_metrics.push(format!("Completeness below {}%", t.min_completeness));
    }
    if contamination > t.max_contamination {
        failed_metrics.push(format!("Contamination above {}%", t.max_contamination));
    }
    if !ani.map_or(false, |v| v >= t.min_ani) {
        failed_metrics.push(format!("ANI below {}%", t.min_ani));
    }
    if !af.map_or(false, |v| v >= t.min_af) {
        failed_metrics.push(format!("AF below {}", t.min_af));
    }

    let quality = if failed_metrics.is_empty() { Quality::Good } else { Quality::Fair };
    Assessment { quality, failed_metrics }
}

impl BinSummary {
    pub fn assess(&self, t: &QualityThresholds) -> Assessment {
        classify(self.completeness, self.contamination, self.ani, self.af, t)
    }
}
