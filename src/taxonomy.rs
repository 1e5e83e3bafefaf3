//src/taxonomy.rs

pub const GENUS_MARKER: &str = "g__";
pub const SPECIES_MARKER: &str = "s__";
pub const NOT_AVAILABLE: &str = "NA";

/// Result of reading genus and species out of a GTDB-style lineage string
/// such as `d__Bacteria;p__Proteobacteria;...;g__Escherichia;s__Escherichia coli`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lineage {
    Found { genus: String, species: String },
    Missing,
}

impl Lineage {
    /// (genus, species), with `NA` for both when missing.
    pub fn genus_species(&self) -> (&str, &str) {
        match self {
            Lineage::Found { genus, species } => (genus.as_str(), species.as_str()),
            Lineage::Missing => (NOT_AVAILABLE, NOT_AVAILABLE),
        }
    }

    /// Name used to look the lineage up in MIDAS2 output: the species, or the
    /// genus when the species rank is empty.
    pub fn search_term(&self) -> Option<&str> {
        match self {
            Lineage::Found { genus, species } => {
                if !species.is_empty() {
                    Some(species.as_str())
                } else if !genus.is_empty() {
                    Some(genus.as_str())
                } else {
                    None
                }
            }
            Lineage::Missing => None,
        }
    }
}

/// Takes the first `;`-separated rank containing each marker.
/// `NA`, empty input or a lineage lacking either marker gives `Lineage::Missing`.
pub fn parse_lineage(taxonomy: &str) -> Lineage {
    let taxonomy = taxonomy.trim();
    if taxonomy.is_empty() || taxonomy == NOT_AVAILABLE {
        return Lineage::Missing;
    }

    let rank = |marker: &str| {
        taxonomy
            .split(';')
            .find(|token| token.contains(marker))
            .map(|token| token.replace(marker, "").trim().to_string())
    };

    match (rank(GENUS_MARKER), rank(SPECIES_MARKER)) {
        (Some(genus), Some(species)) => Lineage::Found { genus, species },
        _ => Lineage::Missing,
    }
}
