//src/tsv.rs

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::errors::{Error, Result};

/// A tab-separated table held fully in memory.
/// Cells are kept as trimmed strings; typed access goes through the
/// column helpers so that parse errors can name the file and line.
#[derive(Debug, Clone)]
pub struct TsvTable {
    /// Where the table was read from (used in error messages)
    pub source: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Opens a plain or gzip-compressed (`.gz`) text file for buffered reading.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| Error::file_io(path, e))?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Reads all non-blank lines of a tab-separated file, split into cells.
pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    let reader = open_reader(path)?;

    let mut rows = Vec::new();
    for line_result in reader.lines() {
        let line = line_result.map_err(|e| Error::file_io(path, e))?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        rows.push(line.split('\t').map(|c| c.trim().to_string()).collect());
    }
    Ok(rows)
}

/// Reads a tab-separated file whose first line is the header.
/// Short rows are padded with empty cells, so every row has `header.len()` cells.
pub fn read_tsv<P: AsRef<Path>>(path: P) -> Result<TsvTable> {
    let path = path.as_ref();
    let mut lines = read_rows(path)?.into_iter();

    let header = lines
        .next()
        .ok_or_else(|| Error::EmptyInput(format!("{} has no header line", path.display())))?;

    let width = header.len();
    let rows = lines
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    Ok(TsvTable {
        source: path.display().to_string(),
        header,
        rows,
    })
}

impl TsvTable {
    /// Index of a required column.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::MissingColumn {
                column: name.to_string(),
                file: self.source.clone(),
            })
    }

    /// Index of the first of `names` that is present.
    pub fn column_any(&self, names: &[&str]) -> Result<usize> {
        names
            .iter()
            .find_map(|name| self.header.iter().position(|h| h == name))
            .ok_or_else(|| Error::MissingColumn {
                column: names.join(" | "),
                file: self.source.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parses cell (`row`, `col`) as a float; fails with the file line number.
    pub fn parse_f64(&self, row: usize, col: usize) -> Result<f64> {
        let value = &self.rows[row][col];
        value.parse::<f64>().map_err(|_| Error::ParseValue {
            file: self.source.clone(),
            // +1 for the header, +1 for one-based lines
            line: row + 2,
            column: self.header[col].clone(),
            value: value.clone(),
        })
    }

    /// Parses cell (`row`, `col`) as a float, `None` for anything non-numeric.
    pub fn lookup_f64(&self, row: usize, col: usize) -> Option<f64> {
        self.rows[row][col].parse::<f64>().ok().filter(|v| v.is_finite())
    }
}
