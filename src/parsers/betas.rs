// ==============================================================================
// betas.rs - Methylation Beta Matrix Reader
// ==============================================================================
// Description: Reads beta-value tables (probes x samples or samples x probes)
//              and single beta columns for clock scoring
// Author: Matt Barham
// Created: 2026-03-04
// Modified: 2026-03-09
// Version: 1.0.0
// ==============================================================================
// Format: delimited text, optionally gzip-compressed (.gz)
// Example (probes as rows):
//   ID_REF,GSM1001,GSM1002
//   cg00000029,0.61,0.58
//   cg00000108,NA,0.93
// ==============================================================================

use csv::ReaderBuilder;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::delimiter_for_path;
use crate::models::{is_intercept_label, BatchError, FeatureVector, SampleBatch};
use crate::parsers::columns::{find_column, strip_preamble, IDENTIFIER_FALLBACK, IDENTIFIER_RULES};

/// Errors that can occur while reading beta values
#[derive(Error, Debug)]
pub enum BetaParseError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Column {column:?} not found. Available: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("File is empty or contains no samples")]
    EmptyFile,

    #[error("Invalid matrix: {0}")]
    Shape(#[from] BatchError),
}

/// Reader for methylation beta tables
#[derive(Debug, Clone, Default)]
pub struct BetaMatrixReader {
    /// Field delimiter; picked from the file extension when None
    pub delimiter: Option<u8>,

    /// Title lines dropped before a non-header first line (`read_column` only)
    pub header_skip_lines: usize,

    /// Cells read as missing (blank, NA, NaN, text) in the last read
    pub missing_count: usize,
}

impl BetaMatrixReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_header_skip_lines(mut self, lines: usize) -> Self {
        self.header_skip_lines = lines;
        self
    }

    /// Read a full beta matrix
    ///
    /// The first header cell is a corner label; the remaining header cells
    /// label the columns. Each data row starts with its row label. Missing
    /// values become NaN so the scorer imputes them.
    ///
    /// Orientation is not decided here: either axis may hold probe IDs.
    pub fn read(&mut self, path: impl AsRef<Path>) -> Result<SampleBatch, BetaParseError> {
        let path = path.as_ref();
        let delimiter = self.delimiter.unwrap_or_else(|| delimiter_for_path(path));
        debug!("Reading beta matrix {:?}", path);

        let batch = self.read_matrix(open_source(path)?, delimiter)?;
        info!(
            "Read beta matrix {:?}: {} rows x {} columns ({} missing cells)",
            path,
            batch.n_rows(),
            batch.n_columns(),
            self.missing_count
        );
        Ok(batch)
    }

    /// Read a beta matrix from any reader
    pub fn read_matrix<R: Read>(
        &mut self,
        source: R,
        delimiter: u8,
    ) -> Result<SampleBatch, BetaParseError> {
        self.missing_count = 0;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .comment(Some(b'#'))
            .delimiter(delimiter)
            .from_reader(source);

        let headers = reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(BetaParseError::EmptyFile);
        }
        let column_labels: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

        let mut row_labels = Vec::new();
        let mut rows = Vec::new();

        for result in reader.records() {
            let record = result?;
            if record.len() != headers.len() {
                return Err(BetaParseError::RaggedRow {
                    line: record.position().map(|p| p.line()).unwrap_or(0),
                    expected: headers.len(),
                    found: record.len(),
                });
            }

            let mut values = Vec::with_capacity(column_labels.len());
            for cell in record.iter().skip(1) {
                let value = parse_beta(cell);
                if value.is_none() {
                    self.missing_count += 1;
                }
                values.push(value.unwrap_or(f64::NAN));
            }

            row_labels.push(record.get(0).unwrap_or("").trim().to_string());
            rows.push(values);
        }

        if rows.is_empty() {
            return Err(BetaParseError::EmptyFile);
        }

        Ok(SampleBatch::from_rows(row_labels, column_labels, rows)?)
    }

    /// Read one named value column as a single sample
    ///
    /// Rows are keyed by the identifier column (same rules as coefficient
    /// tables). Intercept rows, blank identifiers and missing values are
    /// left out. Useful for scoring the per-CpG medians shipped alongside
    /// published clock coefficients.
    pub fn read_column(
        &mut self,
        path: impl AsRef<Path>,
        column: &str,
    ) -> Result<FeatureVector, BetaParseError> {
        let path = path.as_ref();
        let delimiter = self.delimiter.unwrap_or_else(|| delimiter_for_path(path));

        let mut text = String::new();
        open_source(path)?.read_to_string(&mut text)?;

        let vector = self.read_column_str(&text, column, delimiter)?;
        info!(
            "Read {} beta values from column {:?} of {:?}",
            vector.len(),
            column,
            path
        );
        Ok(vector)
    }

    /// Read one named value column from in-memory text
    pub fn read_column_str(
        &mut self,
        text: &str,
        column: &str,
        delimiter: u8,
    ) -> Result<FeatureVector, BetaParseError> {
        self.missing_count = 0;

        let (body, _) = strip_preamble(text, self.header_skip_lines);
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(body.as_bytes());

        let headers = reader.headers()?.clone();
        let value_col = headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| BetaParseError::MissingColumn {
                column: column.to_string(),
                available: headers.iter().map(|h| h.trim().to_string()).collect(),
            })?;
        let id_col = find_column(headers.iter(), IDENTIFIER_RULES, IDENTIFIER_FALLBACK)
            .ok_or(BetaParseError::EmptyFile)?;

        let mut vector = FeatureVector::new();
        for result in reader.records() {
            let record = result?;
            let identifier = record.get(id_col.index).unwrap_or("").trim();
            if identifier.is_empty() || identifier.starts_with('#') || is_intercept_label(identifier) {
                continue;
            }

            match record.get(value_col).and_then(parse_beta) {
                Some(value) => {
                    vector.insert(identifier.to_string(), value);
                }
                None => self.missing_count += 1,
            }
        }

        if vector.is_empty() {
            return Err(BetaParseError::EmptyFile);
        }

        Ok(vector)
    }
}

/// Open a file, transparently decompressing `.gz`
fn open_source(path: &Path) -> Result<Box<dyn Read>, BetaParseError> {
    let file = File::open(path)?;
    let is_gzip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gzip {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Parse a beta cell; None for blanks, NA markers, text, NaN and infinities
fn parse_beta(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
