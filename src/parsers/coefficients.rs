// ==============================================================================
// coefficients.rs - Clock Coefficient Parser
// ==============================================================================
// Description: Loads a linear clock (intercept + per-CpG weights) from a
//              delimited coefficient table
// Author: Matt Barham
// Created: 2026-03-02
// Modified: 2026-03-09
// Version: 1.0.0
// ==============================================================================
// Format: delimited text, optional title block, then a header row
// Example (Horvath 2013, Additional file 3):
//   Additional file 3 ...
//   <blank>
//   CpGmarker,CoefficientTraining,CoefficientTrainingShrunk,...
//   (Intercept),0.695507258,...
//   cg00075967,0.129336697,...
// ==============================================================================

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::models::{is_intercept_label, Model};
use crate::parsers::columns::{
    find_column, strip_preamble, IDENTIFIER_FALLBACK, IDENTIFIER_RULES, WEIGHT_FALLBACK,
    WEIGHT_RULES,
};

/// Errors that can occur while loading a coefficient table
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Coefficient file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Malformed coefficient table: {0}")]
    Format(String),

    #[error("Non-numeric weight {value:?} at line {line}")]
    InvalidWeight { line: u64, value: String },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),
}

/// What to do with a row whose weight cell is not a finite number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightParsePolicy {
    /// Drop the row, count it in `skipped_count`, keep loading
    #[default]
    SkipOnParseError,
    /// Abort the load with `ModelLoadError::InvalidWeight`
    FailOnParseError,
}

/// Coefficient table parser
///
/// Counters and resolved column names describe the most recent parse.
#[derive(Debug, Clone)]
pub struct CoefficientParser {
    /// Lines dropped before the header when the first line is not a header
    pub header_skip_lines: usize,

    /// Field delimiter
    pub delimiter: u8,

    /// Handling of non-numeric weights
    pub policy: WeightParsePolicy,

    /// Rows dropped because the weight was not numeric
    pub skipped_count: usize,

    /// Rows ignored because the identifier was blank or a `#` comment
    pub comment_count: usize,

    /// Name of the column used for identifiers
    pub identifier_column: Option<String>,

    /// Name of the column used for weights
    pub weight_column: Option<String>,
}

impl Default for CoefficientParser {
    fn default() -> Self {
        Self::from_config(&LoaderConfig::default())
    }
}

impl CoefficientParser {
    /// Create a parser with default settings (2 skipped title lines, comma)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            header_skip_lines: config.header_skip_lines,
            delimiter: config.delimiter,
            policy: WeightParsePolicy::default(),
            skipped_count: 0,
            comment_count: 0,
            identifier_column: None,
            weight_column: None,
        }
    }

    pub fn with_header_skip_lines(mut self, lines: usize) -> Self {
        self.header_skip_lines = lines;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_policy(mut self, policy: WeightParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load a model from a coefficient file
    ///
    /// # Arguments
    /// * `path` - Path to the coefficient table (.csv, .tsv)
    ///
    /// # Returns
    /// * `Ok(Model)` - Intercept and per-feature weights
    /// * `Err(ModelLoadError::NotFound)` - File does not exist
    /// * `Err(ModelLoadError::Format)` - No usable (identifier, weight) rows
    ///
    /// # Example
    /// ```no_run
    /// use epigenetic_clock::parsers::CoefficientParser;
    ///
    /// let mut parser = CoefficientParser::new();
    /// let model = parser.parse("gb-2013-14-10-r115-S3.csv")?;
    /// println!("Loaded {} CpGs", model.len());
    /// # Ok::<(), epigenetic_clock::parsers::ModelLoadError>(())
    /// ```
    pub fn parse(&mut self, path: impl AsRef<Path>) -> Result<Model, ModelLoadError> {
        let path = path.as_ref();
        debug!("Loading coefficients from {:?}", path);

        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ModelLoadError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ModelLoadError::IoError(e),
        })?;

        let model = self.parse_reader(file)?;
        info!(
            "Loaded {} coefficients from {:?} (intercept {:.6}, {} rows skipped)",
            model.len(),
            path,
            model.intercept(),
            self.skipped_count
        );
        Ok(model)
    }

    /// Load a model from any UTF-8 reader
    pub fn parse_reader<R: Read>(&mut self, mut reader: R) -> Result<Model, ModelLoadError> {
        let mut text = String::new();
        reader.read_to_string(&mut text).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => {
                ModelLoadError::Format("coefficient table is not valid UTF-8".to_string())
            }
            _ => ModelLoadError::IoError(e),
        })?;
        self.parse_str(&text)
    }

    /// Load a model from in-memory text
    pub fn parse_str(&mut self, text: &str) -> Result<Model, ModelLoadError> {
        self.skipped_count = 0;
        self.comment_count = 0;
        self.identifier_column = None;
        self.weight_column = None;

        let (body, dropped) = strip_preamble(text, self.header_skip_lines);
        if dropped > 0 {
            debug!("Skipped {} leading lines before header", dropped);
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(body.as_bytes());

        let headers = reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(ModelLoadError::Format(format!(
                "expected at least two columns, found {}",
                headers.len()
            )));
        }

        // Both lookups succeed: there are at least two headers
        let id_col = find_column(headers.iter(), IDENTIFIER_RULES, IDENTIFIER_FALLBACK)
            .ok_or_else(|| ModelLoadError::Format("no identifier column".to_string()))?;
        let weight_col = find_column(headers.iter(), WEIGHT_RULES, WEIGHT_FALLBACK)
            .ok_or_else(|| ModelLoadError::Format("no weight column".to_string()))?;

        debug!(
            "Identifier column {:?} (matched: {}), weight column {:?} (matched: {})",
            id_col.name, id_col.matched, weight_col.name, weight_col.matched
        );

        let mut intercept = None;
        let mut weights = HashMap::new();

        for result in reader.records() {
            let record = result?;
            // Line numbers count from the top of the file, title block included
            let line = record.position().map(|p| p.line()).unwrap_or(0) + dropped as u64;

            let identifier = record.get(id_col.index).unwrap_or("").trim();
            if identifier.is_empty() || identifier.starts_with('#') {
                self.comment_count += 1;
                continue;
            }

            let cell = record.get(weight_col.index).unwrap_or("");
            let weight = match parse_weight(cell) {
                Some(weight) => weight,
                None => match self.policy {
                    WeightParsePolicy::SkipOnParseError => {
                        warn!(
                            "Skipping {} at line {}: non-numeric weight {:?}",
                            identifier, line, cell
                        );
                        self.skipped_count += 1;
                        continue;
                    }
                    WeightParsePolicy::FailOnParseError => {
                        return Err(ModelLoadError::InvalidWeight {
                            line,
                            value: cell.to_string(),
                        });
                    }
                },
            };

            if is_intercept_label(identifier) {
                intercept = Some(weight);
            } else {
                weights.insert(identifier.to_string(), weight);
            }
        }

        self.identifier_column = Some(id_col.name);
        self.weight_column = Some(weight_col.name);

        if intercept.is_none() && weights.is_empty() {
            return Err(ModelLoadError::Format(
                "no usable (identifier, weight) rows".to_string(),
            ));
        }

        Ok(Model::new(intercept.unwrap_or(0.0), weights))
    }
}

/// Parse a weight cell; None for blanks, text, NaN and infinities
fn parse_weight(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|w| w.is_finite())
}

/// Load a model with the given loader settings
pub fn load_model(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<Model, ModelLoadError> {
    CoefficientParser::from_config(config).parse(path)
}

/// SHA-256 of a coefficient file, hex encoded
pub fn model_digest(path: impl AsRef<Path>) -> Result<String, ModelLoadError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ModelLoadError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ModelLoadError::IoError(e),
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Create a temporary coefficient file
    fn create_test_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_horvath_layout() {
        let contents = "\
Additional file 3: coefficient values
,,,
CpGmarker,CoefficientTraining,CoefficientTrainingShrunk,medianByCpG
(Intercept),0.695507258,0.8,
cg00075967,0.129336697,0.1,0.45
cg00374717,0.005017857,0.0,0.31
";
        let file = create_test_file(contents);
        let mut parser = CoefficientParser::new();
        let model = parser.parse(file.path()).unwrap();

        assert_eq!(model.intercept(), 0.695507258);
        assert_eq!(model.len(), 2);
        assert_eq!(model.weight("cg00075967"), Some(0.129336697));
        assert_eq!(parser.identifier_column.as_deref(), Some("CpGmarker"));
        assert_eq!(parser.weight_column.as_deref(), Some("CoefficientTraining"));
    }

    #[test]
    fn test_parse_plain_header_not_skipped() {
        let mut parser = CoefficientParser::new();
        let model = parser
            .parse_str("Probe,Coefficient\ncg1,1.5\ncg2,-0.5\ncg3,2.0\n")
            .unwrap();

        // With a recognizable header no lines are dropped, so cg1 survives
        assert_eq!(model.len(), 3);
        assert_eq!(model.weight("cg1"), Some(1.5));
        assert_eq!(model.intercept(), 0.0);
    }

    #[test]
    fn test_intercept_extraction() {
        let mut parser = CoefficientParser::new();
        let model = parser
            .parse_str("probe,coef\n(Intercept),5.2\ncg00000001,0.1\n")
            .unwrap();

        assert_eq!(model.intercept(), 5.2);
        assert!(model.weight("(Intercept)").is_none());
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_last_intercept_wins() {
        let mut parser = CoefficientParser::new();
        let model = parser
            .parse_str("probe,coef\nIntercept,1.0\ncg1,0.1\nINTERCEPT,3.0\n")
            .unwrap();
        assert_eq!(model.intercept(), 3.0);
    }

    #[test]
    fn test_duplicate_identifier_keeps_later_weight() {
        let mut parser = CoefficientParser::new();
        let model = parser
            .parse_str("probe,coef\ncg1,0.1\ncg2,0.2\ncg1,0.9\n")
            .unwrap();

        assert_eq!(model.len(), 2);
        assert_eq!(model.weight("cg1"), Some(0.9));
    }

    #[test]
    fn test_skip_on_parse_error() {
        let mut parser = CoefficientParser::new();
        let model = parser
            .parse_str("probe,coef\ncg1,0.1\ncg2,abc\ncg3,\ncg4,NaN\ncg5,0.5\n")
            .unwrap();

        assert_eq!(model.len(), 2);
        assert_eq!(parser.skipped_count, 3);
        assert!(model.weight("cg2").is_none());
    }

    #[test]
    fn test_fail_on_parse_error() {
        let mut parser = CoefficientParser::new().with_policy(WeightParsePolicy::FailOnParseError);
        let err = parser
            .parse_str("probe,coef\ncg1,0.1\ncg2,abc\n")
            .unwrap_err();

        match err {
            ModelLoadError::InvalidWeight { line, value } => {
                assert_eq!(line, 3);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_comments_and_blank_identifiers() {
        let mut parser = CoefficientParser::new();
        let model = parser
            .parse_str("probe,coef\n# note,1.0\n  ,2.0\n  cg1  , 0.25 \n")
            .unwrap();

        assert_eq!(model.len(), 1);
        assert_eq!(model.weight("cg1"), Some(0.25));
        assert_eq!(parser.comment_count, 2);
    }

    #[test]
    fn test_fallback_columns() {
        // Neither header matches: identifier = first column, weight = second
        let mut parser = CoefficientParser::new().with_header_skip_lines(0);
        let model = parser.parse_str("name,value,extra\ncg1,0.3,x\n").unwrap();

        assert_eq!(model.weight("cg1"), Some(0.3));
        assert_eq!(parser.weight_column.as_deref(), Some("value"));
    }

    #[test]
    fn test_tab_delimited() {
        let mut parser = CoefficientParser::new().with_delimiter(b'\t');
        let model = parser.parse_str("probe\tweight\ncg1\t0.4\n").unwrap();
        assert_eq!(model.weight("cg1"), Some(0.4));
    }

    #[test]
    fn test_no_usable_rows_is_format_error() {
        let mut parser = CoefficientParser::new();
        let err = parser.parse_str("probe,coef\ncg1,abc\n# x,1\n").unwrap_err();
        assert!(matches!(err, ModelLoadError::Format(_)));

        let err = parser.parse_str("probe\ncg1\n").unwrap_err();
        assert!(matches!(err, ModelLoadError::Format(_)));
    }

    #[test]
    fn test_invalid_utf8_is_format_error() {
        let mut parser = CoefficientParser::new();
        let err = parser
            .parse_reader(&b"probe,coef\ncg1,0.5\n\xff\xfe,1\n"[..])
            .unwrap_err();
        assert!(matches!(err, ModelLoadError::Format(_)));
    }

    #[test]
    fn test_intercept_only_is_loadable() {
        let mut parser = CoefficientParser::new();
        let model = parser.parse_str("probe,coef\n(Intercept),1.0\n").unwrap();
        assert!(model.is_empty());
        assert_eq!(model.intercept(), 1.0);
    }

    #[test]
    fn test_missing_file() {
        let err = load_model("/nonexistent/coefficients.csv", &LoaderConfig::default()).unwrap_err();
        assert!(matches!(err, ModelLoadError::NotFound { .. }));
    }

    #[test]
    fn test_model_digest() {
        let file = create_test_file("probe,coef\ncg1,0.1\n");
        let digest = model_digest(file.path()).unwrap();

        assert_eq!(digest.len(), 64);
        assert_eq!(digest, model_digest(file.path()).unwrap());
    }
}
