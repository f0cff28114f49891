// ==============================================================================
// output.rs - Prediction Output
// ==============================================================================
// Description: Write clock predictions as CSV or JSON with run metadata
// Author: Matt Barham
// Created: 2026-03-06
// Modified: 2026-03-09
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::config::ScorerConfig;
use crate::models::{Model, SamplePrediction};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One row per sample (sample_id, predicted_age, coverage)
    Csv,
    /// Predictions plus run metadata
    Json,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Provenance of a scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub model_path: String,
    /// SHA-256 of the coefficient file
    pub model_sha256: String,
    pub features: usize,
    pub intercept: f64,
    pub impute: f64,
    pub clip_low: f64,
    pub clip_high: f64,
    /// RFC 3339 timestamp
    pub generated_at: String,
}

impl RunMetadata {
    pub fn new(model_path: &Path, model_sha256: String, model: &Model, config: &ScorerConfig) -> Self {
        Self {
            model_path: model_path.display().to_string(),
            model_sha256,
            features: model.len(),
            intercept: model.intercept(),
            impute: config.impute,
            clip_low: config.clip.low,
            clip_high: config.clip.high,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Complete result of a scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockOutput {
    pub metadata: RunMetadata,
    pub predictions: Vec<SamplePrediction>,
}

/// Write predictions as CSV
pub fn write_csv<W: Write>(writer: W, predictions: &[SamplePrediction]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for prediction in predictions {
        csv_writer
            .serialize(prediction)
            .context("Failed to write CSV row")?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Write the full output as pretty-printed JSON
pub fn write_json<W: Write>(mut writer: W, output: &ClockOutput) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, output).context("Failed to serialize JSON")?;
    writeln!(writer)?;
    writer.flush().context("Failed to flush JSON output")?;
    Ok(())
}

/// Write `output` to `path`, or stdout when no path is given
pub fn write_output(output: &ClockOutput, format: OutputFormat, path: Option<&Path>) -> Result<()> {
    let writer: Box<dyn Write> = match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {:?}", path))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    };

    match format {
        OutputFormat::Csv => write_csv(writer, &output.predictions)?,
        OutputFormat::Json => write_json(writer, output)?,
    }

    if let Some(path) = path {
        info!(
            "Wrote {} predictions to {:?} ({})",
            output.predictions.len(),
            path,
            format.extension()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn sample_output() -> ClockOutput {
        let mut weights = HashMap::new();
        weights.insert("cg1".to_string(), 2.0);
        let model = Model::new(1.0, weights);

        ClockOutput {
            metadata: RunMetadata::new(
                Path::new("coef.csv"),
                "ab".repeat(32),
                &model,
                &ScorerConfig::default(),
            ),
            predictions: vec![
                SamplePrediction { sample_id: "S1".to_string(), predicted_age: 41.5, coverage: 1 },
                SamplePrediction { sample_id: "S2".to_string(), predicted_age: 0.0, coverage: 0 },
            ],
        }
    }

    /// Accepts writes but refuses to flush, like a closed pipe
    struct FlushFails(Vec<u8>);

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_csv_output() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &sample_output().predictions).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sample_id,predicted_age,coverage");
        assert_eq!(lines[1], "S1,41.5,1");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_json_output() {
        let output = sample_output();
        let mut buffer = Vec::new();
        write_json(&mut buffer, &output).unwrap();

        let parsed: ClockOutput = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed.metadata.features, 1);
        assert_eq!(parsed.metadata.clip_high, 120.0);
        assert_eq!(parsed.predictions, output.predictions);
    }

    #[test]
    fn test_json_flush_error_is_reported() {
        let result = write_json(FlushFails(Vec::new()), &sample_output());
        assert!(result.is_err());

        let result = write_csv(FlushFails(Vec::new()), &sample_output().predictions);
        assert!(result.is_err());
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ages.csv");

        write_output(&sample_output(), OutputFormat::Csv, Some(&path)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("sample_id,predicted_age,coverage"));
    }

    #[test]
    fn test_format_serialization() {
        assert_eq!(serde_json::to_string(&OutputFormat::Json).unwrap(), "\"json\"");
        assert_eq!(OutputFormat::Csv.extension(), "csv");
    }
}
