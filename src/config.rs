// ==============================================================================
// config.rs - Loader and Scorer Configuration
// ==============================================================================
// Description: Tunable parameters for coefficient loading and clock scoring
// Author: Matt Barham
// Created: 2026-03-03
// Modified: 2026-03-09
// Version: 1.0.0
// ==============================================================================

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Leading non-data lines in the published Horvath coefficient file
/// (Additional file 3, gb-2013-14-10-r115-S3.csv)
pub const DEFAULT_HEADER_SKIP_LINES: usize = 2;

/// Standard substitute for a missing CpG beta value
pub const DEFAULT_IMPUTE: f64 = 0.5;

/// Plausible human age range in years
pub const DEFAULT_CLIP_LOW: f64 = 0.0;
pub const DEFAULT_CLIP_HIGH: f64 = 120.0;

/// Illumina CpG probe identifiers (cg00000029, CG16867657, ...)
pub const DEFAULT_IDENTIFIER_PATTERN: &str = r"(?i)^cg\d+";

/// Batches with at least this many samples are scored on the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Errors raised by configuration validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid clip range: low {low} must be finite and not above high {high}")]
    InvalidClipRange { low: f64, high: f64 },

    #[error("Impute value must be finite, got {0}")]
    NonFiniteImpute(f64),

    #[error("Invalid identifier pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Closed interval predictions are clamped into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRange {
    pub low: f64,
    pub high: f64,
}

impl Default for ClipRange {
    fn default() -> Self {
        Self {
            low: DEFAULT_CLIP_LOW,
            high: DEFAULT_CLIP_HIGH,
        }
    }
}

impl ClipRange {
    pub fn new(low: f64, high: f64) -> Result<Self, ConfigError> {
        let range = Self { low, high };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.low.is_finite() || !self.high.is_finite() || self.low > self.high {
            return Err(ConfigError::InvalidClipRange {
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }

    /// Clamp `value` into [low, high]
    pub fn apply(&self, value: f64) -> f64 {
        value.clamp(self.low, self.high)
    }
}

/// Coefficient file loading parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Lines to drop before the real header when the first line carries no
    /// identifier-column marker
    pub header_skip_lines: usize,

    /// Field delimiter
    pub delimiter: u8,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            header_skip_lines: DEFAULT_HEADER_SKIP_LINES,
            delimiter: b',',
        }
    }
}

impl LoaderConfig {
    /// Default config with the delimiter picked from the file extension
    /// (.tsv / .txt are tab-delimited, anything else comma-delimited)
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self {
            delimiter: delimiter_for_path(path.as_ref()),
            ..Self::default()
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
}

/// Guess the delimiter of a tabular text file from its name (`.gz` ignored)
pub fn delimiter_for_path(path: &Path) -> u8 {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);

    if name.ends_with(".tsv") || name.ends_with(".txt") {
        b'\t'
    } else {
        b','
    }
}

/// Clock scoring parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Value used for model features a sample does not report (or reports as NaN)
    pub impute: f64,

    /// Output clamp
    pub clip: ClipRange,

    /// Regex a label must match to count as a feature identifier when
    /// inferring batch orientation
    pub identifier_pattern: String,

    /// Minimum batch size for parallel scoring (0 disables it)
    pub parallel_threshold: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            impute: DEFAULT_IMPUTE,
            clip: ClipRange::default(),
            identifier_pattern: DEFAULT_IDENTIFIER_PATTERN.to_string(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl ScorerConfig {
    pub fn with_impute(mut self, impute: f64) -> Self {
        self.impute = impute;
        self
    }

    pub fn with_clip(mut self, clip: ClipRange) -> Self {
        self.clip = clip;
        self
    }

    pub fn with_identifier_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.identifier_pattern = pattern.into();
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Check all parameters and compile the identifier pattern
    pub fn validate(&self) -> Result<Regex, ConfigError> {
        if !self.impute.is_finite() {
            return Err(ConfigError::NonFiniteImpute(self.impute));
        }
        self.clip.validate()?;
        Ok(Regex::new(&self.identifier_pattern)?)
    }
}

/// Full configuration for a scoring run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    pub loader: LoaderConfig,
    pub scorer: ScorerConfig,
}

impl ClockConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scorer.validate().map(|_| ())
    }
}
