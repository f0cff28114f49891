// ==============================================================================
// models.rs - Clock Data Models
// ==============================================================================
// Description: Linear clock model, sample feature vectors and beta matrices
// Author: Matt Barham
// Created: 2026-03-02
// Modified: 2026-03-09
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::BuildHasher;
use thiserror::Error;

/// A single sample's observed values keyed by feature identifier (probe ID)
pub type FeatureVector = HashMap<String, f64>;

/// Position of each feature label along the feature axis of a batch
pub type FeatureIndex<'a> = HashMap<&'a str, usize>;

/// Returns true if `label` names the intercept row ("Intercept", "(Intercept)", ...)
pub fn is_intercept_label(label: &str) -> bool {
    label
        .trim()
        .trim_matches(|c| c == '(' || c == ')')
        .eq_ignore_ascii_case("intercept")
}

/// Sparse linear clock: intercept plus one weight per feature identifier
///
/// Immutable once built. The intercept is never stored among the weights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    intercept: f64,
    weights: HashMap<String, f64>,
}

impl Model {
    /// Build a model from an intercept and per-feature weights
    ///
    /// An intercept-named key in `weights` is moved into the intercept,
    /// replacing the `intercept` argument. When several keys spell the
    /// intercept (`Intercept`, `(Intercept)`, ...), the one that sorts last
    /// byte-wise wins, so the result never depends on map iteration order.
    pub fn new(intercept: f64, weights: HashMap<String, f64>) -> Self {
        let mut diverted: Option<(String, f64)> = None;
        let mut clean = HashMap::with_capacity(weights.len());

        for (feature_id, weight) in weights {
            if !is_intercept_label(&feature_id) {
                clean.insert(feature_id, weight);
            } else if diverted.as_ref().map_or(true, |(key, _)| feature_id > *key) {
                diverted = Some((feature_id, weight));
            }
        }

        Self {
            intercept: diverted.map_or(intercept, |(_, weight)| weight),
            weights: clean,
        }
    }

    /// Baseline term added to every prediction
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Feature weights (intercept excluded)
    pub fn weights(&self) -> &HashMap<String, f64> {
        &self.weights
    }

    /// Weight for a single feature, if the model uses it
    pub fn weight(&self, feature_id: &str) -> Option<f64> {
        self.weights.get(feature_id).copied()
    }

    /// Number of features (intercept excluded)
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Feature identifiers in sorted order
    pub fn feature_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.weights.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            features: self.weights.len(),
            intercept: self.intercept,
            abs_weight_sum: self.weights.values().map(|w| w.abs()).sum(),
        }
    }
}

/// Short description of a loaded model for logs and reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub features: usize,
    pub intercept: f64,
    /// Sum of |weight|; the largest possible swing of the raw score on [0,1] inputs
    pub abs_weight_sum: f64,
}

/// Anything a scorer can look feature values up in
pub trait FeatureSource {
    /// Observed value for `feature_id`, or None if the sample does not report it
    fn feature_value(&self, feature_id: &str) -> Option<f64>;
}

impl<S: BuildHasher> FeatureSource for HashMap<String, f64, S> {
    fn feature_value(&self, feature_id: &str) -> Option<f64> {
        self.get(feature_id).copied()
    }
}

/// Errors raised when building a sample batch
#[derive(Error, Debug, PartialEq)]
pub enum BatchError {
    #[error("Batch shape mismatch: {rows} rows x {columns} columns needs {expected} values, got {found}")]
    ShapeMismatch {
        rows: usize,
        columns: usize,
        expected: usize,
        found: usize,
    },
}

/// 2-D table of values with labelled rows and columns (row-major)
///
/// Which axis holds features is not known until the batch is oriented.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    row_labels: Vec<String>,
    column_labels: Vec<String>,
    values: Vec<f64>,
}

impl SampleBatch {
    /// Build a batch from labels and row-major values
    pub fn new(
        row_labels: Vec<String>,
        column_labels: Vec<String>,
        values: Vec<f64>,
    ) -> Result<Self, BatchError> {
        let expected = row_labels.len() * column_labels.len();
        if values.len() != expected {
            return Err(BatchError::ShapeMismatch {
                rows: row_labels.len(),
                columns: column_labels.len(),
                expected,
                found: values.len(),
            });
        }

        Ok(Self {
            row_labels,
            column_labels,
            values,
        })
    }

    /// Build a batch from one Vec per row
    pub fn from_rows(
        row_labels: Vec<String>,
        column_labels: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, BatchError> {
        let columns = column_labels.len();
        if rows.len() != row_labels.len() || rows.iter().any(|r| r.len() != columns) {
            return Err(BatchError::ShapeMismatch {
                rows: row_labels.len(),
                columns,
                expected: row_labels.len() * columns,
                found: rows.iter().map(Vec::len).sum(),
            });
        }

        let values = rows.into_iter().flatten().collect();
        Self::new(row_labels, column_labels, values)
    }

    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    pub fn column_labels(&self) -> &[String] {
        &self.column_labels
    }

    pub fn n_rows(&self) -> usize {
        self.row_labels.len()
    }

    pub fn n_columns(&self) -> usize {
        self.column_labels.len()
    }

    /// Value at (row, column); panics if out of range
    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.values[row * self.column_labels.len() + column]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let width = self.column_labels.len();
        &self.values[row * width..(row + 1) * width]
    }
}

/// Which axis of a batch holds feature identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Rows are features (probes x samples)
    RowsAreFeatures,
    /// Columns are features (samples x probes)
    ColumnsAreFeatures,
}

impl Orientation {
    pub fn feature_labels<'a>(&self, batch: &'a SampleBatch) -> &'a [String] {
        match self {
            Orientation::RowsAreFeatures => batch.row_labels(),
            Orientation::ColumnsAreFeatures => batch.column_labels(),
        }
    }

    pub fn sample_labels<'a>(&self, batch: &'a SampleBatch) -> &'a [String] {
        match self {
            Orientation::RowsAreFeatures => batch.column_labels(),
            Orientation::ColumnsAreFeatures => batch.row_labels(),
        }
    }
}

/// Sample batch with a fixed feature axis
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedBatch {
    batch: SampleBatch,
    orientation: Orientation,
}

impl OrientedBatch {
    /// Fix the orientation of a batch explicitly
    pub fn new(batch: SampleBatch, orientation: Orientation) -> Self {
        Self { batch, orientation }
    }

    pub fn batch(&self) -> &SampleBatch {
        &self.batch
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn sample_labels(&self) -> &[String] {
        self.orientation.sample_labels(&self.batch)
    }

    pub fn feature_labels(&self) -> &[String] {
        self.orientation.feature_labels(&self.batch)
    }

    pub fn n_samples(&self) -> usize {
        self.sample_labels().len()
    }

    /// Map feature label -> position on the feature axis (last duplicate wins)
    pub fn feature_index(&self) -> FeatureIndex<'_> {
        feature_index(self.feature_labels())
    }

    /// View of one sample for scoring
    pub fn sample<'a>(&'a self, index: &'a FeatureIndex<'a>, sample: usize) -> SampleView<'a> {
        SampleView::new(&self.batch, index, self.orientation, sample)
    }

    pub fn into_inner(self) -> SampleBatch {
        self.batch
    }
}

/// Map each label to its position (last duplicate wins)
pub fn feature_index(labels: &[String]) -> FeatureIndex<'_> {
    labels
        .iter()
        .enumerate()
        .map(|(pos, label)| (label.as_str(), pos))
        .collect()
}

/// One sample of an oriented batch, read in place
#[derive(Debug, Clone, Copy)]
pub struct SampleView<'a> {
    batch: &'a SampleBatch,
    index: &'a FeatureIndex<'a>,
    orientation: Orientation,
    sample: usize,
}

impl<'a> SampleView<'a> {
    pub fn new(
        batch: &'a SampleBatch,
        index: &'a FeatureIndex<'a>,
        orientation: Orientation,
        sample: usize,
    ) -> Self {
        Self {
            batch,
            index,
            orientation,
            sample,
        }
    }
}

impl FeatureSource for SampleView<'_> {
    fn feature_value(&self, feature_id: &str) -> Option<f64> {
        let pos = *self.index.get(feature_id)?;
        Some(match self.orientation {
            Orientation::RowsAreFeatures => self.batch.get(pos, self.sample),
            Orientation::ColumnsAreFeatures => self.batch.get(self.sample, pos),
        })
    }
}

/// Scoring input, resolved to one unambiguous shape
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Single(FeatureVector),
    Batch(OrientedBatch),
}

/// Predicted age(s): one value, or one per sample in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Prediction {
    Single(f64),
    Batch(Vec<f64>),
}

impl Prediction {
    pub fn values(&self) -> &[f64] {
        match self {
            Prediction::Single(value) => std::slice::from_ref(value),
            Prediction::Batch(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

/// Labelled prediction row for reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePrediction {
    pub sample_id: String,
    pub predicted_age: f64,
    /// Model features the sample reported with a non-missing value
    pub coverage: usize,
}
