// ==============================================================================
// scorer.rs - Epigenetic Clock Scorer
// ==============================================================================
// Description: Applies a linear clock to single samples and beta matrices
// Author: Matt Barham
// Created: 2026-03-05
// Modified: 2026-03-09
// Version: 1.0.0
// ==============================================================================
// Prediction = clip(intercept + sum_{f in model} weight_f * beta_f)
//   - the sum runs over the model's features, never the sample's
//   - missing, NaN or infinite betas are replaced by the impute value
//   - sample features unknown to the model are ignored
// ==============================================================================

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, ScorerConfig};
use crate::models::{
    feature_index, FeatureSource, Input, Model, Orientation, OrientedBatch, Prediction,
    SampleBatch, SamplePrediction, SampleView,
};

/// Errors that abort a scoring call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("Model has no feature weights")]
    EmptyModel,

    #[error(
        "Cannot tell which axis holds probe IDs (row labels match: {rows_match}, column labels match: {columns_match})"
    )]
    AmbiguousOrientation { rows_match: bool, columns_match: bool },
}

/// Score of one sample with diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleScore {
    /// Unclipped weighted sum
    pub raw: f64,
    /// Clipped prediction
    pub predicted: f64,
    /// Model features the sample reported with a finite value
    pub coverage: usize,
}

/// Unclipped clock value for one sample
pub fn raw_score<S: FeatureSource + ?Sized>(model: &Model, sample: &S, impute: f64) -> f64 {
    model
        .weights()
        .iter()
        .fold(model.intercept(), |acc, (feature_id, weight)| {
            let value = sample
                .feature_value(feature_id)
                .filter(|v| v.is_finite())
                .unwrap_or(impute);
            acc + weight * value
        })
}

/// Decide which axis of `batch` holds feature identifiers
///
/// An axis matches when any of its labels matches `pattern`. Exactly one
/// axis must match.
pub fn resolve_orientation(batch: &SampleBatch, pattern: &Regex) -> Result<Orientation, ScoreError> {
    let rows_match = batch.row_labels().iter().any(|l| pattern.is_match(l));
    let columns_match = batch.column_labels().iter().any(|l| pattern.is_match(l));

    match (rows_match, columns_match) {
        (true, false) => Ok(Orientation::RowsAreFeatures),
        (false, true) => Ok(Orientation::ColumnsAreFeatures),
        _ => Err(ScoreError::AmbiguousOrientation {
            rows_match,
            columns_match,
        }),
    }
}

/// Linear clock bound to a model and scoring parameters
///
/// Cheap to clone; the model is shared.
#[derive(Debug, Clone)]
pub struct ClockScorer {
    model: Arc<Model>,
    config: ScorerConfig,
    identifier_pattern: Regex,
}

impl ClockScorer {
    /// Create a scorer; fails if the configuration is invalid
    pub fn new(model: impl Into<Arc<Model>>, config: ScorerConfig) -> Result<Self, ConfigError> {
        let identifier_pattern = config.validate()?;
        Ok(Self {
            model: model.into(),
            config,
            identifier_pattern,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Predicted age for one sample, using the configured impute value
    pub fn score_one<S: FeatureSource + ?Sized>(&self, sample: &S) -> f64 {
        self.score_one_with(sample, self.config.impute)
    }

    /// Predicted age for one sample with an explicit impute value
    pub fn score_one_with<S: FeatureSource + ?Sized>(&self, sample: &S, impute: f64) -> f64 {
        self.config.clip.apply(raw_score(&self.model, sample, impute))
    }

    /// Prediction plus raw sum and coverage
    pub fn score_one_detailed<S: FeatureSource + ?Sized>(&self, sample: &S) -> SampleScore {
        self.score_one_detailed_with(sample, self.config.impute)
    }

    /// Prediction plus raw sum and coverage with an explicit impute value
    pub fn score_one_detailed_with<S: FeatureSource + ?Sized>(
        &self,
        sample: &S,
        impute: f64,
    ) -> SampleScore {
        let raw = raw_score(&self.model, sample, impute);
        SampleScore {
            raw,
            predicted: self.config.clip.apply(raw),
            coverage: self.coverage(sample),
        }
    }

    /// Number of model features the sample reports with a finite value
    pub fn coverage<S: FeatureSource + ?Sized>(&self, sample: &S) -> usize {
        self.model
            .weights()
            .keys()
            .filter(|id| sample.feature_value(id).map_or(false, |v| v.is_finite()))
            .count()
    }

    /// Orientation of `batch` under the configured identifier pattern
    pub fn resolve_orientation(&self, batch: &SampleBatch) -> Result<Orientation, ScoreError> {
        let orientation = resolve_orientation(batch, &self.identifier_pattern)?;
        debug!(
            "Batch {}x{} resolved as {:?}",
            batch.n_rows(),
            batch.n_columns(),
            orientation
        );
        Ok(orientation)
    }

    /// Fix the feature axis of a batch
    pub fn orient(&self, batch: SampleBatch) -> Result<OrientedBatch, ScoreError> {
        let orientation = self.resolve_orientation(&batch)?;
        Ok(OrientedBatch::new(batch, orientation))
    }

    /// Resolve a raw batch into a scoring input
    pub fn batch_input(&self, batch: SampleBatch) -> Result<Input, ScoreError> {
        Ok(Input::Batch(self.orient(batch)?))
    }

    /// Predicted ages for every sample of a batch, in sample-axis order
    ///
    /// Fails without partial results if the orientation is ambiguous.
    pub fn score_many(&self, batch: &SampleBatch) -> Result<Vec<f64>, ScoreError> {
        self.score_many_with(batch, self.config.impute)
    }

    /// `score_many` with an explicit impute value
    pub fn score_many_with(&self, batch: &SampleBatch, impute: f64) -> Result<Vec<f64>, ScoreError> {
        let orientation = self.resolve_orientation(batch)?;
        Ok(self
            .score_batch(batch, orientation, impute)
            .into_iter()
            .map(|s| s.predicted)
            .collect())
    }

    /// Predicted ages for an already oriented batch
    pub fn score_oriented(&self, batch: &OrientedBatch) -> Vec<f64> {
        self.score_oriented_detailed(batch)
            .into_iter()
            .map(|s| s.predicted)
            .collect()
    }

    /// Per-sample scores with diagnostics, in sample-axis order
    pub fn score_oriented_detailed(&self, batch: &OrientedBatch) -> Vec<SampleScore> {
        self.score_batch(batch.batch(), batch.orientation(), self.config.impute)
    }

    fn score_batch(
        &self,
        batch: &SampleBatch,
        orientation: Orientation,
        impute: f64,
    ) -> Vec<SampleScore> {
        let index = feature_index(orientation.feature_labels(batch));
        let n_samples = orientation.sample_labels(batch).len();

        self.map_samples(n_samples, |sample| {
            self.score_one_detailed_with(&SampleView::new(batch, &index, orientation, sample), impute)
        })
    }

    /// Labelled predictions for an oriented batch
    pub fn predict_labelled(&self, batch: &OrientedBatch) -> Vec<SamplePrediction> {
        batch
            .sample_labels()
            .iter()
            .zip(self.score_oriented_detailed(batch))
            .map(|(label, score)| SamplePrediction {
                sample_id: label.clone(),
                predicted_age: score.predicted,
                coverage: score.coverage,
            })
            .collect()
    }

    /// Score any input shape
    ///
    /// Fails with `EmptyModel` if the model has no feature weights.
    pub fn score(&self, input: &Input) -> Result<Prediction, ScoreError> {
        self.ensure_weights()?;

        Ok(match input {
            Input::Single(vector) => Prediction::Single(self.score_one(vector)),
            Input::Batch(batch) => Prediction::Batch(self.score_oriented(batch)),
        })
    }

    /// Score any input shape, keeping per-sample diagnostics
    pub fn score_detailed(&self, input: &Input) -> Result<Vec<SampleScore>, ScoreError> {
        self.ensure_weights()?;

        Ok(match input {
            Input::Single(vector) => vec![self.score_one_detailed(vector)],
            Input::Batch(batch) => self.score_oriented_detailed(batch),
        })
    }

    fn ensure_weights(&self) -> Result<(), ScoreError> {
        if self.model.is_empty() {
            return Err(ScoreError::EmptyModel);
        }
        Ok(())
    }

    /// Map over sample positions; results stay in position order
    fn map_samples<F>(&self, n_samples: usize, score: F) -> Vec<SampleScore>
    where
        F: Fn(usize) -> SampleScore + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            let threshold = self.config.parallel_threshold;
            if threshold > 0 && n_samples >= threshold {
                use rayon::prelude::*;
                debug!("Scoring {} samples in parallel", n_samples);
                return (0..n_samples).into_par_iter().map(score).collect();
            }
        }

        (0..n_samples).map(score).collect()
    }
}
