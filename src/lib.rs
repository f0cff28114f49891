// ==============================================================================
// lib.rs - Epigenetic Clock Library
// ==============================================================================
// Description: Library interface for linear epigenetic clock scoring
// Author: Matt Barham
// Created: 2026-03-02
// Modified: 2026-03-09
// Version: 1.0.0
// ==============================================================================

pub mod config;
pub mod models;
pub mod output;
pub mod parsers;
pub mod scorer;

pub use config::{ClipRange, ClockConfig, ConfigError, LoaderConfig, ScorerConfig};
pub use models::{
    FeatureSource, FeatureVector, Input, Model, Orientation, OrientedBatch, Prediction,
    SampleBatch, SamplePrediction,
};
pub use parsers::{BetaMatrixReader, CoefficientParser, ModelLoadError};
pub use scorer::{ClockScorer, SampleScore, ScoreError};
