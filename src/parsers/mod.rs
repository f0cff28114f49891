// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for clock coefficient tables and methylation beta files
// Author: Matt Barham
// Created: 2026-03-02
// Modified: 2026-03-06
// Version: 1.0.0
// ==============================================================================

pub mod betas;
pub mod coefficients;
pub mod columns;

pub use betas::{BetaMatrixReader, BetaParseError};
pub use coefficients::{load_model, model_digest, CoefficientParser, ModelLoadError, WeightParsePolicy};
pub use columns::{find_column, ColumnMatch, MatchRule};
