// ==============================================================================
// clock_pipeline_tests.rs - End-to-End Clock Tests
// ==============================================================================
// Description: Coefficient file -> model -> beta matrix -> predictions -> output
// Author: Matt Barham
// Created: 2026-03-07
// Modified: 2026-03-09
// Version: 1.0.0
// ==============================================================================

use epigenetic_clock::output::{write_csv, write_json, ClockOutput, RunMetadata};
use epigenetic_clock::parsers::{model_digest, BetaMatrixReader, CoefficientParser};
use epigenetic_clock::{
    ClockScorer, Input, LoaderConfig, Orientation, Prediction, ScoreError, ScorerConfig,
};
use std::io::Write;
use tempfile::{Builder, NamedTempFile};

const COEFFICIENTS: &str = "\
Additional file 3: Coefficient values of the DNAm age predictor
,,,
CpGmarker,CoefficientTraining,CoefficientTrainingShrunk,medianByCpG
(Intercept),20.0,0.1,
cg00000001,40.0,0.2,0.5
cg00000002,-20.0,0.3,0.25
cg00000003,not_available,0.4,0.8
cg00000004,10.0,0.5,NA
";

fn create_test_file(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn load_scorer() -> (ClockScorer, NamedTempFile) {
    let file = create_test_file(COEFFICIENTS, ".csv");
    let mut parser = CoefficientParser::from_config(&LoaderConfig::for_path(file.path()));
    let model = parser.parse(file.path()).unwrap();

    assert_eq!(parser.skipped_count, 1);
    assert_eq!(model.intercept(), 20.0);
    assert_eq!(model.len(), 3);

    (ClockScorer::new(model, ScorerConfig::default()).unwrap(), file)
}

#[test]
fn test_probes_by_samples_matrix() {
    let (scorer, _coef) = load_scorer();
    let betas = create_test_file(
        "ID_REF,S1,S2,S3\n\
         cg00000001,0.5,1.0,0.0\n\
         cg00000002,0.5,0.0,1.0\n\
         cg00000004,NA,1.0,0.0\n\
         cg99999999,0.9,0.9,0.9\n",
        ".csv",
    );

    let batch = BetaMatrixReader::new().read(betas.path()).unwrap();
    let oriented = scorer.orient(batch).unwrap();
    assert_eq!(oriented.orientation(), Orientation::RowsAreFeatures);

    let predictions = scorer.predict_labelled(&oriented);
    let ids: Vec<&str> = predictions.iter().map(|p| p.sample_id.as_str()).collect();
    assert_eq!(ids, vec!["S1", "S2", "S3"]);

    // S1: 20 + 40*0.5 - 20*0.5 + 10*0.5 (imputed) = 35
    assert!((predictions[0].predicted_age - 35.0).abs() < 1e-9);
    assert_eq!(predictions[0].coverage, 2);
    // S2: 20 + 40 - 0 + 10 = 70
    assert!((predictions[1].predicted_age - 70.0).abs() < 1e-9);
    // S3: 20 + 0 - 20 + 0 = 0
    assert!((predictions[2].predicted_age - 0.0).abs() < 1e-9);
}

#[test]
fn test_samples_by_probes_tsv() {
    let (scorer, _coef) = load_scorer();
    let betas = create_test_file(
        "sample\tcg00000001\tcg00000002\tcg00000004\n\
         S1\t0.5\t0.5\t0.5\n\
         S2\t1.0\t0.0\t1.0\n",
        ".tsv",
    );

    let batch = BetaMatrixReader::new().read(betas.path()).unwrap();
    let ages = scorer.score_many(&batch).unwrap();
    assert_eq!(ages.len(), 2);
    assert!((ages[0] - 35.0).abs() < 1e-9);
    assert!((ages[1] - 70.0).abs() < 1e-9);
}

#[test]
fn test_ambiguous_matrix_aborts_whole_batch() {
    let (scorer, _coef) = load_scorer();
    let betas = create_test_file("gene,S1,S2\nELOVL2,0.5,0.6\nFHL2,0.1,0.2\n", ".csv");

    let batch = BetaMatrixReader::new().read(betas.path()).unwrap();
    assert!(matches!(
        scorer.score_many(&batch),
        Err(ScoreError::AmbiguousOrientation { .. })
    ));
}

#[test]
fn test_score_median_column_from_coefficient_file() {
    let (scorer, coef) = load_scorer();

    let vector = BetaMatrixReader::new()
        .with_header_skip_lines(2)
        .read_column(coef.path(), "medianByCpG")
        .unwrap();

    // cg00000003 has a median but no usable weight; cg00000004 median is NA
    let prediction = scorer.score(&Input::Single(vector)).unwrap();
    // 20 + 40*0.5 - 20*0.25 + 10*0.5 (imputed) = 40
    match prediction {
        Prediction::Single(age) => assert!((age - 40.0).abs() < 1e-9),
        other => panic!("expected single prediction, got {:?}", other),
    }
}

#[test]
fn test_output_round_trip() {
    let (scorer, coef) = load_scorer();
    let betas = create_test_file("ID_REF,S1\ncg00000001,0.5\n", ".csv");

    let batch = BetaMatrixReader::new().read(betas.path()).unwrap();
    let oriented = scorer.orient(batch).unwrap();
    let output = ClockOutput {
        metadata: RunMetadata::new(
            coef.path(),
            model_digest(coef.path()).unwrap(),
            scorer.model(),
            scorer.config(),
        ),
        predictions: scorer.predict_labelled(&oriented),
    };

    let mut csv = Vec::new();
    write_csv(&mut csv, &output.predictions).unwrap();
    assert!(String::from_utf8(csv).unwrap().starts_with("sample_id,predicted_age,coverage\nS1,"));

    let mut json = Vec::new();
    write_json(&mut json, &output).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value["metadata"]["features"], 3);
    assert_eq!(value["predictions"][0]["sample_id"], "S1");
}

#[test]
fn test_infinite_betas_give_finite_prediction() {
    let (scorer, _coef) = load_scorer();
    let betas = create_test_file(
        "ID_REF,S1\ncg00000001,inf\ncg00000002,-inf\ncg00000004,0.5\n",
        ".csv",
    );

    let mut reader = BetaMatrixReader::new();
    let batch = reader.read(betas.path()).unwrap();
    assert_eq!(reader.missing_count, 2);

    // 20 + 40*0.5 (imputed) - 20*0.5 (imputed) + 10*0.5 = 35
    let ages = scorer.score_many(&batch).unwrap();
    assert!(ages[0].is_finite());
    assert!((ages[0] - 35.0).abs() < 1e-9);
}
