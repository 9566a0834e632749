/// Feature extraction and suspicion scoring properties.
mod common;

use std::io::Write;

use common::*;
use sentinel_worker::features::{extract, normalize_evaluation, FeatureInput, FeatureLayout};
use sentinel_worker::scorer::{verdict, SuspicionScorer};
use sentinel_worker::stockfish::{EngineAnalysis, Evaluation};
use sentinel_worker::PipelineError;

const MIDDLEGAME: &str = "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";

#[test]
fn test_extraction_is_bit_identical_across_calls() {
    let analysis = EngineAnalysis {
        best_move: "e1g1".into(),
        evaluation: Evaluation::Centipawn(37),
    };
    for layout in [FeatureLayout::Eval, FeatureLayout::Extended] {
        for agreement in [None, Some(true), Some(false)] {
            let input = FeatureInput {
                fen: MIDDLEGAME,
                analysis: &analysis,
                move_agreement: agreement,
            };
            let first = extract(layout, &input);
            assert_eq!(first.len(), layout.len());
            for _ in 0..10 {
                let again = extract(layout, &input);
                let same = first
                    .iter()
                    .zip(&again)
                    .all(|(a, b)| a.to_bits() == b.to_bits());
                assert!(same, "{layout} changed between calls");
            }
        }
    }
}

#[test]
fn test_centipawn_normalization_is_strictly_monotonic() {
    let samples: Vec<i32> = (-1500..=1500).step_by(7).collect();
    for pair in samples.windows(2) {
        let lo = normalize_evaluation(&Evaluation::Centipawn(pair[0]));
        let hi = normalize_evaluation(&Evaluation::Centipawn(pair[1]));
        assert!(lo < hi, "{} -> {lo} vs {} -> {hi}", pair[0], pair[1]);
    }
    assert_eq!(normalize_evaluation(&Evaluation::Centipawn(0)), 0.0);
}

#[test]
fn test_mate_saturates_regardless_of_distance() {
    for n in [1, 2, 7, 40, 250] {
        assert_eq!(normalize_evaluation(&Evaluation::Mate(n)), 1.0);
        assert_eq!(normalize_evaluation(&Evaluation::Mate(-n)), -1.0);
    }
    // a centipawn score never reaches the mate boundary
    assert!(normalize_evaluation(&Evaluation::Centipawn(300)) < 1.0);
    assert!(normalize_evaluation(&Evaluation::Centipawn(-300)) > -1.0);
}

#[test]
fn test_extended_layout_describes_the_board() {
    let analysis = EngineAnalysis {
        best_move: "e2e4".into(),
        evaluation: Evaluation::Centipawn(20),
    };
    let v = extract(
        FeatureLayout::Extended,
        &FeatureInput {
            fen: START_FEN,
            analysis: &analysis,
            move_agreement: Some(true),
        },
    );
    assert_eq!(v.len(), 4);
    assert_eq!(v[1], 0.0);
    assert_eq!(v[2], 20.0 / 218.0);
    assert_eq!(v[3], 1.0);
}

#[test]
fn test_verdict_boundary() {
    assert!(!verdict(0.5, 0.5));
    assert!(verdict(0.500001, 0.5));
    assert!(!verdict(0.0, 0.0));
    assert!(verdict(1.0, 0.999));
    assert!(!verdict(1.0, 1.0));

    let at = constant_scorer(0.5, 1, 0.5).assess(&[0.2]).unwrap();
    assert!(!at.verdict);
    let above = constant_scorer(0.9, 1, 0.5).assess(&[0.2]).unwrap();
    assert!(above.verdict);
}

#[test]
fn test_scorer_rejects_wrong_width() {
    let scorer = constant_scorer(0.9, 1, 0.5);
    let err = scorer.assess(&[0.1, 0.2, 0.3, 0.4]).unwrap_err();
    assert!(matches!(err, PipelineError::DimensionMismatch { expected: 1, got: 4 }));
    assert!(err.is_fatal());
}

#[test]
fn test_model_artifact_round_trips_through_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    // single sigmoid unit: sigmoid(4x - 1)
    write!(
        file,
        r#"{{"input_dim": 1, "layers": [{{"weights": [[4.0]], "biases": [-1.0], "activation": "sigmoid"}}]}}"#
    )
    .unwrap();

    let scorer = SuspicionScorer::load(file.path(), 0.5).unwrap();
    assert_eq!(scorer.input_dim(), 1);

    let low = scorer.assess(&[0.0]).unwrap();
    assert!((low.score - 1.0 / (1.0 + 1f64.exp())).abs() < 1e-12);
    assert!(!low.verdict);

    let high = scorer.assess(&[0.2f64.tanh() * 5.0]).unwrap();
    assert!(high.verdict);
}

#[test]
fn test_malformed_model_is_model_load_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"input_dim": 1, "layers": []}}"#).unwrap();
    let err = SuspicionScorer::load(file.path(), 0.5).err().unwrap();
    assert!(matches!(err, PipelineError::ModelLoad(ref m) if m.contains("no layers")));
}
