/// Scoring recorded games move by move.
mod common;

use chess_core::pgn::{parse_pgn, played_moves};
use common::*;
use sentinel_worker::features::FeatureLayout;
use sentinel_worker::history::SessionHistory;
use sentinel_worker::replay::replay_game;
use sentinel_worker::stockfish::{EngineAnalysis, Evaluation};
use sentinel_worker::PipelineError;

const GAME: &str = r#"[Event "Club Blitz"]
[White "alice"]
[Black "bob"]
[Result "1-0"]

1. e4 e5 2. Nf3 Nc6 3. Bb5 {Ruy Lopez} a6 1-0"#;

/// Engine that always recommends the move white actually played.
fn engine_agreeing_with_white() -> StubEngine {
    let white_moves = ["e2e4", "g1f3", "f1b5"];
    let black_best = ["c7c5", "d7d6", "g8f6"];
    StubEngine::new(move |_, call| {
        let best = if call % 2 == 0 {
            white_moves[call / 2]
        } else {
            black_best[call / 2]
        };
        Ok(EngineAnalysis {
            best_move: best.to_string(),
            evaluation: Evaluation::Centipawn(25),
        })
    })
}

#[tokio::test]
async fn test_replay_scores_every_move() {
    let game = parse_pgn(GAME).unwrap();
    let mut engine = engine_agreeing_with_white();
    let fens = engine.fens.clone();
    let scorer = constant_scorer(0.7, 4, 0.5);
    let mut history = SessionHistory::new();

    let summary = replay_game(
        &mut engine,
        &scorer,
        FeatureLayout::Extended,
        12,
        &game,
        &mut history,
    )
    .await
    .unwrap();

    assert_eq!(summary.white, "alice");
    assert_eq!(summary.black, "bob");
    assert_eq!(summary.result, "1-0");

    assert_eq!(summary.white_side.moves, 3);
    assert_eq!(summary.black_side.moves, 3);
    assert_eq!(summary.white_side.agreement, 1.0);
    assert_eq!(summary.black_side.agreement, 0.0);
    assert_eq!(summary.white_side.flagged, 3);
    assert!((summary.white_side.mean_score - 0.7).abs() < 1e-12);

    assert_eq!(history.len(), 6);
    let first = &history.records()[0];
    assert_eq!(first.fen, START_FEN);
    assert_eq!(first.inferred_move.as_deref(), Some("e2e4"));
    assert_eq!(first.features[3], 1.0);
    assert_eq!(history.records()[1].features[3], 0.0);

    let expected: Vec<String> = played_moves(&game)
        .unwrap()
        .into_iter()
        .map(|m| m.fen_before)
        .collect();
    assert_eq!(*fens.lock().unwrap(), expected);
}

#[tokio::test]
async fn test_replay_skips_rejected_positions() {
    let game = parse_pgn(GAME).unwrap();
    let mut engine = StubEngine::new(|fen, call| {
        if call == 1 {
            return Err(PipelineError::InvalidPosition {
                fen: fen.to_string(),
                reason: "engine found no legal move".into(),
            });
        }
        Ok(EngineAnalysis {
            best_move: "a2a3".into(),
            evaluation: Evaluation::Centipawn(0),
        })
    });
    let mut history = SessionHistory::new();

    let summary = replay_game(
        &mut engine,
        &constant_scorer(0.1, 1, 0.5),
        FeatureLayout::Eval,
        12,
        &game,
        &mut history,
    )
    .await
    .unwrap();

    assert_eq!(history.len(), 5);
    assert_eq!(summary.black_side.moves, 2);
    assert_eq!(summary.white_side.flagged, 0);
}

#[tokio::test]
async fn test_replay_stops_on_engine_loss() {
    let game = parse_pgn(GAME).unwrap();
    let mut history = SessionHistory::new();

    let err = replay_game(
        &mut StubEngine::unavailable(),
        &constant_scorer(0.1, 1, 0.5),
        FeatureLayout::Eval,
        12,
        &game,
        &mut history,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::EngineUnavailable(_)));
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_replay_rejects_illegal_movetext() {
    let game = parse_pgn("1. e4 e5 2. Ke3 *").unwrap();
    let mut history = SessionHistory::new();

    let err = replay_game(
        &mut StubEngine::fixed("e2e4", Evaluation::Centipawn(0)),
        &constant_scorer(0.1, 1, 0.5),
        FeatureLayout::Eval,
        12,
        &game,
        &mut history,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Pgn(_)));
    assert_eq!(err.component(), "replay");
}
