//! Score a recorded game: every position a move was played from is analyzed
//! and scored, with the player's actual move as history context.

use chess_core::game_data::GameData;
use chess_core::pgn::played_moves;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::features::{extract, FeatureInput, FeatureLayout};
use crate::history::{CycleRecord, SessionHistory};
use crate::scorer::SuspicionScorer;
use crate::stockfish::PositionAnalyzer;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SideSummary {
    pub moves: usize,
    pub flagged: usize,
    /// Share of moves that matched the engine's best move.
    pub agreement: f64,
    pub mean_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub white: String,
    pub black: String,
    pub result: String,
    pub white_side: SideSummary,
    pub black_side: SideSummary,
}

/// Analyze and score every played move of `game`, appending one record per
/// move to `history`. Positions the engine rejects are skipped.
pub async fn replay_game<A: PositionAnalyzer>(
    engine: &mut A,
    scorer: &SuspicionScorer,
    layout: FeatureLayout,
    depth: u32,
    game: &GameData,
    history: &mut SessionHistory,
) -> Result<ReplaySummary, PipelineError> {
    let moves = played_moves(game)?;
    info!(
        white = %game.metadata.white,
        black = %game.metadata.black,
        plies = moves.len(),
        "Replaying game"
    );

    let mut acc = [Accumulator::default(), Accumulator::default()];
    for played in &moves {
        let analysis = match engine.analyze(&played.fen_before, depth).await {
            Ok(a) => a,
            Err(e) if !e.is_fatal() => {
                warn!(ply = played.ply, error = %e, "Skipping position");
                continue;
            }
            Err(e) => return Err(e),
        };

        let agrees = played.uci == analysis.best_move;
        let features = extract(
            layout,
            &FeatureInput {
                fen: &played.fen_before,
                analysis: &analysis,
                move_agreement: Some(agrees),
            },
        );
        let assessment = scorer.assess(&features)?;

        let side = if played.white_to_move { 0 } else { 1 };
        acc[side].add(assessment.score, assessment.verdict, agrees);

        history.append(CycleRecord {
            cycle: played.ply as u64,
            timestamp: Utc::now(),
            fen: played.fen_before.clone(),
            best_move: analysis.best_move,
            evaluation: analysis.evaluation,
            features,
            score: assessment.score,
            verdict: assessment.verdict,
            inferred_move: Some(played.uci.clone()),
            uncertain: false,
        });
    }

    let [white_acc, black_acc] = acc;
    Ok(ReplaySummary {
        white: game.metadata.white.clone(),
        black: game.metadata.black.clone(),
        result: game.metadata.result.clone(),
        white_side: white_acc.finish(),
        black_side: black_acc.finish(),
    })
}

#[derive(Default)]
struct Accumulator {
    moves: usize,
    flagged: usize,
    agreed: usize,
    score_sum: f64,
}

impl Accumulator {
    fn add(&mut self, score: f64, verdict: bool, agrees: bool) {
        self.moves += 1;
        self.score_sum += score;
        if verdict {
            self.flagged += 1;
        }
        if agrees {
            self.agreed += 1;
        }
    }

    fn finish(self) -> SideSummary {
        if self.moves == 0 {
            return SideSummary::default();
        }
        let n = self.moves as f64;
        SideSummary {
            moves: self.moves,
            flagged: self.flagged,
            agreement: self.agreed as f64 / n,
            mean_score: self.score_sum / n,
        }
    }
}
