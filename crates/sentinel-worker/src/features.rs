//! Feature extraction for the suspicion model.
//!
//! Pure and deterministic: the same inputs always give a bit-identical vector.
//! Layouts are fixed in length and order.
//!
//! | layout     | index | feature                                   |
//! |------------|-------|-------------------------------------------|
//! | `eval`     | 0     | normalized evaluation                     |
//! | `extended` | 0     | normalized evaluation                     |
//! |            | 1     | material balance, side to move            |
//! |            | 2     | mobility (legal moves / 218)              |
//! |            | 3     | agreement of the played move with the engine |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::{Board, CastlingMode, Chess, Color, Position, Role};

use crate::stockfish::{EngineAnalysis, Evaluation};

/// Most legal moves any reachable position has.
const MAX_LEGAL_MOVES: f64 = 218.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureLayout {
    #[default]
    Eval,
    Extended,
}

impl FeatureLayout {
    pub fn len(self) -> usize {
        self.names().len()
    }

    pub fn names(self) -> &'static [&'static str] {
        match self {
            FeatureLayout::Eval => &["normalized_eval"],
            FeatureLayout::Extended => &[
                "normalized_eval",
                "material_balance",
                "mobility",
                "best_move_agreement",
            ],
        }
    }
}

impl FromStr for FeatureLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eval" => Ok(FeatureLayout::Eval),
            "extended" => Ok(FeatureLayout::Extended),
            other => Err(format!("unknown feature layout '{other}'")),
        }
    }
}

impl fmt::Display for FeatureLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureLayout::Eval => f.write_str("eval"),
            FeatureLayout::Extended => f.write_str("extended"),
        }
    }
}

/// Everything one feature vector is computed from.
#[derive(Debug, Clone, Copy)]
pub struct FeatureInput<'a> {
    pub fen: &'a str,
    pub analysis: &'a EngineAnalysis,
    /// Whether the move actually played from the previous position matched
    /// the engine's recommendation there. `None` when unknown.
    pub move_agreement: Option<bool>,
}

/// Centipawns through `tanh(cp / 100)`; mate scores saturate to +-1 by sign.
/// Mate 0 means the side to move is already mated.
pub fn normalize_evaluation(eval: &Evaluation) -> f64 {
    match *eval {
        Evaluation::Centipawn(cp) => (cp as f64 / 100.0).tanh(),
        Evaluation::Mate(n) if n > 0 => 1.0,
        Evaluation::Mate(_) => -1.0,
    }
}

pub fn extract(layout: FeatureLayout, input: &FeatureInput<'_>) -> Vec<f64> {
    let eval = normalize_evaluation(&input.analysis.evaluation);
    match layout {
        FeatureLayout::Eval => vec![eval],
        FeatureLayout::Extended => {
            let (material, mobility) = board_features(input.fen);
            let agreement = match input.move_agreement {
                Some(true) => 1.0,
                Some(false) => 0.0,
                None => 0.5,
            };
            vec![eval, material, mobility, agreement]
        }
    }
}

/// Material balance and mobility, both zero for an unreadable FEN.
fn board_features(fen: &str) -> (f64, f64) {
    let Ok(parsed) = fen.parse::<Fen>() else {
        return (0.0, 0.0);
    };
    let setup = parsed.as_setup();
    let material = material_balance(&setup.board, setup.turn);

    let mobility = parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map(|pos| pos.legal_moves().len() as f64 / MAX_LEGAL_MOVES)
        .unwrap_or(0.0);

    (material, mobility)
}

fn material_balance(board: &Board, turn: Color) -> f64 {
    let mut diff = 0i32;
    for sq in board.occupied() {
        let Some(piece) = board.piece_at(sq) else {
            continue;
        };
        let value = match piece.role {
            Role::Pawn => 1,
            Role::Knight | Role::Bishop => 3,
            Role::Rook => 5,
            Role::Queen => 9,
            Role::King => 0,
        };
        if piece.color == turn {
            diff += value;
        } else {
            diff -= value;
        }
    }
    (diff as f64 / 10.0).tanh()
}
