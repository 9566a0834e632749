use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMetadata {
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub date: Option<String>,
    pub event: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    pub metadata: GameMetadata,
    /// FEN the movetext starts from (`[SetUp "1"]` games), standard start otherwise.
    pub start_fen: Option<String>,
    pub moves: Vec<String>, // SAN notation
}

/// One played move of a replayed game, with the position it was played from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedMove {
    /// 0-based half-move index in the game.
    pub ply: usize,
    pub fen_before: String,
    pub san: String,
    pub uci: String,
    pub white_to_move: bool,
}
