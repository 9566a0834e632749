//! PGN parsing utilities: a lightweight regex-based parser.
//!
//! Historical games (from the game-history fetcher or a local file) enter the
//! pipeline here and are expanded into the positions each move was played from.

use regex::Regex;
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{CastlingMode, Chess, Position};
use thiserror::Error;

use crate::game_data::{GameData, GameMetadata, PlayedMove};
use crate::labels::SquareGrid;
use crate::position::{assemble, GameContext};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PgnError {
    #[error("PGN contains no moves")]
    NoMoves,

    #[error("Invalid FEN header '{0}'")]
    InvalidFen(String),

    #[error("Invalid SAN '{san}' at ply {ply}")]
    InvalidSan { san: String, ply: usize },

    #[error("Illegal move '{san}' at ply {ply}")]
    IllegalMove { san: String, ply: usize },
}

/// Parse a PGN string into a GameData struct.
pub fn parse_pgn(pgn: &str) -> Result<GameData, PgnError> {
    let header_re = header_regex();

    let mut white = "Unknown".to_string();
    let mut black = "Unknown".to_string();
    let mut result = "*".to_string();
    let mut date = None;
    let mut event = None;
    let mut setup = None;
    let mut fen = None;

    for cap in header_re.captures_iter(pgn) {
        let key = &cap[1];
        let value = cap[2].to_string();
        match key {
            "White" => white = value,
            "Black" => black = value,
            "Result" => result = value,
            "Date" => date = Some(value),
            "Event" => event = Some(value),
            "SetUp" => setup = Some(value),
            "FEN" => fen = Some(value),
            _ => {}
        }
    }

    // FEN header only counts together with SetUp "1"
    let start_fen = if setup.as_deref() == Some("1") { fen } else { None };

    let moves = extract_moves(pgn);
    if moves.is_empty() {
        return Err(PgnError::NoMoves);
    }

    Ok(GameData {
        metadata: GameMetadata {
            white,
            black,
            result,
            date,
            event,
        },
        start_fen,
        moves,
    })
}

/// Replay the SAN moves and return every move with the FEN it was played from.
pub fn played_moves(game: &GameData) -> Result<Vec<PlayedMove>, PgnError> {
    let mut pos = match &game.start_fen {
        Some(text) => text
            .parse::<Fen>()
            .ok()
            .and_then(|fen| fen.into_position::<Chess>(CastlingMode::Standard).ok())
            .ok_or_else(|| PgnError::InvalidFen(text.clone()))?,
        None => Chess::default(),
    };

    let mut played = Vec::with_capacity(game.moves.len());
    for (ply, san_str) in game.moves.iter().enumerate() {
        let san: San = san_str.parse().map_err(|_| PgnError::InvalidSan {
            san: san_str.clone(),
            ply,
        })?;
        let mv = san.to_move(&pos).map_err(|_| PgnError::IllegalMove {
            san: san_str.clone(),
            ply,
        })?;

        played.push(PlayedMove {
            ply,
            fen_before: fen_of(&pos),
            san: san_str.clone(),
            uci: mv.to_uci(CastlingMode::Standard).to_string(),
            white_to_move: pos.turn().is_white(),
        });
        pos.play_unchecked(&mv);
    }

    Ok(played)
}

fn fen_of(pos: &Chess) -> String {
    assemble(SquareGrid::from_board(pos.board()), GameContext::from_position(pos)).fen()
}

fn header_regex() -> Regex {
    Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("static header regex")
}

/// Extract SAN moves from PGN text (after removing headers, comments, variations).
fn extract_moves(pgn: &str) -> Vec<String> {
    let header_re = Regex::new(r"\[[^\]]*\]").expect("static regex");
    let no_headers = header_re.replace_all(pgn, "");

    let comment_re = Regex::new(r"\{[^}]*\}").expect("static regex");
    let no_comments = comment_re.replace_all(&no_headers, "");

    let variation_re = Regex::new(r"\([^)]*\)").expect("static regex");
    let no_variations = variation_re.replace_all(&no_comments, "");

    let move_re =
        Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O|O-O")
            .expect("static regex");

    move_re
        .find_iter(&no_variations)
        .map(|m| m.as_str().to_string())
        .collect()
}
