//! Board state assembly: 64 square labels plus the game context that vision
//! alone cannot see (side to move, castling, en passant, move counters).

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::{
    Bitboard, Board, CastlingMode, Chess, Color, EnPassantMode, Position, PositionError, Setup,
    Square,
};
use tracing::warn;

use crate::labels::SquareGrid;

/// Castling availability, one flag per side and wing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights {
        white_king_side: false,
        white_queen_side: false,
        black_king_side: false,
        black_queen_side: false,
    };

    pub const ALL: CastlingRights = CastlingRights {
        white_king_side: true,
        white_queen_side: true,
        black_king_side: true,
        black_queen_side: true,
    };

    /// Rook-square encoding used by `shakmaty::Setup` in standard castling mode.
    pub fn to_bitboard(self) -> Bitboard {
        let mut bb = Bitboard::EMPTY;
        if self.white_king_side {
            bb |= Bitboard::from_square(Square::H1);
        }
        if self.white_queen_side {
            bb |= Bitboard::from_square(Square::A1);
        }
        if self.black_king_side {
            bb |= Bitboard::from_square(Square::H8);
        }
        if self.black_queen_side {
            bb |= Bitboard::from_square(Square::A8);
        }
        bb
    }

    /// Keep only the rights whose king and rook still stand on their home squares.
    pub fn retain_placed(self, board: &Board) -> Self {
        let home = |color: Color, king: Square, rook: Square| {
            board.piece_at(king) == Some(color.king()) && board.piece_at(rook) == Some(color.rook())
        };
        Self {
            white_king_side: self.white_king_side && home(Color::White, Square::E1, Square::H1),
            white_queen_side: self.white_queen_side && home(Color::White, Square::E1, Square::A1),
            black_king_side: self.black_king_side && home(Color::Black, Square::E8, Square::H8),
            black_queen_side: self.black_queen_side && home(Color::Black, Square::E8, Square::A8),
        }
    }

    pub fn from_bitboard(bb: Bitboard) -> Self {
        Self {
            white_king_side: bb.contains(Square::H1),
            white_queen_side: bb.contains(Square::A1),
            black_king_side: bb.contains(Square::H8),
            black_queen_side: bb.contains(Square::A8),
        }
    }
}

/// The part of a position tracked across cycles rather than read from pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameContext {
    pub turn: Color,
    pub castling: CastlingRights,
    pub ep_square: Option<Square>,
    pub halfmoves: u32,
    pub fullmoves: u32,
}

impl Default for GameContext {
    fn default() -> Self {
        Self {
            turn: Color::White,
            castling: CastlingRights::NONE,
            ep_square: None,
            halfmoves: 0,
            fullmoves: 1,
        }
    }
}

impl GameContext {
    /// Context of the standard initial position (all castling rights available).
    pub fn standard_start() -> Self {
        Self {
            castling: CastlingRights::ALL,
            ..Self::default()
        }
    }

    /// Read the context back out of a legal position.
    pub fn from_position(pos: &Chess) -> Self {
        Self {
            turn: pos.turn(),
            castling: CastlingRights::from_bitboard(pos.castles().castling_rights()),
            ep_square: pos.ep_square(EnPassantMode::Legal),
            halfmoves: pos.halfmoves(),
            fullmoves: pos.fullmoves().get(),
        }
    }

    /// Hold turn and counters for a placement no legal move explains. Castling
    /// rights are cut to what `board` still allows and en passant is cleared.
    pub fn held_for(self, board: &Board) -> Self {
        Self {
            castling: self.castling.retain_placed(board),
            ep_square: None,
            ..self
        }
    }
}

/// A full position: labels from vision plus tracked context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardPosition {
    grid: SquareGrid,
    context: GameContext,
}

impl BoardPosition {
    pub fn grid(&self) -> &SquareGrid {
        &self.grid
    }

    pub fn context(&self) -> &GameContext {
        &self.context
    }

    pub fn board(&self) -> Board {
        self.grid.to_board()
    }

    pub fn to_setup(&self) -> Setup {
        let mut setup = Setup::empty();
        setup.board = self.board();
        setup.turn = self.context.turn;
        setup.castling_rights = self.context.castling.to_bitboard();
        setup.ep_square = self.context.ep_square;
        setup.halfmoves = self.context.halfmoves;
        setup.fullmoves = NonZeroU32::new(self.context.fullmoves).unwrap_or(NonZeroU32::MIN);
        setup
    }

    /// Canonical FEN text of this position.
    pub fn fen(&self) -> String {
        Fen::from_setup(self.to_setup()).to_string()
    }

    /// Interpret as a legal standard-chess position. Castling flags and an en
    /// passant square that do not match the placement are dropped rather than rejected.
    pub fn to_chess(&self) -> Result<Chess, PositionError<Chess>> {
        Fen::from_setup(self.to_setup())
            .into_position::<Chess>(CastlingMode::Standard)
            .or_else(PositionError::ignore_invalid_castling_rights)
            .or_else(PositionError::ignore_invalid_ep_square)
    }
}

/// Combine 64 labels with tracked context into a position.
///
/// King counts outside 0..=1 per color are logged and accepted: a pluggable
/// classifier is allowed to be wrong.
pub fn assemble(grid: SquareGrid, context: GameContext) -> BoardPosition {
    let kings = grid.king_counts();
    if kings.white > 1 || kings.black > 1 {
        warn!(
            white_kings = kings.white,
            black_kings = kings.black,
            "Anomalous king count in classified board"
        );
    }
    BoardPosition { grid, context }
}
