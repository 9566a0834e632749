//! Per-square occupancy labels and the 8x8 grid they are collected into.

use serde::{Deserialize, Serialize};
use shakmaty::{Board, ByColor, Color, File, Piece, Rank, Role, Square};

/// What a classifier saw on one square: empty, or one of the 12 colored pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SquareLabel {
    #[default]
    Empty,
    WhitePawn,
    WhiteKnight,
    WhiteBishop,
    WhiteRook,
    WhiteQueen,
    WhiteKing,
    BlackPawn,
    BlackKnight,
    BlackBishop,
    BlackRook,
    BlackQueen,
    BlackKing,
}

impl SquareLabel {
    pub const ALL: [SquareLabel; 13] = [
        SquareLabel::Empty,
        SquareLabel::WhitePawn,
        SquareLabel::WhiteKnight,
        SquareLabel::WhiteBishop,
        SquareLabel::WhiteRook,
        SquareLabel::WhiteQueen,
        SquareLabel::WhiteKing,
        SquareLabel::BlackPawn,
        SquareLabel::BlackKnight,
        SquareLabel::BlackBishop,
        SquareLabel::BlackRook,
        SquareLabel::BlackQueen,
        SquareLabel::BlackKing,
    ];

    /// The piece this label stands for, `None` for an empty square.
    pub fn piece(self) -> Option<Piece> {
        let (color, role) = match self {
            SquareLabel::Empty => return None,
            SquareLabel::WhitePawn => (Color::White, Role::Pawn),
            SquareLabel::WhiteKnight => (Color::White, Role::Knight),
            SquareLabel::WhiteBishop => (Color::White, Role::Bishop),
            SquareLabel::WhiteRook => (Color::White, Role::Rook),
            SquareLabel::WhiteQueen => (Color::White, Role::Queen),
            SquareLabel::WhiteKing => (Color::White, Role::King),
            SquareLabel::BlackPawn => (Color::Black, Role::Pawn),
            SquareLabel::BlackKnight => (Color::Black, Role::Knight),
            SquareLabel::BlackBishop => (Color::Black, Role::Bishop),
            SquareLabel::BlackRook => (Color::Black, Role::Rook),
            SquareLabel::BlackQueen => (Color::Black, Role::Queen),
            SquareLabel::BlackKing => (Color::Black, Role::King),
        };
        Some(Piece { color, role })
    }

    pub fn from_piece(piece: Option<Piece>) -> Self {
        let Some(piece) = piece else {
            return SquareLabel::Empty;
        };
        match (piece.color, piece.role) {
            (Color::White, Role::Pawn) => SquareLabel::WhitePawn,
            (Color::White, Role::Knight) => SquareLabel::WhiteKnight,
            (Color::White, Role::Bishop) => SquareLabel::WhiteBishop,
            (Color::White, Role::Rook) => SquareLabel::WhiteRook,
            (Color::White, Role::Queen) => SquareLabel::WhiteQueen,
            (Color::White, Role::King) => SquareLabel::WhiteKing,
            (Color::Black, Role::Pawn) => SquareLabel::BlackPawn,
            (Color::Black, Role::Knight) => SquareLabel::BlackKnight,
            (Color::Black, Role::Bishop) => SquareLabel::BlackBishop,
            (Color::Black, Role::Rook) => SquareLabel::BlackRook,
            (Color::Black, Role::Queen) => SquareLabel::BlackQueen,
            (Color::Black, Role::King) => SquareLabel::BlackKing,
        }
    }

    pub fn is_empty(self) -> bool {
        self == SquareLabel::Empty
    }
}

/// Map a canonical-image cell to its board square.
///
/// Row 0 of the rectified image is rank 8, column 0 is the a-file.
pub fn square_at(row: usize, col: usize) -> Square {
    debug_assert!(row < 8 && col < 8);
    Square::from_coords(File::new(col as u32), Rank::new(7 - row as u32))
}

/// 64 labels in row-major order of the rectified image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquareGrid {
    labels: [SquareLabel; 64],
}

impl Default for SquareGrid {
    fn default() -> Self {
        Self {
            labels: [SquareLabel::Empty; 64],
        }
    }
}

impl SquareGrid {
    pub fn new(labels: [SquareLabel; 64]) -> Self {
        Self { labels }
    }

    /// Build a grid from any row-major sequence. Returns `None` unless it has exactly 64 items.
    pub fn from_row_major<I>(labels: I) -> Option<Self>
    where
        I: IntoIterator<Item = SquareLabel>,
    {
        let collected: Vec<SquareLabel> = labels.into_iter().collect();
        let labels: [SquareLabel; 64] = collected.try_into().ok()?;
        Some(Self { labels })
    }

    /// Inverse of [`SquareGrid::to_board`], used by tests and history replay.
    pub fn from_board(board: &Board) -> Self {
        let mut labels = [SquareLabel::Empty; 64];
        for (idx, label) in labels.iter_mut().enumerate() {
            *label = SquareLabel::from_piece(board.piece_at(square_at(idx / 8, idx % 8)));
        }
        Self { labels }
    }

    pub fn get(&self, row: usize, col: usize) -> SquareLabel {
        self.labels[row * 8 + col]
    }

    pub fn set(&mut self, row: usize, col: usize, label: SquareLabel) {
        self.labels[row * 8 + col] = label;
    }

    pub fn labels(&self) -> &[SquareLabel; 64] {
        &self.labels
    }

    pub fn to_board(&self) -> Board {
        let mut board = Board::empty();
        for (idx, label) in self.labels.iter().enumerate() {
            if let Some(piece) = label.piece() {
                board.set_piece_at(square_at(idx / 8, idx % 8), piece);
            }
        }
        board
    }

    pub fn king_counts(&self) -> ByColor<usize> {
        let mut counts = ByColor { white: 0, black: 0 };
        for label in &self.labels {
            match label {
                SquareLabel::WhiteKing => counts.white += 1,
                SquareLabel::BlackKing => counts.black += 1,
                _ => {}
            }
        }
        counts
    }

    pub fn occupied(&self) -> usize {
        self.labels.iter().filter(|l| !l.is_empty()).count()
    }
}
