//! Side-to-move and move-counter tracking from successive occupancy grids.
//!
//! Vision only yields piece placement. The tracker explains the difference
//! between two placements with exactly one legal move; anything else leaves the
//! counters untouched and marks the observation as uncertain.

use shakmaty::{Board, CastlingMode, Chess, Position};
use tracing::debug;

use crate::labels::SquareGrid;
use crate::position::{assemble, BoardPosition, GameContext};

/// Result of comparing a new placement against the tracked one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveObservation {
    /// Context to serialize the new placement with.
    pub context: GameContext,
    /// The single legal move explaining the diff, in UCI notation.
    pub inferred_move: Option<String>,
    /// True when the placement changed but no unique legal move explains it.
    pub uncertain: bool,
    board: Board,
}

impl MoveObservation {
    pub fn position(&self, grid: SquareGrid) -> BoardPosition {
        assemble(grid, self.context)
    }
}

/// Cross-cycle tracker owned by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct MoveTracker {
    last: Option<(Board, GameContext)>,
}

impl MoveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker with a known placement and context.
    pub fn with_position(board: Board, context: GameContext) -> Self {
        Self {
            last: Some((board, context)),
        }
    }

    /// Context the next unchanged placement would be serialized with.
    pub fn context(&self) -> GameContext {
        self.last.as_ref().map(|(_, ctx)| *ctx).unwrap_or_default()
    }

    /// Compare `grid` with the last committed placement. Does not mutate the tracker.
    pub fn observe(&self, grid: &SquareGrid) -> MoveObservation {
        let board = grid.to_board();

        let Some((prev_board, prev_ctx)) = &self.last else {
            let context = if board == Board::default() {
                GameContext::standard_start()
            } else {
                GameContext::default()
            };
            return MoveObservation {
                context,
                inferred_move: None,
                uncertain: false,
                board,
            };
        };

        if board == *prev_board {
            return MoveObservation {
                context: *prev_ctx,
                inferred_move: None,
                uncertain: false,
                board,
            };
        }

        match infer_move(prev_board, prev_ctx, &board) {
            Some((uci, context)) => {
                debug!(uci = %uci, fullmoves = context.fullmoves, "Inferred move from placement diff");
                MoveObservation {
                    context,
                    inferred_move: Some(uci),
                    uncertain: false,
                    board,
                }
            }
            None => MoveObservation {
                context: prev_ctx.held_for(&board),
                inferred_move: None,
                uncertain: true,
                board,
            },
        }
    }

    /// Accept an observation as the new comparison base.
    pub fn commit(&mut self, observation: &MoveObservation) {
        self.last = Some((observation.board.clone(), observation.context));
    }
}

/// Find the unique legal move turning `prev` into `next`.
fn infer_move(prev: &Board, ctx: &GameContext, next: &Board) -> Option<(String, GameContext)> {
    let grid = SquareGrid::from_board(prev);
    let pos: Chess = assemble(grid, *ctx).to_chess().ok()?;

    let mut found: Option<(String, GameContext)> = None;
    for mv in pos.legal_moves() {
        let mut after = pos.clone();
        after.play_unchecked(&mv);
        if after.board() != next {
            continue;
        }
        if found.is_some() {
            // Two different moves give the same placement.
            return None;
        }
        found = Some((
            mv.to_uci(CastlingMode::Standard).to_string(),
            GameContext::from_position(&after),
        ));
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::SquareLabel;
    use shakmaty::{Color, Square};

    fn start_grid() -> SquareGrid {
        SquareGrid::from_board(&Board::default())
    }

    fn grid_after(moves: &[(usize, usize, usize, usize)]) -> SquareGrid {
        let mut grid = start_grid();
        for &(fr, fc, tr, tc) in moves {
            let label = grid.get(fr, fc);
            grid.set(fr, fc, SquareLabel::Empty);
            grid.set(tr, tc, label);
        }
        grid
    }

    #[test]
    fn test_first_observation_of_start_position_gets_full_rights() {
        let tracker = MoveTracker::new();
        let obs = tracker.observe(&start_grid());
        assert_eq!(obs.context, GameContext::standard_start());
        assert!(!obs.uncertain);
        assert!(obs.inferred_move.is_none());
    }

    #[test]
    fn test_single_pawn_push_flips_turn() {
        let mut tracker = MoveTracker::new();
        let first = tracker.observe(&start_grid());
        tracker.commit(&first);

        // e2e4: row 6 col 4 -> row 4 col 4
        let obs = tracker.observe(&grid_after(&[(6, 4, 4, 4)]));
        assert_eq!(obs.inferred_move.as_deref(), Some("e2e4"));
        assert!(!obs.uncertain);
        assert_eq!(obs.context.turn, Color::Black);
        assert_eq!(obs.context.fullmoves, 1);
        assert_eq!(obs.context.ep_square, None);
    }

    #[test]
    fn test_black_reply_increments_fullmove() {
        let mut tracker = MoveTracker::new();
        for grid in [
            start_grid(),
            grid_after(&[(6, 4, 4, 4)]),
            grid_after(&[(6, 4, 4, 4), (1, 4, 3, 4)]),
        ] {
            let obs = tracker.observe(&grid);
            assert!(!obs.uncertain);
            tracker.commit(&obs);
        }
        let ctx = tracker.context();
        assert_eq!(ctx.turn, Color::White);
        assert_eq!(ctx.fullmoves, 2);
        assert_eq!(ctx.halfmoves, 0);
    }

    #[test]
    fn test_unexplained_diff_holds_counters() {
        let mut tracker = MoveTracker::new();
        let first = tracker.observe(&start_grid());
        tracker.commit(&first);

        // two white pawns moved at once
        let obs = tracker.observe(&grid_after(&[(6, 4, 4, 4), (6, 3, 4, 3)]));
        assert!(obs.uncertain);
        assert!(obs.inferred_move.is_none());
        assert_eq!(obs.context, GameContext::standard_start());
    }

    #[test]
    fn test_uncertain_king_move_yields_legal_position() {
        let mut tracker = MoveTracker::new();
        let first = tracker.observe(&start_grid());
        tracker.commit(&first);

        // e4 e5 Ke2 seen in one diff
        let grid = grid_after(&[(6, 4, 4, 4), (1, 4, 3, 4), (7, 4, 6, 4)]);
        let obs = tracker.observe(&grid);
        assert!(obs.uncertain);
        let pos = obs.position(grid);
        assert_eq!(
            pos.fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPPKPPP/RNBQ1BNR w kq - 0 1"
        );
        assert!(pos.to_chess().is_ok());
        tracker.commit(&obs);

        // the next ordinary move is inferred from the held base
        let next = grid_after(&[(6, 4, 4, 4), (1, 4, 3, 4), (7, 4, 6, 4), (7, 6, 5, 5)]);
        let obs = tracker.observe(&next);
        assert_eq!(obs.inferred_move.as_deref(), Some("g1f3"));
        assert_eq!(obs.context.turn, Color::Black);
    }

    #[test]
    fn test_uncertain_diff_clears_stale_ep_square() {
        let mut tracker = MoveTracker::new();
        let played = [(6, 4, 4, 4), (1, 0, 2, 0), (4, 4, 3, 4), (1, 3, 3, 3)];
        for n in 0..=played.len() {
            let obs = tracker.observe(&grid_after(&played[..n]));
            assert!(!obs.uncertain);
            tracker.commit(&obs);
        }
        assert_eq!(tracker.context().ep_square, Some(Square::D6));

        // Nf3 and d4 seen in one diff
        let mut moves = played.to_vec();
        moves.extend([(7, 6, 5, 5), (3, 3, 4, 3)]);
        let grid = grid_after(&moves);
        let obs = tracker.observe(&grid);
        assert!(obs.uncertain);
        assert_eq!(obs.context.ep_square, None);
        assert_eq!(obs.context.castling, crate::position::CastlingRights::ALL);
        let pos = obs.position(grid);
        assert!(pos.fen().ends_with(" w KQkq - 0 3"), "{}", pos.fen());
        assert!(pos.to_chess().is_ok());
    }

    #[test]
    fn test_unchanged_board_is_not_uncertain() {
        let mut tracker = MoveTracker::new();
        let first = tracker.observe(&start_grid());
        tracker.commit(&first);
        let again = tracker.observe(&start_grid());
        assert!(!again.uncertain);
        assert_eq!(again.context, first.context);
    }

    #[test]
    fn test_observe_does_not_mutate() {
        let tracker = MoveTracker::with_position(Board::default(), GameContext::standard_start());
        let _ = tracker.observe(&grid_after(&[(6, 4, 4, 4)]));
        assert_eq!(tracker.context(), GameContext::standard_start());
    }

    #[test]
    fn test_illegal_base_position_is_uncertain() {
        // no kings: nothing is legal, so nothing can be inferred
        let tracker = MoveTracker::with_position(Board::empty(), GameContext::default());
        let mut grid = SquareGrid::default();
        grid.set(4, 4, SquareLabel::WhitePawn);
        assert!(tracker.observe(&grid).uncertain);
    }

    #[test]
    fn test_castling_inferred_with_rights() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R".parse().unwrap();
        let tracker = MoveTracker::with_position(board.clone(), GameContext::standard_start());

        let mut grid = SquareGrid::from_board(&board);
        grid.set(7, 4, SquareLabel::Empty);
        grid.set(7, 7, SquareLabel::Empty);
        grid.set(7, 6, SquareLabel::WhiteKing);
        grid.set(7, 5, SquareLabel::WhiteRook);

        let obs = tracker.observe(&grid);
        assert_eq!(obs.inferred_move.as_deref(), Some("e1g1"));
        assert!(!obs.context.castling.white_king_side);
        assert!(obs.context.castling.black_king_side);
        assert_eq!(obs.position(grid).board().king_of(Color::White), Some(Square::G1));
    }
}
