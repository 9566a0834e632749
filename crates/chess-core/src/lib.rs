pub mod game_data;
pub mod labels;
pub mod pgn;
pub mod position;
pub mod tracking;

pub use labels::{square_at, SquareGrid, SquareLabel};
pub use position::{assemble, BoardPosition, CastlingRights, GameContext};
pub use tracking::{MoveObservation, MoveTracker};
