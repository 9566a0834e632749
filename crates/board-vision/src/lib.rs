//! Board vision: locate a physical chessboard in a camera frame, rectify it to
//! a canonical top-down image and hand each of the 64 squares to a pluggable
//! classifier.

pub mod classify;
pub mod error;
pub mod frame;
pub mod homography;
pub mod locate;
pub mod preprocess;
pub mod rectify;
pub mod response;

pub use classify::{classify_board, ClassifierError, EmptyClassifier, SquareClassifier};
pub use error::VisionError;
pub use frame::Frame;
pub use homography::Homography;
pub use locate::{BoardLocator, ChessboardLocator, CornerSet, LocatorParams};
pub use rectify::{board_homography, rectify, CanonicalBoard, CellBounds, SquareCell, DEFAULT_CANONICAL_SIZE};
