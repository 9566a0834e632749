use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    #[error("Chessboard not found: {0}")]
    BoardNotFound(String),

    #[error("Degenerate corner set: {0}")]
    DegenerateCorners(&'static str),

    #[error("Homography could not be computed from the corner set")]
    Homography,

    #[error("Classifier failed on {square}: {reason}")]
    Classification { square: String, reason: String },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}
