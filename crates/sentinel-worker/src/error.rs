//! Pipeline error taxonomy

use board_vision::VisionError;
use chess_core::pgn::PgnError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Frame capture failed: {0}")]
    CaptureFailure(String),

    #[error("Frame source exhausted")]
    SourceExhausted,

    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Square classification failed: {0}")]
    Classification(String),

    #[error("Invalid position '{fen}': {reason}")]
    InvalidPosition { fen: String, reason: String },

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Feature dimension mismatch: model expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("PGN error: {0}")]
    Pgn(#[from] PgnError),
}

impl PipelineError {
    /// Fatal errors end the session; everything else only fails the current cycle.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::BoardNotFound(_)
                | PipelineError::Classification(_)
                | PipelineError::InvalidPosition { .. }
        )
    }

    /// Component the error originated in, for logs and exit messages.
    pub fn component(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config",
            PipelineError::CaptureFailure(_) | PipelineError::SourceExhausted => "capture",
            PipelineError::BoardNotFound(_) => "locator",
            PipelineError::Classification(_) => "classifier",
            PipelineError::InvalidPosition { .. } | PipelineError::EngineUnavailable(_) => "engine",
            PipelineError::ModelLoad(_) | PipelineError::DimensionMismatch { .. } => "scorer",
            PipelineError::Pgn(_) => "replay",
        }
    }
}

impl From<VisionError> for PipelineError {
    fn from(e: VisionError) -> Self {
        match e {
            VisionError::BoardNotFound(why) => PipelineError::BoardNotFound(why),
            VisionError::DegenerateCorners(_) | VisionError::Homography => {
                PipelineError::BoardNotFound(e.to_string())
            }
            VisionError::Classification { .. } => PipelineError::Classification(e.to_string()),
            VisionError::InvalidFrame(why) => PipelineError::CaptureFailure(why),
        }
    }
}
