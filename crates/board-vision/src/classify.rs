use chess_core::{SquareGrid, SquareLabel};
use thiserror::Error;

use crate::error::VisionError;
use crate::rectify::{CanonicalBoard, SquareCell};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ClassifierError(pub String);

/// Per-square piece recognizer. Implementations are opaque to the pipeline.
pub trait SquareClassifier {
    fn classify(&self, cell: &SquareCell) -> Result<SquareLabel, ClassifierError>;
}

/// Placeholder recognizer: every square is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyClassifier;

impl SquareClassifier for EmptyClassifier {
    fn classify(&self, _cell: &SquareCell) -> Result<SquareLabel, ClassifierError> {
        Ok(SquareLabel::Empty)
    }
}

/// Run the classifier once per square, row-major.
pub fn classify_board<C>(board: &CanonicalBoard, classifier: &C) -> Result<SquareGrid, VisionError>
where
    C: SquareClassifier + ?Sized,
{
    let mut grid = SquareGrid::default();
    for cell in board.cells() {
        let label = classifier
            .classify(&cell)
            .map_err(|e| VisionError::Classification {
                square: cell.square().to_string(),
                reason: e.0,
            })?;
        grid.set(cell.row, cell.col, label);
    }
    Ok(grid)
}
