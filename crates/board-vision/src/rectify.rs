//! Perspective correction to a canonical top-down board and square slicing.

use chess_core::square_at;
use nalgebra::Point2;
use shakmaty::Square;

use crate::error::VisionError;
use crate::frame::Frame;
use crate::homography::Homography;
use crate::locate::CornerSet;

/// Default side of the canonical board image (50 px squares).
pub const DEFAULT_CANONICAL_SIZE: usize = 400;

fn canonical_corners(size: usize) -> [Point2<f64>; 4] {
    let s = size as f64;
    [
        Point2::new(0.0, 0.0),
        Point2::new(s, 0.0),
        Point2::new(s, s),
        Point2::new(0.0, s),
    ]
}

/// Homography from frame coordinates to the canonical square of side `size`,
/// mapping TL, TR, BR, BL onto (0,0), (S,0), (S,S), (0,S).
pub fn board_homography(corners: &CornerSet, size: usize) -> Result<Homography, VisionError> {
    Homography::from_4pt(corners.points(), &canonical_corners(size)).ok_or(VisionError::Homography)
}

/// Half-open pixel rectangle of one square in the canonical image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl CellBounds {
    /// Bounds of (row, col) in an image of side `size`. Integer division keeps
    /// the 64 cells gap-free for any size.
    pub fn of(row: usize, col: usize, size: usize) -> Self {
        Self {
            x0: col * size / 8,
            y0: row * size / 8,
            x1: (col + 1) * size / 8,
            y1: (row + 1) * size / 8,
        }
    }

    pub fn area(&self) -> usize {
        (self.x1 - self.x0) * (self.y1 - self.y0)
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// One square's sub-image, handed to the classifier.
#[derive(Debug, Clone)]
pub struct SquareCell {
    pub row: usize,
    pub col: usize,
    pub bounds: CellBounds,
    pub image: Frame,
}

impl SquareCell {
    pub fn square(&self) -> Square {
        square_at(self.row, self.col)
    }
}

/// Top-down S x S view of the board, rank 8 at row 0 and the a-file at column 0.
#[derive(Debug, Clone)]
pub struct CanonicalBoard {
    size: usize,
    image: Frame,
}

impl CanonicalBoard {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn image(&self) -> &Frame {
        &self.image
    }

    /// The 64 cells in row-major order.
    pub fn cells(&self) -> Vec<SquareCell> {
        let mut cells = Vec::with_capacity(64);
        for row in 0..8 {
            for col in 0..8 {
                let bounds = CellBounds::of(row, col, self.size);
                cells.push(SquareCell {
                    row,
                    col,
                    bounds,
                    image: self.image.crop(bounds.x0, bounds.y0, bounds.x1, bounds.y1),
                });
            }
        }
        cells
    }
}

/// Warp the board region of `frame` into a canonical `size` x `size` image
/// with per-channel bilinear sampling.
pub fn rectify(frame: &Frame, corners: &CornerSet, size: usize) -> Result<CanonicalBoard, VisionError> {
    if size < 8 {
        return Err(VisionError::InvalidFrame(format!(
            "canonical size {size} cannot hold 8x8 squares"
        )));
    }
    let to_frame = board_homography(corners, size)?
        .inverse()
        .ok_or(VisionError::Homography)?;

    let mut data = Vec::with_capacity(size * size * 3);
    for y in 0..size {
        for x in 0..size {
            let p = to_frame.apply(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
            let v = frame.sample_bilinear(p.x, p.y);
            data.extend(v.iter().map(|c| c.round().clamp(0.0, 255.0) as u8));
        }
    }
    let image = Frame::new(size, size, data)?;
    Ok(CanonicalBoard { size, image })
}
