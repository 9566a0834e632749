//! Geometric board locator: frame in, four outer board corners out.
//!
//! The search finds the 7x7 lattice of inner X-junctions and extrapolates
//! the outer rim from it. A frame where the lattice is incomplete or where
//! candidates do not fit a single lattice yields `BoardNotFound`; no guessing.

use nalgebra::Point2;
use tracing::debug;

use crate::error::VisionError;
use crate::frame::Frame;
use crate::homography::Homography;
use crate::preprocess::{denoise, to_gray};
use crate::response::{chess_response, detect_corners, merge_close, Corner};

/// Inner corners per side of a chessboard.
const INNER: usize = 7;

/// Four board corners in canonical order: top-left, top-right, bottom-right,
/// bottom-left (image coordinates, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerSet {
    points: [Point2<f64>; 4],
}

impl CornerSet {
    /// Canonicalize the order of four points and reject degenerate input.
    ///
    /// Points are sorted by angle about their centroid, then rotated so the
    /// point with the smallest `x + y` comes first. Any three collinear
    /// points, or a non-convex quadrilateral, is rejected.
    pub fn new(points: [Point2<f64>; 4]) -> Result<Self, VisionError> {
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(VisionError::DegenerateCorners("non-finite coordinate"));
        }

        let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
        let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;
        let mut sorted = points;
        sorted.sort_by(|a, b| {
            let ta = (a.y - cy).atan2(a.x - cx);
            let tb = (b.y - cy).atan2(b.x - cx);
            ta.total_cmp(&tb)
        });

        let first = (0..4)
            .min_by(|&i, &j| {
                let (a, b) = (sorted[i], sorted[j]);
                (a.x + a.y)
                    .total_cmp(&(b.x + b.y))
                    .then(a.y.total_cmp(&b.y))
            })
            .unwrap_or(0);
        sorted.rotate_left(first);

        let scale = max_pairwise_distance(&sorted);
        if scale < 1e-9 {
            return Err(VisionError::DegenerateCorners("coincident points"));
        }
        let eps = 1e-6 * scale * scale;
        for i in 0..4 {
            let turn = cross(sorted[i], sorted[(i + 1) % 4], sorted[(i + 2) % 4]);
            if turn.abs() <= eps {
                return Err(VisionError::DegenerateCorners("three collinear points"));
            }
            if turn < 0.0 {
                return Err(VisionError::DegenerateCorners("quadrilateral is not convex"));
            }
        }

        Ok(Self { points: sorted })
    }

    pub fn from_xy(points: [(f64, f64); 4]) -> Result<Self, VisionError> {
        Self::new(points.map(|(x, y)| Point2::new(x, y)))
    }

    pub fn points(&self) -> &[Point2<f64>; 4] {
        &self.points
    }

    pub fn top_left(&self) -> Point2<f64> {
        self.points[0]
    }

    pub fn top_right(&self) -> Point2<f64> {
        self.points[1]
    }

    pub fn bottom_right(&self) -> Point2<f64> {
        self.points[2]
    }

    pub fn bottom_left(&self) -> Point2<f64> {
        self.points[3]
    }

    /// Shoelace area in square pixels.
    pub fn area(&self) -> f64 {
        quad_area(&self.points)
    }
}

/// `(b - a) x (c - b)`; positive for a clockwise turn on screen (y down).
fn cross(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x)
}

fn max_pairwise_distance(pts: &[Point2<f64>]) -> f64 {
    let mut best = 0.0f64;
    for i in 0..pts.len() {
        for j in i + 1..pts.len() {
            best = best.max((pts[i] - pts[j]).norm());
        }
    }
    best
}

fn quad_area(p: &[Point2<f64>; 4]) -> f64 {
    let mut s = 0.0;
    for i in 0..4 {
        let (a, b) = (p[i], p[(i + 1) % 4]);
        s += a.x * b.y - b.x * a.y;
    }
    s.abs() / 2.0
}

/// Locator tuning.
#[derive(Debug, Clone)]
pub struct LocatorParams {
    /// Gaussian sigma for noise reduction.
    pub blur_sigma: f32,
    /// Corner threshold as a fraction of the strongest response.
    pub threshold_rel: f32,
    /// Non-maximum suppression radius in pixels.
    pub nms_radius: usize,
    /// Candidates closer than this (pixels) are merged.
    pub min_spacing: f64,
    /// Largest distance from a lattice node, in squares, for a candidate to count as on it.
    pub lattice_tolerance: f64,
}

impl Default for LocatorParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            threshold_rel: 0.2,
            nms_radius: 2,
            min_spacing: 5.0,
            lattice_tolerance: 0.3,
        }
    }
}

pub trait BoardLocator {
    fn locate(&self, frame: &Frame) -> Result<CornerSet, VisionError>;
}

/// Checkerboard-lattice locator built on the ChESS corner response.
#[derive(Debug, Clone, Default)]
pub struct ChessboardLocator {
    params: LocatorParams,
}

impl ChessboardLocator {
    pub fn new(params: LocatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LocatorParams {
        &self.params
    }

    /// Corner candidates, strongest first.
    pub fn candidates(&self, frame: &Frame) -> Vec<Corner> {
        let gray = denoise(&to_gray(frame), self.params.blur_sigma);
        let resp = chess_response(&gray);
        let raw = detect_corners(&resp, self.params.threshold_rel, self.params.nms_radius);
        merge_close(raw, self.params.min_spacing)
    }
}

impl BoardLocator for ChessboardLocator {
    fn locate(&self, frame: &Frame) -> Result<CornerSet, VisionError> {
        let candidates = self.candidates(frame);
        let needed = INNER * INNER;
        debug!(candidates = candidates.len(), "Corner candidates after NMS");

        if candidates.len() < needed {
            return Err(VisionError::BoardNotFound(format!(
                "{} of {needed} inner corners visible",
                candidates.len()
            )));
        }

        let pts: Vec<Point2<f64>> = candidates[..needed]
            .iter()
            .map(|c| Point2::new(c.x, c.y))
            .collect();
        let lattice_to_image = fit_lattice(&pts, self.params.lattice_tolerance)?;

        let outer = [(0.0, 0.0), (8.0, 0.0), (8.0, 8.0), (0.0, 8.0)]
            .map(|(u, v)| lattice_to_image.apply(Point2::new(u, v)));
        CornerSet::new(outer)
    }
}

/// Assign 49 points to the 7x7 inner-corner lattice and fit the lattice to
/// image homography. Lattice units are squares with the board's outer
/// corners at 0 and 8.
fn fit_lattice(pts: &[Point2<f64>], tolerance: f64) -> Result<Homography, VisionError> {
    let not_found = |why: &str| VisionError::BoardNotFound(why.to_string());

    let hull = convex_hull(pts);
    let extremes = max_area_quad(&hull).ok_or_else(|| not_found("corner hull is degenerate"))?;
    let extremes = CornerSet::new(extremes).map_err(|_| not_found("corner hull is degenerate"))?;

    let lo = 1.0;
    let hi = INNER as f64;
    let lattice_extremes = [
        Point2::new(lo, lo),
        Point2::new(hi, lo),
        Point2::new(hi, hi),
        Point2::new(lo, hi),
    ];
    let coarse = Homography::from_4pt(&lattice_extremes, extremes.points())
        .ok_or_else(|| not_found("lattice extremes do not define a homography"))?;
    let to_lattice = coarse
        .inverse()
        .ok_or_else(|| not_found("lattice homography is singular"))?;

    let mut taken = [[false; INNER]; INNER];
    let mut src = Vec::with_capacity(pts.len());
    for p in pts {
        let q = to_lattice.apply(*p);
        let (i, j) = (q.x.round(), q.y.round());
        let residual = ((q.x - i).powi(2) + (q.y - j).powi(2)).sqrt();
        if residual > tolerance || i < lo || i > hi || j < lo || j > hi {
            return Err(not_found("corner candidate off the lattice"));
        }
        let (ci, cj) = (i as usize - 1, j as usize - 1);
        if taken[cj][ci] {
            return Err(not_found("two candidates on one lattice node"));
        }
        taken[cj][ci] = true;
        src.push(Point2::new(i, j));
    }

    Homography::fit(&src, pts).ok_or_else(|| not_found("lattice refit failed"))
}

/// Andrew's monotone chain; collinear points are dropped.
fn convex_hull(pts: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut sorted: Vec<Point2<f64>> = pts.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let turn = |o: Point2<f64>, a: Point2<f64>, b: Point2<f64>| {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };

    let mut lower: Vec<Point2<f64>> = Vec::new();
    for &p in &sorted {
        while lower.len() >= 2 && turn(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point2<f64>> = Vec::new();
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && turn(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Largest-area quadrilateral with vertices on the hull (hull order kept).
fn max_area_quad(hull: &[Point2<f64>]) -> Option<[Point2<f64>; 4]> {
    let n = hull.len();
    if n < 4 {
        return None;
    }
    let mut best: Option<([Point2<f64>; 4], f64)> = None;
    for a in 0..n {
        for b in a + 1..n {
            for c in b + 1..n {
                for d in c + 1..n {
                    let quad = [hull[a], hull[b], hull[c], hull[d]];
                    let area = quad_area(&quad);
                    if best.map_or(true, |(_, best_area)| area > best_area) {
                        best = Some((quad, area));
                    }
                }
            }
        }
    }
    best.map(|(quad, _)| quad)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Axis-aligned board with `sq`-pixel squares, top-left at (`off`, `off`).
    fn synthetic_board(size: usize, off: usize, sq: usize) -> Frame {
        let mut frame = Frame::filled(size, size, [128, 128, 128]);
        for y in off..off + 8 * sq {
            for x in off..off + 8 * sq {
                let light = ((x - off) / sq + (y - off) / sq) % 2 == 0;
                let v = if light { 230 } else { 30 };
                frame.put_pixel(x, y, [v, v, v]);
            }
        }
        frame
    }

    #[test]
    fn test_corner_set_canonical_order() {
        let set = CornerSet::from_xy([(10.0, 110.0), (110.0, 10.0), (10.0, 10.0), (110.0, 110.0)])
            .unwrap();
        assert_eq!(set.top_left(), Point2::new(10.0, 10.0));
        assert_eq!(set.top_right(), Point2::new(110.0, 10.0));
        assert_eq!(set.bottom_right(), Point2::new(110.0, 110.0));
        assert_eq!(set.bottom_left(), Point2::new(10.0, 110.0));
        assert_eq!(set.area(), 10_000.0);
    }

    #[test]
    fn test_corner_set_rejects_collinear() {
        let err = CornerSet::from_xy([(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (5.0, 10.0)]).unwrap_err();
        assert_eq!(err, VisionError::DegenerateCorners("three collinear points"));
    }

    #[test]
    fn test_corner_set_rejects_non_convex() {
        // (5, 3) lies inside the triangle of the other three
        let err = CornerSet::from_xy([(0.0, 0.0), (10.0, 0.0), (5.0, 3.0), (5.0, 10.0)]).unwrap_err();
        assert!(matches!(err, VisionError::DegenerateCorners(_)));
    }

    #[test]
    fn test_corner_set_rejects_coincident() {
        assert!(CornerSet::from_xy([(1.0, 1.0); 4]).is_err());
    }

    #[test]
    fn test_locates_axis_aligned_board() {
        let frame = synthetic_board(200, 20, 20);
        let corners = ChessboardLocator::default().locate(&frame).unwrap();
        // outer rim sits on pixel boundaries 20 and 180, i.e. index coordinate 19.5 / 179.5
        let expected = [(19.5, 19.5), (179.5, 19.5), (179.5, 179.5), (19.5, 179.5)];
        for (p, (ex, ey)) in corners.points().iter().zip(expected) {
            assert!((p.x - ex).abs() < 1.0 && (p.y - ey).abs() < 1.0, "{p:?} vs ({ex}, {ey})");
        }
    }

    #[test]
    fn test_blank_frame_is_not_found() {
        let frame = Frame::filled(120, 120, [90, 90, 90]);
        let err = ChessboardLocator::default().locate(&frame).unwrap_err();
        assert!(matches!(err, VisionError::BoardNotFound(_)));
    }

    #[test]
    fn test_partially_visible_board_is_not_found() {
        let full = synthetic_board(200, 20, 20);
        // drop the right third of the board
        let partial = full.crop(0, 0, 120, 200);
        let err = ChessboardLocator::default().locate(&partial).unwrap_err();
        assert!(matches!(err, VisionError::BoardNotFound(_)));
    }

    #[test]
    fn test_hull_and_quad_of_grid() {
        let pts: Vec<Point2<f64>> = (0..3)
            .flat_map(|y| (0..3).map(move |x| Point2::new(x as f64, y as f64)))
            .collect();
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        let quad = max_area_quad(&hull).unwrap();
        assert_eq!(quad_area(&quad), 4.0);
    }
}
