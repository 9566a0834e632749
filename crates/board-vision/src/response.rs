//! ChESS corner response and peak extraction.
//!
//! The response is `SR - DR - 16 * MR` over a 16-sample ring of radius 5:
//! `SR` rewards the alternating pattern of an X-junction, `DR` penalizes
//! straight edges and `MR` penalizes blobs. Checkerboard inner corners score
//! strongly positive, while T and L junctions on the board rim score negative.

use image::GrayImage;

/// Ring radius in pixels.
pub const RING_RADIUS: usize = 5;

/// Clockwise from the top.
const RING: [(i32, i32); 16] = [
    (0, -5),
    (2, -5),
    (3, -3),
    (5, -2),
    (5, 0),
    (5, 2),
    (3, 3),
    (2, 5),
    (0, 5),
    (-2, 5),
    (-3, 3),
    (-5, 2),
    (-5, 0),
    (-5, -2),
    (-3, -3),
    (-2, -5),
];

/// Dense response in row-major layout. Pixels closer than the ring radius to
/// the border are zero.
#[derive(Clone, Debug)]
pub struct ResponseMap {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl ResponseMap {
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

/// A corner candidate with subpixel position in pixel-index coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
    pub x: f64,
    pub y: f64,
    /// Response at the integer peak.
    pub strength: f32,
}

pub fn chess_response(img: &GrayImage) -> ResponseMap {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut data = vec![0.0f32; w * h];
    if w <= 2 * RING_RADIUS || h <= 2 * RING_RADIUS {
        return ResponseMap {
            width: w,
            height: h,
            data,
        };
    }

    let raw = img.as_raw();
    for y in RING_RADIUS..h - RING_RADIUS {
        for x in RING_RADIUS..w - RING_RADIUS {
            data[y * w + x] = response_at(raw, w, x as i32, y as i32);
        }
    }

    ResponseMap {
        width: w,
        height: h,
        data,
    }
}

#[inline]
fn response_at(img: &[u8], w: usize, x: i32, y: i32) -> f32 {
    let px = |xx: i32, yy: i32| img[yy as usize * w + xx as usize] as i32;

    let mut s = [0i32; 16];
    for (k, (dx, dy)) in RING.iter().enumerate() {
        s[k] = px(x + dx, y + dy);
    }

    let mut sr = 0i32;
    for k in 0..4 {
        let a = s[k] + s[k + 8];
        let b = s[k + 4] + s[k + 12];
        sr += (a - b).abs();
    }

    let mut dr = 0i32;
    for k in 0..8 {
        dr += (s[k] - s[k + 8]).abs();
    }

    let ring_mean = s.iter().sum::<i32>() as f32 / 16.0;
    let local_mean =
        (px(x, y) + px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y)) as f32 / 5.0;
    let mr = (ring_mean - local_mean).abs();

    sr as f32 - dr as f32 - 16.0 * mr
}

/// Threshold, non-maximum suppression and 5x5 centre-of-mass refinement.
///
/// Plateaus are resolved in raster order: of several equal maxima inside one
/// window only the first survives.
pub fn detect_corners(resp: &ResponseMap, threshold_rel: f32, nms_radius: usize) -> Vec<Corner> {
    let (w, h) = (resp.width, resp.height);
    let max = resp.max();
    if !max.is_finite() || max <= 0.0 {
        return Vec::new();
    }
    let thr = (threshold_rel * max).max(f32::MIN_POSITIVE);

    let border = RING_RADIUS + nms_radius + 2;
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }

    let mut corners = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            let v = resp.at(x, y);
            if v < thr || !is_local_max(resp, x, y, nms_radius, v) {
                continue;
            }
            let (cx, cy) = refine_com(resp, x, y);
            corners.push(Corner {
                x: cx,
                y: cy,
                strength: v,
            });
        }
    }
    corners
}

fn is_local_max(resp: &ResponseMap, x: usize, y: usize, r: usize, v: f32) -> bool {
    for yy in y - r..=y + r {
        for xx in x - r..=x + r {
            if xx == x && yy == y {
                continue;
            }
            let other = resp.at(xx, yy);
            let earlier = (yy, xx) < (y, x);
            if other > v || (other == v && earlier) {
                return false;
            }
        }
    }
    true
}

/// Centre of mass of the non-negative response in a 5x5 window.
fn refine_com(resp: &ResponseMap, x: usize, y: usize) -> (f64, f64) {
    let (mut sx, mut sy, mut sw) = (0.0f64, 0.0f64, 0.0f64);
    for yy in y - 2..=y + 2 {
        for xx in x - 2..=x + 2 {
            let wpx = resp.at(xx, yy).max(0.0) as f64;
            sx += xx as f64 * wpx;
            sy += yy as f64 * wpx;
            sw += wpx;
        }
    }
    if sw > 0.0 {
        (sx / sw, sy / sw)
    } else {
        (x as f64, y as f64)
    }
}

/// Greedy merge: strongest first, drop anything closer than `min_spacing` to
/// a kept corner. The result is sorted by descending strength.
pub fn merge_close(mut corners: Vec<Corner>, min_spacing: f64) -> Vec<Corner> {
    corners.sort_by(|a, b| {
        b.strength
            .total_cmp(&a.strength)
            .then(a.y.total_cmp(&b.y))
            .then(a.x.total_cmp(&b.x))
    });
    let min_sq = min_spacing * min_spacing;
    let mut kept: Vec<Corner> = Vec::with_capacity(corners.len());
    for c in corners {
        let crowded = kept.iter().any(|k| {
            let dx = k.x - c.x;
            let dy = k.y - c.y;
            dx * dx + dy * dy < min_sq
        });
        if !crowded {
            kept.push(c);
        }
    }
    kept
}
