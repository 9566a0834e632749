//! Raw camera frames: BGR interleaved, row-major.

use image::RgbImage;

use crate::error::VisionError;

/// One captured image. Pixel (x, y) lives at `data[(y * width + x) * 3..][..3]` as `[b, g, r]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, VisionError> {
        if width == 0 || height == 0 {
            return Err(VisionError::InvalidFrame(format!(
                "empty frame {width}x{height}"
            )));
        }
        if data.len() != width * height * 3 {
            return Err(VisionError::InvalidFrame(format!(
                "expected {} bytes for {width}x{height} BGR, got {}",
                width * height * 3,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Uniformly colored frame.
    pub fn filled(width: usize, height: usize, bgr: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&bgr);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Bridge from the `image` crate, which decodes to RGB.
    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let (w, h) = img.dimensions();
        let mut data = Vec::with_capacity(w as usize * h as usize * 3);
        for px in img.pixels() {
            let [r, g, b] = px.0;
            data.extend_from_slice(&[b, g, r]);
        }
        Self {
            width: w as usize,
            height: h as usize,
            data,
        }
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let [b, g, r] = self.pixel(x as usize, y as usize);
            image::Rgb([r, g, b])
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, bgr: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&bgr);
    }

    /// Copy of the rectangle `[x0, x1) x [y0, y1)`, clipped to the frame.
    pub fn crop(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> Frame {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        let x0 = x0.min(x1);
        let y0 = y0.min(y1);
        let mut data = Vec::with_capacity((x1 - x0) * (y1 - y0) * 3);
        for y in y0..y1 {
            let start = (y * self.width + x0) * 3;
            let end = (y * self.width + x1) * 3;
            data.extend_from_slice(&self.data[start..end]);
        }
        Frame {
            width: x1 - x0,
            height: y1 - y0,
            data,
        }
    }

    /// Bilinear sample of all three channels at a continuous pixel-index
    /// coordinate. Samples outside the frame read as black.
    pub fn sample_bilinear(&self, x: f64, y: f64) -> [f64; 3] {
        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let p00 = self.get_clamped(x0, y0);
        let p10 = self.get_clamped(x0 + 1, y0);
        let p01 = self.get_clamped(x0, y0 + 1);
        let p11 = self.get_clamped(x0 + 1, y0 + 1);

        let mut out = [0.0; 3];
        for c in 0..3 {
            let a = p00[c] + fx * (p10[c] - p00[c]);
            let b = p01[c] + fx * (p11[c] - p01[c]);
            out[c] = a + fy * (b - a);
        }
        out
    }

    #[inline]
    fn get_clamped(&self, x: i64, y: i64) -> [f64; 3] {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return [0.0; 3];
        }
        let [b, g, r] = self.pixel(x as usize, y as usize);
        [b as f64, g as f64, r as f64]
    }

    /// Mean of each channel.
    pub fn mean_bgr(&self) -> [f64; 3] {
        let n = (self.width * self.height) as f64;
        let mut sum = [0.0; 3];
        for px in self.data.chunks_exact(3) {
            for c in 0..3 {
                sum[c] += px[c] as f64;
            }
        }
        sum.map(|s| if n > 0.0 { s / n } else { 0.0 })
    }
}
