use image::{GrayImage, Luma};

use crate::frame::Frame;

/// BGR to 8-bit luma (ITU-R BT.601 weights).
pub fn to_gray(frame: &Frame) -> GrayImage {
    GrayImage::from_fn(frame.width() as u32, frame.height() as u32, |x, y| {
        let [b, g, r] = frame.pixel(x as usize, y as usize);
        let v = 0.114 * b as f32 + 0.587 * g as f32 + 0.299 * r as f32;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

/// Gaussian noise reduction. A non-positive sigma leaves the image untouched.
pub fn denoise(gray: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return gray.clone();
    }
    image::imageops::blur(gray, sigma)
}
