//! Frame acquisition.

use std::path::{Path, PathBuf};

use board_vision::Frame;
use tracing::{debug, info};

use crate::error::PipelineError;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

/// Pulls one BGR frame per call, or fails.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame, PipelineError>;
}

enum Mode {
    /// A snapshot file the camera keeps overwriting.
    Snapshot(PathBuf),
    /// Pre-recorded frames, consumed in file-name order.
    Sequence { files: Vec<PathBuf>, next: usize },
}

/// Capture device backed by image files.
///
/// A file path is re-read on every capture. A directory yields its image
/// files in name order and then reports `SourceExhausted`. Every frame of a
/// session must have the dimensions of the first one.
pub struct ImageFileSource {
    mode: Mode,
    dimensions: Option<(usize, usize)>,
}

impl ImageFileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)
            .map_err(|e| PipelineError::CaptureFailure(format!("{}: {e}", path.display())))?;

        let mode = if meta.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(|e| PipelineError::CaptureFailure(format!("{}: {e}", path.display())))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            files.sort();
            info!(dir = %path.display(), frames = files.len(), "Frame sequence opened");
            Mode::Sequence { files, next: 0 }
        } else {
            info!(file = %path.display(), "Snapshot capture opened");
            Mode::Snapshot(path.to_path_buf())
        };

        Ok(Self {
            mode,
            dimensions: None,
        })
    }

    /// Frames left in a sequence; `None` for a snapshot source.
    pub fn remaining(&self) -> Option<usize> {
        match &self.mode {
            Mode::Snapshot(_) => None,
            Mode::Sequence { files, next } => Some(files.len() - next),
        }
    }
}

impl FrameSource for ImageFileSource {
    fn capture(&mut self) -> Result<Frame, PipelineError> {
        let path = match &mut self.mode {
            Mode::Snapshot(path) => path.clone(),
            Mode::Sequence { files, next } => {
                let Some(path) = files.get(*next).cloned() else {
                    return Err(PipelineError::SourceExhausted);
                };
                *next += 1;
                path
            }
        };

        let frame = decode(&path)?;
        let dims = (frame.width(), frame.height());
        match self.dimensions {
            None => self.dimensions = Some(dims),
            Some(expected) if expected != dims => {
                return Err(PipelineError::CaptureFailure(format!(
                    "{}: frame is {}x{}, session started at {}x{}",
                    path.display(),
                    dims.0,
                    dims.1,
                    expected.0,
                    expected.1
                )));
            }
            Some(_) => {}
        }
        debug!(file = %path.display(), width = dims.0, height = dims.1, "Frame captured");
        Ok(frame)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn decode(path: &Path) -> Result<Frame, PipelineError> {
    let img = image::open(path)
        .map_err(|e| PipelineError::CaptureFailure(format!("{}: {e}", path.display())))?;
    Ok(Frame::from_rgb_image(&img.to_rgb8()))
}
