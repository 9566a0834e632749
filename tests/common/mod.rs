#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use board_vision::{
    BoardLocator, ClassifierError, CornerSet, Frame, Homography, SquareCell, SquareClassifier,
    VisionError,
};
use chess_core::{SquareGrid, SquareLabel};
use nalgebra::Point2;
use sentinel_worker::capture::FrameSource;
use sentinel_worker::scorer::{SuspicionModel, SuspicionScorer};
use sentinel_worker::stockfish::{EngineAnalysis, Evaluation, PositionAnalyzer};
use sentinel_worker::PipelineError;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Position};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

pub const LIGHT: u8 = 230;
pub const DARK: u8 = 30;
pub const BACKGROUND: u8 = 128;

/// Axis-aligned board with `sq`-pixel squares, top-left at (`off`, `off`).
pub fn axis_board(size: usize, off: usize, sq: usize) -> Frame {
    let mut frame = Frame::filled(size, size, [BACKGROUND; 3]);
    for y in off..off + 8 * sq {
        for x in off..off + 8 * sq {
            let light = ((x - off) / sq + (y - off) / sq) % 2 == 0;
            let v = if light { LIGHT } else { DARK };
            frame.put_pixel(x, y, [v, v, v]);
        }
    }
    frame
}

/// Board seen in perspective: board units (0,0), (8,0), (8,8), (0,8) land on
/// `corners` in that order.
pub fn warped_board(width: usize, height: usize, corners: [(f64, f64); 4]) -> Frame {
    let board_units = [
        Point2::new(0.0, 0.0),
        Point2::new(8.0, 0.0),
        Point2::new(8.0, 8.0),
        Point2::new(0.0, 8.0),
    ];
    let image_pts = corners.map(|(x, y)| Point2::new(x, y));
    let to_board = Homography::from_4pt(&board_units, &image_pts)
        .and_then(|h| h.inverse())
        .expect("test corners form a valid quadrilateral");

    let mut frame = Frame::filled(width, height, [BACKGROUND; 3]);
    for y in 0..height {
        for x in 0..width {
            let p = to_board.apply(Point2::new(x as f64, y as f64));
            if (0.0..8.0).contains(&p.x) && (0.0..8.0).contains(&p.y) {
                let light = (p.x.floor() as i64 + p.y.floor() as i64) % 2 == 0;
                let v = if light { LIGHT } else { DARK };
                frame.put_pixel(x, y, [v, v, v]);
            }
        }
    }
    frame
}

pub fn grid_of(fen: &str) -> SquareGrid {
    let pos: Chess = fen
        .parse::<Fen>()
        .expect("valid fen")
        .into_position(CastlingMode::Standard)
        .expect("legal position");
    SquareGrid::from_board(pos.board())
}

/// Locator that always reports the same corners.
pub struct StubLocator {
    corners: CornerSet,
    fail_on: Vec<usize>,
    calls: AtomicUsize,
}

impl StubLocator {
    pub fn new(corners: [(f64, f64); 4]) -> Self {
        Self {
            corners: CornerSet::from_xy(corners).expect("convex test corners"),
            fail_on: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Report `BoardNotFound` on the given 1-based calls.
    pub fn failing_on(mut self, calls: &[usize]) -> Self {
        self.fail_on = calls.to_vec();
        self
    }
}

impl BoardLocator for StubLocator {
    fn locate(&self, _frame: &Frame) -> Result<CornerSet, VisionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&call) {
            return Err(VisionError::BoardNotFound(format!("hand over board (call {call})")));
        }
        Ok(self.corners)
    }
}

/// Classifier that reads labels from preset grids, advancing one grid per
/// 64 calls and repeating the last one.
pub struct GridClassifier {
    grids: Vec<SquareGrid>,
    calls: AtomicUsize,
}

impl GridClassifier {
    pub fn fixed(grid: SquareGrid) -> Self {
        Self::sequence(vec![grid])
    }

    pub fn sequence(grids: Vec<SquareGrid>) -> Self {
        assert!(!grids.is_empty());
        Self {
            grids,
            calls: AtomicUsize::new(0),
        }
    }
}

impl SquareClassifier for GridClassifier {
    fn classify(&self, cell: &SquareCell) -> Result<SquareLabel, ClassifierError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let idx = (call / 64).min(self.grids.len() - 1);
        Ok(self.grids[idx].get(cell.row, cell.col))
    }
}

type Responder = Box<dyn FnMut(&str, usize) -> Result<EngineAnalysis, PipelineError> + Send>;

/// In-process engine. The responder gets the FEN and the 0-based call index.
pub struct StubEngine {
    respond: Responder,
    pub fens: Arc<Mutex<Vec<String>>>,
}

impl StubEngine {
    pub fn new<F>(respond: F) -> Self
    where
        F: FnMut(&str, usize) -> Result<EngineAnalysis, PipelineError> + Send + 'static,
    {
        Self {
            respond: Box::new(respond),
            fens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fixed(best_move: &str, evaluation: Evaluation) -> Self {
        let analysis = EngineAnalysis {
            best_move: best_move.to_string(),
            evaluation,
        };
        Self::new(move |_, _| Ok(analysis.clone()))
    }

    pub fn unavailable() -> Self {
        Self::new(|_, _| Err(PipelineError::EngineUnavailable("engine process exited".into())))
    }
}

impl PositionAnalyzer for StubEngine {
    async fn analyze(&mut self, fen: &str, _depth: u32) -> Result<EngineAnalysis, PipelineError> {
        let call = {
            let mut fens = self.fens.lock().unwrap();
            fens.push(fen.to_string());
            fens.len() - 1
        };
        (self.respond)(fen, call)
    }
}

pub struct ConstantModel {
    pub score: f64,
    pub dim: usize,
}

impl SuspicionModel for ConstantModel {
    fn input_dim(&self) -> usize {
        self.dim
    }

    fn predict(&self, _features: &[f64]) -> f64 {
        self.score
    }
}

pub fn constant_scorer(score: f64, dim: usize, threshold: f64) -> SuspicionScorer {
    SuspicionScorer::new(Arc::new(ConstantModel { score, dim }), threshold).unwrap()
}

/// Returns the same frame on every capture and counts the calls.
pub struct CountingSource {
    frame: Frame,
    limit: Option<usize>,
    pub captures: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            limit: None,
            captures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Report `SourceExhausted` after `limit` frames.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl FrameSource for CountingSource {
    fn capture(&mut self) -> Result<Frame, PipelineError> {
        let n = self.captures.fetch_add(1, Ordering::SeqCst);
        if self.limit.is_some_and(|limit| n >= limit) {
            return Err(PipelineError::SourceExhausted);
        }
        Ok(self.frame.clone())
    }
}

/// Board frame plus the corners a stub locator should report for it.
pub fn board_frame() -> (Frame, [(f64, f64); 4]) {
    (
        axis_board(200, 20, 20),
        [(20.0, 20.0), (180.0, 20.0), (180.0, 180.0), (20.0, 180.0)],
    )
}

/// Write an executable shell script speaking just enough UCI. `on_go` is the
/// shell snippet run for every `go` command.
#[cfg(unix)]
pub fn fake_uci_engine(dir: &Path, on_go: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        r#"#!/bin/sh
while read -r line; do
  case "$line" in
    uci) echo "id name FakeFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) {on_go} ;;
    quit) exit 0 ;;
  esac
done
"#
    );
    let path = dir.join("fakefish.sh");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
