//! Worker configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;
use crate::features::FeatureLayout;

#[derive(Clone, Debug, PartialEq)]
pub struct SentinelConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Search depth in plies for every analysis
    pub search_depth: u32,

    pub engine_threads: u32,

    pub engine_hash_mb: u32,

    /// Image file (re-read every cycle) or directory of frames
    pub capture_device: PathBuf,

    /// Scores strictly above this are flagged
    pub suspicion_threshold: f64,

    /// Dense model artifact (JSON)
    pub model_path: PathBuf,

    pub feature_layout: FeatureLayout,

    /// Side of the rectified board image in pixels
    pub canonical_size: usize,

    /// Optional JSON-lines audit file for cycle records
    pub history_path: Option<PathBuf>,

    /// Pause between cycles
    pub cycle_interval: Duration,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "/usr/local/bin/stockfish".to_string(),
            search_depth: 15,
            engine_threads: 1,
            engine_hash_mb: 256,
            capture_device: PathBuf::from("frames"),
            suspicion_threshold: 0.5,
            model_path: PathBuf::from("models/cheat_detector.json"),
            feature_layout: FeatureLayout::Eval,
            canonical_size: 400,
            history_path: None,
            cycle_interval: Duration::ZERO,
        }
    }
}

impl SentinelConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let search_depth = parse_or(&lookup, "SEARCH_DEPTH", defaults.search_depth)?;
        if search_depth == 0 {
            return Err(PipelineError::Config("SEARCH_DEPTH must be positive".into()));
        }

        let suspicion_threshold =
            parse_or(&lookup, "SUSPICION_THRESHOLD", defaults.suspicion_threshold)?;
        if !(0.0..=1.0).contains(&suspicion_threshold) {
            return Err(PipelineError::Config(format!(
                "SUSPICION_THRESHOLD must be within [0, 1], got {suspicion_threshold}"
            )));
        }

        let canonical_size = parse_or(&lookup, "CANONICAL_SIZE", defaults.canonical_size)?;
        if canonical_size < 8 {
            return Err(PipelineError::Config(format!(
                "CANONICAL_SIZE must be at least 8, got {canonical_size}"
            )));
        }

        let cycle_interval_ms: u64 = parse_or(&lookup, "CYCLE_INTERVAL_MS", 0)?;

        Ok(Self {
            stockfish_path: lookup("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path),
            search_depth,
            engine_threads: parse_or(&lookup, "ENGINE_THREADS", defaults.engine_threads)?,
            engine_hash_mb: parse_or(&lookup, "ENGINE_HASH_MB", defaults.engine_hash_mb)?,
            capture_device: lookup("CAPTURE_DEVICE")
                .map(PathBuf::from)
                .unwrap_or(defaults.capture_device),
            suspicion_threshold,
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            feature_layout: parse_or(&lookup, "FEATURE_LAYOUT", defaults.feature_layout)?,
            canonical_size,
            history_path: lookup("HISTORY_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            cycle_interval: Duration::from_millis(cycle_interval_ms),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, PipelineError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::Config(format!("{key} has invalid value '{raw}'"))),
    }
}
