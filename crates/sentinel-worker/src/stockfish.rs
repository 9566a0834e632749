//! Stockfish engine wrapper using UCI protocol (async I/O)

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use tracing::{debug, info};

use crate::error::PipelineError;

/// Engine score from the side to move's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Evaluation {
    Centipawn(i32),
    /// Mate in N moves (positive = side to move mates, negative = gets mated)
    Mate(i32),
}

/// Result of one search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineAnalysis {
    /// Best move in UCI notation
    pub best_move: String,
    pub evaluation: Evaluation,
}

/// Anything that can search a FEN to a fixed depth.
///
/// Takes `&mut self`: one search at a time per session.
#[allow(async_fn_in_trait)]
pub trait PositionAnalyzer {
    async fn analyze(&mut self, fen: &str, depth: u32) -> Result<EngineAnalysis, PipelineError>;
}

/// Engine process options sent during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub threads: u32,
    pub hash_mb: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 256,
        }
    }
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(path: &str, options: EngineOptions) -> Result<Self, PipelineError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| unavailable(format!("failed to spawn {path}: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| unavailable("engine stdin not captured"))?;
        let stdout = BufReader::new(
            process
                .stdout
                .take()
                .ok_or_else(|| unavailable("engine stdout not captured"))?,
        );

        let mut engine = Self {
            process,
            stdin,
            stdout,
        };

        // Initialize UCI
        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        engine
            .send(&format!("setoption name Threads value {}", options.threads))
            .await?;
        engine
            .send(&format!("setoption name Hash value {}", options.hash_mb))
            .await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        info!(path, threads = options.threads, hash_mb = options.hash_mb, "Engine ready");
        Ok(engine)
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), PipelineError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| unavailable(format!("failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| unavailable(format!("failed to flush engine stdin: {e}")))?;
        Ok(())
    }

    /// Read one line; end of stream means the process is gone.
    async fn read_line(&mut self, line: &mut String) -> Result<(), PipelineError> {
        line.clear();
        let n = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| unavailable(format!("failed to read from engine: {e}")))?;
        if n == 0 {
            return Err(unavailable("engine closed its output"));
        }
        debug!(line = line.trim(), "SF >");
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), PipelineError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            if line.trim() == expected {
                return Ok(());
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl PositionAnalyzer for StockfishEngine {
    async fn analyze(&mut self, fen: &str, depth: u32) -> Result<EngineAnalysis, PipelineError> {
        if depth == 0 {
            return Err(PipelineError::Config("search depth must be positive".into()));
        }
        validate_fen(fen)?;

        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut evaluation = None;
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if trimmed.starts_with("info") && trimmed.contains(" score ") {
                if let Some(cp) = parse_cp(trimmed) {
                    evaluation = Some(Evaluation::Centipawn(cp));
                } else if let Some(mate) = parse_mate(trimmed) {
                    evaluation = Some(Evaluation::Mate(mate));
                }
            } else if trimmed.starts_with("bestmove") {
                let best_move = trimmed.split_whitespace().nth(1).unwrap_or("(none)");
                if best_move == "(none)" {
                    return Err(invalid(fen, "engine found no legal move"));
                }
                let evaluation =
                    evaluation.ok_or_else(|| invalid(fen, "engine reported no score"))?;
                return Ok(EngineAnalysis {
                    best_move: best_move.to_string(),
                    evaluation,
                });
            }
        }
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Reject FENs the engine must never see.
pub fn validate_fen(fen: &str) -> Result<(), PipelineError> {
    let parsed: Fen = fen.parse().map_err(|e| invalid(fen, format!("{e}")))?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| invalid(fen, format!("{e}")))?;
    Ok(())
}

fn unavailable(msg: impl Into<String>) -> PipelineError {
    PipelineError::EngineUnavailable(msg.into())
}

fn invalid(fen: &str, reason: impl Into<String>) -> PipelineError {
    PipelineError::InvalidPosition {
        fen: fen.to_string(),
        reason: reason.into(),
    }
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    parse_after(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    parse_after(line, "mate")
}

fn parse_after(line: &str, key: &str) -> Option<i32> {
    let mut parts = line.split_whitespace();
    parts.find(|p| *p == key)?;
    parts.next()?.parse().ok()
}
