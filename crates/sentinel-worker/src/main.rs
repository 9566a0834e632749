//! Board sentinel worker
//!
//! Watches a physical board through a capture device, analyzes every observed
//! position with Stockfish and raises an alert when the suspicion model flags
//! the play. `--replay <game.pgn>` scores a recorded game instead.

use anyhow::Context;
use board_vision::{ChessboardLocator, EmptyClassifier};
use chess_core::game_data::GameData;
use chess_core::pgn::parse_pgn;
use sentinel_worker::capture::ImageFileSource;
use sentinel_worker::config::SentinelConfig;
use sentinel_worker::history::SessionHistory;
use sentinel_worker::pipeline::{Orchestrator, PipelineSettings};
use sentinel_worker::replay::replay_game;
use sentinel_worker::scorer::SuspicionScorer;
use sentinel_worker::stockfish::{EngineOptions, StockfishEngine};
use sentinel_worker::PipelineError;
use tokio::sync::watch;
use tracing::{info, warn};

/// Parse --replay path/to/game.pgn from CLI args
fn parse_replay() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| a == "--replay")
        .and_then(|i| args.get(i + 1).cloned())
}

fn fatal(e: PipelineError) -> anyhow::Error {
    anyhow::anyhow!("{} failed: {e}", e.component())
}

fn load_game(path: &str) -> anyhow::Result<GameData> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("replay failed: reading PGN {path}"))?;
    parse_pgn(&text).map_err(|e| fatal(PipelineError::Pgn(e)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let config = SentinelConfig::load().map_err(fatal)?;
    info!(
        stockfish_path = %config.stockfish_path,
        depth = config.search_depth,
        capture_device = %config.capture_device.display(),
        layout = %config.feature_layout,
        "Sentinel config loaded"
    );

    // Model first: a missing artifact must fail before any frame is captured.
    let scorer =
        SuspicionScorer::load(&config.model_path, config.suspicion_threshold).map_err(fatal)?;

    let history = match &config.history_path {
        Some(path) => SessionHistory::with_audit_file(path).map_err(fatal)?,
        None => SessionHistory::new(),
    };

    let options = EngineOptions {
        threads: config.engine_threads,
        hash_mb: config.engine_hash_mb,
    };

    if let Some(pgn_path) = parse_replay() {
        let game = load_game(&pgn_path)?;

        let mut engine = StockfishEngine::new(&config.stockfish_path, options)
            .await
            .map_err(fatal)?;
        let mut history = history;
        let summary = replay_game(
            &mut engine,
            &scorer,
            config.feature_layout,
            config.search_depth,
            &game,
            &mut history,
        )
        .await
        .map_err(fatal);
        engine.quit().await;
        let summary = summary?;

        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let source = ImageFileSource::open(&config.capture_device).map_err(fatal)?;
    let engine = StockfishEngine::new(&config.stockfish_path, options)
        .await
        .map_err(fatal)?;

    let settings = PipelineSettings {
        search_depth: config.search_depth,
        canonical_size: config.canonical_size,
        feature_layout: config.feature_layout,
        cycle_interval: config.cycle_interval,
    };
    let mut orchestrator = Orchestrator::new(
        source,
        ChessboardLocator::default(),
        EmptyClassifier,
        engine,
        scorer,
        settings,
    )
    .map_err(fatal)?
    .with_history(history);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received, finishing current cycle");
        let _ = shutdown_tx.send(true);
    });

    let outcome = orchestrator.run(shutdown_rx).await;

    info!("Shutting down Stockfish engine");
    orchestrator.engine_mut().quit().await;

    let history = orchestrator.history();
    info!(
        records = history.len(),
        flagged = history.flagged().count(),
        "Session finished"
    );
    outcome.map_err(fatal)
}

/// Ctrl-C everywhere, plus SIGTERM on Unix.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_pgn_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.pgn");
        let path = path.to_str().unwrap();
        let err = load_game(path).unwrap_err().to_string();
        assert!(err.starts_with("replay failed"), "{err}");
        assert!(err.contains(path), "{err}");
    }

    #[test]
    fn test_pgn_file_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[White \"alice\"]\n\n1. e4 e5 *").unwrap();
        let game = load_game(file.path().to_str().unwrap()).unwrap();
        assert_eq!(game.metadata.white, "alice");
        assert_eq!(game.moves.len(), 2);
    }
}
