//! Pipeline orchestrator: one sequential capture-to-verdict loop.
//!
//! ```text
//! Idle -> Capturing -> Locating -> Extracting -> Analyzing -> Scoring -> Reported -> Capturing ...
//!            any state --error--> Failed --transient--> Capturing
//!            cancellation at a cycle boundary --> Stopped
//! ```
//!
//! Exactly one `CycleRecord` is appended per `Reported` cycle; a failed cycle
//! appends nothing and leaves the move tracker untouched.

use board_vision::{classify_board, rectify, BoardLocator, SquareClassifier};
use chess_core::tracking::MoveTracker;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::capture::FrameSource;
use crate::error::PipelineError;
use crate::features::{extract, FeatureInput, FeatureLayout};
use crate::history::{CycleRecord, SessionHistory};
use crate::scorer::SuspicionScorer;
use crate::stockfish::PositionAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Capturing,
    Locating,
    Extracting,
    Analyzing,
    Scoring,
    Reported,
    Failed,
    Stopped,
}

/// Per-session knobs fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub search_depth: u32,
    pub canonical_size: usize,
    pub feature_layout: FeatureLayout,
    pub cycle_interval: std::time::Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            search_depth: 15,
            canonical_size: board_vision::DEFAULT_CANONICAL_SIZE,
            feature_layout: FeatureLayout::Eval,
            cycle_interval: std::time::Duration::ZERO,
        }
    }
}

/// Owns every collaborator of the loop. The engine handle lives only here.
pub struct Orchestrator<S, L, C, A> {
    source: S,
    locator: L,
    classifier: C,
    engine: A,
    scorer: SuspicionScorer,
    settings: PipelineSettings,
    tracker: MoveTracker,
    history: SessionHistory,
    /// Engine recommendation for the last reported placement.
    last_best_move: Option<String>,
    state: CycleState,
    cycle: u64,
}

impl<S, L, C, A> Orchestrator<S, L, C, A>
where
    S: FrameSource,
    L: BoardLocator,
    C: SquareClassifier,
    A: PositionAnalyzer,
{
    /// Takes an already-loaded scorer, so a model problem surfaces before any capture.
    pub fn new(
        source: S,
        locator: L,
        classifier: C,
        engine: A,
        scorer: SuspicionScorer,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        let model_width = scorer.input_dim();
        let layout_width = settings.feature_layout.len();
        if model_width != layout_width {
            return Err(PipelineError::DimensionMismatch {
                expected: model_width,
                got: layout_width,
            });
        }
        Ok(Self {
            source,
            locator,
            classifier,
            engine,
            scorer,
            settings,
            tracker: MoveTracker::new(),
            history: SessionHistory::new(),
            last_best_move: None,
            state: CycleState::Idle,
            cycle: 0,
        })
    }

    pub fn with_history(mut self, history: SessionHistory) -> Self {
        self.history = history;
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn engine_mut(&mut self) -> &mut A {
        &mut self.engine
    }

    /// Cycles started so far, including failed ones.
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    fn enter(&mut self, state: CycleState) {
        debug!(cycle = self.cycle, from = ?self.state, to = ?state, "State transition");
        self.state = state;
    }

    /// Run one cycle. On error the state is `Failed` and nothing was recorded.
    pub async fn run_cycle(&mut self) -> Result<CycleRecord, PipelineError> {
        self.cycle += 1;
        match self.try_cycle().await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.enter(CycleState::Failed);
                Err(e)
            }
        }
    }

    async fn try_cycle(&mut self) -> Result<CycleRecord, PipelineError> {
        let cycle = self.cycle;

        self.enter(CycleState::Capturing);
        let frame = self.source.capture()?;

        self.enter(CycleState::Locating);
        let corners = self.locator.locate(&frame)?;

        self.enter(CycleState::Extracting);
        let board = rectify(&frame, &corners, self.settings.canonical_size)?;
        let grid = classify_board(&board, &self.classifier)?;
        let observation = self.tracker.observe(&grid);
        let fen = observation.position(grid).fen();
        if observation.uncertain {
            warn!(cycle, fen = %fen, "Placement change not explained by one legal move, counters held");
        }

        self.enter(CycleState::Analyzing);
        let analysis = self.engine.analyze(&fen, self.settings.search_depth).await?;

        self.enter(CycleState::Scoring);
        let move_agreement = match (&observation.inferred_move, &self.last_best_move) {
            (Some(played), Some(best)) => Some(played == best),
            _ => None,
        };
        let features = extract(
            self.settings.feature_layout,
            &FeatureInput {
                fen: &fen,
                analysis: &analysis,
                move_agreement,
            },
        );
        let assessment = self.scorer.assess(&features)?;

        self.enter(CycleState::Reported);
        let record = CycleRecord {
            cycle,
            timestamp: Utc::now(),
            fen,
            best_move: analysis.best_move.clone(),
            evaluation: analysis.evaluation,
            features,
            score: assessment.score,
            verdict: assessment.verdict,
            inferred_move: observation.inferred_move.clone(),
            uncertain: observation.uncertain,
        };

        self.tracker.commit(&observation);
        self.last_best_move = Some(analysis.best_move);
        self.history.append(record.clone());

        info!(
            cycle,
            fen = %record.fen,
            best_move = %record.best_move,
            score = record.score,
            "Cycle reported"
        );
        if record.verdict {
            warn!(
                target: "sentinel::alert",
                cycle,
                fen = %record.fen,
                best_move = %record.best_move,
                suspicion_percent = record.suspicion_percent(),
                "Potential engine assistance detected"
            );
        }

        Ok(record)
    }

    /// Loop until cancelled or a fatal error. Cancellation is checked between cycles only.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), PipelineError> {
        info!("Starting capture loop");
        loop {
            if *shutdown.borrow() {
                info!(cycles = self.cycle, "Shutdown requested, stopping");
                self.enter(CycleState::Stopped);
                return Ok(());
            }

            match self.run_cycle().await {
                Ok(_) => {}
                Err(PipelineError::SourceExhausted) => {
                    info!(cycles = self.cycle, "Frame source exhausted, stopping");
                    self.enter(CycleState::Stopped);
                    return Ok(());
                }
                Err(e) if !e.is_fatal() => {
                    warn!(cycle = self.cycle, component = e.component(), error = %e, "Cycle failed");
                }
                Err(e) => {
                    error!(cycle = self.cycle, component = e.component(), error = %e, "Fatal pipeline error");
                    return Err(e);
                }
            }

            if !self.settings.cycle_interval.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.cycle_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
    }
}
