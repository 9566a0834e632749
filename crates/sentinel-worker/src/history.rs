//! Append-only session history of completed cycles.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PipelineError;
use crate::stockfish::Evaluation;

/// Snapshot of one reported cycle. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub fen: String,
    pub best_move: String,
    pub evaluation: Evaluation,
    pub features: Vec<f64>,
    pub score: f64,
    pub verdict: bool,
    /// UCI move that led to this position, when one could be inferred.
    pub inferred_move: Option<String>,
    /// Side to move and counters were held because the placement change was unexplained.
    pub uncertain: bool,
}

impl CycleRecord {
    /// Score as a percentage rounded to two decimals, as shown to operators.
    pub fn suspicion_percent(&self) -> f64 {
        (self.score * 10_000.0).round() / 100.0
    }
}

/// Records in cycle order, optionally mirrored to a JSON-lines audit file.
#[derive(Default)]
pub struct SessionHistory {
    records: Vec<CycleRecord>,
    audit: Option<BufWriter<File>>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audit_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| PipelineError::Config(format!("history file {}: {e}", path.display())))?;
        Ok(Self {
            records: Vec::new(),
            audit: Some(BufWriter::new(file)),
        })
    }

    /// Append a record. A failing audit write is logged and the file is dropped;
    /// the in-memory history stays complete.
    pub fn append(&mut self, record: CycleRecord) {
        if let Some(sink) = self.audit.as_mut() {
            let written = serde_json::to_writer(&mut *sink, &record)
                .map_err(std::io::Error::from)
                .and_then(|_| sink.write_all(b"\n"))
                .and_then(|_| sink.flush());
            if let Err(e) = written {
                warn!(error = %e, "Audit file write failed, disabling audit file");
                self.audit = None;
            }
        }
        self.records.push(record);
    }

    pub fn records(&self) -> &[CycleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&CycleRecord> {
        self.records.last()
    }

    pub fn flagged(&self) -> impl Iterator<Item = &CycleRecord> {
        self.records.iter().filter(|r| r.verdict)
    }
}
