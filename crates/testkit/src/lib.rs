#![warn(missing_docs)]
//! Deterministic test surfaces for the sync engine.
//!
//! Recording collaborator doubles, manually-released animation gates, a
//! counting asset fetcher and an in-process scripted game server.

mod doubles;
mod fetcher;
mod server;

pub use doubles::{Gate, RecordingAudio, RecordingRenderer, RecordingUi, UiState};
pub use fetcher::ScriptedFetcher;
pub use server::ScriptedServer;

use anyhow::Result;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Phase of a recorded collaborator event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// An awaited operation started.
    Begin,
    /// An awaited operation finished.
    End,
    /// A fire-and-forget operation happened.
    Instant,
}

/// One recorded collaborator event.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Monotonic sequence number.
    pub seq: u64,
    /// Operation label, e.g. `move_objects`.
    pub label: String,
    /// Event phase.
    pub phase: Phase,
}

/// Shared, ordered log of collaborator events.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<EventRecord>>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of an awaited operation.
    pub fn begin(&self, label: &str) {
        self.record(label, Phase::Begin);
    }

    /// Record the end of an awaited operation.
    pub fn end(&self, label: &str) {
        self.record(label, Phase::End);
    }

    /// Record a fire-and-forget operation.
    pub fn instant(&self, label: &str) {
        self.record(label, Phase::Instant);
    }

    fn record(&self, label: &str, phase: Phase) {
        let mut events = self.events.lock().expect("event log");
        let seq = events.len() as u64;
        events.push(EventRecord {
            seq,
            label: label.to_string(),
            phase,
        });
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().expect("event log").clone()
    }

    /// Labels of awaited operations, in begin order.
    pub fn begun_labels(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.phase == Phase::Begin)
            .map(|e| e.label)
            .collect()
    }

    /// Assert that no two awaited operations' active windows overlap.
    ///
    /// Every `Begin` must be closed by a matching `End` before the next
    /// `Begin`; this is the interpreter's sequential-await discipline.
    pub fn assert_sequential(&self) {
        let mut open: Option<String> = None;
        for event in self.events() {
            match event.phase {
                Phase::Begin => {
                    assert!(
                        open.is_none(),
                        "operation {:?} began while {:?} was still active",
                        event.label,
                        open
                    );
                    open = Some(event.label);
                }
                Phase::End => {
                    assert_eq!(
                        open.as_deref(),
                        Some(event.label.as_str()),
                        "unmatched end for {:?}",
                        event.label
                    );
                    open = None;
                }
                Phase::Instant => {}
            }
        }
        assert!(open.is_none(), "operation {:?} never ended", open);
    }

    /// Write the log as newline-delimited JSON for offline inspection.
    pub fn dump_jsonl<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        for event in self.events() {
            let line = serde_json::to_string(&event)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }
}
