#![warn(missing_docs)]
//! The riftfall action/command synchronization engine.
//!
//! Accepts player intents, serializes at most one outstanding request to the
//! server while queueing the rest, applies speculative local effects before
//! confirmation, executes server-issued command batches strictly in order
//! with cooperative suspension between steps, and recovers the session
//! automatically after network failure.

mod client;
mod collaborators;
mod connection;
mod interpreter;
mod prefetch;
mod queue;
mod view;
mod waits;

pub use client::GameClient;
pub use collaborators::{AudioPlayer, Collaborators, SceneRenderer, UiReconciler};
pub use connection::{ConnectionManager, SessionState, RECONNECT_WAIT};
pub use interpreter::{CommandInterpreter, InterpreterMetrics};
pub use prefetch::collect_assets;
pub use queue::{can_submit, ActionQueue, DispatchOutcome, PollOutcome, QueueMetrics};
pub use view::LocalView;
pub use waits::WaitGroup;

use thiserror::Error;

/// Errors raised at the engine's contract boundaries.
///
/// Transport failures are never surfaced here; they become state
/// transitions on the connection manager instead.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The capability check refused the action. A stale UI event usually
    /// means the caller skipped its own check.
    #[error("action not currently permitted: {0}")]
    NotPermitted(&'static str),
    /// The action failed its limit checks.
    #[error("invalid action: {0}")]
    Invalid(&'static str),
    /// A command arrived without a required sub-field.
    #[error("command data missing required field: {0}")]
    MissingField(&'static str),
    /// A second command list tried to start while one was executing.
    #[error("a command list is already being handled")]
    AlreadyHandling,
}
