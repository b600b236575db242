//! Engine wiring and the per-tick scheduler.

use crate::collaborators::Collaborators;
use crate::connection::{ConnectionManager, SessionState};
use crate::interpreter::{CommandInterpreter, InterpreterMetrics};
use crate::queue::{self, ActionQueue, DispatchOutcome, PollOutcome, QueueMetrics};
use crate::view::LocalView;
use crate::ActionError;
use anyhow::Result;
use riftfall_assets::AssetCache;
use riftfall_protocol::{ClientAction, PlayerSide};
use std::time::Instant;

/// The assembled synchronization engine.
///
/// Owns the action queue, connection manager, command interpreter and their
/// shared state; everything is wired together here at startup and driven by
/// an explicit [`tick`](GameClient::tick).
pub struct GameClient {
    queue: ActionQueue,
    connection: ConnectionManager,
    interpreter: CommandInterpreter,
    collaborators: Collaborators,
    assets: AssetCache,
    view: LocalView,
}

impl GameClient {
    /// Assemble an engine from its parts.
    pub fn new(
        connection: ConnectionManager,
        collaborators: Collaborators,
        assets: AssetCache,
        side: PlayerSide,
    ) -> Self {
        Self {
            queue: ActionQueue::new(),
            connection,
            interpreter: CommandInterpreter::new(),
            collaborators,
            assets,
            view: LocalView::new(side),
        }
    }

    /// Establish the initial session.
    ///
    /// On failure the connection manager is left in Degraded and the tick
    /// loop retries on its fixed interval.
    pub async fn connect(&mut self) -> Result<()> {
        let replay = self.connection.connect(&self.view).await?;
        self.queue.enqueue_front(replay);
        Ok(())
    }

    /// Capability check for an action in the current UI state.
    pub fn can_submit(&self, action: &ClientAction) -> bool {
        queue::can_submit(action, self.collaborators.ui.as_ref())
    }

    /// Submit a player intent.
    pub fn submit(&mut self, action: ClientAction) -> Result<(), ActionError> {
        self.queue.submit(
            action,
            &mut self.collaborators,
            &mut self.interpreter,
            &mut self.view,
        )
    }

    /// Run one scheduler tick.
    ///
    /// In order: reconnect timer (front-loading panel replays), push-stream
    /// pump, in-flight harvest, one queued command list, backlog dispatch.
    pub async fn tick(&mut self, now: Instant) -> Result<(), ActionError> {
        let replay = self.connection.tick(now, &self.view).await;
        self.queue.enqueue_front(replay);

        self.connection.pump(&mut self.interpreter).await;

        if let PollOutcome::Failed(_) = self.queue.poll_in_flight(&mut self.interpreter).await {
            self.on_transport_failure();
        }

        self.interpreter
            .run_next(&mut self.collaborators, &mut self.assets, &mut self.view)
            .await?;

        let outcome = self.queue.dispatch(
            self.connection.session(),
            self.connection.player(),
            self.connection.metadata(),
            self.view.open_panels(),
        );
        if let DispatchOutcome::Failed(_) = outcome {
            self.on_transport_failure();
        }

        Ok(())
    }

    fn on_transport_failure(&mut self) {
        self.connection.notify_transport_failure();
        // Dropped actions are not retried; only the connection is. The
        // player re-issues them once connectivity returns.
        self.queue.clear_backlog();
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.connection.state()
    }

    /// Whether the loading indicator should be visible.
    pub fn is_waiting(&self) -> bool {
        self.connection.is_waiting()
    }

    /// Register an external wait reason.
    pub fn begin_wait(&mut self, reason: &'static str) {
        self.connection.begin_wait(reason);
    }

    /// Release an external wait reason.
    pub fn end_wait(&mut self, reason: &'static str) {
        self.connection.end_wait(reason);
    }

    /// Local view of the player's visible counters and open panels.
    pub fn view(&self) -> &LocalView {
        &self.view
    }

    /// Whether an action round trip is in flight.
    pub fn in_flight(&self) -> bool {
        self.queue.in_flight()
    }

    /// Number of actions waiting to dispatch.
    pub fn backlog_len(&self) -> usize {
        self.queue.backlog_len()
    }

    /// Number of command lists waiting to execute.
    pub fn queued_lists(&self) -> usize {
        self.interpreter.queued_lists()
    }

    /// Queue activity counters.
    pub fn queue_metrics(&self) -> &QueueMetrics {
        self.queue.metrics()
    }

    /// Interpreter activity counters.
    pub fn interpreter_metrics(&self) -> &InterpreterMetrics {
        self.interpreter.metrics()
    }

    /// Asset cache backing the prefetch barrier.
    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    /// Close the session deliberately and stop reconnecting.
    pub fn shutdown(&mut self, reason: &str) {
        self.connection.shutdown(reason);
    }
}
