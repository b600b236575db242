//! Session lifecycle: connect, failure detection, timed reconnect, replay.

use crate::interpreter::CommandInterpreter;
use crate::view::LocalView;
use crate::waits::WaitGroup;
use anyhow::{Context, Result};
use riftfall_net::{ClientEndpoint, ClientSession};
use riftfall_protocol::{ClientAction, ClientMetadata, PlayerIdentifier};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Wait reason registered while the connection is degraded.
pub const RECONNECT_WAIT: &str = "reconnecting";

/// Maximum pushed command lists drained per tick.
const MAX_PUSH_PER_TICK: usize = 32;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session and no attempt scheduled.
    Disconnected,
    /// A connect attempt is running.
    Connecting,
    /// The server-push channel is active.
    Streaming,
    /// The session was lost; a timed reconnect is pending.
    Degraded,
}

/// Owns the session and its recovery loop.
///
/// State transitions happen only here, in response to transport events or
/// timer ticks.
pub struct ConnectionManager {
    endpoint: ClientEndpoint,
    server_addr: SocketAddr,
    player: PlayerIdentifier,
    metadata: ClientMetadata,
    state: SessionState,
    session: Option<Arc<ClientSession>>,
    reconnect: bool,
    retry_interval: Duration,
    last_attempt: Option<Instant>,
    waits: WaitGroup,
    logged_context: Option<(PlayerIdentifier, ClientMetadata)>,
}

impl ConnectionManager {
    /// Create a manager for the given server and identity.
    pub fn new(
        endpoint: ClientEndpoint,
        server_addr: SocketAddr,
        player: PlayerIdentifier,
        metadata: ClientMetadata,
        retry_interval: Duration,
    ) -> Self {
        Self {
            endpoint,
            server_addr,
            player,
            metadata,
            state: SessionState::Disconnected,
            session: None,
            reconnect: false,
            retry_interval,
            last_attempt: None,
            waits: WaitGroup::new(),
            logged_context: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The live session, when streaming.
    pub fn session(&self) -> Option<Arc<ClientSession>> {
        self.session.clone()
    }

    /// Player this manager connects as.
    pub fn player(&self) -> PlayerIdentifier {
        self.player
    }

    /// Metadata attached to every request.
    pub fn metadata(&self) -> ClientMetadata {
        self.metadata.clone()
    }

    /// Whether the loading indicator should be visible.
    pub fn is_waiting(&self) -> bool {
        self.waits.is_waiting()
    }

    /// Register an external wait reason.
    pub fn begin_wait(&mut self, reason: &'static str) {
        self.waits.begin_wait(reason);
    }

    /// Release an external wait reason.
    pub fn end_wait(&mut self, reason: &'static str) {
        self.waits.end_wait(reason);
    }

    /// Establish the initial session.
    ///
    /// On success returns the panel-replay actions the caller must front-load
    /// before dispatching anything else. On failure the manager enters
    /// Degraded and the timed retry loop takes over.
    pub async fn connect(&mut self, view: &LocalView) -> Result<Vec<ClientAction>> {
        self.last_attempt = Some(Instant::now());
        self.establish(view).await
    }

    /// Drive the reconnect timer.
    ///
    /// While Degraded with the reconnect flag set, attempts a new session on
    /// the fixed retry interval. Returns replay actions when a reconnect
    /// succeeds, an empty list otherwise.
    pub async fn tick(&mut self, now: Instant, view: &LocalView) -> Vec<ClientAction> {
        if self.state != SessionState::Degraded || !self.reconnect {
            return Vec::new();
        }
        let due = self
            .last_attempt
            .map_or(true, |at| now.duration_since(at) >= self.retry_interval);
        if !due {
            return Vec::new();
        }

        self.last_attempt = Some(now);
        match self.establish(view).await {
            Ok(replay) => replay,
            Err(err) => {
                debug!("Reconnect attempt failed: {:#}", err);
                Vec::new()
            }
        }
    }

    /// Drain pushed command lists without blocking the tick.
    pub async fn pump(&mut self, interpreter: &mut CommandInterpreter) {
        let Some(session) = self.session.clone() else {
            return;
        };

        for _ in 0..MAX_PUSH_PER_TICK {
            match timeout(Duration::from_millis(0), session.next_command_list()).await {
                Ok(Ok(list)) => interpreter.enqueue(list),
                Ok(Err(err)) => {
                    warn!("Push stream closed: {:#}", err);
                    self.notify_transport_failure();
                    break;
                }
                Err(_) => break, // no more messages ready
            }
        }
    }

    /// Record a transport failure observed elsewhere (e.g. a failed unary
    /// call) and begin degraded recovery.
    pub fn notify_transport_failure(&mut self) {
        if self.state != SessionState::Streaming {
            return;
        }
        if let Some(session) = self.session.take() {
            session.close("transport failure");
        }
        self.last_attempt = Some(Instant::now());
        self.set_state(SessionState::Degraded);
    }

    /// Close the session deliberately and stop reconnecting.
    pub fn shutdown(&mut self, reason: &str) {
        self.reconnect = false;
        if let Some(session) = self.session.take() {
            session.close(reason);
        }
        self.set_state(SessionState::Disconnected);
    }

    async fn establish(&mut self, view: &LocalView) -> Result<Vec<ClientAction>> {
        self.set_state(SessionState::Connecting);

        let result = async {
            let connection = self
                .endpoint
                .connect(self.server_addr)
                .await
                .context("Transport connect failed")?;
            ClientSession::connect(connection, self.player, self.metadata.clone())
                .await
                .context("Session connect failed")
        }
        .await;

        match result {
            Ok(session) => {
                self.session = Some(Arc::new(session));
                self.reconnect = true;
                self.set_state(SessionState::Streaming);
                self.log_session_context();

                // The server has no memory of open panels; re-request them
                // before any queued action dispatches.
                let replay: Vec<ClientAction> = view
                    .open_panels()
                    .into_iter()
                    .map(|panel| ClientAction::FetchPanel { panel })
                    .collect();
                if !replay.is_empty() {
                    info!("Replaying {} open panel fetches", replay.len());
                }
                Ok(replay)
            }
            Err(err) => {
                warn!("Connect to {} failed: {:#}", self.server_addr, err);
                self.set_state(SessionState::Degraded);
                Err(err)
            }
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        info!("Session state: {:?} -> {:?}", self.state, next);
        self.state = next;

        // The indicator stays visible across Degraded -> Connecting retry
        // cycles; it clears only once a session is live again or the manager
        // is shut down.
        match next {
            SessionState::Degraded => {
                if !self.waits.is_waiting_on(RECONNECT_WAIT) {
                    self.waits.begin_wait(RECONNECT_WAIT);
                }
            }
            SessionState::Streaming | SessionState::Disconnected => {
                if self.waits.is_waiting_on(RECONNECT_WAIT) {
                    self.waits.end_wait(RECONNECT_WAIT);
                }
            }
            SessionState::Connecting => {}
        }
    }

    fn log_session_context(&mut self) {
        let current = (self.player, self.metadata.clone());
        if self.logged_context.as_ref() != Some(&current) {
            info!(
                "Session context: player={:?} build={:?} device={:?}",
                self.player, self.metadata.build, self.metadata.device
            );
            self.logged_context = Some(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftfall_net::TlsMode;
    use riftfall_protocol::PlayerSide;

    fn manager() -> ConnectionManager {
        let endpoint = ClientEndpoint::new(TlsMode::InsecureSkipVerify).expect("endpoint");
        ConnectionManager::new(
            endpoint,
            "127.0.0.1:1".parse().expect("addr"),
            PlayerIdentifier(3),
            ClientMetadata::default(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn starts_disconnected_without_waits() {
        let manager = manager();
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert!(!manager.is_waiting());
        assert!(manager.session().is_none());
    }

    #[tokio::test]
    async fn failure_notification_requires_streaming() {
        let mut manager = manager();
        manager.notify_transport_failure();
        assert_eq!(manager.state(), SessionState::Disconnected);
        assert!(!manager.is_waiting());
    }

    #[tokio::test]
    async fn failed_connect_enters_degraded_with_indicator() {
        let mut manager = manager();
        let view = LocalView::new(PlayerSide::Riftborn);

        // Nothing listens on port 1; the attempt must fail fast.
        let result = manager.connect(&view).await;
        assert!(result.is_err());
        assert_eq!(manager.state(), SessionState::Degraded);
        assert!(manager.is_waiting());
    }

    #[tokio::test]
    async fn tick_respects_retry_interval() {
        let mut manager = manager();
        let view = LocalView::new(PlayerSide::Riftborn);
        let _ = manager.connect(&view).await;

        let attempt_time = manager.last_attempt.expect("attempt recorded");

        // Immediately after a failed attempt the timer is not due.
        let replay = manager.tick(attempt_time, &view).await;
        assert!(replay.is_empty());
        assert_eq!(manager.last_attempt, Some(attempt_time));

        // One interval later another attempt fires (and fails again).
        let later = attempt_time + Duration::from_secs(1);
        let _ = manager.tick(later, &view).await;
        assert_eq!(manager.last_attempt, Some(later));
        assert_eq!(manager.state(), SessionState::Degraded);
        // The indicator never dropped across the retry cycle.
        assert!(manager.is_waiting());
    }

    #[tokio::test]
    async fn external_wait_reasons_counted() {
        let mut manager = manager();
        manager.begin_wait("loading-assets");
        manager.begin_wait("loading-assets");
        manager.end_wait("loading-assets");
        assert!(manager.is_waiting());
        manager.end_wait("loading-assets");
        assert!(!manager.is_waiting());
    }
}
