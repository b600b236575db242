//! The single point of entry for locally-initiated intents.
//!
//! Enforces at-most-one in-flight request, applies immediate and speculative
//! effects on submission, and preserves strict FIFO dispatch order for
//! everything else.

use crate::collaborators::{Collaborators, UiReconciler};
use crate::interpreter::CommandInterpreter;
use crate::view::LocalView;
use crate::ActionError;
use riftfall_net::ClientSession;
use riftfall_protocol::{
    ClientAction, ClientMetadata, CommandList, GameCommand, GameRequest, PanelAddress,
    PlayerIdentifier,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Capability check callers perform before submitting an action.
///
/// Purely local actions and panel fetches are always permitted; anything
/// that mutates game state is refused while input is captured (modal overlay
/// open, drag in progress). [`ActionQueue::submit`] re-validates defensively.
pub fn can_submit(action: &ClientAction, ui: &dyn UiReconciler) -> bool {
    if action.is_local() || matches!(action, ClientAction::FetchPanel { .. }) {
        return true;
    }
    !ui.input_locked()
}

/// The action currently awaiting a server round trip.
///
/// Invariant: at most one of these exists at a time; the queue refuses to
/// dispatch while it is set.
struct PendingRequest {
    action: ClientAction,
    task: JoinHandle<anyhow::Result<CommandList>>,
}

/// Counters tracking queue activity.
#[derive(Debug, Clone, Default)]
pub struct QueueMetrics {
    /// Actions accepted by submit.
    pub submitted: u64,
    /// Actions dispatched to the server.
    pub dispatched: u64,
    /// Actions completed locally without a round trip.
    pub local_completions: u64,
    /// Actions dropped on transport failure.
    pub dropped: u64,
}

/// Result of a dispatch attempt.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Nothing to do: backlog empty or a request already in flight.
    Idle,
    /// A round trip was started.
    Started,
    /// The head action was purely local and completed immediately.
    CompletedLocally,
    /// The head action could not be sent; the connection is gone.
    Failed(ClientAction),
}

/// Result of polling the in-flight request.
#[derive(Debug)]
pub enum PollOutcome {
    /// No request in flight.
    Idle,
    /// The round trip is still running.
    InFlight,
    /// The round trip completed and its command list was queued.
    Completed,
    /// The round trip failed; the action is returned for accounting.
    Failed(ClientAction),
}

/// FIFO queue of player intents with a single in-flight slot.
pub struct ActionQueue {
    backlog: VecDeque<ClientAction>,
    pending: Option<PendingRequest>,
    metrics: QueueMetrics,
}

impl ActionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            backlog: VecDeque::new(),
            pending: None,
            metrics: QueueMetrics::default(),
        }
    }

    /// Accept a player intent.
    ///
    /// Fails synchronously if the capability check refuses the action. On
    /// acceptance: immediate effects (panel toggles, sound cues in a
    /// pre-supplied update) run now, out of queue order; a speculative
    /// update is queued for the interpreter; the action joins the backlog.
    pub fn submit(
        &mut self,
        action: ClientAction,
        collaborators: &mut Collaborators,
        interpreter: &mut CommandInterpreter,
        view: &mut LocalView,
    ) -> Result<(), ActionError> {
        if !can_submit(&action, collaborators.ui.as_ref()) {
            return Err(ActionError::NotPermitted("input is currently captured"));
        }
        action.verify().map_err(ActionError::Invalid)?;

        if let Some(update) = action.speculative_update() {
            let deferred = apply_immediate(update, collaborators, view);
            if !deferred.is_empty() {
                interpreter.enqueue(deferred);
            }
        } else if action.spends_action_point() {
            // Best-effort decrement of the visible action-point count; the
            // authoritative response overwrites it.
            let speculative = view.spend_action_point();
            interpreter.enqueue(CommandList::single(GameCommand::UpdateGameView {
                view: speculative,
                animate: false,
            }));
        }

        trace!("Queueing action {:?}", action);
        self.backlog.push_back(action);
        self.metrics.submitted += 1;
        Ok(())
    }

    /// Front-load actions so they dispatch before everything already queued.
    ///
    /// Used for panel replay after a reconnect; relative order of `actions`
    /// is preserved.
    pub fn enqueue_front(&mut self, actions: Vec<ClientAction>) {
        for action in actions.into_iter().rev() {
            self.backlog.push_front(action);
        }
    }

    /// Dispatch the head of the backlog, if the in-flight slot is free.
    ///
    /// Runs once per tick. Purely local actions complete here without a
    /// round trip and free the slot immediately.
    pub fn dispatch(
        &mut self,
        session: Option<Arc<ClientSession>>,
        player: PlayerIdentifier,
        metadata: ClientMetadata,
        open_panels: Vec<PanelAddress>,
    ) -> DispatchOutcome {
        if self.pending.is_some() {
            return DispatchOutcome::Idle;
        }
        let Some(action) = self.backlog.pop_front() else {
            return DispatchOutcome::Idle;
        };

        if action.is_local() {
            debug!("Local action completed without a round trip");
            self.metrics.local_completions += 1;
            return DispatchOutcome::CompletedLocally;
        }

        let Some(session) = session else {
            warn!("Dropping action with no live session: {:?}", action);
            self.metrics.dropped += 1;
            return DispatchOutcome::Failed(action);
        };

        let request = GameRequest {
            action: action.clone(),
            player,
            open_panels,
            metadata,
        };
        let task = tokio::spawn(async move { session.perform_action(&request).await });

        self.pending = Some(PendingRequest { action, task });
        self.metrics.dispatched += 1;
        DispatchOutcome::Started
    }

    /// Harvest the in-flight round trip if it has finished.
    ///
    /// A successful response is queued on the interpreter; a transport
    /// failure frees the slot and reports the dropped action.
    pub async fn poll_in_flight(&mut self, interpreter: &mut CommandInterpreter) -> PollOutcome {
        let Some(pending) = self.pending.take() else {
            return PollOutcome::Idle;
        };
        if !pending.task.is_finished() {
            self.pending = Some(pending);
            return PollOutcome::InFlight;
        }

        match pending.task.await {
            Ok(Ok(list)) => {
                interpreter.enqueue(list);
                PollOutcome::Completed
            }
            Ok(Err(err)) => {
                warn!("Action round trip failed: {}", err);
                self.metrics.dropped += 1;
                PollOutcome::Failed(pending.action)
            }
            Err(join_err) => {
                warn!("Action task aborted: {}", join_err);
                self.metrics.dropped += 1;
                PollOutcome::Failed(pending.action)
            }
        }
    }

    /// Drop every queued action.
    ///
    /// Called on transport failure: the connection is retried, the actions
    /// are not; the player re-issues them once connectivity returns.
    pub fn clear_backlog(&mut self) {
        if !self.backlog.is_empty() {
            warn!("Clearing {} queued actions", self.backlog.len());
            self.metrics.dropped += self.backlog.len() as u64;
            self.backlog.clear();
        }
    }

    /// Whether a request is currently in flight.
    pub fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of actions waiting to dispatch.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Current metrics.
    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }
}

impl Default for ActionQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the synchronously-safe commands of a pre-supplied update now.
///
/// Panel toggles and sound cues must not wait on a network round trip;
/// everything else in the update is returned for normal queued execution.
fn apply_immediate(
    update: &CommandList,
    collaborators: &mut Collaborators,
    view: &mut LocalView,
) -> CommandList {
    let mut deferred = Vec::new();
    for command in &update.commands {
        match command {
            GameCommand::TogglePanel { panel, open } => {
                view.set_panel_open(panel, *open);
                collaborators.ui.toggle_panel(panel, *open);
            }
            GameCommand::PlaySound { address } => {
                collaborators.audio.play_sound(address);
            }
            other => deferred.push(other.clone()),
        }
    }
    CommandList {
        commands: deferred,
        metadata: update.metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{AudioPlayer, SceneRenderer, UiReconciler};
    use async_trait::async_trait;
    use riftfall_protocol::{
        AssetAddress, EffectView, GameObjectId, GameView, InterfacePanel, MessageStyle,
        ObjectPosition, PlayerSide, ProjectileView, SceneLoadMode, StandardAction,
    };
    use std::sync::{Arc, Mutex};

    struct NullRenderer;

    #[async_trait]
    impl SceneRenderer for NullRenderer {
        async fn update_view(&mut self, _view: &GameView, _animate: bool) {}
        async fn move_objects(
            &mut self,
            _ids: &[GameObjectId],
            _position: ObjectPosition,
            _animate: bool,
        ) {
        }
        async fn play_effect(&mut self, _effect: &EffectView) {}
        async fn fire_projectile(&mut self, _projectile: &ProjectileView) {}
        async fn load_scene(&mut self, _name: &str, _mode: SceneLoadMode) {}
    }

    struct LockableUi {
        locked: bool,
        toggles: Arc<Mutex<Vec<(PanelAddress, bool)>>>,
    }

    #[async_trait]
    impl UiReconciler for LockableUi {
        fn update_panels(&mut self, _panels: &[InterfacePanel]) {}
        fn toggle_panel(&mut self, panel: &PanelAddress, open: bool) {
            self.toggles
                .lock()
                .expect("toggle log")
                .push((panel.clone(), open));
        }
        async fn display_message(&mut self, _message: &str, _style: MessageStyle) {}
        fn element_exists(&self, _id: &str) -> bool {
            false
        }
        fn panel_open(&self, _panel: &PanelAddress) -> bool {
            false
        }
        fn input_locked(&self) -> bool {
            self.locked
        }
    }

    struct NullAudio {
        played: Arc<Mutex<Vec<AssetAddress>>>,
    }

    impl AudioPlayer for NullAudio {
        fn play_sound(&mut self, address: &AssetAddress) {
            self.played.lock().expect("audio log").push(address.clone());
        }
    }

    struct Harness {
        queue: ActionQueue,
        collaborators: Collaborators,
        interpreter: CommandInterpreter,
        view: LocalView,
        toggles: Arc<Mutex<Vec<(PanelAddress, bool)>>>,
        played: Arc<Mutex<Vec<AssetAddress>>>,
    }

    fn harness(locked: bool) -> Harness {
        let toggles = Arc::new(Mutex::new(Vec::new()));
        let played = Arc::new(Mutex::new(Vec::new()));
        Harness {
            queue: ActionQueue::new(),
            collaborators: Collaborators {
                renderer: Box::new(NullRenderer),
                ui: Box::new(LockableUi {
                    locked,
                    toggles: Arc::clone(&toggles),
                }),
                audio: Box::new(NullAudio {
                    played: Arc::clone(&played),
                }),
            },
            interpreter: CommandInterpreter::new(),
            view: LocalView::new(PlayerSide::Riftborn),
            toggles,
            played,
        }
    }

    fn submit(h: &mut Harness, action: ClientAction) -> Result<(), ActionError> {
        h.queue
            .submit(action, &mut h.collaborators, &mut h.interpreter, &mut h.view)
    }

    #[test]
    fn capability_violation_rejected_synchronously() {
        let mut h = harness(true);
        let result = submit(&mut h, ClientAction::DrawCard);
        assert!(matches!(result, Err(ActionError::NotPermitted(_))));
        assert_eq!(h.queue.backlog_len(), 0);
    }

    #[test]
    fn panel_fetch_allowed_while_locked() {
        let mut h = harness(true);
        submit(
            &mut h,
            ClientAction::FetchPanel {
                panel: PanelAddress::new("menu/settings"),
            },
        )
        .expect("fetch allowed");
        assert_eq!(h.queue.backlog_len(), 1);
    }

    #[test]
    fn speculative_decrement_queued_for_interpreter() {
        let mut h = harness(false);
        submit(&mut h, ClientAction::DrawCard).expect("submit");
        assert_eq!(h.interpreter.queued_lists(), 1);
        assert_eq!(h.queue.backlog_len(), 1);
    }

    #[test]
    fn immediate_effects_apply_out_of_queue_order() {
        let mut h = harness(false);
        let panel = PanelAddress::new("menu/shop");
        let update = CommandList {
            commands: vec![
                GameCommand::TogglePanel {
                    panel: panel.clone(),
                    open: false,
                },
                GameCommand::PlaySound {
                    address: AssetAddress::new("audio/click"),
                },
                GameCommand::Delay { milliseconds: 50 },
            ],
            metadata: Default::default(),
        };
        submit(
            &mut h,
            ClientAction::StandardAction(StandardAction {
                payload: vec![9],
                update: Some(update),
            }),
        )
        .expect("submit");

        // Toggle and sound ran synchronously; the delay was deferred.
        assert_eq!(
            &*h.toggles.lock().expect("toggle log"),
            &[(panel, false)]
        );
        assert_eq!(h.played.lock().expect("audio log").len(), 1);
        assert_eq!(h.interpreter.queued_lists(), 1);
    }

    #[tokio::test]
    async fn local_action_completes_without_network() {
        let mut h = harness(false);
        submit(
            &mut h,
            ClientAction::StandardAction(StandardAction {
                payload: vec![],
                update: None,
            }),
        )
        .expect("submit");

        let outcome = h.queue.dispatch(
            None,
            PlayerIdentifier(1),
            ClientMetadata::default(),
            vec![],
        );
        assert!(matches!(outcome, DispatchOutcome::CompletedLocally));
        assert!(!h.queue.in_flight());
        assert_eq!(h.queue.metrics().local_completions, 1);
    }

    #[tokio::test]
    async fn offline_dispatch_drops_action() {
        let mut h = harness(false);
        submit(&mut h, ClientAction::GainMana).expect("submit");

        let outcome = h.queue.dispatch(
            None,
            PlayerIdentifier(1),
            ClientMetadata::default(),
            vec![],
        );
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed(ClientAction::GainMana)
        ));
        assert_eq!(h.queue.metrics().dropped, 1);
    }

    #[test]
    fn backlog_preserves_fifo_order() {
        let mut h = harness(false);
        submit(&mut h, ClientAction::GainMana).expect("submit");
        submit(&mut h, ClientAction::DrawCard).expect("submit");
        submit(
            &mut h,
            ClientAction::InitiateRaid {
                room: riftfall_protocol::RoomIdentifier::Vault,
            },
        )
        .expect("submit");

        assert_eq!(h.queue.backlog_len(), 3);
    }

    #[test]
    fn replay_actions_jump_the_backlog() {
        let mut h = harness(false);
        submit(&mut h, ClientAction::GainMana).expect("submit");

        let replay = vec![
            ClientAction::FetchPanel {
                panel: PanelAddress::new("panel/a"),
            },
            ClientAction::FetchPanel {
                panel: PanelAddress::new("panel/b"),
            },
        ];
        h.queue.enqueue_front(replay);

        // Head of the backlog is now the first replay fetch.
        let outcome = h.queue.dispatch(
            None,
            PlayerIdentifier(1),
            ClientMetadata::default(),
            vec![],
        );
        match outcome {
            DispatchOutcome::Failed(ClientAction::FetchPanel { panel }) => {
                assert_eq!(panel, PanelAddress::new("panel/a"));
            }
            other => panic!("expected failed fetch dispatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn poll_with_nothing_in_flight_is_idle() {
        let mut h = harness(false);
        let outcome = h.queue.poll_in_flight(&mut h.interpreter).await;
        assert!(matches!(outcome, PollOutcome::Idle));
    }
}
