//! Recording implementations of the collaborator traits.

use crate::EventLog;
use async_trait::async_trait;
use riftfall_client::{AudioPlayer, SceneRenderer, UiReconciler};
use riftfall_protocol::{
    AssetAddress, EffectView, GameObjectId, GameView, InterfacePanel, MessageStyle,
    ObjectPosition, PanelAddress, ProjectileView, SceneLoadMode,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Completion signal for simulated animations.
///
/// An open gate completes immediately; a manual gate suspends each awaited
/// operation until [`release`](Gate::release) is called once per pass.
#[derive(Clone)]
pub struct Gate {
    permits: Option<Arc<Semaphore>>,
}

impl Gate {
    /// Gate that never suspends.
    pub fn open() -> Self {
        Self { permits: None }
    }

    /// Gate that suspends until released, once per pass.
    pub fn manual() -> Self {
        Self {
            permits: Some(Arc::new(Semaphore::new(0))),
        }
    }

    /// Allow one pending or future pass through.
    pub fn release(&self) {
        if let Some(permits) = &self.permits {
            permits.add_permits(1);
        }
    }

    /// Wait for the gate.
    pub async fn pass(&self) {
        if let Some(permits) = &self.permits {
            permits
                .acquire()
                .await
                .expect("gate semaphore closed")
                .forget();
        }
    }
}

/// Renderer double: records begin/end windows around every operation and
/// completes through its gate.
pub struct RecordingRenderer {
    log: EventLog,
    gate: Gate,
}

impl RecordingRenderer {
    /// Create a renderer writing to `log`, gated by `gate`.
    pub fn new(log: EventLog, gate: Gate) -> Self {
        Self { log, gate }
    }

    async fn run(&self, label: &str) {
        self.log.begin(label);
        self.gate.pass().await;
        self.log.end(label);
    }
}

#[async_trait]
impl SceneRenderer for RecordingRenderer {
    async fn update_view(&mut self, _view: &GameView, _animate: bool) {
        self.run("update_view").await;
    }

    async fn move_objects(
        &mut self,
        _ids: &[GameObjectId],
        _position: ObjectPosition,
        _animate: bool,
    ) {
        self.run("move_objects").await;
    }

    async fn play_effect(&mut self, _effect: &EffectView) {
        self.run("play_effect").await;
    }

    async fn fire_projectile(&mut self, _projectile: &ProjectileView) {
        self.run("fire_projectile").await;
    }

    async fn load_scene(&mut self, name: &str, _mode: SceneLoadMode) {
        self.run(&format!("load_scene:{name}")).await;
    }
}

/// Mutable UI state shared between a [`RecordingUi`] and the test body.
#[derive(Debug, Default)]
pub struct UiState {
    /// Whether input is currently captured.
    pub locked: bool,
    /// Element ids that currently exist.
    pub elements: HashSet<String>,
    /// Panels currently open.
    pub open_panels: HashSet<PanelAddress>,
    /// Panel definitions received, in arrival order.
    pub panel_updates: Vec<Vec<InterfacePanel>>,
}

/// UI double: records operations and answers queries from a shared state.
pub struct RecordingUi {
    log: EventLog,
    state: Arc<Mutex<UiState>>,
}

impl RecordingUi {
    /// Create a UI double writing to `log` with shared `state`.
    pub fn new(log: EventLog, state: Arc<Mutex<UiState>>) -> Self {
        Self { log, state }
    }
}

#[async_trait]
impl UiReconciler for RecordingUi {
    fn update_panels(&mut self, panels: &[InterfacePanel]) {
        self.log.instant("update_panels");
        let mut state = self.state.lock().expect("ui state");
        state.panel_updates.push(panels.to_vec());
        for panel in panels {
            state.elements.extend(element_ids(&panel.root));
        }
    }

    fn toggle_panel(&mut self, panel: &PanelAddress, open: bool) {
        self.log
            .instant(&format!("toggle_panel:{}:{}", panel.0, open));
        let mut state = self.state.lock().expect("ui state");
        if open {
            state.open_panels.insert(panel.clone());
        } else {
            state.open_panels.remove(panel);
        }
    }

    async fn display_message(&mut self, message: &str, _style: MessageStyle) {
        self.log.begin(&format!("display_message:{message}"));
        self.log.end(&format!("display_message:{message}"));
    }

    fn element_exists(&self, id: &str) -> bool {
        self.state.lock().expect("ui state").elements.contains(id)
    }

    fn panel_open(&self, panel: &PanelAddress) -> bool {
        self.state
            .lock()
            .expect("ui state")
            .open_panels
            .contains(panel)
    }

    fn input_locked(&self) -> bool {
        self.state.lock().expect("ui state").locked
    }
}

fn element_ids(node: &riftfall_protocol::PanelNode) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(id) = &node.id {
        ids.push(id.clone());
    }
    for child in &node.children {
        ids.extend(element_ids(child));
    }
    ids
}

/// Audio double: records fire-and-forget sound cues.
pub struct RecordingAudio {
    log: EventLog,
}

impl RecordingAudio {
    /// Create an audio double writing to `log`.
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl AudioPlayer for RecordingAudio {
    fn play_sound(&mut self, address: &AssetAddress) {
        self.log.instant(&format!("sound:{}", address.0));
    }
}
