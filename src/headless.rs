//! Log-only collaborators so the engine runs end-to-end without a window.

use async_trait::async_trait;
use riftfall_client::{AudioPlayer, Collaborators, SceneRenderer, UiReconciler};
use riftfall_protocol::{
    AssetAddress, EffectView, GameObjectId, GameView, InterfacePanel, MessageStyle,
    ObjectPosition, PanelAddress, PanelNode, ProjectileView, SceneLoadMode,
};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// Build the headless collaborator set.
pub fn collaborators() -> Collaborators {
    Collaborators {
        renderer: Box::new(HeadlessRenderer),
        ui: Box::new(HeadlessUi::default()),
        audio: Box::new(HeadlessAudio),
    }
}

struct HeadlessRenderer;

#[async_trait]
impl SceneRenderer for HeadlessRenderer {
    async fn update_view(&mut self, view: &GameView, animate: bool) {
        debug!(
            "render: view update ({} cards, animate={animate})",
            view.cards.len()
        );
    }

    async fn move_objects(&mut self, ids: &[GameObjectId], position: ObjectPosition, _animate: bool) {
        debug!("render: move {} objects to {position:?}", ids.len());
    }

    async fn play_effect(&mut self, effect: &EffectView) {
        debug!("render: effect {:?}", effect.address);
        // Honor the effect's declared duration so sequencing behaves as it
        // would with real animations.
        tokio::time::sleep(Duration::from_millis(effect.duration_ms)).await;
    }

    async fn fire_projectile(&mut self, projectile: &ProjectileView) {
        debug!(
            "render: projectile {:?} -> {:?}",
            projectile.source, projectile.target
        );
        tokio::time::sleep(Duration::from_millis(projectile.travel_ms)).await;
    }

    async fn load_scene(&mut self, name: &str, mode: SceneLoadMode) {
        info!("render: load scene {name} ({mode:?})");
    }
}

#[derive(Default)]
struct HeadlessUi {
    open: HashSet<PanelAddress>,
    elements: HashSet<String>,
}

#[async_trait]
impl UiReconciler for HeadlessUi {
    fn update_panels(&mut self, panels: &[InterfacePanel]) {
        for panel in panels {
            self.elements.extend(element_ids(&panel.root));
        }
        debug!("ui: {} panels updated", panels.len());
    }

    fn toggle_panel(&mut self, panel: &PanelAddress, open: bool) {
        debug!("ui: toggle {panel:?} open={open}");
        if open {
            self.open.insert(panel.clone());
        } else {
            self.open.remove(panel);
        }
    }

    async fn display_message(&mut self, message: &str, style: MessageStyle) {
        info!("ui: message ({style:?}): {message}");
    }

    fn element_exists(&self, id: &str) -> bool {
        self.elements.contains(id)
    }

    fn panel_open(&self, panel: &PanelAddress) -> bool {
        self.open.contains(panel)
    }

    fn input_locked(&self) -> bool {
        false
    }
}

fn element_ids(node: &PanelNode) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(id) = &node.id {
        ids.push(id.clone());
    }
    for child in &node.children {
        ids.extend(element_ids(child));
    }
    ids
}

struct HeadlessAudio;

impl AudioPlayer for HeadlessAudio {
    fn play_sound(&mut self, address: &AssetAddress) {
        debug!("audio: {address:?}");
    }
}
