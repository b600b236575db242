//! Interfaces to the presentation layer.
//!
//! The sync engine never renders anything itself; it drives these
//! collaborators and, where an operation implies an animation, suspends until
//! the returned future resolves. Implementations live in the presentation
//! code and in the testkit doubles.

use async_trait::async_trait;
use riftfall_protocol::{
    AssetAddress, EffectView, GameObjectId, GameView, InterfacePanel, MessageStyle,
    ObjectPosition, PanelAddress, ProjectileView, SceneLoadMode,
};

/// Renders the board and its objects.
///
/// Every async operation resolves when the implied animation has fully
/// completed; the interpreter relies on this to sequence commands.
#[async_trait]
pub trait SceneRenderer: Send {
    /// Apply a (possibly partial) game view update.
    async fn update_view(&mut self, view: &GameView, animate: bool);

    /// Move objects to a board position.
    async fn move_objects(&mut self, ids: &[GameObjectId], position: ObjectPosition, animate: bool);

    /// Play a one-shot visual effect.
    async fn play_effect(&mut self, effect: &EffectView);

    /// Fire a projectile between two objects.
    async fn fire_projectile(&mut self, projectile: &ProjectileView);

    /// Load a rendering scene.
    async fn load_scene(&mut self, name: &str, mode: SceneLoadMode);
}

/// Reconciles the declarative interface layer.
#[async_trait]
pub trait UiReconciler: Send {
    /// Create or update panel definitions.
    fn update_panels(&mut self, panels: &[InterfacePanel]);

    /// Open or close a panel.
    fn toggle_panel(&mut self, panel: &PanelAddress, open: bool);

    /// Display a message to the player; resolves when dismissed or expired.
    async fn display_message(&mut self, message: &str, style: MessageStyle);

    /// Whether an element with this id currently exists.
    fn element_exists(&self, id: &str) -> bool;

    /// Whether the panel at this address is currently open.
    fn panel_open(&self, panel: &PanelAddress) -> bool;

    /// Whether input is currently captured (modal overlay open, drag in
    /// progress); gates action submission.
    fn input_locked(&self) -> bool;
}

/// Plays audio cues. Fire-and-forget: never gates command sequencing.
pub trait AudioPlayer: Send {
    /// Play a sound clip.
    fn play_sound(&mut self, address: &AssetAddress);
}

/// The presentation collaborators the engine drives, wired in at startup.
pub struct Collaborators {
    /// Board renderer.
    pub renderer: Box<dyn SceneRenderer>,
    /// Interface reconciler.
    pub ui: Box<dyn UiReconciler>,
    /// Audio player.
    pub audio: Box<dyn AudioPlayer>,
}
