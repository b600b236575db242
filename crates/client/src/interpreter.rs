//! Ordered execution of server-issued command lists.
//!
//! Lists are processed strictly in arrival order, one at a time; within a
//! list every command runs to full completion (including any animation it
//! implies) before the next begins, unless the command is explicitly
//! fire-and-forget. Before a list executes, every asset it references is
//! prefetched behind a single blocking barrier.

use crate::collaborators::Collaborators;
use crate::prefetch;
use crate::view::LocalView;
use crate::ActionError;
use riftfall_assets::AssetCache;
use riftfall_protocol::{CommandList, ConditionQuery, GameCommand};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Counters tracking interpreter activity.
#[derive(Debug, Clone, Default)]
pub struct InterpreterMetrics {
    /// Command lists fully executed.
    pub lists_executed: u64,
    /// Commands executed across all lists.
    pub commands_executed: u64,
    /// Commands skipped (debug/unsupported).
    pub commands_skipped: u64,
    /// Assets newly loaded by prefetch barriers.
    pub assets_prefetched: u64,
}

/// Executes command lists against the presentation collaborators.
pub struct CommandInterpreter {
    incoming: VecDeque<CommandList>,
    handling: bool,
    metrics: InterpreterMetrics,
}

impl CommandInterpreter {
    /// Create an idle interpreter.
    pub fn new() -> Self {
        Self {
            incoming: VecDeque::new(),
            handling: false,
            metrics: InterpreterMetrics::default(),
        }
    }

    /// Queue a command list for execution after those already queued.
    pub fn enqueue(&mut self, list: CommandList) {
        trace!(
            "Queueing command list with {} commands (game {:?})",
            list.commands.len(),
            list.metadata.game_id
        );
        self.incoming.push_back(list);
    }

    /// Number of lists waiting to execute.
    pub fn queued_lists(&self) -> usize {
        self.incoming.len()
    }

    /// Whether a list is currently being handled.
    pub fn is_handling(&self) -> bool {
        self.handling
    }

    /// Current metrics.
    pub fn metrics(&self) -> &InterpreterMetrics {
        &self.metrics
    }

    /// Execute the next queued command list to completion, if any.
    ///
    /// Returns `Ok(true)` when a list was executed. Refuses to start while a
    /// previous list is still being handled.
    pub async fn run_next(
        &mut self,
        collaborators: &mut Collaborators,
        assets: &mut AssetCache,
        view: &mut LocalView,
    ) -> Result<bool, ActionError> {
        if self.handling {
            return Err(ActionError::AlreadyHandling);
        }
        let Some(list) = self.incoming.pop_front() else {
            return Ok(false);
        };

        self.handling = true;
        let result = self.execute(collaborators, assets, view, &list).await;
        self.handling = false;

        result.map(|()| true)
    }

    /// Execute a single command list: prefetch barrier, then ordered dispatch.
    pub async fn execute(
        &mut self,
        collaborators: &mut Collaborators,
        assets: &mut AssetCache,
        view: &mut LocalView,
        list: &CommandList,
    ) -> Result<(), ActionError> {
        // Prefetch barrier: collect every referenced address across the whole
        // list (nested branches included) and load before any command runs.
        let referenced = prefetch::collect_assets(list);
        if !referenced.is_empty() {
            let report = assets.load_all(referenced).await;
            self.metrics.assets_prefetched += report.loaded as u64;
            for failed in &report.failed {
                error!("Proceeding without asset {:?}", failed);
            }
        }

        self.execute_list(collaborators, view, list).await?;
        self.metrics.lists_executed += 1;
        debug!(
            "Command list complete ({} commands, game {:?})",
            list.commands.len(),
            list.metadata.game_id
        );
        Ok(())
    }

    fn execute_list<'a>(
        &'a mut self,
        collaborators: &'a mut Collaborators,
        view: &'a mut LocalView,
        list: &'a CommandList,
    ) -> Pin<Box<dyn Future<Output = Result<(), ActionError>> + 'a>> {
        Box::pin(async move {
            for command in &list.commands {
                self.execute_command(collaborators, view, command).await?;
            }
            Ok(())
        })
    }

    async fn execute_command(
        &mut self,
        collaborators: &mut Collaborators,
        view: &mut LocalView,
        command: &GameCommand,
    ) -> Result<(), ActionError> {
        match command {
            GameCommand::UpdateGameView {
                view: game_view,
                animate,
            } => {
                // Authoritative state supersedes any speculative values.
                view.apply(game_view);
                collaborators
                    .renderer
                    .update_view(game_view, *animate)
                    .await;
            }
            GameCommand::MoveGameObjects {
                ids,
                position,
                animate,
            } => {
                let position = (*position).ok_or(ActionError::MissingField("move position"))?;
                collaborators
                    .renderer
                    .move_objects(ids, position, *animate)
                    .await;
            }
            GameCommand::PlaySound { address } => {
                // Fire-and-forget: a sound cue never gates the next command.
                collaborators.audio.play_sound(address);
            }
            GameCommand::PlayEffect(effect) => {
                collaborators.renderer.play_effect(effect).await;
            }
            GameCommand::FireProjectile(projectile) => {
                collaborators.renderer.fire_projectile(projectile).await;
            }
            GameCommand::UpdatePanels { panels } => {
                collaborators.ui.update_panels(panels);
            }
            GameCommand::DisplayMessage { message, style } => {
                collaborators.ui.display_message(message, *style).await;
            }
            GameCommand::LoadScene { name, mode } => {
                collaborators.renderer.load_scene(name, *mode).await;
            }
            GameCommand::TogglePanel { panel, open } => {
                view.set_panel_open(panel, *open);
                collaborators.ui.toggle_panel(panel, *open);
            }
            GameCommand::Delay { milliseconds } => {
                tokio::time::sleep(Duration::from_millis(*milliseconds)).await;
            }
            GameCommand::Conditional {
                query,
                when_true,
                when_false,
            } => {
                let branch = if evaluate(query, collaborators) {
                    when_true
                } else {
                    when_false
                };
                self.execute_list(collaborators, view, branch).await?;
            }
            GameCommand::Debug(debug_command) => {
                warn!("Skipping debug command: {:?}", debug_command);
                self.metrics.commands_skipped += 1;
                return Ok(());
            }
        }

        self.metrics.commands_executed += 1;
        Ok(())
    }
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn evaluate(query: &ConditionQuery, collaborators: &Collaborators) -> bool {
    match query {
        ConditionQuery::ElementExists { id } => collaborators.ui.element_exists(id),
        ConditionQuery::PanelOpen { panel } => collaborators.ui.panel_open(panel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{AudioPlayer, SceneRenderer, UiReconciler};
    use async_trait::async_trait;
    use riftfall_assets::{AssetData, AssetError, AssetFetcher};
    use riftfall_protocol::{
        AssetAddress, CommandMetadata, DebugCommand, EffectView, GameObjectId, GameView,
        InterfacePanel, MessageStyle, ObjectPosition, PanelAddress, PlayerSide, ProjectileView,
        SceneLoadMode,
    };
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct NullRenderer {
        calls: Vec<String>,
    }

    #[async_trait]
    impl SceneRenderer for NullRenderer {
        async fn update_view(&mut self, _view: &GameView, _animate: bool) {
            self.calls.push("update_view".to_string());
        }
        async fn move_objects(
            &mut self,
            _ids: &[GameObjectId],
            _position: ObjectPosition,
            _animate: bool,
        ) {
            self.calls.push("move_objects".to_string());
        }
        async fn play_effect(&mut self, _effect: &EffectView) {
            self.calls.push("play_effect".to_string());
        }
        async fn fire_projectile(&mut self, _projectile: &ProjectileView) {
            self.calls.push("fire_projectile".to_string());
        }
        async fn load_scene(&mut self, _name: &str, _mode: SceneLoadMode) {
            self.calls.push("load_scene".to_string());
        }
    }

    #[derive(Default)]
    struct StubUi {
        existing_elements: Vec<String>,
    }

    #[async_trait]
    impl UiReconciler for StubUi {
        fn update_panels(&mut self, _panels: &[InterfacePanel]) {}
        fn toggle_panel(&mut self, _panel: &PanelAddress, _open: bool) {}
        async fn display_message(&mut self, _message: &str, _style: MessageStyle) {}
        fn element_exists(&self, id: &str) -> bool {
            self.existing_elements.iter().any(|e| e == id)
        }
        fn panel_open(&self, _panel: &PanelAddress) -> bool {
            false
        }
        fn input_locked(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct StubAudio {
        played: Arc<Mutex<Vec<AssetAddress>>>,
    }

    impl AudioPlayer for StubAudio {
        fn play_sound(&mut self, address: &AssetAddress) {
            self.played.lock().expect("audio log").push(address.clone());
        }
    }

    struct EmptyFetcher;

    #[async_trait]
    impl AssetFetcher for EmptyFetcher {
        async fn fetch(&self, _address: &AssetAddress) -> Result<AssetData, AssetError> {
            Ok(AssetData { bytes: vec![] })
        }
    }

    fn harness() -> (CommandInterpreter, Collaborators, AssetCache, LocalView) {
        (
            CommandInterpreter::new(),
            Collaborators {
                renderer: Box::new(NullRenderer::default()),
                ui: Box::new(StubUi::default()),
                audio: Box::new(StubAudio::default()),
            },
            AssetCache::new(Box::new(EmptyFetcher)),
            LocalView::new(PlayerSide::Riftborn),
        )
    }

    fn sound(address: &str) -> GameCommand {
        GameCommand::PlaySound {
            address: AssetAddress::new(address),
        }
    }

    #[tokio::test]
    async fn run_next_is_idle_on_empty_queue() {
        let (mut interpreter, mut collaborators, mut assets, mut view) = harness();
        let ran = interpreter
            .run_next(&mut collaborators, &mut assets, &mut view)
            .await
            .expect("run");
        assert!(!ran);
    }

    #[tokio::test]
    async fn conditional_executes_exactly_one_branch() {
        let (mut interpreter, mut collaborators, mut assets, mut view) = harness();
        collaborators.ui = Box::new(StubUi {
            existing_elements: vec!["close-button".to_string()],
        });

        let list = CommandList::single(GameCommand::Conditional {
            query: ConditionQuery::ElementExists {
                id: "close-button".to_string(),
            },
            when_true: CommandList::single(sound("audio/true-branch")),
            when_false: CommandList::single(sound("audio/false-branch")),
        });

        interpreter.enqueue(list);
        interpreter
            .run_next(&mut collaborators, &mut assets, &mut view)
            .await
            .expect("run");

        // Only the sound command plus the conditional itself executed.
        assert_eq!(interpreter.metrics().commands_executed, 2);
    }

    #[tokio::test]
    async fn conditional_false_takes_other_branch() {
        let (mut interpreter, mut collaborators, mut assets, mut view) = harness();

        let played = Arc::new(Mutex::new(Vec::new()));
        collaborators.audio = Box::new(StubAudio {
            played: Arc::clone(&played),
        });

        let list = CommandList::single(GameCommand::Conditional {
            query: ConditionQuery::ElementExists {
                id: "missing".to_string(),
            },
            when_true: CommandList::single(sound("audio/true-branch")),
            when_false: CommandList::single(sound("audio/false-branch")),
        });

        interpreter.enqueue(list);
        interpreter
            .run_next(&mut collaborators, &mut assets, &mut view)
            .await
            .expect("run");

        assert_eq!(
            &*played.lock().expect("audio log"),
            &[AssetAddress::new("audio/false-branch")]
        );
    }

    #[tokio::test]
    async fn debug_command_skipped_not_fatal() {
        let (mut interpreter, mut collaborators, mut assets, mut view) = harness();

        let list = CommandList {
            commands: vec![
                GameCommand::Debug(DebugCommand::DumpState),
                sound("audio/after"),
            ],
            metadata: CommandMetadata::default(),
        };

        interpreter.enqueue(list);
        interpreter
            .run_next(&mut collaborators, &mut assets, &mut view)
            .await
            .expect("run");

        assert_eq!(interpreter.metrics().commands_skipped, 1);
        assert_eq!(interpreter.metrics().commands_executed, 1);
    }

    #[tokio::test]
    async fn malformed_move_raises() {
        let (mut interpreter, mut collaborators, mut assets, mut view) = harness();

        let list = CommandList::single(GameCommand::MoveGameObjects {
            ids: vec![GameObjectId::Avatar(PlayerSide::Covenant)],
            position: None,
            animate: false,
        });

        interpreter.enqueue(list);
        let result = interpreter
            .run_next(&mut collaborators, &mut assets, &mut view)
            .await;
        assert!(matches!(result, Err(ActionError::MissingField(_))));
        assert!(!interpreter.is_handling());
    }

    #[tokio::test]
    async fn lists_execute_in_arrival_order() {
        let (mut interpreter, mut collaborators, mut assets, mut view) = harness();

        let played = Arc::new(Mutex::new(Vec::new()));
        collaborators.audio = Box::new(StubAudio {
            played: Arc::clone(&played),
        });

        interpreter.enqueue(CommandList::single(sound("audio/first")));
        interpreter.enqueue(CommandList::single(sound("audio/second")));

        while interpreter
            .run_next(&mut collaborators, &mut assets, &mut view)
            .await
            .expect("run")
        {}

        assert_eq!(
            &*played.lock().expect("audio log"),
            &[
                AssetAddress::new("audio/first"),
                AssetAddress::new("audio/second")
            ]
        );
    }

    #[tokio::test]
    async fn toggle_panel_updates_local_view() {
        let (mut interpreter, mut collaborators, mut assets, mut view) = harness();
        let panel = PanelAddress::new("menu/settings");

        interpreter.enqueue(CommandList::single(GameCommand::TogglePanel {
            panel: panel.clone(),
            open: true,
        }));
        interpreter
            .run_next(&mut collaborators, &mut assets, &mut view)
            .await
            .expect("run");

        assert_eq!(view.open_panels(), vec![panel]);
    }
}
