//! Server-issued effects and the ordered batches that deliver them.

use crate::actions::{CardIdentifier, PlayerSide, RoomIdentifier, StandardAction};
use crate::{AssetAddress, PanelAddress};
use serde::{Deserialize, Serialize};

/// Maximum number of commands in a single list.
pub const MAX_COMMANDS_PER_LIST: usize = 256;

/// Maximum nesting depth of conditional command lists.
pub const MAX_CONDITIONAL_DEPTH: usize = 4;

/// Maximum number of panel nodes in a single interface update.
pub const MAX_PANEL_NODES: usize = 512;

/// Maximum length of a display message (characters).
pub const MAX_MESSAGE_LEN: usize = 512;

/// Maximum number of card views in a single game view.
pub const MAX_CARDS_PER_VIEW: usize = 256;

/// An ordered batch of commands delivered together.
///
/// Commands execute strictly in list order; a list is discarded once every
/// command in it has finished executing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandList {
    /// Commands to execute, in order.
    pub commands: Vec<GameCommand>,
    /// Session/logging metadata for the batch.
    pub metadata: CommandMetadata,
}

impl CommandList {
    /// Build a list containing a single command.
    pub fn single(command: GameCommand) -> Self {
        Self {
            commands: vec![command],
            metadata: CommandMetadata::default(),
        }
    }

    /// Whether the list carries no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Verify list limits and validity, recursing into conditionals.
    pub fn verify(&self) -> Result<(), &'static str> {
        self.verify_at_depth(0)
    }

    fn verify_at_depth(&self, depth: usize) -> Result<(), &'static str> {
        if depth > MAX_CONDITIONAL_DEPTH {
            return Err("Conditional nesting too deep");
        }
        if self.commands.len() > MAX_COMMANDS_PER_LIST {
            return Err("Too many commands in list");
        }
        for command in &self.commands {
            command.verify_at_depth(depth)?;
        }
        Ok(())
    }
}

/// Metadata attached to a command list for session correlation and logging.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// Game this batch belongs to, when one is active.
    pub game_id: Option<u64>,
    /// Free-form label used in server logs.
    pub label: Option<String>,
}

/// A single server-issued effect to apply on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameCommand {
    /// Replace or merge the rendered game state.
    UpdateGameView {
        /// New (possibly partial) view of the game.
        view: GameView,
        /// Whether changes should animate or snap.
        animate: bool,
    },

    /// Move objects to a new board position.
    MoveGameObjects {
        /// Objects to move, in draw order.
        ids: Vec<GameObjectId>,
        /// Destination position.
        position: Option<ObjectPosition>,
        /// Whether the move animates.
        animate: bool,
    },

    /// Play a sound cue. Never gates subsequent commands.
    PlaySound {
        /// Audio clip to play.
        address: AssetAddress,
    },

    /// Play a visual effect at a board position.
    PlayEffect(EffectView),

    /// Fire a projectile between two objects.
    FireProjectile(ProjectileView),

    /// Reconcile interface panels against the given definitions.
    UpdatePanels {
        /// Panels to create or update.
        panels: Vec<InterfacePanel>,
    },

    /// Display a message to the player.
    DisplayMessage {
        /// Message text.
        message: String,
        /// Presentation style.
        style: MessageStyle,
    },

    /// Load a rendering scene.
    LoadScene {
        /// Scene name.
        name: String,
        /// Load mode.
        mode: SceneLoadMode,
    },

    /// Open or close an interface panel.
    TogglePanel {
        /// Panel to toggle.
        panel: PanelAddress,
        /// True to open, false to close.
        open: bool,
    },

    /// Wait for a fixed real-time delay before the next command.
    Delay {
        /// Milliseconds to wait.
        milliseconds: u64,
    },

    /// Execute one of two nested lists depending on current UI state.
    Conditional {
        /// Predicate evaluated against UI state.
        query: ConditionQuery,
        /// Executed when the predicate holds.
        when_true: CommandList,
        /// Executed when the predicate does not hold.
        when_false: CommandList,
    },

    /// Development-only command; logged and skipped in normal builds.
    Debug(DebugCommand),
}

impl GameCommand {
    fn verify_at_depth(&self, depth: usize) -> Result<(), &'static str> {
        match self {
            GameCommand::UpdateGameView { view, .. } => view.verify(),
            GameCommand::MoveGameObjects { ids, .. } => {
                if ids.is_empty() {
                    return Err("Move command with no objects");
                }
                Ok(())
            }
            GameCommand::PlaySound { address } => {
                if address.is_empty() {
                    return Err("Sound command with empty address");
                }
                Ok(())
            }
            GameCommand::UpdatePanels { panels } => {
                let mut nodes = 0usize;
                for panel in panels {
                    nodes += panel.root.count_nodes();
                    if nodes > MAX_PANEL_NODES {
                        return Err("Too many panel nodes");
                    }
                }
                Ok(())
            }
            GameCommand::DisplayMessage { message, .. } => {
                if message.len() > MAX_MESSAGE_LEN {
                    return Err("Display message too long");
                }
                Ok(())
            }
            GameCommand::Conditional {
                when_true,
                when_false,
                ..
            } => {
                when_true.verify_at_depth(depth + 1)?;
                when_false.verify_at_depth(depth + 1)
            }
            _ => Ok(()),
        }
    }
}

/// View of the current game state; absent fields leave client state untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameView {
    /// View of the local player, if changed.
    pub user: Option<PlayerView>,
    /// View of the opponent, if changed.
    pub opponent: Option<PlayerView>,
    /// Card views to create or update.
    pub cards: Vec<CardView>,
    /// World-map tiles to update.
    pub world_map: Vec<MapTileView>,
}

impl GameView {
    /// Verify view limits.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.cards.len() > MAX_CARDS_PER_VIEW {
            return Err("Too many cards in view");
        }
        Ok(())
    }
}

/// Per-player slice of the game view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Side this view describes.
    pub side: PlayerSide,
    /// Current mana, if changed.
    pub mana: Option<u32>,
    /// Current action points, if changed.
    pub action_points: Option<u32>,
    /// Avatar sprite, if changed.
    pub avatar: Option<AssetAddress>,
}

/// Rendered state of a single card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardView {
    /// Card identity.
    pub id: CardIdentifier,
    /// Card art.
    pub image: Option<AssetAddress>,
    /// Card frame sprite.
    pub frame: Option<AssetAddress>,
    /// Title text.
    pub title: Option<String>,
    /// Mana cost.
    pub cost: Option<u32>,
}

/// One tile of the world map overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapTileView {
    /// Tile x coordinate.
    pub x: i32,
    /// Tile y coordinate.
    pub y: i32,
    /// Tile sprite.
    pub sprite: AssetAddress,
}

/// Any object that can be moved on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameObjectId {
    /// A card.
    Card(CardIdentifier),
    /// A player avatar.
    Avatar(PlayerSide),
    /// A player's deck.
    Deck(PlayerSide),
    /// A player's discard pile.
    DiscardPile(PlayerSide),
}

/// Board position an object can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectPosition {
    /// Inside a room, at a sorting index.
    Room {
        /// Destination room.
        room: RoomIdentifier,
        /// Sorting index within the room.
        index: u32,
    },
    /// In a player's hand.
    Hand(PlayerSide),
    /// On top of a player's deck.
    Deck(PlayerSide),
    /// In a player's discard pile.
    DiscardPile(PlayerSide),
    /// Off screen, hidden from view.
    Offscreen,
}

/// A one-shot visual effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectView {
    /// Effect prefab to instantiate.
    pub address: AssetAddress,
    /// Object the effect attaches to.
    pub owner: GameObjectId,
    /// How long the effect runs.
    pub duration_ms: u64,
    /// Optional sound played with the effect.
    pub sound: Option<AssetAddress>,
}

/// A projectile fired between two objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileView {
    /// Projectile prefab.
    pub address: AssetAddress,
    /// Firing object.
    pub source: GameObjectId,
    /// Target object.
    pub target: GameObjectId,
    /// Travel time.
    pub travel_ms: u64,
    /// Optional sound on impact.
    pub impact_sound: Option<AssetAddress>,
}

/// A panel definition: an address plus its node tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfacePanel {
    /// Address the panel is registered under.
    pub address: PanelAddress,
    /// Root of the node tree.
    pub root: PanelNode,
}

/// One node of a declarative interface tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PanelNode {
    /// Element identifier, used by conditional queries.
    pub id: Option<String>,
    /// Text label.
    pub label: Option<String>,
    /// Background image.
    pub image: Option<AssetAddress>,
    /// Action fired when the node is clicked.
    pub on_click: Option<StandardAction>,
    /// Child nodes.
    pub children: Vec<PanelNode>,
}

impl PanelNode {
    /// Total number of nodes in this subtree.
    pub fn count_nodes(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(PanelNode::count_nodes)
            .sum::<usize>()
    }
}

/// Predicate a conditional command evaluates against current UI state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionQuery {
    /// Does an interface element with this id currently exist?
    ElementExists {
        /// Element identifier.
        id: String,
    },
    /// Is the panel at this address currently open?
    PanelOpen {
        /// Panel address.
        panel: PanelAddress,
    },
}

/// Presentation style for a displayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStyle {
    /// Small transient toast.
    Toast,
    /// Full-width banner that interrupts play.
    Banner,
}

/// How a scene load interacts with already-loaded scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneLoadMode {
    /// Replace all loaded scenes.
    Single,
    /// Load on top of the current scene.
    Additive,
}

/// Development-only commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DebugCommand {
    /// Write a message to the client log.
    Log {
        /// Message text.
        message: String,
    },
    /// Dump interpreter state to the log.
    DumpState,
}
