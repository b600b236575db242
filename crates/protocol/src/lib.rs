#![warn(missing_docs)]
//! Wire data model shared by the riftfall client and server.
//!
//! All messages use postcard serialization for compact binary encoding;
//! frames on the wire are zstd-compressed and checksummed (see [`codec`]).

mod actions;
pub mod codec;
mod commands;

pub use actions::{
    CardIdentifier, CardTarget, ClientAction, ConnectAck, ConnectRequest, GameRequest,
    PlayerSide, RoomIdentifier, StandardAction, MAX_OPEN_PANELS, MAX_PAYLOAD_LEN,
};
pub use codec::ProtocolError;
pub use commands::{
    CardView, CommandList, CommandMetadata, ConditionQuery, DebugCommand, EffectView,
    GameCommand, GameObjectId, GameView, InterfacePanel, MapTileView, MessageStyle,
    ObjectPosition, PanelNode, PlayerView, ProjectileView, SceneLoadMode,
    MAX_CARDS_PER_VIEW, MAX_COMMANDS_PER_LIST, MAX_CONDITIONAL_DEPTH, MAX_MESSAGE_LEN,
    MAX_PANEL_NODES,
};

use serde::{Deserialize, Serialize};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u16 = 1;

/// Protocol magic bytes to identify the riftfall protocol.
pub const PROTOCOL_MAGIC: &[u8; 8] = b"RIFT\x00\x01\x00\x00";

/// Player identifier threaded through every request.
///
/// The server is stateless from an addressing perspective; this identifier is
/// the only routing context a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentifier(pub u64);

/// Opaque client build/device metadata attached to every request.
///
/// Compared by value to decide whether session context must be re-logged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// Client build identifier (e.g. a version string).
    pub build: String,
    /// Device or platform identifier.
    pub device: String,
}

/// Address of an interface panel, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelAddress(pub String);

impl PanelAddress {
    /// Create a panel address from anything string-like.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }
}

/// Address of a loadable asset (sprite, audio clip, effect prefab).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetAddress(pub String);

impl AssetAddress {
    /// Create an asset address from anything string-like.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Whether the address is empty (nothing to load).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
