//! Player-initiated intents and the request envelope that carries them.

use crate::commands::CommandList;
use crate::{ClientMetadata, PanelAddress, PlayerIdentifier};
use serde::{Deserialize, Serialize};

/// Maximum size of an opaque standard-action payload (bytes).
pub const MAX_PAYLOAD_LEN: usize = 4 * 1024;

/// Maximum number of open panel addresses a request may carry.
pub const MAX_OPEN_PANELS: usize = 32;

/// Which side of the board a player occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerSide {
    /// The defending player.
    Covenant,
    /// The attacking player.
    Riftborn,
}

/// Identifies a single card within a player's collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardIdentifier {
    /// Owning side.
    pub side: PlayerSide,
    /// Index within that side's card space.
    pub index: u32,
}

/// Identifies a room on the game board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomIdentifier {
    /// The vault room.
    Vault,
    /// The sanctum room.
    Sanctum,
    /// The crypt room.
    Crypt,
    /// The outpost room.
    Outpost,
    /// The gatehouse room.
    Gatehouse,
}

/// Target for playing a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardTarget {
    /// Play into a room.
    Room(RoomIdentifier),
    /// Attach to another card.
    Card(CardIdentifier),
}

/// A server-defined action with an opaque payload.
///
/// The payload bytes round-trip to the server unchanged. An empty payload
/// marks a purely local action that never leaves the client. `update`, when
/// present, is a speculative command list the server pre-supplied to apply
/// before confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardAction {
    /// Opaque payload interpreted by the server's rules engine.
    pub payload: Vec<u8>,
    /// Optional speculative update to apply immediately on submission.
    pub update: Option<CommandList>,
}

/// A single player-initiated intent. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientAction {
    /// A server-defined action with an opaque payload.
    StandardAction(StandardAction),
    /// Request the contents of an interface panel.
    FetchPanel {
        /// Panel to fetch.
        panel: PanelAddress,
    },
    /// Spend an action point to gain one mana.
    GainMana,
    /// Spend an action point to draw a card.
    DrawCard,
    /// Play a card from hand.
    PlayCard {
        /// Card to play.
        card: CardIdentifier,
        /// Optional play target.
        target: Option<CardTarget>,
    },
    /// Reposition a card the player controls.
    MoveCard {
        /// Card to move.
        card: CardIdentifier,
        /// Optional destination index.
        index: Option<u32>,
    },
    /// Begin a raid against a room.
    InitiateRaid {
        /// Room under attack.
        room: RoomIdentifier,
    },
    /// Advance progress on a room the player controls.
    ProgressRoom {
        /// Room to progress.
        room: RoomIdentifier,
    },
}

impl ClientAction {
    /// Whether this action requires no server round trip at all.
    ///
    /// Only a standard action with an empty payload is purely local; every
    /// other variant exists to be decided by the server.
    pub fn is_local(&self) -> bool {
        matches!(self, ClientAction::StandardAction(a) if a.payload.is_empty())
    }

    /// Speculative command list the server pre-supplied for this action.
    pub fn speculative_update(&self) -> Option<&CommandList> {
        match self {
            ClientAction::StandardAction(a) => a.update.as_ref(),
            _ => None,
        }
    }

    /// Whether submitting this action visibly spends an action point.
    pub fn spends_action_point(&self) -> bool {
        matches!(
            self,
            ClientAction::GainMana
                | ClientAction::DrawCard
                | ClientAction::PlayCard { .. }
                | ClientAction::InitiateRaid { .. }
                | ClientAction::ProgressRoom { .. }
        )
    }

    /// Verify action limits and validity.
    pub fn verify(&self) -> Result<(), &'static str> {
        match self {
            ClientAction::StandardAction(a) => {
                if a.payload.len() > MAX_PAYLOAD_LEN {
                    return Err("Standard action payload too large");
                }
                if let Some(update) = &a.update {
                    update.verify()?;
                }
            }
            ClientAction::FetchPanel { panel } => {
                if panel.0.is_empty() {
                    return Err("Fetch of empty panel address");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Envelope for the unary perform-action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRequest {
    /// The intent being performed.
    pub action: ClientAction,
    /// Player issuing the action.
    pub player: PlayerIdentifier,
    /// Panel addresses the client currently has open.
    pub open_panels: Vec<PanelAddress>,
    /// Client build/device metadata.
    pub metadata: ClientMetadata,
}

impl GameRequest {
    /// Verify request limits and validity.
    ///
    /// Called on every decoded request to bound hostile input.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.open_panels.len() > MAX_OPEN_PANELS {
            return Err("Too many open panels");
        }
        self.action.verify()
    }
}

/// First frame of the server-push stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Player opening the stream.
    pub player: PlayerIdentifier,
    /// Client build/device metadata.
    pub metadata: ClientMetadata,
    /// Protocol version for compatibility checking.
    pub version: u16,
    /// Schema hash for compatibility checking.
    pub schema_hash: u64,
}

/// Server response accepting or rejecting a connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectAck {
    /// Whether the connect was accepted.
    pub accepted: bool,
    /// Reason for rejection (if not accepted).
    pub reason: Option<String>,
}
