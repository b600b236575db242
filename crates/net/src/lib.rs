#![warn(missing_docs)]
//! Session transport for the riftfall client and its test servers.
//!
//! Wraps the QUIC channel behind two RPC shapes: a long-lived server-push
//! stream of command lists, and a unary perform-action call. This layer knows
//! nothing about game semantics beyond frame boundaries.

mod session;
mod transport;

pub use session::{
    ActionResponder, ClientSession, FrameKind, ServerSession, SessionTransport,
};
pub use transport::{ClientEndpoint, ServerEndpoint, TlsMode};
