//! Session layer over QUIC: a push stream of command lists plus unary
//! perform-action calls.
//!
//! [`SessionTransport`] moves framed bytes and knows nothing else;
//! [`ClientSession`] and [`ServerSession`] add the typed protocol layer.

use anyhow::{Context, Result};
use quinn::Connection;
use riftfall_protocol::codec::{
    self, decode_command_list, decode_connect_ack, decode_connect_request, decode_request,
    encode_command_list, encode_connect_ack, encode_connect_request, encode_request,
};
use riftfall_protocol::{
    ClientMetadata, CommandList, ConnectAck, ConnectRequest, GameRequest, PlayerIdentifier,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use tracing::{debug, info, trace, warn};

/// Kind tag prefixed to every unidirectional frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Server-pushed command list.
    Push = 0,
    /// Client connect request, first frame of a session.
    Connect = 1,
    /// Server acknowledgement of a connect.
    Ack = 2,
}

impl TryFrom<u8> for FrameKind {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FrameKind::Push),
            1 => Ok(FrameKind::Connect),
            2 => Ok(FrameKind::Ack),
            _ => Err(anyhow::anyhow!("Invalid frame kind: {}", value)),
        }
    }
}

/// Upper bound on a single stream frame, matching the codec's frame cap.
const MAX_STREAM_FRAME: usize = codec::MAX_FRAME_LEN + 64;

/// Byte-level session transport over a QUIC connection.
///
/// One unidirectional stream per pushed frame, one bidirectional stream per
/// unary call; no game semantics.
pub struct SessionTransport {
    connection: Connection,
}

impl SessionTransport {
    /// Wrap an established connection.
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Send a frame on a new unidirectional stream.
    pub async fn send_frame(&self, kind: FrameKind, data: &[u8]) -> Result<()> {
        trace!("Sending {} bytes as {:?}", data.len(), kind);

        let mut send = self
            .connection
            .open_uni()
            .await
            .context("Failed to open unidirectional stream")?;

        send.write_all(&[kind as u8])
            .await
            .context("Failed to write frame kind")?;

        let len = data.len() as u32;
        send.write_all(&len.to_le_bytes())
            .await
            .context("Failed to write length prefix")?;

        send.write_all(data).await.context("Failed to write data")?;
        send.finish().context("Failed to finish stream")?;

        Ok(())
    }

    /// Receive the next unidirectional frame.
    pub async fn recv_frame(&self) -> Result<(FrameKind, Vec<u8>)> {
        let mut recv = self
            .connection
            .accept_uni()
            .await
            .context("Failed to accept unidirectional stream")?;

        let mut kind_byte = [0u8; 1];
        recv.read_exact(&mut kind_byte)
            .await
            .context("Failed to read frame kind")?;
        let kind = FrameKind::try_from(kind_byte[0])?;

        let data = read_length_prefixed(&mut recv).await?;

        trace!("Received {} bytes as {:?}", data.len(), kind);

        Ok((kind, data))
    }

    /// Perform a unary byte exchange on a new bidirectional stream.
    pub async fn request(&self, data: &[u8]) -> Result<Vec<u8>> {
        let (mut send, mut recv) = self
            .connection
            .open_bi()
            .await
            .context("Failed to open bidirectional stream")?;

        let len = data.len() as u32;
        send.write_all(&len.to_le_bytes())
            .await
            .context("Failed to write length prefix")?;
        send.write_all(data).await.context("Failed to write data")?;
        send.finish().context("Failed to finish request stream")?;

        read_length_prefixed(&mut recv).await
    }

    /// Accept the next unary byte exchange.
    ///
    /// Returns the request bytes and a responder for the reply.
    pub async fn accept_request(&self) -> Result<(Vec<u8>, ActionResponder)> {
        let (send, mut recv) = self
            .connection
            .accept_bi()
            .await
            .context("Failed to accept bidirectional stream")?;

        let data = read_length_prefixed(&mut recv).await?;

        Ok((data, ActionResponder { send }))
    }

    /// Get the remote address of this connection.
    pub fn remote_address(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Close the connection gracefully.
    pub fn close(&self, reason: &str) {
        info!("Closing connection: {}", reason);
        self.connection.close(0u32.into(), reason.as_bytes());
    }
}

/// Reply half of an accepted unary call.
pub struct ActionResponder {
    send: quinn::SendStream,
}

impl ActionResponder {
    /// Write raw reply bytes and finish the stream.
    pub async fn respond_bytes(mut self, data: &[u8]) -> Result<()> {
        let len = data.len() as u32;
        self.send
            .write_all(&len.to_le_bytes())
            .await
            .context("Failed to write length prefix")?;
        self.send
            .write_all(data)
            .await
            .context("Failed to write response")?;
        self.send
            .finish()
            .context("Failed to finish response stream")?;
        Ok(())
    }

    /// Encode and send a command list reply.
    pub async fn respond(self, list: &CommandList) -> Result<()> {
        let data = encode_command_list(list)?;
        self.respond_bytes(&data).await
    }
}

async fn read_length_prefixed(recv: &mut quinn::RecvStream) -> Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    recv.read_exact(&mut len_bytes)
        .await
        .context("Failed to read length prefix")?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_STREAM_FRAME {
        return Err(anyhow::anyhow!("Stream frame too large: {} bytes", len));
    }

    let mut data = vec![0u8; len];
    recv.read_exact(&mut data)
        .await
        .context("Failed to read frame data")?;
    Ok(data)
}

/// Client side of an established session: typed connect, push and unary calls.
pub struct ClientSession {
    transport: SessionTransport,
}

impl ClientSession {
    /// Open a session on an established connection.
    ///
    /// Sends the connect request and waits for the server's acknowledgement;
    /// a version or schema mismatch fails here, before any game traffic.
    pub async fn connect(
        connection: Connection,
        player: PlayerIdentifier,
        metadata: ClientMetadata,
    ) -> Result<Self> {
        let transport = SessionTransport::new(connection);

        info!("Opening session for player {:?}", player);

        let request = ConnectRequest {
            player,
            metadata,
            version: PROTOCOL_VERSION,
            schema_hash: codec::compute_schema_hash(),
        };
        transport
            .send_frame(FrameKind::Connect, &encode_connect_request(&request)?)
            .await?;

        let (kind, data) = transport.recv_frame().await?;
        if kind != FrameKind::Ack {
            return Err(anyhow::anyhow!("Expected connect ack, got {:?}", kind));
        }

        let ack: ConnectAck = decode_connect_ack(&data)?;
        if !ack.accepted {
            let reason = ack.reason.unwrap_or_else(|| "Unknown reason".to_string());
            return Err(anyhow::anyhow!("Connect rejected: {}", reason));
        }

        info!("Session established with {}", transport.remote_address());
        Ok(Self { transport })
    }

    /// Perform a unary action round trip.
    pub async fn perform_action(&self, request: &GameRequest) -> Result<CommandList> {
        let data = encode_request(request)?;
        let response = self.transport.request(&data).await?;
        Ok(decode_command_list(&response)?)
    }

    /// Wait for the next server-pushed command list.
    pub async fn next_command_list(&self) -> Result<CommandList> {
        loop {
            let (kind, data) = self.transport.recv_frame().await?;
            match kind {
                FrameKind::Push => return Ok(decode_command_list(&data)?),
                other => {
                    warn!("Ignoring unexpected {:?} frame on push stream", other);
                }
            }
        }
    }

    /// Get the remote server address.
    pub fn remote_address(&self) -> SocketAddr {
        self.transport.remote_address()
    }

    /// Close the session gracefully.
    pub fn close(&self, reason: &str) {
        self.transport.close(reason);
    }
}

/// Server side of a session, used by scripted test servers.
pub struct ServerSession {
    transport: SessionTransport,
    schema_hash: u64,
}

impl ServerSession {
    /// Wrap an accepted connection.
    pub fn new(connection: Connection) -> Self {
        Self {
            transport: SessionTransport::new(connection),
            schema_hash: codec::compute_schema_hash(),
        }
    }

    /// Wait for and validate the client's connect request.
    ///
    /// A version or schema mismatch sends a rejection and returns an error.
    pub async fn accept_connect(&self) -> Result<ConnectRequest> {
        info!(
            "Waiting for connect from {}",
            self.transport.remote_address()
        );

        let (kind, data) = self.transport.recv_frame().await?;
        if kind != FrameKind::Connect {
            self.reject("Expected connect request").await?;
            return Err(anyhow::anyhow!("Expected connect frame, got {:?}", kind));
        }

        let request = decode_connect_request(&data)?;
        debug!(
            "Received connect: player={:?} version={} schema={:016x}",
            request.player, request.version, request.schema_hash
        );

        if request.version != PROTOCOL_VERSION {
            warn!(
                "Protocol version mismatch: client={}, server={}",
                request.version, PROTOCOL_VERSION
            );
            self.reject(&format!(
                "Protocol version mismatch: server uses v{}",
                PROTOCOL_VERSION
            ))
            .await?;
            return Err(anyhow::anyhow!(
                "Protocol version mismatch: {} != {}",
                request.version,
                PROTOCOL_VERSION
            ));
        }

        if request.schema_hash != self.schema_hash {
            warn!(
                "Schema hash mismatch: client={:016x}, server={:016x}",
                request.schema_hash, self.schema_hash
            );
            self.reject("Schema mismatch: incompatible client version")
                .await?;
            return Err(anyhow::anyhow!(
                "Schema hash mismatch: {:016x} != {:016x}",
                request.schema_hash,
                self.schema_hash
            ));
        }

        Ok(request)
    }

    /// Acknowledge an accepted connect.
    pub async fn acknowledge(&self) -> Result<()> {
        let ack = ConnectAck {
            accepted: true,
            reason: None,
        };
        self.transport
            .send_frame(FrameKind::Ack, &encode_connect_ack(&ack)?)
            .await
    }

    /// Reject a connect with a reason.
    async fn reject(&self, reason: &str) -> Result<()> {
        let ack = ConnectAck {
            accepted: false,
            reason: Some(reason.to_string()),
        };
        self.transport
            .send_frame(FrameKind::Ack, &encode_connect_ack(&ack)?)
            .await
    }

    /// Push a command list to the client.
    pub async fn push(&self, list: &CommandList) -> Result<()> {
        self.transport
            .send_frame(FrameKind::Push, &encode_command_list(list)?)
            .await
    }

    /// Wait for the next unary action from the client.
    pub async fn next_action(&self) -> Result<(GameRequest, ActionResponder)> {
        let (data, responder) = self.transport.accept_request().await?;
        let request = decode_request(&data)?;
        Ok((request, responder))
    }

    /// Get the remote client address.
    pub fn remote_address(&self) -> SocketAddr {
        self.transport.remote_address()
    }

    /// Close the session gracefully.
    pub fn close(&self, reason: &str) {
        self.transport.close(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ClientEndpoint, ServerEndpoint, TlsMode};
    use riftfall_protocol::{ClientAction, CommandMetadata, GameCommand};

    async fn connected_pair() -> (ClientSession, ServerSession) {
        let server =
            ServerEndpoint::bind("127.0.0.1:0".parse().unwrap()).expect("Failed to bind server");
        let server_addr = server.local_addr();

        let server_handle = tokio::spawn(async move {
            let incoming = server.accept().await.expect("No incoming connection");
            let connection = incoming.await.expect("Failed to accept connection");
            let session = ServerSession::new(connection);
            session.accept_connect().await.expect("accept connect");
            session.acknowledge().await.expect("acknowledge");
            session
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let endpoint =
            ClientEndpoint::new(TlsMode::InsecureSkipVerify).expect("Failed to create client");
        let connection = endpoint.connect(server_addr).await.expect("connect");
        let client = ClientSession::connect(
            connection,
            PlayerIdentifier(42),
            ClientMetadata::default(),
        )
        .await
        .expect("session connect");

        let server_session = server_handle.await.expect("server task");
        (client, server_session)
    }

    #[tokio::test]
    async fn test_connect_handshake() {
        let (client, server) = connected_pair().await;
        assert!(client.remote_address().port() > 0);
        server.close("test complete");
    }

    #[tokio::test]
    async fn test_action_roundtrip() {
        let (client, server) = connected_pair().await;

        let server_handle = tokio::spawn(async move {
            let (request, responder) = server.next_action().await.expect("next action");
            assert_eq!(request.action, ClientAction::DrawCard);

            let reply = CommandList {
                commands: vec![GameCommand::Delay { milliseconds: 1 }],
                metadata: CommandMetadata {
                    game_id: Some(7),
                    label: None,
                },
            };
            responder.respond(&reply).await.expect("respond");
            server
        });

        let request = GameRequest {
            action: ClientAction::DrawCard,
            player: PlayerIdentifier(42),
            open_panels: vec![],
            metadata: ClientMetadata::default(),
        };
        let response = client.perform_action(&request).await.expect("perform");
        assert_eq!(response.metadata.game_id, Some(7));
        assert_eq!(response.commands.len(), 1);

        let server = server_handle.await.expect("server task");
        server.close("test complete");
    }

    #[tokio::test]
    async fn test_push_roundtrip() {
        let (client, server) = connected_pair().await;

        let pushed = CommandList::single(GameCommand::Delay { milliseconds: 5 });
        server.push(&pushed).await.expect("push");

        let received = client.next_command_list().await.expect("next list");
        assert_eq!(received, pushed);

        server.close("test complete");
    }

    #[tokio::test]
    async fn test_rejected_connect_fails_client() {
        let server =
            ServerEndpoint::bind("127.0.0.1:0".parse().unwrap()).expect("Failed to bind server");
        let server_addr = server.local_addr();

        let server_handle = tokio::spawn(async move {
            let incoming = server.accept().await.expect("No incoming connection");
            let connection = incoming.await.expect("Failed to accept connection");
            let session = ServerSession::new(connection);
            // Reject whatever arrives.
            session.reject("maintenance").await.expect("reject");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let endpoint =
            ClientEndpoint::new(TlsMode::InsecureSkipVerify).expect("Failed to create client");
        let connection = endpoint.connect(server_addr).await.expect("connect");
        let result = ClientSession::connect(
            connection,
            PlayerIdentifier(1),
            ClientMetadata::default(),
        )
        .await;

        assert!(result.is_err());
        server_handle.await.expect("server task");
    }
}
