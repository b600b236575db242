//! Frame encoding and decoding for riftfall messages.
//!
//! Frame format: `[length: u32][crc32: u32][zstd-compressed postcard payload]`,
//! where `length` counts everything after the length field itself. Compression
//! is transparent to callers; the logical contract is the decoded message.

use crate::actions::{ConnectAck, ConnectRequest, GameRequest};
use crate::commands::CommandList;
use crate::{PROTOCOL_MAGIC, PROTOCOL_VERSION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use thiserror::Error;

/// Maximum size of a compressed frame payload (bytes).
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Maximum decompressed payload size, bounding decompression bombs.
pub const MAX_DECOMPRESSED_LEN: usize = 4 * 1024 * 1024;

/// Zstd compression level used for all frames.
const COMPRESSION_LEVEL: i32 = 3;

/// Errors produced while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("failed to serialize message: {0}")]
    Encode(#[source] postcard::Error),
    /// Deserialization failed.
    #[error("failed to deserialize message: {0}")]
    Decode(#[source] postcard::Error),
    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
    /// Frame shorter than the fixed header.
    #[error("frame too short: {0} bytes (minimum 8)")]
    FrameTooShort(usize),
    /// Length prefix disagrees with the data present.
    #[error("incomplete frame: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Bytes the prefix claimed.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },
    /// Checksum failure; the frame was corrupted in transit.
    #[error("frame checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum carried in the frame.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },
    /// Payload exceeds a size cap.
    #[error("frame payload too large: {0} bytes")]
    TooLarge(usize),
    /// Message decoded but failed its limit checks.
    #[error("invalid message: {0}")]
    Invalid(&'static str),
}

/// Compute the schema hash guarding client/server compatibility.
///
/// Hashed over the protocol version, magic and message type names so that
/// incompatible builds are rejected at connect time.
pub fn compute_schema_hash() -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&PROTOCOL_VERSION.to_le_bytes());
    hasher.update(PROTOCOL_MAGIC);
    hasher.update(b"ClientAction");
    hasher.update(b"GameCommand");
    hasher.update(b"CommandList");
    hasher.update(b"GameRequest");
    hasher.update(b"ConnectRequest");

    let hash = hasher.finalize();
    u64::from_le_bytes(hash.as_bytes()[0..8].try_into().expect("8-byte slice"))
}

/// Encode a game request frame.
pub fn encode_request(request: &GameRequest) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(request)
}

/// Decode and verify a game request frame.
pub fn decode_request(data: &[u8]) -> Result<GameRequest, ProtocolError> {
    let request: GameRequest = decode_frame(data)?;
    request.verify().map_err(ProtocolError::Invalid)?;
    Ok(request)
}

/// Encode a command list frame.
pub fn encode_command_list(list: &CommandList) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(list)
}

/// Decode and verify a command list frame.
pub fn decode_command_list(data: &[u8]) -> Result<CommandList, ProtocolError> {
    let list: CommandList = decode_frame(data)?;
    list.verify().map_err(ProtocolError::Invalid)?;
    Ok(list)
}

/// Encode a connect request frame.
pub fn encode_connect_request(request: &ConnectRequest) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(request)
}

/// Decode a connect request frame.
pub fn decode_connect_request(data: &[u8]) -> Result<ConnectRequest, ProtocolError> {
    decode_frame(data)
}

/// Encode a connect acknowledgement frame.
pub fn encode_connect_ack(ack: &ConnectAck) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(ack)
}

/// Decode a connect acknowledgement frame.
pub fn decode_connect_ack(data: &[u8]) -> Result<ConnectAck, ProtocolError> {
    decode_frame(data)
}

fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload = postcard::to_allocvec(message).map_err(ProtocolError::Encode)?;
    let compressed = zstd::stream::encode_all(payload.as_slice(), COMPRESSION_LEVEL)?;
    if compressed.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLarge(compressed.len()));
    }

    let crc = crc32fast::hash(&compressed);

    // Length counts the checksum plus payload, excluding the length field.
    let length = (4 + compressed.len()) as u32;
    let mut frame = Vec::with_capacity(8 + compressed.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&compressed);
    Ok(frame)
}

fn decode_frame<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.len() < 8 {
        return Err(ProtocolError::FrameTooShort(data.len()));
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if length > 4 + MAX_FRAME_LEN {
        return Err(ProtocolError::TooLarge(length));
    }
    if data.len() < 4 + length {
        return Err(ProtocolError::LengthMismatch {
            expected: 4 + length,
            actual: data.len(),
        });
    }

    let expected = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let compressed = &data[8..4 + length];
    let actual = crc32fast::hash(compressed);
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }

    // Cap decompressed output before allocating it all.
    let decoder = zstd::stream::read::Decoder::new(compressed)?;
    let mut payload = Vec::new();
    decoder
        .take(MAX_DECOMPRESSED_LEN as u64 + 1)
        .read_to_end(&mut payload)?;
    if payload.len() > MAX_DECOMPRESSED_LEN {
        return Err(ProtocolError::TooLarge(payload.len()));
    }

    postcard::from_bytes(&payload).map_err(ProtocolError::Decode)
}
