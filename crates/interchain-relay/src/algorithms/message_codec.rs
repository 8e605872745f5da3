//! # Message Codec
//!
//! Wire format shared by dispatch logs and the delivery entry point:
//!
//! ```text
//! version: u8 | nonce: u32 | origin: u32 | sender: [u8; 32] |
//! destination: u32 | recipient: [u8; 32] | body: [u8]
//! ```
//!
//! Integers are big-endian. The message id is Keccak-256 of the encoding.

use crate::domain::{DispatchedMessage, DomainId, LogPosition, MessageId, TxId};
use primitive_types::H256;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Current message format version.
pub const MESSAGE_VERSION: u8 = 0;

/// Length of the fixed header preceding the body.
pub const HEADER_LEN: usize = 1 + 4 + 4 + 32 + 4 + 32;

/// Message decoding failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input shorter than the fixed header.
    #[error("message too short: {got} bytes, header needs 77")]
    TooShort {
        /// Bytes received.
        got: usize,
    },
    /// Unknown format version.
    #[error("unsupported message version {0}")]
    UnsupportedVersion(u8),
}

/// Fields of a message before it is placed in a log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageFields {
    /// Per-origin dispatch counter.
    pub nonce: u32,
    /// Origin domain.
    pub origin: DomainId,
    /// Padded sender.
    pub sender: H256,
    /// Destination domain.
    pub destination: DomainId,
    /// Padded recipient.
    pub recipient: H256,
    /// Body bytes.
    pub body: Vec<u8>,
}

/// Encode message fields into wire bytes.
pub fn encode_fields(fields: &MessageFields) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + fields.body.len());
    out.push(MESSAGE_VERSION);
    out.extend_from_slice(&fields.nonce.to_be_bytes());
    out.extend_from_slice(&fields.origin.0.to_be_bytes());
    out.extend_from_slice(fields.sender.as_bytes());
    out.extend_from_slice(&fields.destination.0.to_be_bytes());
    out.extend_from_slice(fields.recipient.as_bytes());
    out.extend_from_slice(&fields.body);
    out
}

/// Re-encode an observed message for submission.
pub fn encode_message(message: &DispatchedMessage) -> Vec<u8> {
    let mut out = encode_fields(&MessageFields {
        nonce: message.nonce,
        origin: message.origin,
        sender: message.sender,
        destination: message.destination,
        recipient: message.recipient,
        body: message.body.clone(),
    });
    out[0] = message.version;
    out
}

/// Keccak-256 id of encoded message bytes.
pub fn message_id(encoded: &[u8]) -> MessageId {
    H256(Keccak256::digest(encoded).into())
}

/// Decode the fields of an encoded message.
pub fn decode_fields(bytes: &[u8]) -> Result<MessageFields, CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::TooShort { got: bytes.len() });
    }
    if bytes[0] != MESSAGE_VERSION {
        return Err(CodecError::UnsupportedVersion(bytes[0]));
    }

    let read_u32 = |at: usize| {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[at..at + 4]);
        u32::from_be_bytes(buf)
    };

    Ok(MessageFields {
        nonce: read_u32(1),
        origin: DomainId(read_u32(5)),
        sender: H256::from_slice(&bytes[9..41]),
        destination: DomainId(read_u32(41)),
        recipient: H256::from_slice(&bytes[45..77]),
        body: bytes[HEADER_LEN..].to_vec(),
    })
}

/// Decode a dispatch event into a message.
pub fn decode_message(
    bytes: &[u8],
    origin_tx: TxId,
    position: LogPosition,
) -> Result<DispatchedMessage, CodecError> {
    let fields = decode_fields(bytes)?;
    Ok(DispatchedMessage {
        id: message_id(bytes),
        version: bytes[0],
        nonce: fields.nonce,
        origin: fields.origin,
        sender: fields.sender,
        destination: fields.destination,
        recipient: fields.recipient,
        body: fields.body,
        origin_tx,
        position,
    })
}
