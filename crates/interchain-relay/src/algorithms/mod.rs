//! # Algorithms Module
//!
//! Pure functions used by the scanner and orchestrator.

pub mod grouping;
pub mod message_codec;

pub use grouping::group_by_destination;
pub use message_codec::{
    decode_fields, decode_message, encode_fields, encode_message, message_id, CodecError,
    MessageFields, HEADER_LEN, MESSAGE_VERSION,
};
