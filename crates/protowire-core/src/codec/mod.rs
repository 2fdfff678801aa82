//! Descriptor-driven encoding and decoding.
//!
//! The free functions use default settings. Build a [`Decoder`] from a
//! [`DecoderConfig`] to change the nesting limit, the size limit, or to drop
//! unknown fields while parsing.

mod decoder;
mod encoder;

use crate::descriptor::MessageDescriptor;
use crate::error::Result;
use crate::message::MessageInstance;
use crate::wire::DEFAULT_RECURSION_LIMIT;
use std::sync::{Arc, OnceLock};

pub use decoder::Decoder;
pub use encoder::{
    encode, encode_length_delimited_message, encode_to, encoded_len, try_encode,
    try_encode_with_limit,
};

/// Default upper bound on the size of a decoded or encoded message
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = i32::MAX as usize;

/// Decoder settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Maximum depth of nested messages
    pub recursion_limit: u32,
    /// Inputs longer than this many bytes are rejected
    pub max_message_size: usize,
    /// Drop unknown fields instead of keeping them
    pub discard_unknown_fields: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            discard_unknown_fields: false,
        }
    }
}

impl DecoderConfig {
    /// Set the maximum nesting depth
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Set the maximum input size in bytes
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set whether unknown fields are dropped
    pub fn discard_unknown_fields(mut self, discard: bool) -> Self {
        self.discard_unknown_fields = discard;
        self
    }
}

/// Decodes a message with default settings
pub fn decode(data: &[u8], descriptor: &Arc<MessageDescriptor>) -> Result<MessageInstance> {
    Decoder::new().decode(data, descriptor)
}

/// Decodes a length-prefixed message, returning it with the bytes consumed
pub fn decode_length_delimited_message(
    data: &[u8],
    descriptor: &Arc<MessageDescriptor>,
) -> Result<(MessageInstance, usize)> {
    Decoder::new().decode_length_delimited(data, descriptor)
}

/// Decodes bytes without a schema; every field lands in the unknown set
pub fn decode_raw(data: &[u8]) -> Result<MessageInstance> {
    static RAW: OnceLock<Arc<MessageDescriptor>> = OnceLock::new();
    let descriptor = RAW.get_or_init(|| Arc::new(MessageDescriptor::empty("")));
    decode(data, descriptor)
}
