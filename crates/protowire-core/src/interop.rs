//! Typed wrappers over dynamic messages.
//!
//! A [`GeneratedMessage`] pairs a Rust type with a lazily built descriptor
//! in the [global registry](DescriptorRegistry::global), giving typed
//! accessors on top of a [`MessageInstance`].

use crate::codec;
use crate::descriptor::{DescriptorRegistry, FieldDescriptor, FieldKind, MessageDescriptor};
use crate::error::{Error, Result};
use crate::message::MessageInstance;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// A message type with a fixed schema
pub trait GeneratedMessage: Sized {
    /// Fully-qualified protobuf type name
    const TYPE_NAME: &'static str;

    /// Builds the descriptor; called at most once per process
    fn build_descriptor() -> Result<MessageDescriptor>;

    /// Wraps an instance of this type
    fn from_instance(instance: MessageInstance) -> Result<Self>;

    /// The underlying instance
    fn as_instance(&self) -> &MessageInstance;

    /// The registered descriptor
    fn descriptor() -> Result<Arc<MessageDescriptor>> {
        DescriptorRegistry::global().get_or_register(Self::TYPE_NAME, Self::build_descriptor)
    }

    /// Encodes the message, rejecting output over the serialization limit
    fn encode(&self) -> Result<Bytes> {
        codec::try_encode(self.as_instance())
    }

    /// Decodes a message of this type
    fn decode(data: &[u8]) -> Result<Self> {
        let descriptor = Self::descriptor()?;
        Self::from_instance(MessageInstance::decode(data, &descriptor)?)
    }
}

/// `grpc.testing.ReconnectParams`, sent by reconnect interop clients
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectParams {
    inner: MessageInstance,
}

impl ReconnectParams {
    const MAX_RECONNECT_BACKOFF_MS: u32 = 1;

    /// Creates an empty message
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: MessageInstance::new(Self::descriptor()?),
        })
    }

    /// Maximum reconnect backoff in milliseconds, 0 when unset
    pub fn max_reconnect_backoff_ms(&self) -> i32 {
        self.inner
            .get(Self::MAX_RECONNECT_BACKOFF_MS)
            .and_then(|value| value.as_i32())
            .unwrap_or_default()
    }

    /// Sets the backoff; values outside the `int32` range are rejected
    pub fn set_max_reconnect_backoff_ms(&mut self, value: i64) -> Result<&mut Self> {
        self.inner.set_int(Self::MAX_RECONNECT_BACKOFF_MS, value)?;
        Ok(self)
    }

    /// Resets the backoff to 0
    pub fn clear_max_reconnect_backoff_ms(&mut self) {
        self.inner.clear_field(Self::MAX_RECONNECT_BACKOFF_MS);
    }
}

impl GeneratedMessage for ReconnectParams {
    const TYPE_NAME: &'static str = "grpc.testing.ReconnectParams";

    fn build_descriptor() -> Result<MessageDescriptor> {
        MessageDescriptor::builder(Self::TYPE_NAME)
            .field(FieldDescriptor::new(
                Self::MAX_RECONNECT_BACKOFF_MS,
                "max_reconnect_backoff_ms",
                FieldKind::Int32,
            ))
            .build()
    }

    fn from_instance(instance: MessageInstance) -> Result<Self> {
        if instance.type_name() != Self::TYPE_NAME {
            return Err(Error::type_mismatch(
                "message",
                Self::TYPE_NAME,
                instance.type_name(),
            ));
        }
        if instance.descriptor().as_ref() != Self::descriptor()?.as_ref() {
            return Err(Error::descriptor_build(format!(
                "instance of {} was built against a different schema",
                Self::TYPE_NAME
            )));
        }
        Ok(Self { inner: instance })
    }

    fn as_instance(&self) -> &MessageInstance {
        &self.inner
    }
}

impl fmt::Display for ReconnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
