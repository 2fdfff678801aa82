//! # protowire-core
//!
//! A schema-driven Protocol Buffers runtime: message descriptors, dynamic
//! message instances with validated accessors, and a wire codec that keeps
//! unknown fields intact.
//!
//! This crate provides the core functionality for:
//! - Describing message types, by hand or from a compiled `FileDescriptorSet`
//! - Encoding and decoding the protobuf binary wire format
//! - Rendering messages in a text format for inspection
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`wire`]: Varints, zig-zag, fixed-width values and field tags
//! - [`descriptor`]: Message schemas, the shared registry and schema loading
//! - [`message`]: Dynamic message instances and text rendering
//! - [`codec`]: Descriptor-driven encoder and decoder
//! - [`interop`]: Typed wrappers such as [`interop::ReconnectParams`]
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use protowire_core::{FieldDescriptor, FieldKind, MessageDescriptor, MessageInstance};
//! use std::sync::Arc;
//!
//! let descriptor = Arc::new(
//!     MessageDescriptor::builder("grpc.testing.ReconnectParams")
//!         .field(FieldDescriptor::new(1, "max_reconnect_backoff_ms", FieldKind::Int32))
//!         .build()?,
//! );
//!
//! let mut message = MessageInstance::new(Arc::clone(&descriptor));
//! message.set_int(1, 300)?;
//! assert_eq!(message.encode().as_ref(), &[0x08, 0xAC, 0x02]);
//!
//! let decoded = MessageInstance::decode(&[0x08, 0xAC, 0x02], &descriptor)?;
//! assert_eq!(decoded, message);
//! # Ok::<(), protowire_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`DescriptorProvider`]: Supply descriptors from any source
//! - [`GeneratedMessage`]: Attach a typed API to a fixed schema

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod interop;
pub mod message;
pub mod wire;

// Re-export primary types for convenience
pub use codec::{decode, encode, try_encode, Decoder, DecoderConfig};
pub use descriptor::{
    Cardinality, DescriptorProvider, DescriptorRegistry, EnumDescriptor, FieldDescriptor,
    FieldKind, MessageDescriptor, SchemaSet,
};
pub use error::{Error, Result};
pub use interop::{GeneratedMessage, ReconnectParams};
pub use message::{FormatterConfig, MessageInstance, TextFormatter, UnknownField, Value};
pub use wire::WireType;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
