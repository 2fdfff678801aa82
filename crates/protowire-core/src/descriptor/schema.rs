//! Descriptors loaded from a compiled `FileDescriptorSet`.
//!
//! `protoc --descriptor_set_out=schema.pb --include_imports ...` produces the
//! input. The set is resolved with prost-reflect, then each requested message
//! is converted into this crate's [`MessageDescriptor`] tree.

use super::{
    Cardinality, DescriptorProvider, EnumDescriptor, FieldDescriptor, FieldKind,
    MessageDescriptor,
};
use crate::error::{Error, Result};
use crate::message::Value;
use prost::Message;
use prost_reflect::{DescriptorPool, Kind};
use prost_types::FileDescriptorSet;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

type ReflectMessage = prost_reflect::MessageDescriptor;
type ReflectField = prost_reflect::FieldDescriptor;

/// A resolved set of `.proto` files acting as a [`DescriptorProvider`]
#[derive(Debug)]
pub struct SchemaSet {
    pool: DescriptorPool,
    converted: Mutex<HashMap<String, Arc<MessageDescriptor>>>,
}

impl SchemaSet {
    /// Loads a binary-encoded `FileDescriptorSet`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let set = FileDescriptorSet::decode(data)?;
        Self::from_file_descriptor_set(set)
    }

    /// Loads a `FileDescriptorSet` from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        debug!("Loaded {} bytes of descriptor set from {}", data.len(), path.display());
        Self::from_bytes(&data)
    }

    /// Resolves an already-parsed `FileDescriptorSet`
    pub fn from_file_descriptor_set(set: FileDescriptorSet) -> Result<Self> {
        let pool = DescriptorPool::from_file_descriptor_set(set)
            .map_err(|e| Error::descriptor_build(e.to_string()))?;

        Ok(Self {
            pool,
            converted: Mutex::new(HashMap::new()),
        })
    }

    /// Fully-qualified names of every message in the set, sorted
    pub fn message_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .pool
            .all_messages()
            .map(|m| m.full_name().to_string())
            .collect();
        names.sort();
        names
    }

    fn convert_message(
        &self,
        message: &ReflectMessage,
        converted: &mut HashMap<String, Arc<MessageDescriptor>>,
        in_progress: &mut Vec<String>,
    ) -> Result<Arc<MessageDescriptor>> {
        let name = message.full_name();
        if let Some(existing) = converted.get(name) {
            return Ok(Arc::clone(existing));
        }
        if in_progress.iter().any(|n| n == name) {
            return Err(Error::descriptor_build(format!(
                "recursive message type '{}' is not supported (cycle: {} -> {})",
                name,
                in_progress.join(" -> "),
                name
            )));
        }

        in_progress.push(name.to_string());
        let mut builder = MessageDescriptor::builder(name);
        for field in message.fields() {
            builder = builder.field(self.convert_field(name, &field, converted, in_progress)?);
        }
        in_progress.pop();

        let descriptor = Arc::new(builder.build()?);
        trace!("Converted {} ({} fields)", name, descriptor.field_count());
        converted.insert(name.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    fn convert_field(
        &self,
        message_name: &str,
        field: &ReflectField,
        converted: &mut HashMap<String, Arc<MessageDescriptor>>,
        in_progress: &mut Vec<String>,
    ) -> Result<FieldDescriptor> {
        if field.is_group() {
            return Err(Error::descriptor_build(format!(
                "group field '{}.{}' is not supported",
                message_name,
                field.name()
            )));
        }

        let kind = match field.kind() {
            Kind::Double => FieldKind::Double,
            Kind::Float => FieldKind::Float,
            Kind::Int32 => FieldKind::Int32,
            Kind::Int64 => FieldKind::Int64,
            Kind::Uint32 => FieldKind::UInt32,
            Kind::Uint64 => FieldKind::UInt64,
            Kind::Sint32 => FieldKind::SInt32,
            Kind::Sint64 => FieldKind::SInt64,
            Kind::Fixed32 => FieldKind::Fixed32,
            Kind::Fixed64 => FieldKind::Fixed64,
            Kind::Sfixed32 => FieldKind::SFixed32,
            Kind::Sfixed64 => FieldKind::SFixed64,
            Kind::Bool => FieldKind::Bool,
            Kind::String => FieldKind::String,
            Kind::Bytes => FieldKind::Bytes,
            Kind::Enum(e) => FieldKind::Enum(Arc::new(EnumDescriptor::new(
                e.full_name(),
                e.values().map(|v| (v.name().to_string(), v.number())),
            ))),
            Kind::Message(m) => {
                FieldKind::Message(self.convert_message(&m, converted, in_progress)?)
            }
        };

        let cardinality = if field.cardinality() == prost_reflect::Cardinality::Repeated {
            Cardinality::Repeated
        } else if field.supports_presence() {
            Cardinality::Optional
        } else {
            Cardinality::Singular
        };

        let mut descriptor = FieldDescriptor::new(field.number(), field.name(), kind);
        descriptor = match cardinality {
            Cardinality::Repeated => descriptor.repeated().packed(field.is_packed()),
            Cardinality::Optional => descriptor.optional(),
            Cardinality::Singular => descriptor,
        };

        if cardinality != Cardinality::Repeated
            && field.field_descriptor_proto().default_value.is_some()
        {
            let declared = prost_reflect::Value::default_value_for_field(field);
            let default = convert_default(&declared).ok_or_else(|| {
                Error::descriptor_build(format!(
                    "unsupported default for '{}.{}'",
                    message_name,
                    field.name()
                ))
            })?;
            descriptor = descriptor.with_default(default);
        }

        Ok(descriptor)
    }
}

fn convert_default(value: &prost_reflect::Value) -> Option<Value> {
    use prost_reflect::Value as Reflect;

    Some(match value {
        Reflect::Bool(v) => Value::Bool(*v),
        Reflect::I32(v) => Value::Int32(*v),
        Reflect::I64(v) => Value::Int64(*v),
        Reflect::U32(v) => Value::UInt32(*v),
        Reflect::U64(v) => Value::UInt64(*v),
        Reflect::F32(v) => Value::Float(*v),
        Reflect::F64(v) => Value::Double(*v),
        Reflect::EnumNumber(v) => Value::Enum(*v),
        Reflect::String(v) => Value::String(v.clone()),
        Reflect::Bytes(v) => Value::Bytes(v.clone()),
        _ => return None,
    })
}

impl DescriptorProvider for SchemaSet {
    fn message_descriptor(&self, name: &str) -> Result<Arc<MessageDescriptor>> {
        let name = name.strip_prefix('.').unwrap_or(name);
        let message = self
            .pool
            .get_message_by_name(name)
            .ok_or_else(|| Error::message_not_found(name))?;

        let mut converted = self
            .converted
            .lock()
            .map_err(|e| Error::internal(format!("schema cache lock poisoned: {e}")))?;
        self.convert_message(&message, &mut converted, &mut Vec::new())
    }
}
