//! Dynamic message instances.
//!
//! A [`MessageInstance`] holds field values keyed by field number, validated
//! against its [`MessageDescriptor`]. Fields the descriptor does not know
//! about are kept as raw [`UnknownField`]s so they survive a decode/encode
//! round trip.
//!
//! ## Presence
//!
//! Fields with [`Cardinality::Singular`] use implicit presence: storing the
//! zero value is the same as clearing the field, so such a field is never
//! reported by [`MessageInstance::has`] while it holds zero. Fields with
//! [`Cardinality::Optional`] keep a set zero value.

mod text;
mod value;

use crate::codec;
use crate::descriptor::{Cardinality, FieldDescriptor, FieldKind, MessageDescriptor};
use crate::error::{Error, Result};
use crate::wire::{encode_tag, encoded_len_tag, WireType};
use bytes::{BufMut, Bytes};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use text::{FormatterConfig, TextFormatter};
pub use value::Value;

/// A field the descriptor did not declare, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField {
    /// Field number from the tag
    pub number: u32,
    /// Wire type from the tag
    pub wire_type: WireType,
    /// Raw value bytes following the tag
    pub data: Bytes,
}

impl UnknownField {
    /// Creates a new unknown field
    pub fn new(number: u32, wire_type: WireType, data: impl Into<Bytes>) -> Self {
        Self {
            number,
            wire_type,
            data: data.into(),
        }
    }

    /// Writes the tag and the raw value
    pub fn encode(&self, buf: &mut impl BufMut) {
        encode_tag(self.number, self.wire_type, buf);
        buf.put_slice(&self.data);
    }

    /// Encoded size including the tag
    pub fn encoded_len(&self) -> usize {
        encoded_len_tag(self.number) + self.data.len()
    }
}

/// A message value built against a [`MessageDescriptor`]
#[derive(Debug, Clone)]
pub struct MessageInstance {
    descriptor: Arc<MessageDescriptor>,
    values: BTreeMap<u32, Value>,
    unknown_fields: Vec<UnknownField>,
}

impl PartialEq for MessageInstance {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.name() == other.descriptor.name()
            && self.values == other.values
            && self.unknown_fields == other.unknown_fields
    }
}

impl MessageInstance {
    /// Creates an empty instance
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        Self {
            descriptor,
            values: BTreeMap::new(),
            unknown_fields: Vec::new(),
        }
    }

    /// Decodes an instance with the default decoder settings
    pub fn decode(data: &[u8], descriptor: &Arc<MessageDescriptor>) -> Result<Self> {
        codec::decode(data, descriptor)
    }

    /// Encodes the instance
    pub fn encode(&self) -> Bytes {
        codec::encode(self)
    }

    /// The descriptor this instance was built against
    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// Fully-qualified message type name
    pub fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    fn field(&self, number: u32) -> Result<&FieldDescriptor> {
        self.descriptor
            .field(number)
            .ok_or_else(|| Error::unknown_field(self.descriptor.name(), number))
    }

    fn field_number(&self, name: &str) -> Result<u32> {
        self.descriptor
            .field_by_name(name)
            .map(FieldDescriptor::number)
            .ok_or_else(|| Error::unknown_field(self.descriptor.name(), name))
    }

    /// Sets a field after checking the value against the descriptor.
    ///
    /// Repeated fields take a [`Value::List`]. Setting an implicit-presence
    /// field to its zero value clears it.
    pub fn set(&mut self, number: u32, value: Value) -> Result<&mut Self> {
        let field = self.field(number)?;
        check_value(field, &value)?;
        let cardinality = field.cardinality();
        self.store(number, cardinality, value);
        Ok(self)
    }

    /// Sets a field by name, see [`MessageInstance::set`]
    pub fn set_by_name(&mut self, name: &str, value: Value) -> Result<&mut Self> {
        let number = self.field_number(name)?;
        self.set(number, value)
    }

    /// Sets an integer-valued singular field, enforcing the declared domain.
    ///
    /// An `int32` field accepts `-2^31..=2^31-1`, a `uint32` field
    /// `0..=2^32-1`, and so on. Values outside fail with [`Error::Range`].
    pub fn set_int(&mut self, number: u32, value: impl Into<i128>) -> Result<&mut Self> {
        let value = value.into();
        let field = self.field(number)?;

        if field.is_repeated() {
            return Err(Error::type_mismatch(
                field.name(),
                format!("repeated {}", field.kind()),
                "integer",
            ));
        }
        let Some((min, max)) = field.kind().int_range() else {
            return Err(Error::type_mismatch(field.name(), field.kind().type_name(), "integer"));
        };
        if value < min || value > max {
            return Err(Error::range(field.name(), value, min, max));
        }

        let converted = match field.kind() {
            FieldKind::Int32 | FieldKind::SInt32 | FieldKind::SFixed32 => Value::Int32(value as i32),
            FieldKind::Enum(_) => Value::Enum(value as i32),
            FieldKind::Int64 | FieldKind::SInt64 | FieldKind::SFixed64 => Value::Int64(value as i64),
            FieldKind::UInt32 | FieldKind::Fixed32 => Value::UInt32(value as u32),
            FieldKind::UInt64 | FieldKind::Fixed64 => Value::UInt64(value as u64),
            other => {
                return Err(Error::internal(format!("no integer domain for {}", other)));
            }
        };
        let cardinality = field.cardinality();
        self.store(number, cardinality, converted);
        Ok(self)
    }

    /// Appends one element to a repeated field
    pub fn push(&mut self, number: u32, value: Value) -> Result<&mut Self> {
        let field = self.field(number)?;
        if !field.is_repeated() {
            return Err(Error::type_mismatch(field.name(), field.kind().type_name(), "list element"));
        }
        check_element(field, &value)?;

        match self.values.entry(number).or_insert_with(|| Value::List(Vec::new())) {
            Value::List(items) => items.push(value),
            other => *other = Value::List(vec![value]),
        }
        Ok(self)
    }

    /// Returns the value of a field.
    ///
    /// Absent fields report their default: the declared default or zero
    /// value for singular fields, an empty list for repeated fields, an empty
    /// instance for message fields. Returns `None` only when the descriptor
    /// has no field with this number.
    pub fn get(&self, number: u32) -> Option<Cow<'_, Value>> {
        let field = self.descriptor.field(number)?;
        Some(match self.values.get(&number) {
            Some(value) => Cow::Borrowed(value),
            None => Cow::Owned(field.default_value()),
        })
    }

    /// Returns the value of a field by name, see [`MessageInstance::get`]
    pub fn get_by_name(&self, name: &str) -> Option<Cow<'_, Value>> {
        let number = self.descriptor.field_by_name(name)?.number();
        self.get(number)
    }

    /// Returns true if the field holds a value that will be encoded
    pub fn has(&self, number: u32) -> bool {
        self.values.contains_key(&number)
    }

    /// Clears one field, returning whether it was set
    pub fn clear_field(&mut self, number: u32) -> bool {
        self.values.remove(&number).is_some()
    }

    /// Clears every field, unknown fields included
    pub fn clear(&mut self) {
        self.values.clear();
        self.unknown_fields.clear();
    }

    /// Fields not declared by the descriptor, in the order they were read
    pub fn unknown_fields(&self) -> &[UnknownField] {
        &self.unknown_fields
    }

    /// Drops every unknown field
    pub fn clear_unknown_fields(&mut self) {
        self.unknown_fields.clear();
    }

    /// Set fields with their descriptors, in declaration order
    pub fn present_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> + '_ {
        self.descriptor
            .fields()
            .iter()
            .filter_map(|field| self.values.get(&field.number()).map(|value| (field, value)))
    }

    /// Merges `other` into this instance.
    ///
    /// Scalars set in `other` overwrite, repeated fields append, embedded
    /// messages merge recursively and unknown fields append.
    pub fn merge_from(&mut self, other: &MessageInstance) -> Result<()> {
        if self.type_name() != other.type_name() {
            return Err(Error::type_mismatch(
                self.type_name(),
                self.type_name(),
                other.type_name(),
            ));
        }

        let descriptor = Arc::clone(&self.descriptor);
        for (&number, value) in &other.values {
            if let Some(field) = descriptor.field(number) {
                self.merge_value(field, value.clone());
            }
        }
        self.unknown_fields
            .extend(other.unknown_fields.iter().cloned());
        Ok(())
    }

    /// Applies a decoded value with protobuf merge semantics
    pub(crate) fn merge_value(&mut self, field: &FieldDescriptor, value: Value) {
        let number = field.number();

        if field.is_repeated() {
            let incoming = match value {
                Value::List(items) => items,
                single => vec![single],
            };
            if incoming.is_empty() {
                return;
            }
            match self.values.entry(number).or_insert_with(|| Value::List(Vec::new())) {
                Value::List(items) => items.extend(incoming),
                other => *other = Value::List(incoming),
            }
            return;
        }

        if let (Some(Value::Message(existing)), Value::Message(incoming)) =
            (self.values.get_mut(&number), &value)
        {
            let descriptor = Arc::clone(&existing.descriptor);
            for (&inner_number, inner_value) in &incoming.values {
                if let Some(inner_field) = descriptor.field(inner_number) {
                    existing.merge_value(inner_field, inner_value.clone());
                }
            }
            existing
                .unknown_fields
                .extend(incoming.unknown_fields.iter().cloned());
            return;
        }

        self.store(number, field.cardinality(), value);
    }

    pub(crate) fn push_unknown(&mut self, field: UnknownField) {
        self.unknown_fields.push(field);
    }

    fn store(&mut self, number: u32, cardinality: Cardinality, value: Value) {
        let implicit_zero = match cardinality {
            Cardinality::Singular | Cardinality::Repeated => value.is_zero(),
            Cardinality::Optional => false,
        };

        if implicit_zero {
            self.values.remove(&number);
        } else {
            self.values.insert(number, value);
        }
    }
}

impl fmt::Display for MessageInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TextFormatter::new().write_to(self, f)
    }
}

fn check_element(field: &FieldDescriptor, value: &Value) -> Result<()> {
    if value.matches_kind(field.kind()) {
        Ok(())
    } else {
        Err(Error::type_mismatch(
            field.name(),
            field.kind().type_name(),
            value.type_name(),
        ))
    }
}

fn check_value(field: &FieldDescriptor, value: &Value) -> Result<()> {
    if !field.is_repeated() {
        return check_element(field, value);
    }

    match value {
        Value::List(items) => items.iter().try_for_each(|item| check_element(field, item)),
        other => Err(Error::type_mismatch(
            field.name(),
            format!("repeated {}", field.kind()),
            other.type_name(),
        )),
    }
}
