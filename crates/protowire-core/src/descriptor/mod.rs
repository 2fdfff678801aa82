//! Message and field descriptors.
//!
//! A [`MessageDescriptor`] is the immutable schema of one message type: its
//! name and an ordered list of [`FieldDescriptor`]s. Descriptors are built
//! once, validated by [`MessageDescriptorBuilder::build`], and then shared as
//! `Arc<MessageDescriptor>` by every [`MessageInstance`](crate::MessageInstance)
//! of that type.
//!
//! Descriptors normally come from a [`DescriptorProvider`]: either the
//! process-wide [`DescriptorRegistry`] or a [`SchemaSet`] loaded from a
//! compiled `FileDescriptorSet`.

mod registry;
mod schema;

use crate::error::{Error, Result};
use crate::message::{MessageInstance, Value};
use crate::wire::{is_valid_field_number, WireType, MAX_FIELD_NUMBER};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use registry::{DescriptorProvider, DescriptorRegistry};
pub use schema::SchemaSet;

/// Semantic type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// `int32`, plain varint, negative values sign-extended to 10 bytes
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    UInt32,
    /// `uint64`
    UInt64,
    /// `sint32`, zig-zag varint
    SInt32,
    /// `sint64`, zig-zag varint
    SInt64,
    /// `bool`
    Bool,
    /// Open enum stored as its number
    Enum(Arc<EnumDescriptor>),
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `sfixed32`
    SFixed32,
    /// `sfixed64`
    SFixed64,
    /// `float`
    Float,
    /// `double`
    Double,
    /// UTF-8 `string`
    String,
    /// Opaque `bytes`
    Bytes,
    /// Embedded message
    Message(Arc<MessageDescriptor>),
}

impl FieldKind {
    /// Wire type used for a single (unpacked) value of this kind
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldKind::Int32
            | FieldKind::Int64
            | FieldKind::UInt32
            | FieldKind::UInt64
            | FieldKind::SInt32
            | FieldKind::SInt64
            | FieldKind::Bool
            | FieldKind::Enum(_) => WireType::Varint,
            FieldKind::Fixed64 | FieldKind::SFixed64 | FieldKind::Double => WireType::I64,
            FieldKind::Fixed32 | FieldKind::SFixed32 | FieldKind::Float => WireType::I32,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message(_) => WireType::Len,
        }
    }

    /// Returns the proto type name (`int32`, `string`, or the message/enum name)
    pub fn type_name(&self) -> &str {
        match self {
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::UInt32 => "uint32",
            FieldKind::UInt64 => "uint64",
            FieldKind::SInt32 => "sint32",
            FieldKind::SInt64 => "sint64",
            FieldKind::Bool => "bool",
            FieldKind::Enum(e) => e.name(),
            FieldKind::Fixed32 => "fixed32",
            FieldKind::Fixed64 => "fixed64",
            FieldKind::SFixed32 => "sfixed32",
            FieldKind::SFixed64 => "sfixed64",
            FieldKind::Float => "float",
            FieldKind::Double => "double",
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
            FieldKind::Message(m) => m.name(),
        }
    }

    /// Scalar numeric kinds, the only ones that may use packed encoding
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message(_)
        )
    }

    /// Inclusive integer domain for integer-valued kinds
    pub fn int_range(&self) -> Option<(i128, i128)> {
        match self {
            FieldKind::Int32 | FieldKind::SInt32 | FieldKind::SFixed32 | FieldKind::Enum(_) => {
                Some((i32::MIN as i128, i32::MAX as i128))
            }
            FieldKind::Int64 | FieldKind::SInt64 | FieldKind::SFixed64 => {
                Some((i64::MIN as i128, i64::MAX as i128))
            }
            FieldKind::UInt32 | FieldKind::Fixed32 => Some((0, u32::MAX as i128)),
            FieldKind::UInt64 | FieldKind::Fixed64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    /// The zero value of this kind
    pub fn zero_value(&self) -> Value {
        match self {
            FieldKind::Int32 | FieldKind::SInt32 | FieldKind::SFixed32 => Value::Int32(0),
            FieldKind::Int64 | FieldKind::SInt64 | FieldKind::SFixed64 => Value::Int64(0),
            FieldKind::UInt32 | FieldKind::Fixed32 => Value::UInt32(0),
            FieldKind::UInt64 | FieldKind::Fixed64 => Value::UInt64(0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Enum(e) => Value::Enum(e.default_number()),
            FieldKind::Float => Value::Float(0.0),
            FieldKind::Double => Value::Double(0.0),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Bytes => Value::Bytes(bytes::Bytes::new()),
            FieldKind::Message(m) => Value::Message(MessageInstance::new(Arc::clone(m))),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// How many values a field holds and how presence is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Implicit presence: the zero value is indistinguishable from unset
    Singular,
    /// Explicit presence: a set zero value is kept and encoded
    Optional,
    /// Zero or more values
    Repeated,
}

impl Cardinality {
    /// Returns the label used in `.proto` syntax (empty for implicit presence)
    pub fn label(&self) -> &'static str {
        match self {
            Cardinality::Singular => "",
            Cardinality::Optional => "optional",
            Cardinality::Repeated => "repeated",
        }
    }
}

/// Static metadata for one message field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    number: u32,
    name: String,
    kind: FieldKind,
    cardinality: Cardinality,
    default: Option<Value>,
    packed: bool,
}

impl FieldDescriptor {
    /// Creates a singular field.
    ///
    /// Message-typed fields always track presence and become
    /// [`Cardinality::Optional`].
    pub fn new(number: u32, name: impl Into<String>, kind: FieldKind) -> Self {
        let cardinality = match kind {
            FieldKind::Message(_) => Cardinality::Optional,
            _ => Cardinality::Singular,
        };
        Self {
            number,
            name: name.into(),
            kind,
            cardinality,
            default: None,
            packed: true,
        }
    }

    /// Marks the field as having explicit presence
    pub fn optional(mut self) -> Self {
        self.cardinality = Cardinality::Optional;
        self
    }

    /// Marks the field as repeated
    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    /// Sets whether a repeated scalar field uses packed encoding
    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = packed;
        self
    }

    /// Sets the declared default value (proto2 `[default = ...]`)
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Field number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic type
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Cardinality
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Wire type of one element of this field
    pub fn wire_type(&self) -> WireType {
        self.kind.wire_type()
    }

    /// Returns true for repeated fields
    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    /// Returns true if a set zero value must still be encoded
    pub fn has_explicit_presence(&self) -> bool {
        self.cardinality == Cardinality::Optional
    }

    /// Returns true if this field is encoded as one packed block
    pub fn is_packed(&self) -> bool {
        self.is_repeated() && self.packed && self.kind.is_packable()
    }

    /// Value reported for an absent field
    pub fn default_value(&self) -> Value {
        if self.is_repeated() {
            return Value::List(Vec::new());
        }
        match &self.default {
            Some(value) => value.clone(),
            None => self.kind.zero_value(),
        }
    }
}

/// One named value of an enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Value name
    pub name: String,
    /// Value number
    pub number: i32,
}

/// Schema of an enum type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    name: String,
    values: Vec<EnumValue>,
}

impl EnumDescriptor {
    /// Creates an enum descriptor from `(name, number)` pairs in declaration order
    pub fn new<N: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = (N, i32)>,
    ) -> Self {
        Self {
            name: name.into(),
            values: values
                .into_iter()
                .map(|(name, number)| EnumValue {
                    name: name.into(),
                    number,
                })
                .collect(),
        }
    }

    /// Fully-qualified enum name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared values
    pub fn values(&self) -> &[EnumValue] {
        &self.values
    }

    /// Name of the first value declared with `number`
    pub fn value_name(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.number == number)
            .map(|v| v.name.as_str())
    }

    /// Number of the value called `name`
    pub fn value_number(&self, name: &str) -> Option<i32> {
        self.values.iter().find(|v| v.name == name).map(|v| v.number)
    }

    /// The first declared value, or 0 for an empty enum
    pub fn default_number(&self) -> i32 {
        self.values.first().map_or(0, |v| v.number)
    }
}

/// Immutable schema of a message type
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

impl MessageDescriptor {
    /// Starts building a descriptor for the named message type
    pub fn builder(name: impl Into<String>) -> MessageDescriptorBuilder {
        MessageDescriptorBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// A descriptor with no fields; every field decodes as unknown
    pub(crate) fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            by_number: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Fully-qualified message name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by number
    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    /// Looks up a field by name
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Number of declared fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Collects fields and validates them into a [`MessageDescriptor`]
#[derive(Debug, Clone)]
pub struct MessageDescriptorBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl MessageDescriptorBuilder {
    /// Appends a field; declaration order is encoding order
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Validates field numbers, names and defaults
    pub fn build(self) -> Result<MessageDescriptor> {
        let mut by_number = HashMap::with_capacity(self.fields.len());
        let mut by_name = HashMap::with_capacity(self.fields.len());

        for (index, field) in self.fields.iter().enumerate() {
            if !is_valid_field_number(field.number) {
                return Err(Error::InvalidFieldNumber {
                    number: field.number,
                    max: MAX_FIELD_NUMBER,
                });
            }
            if by_number.insert(field.number, index).is_some() {
                return Err(Error::duplicate_field(&self.name, field.number));
            }
            if by_name.insert(field.name.clone(), index).is_some() {
                return Err(Error::duplicate_field(&self.name, &field.name));
            }

            if let Some(default) = &field.default {
                if field.is_repeated() || matches!(field.kind, FieldKind::Message(_)) {
                    return Err(Error::descriptor_build(format!(
                        "field '{}.{}' cannot declare a default value",
                        self.name, field.name
                    )));
                }
                if !default.matches_kind(&field.kind) {
                    return Err(Error::type_mismatch(
                        &field.name,
                        field.kind.type_name(),
                        default.type_name(),
                    ));
                }
                if field.cardinality != Cardinality::Optional {
                    return Err(Error::descriptor_build(format!(
                        "field '{}.{}' has implicit presence and cannot declare a default value",
                        self.name, field.name
                    )));
                }
            }

            if let FieldKind::Enum(e) = &field.kind {
                if field.cardinality == Cardinality::Singular && e.default_number() != 0 {
                    return Err(Error::descriptor_build(format!(
                        "field '{}.{}' has implicit presence but enum {} does not start at 0",
                        self.name,
                        field.name,
                        e.name()
                    )));
                }
            }
        }

        Ok(MessageDescriptor {
            name: self.name,
            fields: self.fields,
            by_number,
            by_name,
        })
    }
}
