//! Text rendering of message instances.
//!
//! Output follows protobuf text format: `name: value` for scalars,
//! `name { ... }` for embedded messages. Unknown fields are printed by number
//! the way `protoc --decode_raw` does, with length-delimited values shown as
//! nested messages when they parse as one.

use super::{MessageInstance, UnknownField, Value};
use crate::codec;
use crate::descriptor::FieldKind;
use crate::wire::{
    decode_fixed32, decode_fixed64, decode_varint, encoded_len_tag, WireType,
    DEFAULT_RECURSION_LIMIT,
};
use std::fmt::{self, Write as FmtWrite};

/// Configuration for text rendering
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Indentation string (default: 2 spaces)
    pub indent_str: String,
    /// Print unknown fields after known ones
    pub show_unknown_fields: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
            show_unknown_fields: true,
        }
    }
}

impl FormatterConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }

    /// Sets whether unknown fields are printed
    pub fn show_unknown_fields(mut self, show: bool) -> Self {
        self.show_unknown_fields = show;
        self
    }
}

/// Renders [`MessageInstance`]s as protobuf text format
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    config: FormatterConfig,
}

impl TextFormatter {
    /// Creates a formatter with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a formatter with custom configuration
    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    /// Renders the message to a string
    pub fn format(&self, message: &MessageInstance) -> String {
        let mut output = String::new();
        // Writing into a String cannot fail
        let _ = self.write_to(message, &mut output);
        output
    }

    /// Renders the message into a writer
    pub fn write_to(&self, message: &MessageInstance, w: &mut impl FmtWrite) -> fmt::Result {
        let mut writer = TextWriter {
            writer: w,
            config: &self.config,
            indent_level: 0,
        };
        writer.write_message(message)
    }
}

struct TextWriter<'a, W: FmtWrite> {
    writer: &'a mut W,
    config: &'a FormatterConfig,
    indent_level: usize,
}

impl<'a, W: FmtWrite> TextWriter<'a, W> {
    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) -> fmt::Result {
        for _ in 0..self.indent_level {
            write!(self.writer, "{}", self.config.indent_str)?;
        }
        Ok(())
    }

    fn write_message(&mut self, message: &MessageInstance) -> fmt::Result {
        for (field, value) in message.present_fields() {
            match value {
                Value::List(items) => {
                    for item in items {
                        self.write_field(field.name(), field.kind(), item)?;
                    }
                }
                single => self.write_field(field.name(), field.kind(), single)?,
            }
        }

        if self.config.show_unknown_fields {
            for unknown in message.unknown_fields() {
                self.write_unknown(unknown)?;
            }
        }

        Ok(())
    }

    fn write_field(&mut self, name: &str, kind: &FieldKind, value: &Value) -> fmt::Result {
        self.write_indent()?;

        if let Value::Message(inner) = value {
            writeln!(self.writer, "{} {{", name)?;
            self.indent();
            self.write_message(inner)?;
            self.dedent();
            self.write_indent()?;
            return writeln!(self.writer, "}}");
        }

        write!(self.writer, "{}: ", name)?;
        match value {
            Value::Bool(v) => write!(self.writer, "{}", v)?,
            Value::Int32(v) => write!(self.writer, "{}", v)?,
            Value::Int64(v) => write!(self.writer, "{}", v)?,
            Value::UInt32(v) => write!(self.writer, "{}", v)?,
            Value::UInt64(v) => write!(self.writer, "{}", v)?,
            Value::Float(v) => write!(self.writer, "{}", format_float(*v))?,
            Value::Double(v) => write!(self.writer, "{}", format_float(*v))?,
            Value::Enum(number) => match kind {
                FieldKind::Enum(e) => match e.value_name(*number) {
                    Some(label) => write!(self.writer, "{}", label)?,
                    None => write!(self.writer, "{}", number)?,
                },
                _ => write!(self.writer, "{}", number)?,
            },
            Value::String(v) => write!(self.writer, "\"{}\"", escape_string(v))?,
            Value::Bytes(v) => write!(self.writer, "\"{}\"", escape_bytes(v))?,
            Value::Message(_) | Value::List(_) => {}
        }
        writeln!(self.writer)
    }

    fn write_unknown(&mut self, field: &UnknownField) -> fmt::Result {
        let number = field.number;
        let data = &field.data[..];

        match field.wire_type {
            WireType::Varint => {
                let value = decode_varint(data).map(|(v, _)| v).unwrap_or_default();
                self.write_indent()?;
                writeln!(self.writer, "{}: {}", number, value)
            }
            WireType::I32 => {
                let value = decode_fixed32(data).map(|(v, _)| v).unwrap_or_default();
                self.write_indent()?;
                writeln!(self.writer, "{}: 0x{:08x}", number, value)
            }
            WireType::I64 => {
                let value = decode_fixed64(data).map(|(v, _)| v).unwrap_or_default();
                self.write_indent()?;
                writeln!(self.writer, "{}: 0x{:016x}", number, value)
            }
            WireType::Len => {
                let payload = crate::wire::decode_length_delimited(data)
                    .map(|(payload, _)| payload)
                    .unwrap_or_default();
                if looks_like_text(payload) {
                    self.write_indent()?;
                    return writeln!(self.writer, "{}: \"{}\"", number, escape_bytes(payload));
                }
                self.write_raw_block(number, payload)
            }
            WireType::StartGroup => {
                let end = data.len().saturating_sub(encoded_len_tag(number));
                self.write_raw_block(number, &data[..end])
            }
            WireType::EndGroup => Ok(()),
        }
    }

    /// Prints a payload as a nested message when it parses as one,
    /// otherwise as an escaped string.
    fn write_raw_block(&mut self, number: u32, payload: &[u8]) -> fmt::Result {
        let nested = if !payload.is_empty() && self.indent_level < DEFAULT_RECURSION_LIMIT as usize {
            codec::decode_raw(payload).ok()
        } else {
            None
        };

        self.write_indent()?;
        match nested {
            Some(inner) => {
                writeln!(self.writer, "{} {{", number)?;
                self.indent();
                self.write_message(&inner)?;
                self.dedent();
                self.write_indent()?;
                writeln!(self.writer, "}}")
            }
            None => writeln!(self.writer, "{}: \"{}\"", number, escape_bytes(payload)),
        }
    }
}

fn format_float<T: Into<f64> + ToString + Copy>(value: T) -> String {
    let wide: f64 = value.into();
    if wide.is_nan() {
        "nan".to_string()
    } else if wide == f64::INFINITY {
        "inf".to_string()
    } else if wide == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

/// Printable UTF-8 payloads are shown as strings rather than parsed
fn looks_like_text(payload: &[u8]) -> bool {
    std::str::from_utf8(payload).map_or(false, |s| {
        s.chars()
            .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
    })
}

/// Escape a string for text format, keeping non-ASCII characters
fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\'' => result.push_str("\\'"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ if c.is_ascii_control() => {
                result.push_str(&format!("\\{:03o}", c as u8));
            }
            _ => result.push(c),
        }
    }
    result
}

/// Escape raw bytes, octal-escaping anything outside printable ASCII
fn escape_bytes(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len());
    for &b in data {
        match b {
            b'\\' => result.push_str("\\\\"),
            b'"' => result.push_str("\\\""),
            b'\'' => result.push_str("\\'"),
            b'\n' => result.push_str("\\n"),
            b'\r' => result.push_str("\\r"),
            b'\t' => result.push_str("\\t"),
            0x20..=0x7E => result.push(b as char),
            _ => result.push_str(&format!("\\{:03o}", b)),
        }
    }
    result
}
