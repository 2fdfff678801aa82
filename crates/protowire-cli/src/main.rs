//! protowire - Inspect Protocol Buffer payloads
//!
//! This tool decodes binary protobuf payloads against a compiled descriptor
//! set (or without any schema), prints them in text format, and checks that
//! re-encoding reproduces the original bytes.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use protowire_core::codec::try_encode;
use protowire_core::wire::encode_length_delimited;
use protowire_core::{
    Cardinality, Decoder, DecoderConfig, DescriptorProvider, FieldDescriptor, FieldKind,
    MessageDescriptor, MessageInstance, SchemaSet, TextFormatter, Value,
};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Inspect and round-trip Protocol Buffer payloads
#[derive(Parser, Debug)]
#[command(name = "protowire")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the fields of a message type
    Describe(DescribeArgs),
    /// Decode payloads and print them in text format
    Decode(PayloadArgs),
    /// Decode and re-encode payloads, reporting whether the bytes match
    Roundtrip(PayloadArgs),
}

#[derive(Args, Debug)]
struct DescribeArgs {
    /// Compiled descriptor set (protoc --descriptor_set_out)
    #[arg(long)]
    descriptor_set: PathBuf,

    /// Fully-qualified message name
    #[arg(short, long)]
    message: String,
}

#[derive(Args, Debug)]
struct PayloadArgs {
    #[command(flatten)]
    input: InputMode,

    /// Compiled descriptor set (protoc --descriptor_set_out)
    #[arg(long, requires = "message", conflicts_with = "raw")]
    descriptor_set: Option<PathBuf>,

    /// Fully-qualified message name
    #[arg(short, long, requires = "descriptor_set")]
    message: Option<String>,

    /// Decode without a schema; every field is reported by number
    #[arg(long)]
    raw: bool,

    /// Payloads are streams of varint length-prefixed messages
    #[arg(long)]
    delimited: bool,

    /// Drop unknown fields while decoding
    #[arg(long)]
    discard_unknown: bool,

    /// Maximum depth of nested messages
    #[arg(long, default_value = "100")]
    recursion_limit: u32,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single payload file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of payload files
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Outcome of re-encoding one payload file
#[derive(Debug)]
struct RoundTrip {
    path: PathBuf,
    messages: usize,
    input: blake3::Hash,
    output: blake3::Hash,
}

impl RoundTrip {
    fn identical(&self) -> bool {
        self.input == self.output
    }

    fn report(&self) -> String {
        format!(
            "{} {} ({} message(s)) in={} out={}",
            if self.identical() { "ok  " } else { "DIFF" },
            self.path.display(),
            self.messages,
            &self.input.to_hex()[..16],
            &self.output.to_hex()[..16]
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match &cli.command {
        Command::Describe(args) => {
            let descriptor = load_message(&args.descriptor_set, &args.message)?;
            print!("{}", describe(&descriptor));
            Ok(())
        }
        Command::Decode(args) => run_decode(args),
        Command::Roundtrip(args) => run_roundtrip(args),
    }
}

/// Resolve one message type from a descriptor set on disk
fn load_message(path: &Path, name: &str) -> Result<Arc<MessageDescriptor>> {
    let schema = SchemaSet::from_file(path)
        .with_context(|| format!("Failed to load descriptor set: {}", path.display()))?;
    schema
        .message_descriptor(name)
        .with_context(|| format!("Failed to resolve message {} in {}", name, path.display()))
}

/// The descriptor payloads are decoded against
fn payload_descriptor(args: &PayloadArgs) -> Result<Arc<MessageDescriptor>> {
    match (&args.descriptor_set, &args.message) {
        (Some(path), Some(name)) => load_message(path, name),
        _ if args.raw => Ok(Arc::new(MessageDescriptor::builder("").build()?)),
        _ => bail!("Either --descriptor-set with --message, or --raw, must be specified"),
    }
}

fn decoder(args: &PayloadArgs) -> Decoder {
    Decoder::with_config(
        DecoderConfig::default()
            .recursion_limit(args.recursion_limit)
            .discard_unknown_fields(args.discard_unknown),
    )
}

/// Render a message type in `.proto`-like syntax
fn describe(descriptor: &MessageDescriptor) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "message {} {{", descriptor.name());
    for field in descriptor.fields() {
        let _ = writeln!(out, "  {}", describe_field(field));
    }
    out.push_str("}\n");
    out
}

fn describe_field(field: &FieldDescriptor) -> String {
    let mut line = String::new();
    match field.cardinality() {
        Cardinality::Singular => {}
        Cardinality::Optional => line.push_str("optional "),
        Cardinality::Repeated => line.push_str("repeated "),
    }
    let _ = write!(line, "{} {} = {}", field.kind().type_name(), field.name(), field.number());

    let mut options = Vec::new();
    if field.is_repeated() && field.kind().is_packable() && !field.is_packed() {
        options.push("packed = false".to_string());
    }
    if field.cardinality() == Cardinality::Optional && !field.is_repeated() {
        if let Some(default) = declared_default(field) {
            options.push(format!("default = {}", default));
        }
    }
    if !options.is_empty() {
        let _ = write!(line, " [{}]", options.join(", "));
    }
    line.push(';');
    line
}

/// Non-zero default of a scalar field, formatted as a literal
fn declared_default(field: &FieldDescriptor) -> Option<String> {
    let value = field.default_value();
    if value.is_zero() {
        return None;
    }
    Some(match value {
        Value::Bool(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::UInt32(v) => v.to_string(),
        Value::UInt64(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Enum(v) => match field.kind() {
            FieldKind::Enum(e) => e
                .value_name(v)
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string()),
            _ => v.to_string(),
        },
        Value::String(v) => format!("{:?}", v),
        Value::Bytes(v) => format!("{:?}", v),
        Value::Message(_) | Value::List(_) => return None,
    })
}

/// Files named by the input flags; hidden files are skipped in directories
fn collect_inputs(input: &InputMode) -> Result<Vec<PathBuf>> {
    if let Some(file) = &input.file {
        if !file.is_file() {
            bail!("Input file does not exist: {}", file.display());
        }
        return Ok(vec![file.clone()]);
    }

    let Some(directory) = &input.directory else {
        bail!("Either --file or --directory must be specified");
    };
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());
    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            trace!("Skipping hidden file: {}", path.display());
            continue;
        }

        files.push(path.to_path_buf());
    }

    debug!("Found {} payload file(s)", files.len());
    Ok(files)
}

/// Decode every message in a payload
fn decode_payload(
    data: &[u8],
    decoder: &Decoder,
    descriptor: &Arc<MessageDescriptor>,
    delimited: bool,
) -> Result<Vec<MessageInstance>> {
    if !delimited {
        return Ok(vec![decoder.decode(data, descriptor)?]);
    }

    let mut messages = Vec::new();
    let mut position = 0;
    while position < data.len() {
        let (message, consumed) = decoder
            .decode_length_delimited(&data[position..], descriptor)
            .with_context(|| format!("Bad message at byte {}", position))?;
        messages.push(message);
        position += consumed;
    }
    Ok(messages)
}

/// Encode messages back into a payload of the same framing
fn encode_payload(messages: &[MessageInstance], delimited: bool) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for message in messages {
        let body = try_encode(message)?;
        if delimited {
            encode_length_delimited(&body, &mut buf);
        } else {
            buf.extend_from_slice(&body);
        }
    }
    Ok(buf)
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    trace!("Reading {}", path.display());
    fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
}

/// Render the messages in one payload file
fn decode_file(
    path: &Path,
    decoder: &Decoder,
    descriptor: &Arc<MessageDescriptor>,
    delimited: bool,
) -> Result<String> {
    let data = read_payload(path)?;
    let messages = decode_payload(&data, decoder, descriptor, delimited)
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    let formatter = TextFormatter::new();
    let mut out = String::new();
    for (i, message) in messages.iter().enumerate() {
        if delimited {
            let _ = writeln!(out, "# message {}", i + 1);
        }
        out.push_str(&formatter.format(message));
    }
    Ok(out)
}

fn roundtrip_file(
    path: &Path,
    decoder: &Decoder,
    descriptor: &Arc<MessageDescriptor>,
    delimited: bool,
) -> Result<RoundTrip> {
    let data = read_payload(path)?;
    let messages = decode_payload(&data, decoder, descriptor, delimited)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    let encoded = encode_payload(&messages, delimited)
        .with_context(|| format!("Failed to re-encode {}", path.display()))?;

    Ok(RoundTrip {
        path: path.to_path_buf(),
        messages: messages.len(),
        input: blake3::hash(&data),
        output: blake3::hash(&encoded),
    })
}

fn run_decode(args: &PayloadArgs) -> Result<()> {
    let descriptor = payload_descriptor(args)?;
    let decoder = decoder(args);
    let files = collect_inputs(&args.input)?;
    let many = args.input.directory.is_some();

    for path in &files {
        match decode_file(path, &decoder, &descriptor, args.delimited) {
            Ok(text) => {
                if many {
                    println!("# {}", path.display());
                }
                print!("{}", text);
            }
            // Log error but continue with other files
            Err(e) if many => warn!("Error processing {}: {:#}", path.display(), e),
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn run_roundtrip(args: &PayloadArgs) -> Result<()> {
    let descriptor = payload_descriptor(args)?;
    let decoder = decoder(args);
    let files = collect_inputs(&args.input)?;
    let many = args.input.directory.is_some();

    let mut checked = 0;
    let mut mismatched = 0;
    for path in &files {
        match roundtrip_file(path, &decoder, &descriptor, args.delimited) {
            Ok(result) => {
                println!("{}", result.report());
                checked += 1;
                if !result.identical() {
                    mismatched += 1;
                }
            }
            Err(e) if many => warn!("Error processing {}: {:#}", path.display(), e),
            Err(e) => return Err(e),
        }
    }

    info!("Summary: {} checked, {} differ", checked, mismatched);
    if mismatched > 0 {
        bail!("{} of {} payload(s) did not round-trip", mismatched, checked);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    };
    use tempfile::TempDir;

    fn write_descriptor_set(dir: &Path) -> PathBuf {
        let field = |name: &str, number: i32, label: Label, ty: Type| FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(label as i32),
            r#type: Some(ty as i32),
            ..Default::default()
        };
        let mut retries = field("retries", 2, Label::Optional, Type::Int32);
        retries.proto3_optional = Some(true);
        retries.oneof_index = Some(0);

        let set = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("messages.proto".to_string()),
                package: Some("grpc.testing".to_string()),
                syntax: Some("proto3".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("ReconnectParams".to_string()),
                    field: vec![
                        field("max_reconnect_backoff_ms", 1, Label::Optional, Type::Int32),
                        retries,
                        field("hosts", 3, Label::Repeated, Type::String),
                    ],
                    oneof_decl: vec![prost_types::OneofDescriptorProto {
                        name: Some("_retries".to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };

        let path = dir.join("schema.pb");
        fs::write(&path, set.encode_to_vec()).unwrap();
        path
    }

    fn payload_args(input: InputMode, schema: Option<PathBuf>) -> PayloadArgs {
        PayloadArgs {
            input,
            raw: schema.is_none(),
            message: schema
                .as_ref()
                .map(|_| "grpc.testing.ReconnectParams".to_string()),
            descriptor_set: schema,
            delimited: false,
            discard_unknown: false,
            recursion_limit: 100,
        }
    }

    #[test]
    fn test_describe() {
        let temp_dir = TempDir::new().unwrap();
        let schema = write_descriptor_set(temp_dir.path());
        let descriptor = load_message(&schema, "grpc.testing.ReconnectParams").unwrap();

        assert_eq!(
            describe(&descriptor),
            "message grpc.testing.ReconnectParams {\n  \
             int32 max_reconnect_backoff_ms = 1;\n  \
             optional int32 retries = 2;\n  \
             repeated string hosts = 3;\n}\n"
        );
    }

    #[test]
    fn test_missing_message() {
        let temp_dir = TempDir::new().unwrap();
        let schema = write_descriptor_set(temp_dir.path());
        assert!(load_message(&schema, "grpc.testing.Missing").is_err());
        assert!(load_message(&temp_dir.path().join("absent.pb"), "x").is_err());
    }

    #[test]
    fn test_decode_file_with_schema() {
        let temp_dir = TempDir::new().unwrap();
        let schema = write_descriptor_set(temp_dir.path());
        let payload = temp_dir.path().join("params.bin");
        // Field 1 = 300, field 3 "a", undeclared field 5 = 1
        fs::write(&payload, [0x08, 0xAC, 0x02, 0x1A, 0x01, b'a', 0x28, 0x01]).unwrap();

        let args = payload_args(
            InputMode {
                file: Some(payload.clone()),
                directory: None,
            },
            Some(schema),
        );
        let descriptor = payload_descriptor(&args).unwrap();
        let text = decode_file(&payload, &decoder(&args), &descriptor, false).unwrap();
        assert_eq!(
            text,
            "max_reconnect_backoff_ms: 300\nhosts: \"a\"\n5: 1\n"
        );
    }

    #[test]
    fn test_decode_raw() {
        let temp_dir = TempDir::new().unwrap();
        let payload = temp_dir.path().join("raw.bin");
        // Field 1, varint 150
        fs::write(&payload, [0x08, 0x96, 0x01]).unwrap();

        let args = payload_args(
            InputMode {
                file: Some(payload.clone()),
                directory: None,
            },
            None,
        );
        let descriptor = payload_descriptor(&args).unwrap();
        let text = decode_file(&payload, &decoder(&args), &descriptor, false).unwrap();
        assert_eq!(text, "1: 150\n");
    }

    #[test]
    fn test_roundtrip_detects_non_canonical_input() {
        let temp_dir = TempDir::new().unwrap();
        let schema = write_descriptor_set(temp_dir.path());
        let canonical = temp_dir.path().join("canonical.bin");
        let repeated = temp_dir.path().join("repeated.bin");
        // Field 1 = 300, then optional field 2 explicitly set to 0
        fs::write(&canonical, [0x08, 0xAC, 0x02, 0x10, 0x00]).unwrap();
        // last value wins, so the first occurrence is dropped on re-encode
        fs::write(&repeated, [0x08, 0x05, 0x08, 0x07]).unwrap();

        let args = payload_args(
            InputMode {
                file: None,
                directory: Some(temp_dir.path().to_path_buf()),
            },
            Some(schema),
        );
        let descriptor = payload_descriptor(&args).unwrap();
        let decoder = decoder(&args);

        let result = roundtrip_file(&canonical, &decoder, &descriptor, false).unwrap();
        assert!(result.identical());
        assert_eq!(result.messages, 1);
        assert!(result.report().starts_with("ok"));

        let result = roundtrip_file(&repeated, &decoder, &descriptor, false).unwrap();
        assert!(!result.identical());
        assert!(result.report().starts_with("DIFF"));
    }

    #[test]
    fn test_delimited_stream() {
        let descriptor = Arc::new(MessageDescriptor::builder("").build().unwrap());
        // Length 2 { 1: 1 }, length 0 {}, length 3 { 2: 150 }
        let data = [0x02, 0x08, 0x01, 0x00, 0x03, 0x10, 0x96, 0x01];

        let messages = decode_payload(&data, &Decoder::new(), &descriptor, true).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(encode_payload(&messages, true).unwrap(), data.to_vec());

        // Length 5 with only one byte following
        assert!(decode_payload(&[0x05, 0x08], &Decoder::new(), &descriptor, true).is_err());
    }

    #[test]
    fn test_collect_inputs_skips_hidden_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("b.bin"), [0x08, 0x01]).unwrap();
        fs::write(temp_dir.path().join(".hidden"), [0x08, 0x01]).unwrap();
        fs::write(temp_dir.path().join("nested").join("a.bin"), [0x08, 0x01]).unwrap();

        let files = collect_inputs(&InputMode {
            file: None,
            directory: Some(temp_dir.path().to_path_buf()),
        })
        .unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["b.bin".to_string(), "a.bin".to_string()]);
    }

    #[test]
    fn test_collect_inputs_missing_paths() {
        assert!(collect_inputs(&InputMode {
            file: Some(PathBuf::from("/nonexistent/payload.bin")),
            directory: None,
        })
        .is_err());
        assert!(collect_inputs(&InputMode {
            file: None,
            directory: Some(PathBuf::from("/nonexistent/dir")),
        })
        .is_err());
    }

    #[test]
    fn test_schema_or_raw_required() {
        let mut args = payload_args(
            InputMode {
                file: Some(PathBuf::from("x")),
                directory: None,
            },
            None,
        );
        args.raw = false;
        assert!(payload_descriptor(&args).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
