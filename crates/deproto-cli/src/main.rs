//! deproto - Inspect Protocol Buffer payloads without a schema
//!
//! This tool decodes raw protobuf wire data from a file, a directory of
//! captures, or stdin, and prints an indented field tree.

use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::{Args, Parser, ValueEnum};
use deproto_core::{
    Decoder, DecoderConfig, RenderConfig, Renderer, StatsVisitor, DEFAULT_HEURISTIC_BUDGET,
    DEFAULT_MAX_DEPTH,
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Inspect Protocol Buffer payloads without a schema
#[derive(Parser, Debug)]
#[command(name = "deproto")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Encoding of the input bytes
    #[arg(long, value_enum, default_value = "raw")]
    input_format: InputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Maximum nesting depth probed for embedded messages
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Fail instead of falling back to text/hex when the depth limit is hit
    #[arg(long)]
    strict_depth: bool,

    /// Total payload bytes the nested-message probe may examine per input
    #[arg(long, default_value_t = DEFAULT_HEURISTIC_BUDGET)]
    heuristic_budget: usize,

    /// Spaces per indentation level
    #[arg(long, default_value = "4")]
    indent: usize,

    /// On a decode error, print the fields decoded before it
    #[arg(long)]
    partial: bool,

    /// Print a summary of the decoded tree after the fields
    #[arg(long)]
    stats: bool,
}

#[derive(Args, Debug)]
#[group(required = false, multiple = false)]
struct InputMode {
    /// Path to a file holding one encoded message (stdin if omitted)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of captured messages to decode one by one
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// How the input bytes are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    /// Raw binary protobuf
    Raw,
    /// Hex digits, whitespace ignored
    Hex,
    /// Standard base64, whitespace ignored
    Base64,
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
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file, &mut out)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory, &mut out)
    } else {
        let mut raw = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut raw)
            .context("Failed to read stdin")?;
        process_input(&cli, &raw, &mut out)
    }
}

fn decoder_for(cli: &Cli) -> Decoder {
    Decoder::with_config(
        DecoderConfig::new()
            .max_depth(cli.max_depth)
            .strict_depth(cli.strict_depth)
            .heuristic_budget(cli.heuristic_budget),
    )
}

fn renderer_for(cli: &Cli) -> Renderer {
    Renderer::with_config(RenderConfig::new().indent_str(" ".repeat(cli.indent)))
}

/// Decode a single input file
fn process_single_file(cli: &Cli, file: &Path, out: &mut impl Write) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    trace!("Reading {}", file.display());
    let raw = fs::read(file)
        .with_context(|| format!("Failed to read input file: {}", file.display()))?;

    process_input(cli, &raw, out).with_context(|| format!("Failed to decode {}", file.display()))
}

/// Decode every regular, non-hidden file under a directory
fn process_directory(cli: &Cli, directory: &Path, out: &mut impl Write) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut decoded = 0;
    let mut failed = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() || is_hidden(path) {
            continue;
        }

        writeln!(out, "== {}", path.display())?;
        match process_single_file(cli, path, out) {
            Ok(()) => decoded += 1,
            Err(e) => {
                // Log error but continue with other files
                warn!("Error processing {}: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }

    info!("Summary: {} decoded, {} failed", decoded, failed);
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Decode one input buffer and print its fields
fn process_input(cli: &Cli, raw: &[u8], out: &mut impl Write) -> Result<()> {
    let data = decode_input(cli.input_format, raw)?;
    debug!("Decoding {} bytes", data.len());

    let decoder = decoder_for(cli);
    let renderer = renderer_for(cli);

    let fields = if cli.partial {
        let result = decoder.decode_partial(&data);
        out.write_all(renderer.render(&result.fields).as_bytes())?;
        if let Some(error) = result.error {
            bail!(
                "decoding stopped after {} fields: {}",
                result.fields.len(),
                error
            );
        }
        result.fields
    } else {
        let fields = decoder.decode(&data).context("Invalid protobuf data")?;
        out.write_all(renderer.render(&fields).as_bytes())?;
        fields
    };

    if cli.stats {
        write_stats(out, &StatsVisitor::collect(&fields))?;
    }

    Ok(())
}

fn write_stats(out: &mut impl Write, stats: &StatsVisitor) -> io::Result<()> {
    writeln!(
        out,
        "# {} fields ({} varint, {} fixed, {} group markers), max depth {}",
        stats.field_count, stats.varint_count, stats.fixed_count, stats.group_count, stats.max_depth
    )?;
    writeln!(
        out,
        "# payloads: {} messages, {} text, {} opaque",
        stats.message_count, stats.text_count, stats.opaque_count
    )
}

/// Turn the input file contents into wire bytes
fn decode_input(format: InputFormat, raw: &[u8]) -> Result<Vec<u8>> {
    match format {
        InputFormat::Raw => Ok(raw.to_vec()),
        InputFormat::Hex => {
            let digits = strip_whitespace(raw);
            parse_hex(&digits)
        }
        InputFormat::Base64 => {
            let encoded = strip_whitespace(raw);
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .context("Input is not valid base64")
        }
    }
}

fn strip_whitespace(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect()
}

fn parse_hex(digits: &[u8]) -> Result<Vec<u8>> {
    let digits = digits
        .strip_prefix(b"0x")
        .or_else(|| digits.strip_prefix(b"0X"))
        .unwrap_or(digits);

    hex::decode(digits).context("Input is not valid hex")
}
