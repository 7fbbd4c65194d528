//! DBC Decoder CLI Application
//!
//! Command-line interface for the dbc-decoder library. It:
//! - Loads one or more DBC files (in parallel)
//! - Prints network statistics or dumps the model as JSON
//! - Decodes a single frame payload given as hex

use anyhow::{bail, Context, Result};
use clap::Parser;
use dbc_decoder::{Network, ParseConfig};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

mod config;

use config::AppConfig;

/// DBC Decoder - Inspect CAN network descriptions and decode frames
#[derive(Parser, Debug)]
#[command(name = "dbc-cli")]
#[command(about = "Inspect DBC files and decode CAN frames", long_about = None)]
#[command(version)]
struct Args {
    /// Path to DBC file(s) (can be repeated)
    #[arg(long, value_name = "FILE")]
    dbc: Vec<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the parsed network(s) as JSON
    #[arg(long)]
    json: bool,

    /// CAN message ID to decode (decimal or 0x-prefixed hex)
    #[arg(short, long, value_name = "ID", requires = "data")]
    message: Option<String>,

    /// Frame payload as hex bytes, e.g. "2A00FF" or "2A 00 FF"
    #[arg(short, long, value_name = "HEX", requires = "message")]
    data: Option<String>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("DBC Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", dbc_decoder::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let files = app_config.all_dbc_files(&args.dbc);
    if files.is_empty() {
        println!("DBC Decoder - No input specified");
        println!("\nQuick Start:");
        println!("  dbc-cli --dbc powertrain.dbc");
        println!("  dbc-cli --dbc powertrain.dbc --json");
        println!("  dbc-cli --dbc powertrain.dbc --message 0x123 --data \"2A 00 00 00\"");
        println!("\nUse --help for more options");
        return Ok(());
    }

    let networks = load_networks(&files, &app_config.parser)?;

    if args.json {
        let dump: Vec<_> = files.iter().zip(&networks).collect();
        println!("{}", serde_json::to_string_pretty(&dump)?);
    } else if !args.quiet {
        for (path, network) in files.iter().zip(&networks) {
            print_stats(path, network);
        }
    }

    if let (Some(id), Some(data)) = (&args.message, &args.data) {
        let message_id = parse_message_id(id)?;
        let frame = parse_hex(data)?;
        decode_frame(&networks, message_id, &frame, &app_config)?;
    }

    Ok(())
}

/// Parse every DBC file in parallel, failing on the first bad file
fn load_networks(files: &[PathBuf], config: &ParseConfig) -> Result<Vec<Network>> {
    files
        .par_iter()
        .map(|path| {
            dbc_decoder::parse_file_with_config(path, config)
                .with_context(|| format!("Failed to load DBC file: {:?}", path))
        })
        .collect()
}

fn print_stats(path: &Path, network: &Network) {
    let stats = network.stats();
    println!("{}", path.display());
    if !network.version().is_empty() {
        println!("  Version:     {}", network.version());
    }
    println!("  Nodes:       {}", stats.num_nodes);
    println!("  Messages:    {}", stats.num_messages);
    println!("  Signals:     {}", stats.num_signals);
    println!("  Value tables: {}", stats.num_value_tables);
    println!("  Env vars:    {}", stats.num_environment_variables);
    println!("  Attributes:  {}", stats.num_attribute_definitions);
    println!("  Comments:    {}", stats.num_comments);
}

/// Decode one frame with the first network that defines the message
fn decode_frame(
    networks: &[Network],
    message_id: u32,
    frame: &[u8],
    app_config: &AppConfig,
) -> Result<()> {
    if !app_config.decoder.should_process_message(message_id) {
        log::warn!("Message 0x{:X} is excluded by the message filter", message_id);
        return Ok(());
    }

    let network = networks
        .iter()
        .find(|network| network.message(message_id).is_some())
        .with_context(|| format!("No loaded DBC file defines message 0x{:X}", message_id))?;

    let decoded = network
        .decode_message(message_id, frame, &app_config.decoder)
        .with_context(|| format!("Failed to decode message 0x{:X}", message_id))?;

    println!("\n{} (0x{:X})", decoded.name, decoded.message_id);
    if let Some(value) = decoded.multiplexer_value {
        println!("  multiplexor = {}", value);
    }
    for signal in &decoded.signals {
        let mut line = format!("  {} = {}", signal.name, signal.value);
        if let Some(unit) = &signal.unit {
            line.push(' ');
            line.push_str(unit);
        }
        if let Some(description) = &signal.value_description {
            line.push_str(&format!(" ({})", description));
        }
        if !signal.within_range {
            line.push_str(" [out of range]");
        }
        println!("{}", line);
    }
    Ok(())
}

fn parse_message_id(text: &str) -> Result<u32> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("Invalid message ID: {:?}", text))
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        bail!("Hex payload has an odd number of digits: {:?}", text);
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        bail!("Invalid hex digit {:?} in payload {:?}", bad, text);
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("Invalid hex byte: {:?}", &digits[i..i + 2]))
        })
        .collect()
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
