//! DBC Decoder Library
//!
//! A stateless, reusable library for reading CAN network descriptions in the
//! DBC text format and decoding/encoding CAN frame payloads with them.
//!
//! # Architecture
//!
//! Data flows strictly forward through four stages:
//! - `lexer` turns the text into positioned tokens
//! - `parser` builds a structural tree, one record per DBC section
//! - `model::builder` resolves every cross reference into a [`Network`]
//! - `codec` and `message_decoder` convert between frame bytes and values
//!
//! The library does NOT:
//! - Read CAN log files or talk to bus hardware
//! - Track signal value changes over time
//! - Edit DBC files beyond writing a model back out as text
//!
//! # Example Usage
//!
//! ```no_run
//! use dbc_decoder::{parse_file, DecoderConfig, MuxContext};
//! use std::path::Path;
//!
//! let network = parse_file(Path::new("powertrain.dbc")).unwrap();
//!
//! // Decode a single signal
//! let frame = [0x2A, 0, 0, 0, 0, 0, 0, 0];
//! let speed = network
//!     .decode_signal(0x123, "VehicleSpeed", &frame, MuxContext::FromFrame)
//!     .unwrap();
//! println!("speed = {}", speed);
//!
//! // Decode everything present in the frame
//! let decoded = network
//!     .decode_message(0x123, &frame, &DecoderConfig::default())
//!     .unwrap();
//! for signal in decoded.signals {
//!     println!("{} = {} {}", signal.name, signal.value, signal.unit.unwrap_or_default());
//! }
//! ```

// Public modules
pub mod codec;
pub mod config;
pub mod lexer;
pub mod message_decoder;
pub mod model;
pub mod parser;
pub mod types;

// Re-export main types for convenience
pub use config::{DecoderConfig, ParseConfig};
pub use message_decoder::{MessageDecoder, MuxContext};
pub use model::{Message, Network, NetworkStats, ObjectRef, Signal};
pub use types::{
    CodecError, DbcError, DecodedMessage, DecodedSignal, EntityKind, LexError, ParseError,
    PhysicalValue, Position, RawValue, Result, SemanticError,
};

use std::path::Path;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse DBC text with the default configuration
pub fn parse(text: &str) -> Result<Network> {
    parse_with_config(text, &ParseConfig::default())
}

/// Parse DBC text into a validated network
pub fn parse_with_config(text: &str, config: &ParseConfig) -> Result<Network> {
    let file = parser::parse_dbc(text, config)?;
    let network = model::build_network(file, config)?;

    let stats = network.stats();
    log::info!(
        "Parsed DBC network: {} nodes, {} messages, {} signals",
        stats.num_nodes,
        stats.num_messages,
        stats.num_signals
    );
    Ok(network)
}

/// Load and parse a DBC file with the default configuration
pub fn parse_file(path: &Path) -> Result<Network> {
    parse_file_with_config(path, &ParseConfig::default())
}

/// Load and parse a DBC file
///
/// The file is read as UTF-8, falling back to Latin-1 (a superset-compatible
/// reading of Windows-1252 text) when it is not valid UTF-8.
pub fn parse_file_with_config(path: &Path, config: &ParseConfig) -> Result<Network> {
    log::info!("Parsing DBC file: {:?}", path);

    let bytes = std::fs::read(path)?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            log::warn!("DBC file {:?} is not UTF-8, trying Latin-1 encoding", path);
            err.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    parse_with_config(&text, config)
}
