//! Core types for the DBC decoder library
//!
//! This module defines the error types produced by each stage of the pipeline
//! (tokenizer, parser, model builder, codec) and the value types emitted when
//! decoding frames. Every error is recoverable: callers report and skip the
//! offending file or frame.

use serde::Serialize;
use std::fmt;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, DbcError>;

/// Physical (scaled) value of a signal
pub type PhysicalValue = f64;

/// Location in the DBC source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    /// 1-based line number
    pub line: usize,
    /// 1-based column (in characters)
    pub column: usize,
    /// Byte offset from the start of the text
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Input that matches no token rule
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unrecognized input at {position}: {fragment:?}")]
pub struct LexError {
    pub position: Position,
    pub fragment: String,
}

/// Token sequence that does not match the grammar
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("syntax error at {position}: expected {}, found {found}", .expected.join(" or "))]
pub struct ParseError {
    pub position: Position,
    /// Tokens that would have been accepted here
    pub expected: Vec<String>,
    pub found: String,
}

/// Kind of entity a name or id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Node,
    Message,
    Signal,
    EnvironmentVariable,
    ValueTable,
    ValueDescriptions,
    Attribute,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => write!(f, "node"),
            EntityKind::Message => write!(f, "message"),
            EntityKind::Signal => write!(f, "signal"),
            EntityKind::EnvironmentVariable => write!(f, "environment variable"),
            EntityKind::ValueTable => write!(f, "value table"),
            EntityKind::ValueDescriptions => write!(f, "value descriptions for"),
            EntityKind::Attribute => write!(f, "attribute"),
        }
    }
}

/// Structurally valid input that is referentially or type-inconsistent
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SemanticError {
    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: EntityKind, name: String },

    #[error("duplicate value {value} in value descriptions of '{owner}'")]
    DuplicateValue { owner: String, value: i64 },

    #[error("unresolved {kind} reference '{name}'")]
    UnresolvedReference { kind: EntityKind, name: String },

    #[error("attribute '{attribute}' value mismatch: {reason}")]
    AttributeTypeMismatch { attribute: String, reason: String },

    #[error("attribute '{attribute}' is defined for {expected} objects, applied to {found}")]
    AttributeScopeMismatch {
        attribute: String,
        expected: String,
        found: String,
    },

    #[error("multiplexing conflict in message '{message}': {reason}")]
    MultiplexingConflict { message: String, reason: String },

    #[error("signal '{signal}' of message '{message}' has an invalid layout: {reason}")]
    InvalidLayout {
        message: String,
        signal: String,
        reason: String,
    },
}

/// Errors raised while decoding or encoding a frame
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("signal '{signal}' needs {required} bytes but the frame has {available}")]
    BitRangeOutOfBounds {
        signal: String,
        required: usize,
        available: usize,
    },

    #[error("signal '{signal}' is not present for multiplexor value {}", .active.map_or_else(|| "<unknown>".to_string(), |v| v.to_string()))]
    MultiplexorNotPresent { signal: String, active: Option<u64> },

    #[error("signal '{signal}' has an unsupported value representation: {reason}")]
    UnsupportedValueRepresentation { signal: String, reason: String },

    #[error("message not found: CAN ID 0x{0:X}")]
    UnknownMessage(u32),

    #[error("signal '{signal}' not found in message 0x{message_id:X}")]
    UnknownSignal { message_id: u32, signal: String },

    #[error("value {value} cannot be represented by signal '{signal}'")]
    ValueNotRepresentable { signal: String, value: f64 },
}

/// Any error the library can report
#[derive(Debug, thiserror::Error)]
pub enum DbcError {
    #[error("lexical error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw signal value as extracted from the frame, before scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RawValue {
    /// Unsigned integer field
    Unsigned(u64),
    /// Two's-complement signed field
    Signed(i64),
    /// IEEE single or double field
    Float(f64),
}

impl RawValue {
    /// Numeric value used for scaling
    pub fn as_f64(&self) -> f64 {
        match self {
            RawValue::Unsigned(v) => *v as f64,
            RawValue::Signed(v) => *v as f64,
            RawValue::Float(v) => *v,
        }
    }

    /// Integer value, used for value descriptions and multiplexor switches
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Unsigned(v) => i64::try_from(*v).ok(),
            RawValue::Signed(v) => Some(*v),
            RawValue::Float(_) => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Unsigned(v) => write!(f, "{}", v),
            RawValue::Signed(v) => write!(f, "{}", v),
            RawValue::Float(v) => write!(f, "{:.3}", v),
        }
    }
}

/// A decoded signal with its current value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedSignal {
    /// Signal name from the DBC
    pub name: String,
    /// Physical value after factor and offset
    pub value: PhysicalValue,
    /// Raw value before scaling (useful for debugging)
    pub raw_value: RawValue,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Value description from VAL_ entries (e.g., "Off")
    pub value_description: Option<String>,
    /// False if the value lies outside the declared minimum/maximum
    pub within_range: bool,
}

/// All signals decoded from one frame of a message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    /// CAN message ID as declared in the DBC
    pub message_id: u32,
    /// Message name
    pub name: String,
    /// Transmitting node, unless unspecified
    pub sender: Option<String>,
    /// Signals present in this frame instance
    pub signals: Vec<DecodedSignal>,
    /// Value of the message's multiplexor signal, if it has one
    pub multiplexer_value: Option<u64>,
}

impl DecodedMessage {
    /// Look up a decoded signal by name
    pub fn signal(&self, name: &str) -> Option<&DecodedSignal> {
        self.signals.iter().find(|s| s.name == name)
    }
}
