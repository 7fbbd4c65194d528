//! Parser and decoder configuration types
//!
//! Both configurations are plain serde structs so an application can load them
//! from its own config file. Defaults follow the DBC format strictly.

use serde::{Deserialize, Serialize};

/// Configuration for parsing DBC text into a network model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Maximum identifier length accepted by the tokenizer (None = unlimited)
    #[serde(default = "default_max_identifier_len")]
    pub max_identifier_len: Option<usize>,

    /// Require transmitters, receivers and access nodes to name a declared node
    #[serde(default = "default_true")]
    pub strict_node_references: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_identifier_len() -> Option<usize> {
    Some(32)
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_identifier_len: default_max_identifier_len(),
            strict_node_references: true,
        }
    }
}

impl ParseConfig {
    /// Create a parse configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the identifier length limit
    pub fn with_max_identifier_len(mut self, limit: Option<usize>) -> Self {
        self.max_identifier_len = limit;
        self
    }

    /// Builder method: enable or disable node reference checks
    pub fn with_strict_node_references(mut self, enabled: bool) -> Self {
        self.strict_node_references = enabled;
        self
    }
}

/// Configuration for whole-message decoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Optional: only decode these specific CAN message IDs
    #[serde(default)]
    pub message_filter: Option<Vec<u32>>,

    /// Whether to attach value descriptions (VAL_) to decoded signals
    #[serde(default = "default_true")]
    pub value_descriptions: bool,

    /// Drop signals whose physical value is outside [minimum, maximum]
    #[serde(default)]
    pub drop_out_of_range: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            message_filter: None,
            value_descriptions: true,
            drop_out_of_range: false,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set message filter
    pub fn with_message_filter(mut self, messages: Vec<u32>) -> Self {
        self.message_filter = Some(messages);
        self
    }

    /// Builder method: enable or disable value description lookup
    pub fn with_value_descriptions(mut self, enabled: bool) -> Self {
        self.value_descriptions = enabled;
        self
    }

    /// Builder method: drop out-of-range signals from decoded messages
    pub fn with_drop_out_of_range(mut self, enabled: bool) -> Self {
        self.drop_out_of_range = enabled;
        self
    }

    /// Check if a message ID should be processed
    pub fn should_process_message(&self, message_id: u32) -> bool {
        match &self.message_filter {
            Some(messages) => messages.contains(&message_id),
            None => true,
        }
    }
}
