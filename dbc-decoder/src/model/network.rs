//! Network model
//!
//! The fully resolved, immutable view of one DBC file. Entities live in
//! ordered collections owned by the [`Network`]; cross references are names or
//! ids looked up through indices, never pointers, so the model is trivially
//! `Send + Sync`.

use crate::codec::BitLayout;
use serde::Serialize;
use std::collections::HashMap;

/// Node name meaning "no specific node"
pub const UNSPECIFIED_NODE: &str = "Vector__XXX";

/// True for both spellings of the "no specific node" sentinel
pub fn is_unspecified_node(name: &str) -> bool {
    name == UNSPECIFIED_NODE || name == "VECTOR__XXX"
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ByteOrder {
    /// Little-endian (Intel format), written `@1`
    LittleEndian,
    /// Big-endian (Motorola format), written `@0`
    BigEndian,
}

/// Value type for integer signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueType {
    /// Signed integer, written `-`
    Signed,
    /// Unsigned integer, written `+`
    Unsigned,
}

/// Override from `SIG_VALTYPE_`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtendedValueType {
    Integer,
    Float32,
    Float64,
    /// Any code the format does not define
    Reserved(u32),
}

impl ExtendedValueType {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ExtendedValueType::Integer,
            1 => ExtendedValueType::Float32,
            2 => ExtendedValueType::Float64,
            other => ExtendedValueType::Reserved(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            ExtendedValueType::Integer => 0,
            ExtendedValueType::Float32 => 1,
            ExtendedValueType::Float64 => 2,
            ExtendedValueType::Reserved(code) => *code,
        }
    }
}

/// How a signal's raw bit pattern is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueRepresentation {
    Unsigned,
    Signed,
    Float32,
    Float64,
}

/// Multiplexing role of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MultiplexerRole {
    /// Plain signal
    #[default]
    None,
    /// The message's switch signal (`M`)
    Multiplexor,
    /// Present when the switch equals the value (`mN`)
    Multiplexed(u64),
    /// Multiplexed signal that is itself a switch (`mNM`)
    MultiplexedMultiplexor(u64),
}

impl MultiplexerRole {
    /// Parse `M`, `mN` or `mNM`
    pub fn from_indicator(text: &str) -> Option<Self> {
        if text == "M" {
            return Some(MultiplexerRole::Multiplexor);
        }
        let digits = text.strip_prefix('m')?;
        let (digits, nested) = match digits.strip_suffix('M') {
            Some(d) => (d, true),
            None => (digits, false),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value = digits.parse().ok()?;
        Some(if nested {
            MultiplexerRole::MultiplexedMultiplexor(value)
        } else {
            MultiplexerRole::Multiplexed(value)
        })
    }

    /// Text as written in a `SG_` line
    pub fn indicator(&self) -> Option<String> {
        match self {
            MultiplexerRole::None => None,
            MultiplexerRole::Multiplexor => Some("M".to_string()),
            MultiplexerRole::Multiplexed(v) => Some(format!("m{}", v)),
            MultiplexerRole::MultiplexedMultiplexor(v) => Some(format!("m{}M", v)),
        }
    }

    /// Switch value for multiplexed signals
    pub fn switch_value(&self) -> Option<u64> {
        match self {
            MultiplexerRole::Multiplexed(v) | MultiplexerRole::MultiplexedMultiplexor(v) => {
                Some(*v)
            }
            _ => None,
        }
    }

    /// True if other signals can be switched by this one
    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            MultiplexerRole::Multiplexor | MultiplexerRole::MultiplexedMultiplexor(_)
        )
    }
}

/// Inclusive range of switch values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwitchRange {
    pub min: u64,
    pub max: u64,
}

impl SwitchRange {
    pub fn contains(&self, value: u64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Extended multiplexing entry (`SG_MUL_VAL_`) of one signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedMultiplex {
    /// Name of the switch signal in the same message
    pub switch: String,
    pub ranges: Vec<SwitchRange>,
}

impl ExtendedMultiplex {
    pub fn contains(&self, value: u64) -> bool {
        self.ranges.iter().any(|r| r.contains(value))
    }
}

/// Ordered raw value → description mapping
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValueDescriptions(Vec<(i64, String)>);

impl ValueDescriptions {
    pub(crate) fn new(values: Vec<(i64, String)>) -> Self {
        Self(values)
    }

    /// Description of a raw value
    pub fn get(&self, raw: i64) -> Option<&str> {
        self.0
            .iter()
            .find(|(value, _)| *value == raw)
            .map(|(_, text)| text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.0.iter().map(|(value, text)| (*value, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Bus timing from `BS_:`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitTiming {
    pub baudrate: u32,
    pub btr1: u32,
    pub btr2: u32,
}

/// Environment variable type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnvVarType {
    Integer,
    Float,
    String,
}

impl EnvVarType {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(EnvVarType::Integer),
            1 => Some(EnvVarType::Float),
            2 => Some(EnvVarType::String),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            EnvVarType::Integer => 0,
            EnvVarType::Float => 1,
            EnvVarType::String => 2,
        }
    }
}

/// Access mode encoded in `DUMMY_NODE_VECTORn`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessMode {
    Unrestricted,
    Read,
    Write,
    ReadWrite,
}

/// Kind of object an attribute or comment applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectKind {
    Network,
    Node,
    Message,
    Signal,
    EnvironmentVariable,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjectKind::Network => "network",
            ObjectKind::Node => "node",
            ObjectKind::Message => "message",
            ObjectKind::Signal => "signal",
            ObjectKind::EnvironmentVariable => "environment variable",
        };
        f.write_str(name)
    }
}

/// Scoped reference used by comments and attribute values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectRef {
    Network,
    Node(String),
    Message(u32),
    Signal { message_id: u32, signal: String },
    EnvironmentVariable(String),
}

impl ObjectRef {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectRef::Network => ObjectKind::Network,
            ObjectRef::Node(_) => ObjectKind::Node,
            ObjectRef::Message(_) => ObjectKind::Message,
            ObjectRef::Signal { .. } => ObjectKind::Signal,
            ObjectRef::EnvironmentVariable(_) => ObjectKind::EnvironmentVariable,
        }
    }
}

/// Declared value type of an attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttributeValueType {
    Int { min: i64, max: i64 },
    Hex { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    String,
    Enum(Vec<String>),
}

/// Attribute value as written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttributeLiteral {
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeLiteral {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeLiteral::Int(v) => Some(*v as f64),
            AttributeLiteral::Float(v) => Some(*v),
            AttributeLiteral::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeLiteral::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A network node (ECU)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: String,
}

/// A CAN message definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// CAN message ID as written (bit 31 flags an extended ID)
    pub id: u32,
    pub name: String,
    /// Message size in bytes
    pub size: u32,
    /// Transmitting node (may be the unspecified sentinel)
    pub transmitter: String,
    /// Additional transmitters from `BO_TX_BU_`
    pub additional_transmitters: Vec<String>,
    pub signals: Vec<Signal>,
}

impl Message {
    const EXTENDED_FLAG: u32 = 0x8000_0000;

    /// True if the ID is a 29-bit extended identifier
    pub fn is_extended(&self) -> bool {
        self.id & Self::EXTENDED_FLAG != 0
    }

    /// Identifier as sent on the bus
    pub fn can_id(&self) -> u32 {
        if self.is_extended() {
            self.id & 0x1FFF_FFFF
        } else {
            self.id
        }
    }

    /// Transmitter, unless it is the unspecified sentinel
    pub fn sender(&self) -> Option<&str> {
        (!is_unspecified_node(&self.transmitter)).then_some(self.transmitter.as_str())
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub(crate) fn signal_mut(&mut self, name: &str) -> Option<&mut Signal> {
        self.signals.iter_mut().find(|s| s.name == name)
    }

    /// The signal marked `M`, if any
    pub fn multiplexor(&self) -> Option<&Signal> {
        self.signals
            .iter()
            .find(|s| s.multiplexer == MultiplexerRole::Multiplexor)
    }

    /// True if any signal takes part in multiplexing
    pub fn is_multiplexed(&self) -> bool {
        self.signals
            .iter()
            .any(|s| s.multiplexer != MultiplexerRole::None)
    }

    /// Switch signal governing a multiplexed signal
    ///
    /// The extended multiplexing entry wins over the message's `M` signal.
    pub fn switch_of(&self, signal: &Signal) -> Option<&Signal> {
        signal.multiplexer.switch_value()?;
        match &signal.extended_multiplex {
            Some(ext) => self.signal(&ext.switch),
            None => self.multiplexor(),
        }
    }
}

/// A CAN signal definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub name: String,
    pub multiplexer: MultiplexerRole,
    /// Start bit in the frame (LSB for Intel, MSB for Motorola)
    pub start_bit: u32,
    /// Length in bits
    pub length: u32,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    /// Override from `SIG_VALTYPE_`
    pub extended_value_type: Option<ExtendedValueType>,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value (advisory)
    pub minimum: f64,
    /// Maximum physical value (advisory)
    pub maximum: f64,
    pub unit: String,
    pub receivers: Vec<String>,
    /// Value descriptions from `VAL_`
    pub value_descriptions: ValueDescriptions,
    /// Extended multiplexing entry from `SG_MUL_VAL_`
    pub extended_multiplex: Option<ExtendedMultiplex>,
}

impl Signal {
    /// Bit positions of this signal within a frame
    pub fn layout(&self) -> BitLayout {
        BitLayout::new(self.start_bit, self.length, self.byte_order)
    }

    /// Interpretation of the raw bits
    ///
    /// The extended value type, when present, replaces the `+`/`-` designator.
    pub fn representation(&self) -> Option<ValueRepresentation> {
        match self.extended_value_type {
            None | Some(ExtendedValueType::Integer) => Some(match self.value_type {
                ValueType::Signed => ValueRepresentation::Signed,
                ValueType::Unsigned => ValueRepresentation::Unsigned,
            }),
            Some(ExtendedValueType::Float32) => Some(ValueRepresentation::Float32),
            Some(ExtendedValueType::Float64) => Some(ValueRepresentation::Float64),
            Some(ExtendedValueType::Reserved(_)) => None,
        }
    }

    /// Opt-in check of a physical value against [minimum, maximum]
    ///
    /// `minimum == maximum == 0` means no range was declared.
    pub fn within_range(&self, value: f64) -> bool {
        if self.minimum == 0.0 && self.maximum == 0.0 {
            return true;
        }
        self.minimum <= value && value <= self.maximum
    }

    pub fn unit(&self) -> Option<&str> {
        (!self.unit.is_empty()).then_some(self.unit.as_str())
    }
}

/// Named value table (`VAL_TABLE_`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueTable {
    pub name: String,
    pub values: ValueDescriptions,
}

/// Environment variable (`EV_`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub var_type: EnvVarType,
    pub minimum: f64,
    pub maximum: f64,
    pub unit: String,
    pub initial_value: f64,
    pub id: u32,
    /// Hex suffix of `DUMMY_NODE_VECTORn`
    pub access_type: u32,
    pub access_nodes: Vec<String>,
    /// Size from `ENVVAR_DATA_`
    pub data_size: Option<u32>,
    pub value_descriptions: ValueDescriptions,
}

impl EnvironmentVariable {
    pub fn access_mode(&self) -> AccessMode {
        match self.access_type & 0x3 {
            0 => AccessMode::Unrestricted,
            1 => AccessMode::Read,
            2 => AccessMode::Write,
            _ => AccessMode::ReadWrite,
        }
    }
}

/// Signal type template (`SGTYPE_`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalType {
    pub name: String,
    pub size: u32,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    pub factor: f64,
    pub offset: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub unit: String,
    pub default_value: f64,
    pub value_table: Option<String>,
    /// False when the record only gave size, byte order and value type
    pub has_scaling: bool,
}

/// Attribute definition (`BA_DEF_` + `BA_DEF_DEF_`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub kind: ObjectKind,
    pub value_type: AttributeValueType,
    pub default: Option<AttributeLiteral>,
}

/// Attribute value bound to an object (`BA_`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeValue {
    pub name: String,
    pub target: ObjectRef,
    pub value: AttributeLiteral,
}

/// Comment attached to an object (`CM_`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub target: ObjectRef,
    pub text: String,
}

/// Signal group (`SIG_GROUP_`), advisory only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalGroup {
    pub message_id: u32,
    pub name: String,
    pub repetitions: u32,
    pub signals: Vec<String>,
}

/// Network statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub num_nodes: usize,
    pub num_messages: usize,
    pub num_signals: usize,
    pub num_value_tables: usize,
    pub num_environment_variables: usize,
    pub num_attribute_definitions: usize,
    pub num_comments: usize,
}

/// The parsed and validated DBC network
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Network {
    pub(crate) version: String,
    pub(crate) new_symbols: Vec<String>,
    pub(crate) bit_timing: Option<BitTiming>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) messages: Vec<Message>,
    pub(crate) value_tables: Vec<ValueTable>,
    pub(crate) environment_variables: Vec<EnvironmentVariable>,
    pub(crate) signal_types: Vec<SignalType>,
    pub(crate) attribute_definitions: Vec<AttributeDefinition>,
    pub(crate) attribute_values: Vec<AttributeValue>,
    pub(crate) comments: Vec<Comment>,
    pub(crate) signal_groups: Vec<SignalGroup>,

    #[serde(skip)]
    node_index: HashMap<String, usize>,
    #[serde(skip)]
    message_index: HashMap<u32, usize>,
    #[serde(skip)]
    value_table_index: HashMap<String, usize>,
    #[serde(skip)]
    environment_variable_index: HashMap<String, usize>,
    #[serde(skip)]
    attribute_index: HashMap<String, usize>,
}

impl Network {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn new_symbols(&self) -> &[String] {
        &self.new_symbols
    }

    pub fn bit_timing(&self) -> Option<&BitTiming> {
        self.bit_timing.as_ref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.node_index.get(name).map(|&i| &self.nodes[i])
    }

    /// True if the name is a declared node or the unspecified sentinel
    pub fn resolves_node(&self, name: &str) -> bool {
        is_unspecified_node(name) || self.node_index.contains_key(name)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: u32) -> Option<&Message> {
        self.message_index.get(&id).map(|&i| &self.messages[i])
    }

    pub fn message_by_name(&self, name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.name == name)
    }

    /// Look up a signal by message ID and name
    pub fn signal(&self, message_id: u32, name: &str) -> Option<&Signal> {
        self.message(message_id)?.signal(name)
    }

    pub fn value_tables(&self) -> &[ValueTable] {
        &self.value_tables
    }

    pub fn value_table(&self, name: &str) -> Option<&ValueTable> {
        self.value_table_index
            .get(name)
            .map(|&i| &self.value_tables[i])
    }

    pub fn environment_variables(&self) -> &[EnvironmentVariable] {
        &self.environment_variables
    }

    pub fn environment_variable(&self, name: &str) -> Option<&EnvironmentVariable> {
        self.environment_variable_index
            .get(name)
            .map(|&i| &self.environment_variables[i])
    }

    pub fn signal_types(&self) -> &[SignalType] {
        &self.signal_types
    }

    pub fn attribute_definitions(&self) -> &[AttributeDefinition] {
        &self.attribute_definitions
    }

    pub fn attribute_definition(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attribute_index
            .get(name)
            .map(|&i| &self.attribute_definitions[i])
    }

    pub fn attribute_values(&self) -> &[AttributeValue] {
        &self.attribute_values
    }

    /// Effective attribute value of an object
    ///
    /// Falls back to the definition's default when the object has no explicit
    /// value.
    pub fn attribute(&self, name: &str, target: &ObjectRef) -> Option<&AttributeLiteral> {
        self.attribute_values
            .iter()
            .rev()
            .find(|v| v.name == name && &v.target == target)
            .map(|v| &v.value)
            .or_else(|| {
                let definition = self.attribute_definition(name)?;
                if definition.kind != target.kind() {
                    return None;
                }
                definition.default.as_ref()
            })
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// First comment attached to an object
    pub fn comment(&self, target: &ObjectRef) -> Option<&str> {
        self.comments
            .iter()
            .find(|c| &c.target == target)
            .map(|c| c.text.as_str())
    }

    pub fn signal_groups(&self) -> &[SignalGroup] {
        &self.signal_groups
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            num_nodes: self.nodes.len(),
            num_messages: self.messages.len(),
            num_signals: self.messages.iter().map(|m| m.signals.len()).sum(),
            num_value_tables: self.value_tables.len(),
            num_environment_variables: self.environment_variables.len(),
            num_attribute_definitions: self.attribute_definitions.len(),
            num_comments: self.comments.len(),
        }
    }

    // === Construction (model builder only) ===

    /// Returns false if the name is already taken
    pub(crate) fn add_node(&mut self, node: Node) -> bool {
        insert_indexed(&mut self.nodes, &mut self.node_index, node.name.clone(), node)
    }

    pub(crate) fn add_message(&mut self, message: Message) -> bool {
        insert_indexed(&mut self.messages, &mut self.message_index, message.id, message)
    }

    pub(crate) fn add_value_table(&mut self, table: ValueTable) -> bool {
        insert_indexed(
            &mut self.value_tables,
            &mut self.value_table_index,
            table.name.clone(),
            table,
        )
    }

    pub(crate) fn add_environment_variable(&mut self, var: EnvironmentVariable) -> bool {
        insert_indexed(
            &mut self.environment_variables,
            &mut self.environment_variable_index,
            var.name.clone(),
            var,
        )
    }

    pub(crate) fn add_attribute_definition(&mut self, definition: AttributeDefinition) -> bool {
        insert_indexed(
            &mut self.attribute_definitions,
            &mut self.attribute_index,
            definition.name.clone(),
            definition,
        )
    }

    pub(crate) fn message_mut(&mut self, id: u32) -> Option<&mut Message> {
        let index = *self.message_index.get(&id)?;
        self.messages.get_mut(index)
    }

    pub(crate) fn environment_variable_mut(&mut self, name: &str) -> Option<&mut EnvironmentVariable> {
        let index = *self.environment_variable_index.get(name)?;
        self.environment_variables.get_mut(index)
    }

    pub(crate) fn attribute_definition_mut(&mut self, name: &str) -> Option<&mut AttributeDefinition> {
        let index = *self.attribute_index.get(name)?;
        self.attribute_definitions.get_mut(index)
    }
}

fn insert_indexed<K, T>(items: &mut Vec<T>, index: &mut HashMap<K, usize>, key: K, item: T) -> bool
where
    K: std::hash::Hash + Eq,
{
    if index.contains_key(&key) {
        return false;
    }
    index.insert(key, items.len());
    items.push(item);
    true
}
