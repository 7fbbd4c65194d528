//! Structural tree produced by the parser
//!
//! One record per top-level DBC construct, in source order. Nothing here is
//! resolved: names and ids are kept exactly as written and the semantic model
//! builder turns them into cross-referenced entities.

use crate::model::network::{
    AttributeLiteral, AttributeValueType, BitTiming, ByteOrder, EnvVarType, ExtendedValueType,
    MultiplexerRole, ObjectKind, ObjectRef, SwitchRange, ValueType,
};

/// A complete DBC file
#[derive(Debug, Clone, PartialEq)]
pub struct DbcFile {
    pub version: String,
    pub new_symbols: Vec<String>,
    pub bit_timing: Option<BitTiming>,
    pub nodes: Vec<String>,
    pub sections: Vec<Section>,
}

/// Any section after the node list
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    ValueTable(ValueTableDef),
    Message(MessageDef),
    MessageTransmitters(MessageTransmittersDef),
    EnvironmentVariable(EnvironmentVariableDef),
    EnvironmentVariableData(EnvironmentVariableDataDef),
    SignalType(SignalTypeDef),
    Comment(CommentDef),
    AttributeDefinition(AttributeDefinitionDef),
    AttributeDefault(AttributeDefaultDef),
    AttributeValue(AttributeValueDef),
    ValueDescriptions(ValueDescriptionsDef),
    SignalGroup(SignalGroupDef),
    SignalValueType(SignalValueTypeDef),
    ExtendedMultiplexing(ExtendedMultiplexingDef),
}

/// `raw "description"` pairs as written
pub type ValuePairs = Vec<(i64, String)>;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueTableDef {
    pub name: String,
    pub values: ValuePairs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageDef {
    pub id: u32,
    pub name: String,
    pub size: u32,
    pub transmitter: String,
    pub signals: Vec<SignalDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalDef {
    pub name: String,
    pub multiplexer: MultiplexerRole,
    pub start_bit: u32,
    pub length: u32,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    pub factor: f64,
    pub offset: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub unit: String,
    pub receivers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageTransmittersDef {
    pub message_id: u32,
    pub transmitters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentVariableDef {
    pub name: String,
    pub var_type: EnvVarType,
    pub minimum: f64,
    pub maximum: f64,
    pub unit: String,
    pub initial_value: f64,
    pub id: u32,
    pub access_type: u32,
    pub access_nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentVariableDataDef {
    pub name: String,
    pub data_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalTypeDef {
    pub name: String,
    pub size: u32,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    pub scaling: Option<SignalTypeScaling>,
}

/// Optional tail of an `SGTYPE_` record
#[derive(Debug, Clone, PartialEq)]
pub struct SignalTypeScaling {
    pub factor: f64,
    pub offset: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub unit: String,
    pub default_value: f64,
    pub value_table: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentDef {
    pub target: ObjectRef,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDefinitionDef {
    pub kind: ObjectKind,
    pub name: String,
    pub value_type: AttributeValueType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDefaultDef {
    pub name: String,
    pub value: AttributeLiteral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValueDef {
    pub name: String,
    pub target: ObjectRef,
    pub value: AttributeLiteral,
}

/// Target of a `VAL_` record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueDescriptionTarget {
    Signal { message_id: u32, signal: String },
    EnvironmentVariable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueDescriptionsDef {
    pub target: ValueDescriptionTarget,
    pub values: ValuePairs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalGroupDef {
    pub message_id: u32,
    pub name: String,
    pub repetitions: u32,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalValueTypeDef {
    pub message_id: u32,
    pub signal: String,
    pub value_type: ExtendedValueType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedMultiplexingDef {
    pub message_id: u32,
    pub signal: String,
    pub switch: String,
    pub ranges: Vec<SwitchRange>,
}
