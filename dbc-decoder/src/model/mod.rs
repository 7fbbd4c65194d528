//! Semantic network model
//!
//! [`network`] holds the resolved entities, [`builder`] produces them from the
//! parser's tree and [`writer`] serializes them back to DBC text.

pub mod builder;
pub mod network;
pub mod writer;

pub use builder::build_network;
pub use network::{
    AccessMode, AttributeDefinition, AttributeLiteral, AttributeValue, AttributeValueType,
    BitTiming, ByteOrder, Comment, EnvVarType, EnvironmentVariable, ExtendedMultiplex,
    ExtendedValueType, Message, MultiplexerRole, Network, NetworkStats, Node, ObjectKind,
    ObjectRef, Signal, SignalGroup, SignalType, SwitchRange, ValueDescriptions,
    ValueRepresentation, ValueTable, ValueType, UNSPECIFIED_NODE,
};
