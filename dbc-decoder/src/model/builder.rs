//! Semantic model builder
//!
//! Turns the parser's structural tree into a validated [`Network`]. The checks
//! run as four passes and the first failure aborts the build:
//!
//! 1. uniqueness of names, ids and value keys
//! 2. reference resolution
//! 3. attribute value types, bounds and scopes
//! 4. signal layout and multiplexing consistency

use crate::config::ParseConfig;
use crate::model::network::{
    AttributeDefinition, AttributeLiteral, AttributeValue, AttributeValueType, Comment,
    EnvironmentVariable, ExtendedMultiplex, Message, MultiplexerRole, Network, Node, ObjectRef,
    Signal, SignalGroup, SignalType, ValueDescriptions, ValueRepresentation, ValueTable,
};
use crate::parser::ast::{
    DbcFile, EnvironmentVariableDef, MessageDef, Section, SignalDef, SignalTypeDef,
    SignalTypeScaling, ValueDescriptionTarget, ValuePairs,
};
use crate::types::{EntityKind, SemanticError};
use std::collections::HashSet;

/// Build a validated network from a parsed file
pub fn build_network(file: DbcFile, config: &ParseConfig) -> Result<Network, SemanticError> {
    let mut builder = ModelBuilder::new(config);
    let pending = builder.register(file)?;
    builder.resolve(pending)?;
    builder.check_attributes()?;
    builder.check_layouts()?;

    let network = builder.network;
    let stats = network.stats();
    log::debug!(
        "Built network model: {} nodes, {} messages, {} signals",
        stats.num_nodes,
        stats.num_messages,
        stats.num_signals
    );
    Ok(network)
}

fn unresolved(kind: EntityKind, name: impl Into<String>) -> SemanticError {
    SemanticError::UnresolvedReference {
        kind,
        name: name.into(),
    }
}

fn duplicate(kind: EntityKind, name: impl Into<String>) -> SemanticError {
    SemanticError::Duplicate {
        kind,
        name: name.into(),
    }
}

/// Name of a signal qualified by its message id
fn signal_path(message_id: u32, signal: &str) -> String {
    format!("{}/{}", message_id, signal)
}

fn check_unique_values(owner: &str, values: &ValuePairs) -> Result<(), SemanticError> {
    let mut seen = HashSet::new();
    for (value, _) in values {
        if !seen.insert(*value) {
            return Err(SemanticError::DuplicateValue {
                owner: owner.to_string(),
                value: *value,
            });
        }
    }
    Ok(())
}

struct ModelBuilder<'a> {
    config: &'a ParseConfig,
    network: Network,
}

impl<'a> ModelBuilder<'a> {
    fn new(config: &'a ParseConfig) -> Self {
        Self {
            config,
            network: Network::default(),
        }
    }

    // === Pass 1: uniqueness ===

    /// Register every defining record; returns the records that only refer
    /// to other entities
    fn register(&mut self, file: DbcFile) -> Result<Vec<Section>, SemanticError> {
        self.network.version = file.version;
        self.network.new_symbols = file.new_symbols;
        self.network.bit_timing = file.bit_timing;

        for name in file.nodes {
            if !self.network.add_node(Node { name: name.clone() }) {
                return Err(duplicate(EntityKind::Node, name));
            }
        }

        let mut described = HashSet::new();
        let mut pending = Vec::new();
        for section in file.sections {
            match section {
                Section::ValueTable(def) => {
                    check_unique_values(&def.name, &def.values)?;
                    let table = ValueTable {
                        name: def.name.clone(),
                        values: ValueDescriptions::new(def.values),
                    };
                    if !self.network.add_value_table(table) {
                        return Err(duplicate(EntityKind::ValueTable, def.name));
                    }
                }
                Section::Message(def) => self.register_message(def)?,
                Section::EnvironmentVariable(def) => self.register_environment_variable(def)?,
                Section::AttributeDefinition(def) => {
                    let definition = AttributeDefinition {
                        name: def.name.clone(),
                        kind: def.kind,
                        value_type: def.value_type,
                        default: None,
                    };
                    if !self.network.add_attribute_definition(definition) {
                        return Err(duplicate(EntityKind::Attribute, def.name));
                    }
                }
                Section::SignalType(def) => self.register_signal_type(def),
                Section::ValueDescriptions(def) => {
                    let owner = match &def.target {
                        ValueDescriptionTarget::Signal { message_id, signal } => {
                            signal_path(*message_id, signal)
                        }
                        ValueDescriptionTarget::EnvironmentVariable(name) => name.clone(),
                    };
                    check_unique_values(&owner, &def.values)?;
                    if !described.insert(def.target.clone()) {
                        return Err(duplicate(EntityKind::ValueDescriptions, owner));
                    }
                    pending.push(Section::ValueDescriptions(def));
                }
                other => pending.push(other),
            }
        }

        log::trace!("{} referencing records left to resolve", pending.len());
        Ok(pending)
    }

    fn register_message(&mut self, def: MessageDef) -> Result<(), SemanticError> {
        let mut names = HashSet::new();
        for signal in &def.signals {
            if !names.insert(signal.name.as_str()) {
                return Err(duplicate(
                    EntityKind::Signal,
                    signal_path(def.id, &signal.name),
                ));
            }
        }

        let id = def.id;
        let message = Message {
            id,
            name: def.name,
            size: def.size,
            transmitter: def.transmitter,
            additional_transmitters: Vec::new(),
            signals: def.signals.into_iter().map(signal_from_def).collect(),
        };
        if !self.network.add_message(message) {
            return Err(duplicate(EntityKind::Message, id.to_string()));
        }
        Ok(())
    }

    fn register_environment_variable(
        &mut self,
        def: EnvironmentVariableDef,
    ) -> Result<(), SemanticError> {
        let name = def.name.clone();
        let variable = EnvironmentVariable {
            name: def.name,
            var_type: def.var_type,
            minimum: def.minimum,
            maximum: def.maximum,
            unit: def.unit,
            initial_value: def.initial_value,
            id: def.id,
            access_type: def.access_type,
            access_nodes: def.access_nodes,
            data_size: None,
            value_descriptions: ValueDescriptions::default(),
        };
        if !self.network.add_environment_variable(variable) {
            return Err(duplicate(EntityKind::EnvironmentVariable, name));
        }
        Ok(())
    }

    fn register_signal_type(&mut self, def: SignalTypeDef) {
        let has_scaling = def.scaling.is_some();
        let scaling = def.scaling.unwrap_or_else(|| SignalTypeScaling {
            factor: 1.0,
            offset: 0.0,
            minimum: 0.0,
            maximum: 0.0,
            unit: String::new(),
            default_value: 0.0,
            value_table: String::new(),
        });
        self.network.signal_types.push(SignalType {
            name: def.name,
            size: def.size,
            byte_order: def.byte_order,
            value_type: def.value_type,
            factor: scaling.factor,
            offset: scaling.offset,
            minimum: scaling.minimum,
            maximum: scaling.maximum,
            unit: scaling.unit,
            default_value: scaling.default_value,
            value_table: has_scaling.then_some(scaling.value_table),
            has_scaling,
        });
    }

    // === Pass 2: reference resolution ===

    fn resolve(&mut self, pending: Vec<Section>) -> Result<(), SemanticError> {
        for message in &self.network.messages {
            self.check_node(&message.transmitter)?;
            for signal in &message.signals {
                for receiver in &signal.receivers {
                    self.check_node(receiver)?;
                }
            }
        }
        for variable in &self.network.environment_variables {
            for node in &variable.access_nodes {
                self.check_node(node)?;
            }
        }

        for section in pending {
            self.resolve_section(section)?;
        }
        Ok(())
    }

    /// Node reference from a transmitter, receiver or access list
    fn check_node(&self, name: &str) -> Result<(), SemanticError> {
        if !self.config.strict_node_references || self.network.resolves_node(name) {
            Ok(())
        } else {
            Err(unresolved(EntityKind::Node, name))
        }
    }

    fn check_target(&self, target: &ObjectRef) -> Result<(), SemanticError> {
        match target {
            ObjectRef::Network => Ok(()),
            ObjectRef::Node(name) => {
                if self.network.resolves_node(name) {
                    Ok(())
                } else {
                    Err(unresolved(EntityKind::Node, name.as_str()))
                }
            }
            ObjectRef::Message(id) => self.message(*id).map(|_| ()),
            ObjectRef::Signal { message_id, signal } => {
                self.signal(*message_id, signal).map(|_| ())
            }
            ObjectRef::EnvironmentVariable(name) => {
                if self.network.environment_variable(name).is_some() {
                    Ok(())
                } else {
                    Err(unresolved(EntityKind::EnvironmentVariable, name.as_str()))
                }
            }
        }
    }

    fn message(&self, id: u32) -> Result<&Message, SemanticError> {
        self.network
            .message(id)
            .ok_or_else(|| unresolved(EntityKind::Message, id.to_string()))
    }

    fn signal(&self, message_id: u32, name: &str) -> Result<&Signal, SemanticError> {
        self.message(message_id)?
            .signal(name)
            .ok_or_else(|| unresolved(EntityKind::Signal, signal_path(message_id, name)))
    }

    fn message_mut(&mut self, id: u32) -> Result<&mut Message, SemanticError> {
        self.network
            .message_mut(id)
            .ok_or_else(|| unresolved(EntityKind::Message, id.to_string()))
    }

    fn signal_mut(&mut self, message_id: u32, name: &str) -> Result<&mut Signal, SemanticError> {
        self.message_mut(message_id)?
            .signal_mut(name)
            .ok_or_else(|| unresolved(EntityKind::Signal, signal_path(message_id, name)))
    }

    fn environment_variable_mut(
        &mut self,
        name: &str,
    ) -> Result<&mut EnvironmentVariable, SemanticError> {
        self.network
            .environment_variable_mut(name)
            .ok_or_else(|| unresolved(EntityKind::EnvironmentVariable, name))
    }

    fn resolve_section(&mut self, section: Section) -> Result<(), SemanticError> {
        match section {
            Section::MessageTransmitters(def) => {
                for node in &def.transmitters {
                    self.check_node(node)?;
                }
                self.message_mut(def.message_id)?
                    .additional_transmitters
                    .extend(def.transmitters);
            }
            Section::EnvironmentVariableData(def) => {
                self.environment_variable_mut(&def.name)?.data_size = Some(def.data_size);
            }
            Section::Comment(def) => {
                self.check_target(&def.target)?;
                self.network.comments.push(Comment {
                    target: def.target,
                    text: def.text,
                });
            }
            Section::AttributeDefault(def) => {
                let definition = self
                    .network
                    .attribute_definition_mut(&def.name)
                    .ok_or_else(|| unresolved(EntityKind::Attribute, def.name.as_str()))?;
                if definition.default.is_some() {
                    log::warn!("Attribute '{}' has more than one default; keeping the last", def.name);
                }
                definition.default = Some(def.value);
            }
            Section::AttributeValue(def) => {
                if self.network.attribute_definition(&def.name).is_none() {
                    return Err(unresolved(EntityKind::Attribute, def.name));
                }
                self.check_target(&def.target)?;
                self.network.attribute_values.push(AttributeValue {
                    name: def.name,
                    target: def.target,
                    value: def.value,
                });
            }
            Section::ValueDescriptions(def) => {
                let values = ValueDescriptions::new(def.values);
                match def.target {
                    ValueDescriptionTarget::Signal { message_id, signal } => {
                        self.signal_mut(message_id, &signal)?.value_descriptions = values;
                    }
                    ValueDescriptionTarget::EnvironmentVariable(name) => {
                        self.environment_variable_mut(&name)?.value_descriptions = values;
                    }
                }
            }
            Section::SignalGroup(def) => {
                for signal in &def.signals {
                    self.signal(def.message_id, signal)?;
                }
                self.network.signal_groups.push(SignalGroup {
                    message_id: def.message_id,
                    name: def.name,
                    repetitions: def.repetitions,
                    signals: def.signals,
                });
            }
            Section::SignalValueType(def) => {
                self.signal_mut(def.message_id, &def.signal)?.extended_value_type =
                    Some(def.value_type);
            }
            Section::ExtendedMultiplexing(def) => {
                self.signal(def.message_id, &def.switch)?;
                let message_name = self.message(def.message_id)?.name.clone();
                let signal = self.signal_mut(def.message_id, &def.signal)?;
                if signal.extended_multiplex.is_some() {
                    return Err(SemanticError::MultiplexingConflict {
                        message: message_name,
                        reason: format!(
                            "signal '{}' has more than one extended multiplexing entry",
                            def.signal
                        ),
                    });
                }
                signal.extended_multiplex = Some(ExtendedMultiplex {
                    switch: def.switch,
                    ranges: def.ranges,
                });
            }
            Section::ValueTable(_)
            | Section::Message(_)
            | Section::EnvironmentVariable(_)
            | Section::SignalType(_)
            | Section::AttributeDefinition(_) => {}
        }
        Ok(())
    }

    // === Pass 3: attribute binding ===

    fn check_attributes(&self) -> Result<(), SemanticError> {
        for definition in &self.network.attribute_definitions {
            if let Some(default) = &definition.default {
                check_literal(definition, default)?;
            }
        }

        for value in &self.network.attribute_values {
            let definition = self
                .network
                .attribute_definition(&value.name)
                .ok_or_else(|| unresolved(EntityKind::Attribute, value.name.as_str()))?;
            let found = value.target.kind();
            if definition.kind != found {
                return Err(SemanticError::AttributeScopeMismatch {
                    attribute: value.name.clone(),
                    expected: definition.kind.to_string(),
                    found: found.to_string(),
                });
            }
            check_literal(definition, &value.value)?;
        }
        Ok(())
    }

    // === Pass 4: layout and multiplexing ===

    fn check_layouts(&self) -> Result<(), SemanticError> {
        for message in &self.network.messages {
            let mut multiplexor: Option<&str> = None;
            for signal in &message.signals {
                check_layout(message, signal)?;
                let integer = matches!(
                    signal.representation(),
                    Some(ValueRepresentation::Unsigned | ValueRepresentation::Signed)
                );
                if signal.multiplexer.is_switch() && !integer {
                    return Err(SemanticError::MultiplexingConflict {
                        message: message.name.clone(),
                        reason: format!(
                            "switch signal '{}' must have an integer value type",
                            signal.name
                        ),
                    });
                }
                if signal.multiplexer == MultiplexerRole::Multiplexor {
                    if let Some(first) = multiplexor {
                        return Err(SemanticError::MultiplexingConflict {
                            message: message.name.clone(),
                            reason: format!(
                                "signals '{}' and '{}' are both marked as multiplexor",
                                first, signal.name
                            ),
                        });
                    }
                    multiplexor = Some(signal.name.as_str());
                }
            }
            let extended = message
                .signals
                .iter()
                .any(|signal| signal.extended_multiplex.is_some());
            for signal in &message.signals {
                check_multiplexing(message, signal, extended)?;
            }
        }
        Ok(())
    }
}

fn signal_from_def(def: SignalDef) -> Signal {
    Signal {
        name: def.name,
        multiplexer: def.multiplexer,
        start_bit: def.start_bit,
        length: def.length,
        byte_order: def.byte_order,
        value_type: def.value_type,
        extended_value_type: None,
        factor: def.factor,
        offset: def.offset,
        minimum: def.minimum,
        maximum: def.maximum,
        unit: def.unit,
        receivers: def.receivers,
        value_descriptions: ValueDescriptions::default(),
        extended_multiplex: None,
    }
}

fn literal_text(literal: &AttributeLiteral) -> String {
    match literal {
        AttributeLiteral::Int(v) => v.to_string(),
        AttributeLiteral::Float(v) => v.to_string(),
        AttributeLiteral::String(s) => format!("\"{}\"", s),
    }
}

/// Check a literal against the definition's value type
///
/// Numeric bounds of `0 0` mean unbounded.
fn check_literal(
    definition: &AttributeDefinition,
    literal: &AttributeLiteral,
) -> Result<(), SemanticError> {
    let mismatch = |reason: String| SemanticError::AttributeTypeMismatch {
        attribute: definition.name.clone(),
        reason,
    };

    match &definition.value_type {
        AttributeValueType::Int { min, max } | AttributeValueType::Hex { min, max } => {
            let AttributeLiteral::Int(value) = literal else {
                return Err(mismatch(format!(
                    "expected an integer, found {}",
                    literal_text(literal)
                )));
            };
            let bounded = *min != 0 || *max != 0;
            if bounded && (value < min || value > max) {
                return Err(mismatch(format!(
                    "{} is outside [{}, {}]",
                    value, min, max
                )));
            }
        }
        AttributeValueType::Float { min, max } => {
            let value = literal.as_f64().ok_or_else(|| {
                mismatch(format!("expected a number, found {}", literal_text(literal)))
            })?;
            let bounded = *min != 0.0 || *max != 0.0;
            if bounded && (value < *min || value > *max) {
                return Err(mismatch(format!(
                    "{} is outside [{}, {}]",
                    value, min, max
                )));
            }
        }
        AttributeValueType::String => {
            if literal.as_str().is_none() {
                return Err(mismatch(format!(
                    "expected a string, found {}",
                    literal_text(literal)
                )));
            }
        }
        AttributeValueType::Enum(values) => {
            let valid = match literal {
                AttributeLiteral::String(s) => values.contains(s),
                AttributeLiteral::Int(index) => (0..values.len() as i64).contains(index),
                AttributeLiteral::Float(_) => false,
            };
            if !valid {
                return Err(mismatch(format!(
                    "{} is not one of the declared values",
                    literal_text(literal)
                )));
            }
        }
    }
    Ok(())
}

fn check_layout(message: &Message, signal: &Signal) -> Result<(), SemanticError> {
    let invalid = |reason: String| SemanticError::InvalidLayout {
        message: message.name.clone(),
        signal: signal.name.clone(),
        reason,
    };

    if signal.length == 0 || signal.length > 64 {
        return Err(invalid(format!(
            "length {} is outside 1..=64",
            signal.length
        )));
    }
    let required = signal.layout().required_bytes();
    if required > message.size as usize {
        return Err(invalid(format!(
            "bits reach byte {} but the message has {} bytes",
            required, message.size
        )));
    }
    Ok(())
}

/// `extended` is set when any signal of the message has an `SG_MUL_VAL_`
/// entry; every multiplexed signal then needs its own entry.
fn check_multiplexing(
    message: &Message,
    signal: &Signal,
    extended: bool,
) -> Result<(), SemanticError> {
    let conflict = |reason: String| SemanticError::MultiplexingConflict {
        message: message.name.clone(),
        reason,
    };

    match (signal.multiplexer.switch_value(), &signal.extended_multiplex) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(conflict(format!(
            "signal '{}' has extended multiplexing but no mN indicator",
            signal.name
        ))),
        (Some(_), None) if extended => Err(conflict(format!(
            "signal '{}' has no extended multiplexing entry but other signals of the message do",
            signal.name
        ))),
        (Some(_), None) => {
            if message.multiplexor().is_some() {
                Ok(())
            } else {
                Err(conflict(format!(
                    "signal '{}' is multiplexed but the message has no multiplexor",
                    signal.name
                )))
            }
        }
        (Some(value), Some(ext)) => {
            if ext.switch == signal.name {
                return Err(conflict(format!(
                    "signal '{}' cannot switch itself",
                    signal.name
                )));
            }
            let switch = message.signal(&ext.switch).ok_or_else(|| {
                conflict(format!("switch '{}' is not in the message", ext.switch))
            })?;
            if !switch.multiplexer.is_switch() {
                return Err(conflict(format!(
                    "switch '{}' of signal '{}' is not a multiplexor",
                    ext.switch, signal.name
                )));
            }
            if let Some(range) = ext.ranges.iter().find(|r| r.min > r.max) {
                return Err(conflict(format!(
                    "switch range {}-{} of signal '{}' is empty",
                    range.min, range.max, signal.name
                )));
            }
            let mut ranges = ext.ranges.clone();
            ranges.sort_by_key(|r| r.min);
            if let Some(pair) = ranges.windows(2).find(|pair| pair[1].min <= pair[0].max) {
                return Err(conflict(format!(
                    "switch ranges {}-{} and {}-{} of signal '{}' overlap",
                    pair[0].min, pair[0].max, pair[1].min, pair[1].max, signal.name
                )));
            }
            if !ext.contains(value) {
                return Err(conflict(format!(
                    "m{} of signal '{}' lies outside its extended multiplexing ranges",
                    value, signal.name
                )));
            }
            Ok(())
        }
    }
}
