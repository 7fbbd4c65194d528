//! DBC text serialization
//!
//! Writes a [`Network`] back out as DBC text. Parsing the output yields a
//! network equal to the one written. Sections are emitted in the conventional
//! order: header, value tables, messages, environment variables, signal
//! types, then comments, attributes and the per-signal extras.

use crate::model::network::{
    AttributeLiteral, AttributeValueType, ByteOrder, Network, ObjectKind, ObjectRef,
    ValueDescriptions, ValueType, UNSPECIFIED_NODE,
};
use std::fmt::{self, Write};

impl Network {
    /// Serialize the network as DBC text
    pub fn to_dbc_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut writer = DbcWriter { out: f };
        writer.header(self)?;
        writer.value_tables(self)?;
        writer.messages(self)?;
        writer.environment_variables(self)?;
        writer.signal_types(self)?;
        writer.comments(self)?;
        writer.attributes(self)?;
        writer.value_descriptions(self)?;
        writer.signal_groups(self)?;
        writer.signal_value_types(self)?;
        writer.extended_multiplexing(self)
    }
}

struct DbcWriter<'a, W: Write> {
    out: &'a mut W,
}

fn byte_order_code(order: ByteOrder) -> char {
    match order {
        ByteOrder::LittleEndian => '1',
        ByteOrder::BigEndian => '0',
    }
}

fn value_type_code(value_type: ValueType) -> char {
    match value_type {
        ValueType::Unsigned => '+',
        ValueType::Signed => '-',
    }
}

/// Literal form that parses back to the same variant
fn literal(value: &AttributeLiteral) -> String {
    match value {
        AttributeLiteral::Int(v) => v.to_string(),
        // Debug keeps the fraction ("2.0"), so the value stays a float
        AttributeLiteral::Float(v) => format!("{:?}", v),
        AttributeLiteral::String(s) => format!("\"{}\"", s),
    }
}

fn scope_prefix(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Network => "",
        ObjectKind::Node => "BU_ ",
        ObjectKind::Message => "BO_ ",
        ObjectKind::Signal => "SG_ ",
        ObjectKind::EnvironmentVariable => "EV_ ",
    }
}

fn reference(target: &ObjectRef) -> String {
    match target {
        ObjectRef::Network => String::new(),
        ObjectRef::Node(name) => format!("BU_ {} ", name),
        ObjectRef::Message(id) => format!("BO_ {} ", id),
        ObjectRef::Signal { message_id, signal } => format!("SG_ {} {} ", message_id, signal),
        ObjectRef::EnvironmentVariable(name) => format!("EV_ {} ", name),
    }
}

impl<W: Write> DbcWriter<'_, W> {
    fn value_pairs(&mut self, values: &ValueDescriptions) -> fmt::Result {
        for (raw, text) in values.iter() {
            write!(self.out, " {} \"{}\"", raw, text)?;
        }
        Ok(())
    }

    fn header(&mut self, network: &Network) -> fmt::Result {
        writeln!(self.out, "VERSION \"{}\"", network.version())?;
        writeln!(self.out)?;
        writeln!(self.out, "NS_ :")?;
        for symbol in network.new_symbols() {
            writeln!(self.out, "\t{}", symbol)?;
        }
        writeln!(self.out)?;
        match network.bit_timing() {
            Some(timing) => writeln!(
                self.out,
                "BS_: {}:{},{}",
                timing.baudrate, timing.btr1, timing.btr2
            )?,
            None => writeln!(self.out, "BS_:")?,
        }
        writeln!(self.out)?;

        write!(self.out, "BU_:")?;
        for node in network.nodes() {
            write!(self.out, " {}", node.name)?;
        }
        writeln!(self.out)?;
        writeln!(self.out)
    }

    fn value_tables(&mut self, network: &Network) -> fmt::Result {
        for table in network.value_tables() {
            write!(self.out, "VAL_TABLE_ {}", table.name)?;
            self.value_pairs(&table.values)?;
            writeln!(self.out, " ;")?;
        }
        Ok(())
    }

    fn messages(&mut self, network: &Network) -> fmt::Result {
        for message in network.messages() {
            writeln!(
                self.out,
                "\nBO_ {} {}: {} {}",
                message.id, message.name, message.size, message.transmitter
            )?;
            for signal in &message.signals {
                write!(self.out, " SG_ {} ", signal.name)?;
                if let Some(indicator) = signal.multiplexer.indicator() {
                    write!(self.out, "{} ", indicator)?;
                }
                write!(
                    self.out,
                    ": {}|{}@{}{} ({},{}) [{}|{}] \"{}\" ",
                    signal.start_bit,
                    signal.length,
                    byte_order_code(signal.byte_order),
                    value_type_code(signal.value_type),
                    signal.factor,
                    signal.offset,
                    signal.minimum,
                    signal.maximum,
                    signal.unit
                )?;
                if signal.receivers.is_empty() {
                    writeln!(self.out, "{}", UNSPECIFIED_NODE)?;
                } else {
                    writeln!(self.out, "{}", signal.receivers.join(","))?;
                }
            }
        }
        writeln!(self.out)?;

        for message in network.messages() {
            if !message.additional_transmitters.is_empty() {
                writeln!(
                    self.out,
                    "BO_TX_BU_ {} : {};",
                    message.id,
                    message.additional_transmitters.join(",")
                )?;
            }
        }
        Ok(())
    }

    fn environment_variables(&mut self, network: &Network) -> fmt::Result {
        for var in network.environment_variables() {
            writeln!(
                self.out,
                "EV_ {}: {} [{}|{}] \"{}\" {} {} DUMMY_NODE_VECTOR{:X} {};",
                var.name,
                var.var_type.code(),
                var.minimum,
                var.maximum,
                var.unit,
                var.initial_value,
                var.id,
                var.access_type,
                var.access_nodes.join(",")
            )?;
        }
        for var in network.environment_variables() {
            if let Some(size) = var.data_size {
                writeln!(self.out, "ENVVAR_DATA_ {}: {};", var.name, size)?;
            }
        }
        Ok(())
    }

    fn signal_types(&mut self, network: &Network) -> fmt::Result {
        for signal_type in network.signal_types() {
            write!(
                self.out,
                "SGTYPE_ {} : {}@{}{}",
                signal_type.name,
                signal_type.size,
                byte_order_code(signal_type.byte_order),
                value_type_code(signal_type.value_type)
            )?;
            if signal_type.has_scaling {
                write!(
                    self.out,
                    " ({},{}) [{}|{}] \"{}\" {}, {}",
                    signal_type.factor,
                    signal_type.offset,
                    signal_type.minimum,
                    signal_type.maximum,
                    signal_type.unit,
                    signal_type.default_value,
                    signal_type.value_table.as_deref().unwrap_or_default()
                )?;
            }
            writeln!(self.out, ";")?;
        }
        Ok(())
    }

    fn comments(&mut self, network: &Network) -> fmt::Result {
        for comment in network.comments() {
            writeln!(
                self.out,
                "CM_ {}\"{}\";",
                reference(&comment.target),
                comment.text
            )?;
        }
        Ok(())
    }

    fn attributes(&mut self, network: &Network) -> fmt::Result {
        for definition in network.attribute_definitions() {
            write!(
                self.out,
                "BA_DEF_ {}\"{}\" ",
                scope_prefix(definition.kind),
                definition.name
            )?;
            match &definition.value_type {
                AttributeValueType::Int { min, max } => write!(self.out, "INT {} {}", min, max)?,
                AttributeValueType::Hex { min, max } => write!(self.out, "HEX {} {}", min, max)?,
                AttributeValueType::Float { min, max } => {
                    write!(self.out, "FLOAT {} {}", min, max)?
                }
                AttributeValueType::String => write!(self.out, "STRING")?,
                AttributeValueType::Enum(values) => {
                    let quoted: Vec<String> = values.iter().map(|v| format!("\"{}\"", v)).collect();
                    write!(self.out, "ENUM {}", quoted.join(","))?
                }
            }
            writeln!(self.out, ";")?;
        }

        for definition in network.attribute_definitions() {
            if let Some(default) = &definition.default {
                writeln!(
                    self.out,
                    "BA_DEF_DEF_ \"{}\" {};",
                    definition.name,
                    literal(default)
                )?;
            }
        }

        for value in network.attribute_values() {
            writeln!(
                self.out,
                "BA_ \"{}\" {}{};",
                value.name,
                reference(&value.target),
                literal(&value.value)
            )?;
        }
        Ok(())
    }

    fn value_descriptions(&mut self, network: &Network) -> fmt::Result {
        for message in network.messages() {
            for signal in &message.signals {
                if signal.value_descriptions.is_empty() {
                    continue;
                }
                write!(self.out, "VAL_ {} {}", message.id, signal.name)?;
                self.value_pairs(&signal.value_descriptions)?;
                writeln!(self.out, " ;")?;
            }
        }
        for var in network.environment_variables() {
            if var.value_descriptions.is_empty() {
                continue;
            }
            write!(self.out, "VAL_ {}", var.name)?;
            self.value_pairs(&var.value_descriptions)?;
            writeln!(self.out, " ;")?;
        }
        Ok(())
    }

    fn signal_groups(&mut self, network: &Network) -> fmt::Result {
        for group in network.signal_groups() {
            writeln!(
                self.out,
                "SIG_GROUP_ {} {} {} : {};",
                group.message_id,
                group.name,
                group.repetitions,
                group.signals.join(" ")
            )?;
        }
        Ok(())
    }

    fn signal_value_types(&mut self, network: &Network) -> fmt::Result {
        for message in network.messages() {
            for signal in &message.signals {
                if let Some(value_type) = signal.extended_value_type {
                    writeln!(
                        self.out,
                        "SIG_VALTYPE_ {} {} : {};",
                        message.id,
                        signal.name,
                        value_type.code()
                    )?;
                }
            }
        }
        Ok(())
    }

    fn extended_multiplexing(&mut self, network: &Network) -> fmt::Result {
        for message in network.messages() {
            for signal in &message.signals {
                let Some(ext) = &signal.extended_multiplex else {
                    continue;
                };
                let ranges: Vec<String> = ext
                    .ranges
                    .iter()
                    .map(|r| format!("{}-{}", r.min, r.max))
                    .collect();
                writeln!(
                    self.out,
                    "SG_MUL_VAL_ {} {} {} {};",
                    message.id,
                    signal.name,
                    ext.switch,
                    ranges.join(", ")
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ParseConfig;
    use crate::model::build_network;
    use crate::model::network::Network;
    use crate::parser::parse_dbc;

    fn load(text: &str) -> Network {
        let config = ParseConfig::default();
        build_network(parse_dbc(text, &config).unwrap(), &config).unwrap()
    }

    const SAMPLE: &str = r#"VERSION "2.1"

NS_ :
	NS_DESC_
	CM_
	BA_DEF_DEF_

BS_: 500:12,34

BU_: Engine Dash

VAL_TABLE_ Gears 0 "Neutral" 1 "First" -1 "Reverse" ;

BO_ 100 EngineData: 8 Engine
 SG_ Speed : 0|16@1+ (0.1,0) [0|6553.5] "km/h" Dash
 SG_ Temp : 23|8@0- (1,-40) [-40|215] "degC" Dash,Engine

BO_ 2147484672 ExtMux: 8 Vector__XXX
 SG_ Mode M : 0|8@1+ (1,0) [0|0] "" Dash
 SG_ Sub m1M : 8|8@1+ (1,0) [0|0] "" Dash
 SG_ Deep m2 : 16|32@1- (1,0) [0|0] "" Dash

BO_TX_BU_ 100 : Dash;
EV_ Level: 1 [0|1.5] "V" 0.5 7 DUMMY_NODE_VECTOR8001 Engine,Dash;
ENVVAR_DATA_ Level: 8;
SGTYPE_ Plain : 8@1+;
SGTYPE_ Scaled : 16@0- (0.5,1) [0|100] "%" 3, Gears;
CM_ "Network comment";
CM_ BU_ Engine "Engine ECU";
CM_ SG_ 100 Speed "Vehicle speed";
BA_DEF_ BO_ "Cycle" INT 0 1000;
BA_DEF_ "Gain" FLOAT 0 10;
BA_DEF_ SG_ "Kind" ENUM "Raw","Scaled";
BA_DEF_DEF_ "Cycle" 100;
BA_DEF_DEF_ "Gain" 2.0;
BA_ "Cycle" BO_ 100 20;
BA_ "Kind" SG_ 100 Speed "Scaled";
VAL_ 100 Temp 0 "Cold" 1 "Hot" ;
VAL_ Level 0 "Off" ;
SIG_GROUP_ 100 Pair 1 : Speed Temp;
SIG_VALTYPE_ 2147484672 Deep : 1;
SG_MUL_VAL_ 2147484672 Sub Mode 1-1;
SG_MUL_VAL_ 2147484672 Deep Sub 2-3, 5-5;
"#;

    #[test]
    fn test_round_trip() {
        let network = load(SAMPLE);
        let written = network.to_dbc_string();
        let reparsed = load(&written);
        assert_eq!(network, reparsed, "written text:\n{}", written);
        // Writing is stable
        assert_eq!(written, reparsed.to_dbc_string());
    }

    #[test]
    fn test_float_attribute_keeps_type() {
        let written = load(SAMPLE).to_dbc_string();
        assert!(written.contains("BA_DEF_DEF_ \"Gain\" 2.0;"));
        assert!(written.contains("BA_DEF_DEF_ \"Cycle\" 100;"));
    }

    #[test]
    fn test_written_lines() {
        let written = load(SAMPLE).to_dbc_string();
        assert!(written.starts_with("VERSION \"2.1\"\n"));
        assert!(written.contains("BS_: 500:12,34\n"));
        assert!(written.contains(" SG_ Temp : 23|8@0- (1,-40) [-40|215] \"degC\" Dash,Engine\n"));
        assert!(written.contains(" SG_ Sub m1M : 8|8@1+ (1,0) [0|0] \"\" Dash\n"));
        assert!(written.contains("EV_ Level: 1 [0|1.5] \"V\" 0.5 7 DUMMY_NODE_VECTOR8001 Engine,Dash;\n"));
        assert!(written.contains("SG_MUL_VAL_ 2147484672 Deep Sub 2-3, 5-5;\n"));
    }

    #[test]
    fn test_minimal_network() {
        let network = load("VERSION \"\"\nNS_ :\nBS_:\nBU_:\n");
        let written = network.to_string();
        assert_eq!(load(&written), network);
        assert!(written.contains("BS_:\n"));
    }
}
