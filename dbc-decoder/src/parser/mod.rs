//! Recursive descent parser for DBC files
//!
//! The parser only checks the shape of the input. Its output is a [`DbcFile`]
//! whose records keep names and ids exactly as written; resolving them is the
//! model builder's job. The first mismatch aborts parsing.
//!
//! After the fixed header (`VERSION`, `NS_`, `BS_`, `BU_`) the remaining
//! sections may appear in any order, since real files interleave them.

pub mod ast;

use crate::config::ParseConfig;
use crate::lexer::{self, Spanned, Token};
use crate::model::network::{
    AttributeLiteral, AttributeValueType, BitTiming, ByteOrder, EnvVarType, ExtendedValueType,
    MultiplexerRole, ObjectKind, ObjectRef, SwitchRange, ValueType,
};
use crate::types::{DbcError, ParseError, Position};
use ast::*;

/// Keywords that may start a section after the node list
const SECTION_KEYWORDS: &[&str] = &[
    "'VAL_TABLE_'",
    "'BO_'",
    "'BO_TX_BU_'",
    "'EV_'",
    "'ENVVAR_DATA_'",
    "'SGTYPE_'",
    "'CM_'",
    "'BA_DEF_'",
    "'BA_DEF_DEF_'",
    "'BA_'",
    "'VAL_'",
    "'SIG_GROUP_'",
    "'SIG_VALTYPE_'",
    "'SG_MUL_VAL_'",
    "end of input",
];

const ACCESS_TYPE_PREFIX: &str = "DUMMY_NODE_VECTOR";

/// Tokenize and parse DBC text into its structural tree
pub fn parse_dbc(source: &str, config: &ParseConfig) -> Result<DbcFile, DbcError> {
    let tokens = lexer::tokenize(source, config)?;
    let file = Parser::new(tokens, end_position(source)).parse_file()?;
    log::debug!(
        "Parsed DBC structure: {} nodes, {} sections",
        file.nodes.len(),
        file.sections.len()
    );
    Ok(file)
}

fn end_position(source: &str) -> Position {
    let line_start = source.rfind('\n').map_or(0, |i| i + 1);
    Position {
        line: source.matches('\n').count() + 1,
        column: source[line_start..].chars().count() + 1,
        offset: source.len(),
    }
}

/// Token cursor with the grammar rules as methods
pub struct Parser<'src> {
    tokens: Vec<Spanned<'src>>,
    pos: usize,
    end: Position,
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Spanned<'src>>, end: Position) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    // === Token stream helpers ===

    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned<'src>> {
        let spanned = self.tokens.get(self.pos).copied();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn check(&self, expected: &Token<'_>) -> bool {
        self.peek() == Some(expected)
    }

    /// Consume the token if it matches
    fn eat(&mut self, expected: &Token<'_>) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Error at the current token
    fn error(&self, expected: &[&str]) -> ParseError {
        let (position, found) = match self.tokens.get(self.pos) {
            Some(spanned) => (spanned.position, spanned.token.to_string()),
            None => (self.end, "end of input".to_string()),
        };
        ParseError {
            position,
            expected: expected.iter().map(|s| s.to_string()).collect(),
            found,
        }
    }

    fn expect(&mut self, expected: Token<'_>) -> Result<(), ParseError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(&[&expected.to_string()]))
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.to_string();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(&["identifier"])),
        }
    }

    fn string(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Str(text)) => {
                let text = text.to_string();
                self.pos += 1;
                Ok(text)
            }
            _ => Err(self.error(&["string"])),
        }
    }

    fn unsigned(&mut self) -> Result<u64, ParseError> {
        match self.peek() {
            Some(Token::Integer(text)) => {
                let value = text
                    .parse()
                    .map_err(|_| self.error(&["unsigned integer within 64 bits"]))?;
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.error(&["unsigned integer"])),
        }
    }

    fn unsigned32(&mut self) -> Result<u32, ParseError> {
        match self.peek() {
            Some(Token::Integer(text)) => {
                let value = text
                    .parse()
                    .map_err(|_| self.error(&["unsigned integer within 32 bits"]))?;
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.error(&["unsigned integer"])),
        }
    }

    /// Optional sign; returns true for `-`
    fn sign(&mut self) -> bool {
        if self.eat(&Token::Minus) {
            true
        } else {
            self.eat(&Token::Plus);
            false
        }
    }

    fn signed_integer(&mut self) -> Result<i64, ParseError> {
        let negative = self.sign();
        match self.peek() {
            Some(Token::Integer(text)) => {
                let magnitude: i128 = text.parse().map_err(|_| self.error(&["integer"]))?;
                let value = if negative { -magnitude } else { magnitude };
                let value = i64::try_from(value)
                    .map_err(|_| self.error(&["integer within 64 bits"]))?;
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.error(&["integer"])),
        }
    }

    /// Parse numeric text as a finite double
    fn finite(&self, text: &str) -> Result<f64, ParseError> {
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.error(&["finite number"]))
    }

    fn number(&mut self) -> Result<f64, ParseError> {
        let negative = self.sign();
        match self.peek() {
            Some(Token::Integer(text)) | Some(Token::Float(text)) => {
                let value = self.finite(text)?;
                self.pos += 1;
                Ok(if negative { -value } else { value })
            }
            _ => Err(self.error(&["number"])),
        }
    }

    /// Integer, float or string attribute value
    fn attribute_literal(&mut self) -> Result<AttributeLiteral, ParseError> {
        if let Some(Token::Str(_)) = self.peek() {
            return self.string().map(AttributeLiteral::String);
        }
        let negative = self.sign();
        let literal = match self.peek() {
            Some(Token::Integer(text)) => match text.parse::<i64>() {
                Ok(v) => AttributeLiteral::Int(if negative { -v } else { v }),
                Err(_) => {
                    let v = self.finite(text)?;
                    AttributeLiteral::Float(if negative { -v } else { v })
                }
            },
            Some(Token::Float(text)) => {
                let v = self.finite(text)?;
                AttributeLiteral::Float(if negative { -v } else { v })
            }
            _ => return Err(self.error(&["number", "string"])),
        };
        self.pos += 1;
        Ok(literal)
    }

    /// `raw "description"` pairs up to (not including) the terminating `;`
    fn value_pairs(&mut self) -> Result<ValuePairs, ParseError> {
        let mut values = Vec::new();
        while matches!(
            self.peek(),
            Some(Token::Integer(_)) | Some(Token::Minus) | Some(Token::Plus)
        ) {
            let raw = self.signed_integer()?;
            let text = self.string()?;
            values.push((raw, text));
        }
        Ok(values)
    }

    /// Names separated by whitespace or commas
    fn name_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut names = Vec::new();
        loop {
            if !names.is_empty() && self.eat(&Token::Comma) {
                names.push(self.ident()?);
            } else if let Some(Token::Ident(_)) = self.peek() {
                names.push(self.ident()?);
            } else {
                return Ok(names);
            }
        }
    }

    fn byte_order(&mut self) -> Result<ByteOrder, ParseError> {
        let order = match self.peek() {
            Some(Token::Integer("0")) => ByteOrder::BigEndian,
            Some(Token::Integer("1")) => ByteOrder::LittleEndian,
            _ => return Err(self.error(&["byte order 0 or 1"])),
        };
        self.pos += 1;
        Ok(order)
    }

    fn value_type(&mut self) -> Result<ValueType, ParseError> {
        if self.eat(&Token::Plus) {
            Ok(ValueType::Unsigned)
        } else if self.eat(&Token::Minus) {
            Ok(ValueType::Signed)
        } else {
            Err(self.error(&["'+'", "'-'"]))
        }
    }

    /// `[min|max]`
    fn range(&mut self) -> Result<(f64, f64), ParseError> {
        self.expect(Token::OpenBracket)?;
        let minimum = self.number()?;
        self.expect(Token::Pipe)?;
        let maximum = self.number()?;
        self.expect(Token::CloseBracket)?;
        Ok((minimum, maximum))
    }

    /// `(factor,offset)`
    fn scaling(&mut self) -> Result<(f64, f64), ParseError> {
        self.expect(Token::OpenParen)?;
        let factor = self.number()?;
        self.expect(Token::Comma)?;
        let offset = self.number()?;
        self.expect(Token::CloseParen)?;
        Ok((factor, offset))
    }

    // === Scoped references ===

    /// Object kind selected by a `BU_`/`BO_`/`SG_`/`EV_` prefix, if present
    fn scope_kind(&self) -> Option<ObjectKind> {
        match self.peek()? {
            Token::Nodes => Some(ObjectKind::Node),
            Token::Message => Some(ObjectKind::Message),
            Token::Signal => Some(ObjectKind::Signal),
            Token::EnvironmentVariable => Some(ObjectKind::EnvironmentVariable),
            _ => None,
        }
    }

    /// Optional scope prefix with its reference operands
    ///
    /// Shared by `CM_` and `BA_`; `allowed` lists the prefixes legal at this
    /// point. Without a prefix the reference is the network itself.
    fn scoped_reference(&mut self, allowed: &[ObjectKind]) -> Result<ObjectRef, ParseError> {
        let Some(kind) = self.scope_kind() else {
            return Ok(ObjectRef::Network);
        };
        if !allowed.contains(&kind) {
            let expected: Vec<String> = allowed.iter().map(|k| format!("{} reference", k)).collect();
            let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
            return Err(self.error(&expected));
        }
        self.pos += 1;

        Ok(match kind {
            ObjectKind::Node => ObjectRef::Node(self.ident()?),
            ObjectKind::Message => ObjectRef::Message(self.unsigned32()?),
            ObjectKind::Signal => {
                let message_id = self.unsigned32()?;
                let signal = self.ident()?;
                ObjectRef::Signal { message_id, signal }
            }
            ObjectKind::EnvironmentVariable => ObjectRef::EnvironmentVariable(self.ident()?),
            ObjectKind::Network => ObjectRef::Network,
        })
    }

    // === Grammar rules ===

    pub fn parse_file(&mut self) -> Result<DbcFile, ParseError> {
        self.expect(Token::Version)?;
        let version = self.string()?;

        self.expect(Token::NewSymbols)?;
        self.expect(Token::Colon)?;
        let mut new_symbols = Vec::new();
        loop {
            match self.peek() {
                Some(Token::BitTiming) => break,
                Some(Token::Ident(_)) | Some(Token::Integer(_)) => {}
                Some(token) if token.is_keyword() => {}
                _ => return Err(self.error(&["new symbol", "'BS_'"])),
            }
            if let Some(spanned) = self.advance() {
                new_symbols.push(spanned.text.to_string());
            }
        }

        self.expect(Token::BitTiming)?;
        self.expect(Token::Colon)?;
        let bit_timing = if let Some(Token::Integer(_)) = self.peek() {
            let baudrate = self.unsigned32()?;
            self.expect(Token::Colon)?;
            let btr1 = self.unsigned32()?;
            self.expect(Token::Comma)?;
            let btr2 = self.unsigned32()?;
            Some(BitTiming { baudrate, btr1, btr2 })
        } else {
            None
        };

        self.expect(Token::Nodes)?;
        self.expect(Token::Colon)?;
        let mut nodes = Vec::new();
        while let Some(Token::Ident(_)) = self.peek() {
            nodes.push(self.ident()?);
        }

        let mut sections = Vec::new();
        while self.peek().is_some() {
            sections.push(self.section()?);
        }

        Ok(DbcFile {
            version,
            new_symbols,
            bit_timing,
            nodes,
            sections,
        })
    }

    fn section(&mut self) -> Result<Section, ParseError> {
        let Some(&token) = self.peek() else {
            return Err(self.error(SECTION_KEYWORDS));
        };
        if !token.is_keyword() {
            return Err(self.error(SECTION_KEYWORDS));
        }

        let section = match token {
            Token::ValueTable => Section::ValueTable(self.value_table()?),
            Token::Message => Section::Message(self.message()?),
            Token::MessageTransmitters => Section::MessageTransmitters(self.message_transmitters()?),
            Token::EnvironmentVariable => Section::EnvironmentVariable(self.environment_variable()?),
            Token::EnvironmentVariableData => {
                Section::EnvironmentVariableData(self.environment_variable_data()?)
            }
            Token::SignalType => Section::SignalType(self.signal_type()?),
            Token::Comment => Section::Comment(self.comment()?),
            Token::AttributeDefinition => Section::AttributeDefinition(self.attribute_definition()?),
            Token::AttributeDefault => Section::AttributeDefault(self.attribute_default()?),
            Token::Attribute => Section::AttributeValue(self.attribute_value()?),
            Token::ValueDescriptions => Section::ValueDescriptions(self.value_descriptions()?),
            Token::SignalGroup => Section::SignalGroup(self.signal_group()?),
            Token::SignalValueType => Section::SignalValueType(self.signal_value_type()?),
            Token::ExtendedMultiplexing => {
                Section::ExtendedMultiplexing(self.extended_multiplexing()?)
            }
            _ => return Err(self.error(SECTION_KEYWORDS)),
        };
        log::trace!("Parsed section {}", token);
        Ok(section)
    }

    fn value_table(&mut self) -> Result<ValueTableDef, ParseError> {
        self.expect(Token::ValueTable)?;
        let name = self.ident()?;
        let values = self.value_pairs()?;
        self.expect(Token::Semicolon)?;
        Ok(ValueTableDef { name, values })
    }

    fn message(&mut self) -> Result<MessageDef, ParseError> {
        self.expect(Token::Message)?;
        let id = self.unsigned32()?;
        let name = self.ident()?;
        self.expect(Token::Colon)?;
        let size = self.unsigned32()?;
        let transmitter = self.ident()?;

        let mut signals = Vec::new();
        while self.check(&Token::Signal) {
            signals.push(self.signal()?);
        }

        Ok(MessageDef {
            id,
            name,
            size,
            transmitter,
            signals,
        })
    }

    fn signal(&mut self) -> Result<SignalDef, ParseError> {
        self.expect(Token::Signal)?;
        let name = self.ident()?;

        let multiplexer = match self.peek() {
            Some(Token::Ident(text)) => {
                let role = MultiplexerRole::from_indicator(text)
                    .ok_or_else(|| self.error(&["multiplexer indicator (M, mN or mNM)"]))?;
                self.pos += 1;
                role
            }
            Some(Token::Colon) => MultiplexerRole::None,
            _ => return Err(self.error(&["':'", "multiplexer indicator"])),
        };
        self.expect(Token::Colon)?;

        let start_bit = self.unsigned32()?;
        self.expect(Token::Pipe)?;
        let length = self.unsigned32()?;
        self.expect(Token::At)?;
        let byte_order = self.byte_order()?;
        let value_type = self.value_type()?;
        let (factor, offset) = self.scaling()?;
        let (minimum, maximum) = self.range()?;
        let unit = self.string()?;

        let receivers = self.name_list()?;
        if receivers.is_empty() {
            return Err(self.error(&["receiver"]));
        }

        Ok(SignalDef {
            name,
            multiplexer,
            start_bit,
            length,
            byte_order,
            value_type,
            factor,
            offset,
            minimum,
            maximum,
            unit,
            receivers,
        })
    }

    fn message_transmitters(&mut self) -> Result<MessageTransmittersDef, ParseError> {
        self.expect(Token::MessageTransmitters)?;
        let message_id = self.unsigned32()?;
        self.expect(Token::Colon)?;
        let transmitters = self.name_list()?;
        self.expect(Token::Semicolon)?;
        Ok(MessageTransmittersDef {
            message_id,
            transmitters,
        })
    }

    fn environment_variable(&mut self) -> Result<EnvironmentVariableDef, ParseError> {
        self.expect(Token::EnvironmentVariable)?;
        let name = self.ident()?;
        self.expect(Token::Colon)?;

        let var_type = match self.peek() {
            Some(Token::Integer(text)) => text.parse().ok().and_then(EnvVarType::from_code),
            _ => None,
        }
        .ok_or_else(|| self.error(&["environment variable type 0, 1 or 2"]))?;
        self.pos += 1;

        let (minimum, maximum) = self.range()?;
        let unit = self.string()?;
        let initial_value = self.number()?;
        let id = self.unsigned32()?;

        let access_type = match self.peek() {
            Some(Token::Ident(text)) => text
                .strip_prefix(ACCESS_TYPE_PREFIX)
                .and_then(|digits| u32::from_str_radix(digits, 16).ok()),
            _ => None,
        }
        .ok_or_else(|| self.error(&["DUMMY_NODE_VECTORn"]))?;
        self.pos += 1;

        let mut access_nodes = vec![self.ident()?];
        while self.eat(&Token::Comma) {
            access_nodes.push(self.ident()?);
        }
        self.expect(Token::Semicolon)?;

        Ok(EnvironmentVariableDef {
            name,
            var_type,
            minimum,
            maximum,
            unit,
            initial_value,
            id,
            access_type,
            access_nodes,
        })
    }

    fn environment_variable_data(&mut self) -> Result<EnvironmentVariableDataDef, ParseError> {
        self.expect(Token::EnvironmentVariableData)?;
        let name = self.ident()?;
        self.expect(Token::Colon)?;
        let data_size = self.unsigned32()?;
        self.expect(Token::Semicolon)?;
        Ok(EnvironmentVariableDataDef { name, data_size })
    }

    fn signal_type(&mut self) -> Result<SignalTypeDef, ParseError> {
        self.expect(Token::SignalType)?;
        let name = self.ident()?;
        self.expect(Token::Colon)?;
        let size = self.unsigned32()?;
        self.expect(Token::At)?;
        let byte_order = self.byte_order()?;
        let value_type = self.value_type()?;

        let scaling = if self.check(&Token::OpenParen) {
            let (factor, offset) = self.scaling()?;
            let (minimum, maximum) = self.range()?;
            let unit = self.string()?;
            let default_value = self.number()?;
            self.expect(Token::Comma)?;
            let value_table = self.ident()?;
            Some(SignalTypeScaling {
                factor,
                offset,
                minimum,
                maximum,
                unit,
                default_value,
                value_table,
            })
        } else {
            None
        };
        self.expect(Token::Semicolon)?;

        Ok(SignalTypeDef {
            name,
            size,
            byte_order,
            value_type,
            scaling,
        })
    }

    fn comment(&mut self) -> Result<CommentDef, ParseError> {
        self.expect(Token::Comment)?;
        let target = self.scoped_reference(&[
            ObjectKind::Node,
            ObjectKind::Message,
            ObjectKind::Signal,
            ObjectKind::EnvironmentVariable,
        ])?;
        let text = self.string()?;
        self.expect(Token::Semicolon)?;
        Ok(CommentDef { target, text })
    }

    fn attribute_definition(&mut self) -> Result<AttributeDefinitionDef, ParseError> {
        self.expect(Token::AttributeDefinition)?;
        let kind = match self.scope_kind() {
            Some(kind) => {
                self.pos += 1;
                kind
            }
            None => ObjectKind::Network,
        };
        let name = self.string()?;

        let value_type = match self.peek() {
            Some(Token::Ident("INT")) => {
                self.pos += 1;
                let min = self.signed_integer()?;
                let max = self.signed_integer()?;
                AttributeValueType::Int { min, max }
            }
            Some(Token::Ident("HEX")) => {
                self.pos += 1;
                let min = self.signed_integer()?;
                let max = self.signed_integer()?;
                AttributeValueType::Hex { min, max }
            }
            Some(Token::Ident("FLOAT")) => {
                self.pos += 1;
                let min = self.number()?;
                let max = self.number()?;
                AttributeValueType::Float { min, max }
            }
            Some(Token::Ident("STRING")) => {
                self.pos += 1;
                AttributeValueType::String
            }
            Some(Token::Ident("ENUM")) => {
                self.pos += 1;
                let mut values = Vec::new();
                if let Some(Token::Str(_)) = self.peek() {
                    values.push(self.string()?);
                    while self.eat(&Token::Comma) {
                        values.push(self.string()?);
                    }
                }
                AttributeValueType::Enum(values)
            }
            _ => return Err(self.error(&["'INT'", "'HEX'", "'FLOAT'", "'STRING'", "'ENUM'"])),
        };
        self.expect(Token::Semicolon)?;

        Ok(AttributeDefinitionDef {
            kind,
            name,
            value_type,
        })
    }

    fn attribute_default(&mut self) -> Result<AttributeDefaultDef, ParseError> {
        self.expect(Token::AttributeDefault)?;
        let name = self.string()?;
        let value = self.attribute_literal()?;
        self.expect(Token::Semicolon)?;
        Ok(AttributeDefaultDef { name, value })
    }

    fn attribute_value(&mut self) -> Result<AttributeValueDef, ParseError> {
        self.expect(Token::Attribute)?;
        let name = self.string()?;
        let target = self.scoped_reference(&[
            ObjectKind::Node,
            ObjectKind::Message,
            ObjectKind::Signal,
            ObjectKind::EnvironmentVariable,
        ])?;
        let value = self.attribute_literal()?;
        self.expect(Token::Semicolon)?;
        Ok(AttributeValueDef {
            name,
            target,
            value,
        })
    }

    fn value_descriptions(&mut self) -> Result<ValueDescriptionsDef, ParseError> {
        self.expect(Token::ValueDescriptions)?;
        let target = match self.peek() {
            Some(Token::Integer(_)) => {
                let message_id = self.unsigned32()?;
                let signal = self.ident()?;
                ValueDescriptionTarget::Signal { message_id, signal }
            }
            Some(Token::Ident(_)) => ValueDescriptionTarget::EnvironmentVariable(self.ident()?),
            _ => return Err(self.error(&["message id", "environment variable name"])),
        };
        let values = self.value_pairs()?;
        self.expect(Token::Semicolon)?;
        Ok(ValueDescriptionsDef { target, values })
    }

    fn signal_group(&mut self) -> Result<SignalGroupDef, ParseError> {
        self.expect(Token::SignalGroup)?;
        let message_id = self.unsigned32()?;
        let name = self.ident()?;
        let repetitions = self.unsigned32()?;
        self.expect(Token::Colon)?;
        let signals = self.name_list()?;
        self.expect(Token::Semicolon)?;
        Ok(SignalGroupDef {
            message_id,
            name,
            repetitions,
            signals,
        })
    }

    fn signal_value_type(&mut self) -> Result<SignalValueTypeDef, ParseError> {
        self.expect(Token::SignalValueType)?;
        let message_id = self.unsigned32()?;
        let signal = self.ident()?;
        self.eat(&Token::Colon);
        let code = self.unsigned32()?;
        self.expect(Token::Semicolon)?;
        Ok(SignalValueTypeDef {
            message_id,
            signal,
            value_type: ExtendedValueType::from_code(code),
        })
    }

    fn extended_multiplexing(&mut self) -> Result<ExtendedMultiplexingDef, ParseError> {
        self.expect(Token::ExtendedMultiplexing)?;
        let message_id = self.unsigned32()?;
        let signal = self.ident()?;
        let switch = self.ident()?;

        let mut ranges = vec![self.switch_range()?];
        while self.eat(&Token::Comma) {
            ranges.push(self.switch_range()?);
        }
        self.expect(Token::Semicolon)?;

        Ok(ExtendedMultiplexingDef {
            message_id,
            signal,
            switch,
            ranges,
        })
    }

    fn switch_range(&mut self) -> Result<SwitchRange, ParseError> {
        let min = self.unsigned()?;
        self.expect(Token::Minus)?;
        let max = self.unsigned()?;
        Ok(SwitchRange { min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "VERSION \"\"\nNS_ :\nBS_:\nBU_: ECU1 ECU2\n";

    fn parse(body: &str) -> Result<DbcFile, DbcError> {
        parse_dbc(&format!("{}{}", HEADER, body), &ParseConfig::default())
    }

    fn parse_err(body: &str) -> ParseError {
        match parse(body) {
            Err(DbcError::Parse(err)) => err,
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_header() {
        let file = parse_dbc(
            "VERSION \"1.0\"\nNS_ :\n  NS_DESC_\n  CM_\n  BA_DEF_DEF_\n  BU_SG_REL_\nBS_: 500 : 1,2\nBU_:\n",
            &ParseConfig::default(),
        )
        .unwrap();
        assert_eq!(file.version, "1.0");
        assert_eq!(file.new_symbols, vec!["NS_DESC_", "CM_", "BA_DEF_DEF_", "BU_SG_REL_"]);
        assert_eq!(
            file.bit_timing,
            Some(BitTiming { baudrate: 500, btr1: 1, btr2: 2 })
        );
        assert!(file.nodes.is_empty());
        assert!(file.sections.is_empty());
    }

    #[test]
    fn test_message_with_signals() {
        let file = parse(
            "BO_ 291 EngineData: 8 ECU1\n SG_ EngineSpeed : 0|16@1+ (1,0) [0|8000] \"rpm\" ECU2\n SG_ EngineTemp : 23|8@0- (0.5,-40) [-40|215] \"C\" ECU1,ECU2\n",
        )
        .unwrap();
        let Section::Message(message) = &file.sections[0] else {
            panic!("expected message");
        };
        assert_eq!(message.id, 291);
        assert_eq!(message.size, 8);
        assert_eq!(message.transmitter, "ECU1");
        assert_eq!(message.signals.len(), 2);

        let temp = &message.signals[1];
        assert_eq!(temp.start_bit, 23);
        assert_eq!(temp.byte_order, ByteOrder::BigEndian);
        assert_eq!(temp.value_type, ValueType::Signed);
        assert_eq!(temp.factor, 0.5);
        assert_eq!(temp.offset, -40.0);
        assert_eq!(temp.minimum, -40.0);
        assert_eq!(temp.receivers, vec!["ECU1", "ECU2"]);
    }

    #[test]
    fn test_multiplexer_indicators() {
        let file = parse(
            "BO_ 1 M1: 8 ECU1\n SG_ Mode M : 0|8@1+ (1,0) [0|0] \"\" ECU2\n SG_ A m12 : 8|8@1+ (1,0) [0|0] \"\" ECU2\n SG_ B m3M : 16|8@1+ (1,0) [0|0] \"\" ECU2\n",
        )
        .unwrap();
        let Section::Message(message) = &file.sections[0] else {
            panic!("expected message");
        };
        let roles: Vec<_> = message.signals.iter().map(|s| s.multiplexer).collect();
        assert_eq!(
            roles,
            vec![
                MultiplexerRole::Multiplexor,
                MultiplexerRole::Multiplexed(12),
                MultiplexerRole::MultiplexedMultiplexor(3)
            ]
        );
    }

    #[test]
    fn test_multiplexer_indicator_requires_adjacent_digits() {
        let err = parse_err("BO_ 1 M1: 8 ECU1\n SG_ A m 2 : 8|8@1+ (1,0) [0|0] \"\" ECU2\n");
        assert_eq!(err.position.line, 6);
        assert_eq!(err.found, "identifier 'm'");
    }

    #[test]
    fn test_attribute_default_is_single_construct() {
        let file = parse("BA_DEF_ \"X\" INT 0 10;\nBA_DEF_DEF_ \"X\" 0;\n").unwrap();
        assert_eq!(file.sections.len(), 2);
        assert_eq!(
            file.sections[1],
            Section::AttributeDefault(AttributeDefaultDef {
                name: "X".to_string(),
                value: AttributeLiteral::Int(0)
            })
        );
    }

    #[test]
    fn test_attribute_value_types() {
        let file = parse(
            "BA_DEF_ BO_ \"Cycle\" INT -1 65535;\nBA_DEF_ \"Ratio\" FLOAT 0 1.5;\nBA_DEF_ SG_ \"Start\" HEX 0 255;\nBA_DEF_ BU_ \"Desc\" STRING;\nBA_DEF_ EV_ \"Mode\" ENUM \"Off\",\"On\";\nBA_DEF_ \"Empty\" ENUM;\n",
        )
        .unwrap();
        let kinds_and_types: Vec<_> = file
            .sections
            .iter()
            .map(|s| match s {
                Section::AttributeDefinition(d) => (d.kind, d.value_type.clone()),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            kinds_and_types,
            vec![
                (ObjectKind::Message, AttributeValueType::Int { min: -1, max: 65535 }),
                (ObjectKind::Network, AttributeValueType::Float { min: 0.0, max: 1.5 }),
                (ObjectKind::Signal, AttributeValueType::Hex { min: 0, max: 255 }),
                (ObjectKind::Node, AttributeValueType::String),
                (
                    ObjectKind::EnvironmentVariable,
                    AttributeValueType::Enum(vec!["Off".to_string(), "On".to_string()])
                ),
                (ObjectKind::Network, AttributeValueType::Enum(Vec::new())),
            ]
        );
    }

    #[test]
    fn test_scoped_references() {
        let file = parse(
            "CM_ \"net\";\nCM_ BU_ ECU1 \"node\";\nCM_ BO_ 10 \"msg\";\nCM_ SG_ 10 Sig \"sig\";\nCM_ EV_ Env \"env\";\nBA_ \"A\" SG_ 10 Sig -2.5;\nBA_ \"B\" \"text\";\n",
        )
        .unwrap();
        let targets: Vec<_> = file
            .sections
            .iter()
            .map(|s| match s {
                Section::Comment(c) => c.target.clone(),
                Section::AttributeValue(a) => a.target.clone(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                ObjectRef::Network,
                ObjectRef::Node("ECU1".to_string()),
                ObjectRef::Message(10),
                ObjectRef::Signal { message_id: 10, signal: "Sig".to_string() },
                ObjectRef::EnvironmentVariable("Env".to_string()),
                ObjectRef::Signal { message_id: 10, signal: "Sig".to_string() },
                ObjectRef::Network,
            ]
        );
        let Section::AttributeValue(value) = &file.sections[5] else {
            panic!("expected attribute value");
        };
        assert_eq!(value.value, AttributeLiteral::Float(-2.5));
    }

    #[test]
    fn test_misc_sections() {
        let file = parse(
            "VAL_TABLE_ Onoff 1 \"On\" 0 \"Off\" -1 \"Error\";\nBO_TX_BU_ 10 : ECU1,ECU2;\nEV_ Env : 0 [0|100] \"%\" 5 3 DUMMY_NODE_VECTOR8003 ECU1, ECU2;\nENVVAR_DATA_ Env : 4;\nSGTYPE_ T : 8@1+;\nVAL_ 10 Sig 1 \"On\" 0 \"Off\";\nVAL_ Env 0 \"Zero\";\nSIG_GROUP_ 10 Group 1 : SigA SigB;\nSIG_VALTYPE_ 10 Sig : 1;\nSG_MUL_VAL_ 10 Sig Mode 0-0, 2-4;\n",
        )
        .unwrap();
        assert_eq!(file.sections.len(), 10);

        assert_eq!(
            file.sections[0],
            Section::ValueTable(ValueTableDef {
                name: "Onoff".to_string(),
                values: vec![
                    (1, "On".to_string()),
                    (0, "Off".to_string()),
                    (-1, "Error".to_string())
                ],
            })
        );
        let Section::EnvironmentVariable(env) = &file.sections[2] else {
            panic!("expected environment variable");
        };
        assert_eq!(env.access_type, 0x8003);
        assert_eq!(env.access_nodes, vec!["ECU1", "ECU2"]);
        assert_eq!(env.initial_value, 5.0);

        let Section::SignalValueType(valtype) = &file.sections[8] else {
            panic!("expected SIG_VALTYPE_");
        };
        assert_eq!(valtype.value_type, ExtendedValueType::Float32);

        assert_eq!(
            file.sections[9],
            Section::ExtendedMultiplexing(ExtendedMultiplexingDef {
                message_id: 10,
                signal: "Sig".to_string(),
                switch: "Mode".to_string(),
                ranges: vec![SwitchRange { min: 0, max: 0 }, SwitchRange { min: 2, max: 4 }],
            })
        );
    }

    #[test]
    fn test_full_signal_type() {
        let file = parse("SGTYPE_ Temp : 8@0- (0.5,-40) [-40|87.5] \"degC\" 0, Temps;\n").unwrap();
        let Section::SignalType(signal_type) = &file.sections[0] else {
            panic!("expected SGTYPE_");
        };
        let scaling = signal_type.scaling.as_ref().unwrap();
        assert_eq!(scaling.maximum, 87.5);
        assert_eq!(scaling.value_table, "Temps");
    }

    #[test]
    fn test_sections_in_any_order() {
        let file = parse(
            "CM_ \"first\";\nBO_ 1 A: 1 ECU1\n SG_ S : 0|8@1+ (1,0) [0|0] \"\" ECU2\nBA_DEF_ \"X\" STRING;\nBO_ 2 B: 1 ECU1\n",
        )
        .unwrap();
        assert_eq!(file.sections.len(), 4);
        assert!(matches!(file.sections[3], Section::Message(_)));
    }

    #[test]
    fn test_errors_report_expected_set() {
        let err = parse_err("BO_ 1 A 8 ECU1\n");
        assert_eq!(err.expected, vec!["':'"]);
        assert_eq!(err.found, "number 8");
        assert_eq!(err.position.line, 5);
        assert_eq!(err.position.column, 9);

        let err = parse_err("FOO_ 1;\n");
        assert!(err.expected.contains(&"'BA_DEF_DEF_'".to_string()));
        assert_eq!(err.found, "identifier 'FOO_'");

        let err = parse_err("BA_DEF_ \"X\" BOOL;\n");
        assert_eq!(err.expected.len(), 5);

        let err = parse_err("CM_ \"unterminated comment\"");
        assert_eq!(err.found, "end of input");
        assert_eq!(err.expected, vec!["';'"]);
    }

    #[test]
    fn test_overflowing_numbers_rejected() {
        let err = parse_err("BO_ 1 A: 8 ECU1\n SG_ S : 0|8@1+ (1e999,0) [0|0] \"\" ECU2\n");
        assert_eq!(err.expected, vec!["finite number"]);
        assert_eq!(err.found, "number 1e999");

        let err = parse_err("BA_DEF_ \"X\" FLOAT 0 1;\nBA_DEF_DEF_ \"X\" -1e999;\n");
        assert_eq!(err.expected, vec!["finite number"]);

        // Largest finite doubles still parse
        assert!(parse("BO_ 1 A: 8 ECU1\n SG_ S : 0|8@1+ (1,0) [-1.7e308|1.7e308] \"\" ECU2\n").is_ok());
    }

    #[test]
    fn test_missing_header_section() {
        let err = match parse_dbc("VERSION \"\"\nBS_:\nBU_:\n", &ParseConfig::default()) {
            Err(DbcError::Parse(err)) => err,
            other => panic!("expected parse error, got {:?}", other),
        };
        assert_eq!(err.expected, vec!["'NS_'"]);
    }

    #[test]
    fn test_lex_error_propagates() {
        assert!(matches!(parse("CM_ \"bad\\\";\n"), Err(DbcError::Lex(_))));
    }
}
