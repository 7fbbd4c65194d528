//! DBC tokenizer
//!
//! Tokens are recognized by a logos-derived automaton. Logos performs longest
//! match, so `BA_DEF_DEF_` is always a single keyword and identifiers that only
//! start with a keyword (`BU_SG_REL_`) stay identifiers. Keywords win over the
//! identifier rule when both match the same text.
//!
//! Signs are separate tokens. The parser joins `-` with the following number
//! where the grammar expects a signed value, which keeps `0-5` ranges and the
//! `@1-` value-type marker unambiguous.

use crate::config::ParseConfig;
use crate::types::{LexError, Position};
use logos::Logos;
use std::fmt;

/// DBC token
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"\(\*([^*]|\*+[^*)])*\*+\)")]
pub enum Token<'src> {
    // === Section keywords ===
    #[token("VERSION")]
    Version,
    #[token("NS_")]
    NewSymbols,
    #[token("BS_")]
    BitTiming,
    #[token("BU_")]
    Nodes,
    #[token("BO_")]
    Message,
    #[token("SG_")]
    Signal,
    #[token("VAL_")]
    ValueDescriptions,
    #[token("VAL_TABLE_")]
    ValueTable,
    #[token("BO_TX_BU_")]
    MessageTransmitters,
    #[token("EV_")]
    EnvironmentVariable,
    #[token("ENVVAR_DATA_")]
    EnvironmentVariableData,
    #[token("SGTYPE_")]
    SignalType,
    #[token("CM_")]
    Comment,
    #[token("BA_DEF_")]
    AttributeDefinition,
    #[token("BA_DEF_DEF_")]
    AttributeDefault,
    #[token("BA_")]
    Attribute,
    #[token("SIG_GROUP_")]
    SignalGroup,
    #[token("SIG_VALTYPE_")]
    SignalValueType,
    #[token("SG_MUL_VAL_")]
    ExtendedMultiplexing,

    // === Punctuation ===
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("|")]
    Pipe,
    #[token("@")]
    At,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,

    // === Literals ===
    /// Unsigned decimal integer
    #[regex(r"[0-9]+", |lex| lex.slice())]
    Integer(&'src str),

    /// Number with a fraction and/or exponent (e.g. 0.1, 1e-5, 2.5E+3)
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice())]
    Float(&'src str),

    /// Quoted string, without the quotes
    #[regex(r#""[^"\\\r\n]*""#, |lex| { let s = lex.slice(); &s[1..s.len() - 1] })]
    Str(&'src str),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice())]
    Ident(&'src str),
}

impl Token<'_> {
    /// Literal spelling of keywords and punctuation
    pub fn keyword(&self) -> Option<&'static str> {
        let text = match self {
            Token::Version => "VERSION",
            Token::NewSymbols => "NS_",
            Token::BitTiming => "BS_",
            Token::Nodes => "BU_",
            Token::Message => "BO_",
            Token::Signal => "SG_",
            Token::ValueDescriptions => "VAL_",
            Token::ValueTable => "VAL_TABLE_",
            Token::MessageTransmitters => "BO_TX_BU_",
            Token::EnvironmentVariable => "EV_",
            Token::EnvironmentVariableData => "ENVVAR_DATA_",
            Token::SignalType => "SGTYPE_",
            Token::Comment => "CM_",
            Token::AttributeDefinition => "BA_DEF_",
            Token::AttributeDefault => "BA_DEF_DEF_",
            Token::Attribute => "BA_",
            Token::SignalGroup => "SIG_GROUP_",
            Token::SignalValueType => "SIG_VALTYPE_",
            Token::ExtendedMultiplexing => "SG_MUL_VAL_",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Pipe => "|",
            Token::At => "@",
            Token::OpenParen => "(",
            Token::CloseParen => ")",
            Token::OpenBracket => "[",
            Token::CloseBracket => "]",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Integer(_) | Token::Float(_) | Token::Str(_) | Token::Ident(_) => return None,
        };
        Some(text)
    }

    /// True for the section keywords
    pub fn is_keyword(&self) -> bool {
        self.keyword()
            .map_or(false, |k| k.starts_with(|c: char| c.is_ascii_uppercase()))
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(s) | Token::Float(s) => write!(f, "number {}", s),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            other => write!(f, "'{}'", other.keyword().unwrap_or_default()),
        }
    }
}

/// A token with its source text and position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spanned<'src> {
    pub token: Token<'src>,
    /// Exact source slice of the token (quotes included for strings)
    pub text: &'src str,
    pub position: Position,
}

/// Lazy, restartable token iterator with line/column tracking
///
/// Stops after the first error.
#[derive(Clone)]
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, Token<'src>>,
    max_identifier_len: Option<usize>,
    line: usize,
    /// Column of the byte at `scanned`
    column: usize,
    scanned: usize,
    failed: bool,
}

impl<'src> Lexer<'src> {
    /// Create a lexer with the default identifier length limit
    pub fn new(source: &'src str) -> Self {
        Self::with_config(source, &ParseConfig::default())
    }

    pub fn with_config(source: &'src str, config: &ParseConfig) -> Self {
        Self {
            source,
            inner: Token::lexer(source),
            max_identifier_len: config.max_identifier_len,
            line: 1,
            column: 1,
            scanned: 0,
            failed: false,
        }
    }

    /// Rewind to the beginning of the source
    pub fn restart(&mut self) {
        self.inner = Token::lexer(self.source);
        self.line = 1;
        self.column = 1;
        self.scanned = 0;
        self.failed = false;
    }

    /// Position of a byte offset at or after the last scanned offset
    ///
    /// Only the text between the previous token and this one is scanned, so
    /// positions cost linear time over the whole source.
    fn position_of(&mut self, offset: usize) -> Position {
        if offset > self.scanned {
            for ch in self.source[self.scanned..offset].chars() {
                if ch == '\n' {
                    self.line += 1;
                    self.column = 1;
                } else {
                    self.column += 1;
                }
            }
            self.scanned = offset;
        }

        Position {
            line: self.line,
            column: self.column,
            offset,
        }
    }

    /// Text reported for an unrecognized fragment
    fn fragment_at(&self, start: usize, end: usize) -> String {
        let rest = &self.source[start..];
        if rest.starts_with('"') {
            // Unterminated or malformed string: report up to the end of the line
            rest.lines().next().unwrap_or(rest).to_string()
        } else {
            self.source[start..end].to_string()
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Spanned<'src>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = self.inner.next()?;
        let span = self.inner.span();
        let position = self.position_of(span.start);

        match result {
            Ok(Token::Ident(name))
                if self
                    .max_identifier_len
                    .map_or(false, |limit| name.chars().count() > limit) =>
            {
                self.failed = true;
                Some(Err(LexError {
                    position,
                    fragment: name.to_string(),
                }))
            }
            Ok(token) => Some(Ok(Spanned {
                token,
                text: self.inner.slice(),
                position,
            })),
            Err(()) => {
                self.failed = true;
                Some(Err(LexError {
                    position,
                    fragment: self.fragment_at(span.start, span.end),
                }))
            }
        }
    }
}

/// Tokenize a complete DBC source text
pub fn tokenize<'src>(
    source: &'src str,
    config: &ParseConfig,
) -> Result<Vec<Spanned<'src>>, LexError> {
    let tokens = Lexer::with_config(source, config).collect::<Result<Vec<_>, _>>()?;
    log::trace!("Tokenized {} bytes into {} tokens", source.len(), tokens.len());
    Ok(tokens)
}
