//! Line oriented textual form of the IR.
//!
//! Each line is either a label definition `name:`, an instruction `MNEMONIC a, b, dst`, or an
//! instruction preceded by a label on the same line. Unused operand slots are left empty, for
//! example `STR %1, , A` or `UNKN , ,`. Blank lines and `#` comments are ignored.

use std::collections::BTreeMap;

use crate::{Error, OpCode, Result};

/// An operand as written in the textual form. Tokens are resolved against an architecture by the
/// consumer of a [Listing].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// `%N`: a signed integer constant.
    Constant(i64),

    /// `[N]`: the memory cell at literal address `N`.
    Memory(usize),

    /// `INn`: input channel `n`.
    Input(usize),

    /// `OUTn`: output channel `n`.
    Output(usize),

    /// `:name`: the instruction index of a label, used as a constant.
    Label(String),

    /// Any other identifier names a register, including the program counter `PC`.
    Register(String),
}

/// One of the three operand positions of an instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Slot {
    A,
    B,
    Dst,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::A => f.write_str("a"),
            Slot::B => f.write_str("b"),
            Slot::Dst => f.write_str("dst"),
        }
    }
}

/// A single instruction line prior to operand resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// One-based source line number.
    pub line: usize,
    pub opcode: OpCode,
    pub a: Option<Token>,
    pub b: Option<Token>,
    pub dst: Option<Token>,
}

impl Statement {
    pub fn operand(&self, slot: Slot) -> Option<&Token> {
        match slot {
            Slot::A => self.a.as_ref(),
            Slot::B => self.b.as_ref(),
            Slot::Dst => self.dst.as_ref(),
        }
    }
}

/// The result of the first decode pass: every instruction in program order along with the
/// instruction index each label refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    statements: Vec<Statement>,
    labels: BTreeMap<String, usize>,
}

impl Listing {
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// The index of the instruction following the label definition.
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, usize)> {
        self.labels.iter().map(|(name, &index)| (name.as_str(), index))
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
        }
        _ => false,
    }
}

fn channel_index(text: &str, prefix: &str) -> Option<usize> {
    let digits = text.strip_prefix(prefix)?;
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

impl Token {
    /// Parse a single operand token. The `line` is only used for error reporting.
    pub fn parse(text: &str, line: usize) -> Result<Self> {
        let invalid = || Error::InvalidOperand {
            line,
            token: text.to_owned(),
        };

        if let Some(value) = text.strip_prefix('%') {
            return value.parse().map(Token::Constant).map_err(|_| invalid());
        }

        if let Some(address) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            return address.parse().map(Token::Memory).map_err(|_| invalid());
        }

        if let Some(channel) = channel_index(text, "IN") {
            return Ok(Token::Input(channel));
        }

        if let Some(channel) = channel_index(text, "OUT") {
            return Ok(Token::Output(channel));
        }

        if let Some(label) = text.strip_prefix(':') {
            return if is_identifier(label) {
                Ok(Token::Label(label.to_owned()))
            } else {
                Err(invalid())
            };
        }

        if is_identifier(text) {
            Ok(Token::Register(text.to_owned()))
        } else {
            Err(invalid())
        }
    }
}

impl std::str::FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Token::parse(s, 0)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Constant(value) => write!(f, "%{value}"),
            Token::Memory(address) => write!(f, "[{address}]"),
            Token::Input(channel) => write!(f, "IN{channel}"),
            Token::Output(channel) => write!(f, "OUT{channel}"),
            Token::Label(name) => write!(f, ":{name}"),
            Token::Register(name) => f.write_str(name),
        }
    }
}

fn parse_statement(text: &str, line: usize) -> Result<Statement> {
    let malformed = || Error::MalformedLine {
        line,
        text: text.to_owned(),
    };

    let split = text
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(text.len());
    let (mnemonic, rest) = text.split_at(split);
    if mnemonic.is_empty() || !(rest.is_empty() || rest.starts_with([' ', '\t', ','])) {
        return Err(malformed());
    }

    let opcode = OpCode::from_mnemonic(mnemonic).ok_or_else(|| Error::UnknownMnemonic {
        line,
        mnemonic: mnemonic.to_owned(),
    })?;

    let mut operands: [Option<Token>; 3] = Default::default();
    if !rest.trim().is_empty() {
        let fields = rest.split(',').collect::<Vec<_>>();
        if fields.len() > operands.len() {
            return Err(malformed());
        }

        for (operand, field) in operands.iter_mut().zip(fields) {
            let field = field.trim();
            if !field.is_empty() {
                *operand = Some(Token::parse(field, line)?);
            }
        }
    }

    let [a, b, dst] = operands;
    let statement = Statement {
        line,
        opcode,
        a,
        b,
        dst,
    };

    let usage = opcode.operand_usage();
    for (slot, used) in [(Slot::A, usage.a), (Slot::B, usage.b), (Slot::Dst, usage.dst)] {
        match (used, statement.operand(slot)) {
            (true, None) => return Err(Error::MissingOperand { line, opcode, slot }),
            (false, Some(token)) => {
                return Err(Error::UnexpectedOperand {
                    line,
                    opcode,
                    slot,
                    token: token.to_string(),
                })
            }
            _ => (),
        }
    }

    Ok(statement)
}

/// Parse the textual form into a [Listing]. Labels are collected in the same pass since a label
/// only records the index of the next instruction; label references are resolved later.
pub fn parse(program: &str) -> Result<Listing> {
    let mut listing = Listing::default();

    for (index, raw) in program.lines().enumerate() {
        let line = index + 1;
        let mut text = raw.split('#').next().unwrap_or_default().trim();

        if let Some((head, rest)) = text.split_once(':') {
            if is_identifier(head) {
                let position = listing.statements.len();
                if listing.labels.insert(head.to_owned(), position).is_some() {
                    return Err(Error::DuplicateLabel {
                        line,
                        label: head.to_owned(),
                    });
                }
                text = rest.trim();
            }
        }

        if text.is_empty() {
            continue;
        }

        listing.statements.push(parse_statement(text, line)?);
    }

    Ok(listing)
}
