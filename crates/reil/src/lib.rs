//! This crate describes the instruction set and textual surface syntax of a small register
//! transfer language similar to REIL. Programs are written one instruction per line as
//! `MNEMONIC a, b, dst` with optional `name:` label lines.
//!
//! Parsing produces a [Listing]: the instructions in program order with their operands still in
//! token form, plus the instruction index of every label. Binding tokens to the registers, memory
//! and channels of a concrete architecture is left to the consumer.

mod opcodes;
mod syntax;

pub use opcodes::*;
pub use syntax::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The mnemonic does not name an instruction.
    #[error("line {line}: unknown mnemonic {mnemonic:?}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    /// The operand matches none of the recognized operand forms.
    #[error("line {line}: unrecognized operand {token:?}")]
    InvalidOperand { line: usize, token: String },

    /// The line is neither a label nor an instruction.
    #[error("line {line}: malformed instruction {text:?}")]
    MalformedLine { line: usize, text: String },

    #[error("line {line}: label {label:?} is already defined")]
    DuplicateLabel { line: usize, label: String },

    #[error("line {line}: {opcode} requires operand {slot}")]
    MissingOperand {
        line: usize,
        opcode: OpCode,
        slot: Slot,
    },

    #[error("line {line}: {opcode} does not use operand {slot}, found {token:?}")]
    UnexpectedOperand {
        line: usize,
        opcode: OpCode,
        slot: Slot,
        token: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
