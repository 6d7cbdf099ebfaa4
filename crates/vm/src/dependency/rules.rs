//! Algebraic simplification of the derivations recorded for binary operations.
//!
//! A constant source is folded into the operator label, e.g. `ADD A, %1, A` is recorded as
//! `+ 1(A)`. The position of the constant is part of the label for operators that do not commute:
//! `k -` subtracts the source from `k` whereas `- k` subtracts `k` from the source.

use reil::OpCode;

use super::graph::NodeId;
use crate::arch::{OperandId, Value};
use crate::emulator;

/// An instruction source as observed before the instruction takes effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Source {
    /// `None` when the source does not correspond to an instruction operand.
    pub operand: Option<OperandId>,
    pub name: String,
    pub node: NodeId,
    pub value: Value,
    pub constant: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Rule<'a> {
    /// The destination takes on the node of the source.
    Alias(&'a Source),

    /// The destination is a known constant.
    Fold(Value),

    /// The destination is derived from the sources.
    Link(String, Vec<&'a Source>),

    /// Nothing can be recorded, e.g. a constant division by zero.
    Unchanged,
}

fn symbol(opcode: OpCode) -> &'static str {
    match opcode {
        OpCode::Add => "+",
        OpCode::Sub => "-",
        OpCode::Mul => "*",
        OpCode::Div => "/",
        OpCode::Mod => "mod",
        OpCode::Bsh => ">>",
        OpCode::And => "&",
        OpCode::Or => "|",
        OpCode::Xor => "^",
        _ => "?",
    }
}

fn commutes(opcode: OpCode) -> bool {
    matches!(
        opcode,
        OpCode::Add | OpCode::Mul | OpCode::And | OpCode::Or | OpCode::Xor
    )
}

/// Simplify a binary operation whose sources are not both constant, given a constant operand `k`
/// and the other operand. `constant_first` is true when `k` is the first source.
fn with_constant<'a>(
    opcode: OpCode,
    k: Value,
    other: &'a Source,
    constant_first: bool,
) -> Rule<'a> {
    match (opcode, k) {
        (OpCode::Add | OpCode::Or | OpCode::Xor, 0) => return Rule::Alias(other),
        (OpCode::Sub | OpCode::Bsh, 0) if !constant_first => return Rule::Alias(other),
        (OpCode::Mul | OpCode::And, 0) => return Rule::Fold(0),
        (OpCode::Mul, 1) => return Rule::Alias(other),
        (OpCode::Div, 1) if !constant_first => return Rule::Alias(other),
        _ => (),
    }

    let symbol = symbol(opcode);
    let label = if opcode == OpCode::Sub && k == 0 {
        symbol.to_owned()
    } else if constant_first && !commutes(opcode) {
        format!("{k} {symbol}")
    } else {
        format!("{symbol} {k}")
    };

    Rule::Link(label, vec![other])
}

/// The derivation of a binary operation over sources `a` and `b`.
pub(crate) fn binary<'a>(opcode: OpCode, a: &'a Source, b: &'a Source) -> Rule<'a> {
    if a.constant && b.constant {
        return emulator::evaluate(opcode, a.value, b.value)
            .map(Rule::Fold)
            .unwrap_or(Rule::Unchanged);
    }

    if a.node == b.node {
        match opcode {
            OpCode::And | OpCode::Or => return Rule::Alias(a),
            OpCode::Xor => return Rule::Fold(0),
            _ => (),
        }
    }

    if a.constant {
        with_constant(opcode, a.value, b, true)
    } else if b.constant {
        with_constant(opcode, b.value, a, false)
    } else {
        Rule::Link(symbol(opcode).to_owned(), vec![a, b])
    }
}

/// The derivation of a zero test.
pub(crate) fn bisz(a: &Source) -> Rule<'_> {
    if a.constant {
        Rule::Fold(Value::from(a.value == 0))
    } else {
        Rule::Link("=? 0".to_owned(), vec![a])
    }
}
