//! Binding of parsed statements to the operands of an [Architecture].

use reil::{Listing, OpCode, Slot, Statement, Token};

use crate::arch::{self, Architecture, OperandId, Value};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] reil::Error),

    #[error("line {line}: undefined label {label:?}")]
    UndefinedLabel { line: usize, label: String },

    #[error("line {line}: {source}")]
    Operand {
        line: usize,
        #[source]
        source: arch::Error,
    },

    #[error("line {line}: {opcode} cannot write to {operand}")]
    NotWritable {
        line: usize,
        opcode: OpCode,
        operand: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// An operand slot of a decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionOperand {
    pub id: OperandId,
    pub name: String,
}

impl std::fmt::Display for InstructionOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// An executable instruction whose operands are bound to architecture operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: OpCode,
    a: Option<InstructionOperand>,
    b: Option<InstructionOperand>,
    dst: Option<InstructionOperand>,
}

impl Instruction {
    pub fn new(
        opcode: OpCode,
        a: Option<InstructionOperand>,
        b: Option<InstructionOperand>,
        dst: Option<InstructionOperand>,
    ) -> Self {
        Self { opcode, a, b, dst }
    }

    /// The instruction executed when the program counter is outside of the program.
    pub const fn unknown() -> Self {
        Self {
            opcode: OpCode::Unkn,
            a: None,
            b: None,
            dst: None,
        }
    }

    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    pub fn operand(&self, slot: Slot) -> Option<&InstructionOperand> {
        match slot {
            Slot::A => self.a.as_ref(),
            Slot::B => self.b.as_ref(),
            Slot::Dst => self.dst.as_ref(),
        }
    }

    pub fn operand_id(&self, slot: Slot) -> Option<OperandId> {
        self.operand(slot).map(|operand| operand.id)
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn name(operand: &Option<InstructionOperand>) -> &str {
            operand
                .as_ref()
                .map(|operand| operand.name.as_str())
                .unwrap_or_default()
        }

        let text = format!(
            "{} {}, {}, {}",
            self.opcode,
            name(&self.a),
            name(&self.b),
            name(&self.dst)
        );
        f.write_str(text.trim_end())
    }
}

fn resolve(
    arch: &mut Architecture,
    listing: &Listing,
    statement: &Statement,
    token: &Token,
) -> Result<OperandId> {
    let line = statement.line;
    let operand = |source| Error::Operand { line, source };

    match token {
        Token::Constant(value) => Ok(arch.constant(*value)),
        Token::Memory(address) => {
            let address = Value::try_from(*address).unwrap_or(Value::MAX);
            arch.memory_cell(address).map_err(operand)
        }
        Token::Input(channel) => arch.input(*channel).map_err(operand),
        Token::Output(channel) => arch.output(*channel).map_err(operand),
        Token::Register(name) => arch.register(name).map_err(operand),
        Token::Label(label) => {
            let index = listing
                .label(label)
                .ok_or_else(|| Error::UndefinedLabel {
                    line,
                    label: label.clone(),
                })?;
            Ok(arch.constant(Value::try_from(index).unwrap_or(Value::MAX)))
        }
    }
}

fn bind_statement(
    arch: &mut Architecture,
    listing: &Listing,
    statement: &Statement,
) -> Result<Instruction> {
    let mut bind = |slot| -> Result<Option<InstructionOperand>> {
        statement
            .operand(slot)
            .map(|token| {
                let id = resolve(arch, listing, statement, token)?;
                Ok(InstructionOperand {
                    id,
                    name: arch.operand(id).name(),
                })
            })
            .transpose()
    };

    let a = bind(Slot::A)?;
    let b = bind(Slot::B)?;
    let dst = bind(Slot::Dst)?;

    if statement.opcode.operand_usage().writes_dst {
        if let Some(dst) = &dst {
            if !arch.operand(dst.id).is_writable() {
                return Err(Error::NotWritable {
                    line: statement.line,
                    opcode: statement.opcode,
                    operand: dst.name.clone(),
                });
            }
        }
    }

    Ok(Instruction::new(statement.opcode, a, b, dst))
}

/// Bind every statement of a listing to operands of the architecture. Constants and label
/// references are interned as constant operands.
pub fn bind(arch: &mut Architecture, listing: &Listing) -> Result<Vec<Instruction>> {
    listing
        .statements()
        .iter()
        .map(|statement| bind_statement(arch, listing, statement))
        .collect()
}

/// Parse and bind a program in textual form.
pub fn decode(arch: &mut Architecture, program: &str) -> Result<Vec<Instruction>> {
    let listing = reil::parse(program)?;
    bind(arch, &listing)
}
