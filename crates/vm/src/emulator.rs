use reil::{OpCode, Slot};

use crate::arch::{self, Architecture, OperandId, Value};
use crate::decode::Instruction;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Architecture(#[from] arch::Error),

    #[error("division by zero in `{instruction}`")]
    DivisionByZero { instruction: String },

    #[error("`{instruction}` has no {slot} operand")]
    MissingOperand { instruction: String, slot: Slot },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Describes which instruction executes after the current one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControlFlow {
    /// Advance the program counter by one.
    NextInstruction,

    /// The program counter was set by the instruction.
    Jump(Value),

    /// Execution stops. The program counter is left unchanged.
    Halt,
}

/// Shift right by `amount` bits, or left by `-amount` bits when `amount` is negative. Shifting
/// out every bit yields the sign for a right shift and zero for a left shift.
pub fn shift(value: Value, amount: Value) -> Value {
    if amount >= 0 {
        if amount >= Value::BITS as Value {
            if value < 0 {
                -1
            } else {
                0
            }
        } else {
            value >> amount
        }
    } else {
        let amount = amount.unsigned_abs();
        if amount >= u64::from(Value::BITS) {
            0
        } else {
            value << amount
        }
    }
}

/// Evaluate a binary operation. Returns `None` for a division or remainder by zero and for
/// opcodes which are not binary operations.
pub fn evaluate(opcode: OpCode, a: Value, b: Value) -> Option<Value> {
    let value = match opcode {
        OpCode::Add => a.wrapping_add(b),
        OpCode::Sub => a.wrapping_sub(b),
        OpCode::Mul => a.wrapping_mul(b),
        OpCode::Div if b != 0 => a.wrapping_div(b),
        OpCode::Mod if b != 0 => a.wrapping_rem(b),
        OpCode::Bsh => shift(a, b),
        OpCode::And => a & b,
        OpCode::Or => a | b,
        OpCode::Xor => a ^ b,
        _ => return None,
    };

    Some(value)
}

macro_rules! binary_op {
    ($self:ident, $arch:ident, $instruction:ident) => {{
        let a = $arch.get($self.operand($instruction, Slot::A)?);
        let b = $arch.get($self.operand($instruction, Slot::B)?);
        let value = evaluate($instruction.opcode(), a, b).ok_or_else(|| Error::DivisionByZero {
            instruction: $instruction.to_string(),
        })?;
        $arch.set($self.operand($instruction, Slot::Dst)?, value)?;
    }};
}

/// Applies the effect of a single instruction to an [Architecture].
#[derive(Debug, Default, Clone)]
pub struct Emulator {}

impl Emulator {
    pub fn new() -> Self {
        Default::default()
    }

    fn operand(&self, instruction: &Instruction, slot: Slot) -> Result<OperandId> {
        instruction
            .operand_id(slot)
            .ok_or_else(|| Error::MissingOperand {
                instruction: instruction.to_string(),
                slot,
            })
    }

    /// Execute the instruction. The program counter is only modified by control flow
    /// instructions; otherwise the caller is responsible for advancing it.
    pub fn emulate(
        &self,
        arch: &mut Architecture,
        instruction: &Instruction,
    ) -> Result<ControlFlow> {
        match instruction.opcode() {
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Bsh
            | OpCode::And
            | OpCode::Or
            | OpCode::Xor => binary_op!(self, arch, instruction),
            OpCode::Ldm => {
                let address = arch.get(self.operand(instruction, Slot::A)?);
                let cell = arch.memory_cell(address)?;
                let value = arch.get(cell);
                arch.set(self.operand(instruction, Slot::Dst)?, value)?;
            }
            OpCode::Stm => {
                let value = arch.get(self.operand(instruction, Slot::A)?);
                let address = arch.get(self.operand(instruction, Slot::Dst)?);
                let cell = arch.memory_cell(address)?;
                arch.set(cell, value)?;
            }
            OpCode::Str => {
                let value = arch.get(self.operand(instruction, Slot::A)?);
                arch.set(self.operand(instruction, Slot::Dst)?, value)?;
            }
            OpCode::Bisz => {
                let value = arch.get(self.operand(instruction, Slot::A)?);
                arch.set(
                    self.operand(instruction, Slot::Dst)?,
                    Value::from(value == 0),
                )?;
            }
            OpCode::Jcc => {
                let condition = arch.get(self.operand(instruction, Slot::A)?);
                if condition != 0 {
                    let target = arch.get(self.operand(instruction, Slot::Dst)?);
                    arch.set(arch.pc(), target)?;
                    return Ok(ControlFlow::Jump(target));
                }
            }
            OpCode::Undef => {
                arch.set(self.operand(instruction, Slot::Dst)?, 0)?;
            }
            OpCode::Nop => (),
            OpCode::Unkn => return Ok(ControlFlow::Halt),
        }

        Ok(ControlFlow::NextInstruction)
    }
}
