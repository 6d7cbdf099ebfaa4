//! The opcode of an instruction determines its semantics. Every instruction names up to three
//! operand slots: two sources `a` and `b` and a destination `dst`. Which slots an opcode reads is
//! described by [OperandUsage].

/// A representation of opcodes for IR instructions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum OpCode {
    /// Add two integers: `dst = a + b`.
    Add,

    /// Subtract two integers: `dst = a - b`.
    Sub,

    /// Multiply two integers: `dst = a * b`.
    Mul,

    /// Divide two integers, truncating towards zero: `dst = a / b`.
    Div,

    /// The remainder of integer division: `dst = a mod b`.
    Mod,

    /// Shift `a` right by `b` bits if `b` is positive, otherwise shift `a` left by `-b` bits.
    Bsh,

    /// Bitwise and: `dst = a & b`.
    And,

    /// Bitwise inclusive-or: `dst = a | b`.
    Or,

    /// Bitwise exclusive-or: `dst = a ^ b`.
    Xor,

    /// Load from memory: `dst = memory[a]`.
    Ldm,

    /// Store to memory: `memory[dst] = a`.
    Stm,

    /// Copy a value: `dst = a`.
    Str,

    /// Test for zero: `dst = (a == 0) ? 1 : 0`.
    Bisz,

    /// Jump to `dst` if `a` is not zero.
    Jcc,

    /// Mark the destination as holding an undefined value.
    Undef,

    /// An unknown instruction. Execution halts when one is reached.
    Unkn,

    /// No operation.
    Nop,
}

/// The operand slots read or written by an opcode. A slot that is not used must be left empty in
/// the textual form.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OperandUsage {
    pub a: bool,
    pub b: bool,
    pub dst: bool,

    /// The destination slot is written to directly. This is false for [OpCode::Stm] and
    /// [OpCode::Jcc] since their destination slot is read to obtain an address.
    pub writes_dst: bool,
}

impl OpCode {
    /// All opcodes in declaration order.
    pub const ALL: [OpCode; 17] = [
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::Bsh,
        OpCode::And,
        OpCode::Or,
        OpCode::Xor,
        OpCode::Ldm,
        OpCode::Stm,
        OpCode::Str,
        OpCode::Bisz,
        OpCode::Jcc,
        OpCode::Undef,
        OpCode::Unkn,
        OpCode::Nop,
    ];

    /// The mnemonic used by the textual form.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Bsh => "BSH",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::Xor => "XOR",
            OpCode::Ldm => "LDM",
            OpCode::Stm => "STM",
            OpCode::Str => "STR",
            OpCode::Bisz => "BISZ",
            OpCode::Jcc => "JCC",
            OpCode::Undef => "UNDEF",
            OpCode::Unkn => "UNKN",
            OpCode::Nop => "NOP",
        }
    }

    /// Look up an opcode by its mnemonic. Mnemonics are case sensitive.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|opcode| opcode.mnemonic() == mnemonic)
    }

    /// Binary arithmetic and bitwise operations reading both `a` and `b`.
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Mod
                | OpCode::Bsh
                | OpCode::And
                | OpCode::Or
                | OpCode::Xor
        )
    }

    pub fn operand_usage(&self) -> OperandUsage {
        let (a, b, dst, writes_dst) = match self {
            opcode if opcode.is_binary() => (true, true, true, true),
            OpCode::Ldm | OpCode::Str | OpCode::Bisz => (true, false, true, true),
            OpCode::Stm | OpCode::Jcc => (true, false, true, false),
            OpCode::Undef => (false, false, true, true),
            _ => (false, false, false, false),
        };

        OperandUsage {
            a,
            b,
            dst,
            writes_dst,
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl std::str::FromStr for OpCode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mnemonic(s).ok_or_else(|| crate::Error::UnknownMnemonic {
            line: 0,
            mnemonic: s.to_owned(),
        })
    }
}
