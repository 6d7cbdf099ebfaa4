use reil::{OpCode, Slot};

use crate::arch;
use crate::decode::*;

use super::{input_arch, test_arch};

#[test]
fn decode_program() -> Result<()> {
    let (mut arch, _) = test_arch();
    let program = decode(
        &mut arch,
        r"
        STR %1, , A
        loop:
        ADD A, [1], A
        JCC A, , :loop
        UNKN , ,
        ",
    )?;

    let text = program.iter().map(ToString::to_string).collect::<Vec<_>>();
    assert_eq!(
        text,
        ["STR %1, , A", "ADD A, [1], A", "JCC A, , %1", "UNKN , ,"]
    );

    // The label resolves to the same constant operand as the literal
    assert_eq!(
        program[0].operand_id(Slot::A),
        program[2].operand_id(Slot::Dst)
    );
    let cell = arch.memory_cell(1).expect("cell exists");
    assert_eq!(program[1].operand_id(Slot::B), Some(cell));
    assert_eq!(program[3].opcode(), OpCode::Unkn);
    Ok(())
}

#[test]
fn instruction_display() {
    assert_eq!(Instruction::unknown().to_string(), "UNKN , ,");
}

#[test]
fn undefined_label() {
    let (mut arch, _) = test_arch();
    let err = decode(&mut arch, "JCC A, , :missing").expect_err("label is undefined");
    assert_eq!(
        err,
        Error::UndefinedLabel {
            line: 1,
            label: "missing".to_owned()
        }
    );
}

#[test]
fn unresolved_operands() {
    let (mut arch, _) = test_arch();

    let err = decode(&mut arch, "STR %1, , D").expect_err("register is undefined");
    assert_eq!(
        err,
        Error::Operand {
            line: 1,
            source: arch::Error::UnknownRegister("D".to_owned())
        }
    );

    let err = decode(&mut arch, "NOP\nLDM [4], , A").expect_err("address out of range");
    assert_eq!(
        err,
        Error::Operand {
            line: 2,
            source: arch::Error::MemoryOutOfRange {
                address: 4,
                size: 4
            }
        }
    );

    let err = decode(&mut arch, "STR IN0, , A").expect_err("no input channels");
    assert!(matches!(
        err,
        Error::Operand {
            source: arch::Error::InputOutOfRange { .. },
            ..
        }
    ));
}

#[test]
fn not_writable() {
    let mut arch = input_arch(vec![]);

    let err = decode(&mut arch, "STR %1, , IN0").expect_err("input is read-only");
    assert_eq!(
        err,
        Error::NotWritable {
            line: 1,
            opcode: OpCode::Str,
            operand: "IN0".to_owned()
        }
    );

    let err = decode(&mut arch, "ADD A, B, %2").expect_err("constant is read-only");
    assert!(matches!(err, Error::NotWritable { .. }));

    // The destination of a store or jump is read, not written
    decode(&mut arch, "STM A, , %2\nJCC A, , %0").expect("destination is an address");
}

#[test]
fn syntax_error() {
    let (mut arch, _) = test_arch();
    let err = decode(&mut arch, "FOO A, B, C").expect_err("unknown mnemonic");
    assert_eq!(
        err,
        Error::Syntax(reil::Error::UnknownMnemonic {
            line: 1,
            mnemonic: "FOO".to_owned()
        })
    );
}
