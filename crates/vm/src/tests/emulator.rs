use reil::OpCode;

use crate::arch::{Architecture, Value};
use crate::decode::{decode, Instruction};
use crate::emulator::*;

use super::test_arch;

fn instruction(arch: &mut Architecture, text: &str) -> Instruction {
    decode(arch, text)
        .expect("valid instruction")
        .pop()
        .expect("single instruction")
}

fn register(arch: &Architecture, name: &str) -> Value {
    let id = arch.register(name).expect("register exists");
    arch.operand(id).value()
}

#[test]
fn evaluate_binary() {
    let cases = [
        (OpCode::Add, 3, 4, Some(7)),
        (OpCode::Add, Value::MAX, 1, Some(Value::MIN)),
        (OpCode::Sub, 3, 4, Some(-1)),
        (OpCode::Mul, -3, 4, Some(-12)),
        (OpCode::Div, 7, 2, Some(3)),
        (OpCode::Div, -7, 2, Some(-3)),
        (OpCode::Div, 7, 0, None),
        (OpCode::Div, Value::MIN, -1, Some(Value::MIN)),
        (OpCode::Mod, 7, 3, Some(1)),
        (OpCode::Mod, -7, 3, Some(-1)),
        (OpCode::Mod, 7, 0, None),
        (OpCode::Bsh, 16, 2, Some(4)),
        (OpCode::Bsh, 16, -2, Some(64)),
        (OpCode::And, 0b1100, 0b1010, Some(0b1000)),
        (OpCode::Or, 0b1100, 0b1010, Some(0b1110)),
        (OpCode::Xor, 0b1100, 0b1010, Some(0b0110)),
        (OpCode::Str, 1, 1, None),
    ];

    for (opcode, a, b, expected) in cases {
        assert_eq!(evaluate(opcode, a, b), expected, "{opcode} {a}, {b}");
    }
}

#[test]
fn shift_saturates() {
    assert_eq!(shift(1, 0), 1);
    assert_eq!(shift(-16, 2), -4);
    assert_eq!(shift(5, 64), 0);
    assert_eq!(shift(-5, 64), -1);
    assert_eq!(shift(-5, Value::MAX), -1);
    assert_eq!(shift(5, -64), 0);
    assert_eq!(shift(5, Value::MIN), 0);
    assert_eq!(shift(1, -63), Value::MIN);
}

#[test]
fn binary_ops() -> Result<()> {
    let (mut arch, _) = test_arch();
    let emulator = Emulator::new();

    for (text, expected) in [
        ("ADD %3, %4, A", 7),
        ("SUB A, %10, A", -3),
        ("MUL A, A, A", 9),
        ("DIV A, %2, A", 4),
        ("MOD A, %3, A", 1),
        ("BSH %8, A, A", 4),
        ("AND A, %6, A", 4),
        ("OR A, %3, A", 7),
        ("XOR A, %2, A", 5),
    ] {
        let instruction = instruction(&mut arch, text);
        assert_eq!(
            emulator.emulate(&mut arch, &instruction)?,
            ControlFlow::NextInstruction
        );
        assert_eq!(register(&arch, "A"), expected, "{text}");
    }

    // Only control flow instructions move the program counter
    assert_eq!(arch.pc_value(), 0);
    Ok(())
}

#[test]
fn division_by_zero() {
    let (mut arch, _) = test_arch();
    let emulator = Emulator::new();
    for text in ["DIV %1, A, B", "MOD %1, A, B"] {
        let instruction = instruction(&mut arch, text);
        let err = emulator
            .emulate(&mut arch, &instruction)
            .expect_err("division by zero");
        assert_eq!(
            err,
            Error::DivisionByZero {
                instruction: text.to_owned()
            }
        );
        assert_eq!(register(&arch, "B"), 0);
    }
}

#[test]
fn memory() -> Result<()> {
    let (mut arch, _) = test_arch();
    let emulator = Emulator::new();

    let load = instruction(&mut arch, "LDM %1, , A");
    emulator.emulate(&mut arch, &load)?;
    assert_eq!(register(&arch, "A"), 20);

    let store = instruction(&mut arch, "STM A, , %3");
    emulator.emulate(&mut arch, &store)?;
    let cell = arch.memory_cell(3)?;
    assert_eq!(arch.operand(cell).value(), 20);

    let load = instruction(&mut arch, "LDM %4, , A");
    let err = emulator
        .emulate(&mut arch, &load)
        .expect_err("address out of range");
    assert_eq!(
        err,
        Error::Architecture(crate::arch::Error::MemoryOutOfRange {
            address: 4,
            size: 4
        })
    );
    Ok(())
}

#[test]
fn copy_and_test() -> Result<()> {
    let (mut arch, emitted) = test_arch();
    let emulator = Emulator::new();

    for text in ["STR %5, , A", "BISZ A, , B", "BISZ B, , C", "STR A, , OUT0"] {
        let instruction = instruction(&mut arch, text);
        emulator.emulate(&mut arch, &instruction)?;
    }

    assert_eq!(register(&arch, "A"), 5);
    assert_eq!(register(&arch, "B"), 0);
    assert_eq!(register(&arch, "C"), 1);
    assert_eq!(*emitted.borrow(), vec![(0, 5)]);

    let undef = instruction(&mut arch, "UNDEF , , A");
    emulator.emulate(&mut arch, &undef)?;
    assert_eq!(register(&arch, "A"), 0);
    Ok(())
}

#[test]
fn control_flow() -> Result<()> {
    let (mut arch, _) = test_arch();
    let emulator = Emulator::new();

    let not_taken = instruction(&mut arch, "JCC A, , %7");
    assert_eq!(
        emulator.emulate(&mut arch, &not_taken)?,
        ControlFlow::NextInstruction
    );
    assert_eq!(arch.pc_value(), 0);

    let taken = instruction(&mut arch, "JCC %-1, , %7");
    assert_eq!(emulator.emulate(&mut arch, &taken)?, ControlFlow::Jump(7));
    assert_eq!(arch.pc_value(), 7);

    let before = arch.dump();
    assert_eq!(
        emulator.emulate(&mut arch, &Instruction::unknown())?,
        ControlFlow::Halt
    );
    let nop = instruction(&mut arch, "NOP");
    assert_eq!(
        emulator.emulate(&mut arch, &nop)?,
        ControlFlow::NextInstruction
    );
    assert_eq!(arch.dump(), before);
    Ok(())
}

#[test]
fn missing_operand() {
    let (mut arch, _) = test_arch();
    let instruction = Instruction::new(OpCode::Str, None, None, None);
    let err = Emulator::new()
        .emulate(&mut arch, &instruction)
        .expect_err("operand is missing");
    assert_eq!(
        err,
        Error::MissingOperand {
            instruction: "STR , ,".to_owned(),
            slot: reil::Slot::A
        }
    );
}
