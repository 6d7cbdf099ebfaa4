use reil::OpCode;

use crate::arch::{Architecture, Operand, Value};
use crate::decode::Instruction;
use crate::emulator::{Error, Result};
use crate::processor::*;

use super::test_arch;

/// Records the sequence of hooks invoked by the processor.
#[derive(Default, Debug)]
struct Recorder {
    events: Vec<String>,
}

impl Observer for Recorder {
    fn fetched(&mut self, pc: &Operand) {
        self.events.push(format!("fetched {}", pc.value()));
    }

    fn decoded(&mut self, instruction: &Instruction) {
        self.events.push(format!("decoded {instruction}"));
    }

    fn before_execute(&mut self, arch: &mut Architecture, _instruction: &Instruction) {
        self.events.push(format!("before {}", arch.pc_value()));
    }

    fn after_execute(&mut self, arch: &mut Architecture, running: bool) {
        self.events
            .push(format!("after {} {running}", arch.pc_value()));
    }
}

fn register(vm: &Vm<impl Observer>, name: &str) -> Value {
    let id = vm.arch().register(name).expect("register exists");
    vm.arch().operand(id).value()
}

#[test]
fn observer_hooks() -> Result<()> {
    let (arch, _) = test_arch();
    let mut vm = Vm::with_observer(arch, Recorder::default());
    vm.load_text("STR %1, , A").expect("valid program");

    assert!(vm.step()?);
    assert!(!vm.step()?);
    assert_eq!(
        vm.observer().events,
        [
            "fetched 0",
            "decoded STR %1, , A",
            "before 0",
            "after 1 true",
            "fetched 1",
            "decoded UNKN , ,",
            "before 1",
            "after 1 false",
        ]
    );
    assert_eq!(vm.steps(), 2);
    Ok(())
}

#[test]
fn composed_observers() -> Result<()> {
    let (arch, _) = test_arch();
    let mut second = Recorder::default();
    let mut vm = Vm::with_observer(arch, (Recorder::default(), &mut second));
    vm.load_text("NOP").expect("valid program");
    vm.run()?;

    let (_, (first, _)) = vm.into_parts();
    assert_eq!(first.events.len(), 8);
    assert_eq!(first.events, second.events);
    Ok(())
}

#[test]
fn run_to_completion() -> Result<()> {
    let (arch, emitted) = test_arch();
    let mut vm = Vm::new(arch);
    vm.load_text(
        r"
        STR %1, , A
        STR %2, , B
        ADD A, B, A
        STR A, , OUT0
        UNKN , ,
        ",
    )
    .expect("valid program");

    assert_eq!(vm.run()?, 5);
    assert_eq!(register(&vm, "A"), 3);
    assert_eq!(vm.arch().pc_value(), 4);
    assert_eq!(*emitted.borrow(), vec![(0, 3)]);

    // Halting is idempotent
    assert!(!vm.step()?);
    assert_eq!(vm.arch().pc_value(), 4);
    Ok(())
}

#[test]
fn fetch_past_end_halts() -> Result<()> {
    let (arch, _) = test_arch();
    let mut vm = Vm::new(arch);
    vm.load_text("STR %9, , PC").expect("valid program");

    assert!(vm.step()?);
    assert_eq!(vm.arch().pc_value(), 10);
    assert!(!vm.step()?);
    assert_eq!(vm.arch().pc_value(), 10);

    let (arch, _) = test_arch();
    let mut vm = Vm::new(arch);
    vm.load_text("STR %-5, , PC").expect("valid program");
    assert_eq!(vm.run()?, 2);
    assert_eq!(vm.arch().pc_value(), -4);
    Ok(())
}

#[test]
fn run_for_limits_steps() -> Result<()> {
    let (arch, _) = test_arch();
    let mut vm = Vm::new(arch);
    vm.load_text(
        r"
        loop:
        ADD A, %1, A
        JCC %1, , :loop
        ",
    )
    .expect("valid program");

    assert!(vm.run_for(10)?);
    assert_eq!(vm.steps(), 10);
    assert_eq!(register(&vm, "A"), 5);

    assert!(vm.run_for(0)?);
    assert_eq!(vm.steps(), 10);
    Ok(())
}

#[test]
fn program_counter_advances_by_one() -> Result<()> {
    let programs = [
        "ADD A, %2, B",
        "SUB A, %2, B",
        "MUL A, %2, B",
        "DIV A, %2, B",
        "MOD A, %2, B",
        "BSH A, %2, B",
        "AND A, %2, B",
        "OR A, %2, B",
        "XOR A, %2, B",
        "LDM %1, , B",
        "STM A, , %2",
        "STR A, , B",
        "BISZ A, , B",
        "UNDEF , , B",
        "NOP",
    ];

    for program in programs {
        let (arch, _) = test_arch();
        let mut vm = Vm::new(arch);
        vm.load_text(&format!("STR %3, , A\n{program}"))
            .expect("valid program");
        assert!(vm.step()?);

        let mut before = vm.arch().dump();
        assert!(vm.step()?, "{program}");
        let mut after = vm.arch().dump();

        assert_eq!(after.remove("PC"), Some(2), "{program}");
        before.remove("PC");

        // Only the destination may change
        let changed = before
            .iter()
            .filter(|&(name, value)| after.get(name) != Some(value))
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        let expected = match vm.program()[1].opcode() {
            OpCode::Stm => vec!["[2]"],
            OpCode::Nop => vec![],
            _ => vec!["B"],
        };
        assert!(
            changed.is_empty() || changed == expected,
            "{program}: {changed:?}"
        );
    }

    Ok(())
}

#[test]
fn errors_propagate() {
    let (arch, _) = test_arch();
    let mut vm = Vm::new(arch);
    vm.load_text("DIV %1, A, A").expect("valid program");
    let err = vm.step().expect_err("division by zero");
    assert!(matches!(err, Error::DivisionByZero { .. }));
    assert_eq!(vm.arch().pc_value(), 0);
}
