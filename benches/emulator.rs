use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use depgraph::text::TextSerializer;
use reil_vm::arch::{ArchConfig, Architecture};
use reil_vm::decode::{decode, Instruction};
use reil_vm::dependency::DependencyTracker;
use reil_vm::emulator::Emulator;
use reil_vm::processor::{Observer, Vm};

/// Counts down from 1000 while accumulating into `B` through memory.
const COUNTDOWN: &str = r"
    STR IN0, , A
    loop:
    ADD B, A, B
    STM B, , %0
    LDM %0, , B
    SUB A, %1, A
    JCC A, , :loop
    UNKN , ,
";

fn architecture() -> Architecture {
    Architecture::new(
        ArchConfig::new()
            .with_registers(["A", "B"])
            .with_memory(4, Vec::new())
            .with_inputs(1, |_, _| 1000),
    )
    .expect("failed to build architecture")
}

fn setup<O: Observer>(observer: O) -> Vm<O> {
    let mut vm = Vm::with_observer(architecture(), observer);
    vm.load_text(COUNTDOWN).expect("failed to decode program");
    vm
}

fn setup_instruction(text: &str) -> (Architecture, Instruction) {
    let mut arch = architecture();
    let instruction = decode(&mut arch, text)
        .expect("failed to decode instruction")
        .pop()
        .expect("missing instruction");
    (arch, instruction)
}

fn standard_emulator(c: &mut Criterion) {
    let emulator = Emulator::new();

    for (name, text) in [
        ("add", "ADD A, %3, B"),
        ("divide", "DIV %1000, %7, B"),
        ("shift", "BSH %-1, %12, B"),
        ("load", "LDM %2, , B"),
        ("store", "STM %12, , %2"),
    ] {
        c.bench_function(name, |b| {
            b.iter_batched(
                || setup_instruction(text),
                |mut data| {
                    emulator
                        .emulate(&mut data.0, &data.1)
                        .expect("failed to emulate instruction")
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn countdown(c: &mut Criterion) {
    c.bench_function("countdown", |b| {
        b.iter_batched(
            || setup(()),
            |mut vm| vm.run().expect("failed to run program"),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("countdown_tracked", |b| {
        b.iter_batched(
            || setup(DependencyTracker::new()),
            |mut vm| vm.run().expect("failed to run program"),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("countdown_serialize", |b| {
        b.iter_batched(
            || {
                let mut vm = setup(DependencyTracker::new());
                vm.run().expect("failed to run program");
                vm
            },
            |mut vm| {
                let (arch, tracker) = vm.parts_mut();
                let roots = [arch.pc(), arch.register("B").expect("invalid register")];
                let mut serializer = TextSerializer::new();
                tracker.serialize(arch, &mut serializer, &roots);
                serializer.into_lines()
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, standard_emulator, countdown);
criterion_main!(benches);
