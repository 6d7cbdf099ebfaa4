use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use reil_vm::arch::{ArchConfig, Architecture, Value};
use reil_vm::dependency::DependencyTracker;
use reil_vm::processor::Vm;
use tracing_subscriber::EnvFilter;

pub fn initialize_logger() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Values written to output channels as `(channel, value)`.
pub type Outputs = Rc<RefCell<Vec<(usize, Value)>>>;

/// Architecture with registers `A` and `B`, a small memory and one output channel. Input channel
/// `n` always yields `inputs[n]`.
pub fn architecture(inputs: Vec<Value>) -> (Architecture, Outputs) {
    let outputs = Outputs::default();
    let sink = Rc::clone(&outputs);
    let arch = Architecture::new(
        ArchConfig::new()
            .with_registers(["A", "B"])
            .with_memory(16, Vec::new())
            .with_inputs(inputs.len(), move |channel, _| {
                inputs.get(channel).copied().unwrap_or_default()
            })
            .with_outputs(1, move |channel, value| {
                sink.borrow_mut().push((channel, value))
            }),
    )
    .expect("failed to build architecture");

    (arch, outputs)
}

/// Decode `program` and run it to completion while tracking dependencies.
pub fn run_tracked(inputs: Vec<Value>, program: &str) -> (Vm<DependencyTracker>, Outputs) {
    initialize_logger();

    let (arch, outputs) = architecture(inputs);
    let mut vm = Vm::with_observer(arch, DependencyTracker::new());
    vm.load_text(program).expect("failed to decode program");
    vm.run().expect("failed to run program");
    (vm, outputs)
}
