use std::collections::BTreeMap;

use crate::arch::{Architecture, Operand, Value};
use crate::decode::Instruction;
use crate::processor::Observer;

/// Record of a single executed step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceItem {
    /// Program counter the instruction was fetched from.
    pub pc: Value,
    pub instruction: String,
    pub running: bool,
    pub before: BTreeMap<String, Value>,
    pub after: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct TraceLog {
    items: Vec<TraceItem>,
    current: TraceItem,
}

impl TraceLog {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn items(&self) -> &[TraceItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<TraceItem> {
        self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl Observer for TraceLog {
    fn fetched(&mut self, pc: &Operand) {
        self.current = TraceItem {
            pc: pc.value(),
            ..Default::default()
        };
    }

    fn decoded(&mut self, instruction: &Instruction) {
        self.current.instruction = instruction.to_string();
    }

    fn before_execute(&mut self, arch: &mut Architecture, _instruction: &Instruction) {
        self.current.before = arch.dump();
    }

    fn after_execute(&mut self, arch: &mut Architecture, running: bool) {
        self.current.running = running;
        self.current.after = arch.dump();
        self.items.push(std::mem::take(&mut self.current));
    }
}
