//! Tracks how every operand value was derived while a program executes.
//!
//! The [DependencyTracker] observes each step of a [Vm](crate::processor::Vm). Before an
//! instruction takes effect the tracker inspects the dependency nodes bound to its sources and
//! decides, using the simplification rules, how the destination will be derived. The decision is
//! queued as a [PendingBinding] and only applied once the instruction has executed, at which point
//! the value of the destination is final and can be recorded as the snapshot of a new node.
//!
//! Derived nodes are shared whenever an equivalent derivation was recorded before within the same
//! branch context. Every conditional branch on a non-constant condition extends the context with
//! the state of the operands touched since the previous branch, so loop iterations which reach an
//! identical state collapse onto the same nodes.

use std::collections::BTreeSet;

use depgraph::DependencySerializer;
use reil::{OpCode, Slot};
use tracing::debug;

use crate::arch::{Architecture, Facet, FacetKey, OperandId, OperandKind, Value};
use crate::decode::Instruction;
use crate::processor::Observer;

mod graph;
mod rules;

pub use graph::{Derivation, DependencyGraph, DependencyNode, LinkSource, NodeId};

use rules::{Rule, Source};

/// Facet binding an operand to the dependency node describing its current value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DependencySlot {
    node: NodeId,
}

impl DependencySlot {
    pub fn new(node: NodeId) -> Self {
        Self { node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// A binding decided before an instruction executes and applied after it has executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingBinding {
    /// Bind the target to an existing node.
    Alias { target: OperandId, node: NodeId },

    /// Bind the target to the node derived by `label` from `sources`. The node value is the
    /// value of the target once the instruction has executed.
    Link {
        target: OperandId,
        context: String,
        label: String,
        sources: Vec<LinkSource>,
    },
}

/// Branch history under which derivations are recorded. Derivations are only shared between
/// identical contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BranchContext {
    tag: String,
}

impl BranchContext {
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

#[derive(Debug, Default)]
pub struct DependencyTracker {
    graph: DependencyGraph,
    pending: Vec<PendingBinding>,
    context: BranchContext,

    /// Operands read or written since the last recorded branch.
    dirty: BTreeSet<OperandId>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn context(&self) -> &BranchContext {
        &self.context
    }

    pub fn pending(&self) -> &[PendingBinding] {
        &self.pending
    }

    /// Forget every recorded node and unbind all operands of the architecture.
    pub fn reset(&mut self, arch: &mut Architecture) {
        arch.detach_all(FacetKey::Dependency);
        self.graph.clear();
        self.pending.clear();
        self.context = Default::default();
        self.dirty.clear();
        debug!("dependency tracking reset");
    }

    /// The node describing the current value of an operand. Operands without a bound node are
    /// described by a leaf: a constant node when the value is known ahead of execution and an
    /// operand-named leaf otherwise.
    pub fn node_of(&mut self, arch: &Architecture, operand: OperandId) -> NodeId {
        let operand = arch.operand(operand);
        match operand.dependency() {
            Some(slot) => slot.node(),
            None if operand.is_constant() => self.graph.constant(operand.hash_code()),
            None => self
                .graph
                .leaf(&operand.name(), operand.hash_code(), operand.is_special()),
        }
    }

    fn source(&mut self, arch: &mut Architecture, id: OperandId) -> Source {
        let value = arch.peek(id);
        let operand = arch.operand(id);
        let node = match operand.dependency() {
            Some(slot) => slot.node(),
            None if operand.is_constant() => self.graph.constant(value),
            None => self
                .graph
                .leaf(&operand.name(), value, operand.is_special()),
        };

        Source {
            operand: Some(id),
            name: operand.name(),
            node,
            value,
            constant: self.graph.node(node).is_constant(),
        }
    }

    fn touch(&mut self, arch: &Architecture, operand: Option<OperandId>) {
        if let Some(operand) = operand {
            if !matches!(arch.operand(operand).kind(), OperandKind::Constant(_)) {
                self.dirty.insert(operand);
            }
        }
    }

    fn link(&mut self, arch: &Architecture, target: OperandId, label: String, sources: &[&Source]) {
        for source in sources {
            self.touch(arch, source.operand);
        }
        self.touch(arch, Some(target));

        self.pending.push(PendingBinding::Link {
            target,
            context: self.context.tag.clone(),
            label,
            sources: sources
                .iter()
                .map(|source| LinkSource {
                    operand: source.name.clone(),
                    node: source.node,
                })
                .collect(),
        });
    }

    fn alias(&mut self, arch: &Architecture, target: OperandId, source: &Source) {
        // Output channels keep the copy visible so that the emitted value has a derivation
        if matches!(arch.operand(target).kind(), OperandKind::Output(_)) {
            self.link(arch, target, "copy".to_owned(), &[source]);
            return;
        }

        self.touch(arch, source.operand);
        self.touch(arch, Some(target));
        self.pending.push(PendingBinding::Alias {
            target,
            node: source.node,
        });
    }

    fn fold(&mut self, arch: &Architecture, target: OperandId, value: Value) {
        let node = self.graph.constant(value);
        let source = Source {
            operand: None,
            name: self.graph.node(node).name().to_owned(),
            node,
            value,
            constant: true,
        };
        self.alias(arch, target, &source);
    }

    fn apply(&mut self, arch: &Architecture, target: OperandId, rule: Rule<'_>) {
        match rule {
            Rule::Alias(source) => self.alias(arch, target, source),
            Rule::Fold(value) => self.fold(arch, target, value),
            Rule::Link(label, sources) => self.link(arch, target, label, &sources),
            Rule::Unchanged => (),
        }
    }

    /// Record the current branch in the context and start collecting a new set of operands.
    fn branch(&mut self, arch: &Architecture, taken: bool) {
        let mut state = self
            .dirty
            .iter()
            .map(|&id| {
                let operand = arch.operand(id);
                let (value, shape) = match operand.dependency() {
                    Some(slot) => {
                        let node = self.graph.node(slot.node());
                        (node.value(), node.shape())
                    }
                    None if operand.is_constant() => {
                        (operand.hash_code(), format!("%{}", operand.hash_code()))
                    }
                    None => (operand.hash_code(), operand.name()),
                };
                format!("{}={value}:{shape}", operand.name())
            })
            .collect::<Vec<_>>();
        state.sort();

        self.context.tag = format!(
            "{}@{}|{}",
            if taken { "Y" } else { "N" },
            arch.pc_value(),
            state.join(";")
        );
        self.dirty.clear();
        debug!(context = %self.context.tag, "branch recorded");
    }

    /// Decide how the instruction affects dependencies. Must be invoked before the instruction
    /// takes effect; the decision is applied by [Self::flush].
    pub fn prepare(&mut self, arch: &mut Architecture, instruction: &Instruction) {
        self.pending.clear();

        let a = instruction.operand_id(Slot::A);
        let b = instruction.operand_id(Slot::B);
        let dst = instruction.operand_id(Slot::Dst);

        match (instruction.opcode(), a, b, dst) {
            (opcode, Some(a), Some(b), Some(dst)) if opcode.is_binary() => {
                let a = self.source(arch, a);
                let b = self.source(arch, b);
                let rule = rules::binary(opcode, &a, &b);
                self.apply(arch, dst, rule);
            }
            (OpCode::Ldm, Some(a), _, Some(dst)) => {
                let address = arch.peek(a);
                if let Ok(cell) = arch.memory_cell(address) {
                    let source = self.source(arch, cell);
                    self.alias(arch, dst, &source);
                }
            }
            (OpCode::Stm, Some(a), _, Some(dst)) => {
                let address = arch.peek(dst);
                if let Ok(cell) = arch.memory_cell(address) {
                    let source = self.source(arch, a);
                    self.alias(arch, cell, &source);
                }
            }
            (OpCode::Str, Some(a), _, Some(dst)) => {
                let source = self.source(arch, a);
                self.alias(arch, dst, &source);
            }
            (OpCode::Bisz, Some(a), _, Some(dst)) => {
                let source = self.source(arch, a);
                let rule = rules::bisz(&source);
                self.apply(arch, dst, rule);
            }
            (OpCode::Jcc, Some(a), _, Some(_)) => {
                let condition = self.source(arch, a);
                if !condition.constant {
                    let taken = condition.value != 0;
                    let pc = arch.pc();
                    let old_pc = self.source(arch, pc);
                    let label = if taken { "jcc (Y)" } else { "jcc (N)" };
                    self.link(arch, pc, label.to_owned(), &[&old_pc, &condition]);
                    self.branch(arch, taken);
                }
            }
            (OpCode::Undef, _, _, Some(dst)) => {
                self.link(arch, dst, "undef".to_owned(), &[]);
            }
            _ => (),
        }
    }

    /// Apply the bindings decided by [Self::prepare]. Must be invoked once the instruction has
    /// taken effect.
    pub fn flush(&mut self, arch: &mut Architecture) {
        for binding in self.pending.drain(..) {
            let (target, node) = match binding {
                PendingBinding::Alias { target, node } => (target, node),
                PendingBinding::Link {
                    target,
                    context,
                    label,
                    sources,
                } => {
                    let operand = arch.operand(target);
                    let node = self.graph.link(
                        &context,
                        &operand.name(),
                        &label,
                        &sources,
                        operand.hash_code(),
                    );
                    (target, node)
                }
            };

            arch.operand_mut(target)
                .attach(Facet::Dependency(DependencySlot::new(node)));
        }
    }

    /// Walk the nodes reachable from the nodes of `roots`, sources first, and feed them to the
    /// serializer.
    pub fn serialize(
        &mut self,
        arch: &Architecture,
        serializer: &mut (impl DependencySerializer + ?Sized),
        roots: &[OperandId],
    ) {
        let roots = roots
            .iter()
            .map(|&root| self.node_of(arch, root))
            .collect::<Vec<_>>();

        for &root in &roots {
            serializer.add_root(self.graph.node(root));
        }

        for id in self.graph.walk(&roots) {
            let node = self.graph.node(id);
            serializer.new_entry(node);
            if let Some(derivation) = node.derivation() {
                serializer.new_set(derivation.label());
                for &source in derivation.sources() {
                    serializer.add_dep(self.graph.node(source));
                }
                serializer.end_set();
            }
            serializer.end_entry();
        }
    }
}

impl Observer for DependencyTracker {
    fn before_execute(&mut self, arch: &mut Architecture, instruction: &Instruction) {
        self.prepare(arch, instruction);
    }

    fn after_execute(&mut self, arch: &mut Architecture, _running: bool) {
        self.flush(arch);
    }
}
