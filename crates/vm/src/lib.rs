//! This crate executes programs written in a small REIL-like register transfer language and
//! explains how the values it computes were derived.
//!
//! ### Execution
//!
//! An [arch::Architecture] owns every operand a program can refer to: the program counter, named
//! registers, memory cells and input/output channels. Programs are decoded against an
//! architecture with [decode::decode] and executed one instruction at a time by a
//! [processor::Vm]. The VM notifies a [processor::Observer] around every step.
//!
//! ### Dependency tracking
//!
//! The [dependency::DependencyTracker] is an observer which binds each operand to a node of a
//! dependency graph describing how its current value was computed. Constant computations are
//! folded, copies share nodes and repeated loop iterations which reach the same state share
//! nodes as well. The graph reachable from a set of root operands can be rendered with any
//! [depgraph::DependencySerializer].

/// Operands and the architecture owning them.
pub mod arch;

/// Binding of parsed programs to architecture operands.
pub mod decode;

/// Dependency graph construction during execution.
pub mod dependency;

/// Instruction semantics.
pub mod emulator;

/// Step driver and the observer interface.
pub mod processor;

/// Observer recording architecture snapshots around every step.
pub mod trace;
