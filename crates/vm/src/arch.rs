use std::collections::{BTreeMap, HashMap};

use crate::dependency::DependencySlot;

/// The numeric domain of every operand.
pub type Value = i64;

/// Callback producing the value of an input channel. The second argument is `true` when the value
/// is only being peeked at and must not be consumed.
pub type InputSource = Box<dyn FnMut(usize, bool) -> Value>;

/// Callback receiving every value written to an output channel.
pub type OutputSink = Box<dyn FnMut(usize, Value)>;

/// Name of the program counter register.
pub const PC: &str = "PC";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("register {0:?} is declared more than once")]
    DuplicateRegister(String),

    /// The program counter is always present and cannot be declared.
    #[error("register name {0:?} is reserved")]
    ReservedRegister(String),

    #[error("initial memory contents ({contents} cells) exceed memory size {size}")]
    MemoryContents { contents: usize, size: usize },

    #[error("unknown register {0:?}")]
    UnknownRegister(String),

    #[error("memory address {address} is outside memory of size {size}")]
    MemoryOutOfRange { address: Value, size: usize },

    #[error("input channel {channel} is not configured, {count} available")]
    InputOutOfRange { channel: usize, count: usize },

    #[error("output channel {channel} is not configured, {count} available")]
    OutputOutOfRange { channel: usize, count: usize },

    #[error("operand {0} is read-only")]
    ReadOnly(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Handle to an operand owned by an [Architecture].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperandId(usize);

impl OperandId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// A named register, including the program counter.
    Register(String),

    /// An immediate value. Constants are read-only.
    Constant(Value),

    /// The memory cell at the given address.
    Memory(usize),

    /// An input channel. Reading consumes a value from the input source.
    Input(usize),

    /// An output channel. Writing emits the value to the output sink.
    Output(usize),
}

/// Identifies a kind of [Facet]. An operand holds at most one facet per key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FacetKey {
    Dependency,
}

/// An optional capability attached to an operand without changing the operand itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facet {
    /// The dependency node currently bound to the operand.
    Dependency(DependencySlot),
}

impl Facet {
    pub fn key(&self) -> FacetKey {
        match self {
            Facet::Dependency(_) => FacetKey::Dependency,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Facets {
    dependency: Option<DependencySlot>,
}

/// A value slot read and written by instructions.
#[derive(Debug, Clone)]
pub struct Operand {
    kind: OperandKind,

    /// Current value. For input channels this is the last consumed value and for output channels
    /// the last written value.
    value: Value,
    written: bool,
    facets: Facets,
}

impl Operand {
    fn new(kind: OperandKind, value: Value) -> Self {
        Self {
            kind,
            value,
            written: false,
            facets: Default::default(),
        }
    }

    pub fn kind(&self) -> &OperandKind {
        &self.kind
    }

    pub fn name(&self) -> String {
        self.to_string()
    }

    /// The value without side effects. Input channels report the last consumed value.
    pub fn value(&self) -> Value {
        self.value
    }

    /// Value fingerprint used when recording dependency snapshots.
    pub fn hash_code(&self) -> Value {
        match self.kind {
            OperandKind::Output(_) => 0,
            _ => self.value,
        }
    }

    /// The value is not purely a function of prior architecture state.
    pub fn is_special(&self) -> bool {
        matches!(self.kind, OperandKind::Input(_))
    }

    pub fn is_writable(&self) -> bool {
        matches!(
            self.kind,
            OperandKind::Register(_) | OperandKind::Memory(_) | OperandKind::Output(_)
        )
    }

    /// The current value is known before execution begins. Registers and memory start from known
    /// contents, input channels never are, and an output channel stops being constant once a
    /// value has been written through it.
    pub fn is_constant(&self) -> bool {
        match self.kind {
            OperandKind::Register(_) | OperandKind::Constant(_) | OperandKind::Memory(_) => true,
            OperandKind::Input(_) => false,
            OperandKind::Output(_) => !self.written,
        }
    }

    /// Attach a facet, returning the facet previously attached under the same key.
    pub fn attach(&mut self, facet: Facet) -> Option<Facet> {
        match facet {
            Facet::Dependency(slot) => self.facets.dependency.replace(slot).map(Facet::Dependency),
        }
    }

    pub fn facet(&self, key: FacetKey) -> Option<Facet> {
        match key {
            FacetKey::Dependency => self.facets.dependency.clone().map(Facet::Dependency),
        }
    }

    pub fn detach(&mut self, key: FacetKey) -> Option<Facet> {
        match key {
            FacetKey::Dependency => self.facets.dependency.take().map(Facet::Dependency),
        }
    }

    /// Shortcut for the [FacetKey::Dependency] facet.
    pub fn dependency(&self) -> Option<&DependencySlot> {
        self.facets.dependency.as_ref()
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            OperandKind::Register(name) => f.write_str(name),
            OperandKind::Constant(value) => write!(f, "%{value}"),
            OperandKind::Memory(address) => write!(f, "[{address}]"),
            OperandKind::Input(channel) => write!(f, "IN{channel}"),
            OperandKind::Output(channel) => write!(f, "OUT{channel}"),
        }
    }
}

/// Construction parameters for an [Architecture].
#[derive(Default)]
pub struct ArchConfig {
    pub registers: Vec<String>,
    pub memory_size: usize,

    /// Initial memory contents starting at address 0. Remaining cells start at 0.
    pub memory: Vec<Value>,
    pub inputs: usize,
    pub outputs: usize,
    input_source: Option<InputSource>,
    output_sink: Option<OutputSink>,
}

impl std::fmt::Debug for ArchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchConfig")
            .field("registers", &self.registers)
            .field("memory_size", &self.memory_size)
            .field("memory", &self.memory)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl ArchConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_registers<S: Into<String>>(mut self, registers: impl IntoIterator<Item = S>) -> Self {
        self.registers.extend(registers.into_iter().map(Into::into));
        self
    }

    pub fn with_memory(mut self, size: usize, contents: impl IntoIterator<Item = Value>) -> Self {
        self.memory_size = size;
        self.memory = contents.into_iter().collect();
        self
    }

    pub fn with_inputs(
        mut self,
        channels: usize,
        source: impl FnMut(usize, bool) -> Value + 'static,
    ) -> Self {
        self.inputs = channels;
        self.input_source = Some(Box::new(source));
        self
    }

    pub fn with_outputs(mut self, channels: usize, sink: impl FnMut(usize, Value) + 'static) -> Self {
        self.outputs = channels;
        self.output_sink = Some(Box::new(sink));
        self
    }
}

/// The operands of a machine: the program counter, named registers, memory cells and I/O
/// channels. Constants referenced by a program are interned here as well so that every
/// instruction operand is an [OperandId].
pub struct Architecture {
    operands: Vec<Operand>,
    pc: OperandId,
    registers: BTreeMap<String, OperandId>,
    memory: Vec<OperandId>,
    inputs: Vec<OperandId>,
    outputs: Vec<OperandId>,
    constants: HashMap<Value, OperandId>,
    input_source: InputSource,
    output_sink: OutputSink,
}

impl std::fmt::Debug for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Architecture")
            .field("operands", &self.operands)
            .finish_non_exhaustive()
    }
}

impl Architecture {
    pub fn new(config: ArchConfig) -> Result<Self> {
        if config.memory.len() > config.memory_size {
            return Err(Error::MemoryContents {
                contents: config.memory.len(),
                size: config.memory_size,
            });
        }

        let mut operands = Vec::new();
        let mut push = |kind: OperandKind, value: Value| {
            operands.push(Operand::new(kind, value));
            OperandId(operands.len() - 1)
        };

        let pc = push(OperandKind::Register(PC.to_owned()), 0);
        let mut registers = BTreeMap::from([(PC.to_owned(), pc)]);
        for name in config.registers {
            if name == PC {
                return Err(Error::ReservedRegister(name));
            }

            if registers.contains_key(&name) {
                return Err(Error::DuplicateRegister(name));
            }

            let id = push(OperandKind::Register(name.clone()), 0);
            registers.insert(name, id);
        }

        let memory = (0..config.memory_size)
            .map(|address| {
                let value = config.memory.get(address).copied().unwrap_or_default();
                push(OperandKind::Memory(address), value)
            })
            .collect();
        let inputs = (0..config.inputs)
            .map(|channel| push(OperandKind::Input(channel), 0))
            .collect();
        let outputs = (0..config.outputs)
            .map(|channel| push(OperandKind::Output(channel), 0))
            .collect();

        Ok(Self {
            operands,
            pc,
            registers,
            memory,
            inputs,
            outputs,
            constants: Default::default(),
            input_source: config.input_source.unwrap_or_else(|| Box::new(|_, _| 0)),
            output_sink: config.output_sink.unwrap_or_else(|| Box::new(|_, _| ())),
        })
    }

    pub fn pc(&self) -> OperandId {
        self.pc
    }

    pub fn pc_value(&self) -> Value {
        self.operand(self.pc).value
    }

    pub fn register(&self, name: &str) -> Result<OperandId> {
        self.registers
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownRegister(name.to_owned()))
    }

    pub fn memory_cell(&self, address: Value) -> Result<OperandId> {
        usize::try_from(address)
            .ok()
            .and_then(|address| self.memory.get(address))
            .copied()
            .ok_or(Error::MemoryOutOfRange {
                address,
                size: self.memory.len(),
            })
    }

    pub fn input(&self, channel: usize) -> Result<OperandId> {
        self.inputs
            .get(channel)
            .copied()
            .ok_or(Error::InputOutOfRange {
                channel,
                count: self.inputs.len(),
            })
    }

    pub fn output(&self, channel: usize) -> Result<OperandId> {
        self.outputs
            .get(channel)
            .copied()
            .ok_or(Error::OutputOutOfRange {
                channel,
                count: self.outputs.len(),
            })
    }

    /// The constant operand holding `value`, created on first use.
    pub fn constant(&mut self, value: Value) -> OperandId {
        if let Some(&id) = self.constants.get(&value) {
            return id;
        }

        self.operands
            .push(Operand::new(OperandKind::Constant(value), value));
        let id = OperandId(self.operands.len() - 1);
        self.constants.insert(value, id);
        id
    }

    pub fn memory_size(&self) -> usize {
        self.memory.len()
    }

    pub fn operand(&self, id: OperandId) -> &Operand {
        &self.operands[id.0]
    }

    pub fn operand_mut(&mut self, id: OperandId) -> &mut Operand {
        &mut self.operands[id.0]
    }

    pub fn operands(&self) -> impl Iterator<Item = (OperandId, &Operand)> {
        self.operands
            .iter()
            .enumerate()
            .map(|(index, operand)| (OperandId(index), operand))
    }

    /// Read an operand. Reading an input channel consumes the next input value, after which any
    /// dependency previously bound to the channel no longer describes it.
    pub fn get(&mut self, id: OperandId) -> Value {
        let operand = &mut self.operands[id.0];
        if let OperandKind::Input(channel) = operand.kind {
            operand.value = (self.input_source)(channel, false);
            operand.detach(FacetKey::Dependency);
        }

        operand.value
    }

    /// Read an operand without consuming input.
    pub fn peek(&mut self, id: OperandId) -> Value {
        let operand = &self.operands[id.0];
        match operand.kind {
            OperandKind::Input(channel) => (self.input_source)(channel, true),
            _ => operand.value,
        }
    }

    /// Write an operand. Writing an output channel emits the value.
    pub fn set(&mut self, id: OperandId, value: Value) -> Result<()> {
        let operand = &mut self.operands[id.0];
        match operand.kind {
            OperandKind::Register(_) | OperandKind::Memory(_) => operand.value = value,
            OperandKind::Output(channel) => {
                operand.value = value;
                operand.written = true;
                (self.output_sink)(channel, value);
            }
            OperandKind::Constant(_) | OperandKind::Input(_) => {
                return Err(Error::ReadOnly(operand.name()))
            }
        }

        Ok(())
    }

    /// Remove the facet with the given key from every operand.
    pub fn detach_all(&mut self, key: FacetKey) {
        for operand in self.operands.iter_mut() {
            operand.detach(key);
        }
    }

    /// Snapshot of every architectural operand value keyed by operand name. Interned constants
    /// are not included.
    pub fn dump(&self) -> BTreeMap<String, Value> {
        self.operands
            .iter()
            .filter(|operand| !matches!(operand.kind, OperandKind::Constant(_)))
            .map(|operand| (operand.name(), operand.value))
            .collect()
    }
}
