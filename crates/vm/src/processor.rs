use tracing::{debug, info, trace};

use crate::arch::{Architecture, Operand};
use crate::decode::{self, Instruction};
use crate::emulator::{self, ControlFlow, Emulator};

static HALT: Instruction = Instruction::unknown();

/// Hooks invoked by [Vm] around every step. All hooks default to doing nothing. Observers compose
/// as tuples, with `()` as the observer that does nothing.
pub trait Observer {
    /// The program counter is about to be used to fetch the next instruction.
    fn fetched(&mut self, _pc: &Operand) {}

    fn decoded(&mut self, _instruction: &Instruction) {}

    /// Invoked before the instruction has any effect on the architecture.
    fn before_execute(&mut self, _arch: &mut Architecture, _instruction: &Instruction) {}

    /// Invoked once the instruction has taken effect and the program counter has been updated.
    fn after_execute(&mut self, _arch: &mut Architecture, _running: bool) {}
}

impl Observer for () {}

impl<A: Observer, B: Observer> Observer for (A, B) {
    fn fetched(&mut self, pc: &Operand) {
        self.0.fetched(pc);
        self.1.fetched(pc);
    }

    fn decoded(&mut self, instruction: &Instruction) {
        self.0.decoded(instruction);
        self.1.decoded(instruction);
    }

    fn before_execute(&mut self, arch: &mut Architecture, instruction: &Instruction) {
        self.0.before_execute(arch, instruction);
        self.1.before_execute(arch, instruction);
    }

    fn after_execute(&mut self, arch: &mut Architecture, running: bool) {
        self.0.after_execute(arch, running);
        self.1.after_execute(arch, running);
    }
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn fetched(&mut self, pc: &Operand) {
        (**self).fetched(pc);
    }

    fn decoded(&mut self, instruction: &Instruction) {
        (**self).decoded(instruction);
    }

    fn before_execute(&mut self, arch: &mut Architecture, instruction: &Instruction) {
        (**self).before_execute(arch, instruction);
    }

    fn after_execute(&mut self, arch: &mut Architecture, running: bool) {
        (**self).after_execute(arch, running);
    }
}

/// Runs a program against an [Architecture], one instruction per step.
///
/// A step fetches the instruction at the program counter, notifies the observer, executes the
/// instruction and then advances the program counter unless the instruction set it itself.
/// Fetching outside of the program yields an [OpCode::Unkn](reil::OpCode::Unkn) instruction,
/// which halts.
#[derive(Debug)]
pub struct Vm<O: Observer = ()> {
    arch: Architecture,
    program: Vec<Instruction>,
    emulator: Emulator,
    observer: O,
    steps: u64,
}

impl Vm {
    pub fn new(arch: Architecture) -> Self {
        Self::with_observer(arch, ())
    }
}

impl<O: Observer> Vm<O> {
    pub fn with_observer(arch: Architecture, observer: O) -> Self {
        Self {
            arch,
            program: Vec::new(),
            emulator: Emulator::new(),
            observer,
            steps: 0,
        }
    }

    /// Replace the loaded program. The instructions must be bound to this machine's architecture.
    pub fn load(&mut self, program: Vec<Instruction>) {
        debug!(instructions = program.len(), "program loaded");
        self.program = program;
    }

    /// Decode a program in textual form against this machine's architecture and load it.
    pub fn load_text(&mut self, program: &str) -> decode::Result<()> {
        let program = decode::decode(&mut self.arch, program)?;
        self.load(program);
        Ok(())
    }

    pub fn arch(&self) -> &Architecture {
        &self.arch
    }

    pub fn arch_mut(&mut self) -> &mut Architecture {
        &mut self.arch
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Borrow the architecture and the observer at the same time.
    pub fn parts_mut(&mut self) -> (&mut Architecture, &mut O) {
        (&mut self.arch, &mut self.observer)
    }

    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// Number of steps executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn into_parts(self) -> (Architecture, O) {
        (self.arch, self.observer)
    }

    /// Execute a single instruction. Returns whether execution may continue.
    pub fn step(&mut self) -> emulator::Result<bool> {
        let pc = self.arch.pc();
        self.observer.fetched(self.arch.operand(pc));

        let address = self.arch.pc_value();
        let instruction = usize::try_from(address)
            .ok()
            .and_then(|address| self.program.get(address))
            .unwrap_or(&HALT);
        self.observer.decoded(instruction);
        trace!(pc = address, %instruction, "decoded");

        self.observer.before_execute(&mut self.arch, instruction);
        let running = match self.emulator.emulate(&mut self.arch, instruction)? {
            ControlFlow::NextInstruction => {
                let next = self.arch.pc_value().wrapping_add(1);
                self.arch.set(pc, next)?;
                true
            }
            ControlFlow::Jump(target) => {
                trace!(pc = address, target, "jump");
                true
            }
            ControlFlow::Halt => {
                debug!(pc = address, "halted");
                false
            }
        };

        self.steps += 1;
        self.observer.after_execute(&mut self.arch, running);
        Ok(running)
    }

    /// Execute at most `max_steps` instructions. Returns whether execution may continue.
    pub fn run_for(&mut self, max_steps: u64) -> emulator::Result<bool> {
        for _ in 0..max_steps {
            if !self.step()? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Execute until the program halts. Returns the number of steps executed.
    pub fn run(&mut self) -> emulator::Result<u64> {
        let start = self.steps;
        while self.step()? {}

        let steps = self.steps - start;
        info!(steps, "execution complete");
        Ok(steps)
    }
}
