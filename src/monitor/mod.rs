//! Execution driver: steps the CPU core, keeps the peripherals in time with
//! it and implements the operator's step / continue / breakpoint controls.
//!
//! Per instruction, in order:
//!   1. check the breakpoint against the next PC (unless the skip flag is armed)
//!   2. check the stop token
//!   3. execute one instruction and advance the bus by its cycles
//!   4. forward device interrupts to the core
//!   5. pace to real time
//!   6. poll one byte of input and hand it to the serial device

pub mod command;
pub mod pacing;

use std::io::{self, Write};

use crate::cpu::{CpuCore, Registers};

pub use command::Command;
pub use pacing::{Pacer, StopToken};

/// Non-blocking source of input bytes for the serial device.
pub trait InputSource {
    fn poll_byte(&mut self) -> Option<u8>;
}

/// Input source that never has anything to say.
pub struct NoInput;

impl InputSource for NoInput {
    fn poll_byte(&mut self) -> Option<u8> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Halted,
    Stepping,
    Running,
}

/// Why a `continue` / `run` came back to the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint(u16),
    Interrupted,
    CycleLimit,
}

/// What the caller should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Monitor {
    core: Box<dyn CpuCore>,
    input: Box<dyn InputSource>,
    pacer: Pacer,
    stop: StopToken,

    breakpoint: Option<u16>,
    /// Set when a breakpoint halts execution, so the next continue can
    /// leave that address. Cleared after any instruction executes.
    skip_breakpoint: bool,
    state: RunState,
    /// Address of the most recently executed instruction.
    current_pc: u16,
    total_cycles: u64,
    /// Cycles a single continue may run before halting.
    cycle_limit: Option<u64>,
}

impl Monitor {
    pub fn new(
        core: Box<dyn CpuCore>,
        input: Box<dyn InputSource>,
        pacer: Pacer,
        stop: StopToken,
    ) -> Self {
        let current_pc = core.next_pc();
        Self {
            core,
            input,
            pacer,
            stop,
            breakpoint: None,
            skip_breakpoint: false,
            state: RunState::Halted,
            current_pc,
            total_cycles: 0,
            cycle_limit: None,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn breakpoint(&self) -> Option<u16> {
        self.breakpoint
    }

    /// True while halted on the breakpoint, until an instruction executes.
    pub fn skip_breakpoint(&self) -> bool {
        self.skip_breakpoint
    }

    pub fn current_pc(&self) -> u16 {
        self.current_pc
    }

    pub fn next_pc(&self) -> u16 {
        self.core.next_pc()
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn registers(&self) -> Registers {
        self.core.registers()
    }

    pub fn core(&self) -> &dyn CpuCore {
        self.core.as_ref()
    }

    pub fn set_cycle_limit(&mut self, limit: Option<u64>) {
        self.cycle_limit = limit;
    }

    pub fn set_breakpoint(&mut self, addr: u16) {
        log::debug!("monitor: breakpoint at ${addr:04X}");
        self.breakpoint = Some(addr);
    }

    pub fn clear_breakpoint(&mut self) {
        self.breakpoint = None;
        self.skip_breakpoint = false;
    }

    /// Read `count` bytes from `addr` without disturbing device state.
    /// At most one full address space is returned.
    pub fn examine(&self, addr: u16, count: usize) -> Vec<u8> {
        (0..count.min(command::MAX_EXAMINE))
            .map(|i| self.core.bus().peek(addr.wrapping_add(i as u16)))
            .collect()
    }

    // ── Execution ────────────────────────────────────────────────────────

    /// Execute one instruction and let the machine catch up with it.
    fn step_one(&mut self) -> u32 {
        self.current_pc = self.core.next_pc();
        let mut cycles = self.core.exec_one_instruction();
        self.skip_breakpoint = false;
        self.core.bus_mut().advance(cycles);

        for irq in self.core.bus_mut().take_interrupts() {
            log::debug!("irq: {} at ${:04X}", irq.source, irq.base);
            let entry = self.core.irq();
            if entry > 0 {
                self.core.bus_mut().advance(entry);
                cycles += entry;
            }
        }

        self.total_cycles += cycles as u64;
        cycles
    }

    /// Execute `count` instructions, tracing only the last one.
    pub fn step(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        self.state = RunState::Stepping;
        let trace = self.core.trace_enabled();
        for i in 0..count {
            if i + 1 == count {
                self.core.set_trace(true);
            }
            self.step_one();
        }
        self.core.set_trace(trace);
        self.state = RunState::Halted;
    }

    /// Run until the breakpoint, a stop request or the cycle limit.
    pub fn cont(&mut self) -> StopReason {
        self.stop.clear();
        self.pacer.restart();
        self.state = RunState::Running;
        let budget_end = self.cycle_limit.map(|n| self.total_cycles + n);
        log::debug!("monitor: running from ${:04X}", self.core.next_pc());

        let reason = loop {
            let pc = self.core.next_pc();
            if self.breakpoint == Some(pc) && !self.skip_breakpoint {
                self.skip_breakpoint = true;
                break StopReason::Breakpoint(pc);
            }
            if self.stop.is_requested() {
                self.stop.clear();
                self.step(1);
                break StopReason::Interrupted;
            }
            if budget_end.is_some_and(|end| self.total_cycles >= end) {
                break StopReason::CycleLimit;
            }

            let cycles = self.step_one();
            self.pacer.pace(cycles, &self.stop);

            if let Some(byte) = self.input.poll_byte() {
                self.core.bus_mut().receive(byte);
            }
        };

        self.state = RunState::Halted;
        log::debug!("monitor: halted ({reason:?}) after {} cycles", self.total_cycles);
        reason
    }

    /// Reset the core, then continue.
    pub fn run(&mut self) -> StopReason {
        self.core.reset();
        self.skip_breakpoint = false;
        self.cont()
    }

    /// Carry out one operator command, writing its report to `out`.
    pub fn execute(&mut self, cmd: Command, out: &mut dyn Write) -> io::Result<Flow> {
        match cmd {
            Command::Step(n) => {
                self.step(n);
                writeln!(out, "{}", self.registers())?;
            }
            Command::Continue => {
                let reason = self.cont();
                self.report_stop(reason, out)?;
            }
            Command::Run => {
                let reason = self.run();
                self.report_stop(reason, out)?;
            }
            Command::Break(addr) => {
                self.set_breakpoint(addr);
                writeln!(out, "breakpoint at ${addr:04X}")?;
            }
            Command::Clear => {
                self.clear_breakpoint();
                writeln!(out, "breakpoint cleared")?;
            }
            Command::Examine { addr, count } => {
                let bytes = self.examine(addr, count);
                for (row, chunk) in bytes.chunks(16).enumerate() {
                    let at = addr.wrapping_add((row * 16) as u16);
                    let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
                    writeln!(out, "${at:04X}: {}", hex.join(" "))?;
                }
            }
            Command::Regs => {
                writeln!(out, "{}  cycles={}", self.registers(), self.total_cycles)?;
            }
            Command::Help => writeln!(out, "{}", command::HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    pub fn report_stop(&self, reason: StopReason, out: &mut dyn Write) -> io::Result<()> {
        match reason {
            StopReason::Breakpoint(pc) => writeln!(out, "\nbreakpoint ${pc:04X}")?,
            StopReason::Interrupted => writeln!(out, "\ninterrupted")?,
            StopReason::CycleLimit => writeln!(out, "\ncycle limit reached")?,
        }
        writeln!(out, "{}", self.registers())
    }
}
