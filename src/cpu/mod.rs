//! Host CPU cores.
//!
//! The monitor only sees [`CpuCore`]. Each implementation owns the
//! [`SystemBus`] it executes against.

pub mod core6502;
#[cfg(test)]
pub(crate) mod script;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mcu::bus::SystemBus;

/// Snapshot of the programmer-visible registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub pc: u16,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    /// Condition codes / processor status.
    pub cc: u8,
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC={:04X} A={:02X} X={:02X} Y={:02X} SP={:02X} CC={:02X}",
            self.pc, self.a, self.x, self.y, self.sp, self.cc
        )
    }
}

pub trait CpuCore {
    /// Load the reset vector and put the core in its power-on state.
    fn reset(&mut self);

    /// Execute one instruction, returning the cycles it consumed.
    fn exec_one_instruction(&mut self) -> u32;

    /// Address of the next instruction to execute.
    fn next_pc(&self) -> u16;

    fn set_pc(&mut self, pc: u16);

    fn trace_enabled(&self) -> bool;

    /// Enable instruction and bus tracing.
    fn set_trace(&mut self, on: bool);

    /// Take a maskable interrupt. Returns the cycles spent entering the
    /// handler, or 0 if interrupts are masked.
    fn irq(&mut self) -> u32;

    fn registers(&self) -> Registers;

    fn bus(&self) -> &SystemBus;

    fn bus_mut(&mut self) -> &mut SystemBus;
}

/// Selectable core implementations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CpuVariant {
    #[default]
    Nmos6502,
    Cmos6502,
}

impl fmt::Display for CpuVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuVariant::Nmos6502 => f.write_str("nmos6502"),
            CpuVariant::Cmos6502 => f.write_str("cmos6502"),
        }
    }
}

pub fn build_core(variant: CpuVariant, bus: SystemBus) -> Box<dyn CpuCore> {
    Box::new(core6502::Mos6502Core::new(variant, bus))
}
