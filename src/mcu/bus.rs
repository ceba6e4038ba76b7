//! Address decoding for the whole machine.
//!
//! Priority: the pin at $0000, then attached devices, then RAM. Every
//! address resolves to something, so bus accesses cannot fail.

use crate::error::{Error, Result};

use super::acia::Acia;
use super::device::{Device, DeviceKind, Interrupt, TransmitSink};
use super::memory::Memory;
use super::sci::Sci;
use super::timer::Timer;
use super::trace::TraceSink;

/// Single-bit I/O pad. Reads as high; writes are sampled to the trace sink.
pub const PIN_ADDRESS: u16 = 0x0000;
const PIN_LEVEL: u8 = 1;

/// Where an address lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Pin,
    Device(usize),
    Memory,
}

struct Mapping {
    base: u16,
    device: Box<dyn Device>,
}

impl Mapping {
    /// Exclusive end, widened so a device ending at $FFFF doesn't wrap.
    fn end(&self) -> u32 {
        self.base as u32 + self.device.span() as u32
    }

    fn contains(&self, addr: u16) -> bool {
        addr >= self.base && (addr as u32) < self.end()
    }
}

pub struct SystemBus {
    memory: Memory,
    devices: Vec<Mapping>,
    trace_sink: Option<Box<dyn TraceSink>>,
    pending: Vec<Interrupt>,
    /// Total CPU cycles advanced so far. Timestamps pin samples.
    cycle_count: u64,
    /// Log every access (enabled while the CPU core traces).
    pub trace: bool,
}

impl SystemBus {
    pub fn new(memory: Memory) -> Self {
        Self {
            memory,
            devices: Vec::new(),
            trace_sink: None,
            pending: Vec::new(),
            cycle_count: 0,
            trace: false,
        }
    }

    // ── Attachment ───────────────────────────────────────────────────────

    /// Map `device` at `base`. The range may not cover the pin or any other
    /// device.
    pub fn attach(&mut self, base: u16, device: Box<dyn Device>) -> Result<()> {
        let end = base as u32 + device.span() as u32;

        if base <= PIN_ADDRESS && end > PIN_ADDRESS as u32 {
            return Err(Error::Overlap {
                name: device.name(),
                base,
                end: end - 1,
                other: "pin",
                other_base: PIN_ADDRESS,
                other_end: PIN_ADDRESS as u32,
            });
        }

        for mapping in &self.devices {
            if (base as u32) < mapping.end() && end > mapping.base as u32 {
                return Err(Error::Overlap {
                    name: device.name(),
                    base,
                    end: end - 1,
                    other: mapping.device.name(),
                    other_base: mapping.base,
                    other_end: mapping.end() - 1,
                });
            }
        }

        log::info!(
            "bus: {} attached at ${:04X}-${:04X}",
            device.name(),
            base,
            end - 1
        );
        self.devices.push(Mapping { base, device });
        Ok(())
    }

    pub fn attach_acia(&mut self, base: u16, sink: Box<dyn TransmitSink>) -> Result<()> {
        self.attach(base, Box::new(Acia::new(Some(sink))))
    }

    pub fn attach_sci(&mut self, base: u16, sink: Box<dyn TransmitSink>) -> Result<()> {
        self.attach(base, Box::new(Sci::new(Some(sink))))
    }

    pub fn attach_timer(&mut self, base: u16) -> Result<()> {
        self.attach(base, Box::new(Timer::new()))
    }

    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace_sink = Some(sink);
    }

    // ── Decoding ─────────────────────────────────────────────────────────

    pub fn resolve(&self, addr: u16) -> Target {
        if addr == PIN_ADDRESS {
            return Target::Pin;
        }
        self.devices
            .iter()
            .position(|m| m.contains(addr))
            .map_or(Target::Memory, Target::Device)
    }

    /// Bus read with device side effects.
    pub fn read(&mut self, addr: u16) -> u8 {
        let value = match self.resolve(addr) {
            Target::Pin => PIN_LEVEL,
            Target::Device(i) => {
                let m = &mut self.devices[i];
                m.device.read(addr - m.base)
            }
            Target::Memory => self.memory.peek(addr),
        };
        if self.trace {
            log::info!(target: "mcumon::trace", "  MEM RD {addr:04X} = {value:02X}");
        }
        value
    }

    /// Read without side effects (monitor examine, opcode fetch for timing).
    pub fn peek(&self, addr: u16) -> u8 {
        match self.resolve(addr) {
            Target::Pin => PIN_LEVEL,
            Target::Device(i) => {
                let m = &self.devices[i];
                m.device.peek(addr - m.base)
            }
            Target::Memory => self.memory.peek(addr),
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        if self.trace {
            log::info!(target: "mcumon::trace", "  MEM WR {addr:04X} = {value:02X}");
        }
        match self.resolve(addr) {
            Target::Pin => {
                self.memory.poke(addr, value);
                if let Some(sink) = self.trace_sink.as_mut() {
                    sink.sample(self.cycle_count, value & 1 != 0);
                }
            }
            Target::Device(i) => {
                let m = &mut self.devices[i];
                m.device.write(addr - m.base, value);
            }
            Target::Memory => self.memory.poke(addr, value),
        }
    }

    // ── Time and input ───────────────────────────────────────────────────

    /// Account for `cycles` elapsed CPU cycles and advance every device.
    pub fn advance(&mut self, cycles: u32) {
        self.cycle_count += cycles as u64;
        for m in &mut self.devices {
            let fired = m.device.advance(cycles);
            for _ in 0..fired {
                self.pending.push(Interrupt {
                    source: m.device.kind(),
                    base: m.base,
                });
            }
        }
    }

    /// Hand an input byte to the first serial device. Returns `false` if no
    /// serial device is attached.
    pub fn receive(&mut self, byte: u8) -> bool {
        let Some(m) = self
            .devices
            .iter_mut()
            .find(|m| m.device.kind() == DeviceKind::Serial)
        else {
            log::debug!("bus: dropping input {byte:#04x}, no serial device");
            return false;
        };
        if m.device.receive(byte) {
            self.pending.push(Interrupt {
                source: DeviceKind::Serial,
                base: m.base,
            });
        }
        true
    }

    /// Drain interrupts reported since the last call.
    pub fn take_interrupts(&mut self) -> Vec<Interrupt> {
        std::mem::take(&mut self.pending)
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }
}
