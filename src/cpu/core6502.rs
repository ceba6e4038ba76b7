// 6502 core backed by the `mos6502` crate.
//
// The crate executes instructions but does not report their cost, so cycle
// counts come from a per-opcode table looked up before each step. Interrupt
// entry is done by hand since the crate has no IRQ line.

use mos6502::cpu::CPU;
use mos6502::instruction::{Cmos6502, Nmos6502};
use mos6502::memory::Bus;
use mos6502::registers::{StackPointer, Status};

use crate::mcu::bus::SystemBus;

use super::{CpuCore, CpuVariant, Registers};

const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;
const STACK_PAGE: u16 = 0x0100;
const IRQ_CYCLES: u32 = 7;

// ─────────────────────────────────────────────────────────────────────────────
//  Approximate 6502 cycle counts per opcode (no page-crossing penalties)
// ─────────────────────────────────────────────────────────────────────────────

static OPCODE_CYCLES: [u8; 256] = [
    //0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F
    7, 6, 2, 8, 3, 3, 5, 5, 3, 2, 2, 2, 4, 4, 6, 6, // 0x
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 1x
    6, 6, 2, 8, 3, 3, 5, 5, 4, 2, 2, 2, 4, 4, 6, 6, // 2x
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 3x
    6, 6, 2, 8, 3, 3, 5, 5, 3, 2, 2, 2, 3, 4, 6, 6, // 4x
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 5x
    6, 6, 2, 8, 3, 3, 5, 5, 4, 2, 2, 2, 5, 4, 6, 6, // 6x
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // 7x
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4, // 8x
    2, 6, 2, 6, 4, 4, 4, 4, 2, 5, 2, 5, 5, 5, 5, 5, // 9x
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4, // Ax
    2, 5, 2, 5, 4, 4, 4, 4, 2, 4, 2, 4, 4, 4, 4, 4, // Bx
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6, // Cx
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // Dx
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6, // Ex
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7, // Fx
];

pub fn opcode_cycles(opcode: u8) -> u32 {
    OPCODE_CYCLES[opcode as usize] as u32
}

impl Bus for SystemBus {
    fn get_byte(&mut self, addr: u16) -> u8 {
        self.read(addr)
    }

    fn set_byte(&mut self, addr: u16, val: u8) {
        self.write(addr, val)
    }
}

enum Cpu {
    Nmos(CPU<SystemBus, Nmos6502>),
    Cmos(CPU<SystemBus, Cmos6502>),
}

/// Run `$body` against whichever variant is inside, binding it to `$cpu`.
macro_rules! with_cpu {
    ($self:expr, $cpu:ident => $body:expr) => {
        match $self {
            Cpu::Nmos($cpu) => $body,
            Cpu::Cmos($cpu) => $body,
        }
    };
}

pub struct Mos6502Core {
    cpu: Cpu,
    trace: bool,
}

impl Mos6502Core {
    pub fn new(variant: CpuVariant, bus: SystemBus) -> Self {
        let cpu = match variant {
            CpuVariant::Nmos6502 => Cpu::Nmos(CPU::new(bus, Nmos6502)),
            CpuVariant::Cmos6502 => Cpu::Cmos(CPU::new(bus, Cmos6502)),
        };
        log::debug!("cpu: {variant} core created");
        Self { cpu, trace: false }
    }
}

impl CpuCore for Mos6502Core {
    fn reset(&mut self) {
        with_cpu!(&mut self.cpu, cpu => {
            let lo = cpu.memory.peek(RESET_VECTOR) as u16;
            let hi = cpu.memory.peek(RESET_VECTOR + 1) as u16;
            cpu.registers.program_counter = (hi << 8) | lo;
            cpu.registers.stack_pointer = StackPointer(0xFD);
            cpu.registers.status.insert(Status::PS_DISABLE_INTERRUPTS);
        });
        log::debug!("cpu: reset, pc=${:04X}", self.next_pc());
    }

    fn exec_one_instruction(&mut self) -> u32 {
        let trace = self.trace;
        let regs = self.registers();
        with_cpu!(&mut self.cpu, cpu => {
            let opcode = cpu.memory.peek(cpu.registers.program_counter);
            if trace {
                log::info!(target: "mcumon::trace", "{:04X}: {opcode:02X}  {regs}", regs.pc);
            }
            cpu.single_step();
            opcode_cycles(opcode)
        })
    }

    fn next_pc(&self) -> u16 {
        with_cpu!(&self.cpu, cpu => cpu.registers.program_counter)
    }

    fn set_pc(&mut self, pc: u16) {
        with_cpu!(&mut self.cpu, cpu => cpu.registers.program_counter = pc);
    }

    fn trace_enabled(&self) -> bool {
        self.trace
    }

    fn set_trace(&mut self, on: bool) {
        self.trace = on;
        self.bus_mut().trace = on;
    }

    /// Push PC and status, set I, jump through $FFFE.
    fn irq(&mut self) -> u32 {
        with_cpu!(&mut self.cpu, cpu => {
            if cpu.registers.status.contains(Status::PS_DISABLE_INTERRUPTS) {
                return 0;
            }

            let pc = cpu.registers.program_counter;
            let mut sp = cpu.registers.stack_pointer.0;

            cpu.memory.write(STACK_PAGE | sp as u16, (pc >> 8) as u8);
            sp = sp.wrapping_sub(1);
            cpu.memory.write(STACK_PAGE | sp as u16, (pc & 0xFF) as u8);
            sp = sp.wrapping_sub(1);

            // B flag clear, unused bit set
            let status_byte = (cpu.registers.status.bits() | 0x20) & !0x10;
            cpu.memory.write(STACK_PAGE | sp as u16, status_byte);
            sp = sp.wrapping_sub(1);

            cpu.registers.stack_pointer = StackPointer(sp);
            cpu.registers.status.insert(Status::PS_DISABLE_INTERRUPTS);

            let lo = cpu.memory.peek(IRQ_VECTOR) as u16;
            let hi = cpu.memory.peek(IRQ_VECTOR + 1) as u16;
            cpu.registers.program_counter = (hi << 8) | lo;
        });
        IRQ_CYCLES
    }

    fn registers(&self) -> Registers {
        with_cpu!(&self.cpu, cpu => Registers {
            pc: cpu.registers.program_counter,
            a: cpu.registers.accumulator,
            x: cpu.registers.index_x,
            y: cpu.registers.index_y,
            sp: cpu.registers.stack_pointer.0,
            cc: cpu.registers.status.bits(),
        })
    }

    fn bus(&self) -> &SystemBus {
        with_cpu!(&self.cpu, cpu => &cpu.memory)
    }

    fn bus_mut(&mut self) -> &mut SystemBus {
        with_cpu!(&mut self.cpu, cpu => &mut cpu.memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcu::memory::Memory;

    fn core_with(program: &[u8]) -> Mos6502Core {
        let mut mem = Memory::new(0x1_0000).unwrap();
        mem.place(0x0200, program).unwrap();
        mem.place(RESET_VECTOR as u32, &[0x00, 0x02, 0x00, 0x03]).unwrap();
        let mut core = Mos6502Core::new(CpuVariant::Nmos6502, SystemBus::new(mem));
        core.reset();
        core
    }

    #[test]
    fn test_reset_loads_vector() {
        let core = core_with(&[0xEA]);
        let regs = core.registers();
        assert_eq!(regs.pc, 0x0200);
        assert_eq!(regs.sp, 0xFD);
        assert_ne!(regs.cc & Status::PS_DISABLE_INTERRUPTS.bits(), 0);
    }

    #[test]
    fn test_step_reports_table_cycles() {
        // LDA #$41 ; STA $0300 ; NOP
        let mut core = core_with(&[0xA9, 0x41, 0x8D, 0x00, 0x03, 0xEA]);
        assert_eq!(core.exec_one_instruction(), 2);
        assert_eq!(core.registers().a, 0x41);
        assert_eq!(core.exec_one_instruction(), 4);
        assert_eq!(core.bus().peek(0x0300), 0x41);
        assert_eq!(core.next_pc(), 0x0205);
    }

    #[test]
    fn test_irq_masked_after_reset() {
        let mut core = core_with(&[0xEA]);
        assert_eq!(core.irq(), 0);
        assert_eq!(core.next_pc(), 0x0200);
    }

    #[test]
    fn test_irq_pushes_and_vectors() {
        // CLI ; NOP
        let mut core = core_with(&[0x58, 0xEA]);
        core.exec_one_instruction();
        assert_eq!(core.irq(), IRQ_CYCLES);

        let regs = core.registers();
        assert_eq!(regs.pc, 0x0300);
        assert_eq!(regs.sp, 0xFA);
        assert_eq!(core.bus().peek(0x01FD), 0x02);
        assert_eq!(core.bus().peek(0x01FC), 0x01);
        assert_ne!(regs.cc & Status::PS_DISABLE_INTERRUPTS.bits(), 0);
    }

    #[test]
    fn test_store_to_acia_transmits() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let sent = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&sent);
        let mut core = core_with(&[0xA9, 0x41, 0x85, 0x11]); // LDA #$41 ; STA $11
        core.bus_mut()
            .attach_acia(0x10, Box::new(move |b: u8| log.borrow_mut().push(b)))
            .unwrap();

        core.exec_one_instruction();
        assert_eq!(core.exec_one_instruction(), 3);
        assert_eq!(sent.borrow().as_slice(), &[0x41]);
    }

    #[test]
    fn test_set_trace_reaches_bus() {
        let mut core = core_with(&[0xEA]);
        core.set_trace(true);
        assert!(core.trace_enabled());
        assert!(core.bus().trace);
        core.set_trace(false);
        assert!(!core.bus().trace);
    }
}
