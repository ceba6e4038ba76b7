//! Minimal HC05-flavoured core for driving monitor tests.
//!
//! Supported opcodes (anything else executes as a 2-cycle no-op):
//!
//! | op   | form          | cycles |
//! |------|---------------|--------|
//! | `9D` | NOP           | 2      |
//! | `9A` | CLI           | 2      |
//! | `A6` | LDA #imm      | 2      |
//! | `B7` | STA dir       | 4      |
//! | `C7` | STA ext       | 5      |
//! | `B6` | LDA dir       | 3      |
//! | `CC` | JMP ext       | 3      |
//! | `20` | BRA rel       | 3      |
//! | `6E` | MOV #imm,dir  | 4      |

use crate::mcu::bus::SystemBus;

use super::{CpuCore, Registers};

pub const RESET_VECTOR: u16 = 0xFFFE;
pub const IRQ_VECTOR: u16 = 0xFFFA;
pub const CC_I: u8 = 0x08;
pub const IRQ_CYCLES: u32 = 9;

pub const NOP: u8 = 0x9D;
pub const CLI: u8 = 0x9A;
pub const LDA_IMM: u8 = 0xA6;
pub const LDA_DIR: u8 = 0xB6;
pub const STA_DIR: u8 = 0xB7;
pub const STA_EXT: u8 = 0xC7;
pub const JMP_EXT: u8 = 0xCC;
pub const BRA: u8 = 0x20;
pub const MOV_IMM_DIR: u8 = 0x6E;

pub struct ScriptCore {
    bus: SystemBus,
    regs: Registers,
    trace: bool,
}

impl ScriptCore {
    pub fn new(bus: SystemBus) -> Self {
        Self {
            bus,
            regs: Registers {
                sp: 0xFF,
                cc: CC_I,
                ..Registers::default()
            },
            trace: false,
        }
    }

    fn fetch(&mut self) -> u8 {
        let byte = self.bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        byte
    }

    fn fetch_word(&mut self) -> u16 {
        let hi = self.fetch() as u16;
        let lo = self.fetch() as u16;
        (hi << 8) | lo
    }

    fn vector(&self, at: u16) -> u16 {
        ((self.bus.peek(at) as u16) << 8) | self.bus.peek(at.wrapping_add(1)) as u16
    }

    fn push(&mut self, value: u8) {
        self.bus.write(self.regs.sp as u16, value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }
}

impl CpuCore for ScriptCore {
    fn reset(&mut self) {
        self.regs = Registers {
            pc: self.vector(RESET_VECTOR),
            sp: 0xFF,
            cc: CC_I,
            ..Registers::default()
        };
    }

    fn exec_one_instruction(&mut self) -> u32 {
        match self.fetch() {
            CLI => {
                self.regs.cc &= !CC_I;
                2
            }
            LDA_IMM => {
                self.regs.a = self.fetch();
                2
            }
            LDA_DIR => {
                let addr = self.fetch() as u16;
                self.regs.a = self.bus.read(addr);
                3
            }
            STA_DIR => {
                let addr = self.fetch() as u16;
                self.bus.write(addr, self.regs.a);
                4
            }
            STA_EXT => {
                let addr = self.fetch_word();
                self.bus.write(addr, self.regs.a);
                5
            }
            JMP_EXT => {
                self.regs.pc = self.fetch_word();
                3
            }
            BRA => {
                let rel = self.fetch() as i8;
                self.regs.pc = self.regs.pc.wrapping_add(rel as u16);
                3
            }
            MOV_IMM_DIR => {
                let value = self.fetch();
                let addr = self.fetch() as u16;
                self.bus.write(addr, value);
                4
            }
            _ => 2,
        }
    }

    fn next_pc(&self) -> u16 {
        self.regs.pc
    }

    fn set_pc(&mut self, pc: u16) {
        self.regs.pc = pc;
    }

    fn trace_enabled(&self) -> bool {
        self.trace
    }

    fn set_trace(&mut self, on: bool) {
        self.trace = on;
        self.bus.trace = on;
    }

    fn irq(&mut self) -> u32 {
        if self.regs.cc & CC_I != 0 {
            return 0;
        }
        let pc = self.regs.pc;
        self.push(pc as u8);
        self.push((pc >> 8) as u8);
        self.push(self.regs.x);
        self.push(self.regs.a);
        self.push(self.regs.cc);
        self.regs.cc |= CC_I;
        self.regs.pc = self.vector(IRQ_VECTOR);
        IRQ_CYCLES
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn bus(&self) -> &SystemBus {
        &self.bus
    }

    fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }
}
