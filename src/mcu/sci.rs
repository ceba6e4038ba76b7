//! 68HC05 serial communications interface (SCI).
//!
//! Five registers, one address each:
//! BAUD (-,-,SCP1,SCP0,-,SCR2,SCR1,SCR0), SCCR1 (R8,T8,-,M,WAKE,-,-,-),
//! SCCR2 (TIE,TCIE,RIE,ILIE,TE,RE,RWU,SBK), SCSR (TDRE,TC,RDRF,IDLE,OR,NF,FE,-)
//! and SCDAT (read: receive buffer, write: transmit buffer).

use super::device::{Device, DeviceKind, TransmitSink};

pub const REG_BAUD: u16 = 0;
pub const REG_SCCR1: u16 = 1;
pub const REG_SCCR2: u16 = 2;
pub const REG_SCSR: u16 = 3;
pub const REG_SCDAT: u16 = 4;

pub const SCCR2_TIE: u8 = 0x80;
pub const SCCR2_TCIE: u8 = 0x40;
pub const SCCR2_RIE: u8 = 0x20;
pub const SCCR2_TE: u8 = 0x08;
pub const SCCR2_RE: u8 = 0x04;

pub const SCSR_TDRE: u8 = 0x80;
pub const SCSR_TC: u8 = 0x40;
pub const SCSR_RDRF: u8 = 0x20;
pub const SCSR_IDLE: u8 = 0x10;
pub const SCSR_OR: u8 = 0x08;

pub const SCI_SPAN: u16 = 5;

pub struct Sci {
    regs: [u8; 4],
    tx: u8,
    rx: u8,
    sink: Option<Box<dyn TransmitSink>>,
}

impl Sci {
    pub fn new(sink: Option<Box<dyn TransmitSink>>) -> Self {
        let mut regs = [0u8; 4];
        regs[REG_SCSR as usize] = SCSR_TDRE | SCSR_TC;
        Self {
            regs,
            tx: 0,
            rx: 0,
            sink,
        }
    }

    pub fn status(&self) -> u8 {
        self.regs[REG_SCSR as usize]
    }

    pub fn tx_data(&self) -> u8 {
        self.tx
    }
}

impl Device for Sci {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Serial
    }

    fn name(&self) -> &'static str {
        "sci"
    }

    fn span(&self) -> u16 {
        SCI_SPAN
    }

    fn peek(&self, offset: u16) -> u8 {
        match offset {
            REG_SCDAT => self.rx,
            _ => self.regs[offset as usize],
        }
    }

    fn read(&mut self, offset: u16) -> u8 {
        let value = self.peek(offset);
        if offset == REG_SCDAT {
            self.regs[REG_SCSR as usize] &= !(SCSR_RDRF | SCSR_OR);
        }
        log::trace!("sci: read reg {offset} = {value:#04x}");
        value
    }

    fn write(&mut self, offset: u16, value: u8) {
        log::trace!("sci: write reg {offset} = {value:#04x}");
        match offset {
            REG_SCDAT => {
                self.tx = value;
                self.regs[REG_SCSR as usize] &= !(SCSR_TDRE | SCSR_TC);
                if let Some(sink) = self.sink.as_mut() {
                    sink.transmit(value);
                }
                self.regs[REG_SCSR as usize] |= SCSR_TDRE | SCSR_TC;
            }
            // Read-only: flags clear through the data register.
            REG_SCSR => {}
            _ => self.regs[offset as usize] = value,
        }
    }

    fn receive(&mut self, byte: u8) -> bool {
        if self.regs[REG_SCSR as usize] & SCSR_RDRF != 0 {
            self.regs[REG_SCSR as usize] |= SCSR_OR;
        }
        self.rx = byte;
        self.regs[REG_SCSR as usize] |= SCSR_RDRF;
        self.regs[REG_SCCR2 as usize] & SCCR2_RIE != 0
    }
}
