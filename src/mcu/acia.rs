//! 6850-style ACIA.
//!
//! The chip decodes two bus addresses. Reads and writes select different
//! registers at the same offset:
//!
//! | Offset | Read    | Write   |
//! |--------|---------|---------|
//! | 0      | STATUS  | CTRL    |
//! | 1      | RXDATA  | TXDATA  |
//!
//! Transmission is instantaneous from the bus's point of view: the sink is
//! called from inside the write and TXEMPTY is set again before it returns.

use super::device::{Device, DeviceKind, TransmitSink};

/// Control register bits.
pub const CTRL_BAUD_MASK: u8 = 0x03;
pub const CTRL_BAUD_RESET: u8 = 0x03;
pub const CTRL_BAUD_CLK: u8 = 0x02;
pub const CTRL_BAUD_CLK16: u8 = 0x01;
pub const CTRL_MODE_MASK: u8 = 0x1C;
pub const CTRL_RTS_MASK: u8 = 0x60;
pub const CTRL_RXIE: u8 = 0x80;

/// Status register bits.
pub const STATUS_RXAVAIL: u8 = 0x01;
pub const STATUS_TXEMPTY: u8 = 0x02;
pub const STATUS_DCD: u8 = 0x04;
pub const STATUS_CTS: u8 = 0x08;
pub const STATUS_RXERROR: u8 = 0x10;
pub const STATUS_TXERROR: u8 = 0x20;
pub const STATUS_PARITYERROR: u8 = 0x40;
pub const STATUS_INTF: u8 = 0x80;

const REG_CTRL: usize = 0;
const REG_TXDATA: usize = 1;
const REG_STATUS: usize = 2;
const REG_RXDATA: usize = 3;

pub const ACIA_SPAN: u16 = 2;

pub struct Acia {
    regs: [u8; 4],
    sink: Option<Box<dyn TransmitSink>>,
}

impl Acia {
    pub fn new(sink: Option<Box<dyn TransmitSink>>) -> Self {
        let mut regs = [0u8; 4];
        regs[REG_STATUS] = STATUS_TXEMPTY;
        Self { regs, sink }
    }

    pub fn status(&self) -> u8 {
        self.regs[REG_STATUS]
    }

    pub fn control(&self) -> u8 {
        self.regs[REG_CTRL]
    }

    /// Last byte written for transmission.
    pub fn tx_data(&self) -> u8 {
        self.regs[REG_TXDATA]
    }

    fn read_index(offset: u16) -> usize {
        REG_STATUS | (offset as usize & 1)
    }

    fn write_index(offset: u16) -> usize {
        offset as usize & 1
    }
}

impl Device for Acia {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Serial
    }

    fn name(&self) -> &'static str {
        "acia"
    }

    fn span(&self) -> u16 {
        ACIA_SPAN
    }

    fn peek(&self, offset: u16) -> u8 {
        self.regs[Self::read_index(offset)]
    }

    fn read(&mut self, offset: u16) -> u8 {
        let idx = Self::read_index(offset);
        let value = self.regs[idx];
        if idx == REG_RXDATA {
            self.regs[REG_STATUS] &= !STATUS_RXAVAIL;
        }
        log::trace!("acia: read reg {idx} = {value:#04x}");
        value
    }

    fn write(&mut self, offset: u16, value: u8) {
        let idx = Self::write_index(offset);
        log::trace!("acia: write reg {idx}: {:#04x} -> {value:#04x}", self.regs[idx]);

        self.regs[idx] = value;
        match idx {
            REG_TXDATA => {
                self.regs[REG_STATUS] &= !STATUS_TXEMPTY;
                if let Some(sink) = self.sink.as_mut() {
                    sink.transmit(value);
                }
                self.regs[REG_STATUS] |= STATUS_TXEMPTY;
            }
            REG_CTRL if value & CTRL_BAUD_MASK == CTRL_BAUD_RESET => {
                // Master reset. Status is cleared even mid-transmit.
                self.regs[REG_STATUS] = STATUS_TXEMPTY;
                self.regs[REG_CTRL] &= !CTRL_BAUD_MASK;
                log::debug!("acia: master reset");
            }
            _ => {}
        }
    }

    fn receive(&mut self, byte: u8) -> bool {
        self.regs[REG_RXDATA] = byte;
        self.regs[REG_STATUS] |= STATUS_RXAVAIL;
        self.regs[REG_CTRL] & CTRL_RXIE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn capturing() -> (Acia, Rc<RefCell<Vec<u8>>>) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&sent);
        let acia = Acia::new(Some(Box::new(move |b: u8| log.borrow_mut().push(b))));
        (acia, sent)
    }

    #[test]
    fn test_attach_state() {
        let (acia, _) = capturing();
        assert_eq!(acia.status(), STATUS_TXEMPTY);
        assert_eq!(acia.peek(0), STATUS_TXEMPTY);
    }

    #[test]
    fn test_each_tx_write_transmits_once() {
        let (mut acia, sent) = capturing();
        for &b in b"Hi\r\n" {
            assert_ne!(acia.read(0) & STATUS_TXEMPTY, 0);
            acia.write(1, b);
            assert_ne!(acia.read(0) & STATUS_TXEMPTY, 0);
        }
        assert_eq!(sent.borrow().as_slice(), b"Hi\r\n");
        assert_eq!(acia.tx_data(), b'\n');
    }

    #[test]
    fn test_control_write_does_not_transmit() {
        let (mut acia, sent) = capturing();
        acia.write(0, CTRL_RXIE | CTRL_BAUD_CLK16);
        assert!(sent.borrow().is_empty());
        assert_eq!(acia.control(), CTRL_RXIE | CTRL_BAUD_CLK16);
    }

    #[test]
    fn test_receive_then_read_once() {
        let (mut acia, _) = capturing();
        assert!(!acia.receive(b'x'));
        assert_ne!(acia.read(0) & STATUS_RXAVAIL, 0);

        assert_eq!(acia.read(1), b'x');
        assert_eq!(acia.read(0) & STATUS_RXAVAIL, 0);

        // Data stays latched but is no longer flagged as new.
        assert_eq!(acia.read(1), b'x');
        assert_eq!(acia.read(0) & STATUS_RXAVAIL, 0);
    }

    #[test]
    fn test_peek_does_not_clear_rxavail() {
        let (mut acia, _) = capturing();
        acia.receive(0x55);
        assert_eq!(acia.peek(1), 0x55);
        assert_ne!(acia.status() & STATUS_RXAVAIL, 0);
    }

    #[test]
    fn test_receive_interrupt_needs_rxie() {
        let (mut acia, _) = capturing();
        acia.write(0, CTRL_BAUD_CLK16);
        assert!(!acia.receive(1));
        acia.write(0, CTRL_BAUD_CLK16 | CTRL_RXIE);
        assert!(acia.receive(2));
    }

    #[test]
    fn test_master_reset_clears_status() {
        let (mut acia, _) = capturing();
        acia.receive(0x41);
        acia.write(0, CTRL_RXIE | CTRL_BAUD_RESET);
        assert_eq!(acia.status(), STATUS_TXEMPTY);
        assert_eq!(acia.control(), CTRL_RXIE);
    }

    #[test]
    fn test_no_sink_still_sets_txempty() {
        let mut acia = Acia::new(None);
        acia.write(1, 0x41);
        assert_eq!(acia.status() & STATUS_TXEMPTY, STATUS_TXEMPTY);
    }
}
