//! 68HC05-style interval timer.
//!
//! - 8-bit down counter (TDR) behind a 7-bit prescaler.
//! - When the counter decrements past zero it wraps to $FF and sets TCR7.
//!   If TCR6 is clear an interrupt is reported.
//! - TCR7 stays set until software clears it with a control write.
//! - TCR2..0 select the prescaler tap and read back as a fixed value.

use super::device::{Device, DeviceKind};

pub const REG_DATA: u16 = 0;
pub const REG_CTRL: u16 = 1;

/// Control register bits.
pub const TCR_PRESCALER_SELECT: u8 = 0x03;
pub const TCR_PRESCALER_RESET: u8 = 0x08;
pub const TCR_MODE_MASK: u8 = 0x30;
pub const TCR_EXTCLOCKPIN: u8 = 0x10;
pub const TCR_EXTCLOCK: u8 = 0x20;
pub const TCR_INTDISABLE: u8 = 0x40;
pub const TCR_INTF: u8 = 0x80;

/// Cycles per counter decrement for the fixed prescaler tap (/8).
pub const PRESCALER_PERIOD: u32 = 1 << TCR_PRESCALER_SELECT;

pub const TIMER_SPAN: u16 = 2;

pub struct Timer {
    pub data: u8,
    control: u8,
    prescaler: u32,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            data: 0,
            control: TCR_INTF | TCR_INTDISABLE | TCR_PRESCALER_SELECT,
            prescaler: PRESCALER_PERIOD,
        }
    }

    pub fn control(&self) -> u8 {
        self.control & !TCR_PRESCALER_RESET
    }

    pub fn prescaler(&self) -> u32 {
        self.prescaler
    }

    /// One counter decrement. Returns `true` if an interrupt is reported.
    fn count(&mut self) -> bool {
        if self.data > 0 {
            self.data -= 1;
            return false;
        }
        self.data = 0xFF;
        self.control |= TCR_INTF;
        self.control & TCR_INTDISABLE == 0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for Timer {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Timer
    }

    fn name(&self) -> &'static str {
        "timer"
    }

    fn span(&self) -> u16 {
        TIMER_SPAN
    }

    fn peek(&self, offset: u16) -> u8 {
        match offset {
            REG_DATA => self.data,
            _ => self.control(),
        }
    }

    fn read(&mut self, offset: u16) -> u8 {
        let value = self.peek(offset);
        log::trace!("timer: read reg {offset} = {value:#04x}");
        value
    }

    fn write(&mut self, offset: u16, value: u8) {
        log::trace!("timer: write reg {offset} = {value:#04x}");
        match offset {
            REG_DATA => self.data = value,
            _ => {
                if value & TCR_PRESCALER_RESET != 0 {
                    self.prescaler = PRESCALER_PERIOD;
                }
                self.control = (value & 0xF0) | TCR_PRESCALER_SELECT;
            }
        }
    }

    fn advance(&mut self, cycles: u32) -> u32 {
        let mut fired = 0;
        for _ in 0..cycles {
            self.prescaler -= 1;
            if self.prescaler > 0 {
                continue;
            }
            self.prescaler = PRESCALER_PERIOD;
            if self.count() {
                fired += 1;
            }
        }
        if fired > 0 {
            log::debug!("timer: {fired} underflow interrupt(s)");
        }
        fired
    }
}
