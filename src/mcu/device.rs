//! The `Device` trait: register interface for every memory-mapped peripheral.

use std::fmt;

/// Broad class of a peripheral, used for routing input and for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Serial,
    Timer,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Serial => f.write_str("serial"),
            DeviceKind::Timer => f.write_str("timer"),
        }
    }
}

/// An interrupt condition reported by a device.
///
/// The bus only queues these; delivering them is the CPU core's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupt {
    pub source: DeviceKind,
    /// Base address of the reporting device.
    pub base: u16,
}

/// Every peripheral attached to the bus implements this trait.
///
/// Offsets are relative to the device's base address and always lie in
/// `0..span()`; the bus guarantees that before calling in.
pub trait Device {
    fn kind(&self) -> DeviceKind;

    /// Short name for logs and overlap errors.
    fn name(&self) -> &'static str;

    /// Number of consecutive bus addresses the device decodes.
    fn span(&self) -> u16;

    /// Read a register without side effects (monitor examine).
    fn peek(&self, offset: u16) -> u8;

    /// Bus read. Some registers change state when read (e.g. receive data
    /// clears receive-available). Default delegates to `peek`.
    fn read(&mut self, offset: u16) -> u8 {
        self.peek(offset)
    }

    /// Bus write.
    fn write(&mut self, offset: u16, value: u8);

    /// Deliver one byte of external input. Returns `true` if the device
    /// reports an interrupt for it. Devices without a receive path ignore it.
    fn receive(&mut self, _byte: u8) -> bool {
        false
    }

    /// Advance by `cycles` CPU cycles. Returns the number of interrupts
    /// reported while doing so.
    fn advance(&mut self, _cycles: u32) -> u32 {
        0
    }
}

/// Receiver for bytes a serial device transmits.
///
/// Invoked synchronously from inside the bus write, exactly once per byte.
pub trait TransmitSink {
    fn transmit(&mut self, byte: u8);
}

impl<F: FnMut(u8)> TransmitSink for F {
    fn transmit(&mut self, byte: u8) {
        self(byte)
    }
}
