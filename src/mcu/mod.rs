//! Memory-mapped peripherals and the bus that decodes them.

pub mod acia;
pub mod bus;
pub mod device;
pub mod memory;
pub mod sci;
pub mod timer;
pub mod trace;
