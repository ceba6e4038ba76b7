//! Plain RAM behind the bus.
//!
//! The size is a power of two; bus addresses above it alias back into it,
//! the way a part with fewer address lines than the CPU decodes would.

use crate::error::{Error, Result};

pub struct Memory {
    ram: Vec<u8>,
    mask: usize,
}

impl Memory {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 || size > 0x1_0000 || !size.is_power_of_two() {
            return Err(Error::MemorySize(size));
        }
        Ok(Self {
            ram: vec![0; size],
            mask: size - 1,
        })
    }

    pub fn size(&self) -> usize {
        self.ram.len()
    }

    pub fn peek(&self, address: u16) -> u8 {
        self.ram[address as usize & self.mask]
    }

    pub fn poke(&mut self, address: u16, value: u8) {
        self.ram[address as usize & self.mask] = value;
    }

    /// Copy `bytes` to `address`. Placement is never truncated or wrapped:
    /// data that would run past the end of memory is rejected.
    pub fn place(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        let start = address as usize;
        let end = start.checked_add(bytes.len());
        match end {
            Some(end) if end <= self.ram.len() => {
                self.ram[start..end].copy_from_slice(bytes);
                Ok(())
            }
            _ => Err(Error::ImageTooLarge {
                address,
                len: bytes.len(),
                size: self.ram.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_must_be_power_of_two() {
        assert!(Memory::new(0x2000).is_ok());
        assert!(Memory::new(0x1_0000).is_ok());
        assert!(matches!(Memory::new(0), Err(Error::MemorySize(0))));
        assert!(matches!(Memory::new(0x3000), Err(Error::MemorySize(_))));
        assert!(matches!(Memory::new(0x2_0000), Err(Error::MemorySize(_))));
    }

    #[test]
    fn test_addresses_alias_above_size() {
        let mut mem = Memory::new(0x2000).unwrap();
        mem.poke(0xFFFE, 0x12);
        assert_eq!(mem.peek(0x1FFE), 0x12);
        assert_eq!(mem.peek(0x3FFE), 0x12);
    }

    #[test]
    fn test_place_rejects_overflow() {
        let mut mem = Memory::new(0x100).unwrap();
        mem.place(0xF0, &[1; 0x10]).unwrap();
        assert_eq!(mem.peek(0xFF), 1);

        let err = mem.place(0xF8, &[2; 0x10]).unwrap_err();
        assert!(matches!(
            err,
            Error::ImageTooLarge { address: 0xF8, len: 0x10, size: 0x100 }
        ));
        // Nothing was written.
        assert_eq!(mem.peek(0xF8), 1);
    }
}
