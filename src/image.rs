//! Program images: Motorola S-records or raw binaries.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::mcu::memory::Memory;

/// One past the highest S3 address.
const ADDRESS_SPACE_END: u64 = 1 << 32;

/// A contiguous run of bytes at a load address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub address: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub segments: Vec<Segment>,
    /// Start address from an S7/S8/S9 record, if any.
    pub entry: Option<u32>,
}

impl Image {
    /// Load `path`, detecting S-record text by its first record marker.
    /// Anything else is treated as raw binary placed at `load_addr`.
    pub fn load(path: &Path, load_addr: u16) -> Result<Image> {
        let data = fs::read(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;

        let image = if looks_like_srec(&data) {
            let text = String::from_utf8_lossy(&data);
            Image::parse_srec(&text)?
        } else {
            Image::from_binary(&data, load_addr)
        };

        log::info!(
            "Loaded {}: {} segment(s), {} bytes{}",
            path.display(),
            image.segments.len(),
            image.len(),
            image
                .entry
                .map(|e| format!(", entry ${e:04X}"))
                .unwrap_or_default()
        );
        Ok(image)
    }

    pub fn from_binary(data: &[u8], load_addr: u16) -> Image {
        Image {
            segments: vec![Segment {
                address: load_addr as u32,
                bytes: data.to_vec(),
            }],
            entry: None,
        }
    }

    pub fn parse_srec(text: &str) -> Result<Image> {
        let mut image = Image::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let record = raw.trim();
            if record.is_empty() {
                continue;
            }
            let err = |reason: &str| Error::Srec {
                line,
                reason: reason.to_string(),
            };

            let mut chars = record.chars();
            if chars.next() != Some('S') {
                return Err(err("record does not start with 'S'"));
            }
            let kind = chars
                .next()
                .and_then(|c| c.to_digit(10))
                .ok_or_else(|| err("missing record type"))?;

            let body = decode_hex(&record[2..]).ok_or_else(|| err("invalid hex digits"))?;
            let Some((&count, rest)) = body.split_first() else {
                return Err(err("missing byte count"));
            };
            if rest.len() != count as usize {
                return Err(err(&format!(
                    "byte count {count} does not match {} bytes present",
                    rest.len()
                )));
            }
            let sum = body[..body.len() - 1]
                .iter()
                .fold(0u8, |acc, b| acc.wrapping_add(*b));
            let checksum = body[body.len() - 1];
            if !sum != checksum {
                return Err(err(&format!(
                    "checksum {checksum:02X}, expected {:02X}",
                    !sum
                )));
            }

            let addr_len = match kind {
                0 | 1 | 5 | 9 => 2,
                2 | 6 | 8 => 3,
                3 | 7 => 4,
                _ => return Err(err(&format!("unsupported record type S{kind}"))),
            };
            // Address bytes plus the checksum.
            let Some(data_len) = rest.len().checked_sub(addr_len + 1) else {
                return Err(err("record too short for its address"));
            };
            let address = rest[..addr_len]
                .iter()
                .fold(0u32, |acc, b| (acc << 8) | *b as u32);
            let data = &rest[addr_len..addr_len + data_len];
            if address as u64 + data.len() as u64 > ADDRESS_SPACE_END {
                return Err(err("data runs past the 32-bit address space"));
            }

            match kind {
                1..=3 => image.push(address, data),
                7..=9 => image.entry = Some(address),
                // S0 header, S5/S6 record counts.
                _ => log::debug!("srec: line {line}: skipping S{kind}"),
            }
        }

        Ok(image)
    }

    /// Append data, merging with the previous segment when contiguous.
    fn push(&mut self, address: u32, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if let Some(last) = self.segments.last_mut() {
            if last.address as u64 + last.bytes.len() as u64 == address as u64 {
                last.bytes.extend_from_slice(data);
                return;
            }
        }
        self.segments.push(Segment {
            address,
            bytes: data.to_vec(),
        });
    }

    /// Total data bytes.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.bytes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write every segment into memory. Fails without partial writes if any
    /// segment falls outside it.
    pub fn place_into(&self, memory: &mut Memory) -> Result<()> {
        for seg in &self.segments {
            let end = seg.address as u64 + seg.bytes.len() as u64;
            if end > memory.size() as u64 {
                return Err(Error::ImageTooLarge {
                    address: seg.address,
                    len: seg.bytes.len(),
                    size: memory.size(),
                });
            }
        }
        for seg in &self.segments {
            memory.place(seg.address, &seg.bytes)?;
        }
        Ok(())
    }
}

fn looks_like_srec(data: &[u8]) -> bool {
    let start = data.iter().position(|b| !b.is_ascii_whitespace());
    match start {
        Some(i) => data[i] == b'S' && data.get(i + 1).is_some_and(u8::is_ascii_digit),
        None => false,
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "\
S00F000068656C6C6F202020202000003C
S1130100A641B7119D9D9D20FB000000000000004A
S9030100FB
";

    #[test]
    fn test_parse_srec() {
        let image = Image::parse_srec(HELLO).unwrap();
        assert_eq!(image.entry, Some(0x0100));
        assert_eq!(image.segments.len(), 1);
        let seg = &image.segments[0];
        assert_eq!(seg.address, 0x0100);
        assert_eq!(&seg.bytes[..8], &[0xA6, 0x41, 0xB7, 0x11, 0x9D, 0x9D, 0x9D, 0x20]);
        assert_eq!(image.len(), 16);
    }

    #[test]
    fn test_checksum_mismatch() {
        let bad = "S1130100A641B7119D9D9D20FB000000000000004B\n";
        let err = Image::parse_srec(bad).unwrap_err();
        assert!(matches!(err, Error::Srec { line: 1, .. }));
    }

    #[test]
    fn test_bad_count_and_digits() {
        assert!(matches!(
            Image::parse_srec("\nS1050100A6\n"),
            Err(Error::Srec { line: 2, .. })
        ));
        assert!(matches!(
            Image::parse_srec("S1ZZ"),
            Err(Error::Srec { line: 1, .. })
        ));
        assert!(matches!(
            Image::parse_srec("X1030000FC"),
            Err(Error::Srec { line: 1, .. })
        ));
    }

    #[test]
    fn test_contiguous_records_merge() {
        let text = "S1050000AABB95\nS1050002CCDD4F\nS1040010EEFD\n";
        let image = Image::parse_srec(text).unwrap();
        assert_eq!(image.segments.len(), 2);
        assert_eq!(image.segments[0].bytes, vec![0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(image.segments[1].address, 0x0010);
        assert_eq!(image.entry, None);
    }

    #[test]
    fn test_records_at_top_of_address_space() {
        // Four bytes ending exactly at 2^32, then a record at 0: no merge.
        let text = "S309FFFFFFFC01020304F3\nS3060000000005F4\n";
        let image = Image::parse_srec(text).unwrap();
        assert_eq!(image.segments.len(), 2);
        assert_eq!(image.segments[0].address, 0xFFFF_FFFC);
        assert_eq!(image.segments[1].address, 0);
        assert_eq!(image.segments[1].bytes, vec![0x05]);

        let mut mem = Memory::new(0x1_0000).unwrap();
        assert!(matches!(
            image.place_into(&mut mem),
            Err(Error::ImageTooLarge { address: 0xFFFF_FFFC, .. })
        ));

        // Three bytes at $FFFFFFFE would wrap.
        assert!(matches!(
            Image::parse_srec("S308FFFFFFFE010203F6"),
            Err(Error::Srec { line: 1, .. })
        ));
    }

    #[test]
    fn test_binary_at_load_address() {
        let image = Image::from_binary(&[1, 2, 3], 0x0200);
        let mut mem = Memory::new(0x2000).unwrap();
        image.place_into(&mut mem).unwrap();
        assert_eq!(mem.peek(0x0202), 3);
    }

    #[test]
    fn test_place_rejects_oversized_image() {
        let image = Image {
            segments: vec![
                Segment { address: 0x0000, bytes: vec![9; 4] },
                Segment { address: 0x1FFE, bytes: vec![1; 4] },
            ],
            entry: None,
        };
        let mut mem = Memory::new(0x2000).unwrap();
        assert!(matches!(
            image.place_into(&mut mem),
            Err(Error::ImageTooLarge { address: 0x1FFE, .. })
        ));
        // First segment was not written either.
        assert_eq!(mem.peek(0), 0);
    }

    #[test]
    fn test_srec_detection() {
        assert!(looks_like_srec(b"\n  S0030000FC"));
        assert!(!looks_like_srec(b"Sx"));
        assert!(!looks_like_srec(&[0xA6, 0x41]));
        assert!(!looks_like_srec(b""));
    }
}
