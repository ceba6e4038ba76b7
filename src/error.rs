//! Errors raised while configuring the machine or loading an image.
//!
//! Everything here is a hard failure that happens before the first
//! instruction executes. Bus accesses themselves never fail.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "{name} at ${base:04X}-${end:04X} overlaps {other} at ${other_base:04X}-${other_end:04X}"
    )]
    Overlap {
        name: &'static str,
        base: u16,
        end: u32,
        other: &'static str,
        other_base: u16,
        other_end: u32,
    },

    #[error("memory size {0:#x} must be a power of two between 1 and 0x10000")]
    MemorySize(usize),

    #[error("image data at ${address:04X} (+{len} bytes) exceeds memory size {size:#x}")]
    ImageTooLarge { address: u32, len: usize, size: usize },

    #[error("S-record line {line}: {reason}")]
    Srec { line: usize, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
