//! Waveform capture for the output pin at bus address 0.
//!
//! Samples are written as a minimal VCD stream: one 1-bit wire, timestamps
//! in CPU cycles.

use std::io::Write;

/// Receives `(cycle, level)` samples from pin writes.
pub trait TraceSink {
    fn sample(&mut self, cycle: u64, level: bool);
}

pub struct VcdWriter<W: Write> {
    out: W,
    failed: bool,
}

impl<W: Write> VcdWriter<W> {
    pub fn new(mut out: W) -> std::io::Result<Self> {
        out.write_all(b"$comment one time unit per CPU cycle $end\n")?;
        out.write_all(b"$timescale 1ns $end\n")?;
        out.write_all(b"$var wire 1 # dq $end\n")?;
        out.write_all(b"$enddefinitions $end\n")?;
        Ok(Self { out, failed: false })
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TraceSink for VcdWriter<W> {
    fn sample(&mut self, cycle: u64, level: bool) {
        if self.failed {
            return;
        }
        let result = writeln!(self.out, "#{cycle}\n{}#", level as u8);
        if let Err(e) = result {
            log::warn!("trace: write failed, disabling waveform capture: {e}");
            self.failed = true;
        }
    }
}
