#[allow(dead_code)]
mod mcu;
mod config;
mod cpu;
mod error;
mod image;
mod monitor;
mod terminal;

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use config::{Config, SerialKind, TimerConfig};
use cpu::CpuVariant;
use error::{Error, Result};
use image::Image;
use mcu::bus::SystemBus;
use mcu::memory::Memory;
use mcu::trace::VcdWriter;
use monitor::command::{self, Command};
use monitor::{Flow, InputSource, Monitor, NoInput, Pacer, StopReason, StopToken};

// ─────────────────────────────────────────────────────────────────────────────
//  Command line
// ─────────────────────────────────────────────────────────────────────────────

/// Run a microcontroller program against emulated serial and timer
/// peripherals, under an interactive step / breakpoint monitor.
#[derive(Parser, Debug)]
#[command(name = "mcumon", version)]
struct Args {
    /// Program image: S-record text or raw binary.
    image: PathBuf,

    /// Config file (default: per-user config.json).
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    cpu: Option<CpuVariant>,

    /// CPU clock in Hz, used for real-time pacing.
    #[arg(long)]
    clock_hz: Option<f64>,

    /// Run as fast as possible instead of at the configured clock.
    #[arg(long)]
    no_realtime: bool,

    #[arg(long, value_enum)]
    serial_kind: Option<SerialKind>,

    /// Serial device base address (hex).
    #[arg(long, value_parser = command::parse_hex_addr)]
    serial_base: Option<u16>,

    /// Timer base address (hex).
    #[arg(long, value_parser = command::parse_hex_addr)]
    timer_base: Option<u16>,

    /// Leave the timer unattached.
    #[arg(long, conflicts_with = "timer_base")]
    no_timer: bool,

    /// Load address for raw binary images (hex).
    #[arg(long, value_parser = command::parse_hex_addr, default_value = "0")]
    load_addr: u16,

    /// Start address, overriding the reset vector and the image's entry.
    #[arg(long, value_parser = command::parse_hex_addr)]
    entry: Option<u16>,

    /// Initial breakpoint (hex).
    #[arg(long = "break", value_parser = command::parse_hex_addr)]
    breakpoint: Option<u16>,

    /// Write pin activity at $0000 to this VCD file.
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Headless: run this many cycles, print the PC and exit.
    #[arg(long)]
    cycles: Option<u64>,
}

impl Args {
    /// Fold command-line overrides into `config`.
    fn apply(&self, config: &mut Config) {
        if let Some(cpu) = self.cpu {
            config.cpu = cpu;
        }
        if let Some(hz) = self.clock_hz {
            config.clock_hz = hz;
        }
        if self.no_realtime {
            config.realtime = false;
        }
        if let Some(kind) = self.serial_kind {
            config.serial.kind = kind;
        }
        if let Some(base) = self.serial_base {
            config.serial.base = base;
        }
        if let Some(base) = self.timer_base {
            config.timer = Some(TimerConfig { base });
        }
        if self.no_timer {
            config.timer = None;
        }
        if let Some(bp) = self.breakpoint {
            config.breakpoint = Some(bp);
        }
        if let Some(path) = &self.trace {
            config.trace_file = Some(path.clone());
        }
        if let Some(n) = self.cycles {
            config.cycle_limit = Some(n);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Machine setup
// ─────────────────────────────────────────────────────────────────────────────

fn build_bus(config: &Config, image: &Image) -> Result<SystemBus> {
    let mut memory = Memory::new(config.memory_size)?;
    image.place_into(&mut memory)?;
    let mut bus = SystemBus::new(memory);

    let serial = &config.serial;
    match serial.kind {
        SerialKind::Acia => bus.attach_acia(serial.base, terminal::stdout_sink())?,
        SerialKind::Sci => bus.attach_sci(serial.base, terminal::stdout_sink())?,
    }
    if let Some(timer) = &config.timer {
        bus.attach_timer(timer.base)?;
    }

    if let Some(path) = &config.trace_file {
        let file = File::create(path).map_err(|source| Error::File {
            path: path.clone(),
            source,
        })?;
        let vcd = VcdWriter::new(BufWriter::new(file)).map_err(|source| Error::File {
            path: path.clone(),
            source,
        })?;
        bus.set_trace_sink(Box::new(vcd));
        log::info!("Tracing pin writes to {}", path.display());
    }

    Ok(bus)
}

// ─────────────────────────────────────────────────────────────────────────────
//  Front ends
// ─────────────────────────────────────────────────────────────────────────────

fn run_headless(monitor: &mut Monitor) -> Result<()> {
    let reason = monitor.cont();
    let regs = monitor.registers();
    match reason {
        StopReason::Breakpoint(pc) => log::info!("Stopped at breakpoint ${pc:04X}"),
        StopReason::Interrupted => log::info!("Interrupted"),
        StopReason::CycleLimit => {}
    }
    let mut out = io::stdout().lock();
    writeln!(out)?;
    writeln!(out, "PC=${:04X} after {} cycles", regs.pc, monitor.total_cycles())?;
    Ok(())
}

fn run_interactive(monitor: &mut Monitor) -> Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();

    println!("mcumon {} - type 'help' for commands", env!("CARGO_PKG_VERSION"));
    println!("{}", monitor.registers());

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            return Ok(());
        }

        let cmd = match Command::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        let reason = match cmd {
            Command::Continue => with_raw_keys(|| monitor.cont()),
            Command::Run => with_raw_keys(|| monitor.run()),
            cmd => {
                if monitor.execute(cmd, &mut io::stdout().lock())? == Flow::Quit {
                    return Ok(());
                }
                continue;
            }
        };
        monitor.report_stop(reason, &mut io::stdout().lock())?;
    }
}

/// Run `f` with the keyboard in raw mode so keys reach the serial device.
/// The terminal is restored before returning.
fn with_raw_keys<T>(f: impl FnOnce() -> T) -> T {
    let _raw = terminal::RawMode::enter()
        .inspect_err(|e| log::warn!("Cannot switch terminal to raw mode: {e}"))
        .ok();
    f()
}

/// Start address: `--entry`, else the image's entry if it fits in 16 bits.
fn entry_address(cli: Option<u16>, image: Option<u32>) -> Option<u16> {
    if cli.is_some() {
        return cli;
    }
    let entry = image?;
    match u16::try_from(entry) {
        Ok(pc) => Some(pc),
        Err(_) => {
            log::warn!("Image entry ${entry:08X} is beyond $FFFF, using the reset vector");
            None
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    args.apply(&mut config);
    config.validate()?;

    let image = Image::load(&args.image, args.load_addr)?;
    if image.is_empty() {
        log::warn!("{} contains no data", args.image.display());
    }
    let bus = build_bus(&config, &image)?;

    let mut core = cpu::build_core(config.cpu, bus);
    core.reset();
    if let Some(pc) = entry_address(args.entry, image.entry) {
        core.set_pc(pc);
    }

    let stop = StopToken::new();
    terminal::install_interrupt_handler(&stop);

    let headless = args.cycles.is_some();
    let input: Box<dyn InputSource> = if headless {
        Box::new(NoInput)
    } else {
        Box::new(terminal::KeyboardInput::new(stop.clone()))
    };
    let pacer = Pacer::new(config.clock_hz, config.realtime);

    let mut monitor = Monitor::new(core, input, pacer, stop);
    monitor.set_cycle_limit(config.cycle_limit);
    if let Some(bp) = config.breakpoint {
        monitor.set_breakpoint(bp);
    }

    log::info!(
        "{} core, {:#x} bytes RAM, {} Hz{}",
        config.cpu,
        config.memory_size,
        config.clock_hz,
        if config.realtime { "" } else { " (unpaced)" }
    );

    if headless {
        run_headless(&mut monitor)
    } else {
        run_interactive(&mut monitor)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Entry point
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_address_precedence() {
        assert_eq!(entry_address(Some(0x0200), Some(0x0400)), Some(0x0200));
        assert_eq!(entry_address(None, Some(0x0400)), Some(0x0400));
        assert_eq!(entry_address(None, None), None);
    }

    #[test]
    fn test_entry_address_beyond_16_bits_ignored() {
        assert_eq!(entry_address(None, Some(0x0001_0000)), None);
        assert_eq!(entry_address(Some(0x0100), Some(0x0001_0000)), Some(0x0100));
    }
}
