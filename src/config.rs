// Machine configuration: memory, clock, CPU variant and device placement.
// Stored as JSON in <config_dir>/mcumon/config.json, or given with --config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cpu::CpuVariant;
use crate::error::{Error, Result};

pub const DEFAULT_MEMORY_SIZE: usize = 0x2000;
pub const DEFAULT_CLOCK_HZ: f64 = 3_500_000.0;
pub const DEFAULT_SERIAL_BASE: u16 = 0x0010;
pub const DEFAULT_TIMER_BASE: u16 = 0x0008;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SerialKind {
    /// 6850-style ACIA, two addresses.
    #[default]
    Acia,
    /// 68HC05 SCI, five addresses.
    Sci,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub kind: SerialKind,
    pub base: u16,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            kind: SerialKind::Acia,
            base: DEFAULT_SERIAL_BASE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub base: u16,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_TIMER_BASE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RAM size in bytes. Power of two; addresses above it mirror.
    pub memory_size: usize,
    /// CPU clock used to pace execution in real time.
    pub clock_hz: f64,
    /// Pace to `clock_hz`. When false, run as fast as possible.
    pub realtime: bool,
    pub cpu: CpuVariant,
    pub serial: SerialConfig,
    /// `None` leaves the timer unattached.
    pub timer: Option<TimerConfig>,
    /// VCD file receiving writes to the pin at $0000.
    pub trace_file: Option<PathBuf>,
    /// Cycles a single continue may run before halting.
    pub cycle_limit: Option<u64>,
    /// Breakpoint set before the first prompt.
    pub breakpoint: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            clock_hz: DEFAULT_CLOCK_HZ,
            realtime: true,
            cpu: CpuVariant::default(),
            serial: SerialConfig::default(),
            timer: Some(TimerConfig::default()),
            trace_file: None,
            cycle_limit: None,
            breakpoint: None,
        }
    }
}

impl Config {
    /// Path to the per-user config file.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|d| d.join("config.json"))
    }

    /// Load an explicitly named config file. Any problem is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        log::info!("Config loaded from {}", path.display());
        Ok(config)
    }

    /// Load the per-user config, or return defaults if missing / invalid.
    pub fn load() -> Self {
        let path = match Self::config_path() {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring config: {e}");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let size = self.memory_size;
        if size == 0 || size > 0x1_0000 || !size.is_power_of_two() {
            return Err(Error::MemorySize(size));
        }
        if !(self.clock_hz.is_finite() && self.clock_hz > 0.0) {
            return Err(Error::Config(format!(
                "clock_hz must be positive, got {}",
                self.clock_hz
            )));
        }
        if self.cycle_limit == Some(0) {
            return Err(Error::Config("cycle_limit must be at least 1".into()));
        }
        Ok(())
    }
}

fn config_dir() -> Option<PathBuf> {
    // macOS:   ~/Library/Application Support/mcumon/
    // Linux:   ~/.config/mcumon/
    // Windows: %APPDATA%/mcumon/

    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").ok()?;
        Some(
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("mcumon"),
        )
    }

    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").ok()?;
        Some(PathBuf::from(appdata).join("mcumon"))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let home = std::env::var("HOME").ok()?;
        Some(PathBuf::from(home).join(".config").join("mcumon"))
    }
}
