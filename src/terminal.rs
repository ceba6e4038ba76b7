// Host terminal plumbing: raw keyboard mode while the machine runs,
// non-blocking key polling, Ctrl-C as a stop request and serial output.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::mcu::device::TransmitSink;
use crate::monitor::{InputSource, StopToken};

/// Serial transmit sink that writes each byte straight to stdout.
///
/// Raw mode turns off output post-processing, so a bare LF is expanded to
/// CR LF while it is active.
pub fn stdout_sink() -> Box<dyn TransmitSink> {
    Box::new(|byte: u8| {
        let raw = terminal::is_raw_mode_enabled().unwrap_or(false);
        let bytes: &[u8] = if byte == b'\n' && raw { b"\r\n" } else { &[byte] };
        let mut out = io::stdout().lock();
        if let Err(e) = out.write_all(bytes).and_then(|_| out.flush()) {
            log::debug!("terminal: dropping output byte: {e}");
        }
    })
}

/// Keyboard in raw mode until dropped.
pub struct RawMode(());

impl RawMode {
    pub fn enter() -> io::Result<RawMode> {
        terminal::enable_raw_mode()?;
        Ok(RawMode(()))
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("terminal: cannot restore terminal mode: {e}");
        }
    }
}

/// The byte a serial terminal would send for `key`. Ctrl-C is not a byte;
/// it is handled by [`KeyboardInput`] as a stop request.
pub fn key_to_byte(key: &KeyEvent) -> Option<u8> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char(c) if c.is_ascii() => {
            let b = c as u8;
            if key.modifiers.contains(KeyModifiers::CONTROL) && b.is_ascii_alphabetic() {
                Some(b.to_ascii_uppercase() & 0x1F)
            } else {
                Some(b)
            }
        }
        KeyCode::Enter => Some(b'\r'),
        KeyCode::Tab => Some(b'\t'),
        KeyCode::Backspace => Some(0x08),
        KeyCode::Esc => Some(0x1B),
        _ => None,
    }
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.kind == KeyEventKind::Press
        && key.code == KeyCode::Char('c')
        && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Polls the keyboard without blocking. Raw mode swallows SIGINT, so
/// Ctrl-C arrives here as a key and is turned into a stop request.
pub struct KeyboardInput {
    stop: StopToken,
}

impl KeyboardInput {
    pub fn new(stop: StopToken) -> Self {
        Self { stop }
    }
}

impl InputSource for KeyboardInput {
    fn poll_byte(&mut self) -> Option<u8> {
        match event::poll(Duration::ZERO) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                log::debug!("terminal: poll failed: {e}");
                return None;
            }
        }
        match event::read() {
            Ok(Event::Key(key)) if is_interrupt(&key) => {
                self.stop.request();
                None
            }
            Ok(Event::Key(key)) => key_to_byte(&key),
            Ok(_) => None,
            Err(e) => {
                log::debug!("terminal: read failed: {e}");
                None
            }
        }
    }
}

#[cfg(unix)]
mod signal {
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, OnceLock};

    use super::StopToken;

    static STOP_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

    extern "C" fn on_sigint(_: libc::c_int) {
        if let Some(flag) = STOP_FLAG.get() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Route SIGINT to `stop` instead of terminating the process.
    pub fn install_interrupt_handler(stop: &StopToken) {
        if STOP_FLAG.set(stop.flag()).is_err() {
            log::warn!("terminal: interrupt handler already installed");
            return;
        }
        let handler = on_sigint as extern "C" fn(libc::c_int);
        // SAFETY: the handler only performs an atomic store.
        let prev = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
        if prev == libc::SIG_ERR {
            log::warn!(
                "terminal: cannot install SIGINT handler: {}",
                io::Error::last_os_error()
            );
        }
    }
}

#[cfg(not(unix))]
mod signal {
    use super::StopToken;

    pub fn install_interrupt_handler(_stop: &StopToken) {
        log::warn!("terminal: Ctrl-C outside raw mode is not caught on this platform");
    }
}

pub use signal::install_interrupt_handler;

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_printable_keys() {
        assert_eq!(key_to_byte(&key(KeyCode::Char('a'), KeyModifiers::NONE)), Some(b'a'));
        assert_eq!(key_to_byte(&key(KeyCode::Char('Z'), KeyModifiers::SHIFT)), Some(b'Z'));
        assert_eq!(key_to_byte(&key(KeyCode::Enter, KeyModifiers::NONE)), Some(b'\r'));
        assert_eq!(key_to_byte(&key(KeyCode::Backspace, KeyModifiers::NONE)), Some(0x08));
        assert_eq!(key_to_byte(&key(KeyCode::Char('é'), KeyModifiers::NONE)), None);
        assert_eq!(key_to_byte(&key(KeyCode::F(1), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_control_keys() {
        assert_eq!(key_to_byte(&key(KeyCode::Char('d'), KeyModifiers::CONTROL)), Some(0x04));
        assert!(is_interrupt(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_interrupt(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
    }

    #[test]
    fn test_key_release_ignored() {
        let mut release = key(KeyCode::Char('a'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(key_to_byte(&release), None);
        release.code = KeyCode::Char('c');
        release.modifiers = KeyModifiers::CONTROL;
        assert!(!is_interrupt(&release));
    }
}
