// Operator command parsing.
//
// A command line is a verb plus an optional argument string. Addresses are
// hex (`$1F00`, `0x1f00` or `1f00`); counts are decimal.

use thiserror::Error;

/// Bytes shown by `examine` when no count is given.
pub const DEFAULT_EXAMINE: usize = 16;

/// Largest `examine` count: the whole 64K address space.
pub const MAX_EXAMINE: usize = 0x1_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Step(u32),
    Continue,
    Run,
    Break(u16),
    Clear,
    Examine { addr: u16, count: usize },
    Regs,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    UnknownVerb(String),
    #[error("'{0}' needs an argument: {1}")]
    MissingArgument(&'static str, &'static str),
    #[error("bad number '{0}'")]
    BadNumber(String),
    #[error("count {0} exceeds the 64K address space")]
    TooMany(usize),
}

pub const HELP: &str = "\
commands:
  s, step [n]            execute n instructions (default 1), trace the last
  c, continue            run until breakpoint or interrupt
  r, run                 reset the CPU, then continue
  b, break <addr>        set the breakpoint
  clear                  remove the breakpoint
  x, examine <addr> [n]  dump n bytes (default 16)
  regs                   show CPU registers
  q, quit                leave the monitor";

impl Command {
    /// Parse one line. Returns `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        let arg2 = words.next();

        let cmd = match verb {
            "s" | "step" => Command::Step(match arg {
                Some(n) => parse_count(n)?,
                None => 1,
            }),
            "c" | "cont" | "continue" => Command::Continue,
            "r" | "run" => Command::Run,
            "b" | "break" => {
                let addr = arg.ok_or(CommandError::MissingArgument("break", "<addr>"))?;
                Command::Break(parse_hex_addr(addr)?)
            }
            "clear" => Command::Clear,
            "x" | "examine" => {
                let addr = arg.ok_or(CommandError::MissingArgument("examine", "<addr>"))?;
                Command::Examine {
                    addr: parse_hex_addr(addr)?,
                    count: match arg2 {
                        Some(n) => match parse_count(n)? as usize {
                            count if count > MAX_EXAMINE => {
                                return Err(CommandError::TooMany(count))
                            }
                            count => count,
                        },
                        None => DEFAULT_EXAMINE,
                    },
                }
            }
            "regs" => Command::Regs,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::UnknownVerb(other.to_string())),
        };
        Ok(Some(cmd))
    }
}

/// Parse an address, accepting `$`, `0x` or bare hex.
pub fn parse_hex_addr(s: &str) -> Result<u16, CommandError> {
    let s = s.trim();
    let hex = if let Some(h) = s.strip_prefix('$') {
        h
    } else if let Some(h) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        h
    } else {
        s
    };
    u16::from_str_radix(hex, 16).map_err(|_| CommandError::BadNumber(s.to_string()))
}

fn parse_count(s: &str) -> Result<u32, CommandError> {
    s.parse()
        .map_err(|_| CommandError::BadNumber(s.to_string()))
}
