//! Console command grammar.
//!
//! Lines are case-insensitive. Two-letter commands take either `=<decimal>`
//! or space separated hex operands (`sp=150`, `wb 1f 7a`); single-letter
//! commands carry a decimal suffix (`p3`, `s1`, `v114=185`).

use crate::{
    error::CommandError,
    store::{NO_OF_PROFILES, STORE_WORDS},
};

pub const STORE_BYTES: usize = STORE_WORDS * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemQuery {
    Version,
    BusScan,
    Tasks,
    OneWire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Empty,
    Setpoint(Option<i32>),
    Pid(Option<i32>),
    ReadByte(usize),
    ReadWord(usize),
    WriteByte(usize, u8),
    WriteWord(usize, u16),
    DumpBlock(usize),
    System(SystemQuery),
    SetValue { addr: usize, value: i32 },
}

enum Operands<'a> {
    None,
    Decimal(&'a str),
    Hex(Vec<&'a str>),
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim().to_ascii_lowercase();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let bad = || CommandError::BadOperand(line.clone());

    if line.chars().nth(1).is_some_and(|c| c.is_ascii_alphabetic()) {
        let split = line.find([' ', '=']).unwrap_or(line.len());
        let (name, rest) = line.split_at(split);
        let operands = if let Some(decimal) = rest.strip_prefix('=') {
            Operands::Decimal(decimal.trim())
        } else if rest.is_empty() {
            Operands::None
        } else {
            Operands::Hex(rest.split_whitespace().collect())
        };

        return match (name, operands) {
            ("sp", Operands::None) => Ok(Command::Setpoint(None)),
            ("sp", Operands::Decimal(value)) => {
                Ok(Command::Setpoint(Some(decimal(value).ok_or_else(bad)?)))
            }
            ("pid", Operands::None) => Ok(Command::Pid(None)),
            ("pid", Operands::Decimal(value)) => {
                Ok(Command::Pid(Some(decimal(value).ok_or_else(bad)?)))
            }
            ("rb", Operands::Hex(args)) if args.len() == 1 => {
                Ok(Command::ReadByte(byte_addr(args[0]).ok_or_else(bad)?))
            }
            ("rw", Operands::Hex(args)) if args.len() == 1 => {
                Ok(Command::ReadWord(word_addr(args[0]).ok_or_else(bad)?))
            }
            ("wb", Operands::Hex(args)) if args.len() == 2 => {
                let addr = byte_addr(args[0]).ok_or_else(bad)?;
                let value = u8::from_str_radix(args[1], 16).map_err(|_| bad())?;
                Ok(Command::WriteByte(addr, value))
            }
            ("ww", Operands::Hex(args)) if args.len() == 2 => {
                let addr = word_addr(args[0]).ok_or_else(bad)?;
                let value = u16::from_str_radix(args[1], 16).map_err(|_| bad())?;
                Ok(Command::WriteWord(addr, value))
            }
            ("sp" | "pid" | "rb" | "rw" | "wb" | "ww", _) => Err(bad()),
            _ => Err(CommandError::UnknownCommand(line.clone())),
        };
    }

    let mut chars = line.chars();
    let letter = chars.next().unwrap_or_default();
    let rest = chars.as_str();
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, tail) = rest.split_at(digits_end);

    match letter {
        'p' | 's' | 'v' if digits.is_empty() => Err(bad()),
        'p' => {
            let block: usize = digits.parse().map_err(|_| bad())?;
            if !tail.is_empty() || block > NO_OF_PROFILES {
                return Err(bad());
            }
            Ok(Command::DumpBlock(block))
        }
        's' => {
            if !tail.is_empty() {
                return Err(bad());
            }
            match digits {
                "0" => Ok(Command::System(SystemQuery::Version)),
                "1" => Ok(Command::System(SystemQuery::BusScan)),
                "2" => Ok(Command::System(SystemQuery::Tasks)),
                "3" => Ok(Command::System(SystemQuery::OneWire)),
                _ => Err(bad()),
            }
        }
        'v' => {
            let addr: usize = digits.parse().map_err(|_| bad())?;
            let value = tail.strip_prefix('=').and_then(decimal).ok_or_else(bad)?;
            if addr >= STORE_WORDS {
                return Err(bad());
            }
            Ok(Command::SetValue { addr, value })
        }
        _ => Err(CommandError::UnknownCommand(line.clone())),
    }
}

fn decimal(text: &str) -> Option<i32> {
    text.trim().parse().ok()
}

fn byte_addr(text: &str) -> Option<usize> {
    let addr = usize::from_str_radix(text, 16).ok()?;
    (addr < STORE_BYTES).then_some(addr)
}

/// Word access goes through even byte addresses.
fn word_addr(text: &str) -> Option<usize> {
    byte_addr(text).filter(|addr| addr % 2 == 0)
}

/// `p<n>` response: the block number followed by its comma separated values.
pub fn format_block(block: usize, values: &[i16]) -> String {
    let joined = values
        .iter()
        .map(i16::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("p{block} {joined}")
}

pub fn format_bus_scan(devices: &[u8]) -> String {
    if devices.is_empty() {
        return "I2C: -".to_string();
    }
    let list = devices
        .iter()
        .map(|addr| format!("0x{addr:02x}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("I2C: {list}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn code(line: &str) -> &'static str {
        match parse(line) {
            Ok(command) => panic!("`{line}` parsed as {command:?}"),
            Err(err) => err.code(),
        }
    }

    #[test]
    fn setpoint_and_pid_forms() {
        assert_eq!(parse("sp"), Ok(Command::Setpoint(None)));
        assert_eq!(parse("SP=150\r"), Ok(Command::Setpoint(Some(150))));
        assert_eq!(parse("sp=-25"), Ok(Command::Setpoint(Some(-25))));
        assert_eq!(parse("pid"), Ok(Command::Pid(None)));
        assert_eq!(parse("PID=1001"), Ok(Command::Pid(Some(1001))));
    }

    #[test]
    fn debug_access_uses_hex_operands() {
        assert_eq!(parse("rb 1f"), Ok(Command::ReadByte(0x1f)));
        assert_eq!(parse("rw e4"), Ok(Command::ReadWord(0xe4)));
        assert_eq!(parse("wb 10 FF"), Ok(Command::WriteByte(0x10, 0xff)));
        assert_eq!(parse("ww 0 00c8"), Ok(Command::WriteWord(0, 200)));
    }

    #[test]
    fn single_letter_commands() {
        assert_eq!(parse("p0"), Ok(Command::DumpBlock(0)));
        assert_eq!(parse("p6"), Ok(Command::DumpBlock(6)));
        assert_eq!(parse("s2"), Ok(Command::System(SystemQuery::Tasks)));
        assert_eq!(
            parse("v114=185"),
            Ok(Command::SetValue {
                addr: 114,
                value: 185
            })
        );
        assert_eq!(parse("   "), Ok(Command::Empty));
    }

    #[test]
    fn malformed_operands_are_number_errors() {
        assert_eq!(code("sp=warm"), "ERR_NUM");
        assert_eq!(code("sp 96"), "ERR_NUM");
        assert_eq!(code("rb"), "ERR_NUM");
        assert_eq!(code("rb zz"), "ERR_NUM");
        assert_eq!(code("rw 3"), "ERR_NUM");
        assert_eq!(code("rb 114"), "ERR_NUM");
        assert_eq!(code("wb 10"), "ERR_NUM");
        assert_eq!(code("wb 10 100"), "ERR_NUM");
        assert_eq!(code("p7"), "ERR_NUM");
        assert_eq!(code("p"), "ERR_NUM");
        assert_eq!(code("s4"), "ERR_NUM");
        assert_eq!(code("v138=1"), "ERR_NUM");
        assert_eq!(code("v114"), "ERR_NUM");
    }

    #[test]
    fn unknown_mnemonics_are_command_errors() {
        assert_eq!(code("xx"), "ERR_CMD");
        assert_eq!(code("hello=1"), "ERR_CMD");
        assert_eq!(code("q1"), "ERR_CMD");
        assert_eq!(code("7"), "ERR_CMD");
    }

    #[test]
    fn block_and_bus_formatting() {
        assert_eq!(format_block(2, &[160, 24, -8]), "p2 160,24,-8");
        assert_eq!(format_bus_scan(&[]), "I2C: -");
        assert_eq!(format_bus_scan(&[0x18, 0x30]), "I2C: 0x18 0x30");
    }
}
