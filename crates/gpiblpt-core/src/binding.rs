//! Named-operation dispatch
//!
//! Callers outside Rust reach the bus through a fixed set of operation
//! names, each taking positional arguments followed by a timeout in
//! milliseconds. This module validates a call's shape before any bus
//! activity takes place and turns it into a typed [`Call`].
//!
//! | Name                  | Arguments (before the timeout)                          |
//! |-----------------------|---------------------------------------------------------|
//! | `readString`          | address, maxLength, useEOI, useTerminator, terminator   |
//! | `writeString`         | addresses, bytes                                        |
//! | `goToLocal`           | addresses                                               |
//! | `selectedDeviceClear` | addresses                                               |
//! | `groupExecuteTrigger` | addresses                                               |
//! | `deviceClear`         | -                                                       |
//! | `serialPollEnable`    | -                                                       |
//! | `serialPoll`          | address                                                 |
//! | `serialPollDisable`   | -                                                       |
//! | `readSRQ`             | -                                                       |
//!
//! A textual form is provided for scripts: one call per line, arguments
//! separated by whitespace, `#` starting a comment.
//!
//! ```text
//! writeString 5 "*IDN?\n" 1000
//! readString 5 256 1 1 0x0A 1000
//! goToLocal 5,7 1000
//! ```

use core::fmt;
use std::time::Duration;

use crate::controller::{Gpib, ReadOptions, StatusByte};
use crate::error::{Error, Result};
use crate::port::PortIo;
use crate::protocol::command::Address;

/// Operation names and their argument counts, timeout included
pub const OPERATIONS: &[(&str, usize)] = &[
    ("readString", 6),
    ("writeString", 3),
    ("goToLocal", 2),
    ("selectedDeviceClear", 2),
    ("groupExecuteTrigger", 2),
    ("deviceClear", 1),
    ("serialPollEnable", 1),
    ("serialPoll", 2),
    ("serialPollDisable", 1),
    ("readSRQ", 1),
];

/// Largest accepted timeout, in milliseconds
pub const MAX_TIMEOUT_MS: u32 = u16::MAX as u32;

/// A positional argument as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// A scalar integer
    Number(u32),
    /// A list of integers
    List(Vec<u32>),
    /// A byte string
    Bytes(Vec<u8>),
}

/// A validated operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Read a message from one talker
    ReadString {
        /// Talker address
        address: Address,
        /// Termination rules
        options: ReadOptions,
    },
    /// Write a message to a group of listeners
    WriteString {
        /// Listener addresses
        addresses: Vec<Address>,
        /// Bytes to send, terminator included
        data: Vec<u8>,
    },
    /// GTL to a group of listeners
    GoToLocal(Vec<Address>),
    /// SDC to a group of listeners
    SelectedDeviceClear(Vec<Address>),
    /// GET to a group of listeners
    GroupExecuteTrigger(Vec<Address>),
    /// Universal DCL
    DeviceClear,
    /// Universal SPE
    SerialPollEnable,
    /// Read one device's status byte
    SerialPoll(Address),
    /// Universal SPD
    SerialPollDisable,
    /// Sense the SRQ line
    ReadSrq,
}

/// A validated operation together with its timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// What to do
    pub operation: Operation,
    /// Bound on every handshake wait
    pub timeout: Duration,
}

/// Result of executing a [`Call`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The operation has no output
    None,
    /// Bytes read from a talker
    Bytes(Vec<u8>),
    /// A serial poll status byte
    Status(StatusByte),
    /// State of the SRQ line
    Bool(bool),
}

/// Expected argument count for `name`, timeout included
pub fn arg_count(name: &str) -> Option<usize> {
    OPERATIONS
        .iter()
        .find(|(op, _)| *op == name)
        .map(|&(_, count)| count)
}

struct Args<'a> {
    op: &'a str,
    args: &'a [Arg],
}

impl Args<'_> {
    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::invalid_argument(self.op, reason)
    }

    fn number(&self, index: usize, what: &str, max: u32) -> Result<u32> {
        let value = match &self.args[index] {
            Arg::Number(n) => *n,
            Arg::List(list) if list.len() == 1 => list[0],
            other => {
                return Err(self.invalid(format!("{} must be a number, got {:?}", what, other)))
            }
        };
        if value > max {
            return Err(self.invalid(format!("{} {} exceeds {}", what, value, max)));
        }
        Ok(value)
    }

    fn flag(&self, index: usize, what: &str) -> Result<bool> {
        Ok(self.number(index, what, u32::MAX)? != 0)
    }

    fn address(&self, index: usize) -> Result<Address> {
        Ok(Address::new(self.number(index, "address", 0xFF)? as u8))
    }

    fn addresses(&self, index: usize) -> Result<Vec<Address>> {
        let raw = match &self.args[index] {
            Arg::Number(n) => vec![*n],
            Arg::List(list) => list.clone(),
            Arg::Bytes(bytes) => bytes.iter().map(|&b| b as u32).collect(),
        };
        raw.into_iter()
            .map(|n| {
                u8::try_from(n)
                    .map(Address::new)
                    .map_err(|_| self.invalid(format!("address {} out of range", n)))
            })
            .collect()
    }

    fn bytes(&self, index: usize) -> Result<Vec<u8>> {
        match &self.args[index] {
            Arg::Bytes(bytes) => Ok(bytes.clone()),
            Arg::Number(n) => u8::try_from(*n)
                .map(|b| vec![b])
                .map_err(|_| self.invalid(format!("byte value {} out of range", n))),
            Arg::List(list) => list
                .iter()
                .map(|&n| {
                    u8::try_from(n)
                        .map_err(|_| self.invalid(format!("byte value {} out of range", n)))
                })
                .collect(),
        }
    }
}

impl Call {
    /// Validate `name` and `args` (timeout last)
    pub fn parse(name: &str, args: &[Arg]) -> Result<Self> {
        let expected = arg_count(name)
            .ok_or_else(|| Error::invalid_argument(name, "unknown operation"))?;
        if args.len() != expected {
            return Err(Error::invalid_argument(
                name,
                format!("expected {} arguments, got {}", expected, args.len()),
            ));
        }

        let a = Args { op: name, args };
        let timeout_ms = a.number(expected - 1, "timeout", MAX_TIMEOUT_MS)?;

        let operation = match name {
            "readString" => {
                let address = a.address(0)?;
                let max_length = a.number(1, "maxLength", u32::MAX)? as usize;
                let use_eoi = a.flag(2, "useEOI")?;
                let use_terminator = a.flag(3, "useTerminator")?;
                let terminator = a.number(4, "terminator", 0xFF)? as u8;
                Operation::ReadString {
                    address,
                    options: ReadOptions {
                        max_length,
                        use_eoi,
                        terminator: use_terminator.then_some(terminator),
                    },
                }
            }
            "writeString" => Operation::WriteString {
                addresses: a.addresses(0)?,
                data: a.bytes(1)?,
            },
            "goToLocal" => Operation::GoToLocal(a.addresses(0)?),
            "selectedDeviceClear" => Operation::SelectedDeviceClear(a.addresses(0)?),
            "groupExecuteTrigger" => Operation::GroupExecuteTrigger(a.addresses(0)?),
            "deviceClear" => Operation::DeviceClear,
            "serialPollEnable" => Operation::SerialPollEnable,
            "serialPoll" => Operation::SerialPoll(a.address(0)?),
            "serialPollDisable" => Operation::SerialPollDisable,
            "readSRQ" => Operation::ReadSrq,
            _ => return Err(Error::invalid_argument(name, "unknown operation")),
        };

        Ok(Self {
            operation,
            timeout: Duration::from_millis(timeout_ms as u64),
        })
    }

    /// Parse one script line; blank lines and comments yield `None`
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let tokens = tokenize(line)?;
        let Some((name, rest)) = tokens.split_first() else {
            return Ok(None);
        };
        let name = match name {
            Token::Word(w) => w.as_str(),
            Token::Quoted(_) => {
                return Err(Error::invalid_argument(line.trim(), "missing operation name"))
            }
        };
        let args = rest
            .iter()
            .map(|t| t.to_arg(name))
            .collect::<Result<Vec<_>>>()?;
        Self::parse(name, &args).map(Some)
    }

    /// Run the call on a bus
    pub fn execute<P: PortIo>(&self, bus: &mut Gpib<P>) -> Result<Reply> {
        let timeout = self.timeout;
        match &self.operation {
            Operation::ReadString { address, options } => bus
                .read_string(*address, *options, timeout)
                .map(Reply::Bytes),
            Operation::WriteString { addresses, data } => bus
                .write_string(addresses, data, timeout)
                .map(|()| Reply::None),
            Operation::GoToLocal(addresses) => {
                bus.go_to_local(addresses, timeout).map(|()| Reply::None)
            }
            Operation::SelectedDeviceClear(addresses) => bus
                .selected_device_clear(addresses, timeout)
                .map(|()| Reply::None),
            Operation::GroupExecuteTrigger(addresses) => bus
                .group_execute_trigger(addresses, timeout)
                .map(|()| Reply::None),
            Operation::DeviceClear => bus.device_clear(timeout).map(|()| Reply::None),
            Operation::SerialPollEnable => bus.serial_poll_enable(timeout).map(|()| Reply::None),
            Operation::SerialPoll(address) => {
                bus.serial_poll(*address, timeout).map(Reply::Status)
            }
            Operation::SerialPollDisable => {
                bus.serial_poll_disable(timeout).map(|()| Reply::None)
            }
            Operation::ReadSrq => bus.read_srq().map(Reply::Bool),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Bytes(bytes) => write!(f, "\"{}\"", escape_bytes(bytes)),
            Self::Status(status) => write!(
                f,
                "{:#04x}{}",
                status.value(),
                if status.requests_service() { " RQS" } else { "" }
            ),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Render bytes with the escapes accepted by [`unescape`]
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02X}", b)),
        }
    }
    out
}

/// Decode C-style escapes (`\n`, `\r`, `\t`, `\0`, `\\`, `\"`, `\xNN`)
pub fn unescape(s: &str) -> core::result::Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('0') => out.push(0),
            Some('\\') => out.push(b'\\'),
            Some('"') => out.push(b'"'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|_| format!("invalid escape \\x{}", hex))?;
                out.push(byte);
            }
            Some(other) => return Err(format!("invalid escape \\{}", other)),
            None => return Err("trailing backslash".to_string()),
        }
    }
    Ok(out)
}

/// Parse a hex (`0x..`) or decimal number
pub fn parse_number(s: &str) -> core::result::Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex value '{}': {}", s, e))
    } else {
        s.parse::<u32>()
            .map_err(|e| format!("invalid number '{}': {}", s, e))
    }
}

#[derive(Debug)]
enum Token {
    Word(String),
    Quoted(String),
}

impl Token {
    fn to_arg(&self, op: &str) -> Result<Arg> {
        match self {
            Token::Quoted(s) => unescape(s)
                .map(Arg::Bytes)
                .map_err(|e| Error::invalid_argument(op, e)),
            Token::Word(w) => {
                let is_list = w.contains(',') || w.starts_with('[');
                let inner = w.trim_start_matches('[').trim_end_matches(']');
                if is_list {
                    inner
                        .split(',')
                        .filter(|s| !s.trim().is_empty())
                        .map(parse_number)
                        .collect::<core::result::Result<Vec<_>, _>>()
                        .map(Arg::List)
                        .map_err(|e| Error::invalid_argument(op, e))
                } else {
                    parse_number(inner)
                        .map(Arg::Number)
                        .map_err(|e| Error::invalid_argument(op, e))
                }
            }
        }
    }
}

fn tokenize(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '#' {
            break;
        } else if c == '"' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => {
                        s.push('\\');
                        if let Some(escaped) = chars.next() {
                            s.push(escaped);
                        }
                    }
                    _ => s.push(c),
                }
            }
            if !closed {
                return Err(Error::invalid_argument(line.trim(), "unterminated string"));
            }
            tokens.push(Token::Quoted(s));
        } else {
            let mut w = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                w.push(c);
                chars.next();
            }
            tokens.push(Token::Word(w));
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read_string() {
        let args = [
            Arg::Number(5),
            Arg::Number(10),
            Arg::Number(0),
            Arg::Number(1),
            Arg::Number(0x0A),
            Arg::Number(1000),
        ];
        let call = Call::parse("readString", &args).unwrap();
        assert_eq!(call.timeout, Duration::from_millis(1000));
        assert_eq!(
            call.operation,
            Operation::ReadString {
                address: Address::new(5),
                options: ReadOptions::new(10).terminator(0x0A),
            }
        );
    }

    #[test]
    fn test_argument_count_checked() {
        let err = Call::parse("goToLocal", &[Arg::Number(1000)]).unwrap_err();
        assert_eq!(err.id(), "gpiblpt:goToLocal:InvalidArgument");

        let err = Call::parse("deviceClear", &[Arg::Number(1), Arg::Number(2)]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        let err = Call::parse("frobnicate", &[]).unwrap_err();
        assert!(err.to_string().contains("unknown operation"));
    }

    #[test]
    fn test_argument_shape_checked() {
        let err = Call::parse(
            "serialPoll",
            &[Arg::Bytes(b"x".to_vec()), Arg::Number(100)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        let err = Call::parse("readSRQ", &[Arg::Number(70000)]).unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_parse_line() {
        let call = Call::parse_line(r#"writeString 5,7 "*IDN?\n" 500"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            call.operation,
            Operation::WriteString {
                addresses: vec![Address::new(5), Address::new(7)],
                data: b"*IDN?\n".to_vec(),
            }
        );
        assert_eq!(call.timeout, Duration::from_millis(500));

        let call = Call::parse_line("goToLocal [3] 0x10 # comment").unwrap().unwrap();
        assert_eq!(call.operation, Operation::GoToLocal(vec![Address::new(3)]));
        assert_eq!(call.timeout, Duration::from_millis(16));

        assert!(Call::parse_line("   # only a comment").unwrap().is_none());
        assert!(Call::parse_line("").unwrap().is_none());
        assert!(Call::parse_line(r#"writeString 1 "open 100"#).is_err());
    }

    #[test]
    fn test_escapes() {
        assert_eq!(unescape(r"a\x0Ab\\").unwrap(), b"a\nb\\".to_vec());
        assert!(unescape(r"\q").is_err());
        assert_eq!(escape_bytes(b"OK\r\n\x01"), r"OK\r\n\x01");
    }

    #[test]
    fn test_every_operation_parses() {
        for &(name, count) in OPERATIONS {
            let mut args = vec![Arg::Number(1); count];
            if name == "writeString" {
                args[1] = Arg::Bytes(b"x".to_vec());
            }
            assert!(Call::parse(name, &args).is_ok(), "{} failed", name);
        }
    }

    #[test]
    fn test_unknown_operation_is_an_error() {
        for name in ["frobnicate", "readstring", "ReadSRQ", ""] {
            let err = Call::parse(name, &[Arg::Number(1)]).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument { .. }));
            assert_eq!(err.id(), format!("gpiblpt:{}:InvalidArgument", name));
        }
        assert!(Call::parse_line("frobnicate 1 100").is_err());
    }
}
