//! CLI argument parsing

use crate::providers;
use clap::{Parser, Subcommand};
use gpiblpt_core::binding::{parse_number, MAX_TIMEOUT_MS};
use std::path::PathBuf;

/// Parse a hex or decimal byte
fn parse_byte(s: &str) -> Result<u8, String> {
    let n = parse_number(s)?;
    u8::try_from(n).map_err(|_| format!("{} does not fit in a byte", n))
}

/// Parse a hex or decimal timeout in milliseconds
fn parse_timeout(s: &str) -> Result<u16, String> {
    let n = parse_number(s)?;
    u16::try_from(n).map_err(|_| format!("timeout must be at most {} ms", MAX_TIMEOUT_MS))
}

/// Generate dynamic help text for the provider argument
fn provider_help() -> String {
    format!(
        "Port I/O provider [available: {}]",
        providers::provider_names_short()
    )
}

#[derive(Parser)]
#[command(name = "gpiblpt")]
#[command(author, version, about = "GPIB controller on a parallel port", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short, long, global = true, default_value = "lpt", help = provider_help())]
    pub provider: String,

    /// Handshake timeout in milliseconds
    #[arg(short, long, global = true, default_value = "1000", value_parser = parse_timeout)]
    pub timeout: u16,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a message from a talker
    ReadString {
        /// Talker address (0-30)
        #[arg(value_parser = parse_byte)]
        address: u8,

        /// Maximum number of bytes to read
        #[arg(short = 'n', long, default_value = "256")]
        max_length: usize,

        /// Stop after a byte sent with EOI
        #[arg(long)]
        eoi: bool,

        /// Stop after this byte (e.g. 0x0A)
        #[arg(long, value_parser = parse_byte)]
        terminator: Option<u8>,
    },

    /// Send a message to one or more listeners
    WriteString {
        /// Listener addresses (comma-separated)
        #[arg(value_delimiter = ',', num_args = 1, required = true, value_parser = parse_byte)]
        addresses: Vec<u8>,

        /// Message; `\n`, `\r`, `\t`, `\0`, `\\`, `\"` and `\xNN` escapes are decoded
        message: String,
    },

    /// Return devices to local control (GTL)
    GoToLocal {
        /// Device addresses (comma-separated)
        #[arg(value_delimiter = ',', required = true, value_parser = parse_byte)]
        addresses: Vec<u8>,
    },

    /// Clear selected devices (SDC)
    SelectedDeviceClear {
        /// Device addresses (comma-separated)
        #[arg(value_delimiter = ',', required = true, value_parser = parse_byte)]
        addresses: Vec<u8>,
    },

    /// Trigger devices simultaneously (GET)
    GroupExecuteTrigger {
        /// Device addresses (comma-separated)
        #[arg(value_delimiter = ',', required = true, value_parser = parse_byte)]
        addresses: Vec<u8>,
    },

    /// Clear every device on the bus (DCL)
    DeviceClear,

    /// Enter serial poll mode (SPE)
    SerialPollEnable,

    /// Read one device's status byte
    ///
    /// Follow serial-poll-enable and precede serial-poll-disable when
    /// polling by hand; use `poll` to do all three at once.
    SerialPoll {
        /// Device address
        #[arg(value_parser = parse_byte)]
        address: u8,
    },

    /// Leave serial poll mode (SPD)
    SerialPollDisable,

    /// Serial poll a list of devices: SPE, one poll per device, SPD
    Poll {
        /// Device addresses (comma-separated)
        #[arg(value_delimiter = ',', required = true, value_parser = parse_byte)]
        addresses: Vec<u8>,
    },

    /// Report whether any device asserts SRQ
    ReadSrq,

    /// Execute a script of operations, one per line
    ///
    /// Each line is `<operation> <args...> <timeout ms>`, e.g.
    /// `readString 5 256 1 1 0x0A 1000`. Blank lines and `#` comments are
    /// skipped.
    Run {
        /// Script file (stdin if omitted)
        script: Option<PathBuf>,

        /// Continue after a failing line
        #[arg(short, long)]
        keep_going: bool,
    },

    /// List available providers
    ListProviders,

    /// List operations accepted by `run`
    ListOperations,
}
