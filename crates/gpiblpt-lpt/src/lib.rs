//! gpiblpt-lpt - parallel port I/O provider
//!
//! This crate gives [`gpiblpt_core`] access to a real parallel port by
//! reading and writing the I/O port space through `/dev/port`.
//!
//! # Usage with gpiblpt CLI
//!
//! ```bash
//! # PCI parallel card with registers at 0xD010 and ECR at 0xD002 (defaults)
//! gpiblpt -p lpt read-string 5 --terminator 0x0A
//!
//! # Motherboard port at 0x378 (ECR at 0x778)
//! gpiblpt -p lpt:base=0x378 device-clear
//!
//! # Explicit registers
//! gpiblpt -p lpt:data=0xE000,status=0xE001,control=0xE002,ecr=0xE402 read-srq
//! ```
//!
//! # Cable
//!
//! | LPT  | 1 | 2 | 3 | 4 | 5 | 6  | 7  | 8  | 9  | 10 | 11 | 12 | 13 |
//! |------|---|---|---|---|---|----|----|----|----|----|----|----|----|
//! | GPIB | 6 | 1 | 2 | 3 | 4 | 13 | 14 | 15 | 16 | 10 | 5  | 6  | 8  |
//!
//! | LPT  | 14 | 15 | 16 | 17 | 18 | 19 | 20 | 21 | 22 | 23 | 24 | 25 | shield |
//! |------|----|----|----|----|----|----|----|----|----|----|----|----|--------|
//! | GPIB | 7  | 7  | 11 | 8  | 18 | 19 | 20 | 21 | 22 | 23 | 24 | 17 | 12     |

pub mod device;
pub mod error;

use std::path::PathBuf;

use gpiblpt_core::port::PortMap;

pub use device::{DevPort, LptConfig, DEFAULT_DEVICE};
pub use error::{LptError, Result};

fn parse_port(name: &'static str, value: &str) -> Result<u16> {
    let value = value.trim();
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        value.parse::<u16>()
    };
    parsed.map_err(|_| LptError::InvalidParameter {
        name,
        value: value.to_string(),
    })
}

/// Parse provider options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/port` - port device path
/// - `base=N` - data register address; status and control follow it and
///   the ECR sits at `base + 0x402`
/// - `data=N`, `status=N`, `control=N`, `ecr=N` - individual register
///   addresses, applied after `base`
pub fn parse_options(options: &[(&str, &str)]) -> Result<LptConfig> {
    let mut config = LptConfig::default();

    if let Some((_, base)) = options.iter().find(|(key, _)| *key == "base") {
        config.map = PortMap::from_base(parse_port("base", base)?);
    }

    for (key, value) in options {
        match *key {
            "dev" => config.device = PathBuf::from(*value),
            "base" => {}
            "data" => config.map.data = parse_port("data", value)?,
            "status" => config.map.status = parse_port("status", value)?,
            "control" => config.map.control = parse_port("control", value)?,
            "ecr" => config.map.ecr = parse_port("ecr", value)?,
            other => return Err(LptError::UnknownParameter(other.to_string())),
        }
    }

    Ok(config)
}

/// Open the parallel port provider from CLI-style options
///
/// Returns the provider together with the register map it should be
/// driven with.
pub fn open_lpt(
    options: &[(&str, &str)],
) -> std::result::Result<(DevPort, PortMap), Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let port = DevPort::open(&config.device)?;
    log::info!(
        "lpt: data {:#06x}, status {:#06x}, control {:#06x}, ecr {:#06x}",
        config.map.data,
        config.map.status,
        config.map.control,
        config.map.ecr
    );
    Ok((port, config.map))
}
