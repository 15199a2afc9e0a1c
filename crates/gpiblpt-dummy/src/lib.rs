//! gpiblpt-dummy - simulated GPIB bus for testing
//!
//! This crate provides a [`PortIo`](gpiblpt_core::PortIo) provider that
//! models the parallel port registers, the cable and a set of instruments
//! behind it. It's useful for exercising the controller without hardware
//! or root.
//!
//! # Usage with gpiblpt CLI
//!
//! ```bash
//! # One loopback instrument at address 1
//! gpiblpt -p sim write-string 1 '*RST\n'
//!
//! # Instrument at address 5 requesting service
//! gpiblpt -p sim:addr=5,status=0x50,srq=1 serial-poll 5
//!
//! # A whole bus from a file
//! gpiblpt -p sim:config=bench.toml read-string 5 --eoi
//! ```

pub mod bus;
pub mod config;
pub mod device;

use gpiblpt_core::binding::parse_number;
use gpiblpt_core::port::PortMap;

pub use bus::SimBus;
pub use config::{DeviceConfig, SimConfig, SimError};
pub use device::SimDevice;

/// Address of the device created when no `config` is given
pub const DEFAULT_ADDRESS: u8 = 1;

fn parse_u8(name: &'static str, value: &str) -> config::Result<u8> {
    parse_number(value)
        .ok()
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| SimError::InvalidParameter {
            name,
            value: value.to_string(),
        })
}

/// Parse provider options from a list of key-value pairs
///
/// # Supported Options
///
/// - `config=FILE` - TOML bus description
/// - `addr=N` - address of the single loopback device used without
///   `config` (default 1)
/// - `status=N` - its serial poll status byte
/// - `srq=0|1` - whether it asserts SRQ
pub fn parse_options(options: &[(&str, &str)]) -> config::Result<SimConfig> {
    let mut file = None;
    let mut single = DeviceConfig::new(DEFAULT_ADDRESS);
    single.loopback = true;

    for (key, value) in options {
        match *key {
            "config" => file = Some(*value),
            "addr" => single.address = parse_u8("addr", value)?,
            "status" => single.status = parse_u8("status", value)?,
            "srq" => single.srq = parse_u8("srq", value)? != 0,
            other => return Err(SimError::UnknownParameter(other.to_string())),
        }
    }

    match file {
        Some(path) => SimConfig::from_file(path),
        None => Ok(SimConfig {
            devices: vec![single],
        }),
    }
}

/// Open the simulated bus from CLI-style options
pub fn open_sim(
    options: &[(&str, &str)],
) -> std::result::Result<(SimBus, PortMap), Box<dyn std::error::Error>> {
    let map = PortMap::default();
    let bus = parse_options(options)?.build(map)?;
    log::info!("sim: {} device(s) on the bus", bus.devices().len());
    Ok((bus, map))
}
