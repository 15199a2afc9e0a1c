//! Bus descriptions loaded from TOML
//!
//! ```toml
//! [[device]]
//! address = 5
//! reply = "+1.2345E+00\n"
//!
//! [[device]]
//! address = 9
//! loopback = true
//! status = 0x50
//! srq = true
//! ```

use std::path::{Path, PathBuf};

use gpiblpt_core::binding::unescape;
use gpiblpt_core::port::PortMap;
use serde::Deserialize;
use thiserror::Error;

use crate::bus::SimBus;
use crate::device::SimDevice;

/// Errors loading a simulated bus description
#[derive(Debug, Error)]
pub enum SimError {
    /// The file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for a bus description
    #[error("invalid bus description: {0}")]
    Parse(#[from] toml::de::Error),

    /// A device entry is unusable
    #[error("device {address}: {reason}")]
    InvalidDevice { address: u8, reason: String },

    /// Invalid provider parameter value
    #[error("Invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    /// Unknown provider parameter name
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),
}

/// Result type for loading bus descriptions
pub type Result<T> = std::result::Result<T, SimError>;

/// A whole simulated bus
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Attached instruments
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

/// One `[[device]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Primary address, 0-30
    pub address: u8,
    /// Bytes talked when addressed, with `\n`, `\xNN` style escapes
    #[serde(default)]
    pub reply: String,
    /// Assert EOI on the last reply byte
    #[serde(default = "default_eoi")]
    pub eoi: bool,
    /// Echo received bytes back
    #[serde(default)]
    pub loopback: bool,
    /// Byte talked forever once the reply is exhausted
    #[serde(default)]
    pub endless: Option<u8>,
    /// Serial poll status byte
    #[serde(default)]
    pub status: u8,
    /// Assert SRQ at startup
    #[serde(default)]
    pub srq: bool,
}

fn default_eoi() -> bool {
    true
}

impl DeviceConfig {
    /// A device entry with defaults
    pub fn new(address: u8) -> Self {
        Self {
            address,
            reply: String::new(),
            eoi: default_eoi(),
            loopback: false,
            endless: None,
            status: 0,
            srq: false,
        }
    }

    /// Build the instrument
    pub fn build(&self) -> Result<SimDevice> {
        if self.address > gpiblpt_core::Address::MAX {
            return Err(SimError::InvalidDevice {
                address: self.address,
                reason: "address must be 0-30".to_string(),
            });
        }
        let reply = unescape(&self.reply).map_err(|reason| SimError::InvalidDevice {
            address: self.address,
            reason,
        })?;

        let mut device = SimDevice::new(self.address)
            .with_reply(&reply)
            .with_eoi(self.eoi)
            .with_status(self.status)
            .with_srq(self.srq);
        if self.loopback {
            device = device.with_loopback();
        }
        if let Some(byte) = self.endless {
            device = device.with_endless(byte);
        }
        Ok(device)
    }
}

impl SimConfig {
    /// Parse a TOML bus description
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a TOML bus description from `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Build a bus decoding `map` with every configured instrument attached
    pub fn build(&self, map: PortMap) -> Result<SimBus> {
        let mut bus = SimBus::new(map);
        for device in &self.devices {
            bus.add_device(device.build()?);
        }
        Ok(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices() {
        let config = SimConfig::from_toml_str(
            r#"
            [[device]]
            address = 5
            reply = "1.0\n"

            [[device]]
            address = 9
            loopback = true
            eoi = false
            status = 0x50
            srq = true
            "#,
        )
        .unwrap();

        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].reply, "1.0\n");
        assert!(config.devices[0].eoi);
        assert!(config.devices[1].loopback);
        assert_eq!(config.devices[1].status, 0x50);

        let bus = config.build(PortMap::default()).unwrap();
        assert_eq!(bus.device(5).unwrap().pending(), b"1.0\n");
        assert!(bus.device(9).unwrap().srq());
    }

    #[test]
    fn test_reply_escapes() {
        let mut entry = DeviceConfig::new(3);
        entry.reply = r"A\x00\r\n".to_string();
        assert_eq!(entry.build().unwrap().pending(), b"A\0\r\n");

        entry.reply = r"\xZZ".to_string();
        assert!(matches!(
            entry.build(),
            Err(SimError::InvalidDevice { address: 3, .. })
        ));
    }

    #[test]
    fn test_reject_bad_entries() {
        assert!(DeviceConfig::new(31).build().is_err());
        assert!(matches!(
            SimConfig::from_toml_str("[[device]]\naddress = 1\ncolour = 2\n"),
            Err(SimError::Parse(_))
        ));
        assert!(SimConfig::from_file("/nonexistent/bus.toml").is_err());
    }

    #[test]
    fn test_empty_description() {
        let config = SimConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimConfig::default());
        assert!(config.build(PortMap::default()).unwrap().devices().is_empty());
    }
}
