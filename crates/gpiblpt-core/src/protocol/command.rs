//! GPIB command bytes and device addresses
//!
//! Command bytes are sent while ATN is asserted. Listen and talk commands
//! carry a device address in their low 5 bits.

use core::fmt;

/// Raw command byte values
pub mod codes {
    /// Go To Local (addressed)
    pub const GTL: u8 = 0x01;
    /// Selected Device Clear (addressed)
    pub const SDC: u8 = 0x04;
    /// Group Execute Trigger (addressed)
    pub const GET: u8 = 0x08;
    /// Device Clear (universal)
    pub const DCL: u8 = 0x14;
    /// Serial Poll Enable (universal)
    pub const SPE: u8 = 0x18;
    /// Serial Poll Disable (universal)
    pub const SPD: u8 = 0x19;
    /// Listen address group base
    pub const LISTEN: u8 = 0x20;
    /// Unlisten
    pub const UNL: u8 = 0x3F;
    /// Talk address group base
    pub const TALK: u8 = 0x40;
    /// Untalk
    pub const UNT: u8 = 0x5F;
}

const ADDRESS_MASK: u8 = 0x1F;

/// A GPIB primary address
///
/// Valid device addresses are 0-30. Anything wider is masked to its low
/// 5 bits, so 31 and 63 both become 31 (which, combined with LISTEN or
/// TALK, reads as UNL or UNT on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(u8);

impl Address {
    /// Highest valid device address
    pub const MAX: u8 = 30;

    /// The controller's own address
    pub const CONTROLLER: Address = Address(0);

    /// Build an address, masking to 5 bits
    pub fn new(raw: u8) -> Self {
        if raw > Self::MAX {
            log::warn!(
                "GPIB address {} out of range 0-{}, masked to {}",
                raw,
                Self::MAX,
                raw & ADDRESS_MASK
            );
        }
        Address(raw & ADDRESS_MASK)
    }

    /// Build an address only if it is in the valid range
    pub fn checked(raw: u8) -> Option<Self> {
        (raw <= Self::MAX).then_some(Address(raw))
    }

    /// The 5-bit address value
    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for Address {
    fn from(raw: u8) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A GPIB interface command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Return addressed listeners to local control
    GoToLocal,
    /// Clear addressed listeners
    SelectedDeviceClear,
    /// Trigger addressed listeners
    GroupExecuteTrigger,
    /// Clear every device on the bus
    DeviceClear,
    /// Put every device in serial poll response mode
    SerialPollEnable,
    /// Leave serial poll response mode
    SerialPollDisable,
    /// Address a device as listener
    Listen(Address),
    /// Unaddress all listeners
    Unlisten,
    /// Address a device as talker
    Talk(Address),
    /// Unaddress the talker
    Untalk,
}

impl Command {
    /// Encode the command as the byte placed on DIO1-DIO8
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::GoToLocal => codes::GTL,
            Self::SelectedDeviceClear => codes::SDC,
            Self::GroupExecuteTrigger => codes::GET,
            Self::DeviceClear => codes::DCL,
            Self::SerialPollEnable => codes::SPE,
            Self::SerialPollDisable => codes::SPD,
            Self::Listen(addr) => codes::LISTEN | (addr.0 & ADDRESS_MASK),
            Self::Unlisten => codes::UNL,
            Self::Talk(addr) => codes::TALK | (addr.0 & ADDRESS_MASK),
            Self::Untalk => codes::UNT,
        }
    }

    /// Decode a command byte (the DIO8 parity bit is ignored)
    ///
    /// Returns `None` for bytes that are not one of the commands above.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let byte = byte & 0x7F;
        match byte {
            codes::GTL => Some(Self::GoToLocal),
            codes::SDC => Some(Self::SelectedDeviceClear),
            codes::GET => Some(Self::GroupExecuteTrigger),
            codes::DCL => Some(Self::DeviceClear),
            codes::SPE => Some(Self::SerialPollEnable),
            codes::SPD => Some(Self::SerialPollDisable),
            codes::UNL => Some(Self::Unlisten),
            codes::UNT => Some(Self::Untalk),
            0x20..=0x3E => Some(Self::Listen(Address(byte & ADDRESS_MASK))),
            0x40..=0x5E => Some(Self::Talk(Address(byte & ADDRESS_MASK))),
            _ => None,
        }
    }

    /// Mnemonic used in trace output
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::GoToLocal => "GTL",
            Self::SelectedDeviceClear => "SDC",
            Self::GroupExecuteTrigger => "GET",
            Self::DeviceClear => "DCL",
            Self::SerialPollEnable => "SPE",
            Self::SerialPollDisable => "SPD",
            Self::Listen(_) => "LAD",
            Self::Unlisten => "UNL",
            Self::Talk(_) => "TAD",
            Self::Untalk => "UNT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listen(addr) | Self::Talk(addr) => write!(f, "{} {}", self.mnemonic(), addr),
            _ => f.write_str(self.mnemonic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes() {
        assert_eq!(Command::GoToLocal.to_byte(), 0x01);
        assert_eq!(Command::SelectedDeviceClear.to_byte(), 0x04);
        assert_eq!(Command::GroupExecuteTrigger.to_byte(), 0x08);
        assert_eq!(Command::DeviceClear.to_byte(), 0x14);
        assert_eq!(Command::SerialPollEnable.to_byte(), 0x18);
        assert_eq!(Command::SerialPollDisable.to_byte(), 0x19);
        assert_eq!(Command::Unlisten.to_byte(), 0x3F);
        assert_eq!(Command::Untalk.to_byte(), 0x5F);
        assert_eq!(Command::Listen(Address::new(5)).to_byte(), 0x25);
        assert_eq!(Command::Talk(Address::new(12)).to_byte(), 0x4C);
        assert_eq!(Command::Listen(Address::CONTROLLER).to_byte(), 0x20);
    }

    #[test]
    fn test_address_masking() {
        assert_eq!(Address::new(31), Address::new(63));
        assert_eq!(
            Command::Listen(Address::new(31)).to_byte(),
            Command::Listen(Address::new(63)).to_byte()
        );
        assert_eq!(Address::new(33).value(), 1);
        assert_eq!(Address::checked(30), Some(Address::new(30)));
        assert_eq!(Address::checked(31), None);
    }

    #[test]
    fn test_decode() {
        assert_eq!(Command::from_byte(0x25), Some(Command::Listen(Address::new(5))));
        assert_eq!(Command::from_byte(0x4C), Some(Command::Talk(Address::new(12))));
        assert_eq!(Command::from_byte(0x3F), Some(Command::Unlisten));
        assert_eq!(Command::from_byte(0xBF), Some(Command::Unlisten));
        assert_eq!(Command::from_byte(0x60), None);
        assert_eq!(Command::Talk(Address::new(3)).to_string(), "TAD 3");
    }
}
