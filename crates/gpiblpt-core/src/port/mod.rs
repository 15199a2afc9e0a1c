//! Port register abstraction
//!
//! The bus is reached through three 8-bit registers of a parallel port
//! plus the extended control register (ECR) used once at startup:
//!
//! ```text
//! Register        Bit 7  Bit 6  Bit 5  Bit 4  Bit 3  Bit 2  Bit 1  Bit 0
//! ----------------------------------------------------------------------
//!                 _____  _____  _____  _____  _____  _____  _____  _____
//! DATA (in/out)   DIO 8  DIO 7  DIO 6  DIO 5  DIO 4  DIO 3  DIO 2  DIO 1
//!                         ___    ___   ____   ____
//! STATUS (in)       EOI    SRQ    DAV   NDAC   NRFD      -      -      -
//!                                ____                  ___
//! CONTROL (out)       -      -   DOUT      -   NDAC    ATN   NRFD    DAV
//! ```
//!
//! All polarity inversion happens in [`LptPort`]; everything above it
//! works with active-high logical values.

mod lpt;
pub mod registers;

pub use lpt::LptPort;
pub use registers::{ControlLines, StatusLines};

use crate::error::Result;

/// Raw access to 8-bit hardware I/O ports
///
/// This is the privileged-I/O provider contract. Implementations report
/// failures as [`Error::SystemIo`](crate::Error::SystemIo).
pub trait PortIo {
    /// Read one byte from an I/O port
    fn read_port(&mut self, port: u16) -> Result<u8>;

    /// Write one byte to an I/O port
    fn write_port(&mut self, port: u16, value: u8) -> Result<()>;
}

impl<T: PortIo + ?Sized> PortIo for &mut T {
    fn read_port(&mut self, port: u16) -> Result<u8> {
        (**self).read_port(port)
    }

    fn write_port(&mut self, port: u16, value: u8) -> Result<()> {
        (**self).write_port(port, value)
    }
}

impl<T: PortIo + ?Sized> PortIo for Box<T> {
    fn read_port(&mut self, port: u16) -> Result<u8> {
        (**self).read_port(port)
    }

    fn write_port(&mut self, port: u16, value: u8) -> Result<()> {
        (**self).write_port(port, value)
    }
}

/// Default data register address
pub const DEFAULT_DATA_PORT: u16 = 0xD010;
/// Default extended control register address
pub const DEFAULT_ECR_PORT: u16 = 0xD002;
/// Offset of the ECR from the base address on ISA-style ECP ports
pub const ECR_OFFSET: u16 = 0x402;
/// ECR value selecting PS/2 byte mode (bidirectional, FIFO off)
pub const ECR_BYTE_MODE: u8 = 0x21;

/// I/O addresses of the registers used by the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMap {
    /// Data register (DIO1-DIO8)
    pub data: u16,
    /// Status register (read-only)
    pub status: u16,
    /// Control register (write-only)
    pub control: u16,
    /// Extended control register
    pub ecr: u16,
}

impl Default for PortMap {
    fn default() -> Self {
        Self {
            data: DEFAULT_DATA_PORT,
            status: DEFAULT_DATA_PORT + 1,
            control: DEFAULT_DATA_PORT + 2,
            ecr: DEFAULT_ECR_PORT,
        }
    }
}

impl PortMap {
    /// Standard layout for a port at `base`: data, status, control at
    /// consecutive addresses and the ECR at `base + 0x402`
    pub fn from_base(base: u16) -> Self {
        Self {
            data: base,
            status: base.wrapping_add(1),
            control: base.wrapping_add(2),
            ecr: base.wrapping_add(ECR_OFFSET),
        }
    }

    /// Override the ECR address (PCI cards place it in a separate BAR)
    pub fn with_ecr(mut self, ecr: u16) -> Self {
        self.ecr = ecr;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_map_from_base() {
        let map = PortMap::from_base(0x378);
        assert_eq!(map.data, 0x378);
        assert_eq!(map.status, 0x379);
        assert_eq!(map.control, 0x37A);
        assert_eq!(map.ecr, 0x77A);

        let map = PortMap::from_base(0xD010).with_ecr(0xD002);
        assert_eq!(map, PortMap::default());
    }
}
