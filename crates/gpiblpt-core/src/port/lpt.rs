//! Typed access to the parallel port registers

use super::registers::{ControlLines, StatusLines};
use super::{PortIo, PortMap, ECR_BYTE_MODE};
use crate::error::Result;

/// Parallel port registers interpreted as GPIB signal carriers
///
/// Owns the privileged-I/O provider. Every register write is a full
/// overwrite of the register.
pub struct LptPort<P: PortIo> {
    io: P,
    map: PortMap,
}

impl<P: PortIo> LptPort<P> {
    /// Wrap a provider with the given register addresses
    pub fn new(io: P, map: PortMap) -> Self {
        Self { io, map }
    }

    /// Register addresses in use
    pub fn map(&self) -> &PortMap {
        &self.map
    }

    /// Access the underlying provider
    pub fn io(&self) -> &P {
        &self.io
    }

    /// Mutable access to the underlying provider
    pub fn io_mut(&mut self) -> &mut P {
        &mut self.io
    }

    /// Release the provider
    pub fn into_inner(self) -> P {
        self.io
    }

    /// Put the port in bidirectional byte mode through the ECR
    pub fn set_byte_mode(&mut self) -> Result<()> {
        log::debug!(
            "lpt: ECR {:#06x} <- {:#04x} (byte mode)",
            self.map.ecr,
            ECR_BYTE_MODE
        );
        self.io.write_port(self.map.ecr, ECR_BYTE_MODE)
    }

    /// Read the logical value of DIO1-DIO8
    #[inline]
    pub fn read_data(&mut self) -> Result<u8> {
        Ok(!self.io.read_port(self.map.data)?)
    }

    /// Latch a logical value onto DIO1-DIO8
    ///
    /// The value appears on the bus once [`ControlLines::DOUT`] is set.
    #[inline]
    pub fn write_data(&mut self, value: u8) -> Result<()> {
        self.io.write_port(self.map.data, !value)
    }

    /// Read the handshake, EOI and SRQ lines
    #[inline]
    pub fn read_status(&mut self) -> Result<StatusLines> {
        Ok(StatusLines::from_raw(self.io.read_port(self.map.status)?))
    }

    /// Drive the control lines
    #[inline]
    pub fn write_control(&mut self, lines: ControlLines) -> Result<()> {
        self.io.write_port(self.map.control, lines.to_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Regs {
        values: HashMap<u16, u8>,
        writes: Vec<(u16, u8)>,
    }

    impl PortIo for Regs {
        fn read_port(&mut self, port: u16) -> Result<u8> {
            Ok(*self.values.get(&port).unwrap_or(&0xFF))
        }

        fn write_port(&mut self, port: u16, value: u8) -> Result<()> {
            self.writes.push((port, value));
            self.values.insert(port, value);
            Ok(())
        }
    }

    #[test]
    fn test_data_inversion() {
        let mut port = LptPort::new(Regs::default(), PortMap::default());
        port.write_data(0x41).unwrap();
        assert_eq!(port.io().writes, vec![(0xD010, 0xBE)]);
        assert_eq!(port.read_data().unwrap(), 0x41);
    }

    #[test]
    fn test_full_register_writes() {
        let mut port = LptPort::new(Regs::default(), PortMap::default());
        port.set_byte_mode().unwrap();
        port.write_control(ControlLines::LISTENER_IDLE).unwrap();
        port.write_control(ControlLines::TALKER_IDLE).unwrap();
        assert_eq!(
            port.io().writes,
            vec![(0xD002, 0x21), (0xD012, 0x2E), (0xD012, 0x24)]
        );
    }

    #[test]
    fn test_status_read() {
        let mut regs = Regs::default();
        // NRFD pulled low, everything else released
        regs.values.insert(0xD011, 0x70);
        let mut port = LptPort::new(regs, PortMap::default());
        assert_eq!(port.read_status().unwrap(), StatusLines::NRFD);
    }
}
