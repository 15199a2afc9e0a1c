//! Three-wire byte handshake
//!
//! Talker side (command or data byte):
//!
//! 1. wait for NRFD released (all listeners ready)
//! 2. drive the byte, assert DAV (and ATN for a command)
//! 3. wait for NRFD asserted (listeners busy with the byte)
//! 4. wait for NDAC released (byte accepted)
//! 5. back to idle Talker
//!
//! Listener side:
//!
//! 1. release NRFD (ready)
//! 2. wait for DAV asserted
//! 3. latch data and EOI
//! 4. assert NRFD, release NDAC (accepted)
//! 5. wait for DAV released
//! 6. back to idle Listener

use std::time::Duration;

use super::command::Command;
use super::wait::{wait_for_dav, wait_for_ndac, wait_for_nrfd};
use super::Role;
use crate::error::Result;
use crate::port::{ControlLines, LptPort, PortIo, StatusLines};

/// A data byte received from a talker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataByte {
    /// Byte value
    pub value: u8,
    /// EOI was asserted with this byte
    pub eoi: bool,
}

/// Switch the controller's handshake role
pub fn set_role<P: PortIo>(port: &mut LptPort<P>, role: Role) -> Result<()> {
    match role {
        Role::Talker => port.write_control(ControlLines::TALKER_IDLE),
        Role::Listener => port.write_control(ControlLines::LISTENER_IDLE),
    }
}

fn send_byte<P: PortIo>(
    port: &mut LptPort<P>,
    byte: u8,
    atn: ControlLines,
    timeout: Duration,
) -> Result<()> {
    if !atn.is_empty() {
        port.write_control(atn)?;
    }
    wait_for_nrfd(port, false, timeout)?;

    port.write_data(byte)?;
    port.write_control(ControlLines::DAV | ControlLines::DOUT | atn)?;

    wait_for_nrfd(port, true, timeout)?;
    wait_for_ndac(port, false, timeout)?;

    set_role(port, Role::Talker)
}

/// Send one command byte with ATN asserted
pub fn send_command<P: PortIo>(
    port: &mut LptPort<P>,
    cmd: Command,
    timeout: Duration,
) -> Result<()> {
    log::trace!("gpib: cmd {:#04x} ({})", cmd.to_byte(), cmd);
    send_byte(port, cmd.to_byte(), ControlLines::ATN, timeout)
}

/// Send one data byte to the addressed listeners
pub fn send_data<P: PortIo>(port: &mut LptPort<P>, byte: u8, timeout: Duration) -> Result<()> {
    log::trace!("gpib: tx {:#04x}", byte);
    send_byte(port, byte, ControlLines::empty(), timeout)
}

/// Receive one data byte from the addressed talker
///
/// The controller must already be in the Listener role.
pub fn receive_data<P: PortIo>(port: &mut LptPort<P>, timeout: Duration) -> Result<DataByte> {
    port.write_control(ControlLines::NDAC)?;
    wait_for_dav(port, true, timeout)?;

    let value = port.read_data()?;
    let eoi = port.read_status()?.contains(StatusLines::EOI);

    port.write_control(ControlLines::NRFD)?;
    wait_for_dav(port, false, timeout)?;

    set_role(port, Role::Listener)?;

    log::trace!("gpib: rx {:#04x}{}", value, if eoi { " EOI" } else { "" });
    Ok(DataByte { value, eoi })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortMap;

    /// A listener that responds instantly to whatever the controller does
    #[derive(Default)]
    struct Responder {
        control: ControlLines,
        writes: Vec<(u16, u8)>,
    }

    impl PortIo for Responder {
        fn read_port(&mut self, port: u16) -> Result<u8> {
            let map = PortMap::default();
            if port == map.status {
                let status = if self.control.contains(ControlLines::DAV) {
                    StatusLines::NRFD
                } else {
                    StatusLines::NDAC
                };
                Ok(status.to_raw())
            } else {
                Ok(0xFF)
            }
        }

        fn write_port(&mut self, port: u16, value: u8) -> Result<()> {
            if port == PortMap::default().control {
                self.control = ControlLines::from_raw(value);
            }
            self.writes.push((port, value));
            Ok(())
        }
    }

    #[test]
    fn test_command_write_sequence() {
        let mut port = LptPort::new(Responder::default(), PortMap::default());
        send_command(&mut port, Command::Unlisten, Duration::from_millis(10)).unwrap();
        assert_eq!(
            port.io().writes,
            vec![
                (0xD012, 0x20), // ATN
                (0xD010, 0xC0), // !0x3F
                (0xD012, 0x01), // DAV | ATN | DOUT
                (0xD012, 0x24), // idle Talker
            ]
        );
    }

    #[test]
    fn test_data_write_sequence() {
        let mut port = LptPort::new(Responder::default(), PortMap::default());
        send_data(&mut port, 0x41, Duration::from_millis(10)).unwrap();
        assert_eq!(
            port.io().writes,
            vec![(0xD010, 0xBE), (0xD012, 0x05), (0xD012, 0x24)]
        );
    }
}
