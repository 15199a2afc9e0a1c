//! GPIB controller operations
//!
//! [`Gpib`] owns the port and exposes the operations callers invoke:
//! reading and writing strings, addressed commands, device clear, serial
//! polling and SRQ sensing. Every operation takes its timeout as the last
//! argument and leaves the bus in the idle Talker state when it returns,
//! whether it succeeded or failed.
//!
//! # Command sequences
//!
//! | Operation            | Bytes sent with ATN                         |
//! |----------------------|---------------------------------------------|
//! | `read_string`        | UNT UNL LAD0 TADn ... UNT UNL               |
//! | `write_string`       | UNT UNL LADn... TAD0 ... UNT UNL            |
//! | addressed command    | UNL LADn... cmd UNL                         |
//! | `device_clear`       | UNT UNL DCL                                 |
//! | `serial_poll_enable` | UNT UNL LAD0 SPE                            |
//! | `serial_poll`        | TADn                                        |
//! | `serial_poll_disable`| SPD UNT UNL                                 |

use std::time::Duration;

use crate::error::Result;
use crate::port::{LptPort, PortIo, PortMap, StatusLines};
use crate::protocol::command::{Address, Command};
use crate::protocol::handshake::{self, DataByte};
use crate::protocol::Role;

/// Termination rules for [`Gpib::read_string`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Maximum number of bytes to receive
    pub max_length: usize,
    /// Stop after a byte received with EOI asserted
    pub use_eoi: bool,
    /// Stop after receiving this byte
    pub terminator: Option<u8>,
}

impl ReadOptions {
    /// Read up to `max_length` bytes with no other termination rule
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            use_eoi: false,
            terminator: None,
        }
    }

    /// Also stop on EOI
    pub fn eoi(mut self) -> Self {
        self.use_eoi = true;
        self
    }

    /// Also stop on `byte`
    pub fn terminator(mut self, byte: u8) -> Self {
        self.terminator = Some(byte);
        self
    }

    /// Whether `byte` ends the read
    fn ends_with(&self, byte: &DataByte) -> bool {
        (self.use_eoi && byte.eoi) || self.terminator == Some(byte.value)
    }
}

/// Serial poll status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByte(pub u8);

impl StatusByte {
    /// Bit 6: the device is requesting service
    pub const RQS: u8 = 0x40;

    /// Raw byte value
    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether the device is requesting service
    pub fn requests_service(self) -> bool {
        self.0 & Self::RQS != 0
    }
}

/// A GPIB bus driven through a parallel port
///
/// Construct once per process with [`Gpib::open`] and pass it to whatever
/// needs the bus. Operations take `&mut self`, so two operations can never
/// interleave their handshakes; wrap it in a `Mutex` to share between
/// threads.
pub struct Gpib<P: PortIo> {
    port: LptPort<P>,
}

impl<P: PortIo> Gpib<P> {
    /// Take ownership of a provider and bring the bus up
    ///
    /// Selects byte mode through the ECR and places the bus in the idle
    /// Talker state.
    pub fn open(io: P, map: PortMap) -> Result<Self> {
        log::debug!(
            "gpib: opening bus (data {:#06x}, status {:#06x}, control {:#06x}, ecr {:#06x})",
            map.data,
            map.status,
            map.control,
            map.ecr
        );
        let mut port = LptPort::new(io, map);
        port.set_byte_mode()?;
        handshake::set_role(&mut port, Role::Talker)?;
        Ok(Self { port })
    }

    /// The register abstraction
    pub fn port(&self) -> &LptPort<P> {
        &self.port
    }

    /// The underlying provider
    pub fn io(&self) -> &P {
        self.port.io()
    }

    /// Mutable access to the underlying provider
    pub fn io_mut(&mut self) -> &mut P {
        self.port.io_mut()
    }

    /// Release the provider
    pub fn into_inner(self) -> P {
        self.port.into_inner()
    }

    /// Run `f` and force idle Talker if it fails
    ///
    /// Timeouts restore the bus inside the wait engine already; this covers
    /// I/O faults in the middle of a sequence.
    fn guarded<T>(&mut self, op: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        log::debug!("gpib: {}", op);
        let result = f(self);
        if let Err(e) = &result {
            if !e.is_timeout() {
                if let Err(restore) = handshake::set_role(&mut self.port, Role::Talker) {
                    log::warn!("{}: failed to restore idle bus state: {}", op, restore);
                }
            }
        }
        result
    }

    fn command(&mut self, cmd: Command, timeout: Duration) -> Result<()> {
        handshake::send_command(&mut self.port, cmd, timeout)
    }

    fn listen_all(&mut self, addresses: &[Address], timeout: Duration) -> Result<()> {
        addresses
            .iter()
            .try_for_each(|&addr| self.command(Command::Listen(addr), timeout))
    }

    fn unaddress(&mut self, timeout: Duration) -> Result<()> {
        self.command(Command::Untalk, timeout)?;
        self.command(Command::Unlisten, timeout)
    }

    /// Send `cmd` to a group of listeners
    ///
    /// Unlistens everything, addresses each device as listener, sends the
    /// command and unlistens again.
    pub fn addressed_command(
        &mut self,
        addresses: &[Address],
        cmd: Command,
        timeout: Duration,
    ) -> Result<()> {
        self.guarded("addressed_command", |bus| {
            bus.command(Command::Unlisten, timeout)?;
            bus.listen_all(addresses, timeout)?;
            bus.command(cmd, timeout)?;
            bus.command(Command::Unlisten, timeout)
        })
    }

    /// Read a message from the device at `address`
    ///
    /// Reception stops at `max_length` bytes, or after the byte that
    /// matched the EOI or terminator rule (that byte is included). If a
    /// timeout occurs mid-message the bytes received so far are discarded.
    pub fn read_string(
        &mut self,
        address: Address,
        options: ReadOptions,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        self.guarded("read_string", |bus| {
            bus.unaddress(timeout)?;
            bus.command(Command::Listen(Address::CONTROLLER), timeout)?;
            bus.command(Command::Talk(address), timeout)?;

            handshake::set_role(&mut bus.port, Role::Listener)?;
            let mut data = Vec::with_capacity(options.max_length.min(4096));
            while data.len() < options.max_length {
                let byte = handshake::receive_data(&mut bus.port, timeout)?;
                data.push(byte.value);
                if options.ends_with(&byte) {
                    break;
                }
            }
            handshake::set_role(&mut bus.port, Role::Talker)?;

            bus.unaddress(timeout)?;
            log::debug!("gpib: read {} bytes from {}", data.len(), address);
            Ok(data)
        })
    }

    /// Send `data` to a group of listeners
    ///
    /// No terminator is appended.
    pub fn write_string(
        &mut self,
        addresses: &[Address],
        data: &[u8],
        timeout: Duration,
    ) -> Result<()> {
        self.guarded("write_string", |bus| {
            bus.unaddress(timeout)?;
            bus.listen_all(addresses, timeout)?;
            bus.command(Command::Talk(Address::CONTROLLER), timeout)?;

            for &byte in data {
                handshake::send_data(&mut bus.port, byte, timeout)?;
            }

            bus.unaddress(timeout)
        })
    }

    /// Return the given devices to local (front panel) control
    pub fn go_to_local(&mut self, addresses: &[Address], timeout: Duration) -> Result<()> {
        self.addressed_command(addresses, Command::GoToLocal, timeout)
    }

    /// Clear the given devices
    pub fn selected_device_clear(
        &mut self,
        addresses: &[Address],
        timeout: Duration,
    ) -> Result<()> {
        self.addressed_command(addresses, Command::SelectedDeviceClear, timeout)
    }

    /// Trigger the given devices simultaneously
    pub fn group_execute_trigger(
        &mut self,
        addresses: &[Address],
        timeout: Duration,
    ) -> Result<()> {
        self.addressed_command(addresses, Command::GroupExecuteTrigger, timeout)
    }

    /// Clear every device on the bus
    pub fn device_clear(&mut self, timeout: Duration) -> Result<()> {
        self.guarded("device_clear", |bus| {
            bus.unaddress(timeout)?;
            bus.command(Command::DeviceClear, timeout)
        })
    }

    /// Put every device in serial poll response mode
    pub fn serial_poll_enable(&mut self, timeout: Duration) -> Result<()> {
        self.guarded("serial_poll_enable", |bus| {
            bus.unaddress(timeout)?;
            bus.command(Command::Listen(Address::CONTROLLER), timeout)?;
            bus.command(Command::SerialPollEnable, timeout)
        })
    }

    /// Read the status byte of one device
    ///
    /// Must be bracketed by [`serial_poll_enable`](Self::serial_poll_enable)
    /// and [`serial_poll_disable`](Self::serial_poll_disable).
    pub fn serial_poll(&mut self, address: Address, timeout: Duration) -> Result<StatusByte> {
        self.guarded("serial_poll", |bus| {
            bus.command(Command::Talk(address), timeout)?;
            handshake::set_role(&mut bus.port, Role::Listener)?;
            let byte = handshake::receive_data(&mut bus.port, timeout)?;
            handshake::set_role(&mut bus.port, Role::Talker)?;

            let status = StatusByte(byte.value);
            log::debug!(
                "gpib: device {} status {:#04x}{}",
                address,
                status.value(),
                if status.requests_service() { " (RQS)" } else { "" }
            );
            Ok(status)
        })
    }

    /// Leave serial poll mode and unaddress the bus
    pub fn serial_poll_disable(&mut self, timeout: Duration) -> Result<()> {
        self.guarded("serial_poll_disable", |bus| {
            bus.command(Command::SerialPollDisable, timeout)?;
            bus.unaddress(timeout)
        })
    }

    /// Whether any device is asserting SRQ
    pub fn read_srq(&mut self) -> Result<bool> {
        Ok(self.port.read_status()?.contains(StatusLines::SRQ))
    }
}
