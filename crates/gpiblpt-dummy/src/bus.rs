//! Register-level model of the cable and the instruments behind it
//!
//! [`SimBus`] implements [`PortIo`] so it can stand in for `/dev/port`. Writes
//! to the control register are treated as edges on the controller's lines:
//!
//! - DAV rising: every acceptor latches the data lines. With ATN asserted
//!   all devices take part and decode an interface command, otherwise only
//!   addressed listeners.
//! - DAV falling: acceptors get ready for the next byte.
//! - NDAC released while a device is presenting: the controller accepted
//!   the byte and the talker moves on.
//!
//! Status reads combine the controller's own lines with the device side
//! (wired-OR) and let an addressed talker present its next byte once the
//! controller is ready for data.

use std::io;

use gpiblpt_core::error::{Error, Result};
use gpiblpt_core::port::{ControlLines, PortIo, PortMap, StatusLines};
use gpiblpt_core::{Address, Command};

use crate::device::SimDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Presented {
    device: usize,
    value: u8,
    eoi: bool,
    status: bool,
}

/// Simulated GPIB bus
#[derive(Debug, Clone)]
pub struct SimBus {
    map: PortMap,
    devices: Vec<SimDevice>,
    control: u8,
    data: u8,
    ecr: Option<u8>,
    serial_poll: bool,
    accepted: bool,
    presenting: Option<Presented>,
    commands: Vec<u8>,
    unresponsive: bool,
    fault: Option<(u16, i32)>,
}

impl SimBus {
    /// An empty bus decoding the registers at `map`
    pub fn new(map: PortMap) -> Self {
        Self {
            map,
            devices: Vec::new(),
            control: ControlLines::TALKER_IDLE.to_raw(),
            data: 0xFF,
            ecr: None,
            serial_poll: false,
            accepted: false,
            presenting: None,
            commands: Vec::new(),
            unresponsive: false,
            fault: None,
        }
    }

    /// Attach an instrument
    pub fn with_device(mut self, device: SimDevice) -> Self {
        self.add_device(device);
        self
    }

    /// Attach an instrument
    pub fn add_device(&mut self, device: SimDevice) {
        if device.address() == Address::CONTROLLER {
            log::warn!("sim: device at controller address 0 will listen to its own reads");
        }
        self.devices.push(device);
    }

    /// Register map the bus decodes
    pub fn map(&self) -> PortMap {
        self.map
    }

    /// The instrument at `address`
    pub fn device(&self, address: u8) -> Option<&SimDevice> {
        let address = Address::new(address);
        self.devices.iter().find(|d| d.address() == address)
    }

    /// Mutable access to the instrument at `address`
    pub fn device_mut(&mut self, address: u8) -> Option<&mut SimDevice> {
        let address = Address::new(address);
        self.devices.iter_mut().find(|d| d.address() == address)
    }

    /// All attached instruments
    pub fn devices(&self) -> &[SimDevice] {
        &self.devices
    }

    /// Every byte the controller sent with ATN, in order
    pub fn commands(&self) -> &[u8] {
        &self.commands
    }

    /// Forget the command log
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Last value written to the control register, decoded
    pub fn control(&self) -> ControlLines {
        ControlLines::from_raw(self.control)
    }

    /// Last raw value written to the control register
    pub fn control_raw(&self) -> u8 {
        self.control
    }

    /// Last value written to the ECR, if any
    pub fn ecr(&self) -> Option<u8> {
        self.ecr
    }

    /// Whether the devices are in serial poll mode
    pub fn in_serial_poll(&self) -> bool {
        self.serial_poll
    }

    /// Stop every device from taking part in handshakes
    pub fn set_unresponsive(&mut self, unresponsive: bool) {
        self.unresponsive = unresponsive;
    }

    /// Fail every access to `port` with OS error `code`
    pub fn fail_port(&mut self, port: u16, code: i32) {
        self.fault = Some((port, code));
    }

    /// Remove an injected fault
    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    fn check_fault(&self, op: &'static str, port: u16) -> Result<()> {
        match self.fault {
            Some((p, code)) if p == port => Err(Error::SystemIo {
                op,
                port,
                source: io::Error::from_raw_os_error(code),
            }),
            _ => Ok(()),
        }
    }

    /// Whether any device takes part in the current handshake
    fn acceptors(&self, atn: bool) -> bool {
        if self.unresponsive {
            false
        } else if atn {
            !self.devices.is_empty()
        } else {
            self.devices.iter().any(|d| d.is_listening())
        }
    }

    fn control_changed(&mut self, new: ControlLines) {
        let old = self.control();
        self.control = new.to_raw();

        if new.contains(ControlLines::ATN) {
            // A talker withdraws its byte when ATN interrupts it
            self.presenting = None;
        }

        if new.contains(ControlLines::DAV) && !old.contains(ControlLines::DAV) {
            let value = if new.contains(ControlLines::DOUT) {
                !self.data
            } else {
                0x00
            };
            self.latch(value, new.contains(ControlLines::ATN));
        } else if !new.contains(ControlLines::DAV) && old.contains(ControlLines::DAV) {
            self.accepted = false;
        }

        if !new.contains(ControlLines::NDAC) {
            if let Some(p) = self.presenting.take() {
                let device = &mut self.devices[p.device];
                if p.status {
                    device.status_accepted();
                } else {
                    device.byte_accepted();
                }
            }
        }
    }

    fn latch(&mut self, value: u8, atn: bool) {
        if !self.acceptors(atn) {
            return;
        }
        self.accepted = true;

        if atn {
            self.commands.push(value);
            self.interface_command(value);
        } else {
            log::trace!("sim: data {:#04x}", value);
            for device in self.devices.iter_mut().filter(|d| d.is_listening()) {
                device.receive(value);
            }
        }
    }

    fn interface_command(&mut self, byte: u8) {
        let Some(cmd) = Command::from_byte(byte) else {
            log::trace!("sim: ignoring command byte {:#04x}", byte);
            return;
        };
        log::trace!("sim: {}", cmd);

        match cmd {
            Command::Unlisten => self.devices.iter_mut().for_each(|d| d.set_listening(false)),
            Command::Untalk => self.devices.iter_mut().for_each(|d| d.set_talking(false)),
            Command::Listen(addr) => self
                .devices
                .iter_mut()
                .filter(|d| d.address() == addr)
                .for_each(|d| d.set_listening(true)),
            Command::Talk(addr) => self
                .devices
                .iter_mut()
                .for_each(|d| d.set_talking(d.address() == addr)),
            Command::DeviceClear => self.devices.iter_mut().for_each(SimDevice::clear),
            Command::SelectedDeviceClear => self.listeners().for_each(SimDevice::clear),
            Command::GroupExecuteTrigger => self.listeners().for_each(SimDevice::trigger),
            Command::GoToLocal => self.listeners().for_each(SimDevice::go_to_local),
            Command::SerialPollEnable => self.serial_poll = true,
            Command::SerialPollDisable => self.serial_poll = false,
        }
    }

    fn listeners(&mut self) -> impl Iterator<Item = &mut SimDevice> {
        self.devices.iter_mut().filter(|d| d.is_listening())
    }

    /// Let the addressed talker put a byte on the bus if the controller is
    /// ready for one
    fn present(&mut self) {
        if self.unresponsive || self.presenting.is_some() {
            return;
        }
        let ctrl = self.control();
        let ready = ctrl.contains(ControlLines::NDAC)
            && !ctrl.intersects(ControlLines::DAV | ControlLines::ATN | ControlLines::NRFD);
        if !ready {
            return;
        }

        let Some(index) = self.devices.iter().position(|d| d.is_talking()) else {
            return;
        };
        let device = &self.devices[index];
        self.presenting = if self.serial_poll {
            Some(Presented {
                device: index,
                value: device.status(),
                eoi: false,
                status: true,
            })
        } else {
            device.next_byte().map(|(value, eoi)| Presented {
                device: index,
                value,
                eoi,
                status: false,
            })
        };
    }

    fn status_lines(&self) -> StatusLines {
        let ctrl = self.control();
        let mut lines = StatusLines::empty();

        if ctrl.contains(ControlLines::DAV) || self.presenting.is_some() {
            lines |= StatusLines::DAV;
        }
        if self.acceptors(ctrl.contains(ControlLines::ATN)) {
            lines |= if self.accepted {
                StatusLines::NRFD
            } else {
                StatusLines::NDAC
            };
        }
        if ctrl.contains(ControlLines::NRFD) {
            lines |= StatusLines::NRFD;
        }
        if ctrl.contains(ControlLines::NDAC) {
            lines |= StatusLines::NDAC;
        }
        if self.presenting.is_some_and(|p| p.eoi) {
            lines |= StatusLines::EOI;
        }
        if self.devices.iter().any(SimDevice::srq) {
            lines |= StatusLines::SRQ;
        }
        lines
    }

    fn data_lines(&self) -> u8 {
        if self.control().contains(ControlLines::DOUT) {
            self.data
        } else if let Some(p) = self.presenting {
            !p.value
        } else {
            0xFF
        }
    }
}

impl PortIo for SimBus {
    fn read_port(&mut self, port: u16) -> Result<u8> {
        self.check_fault("read_port", port)?;
        if port == self.map.status {
            self.present();
            Ok(self.status_lines().to_raw())
        } else if port == self.map.data {
            Ok(self.data_lines())
        } else if port == self.map.control {
            Ok(self.control)
        } else {
            Ok(0xFF)
        }
    }

    fn write_port(&mut self, port: u16, value: u8) -> Result<()> {
        self.check_fault("write_port", port)?;
        if port == self.map.data {
            self.data = value;
        } else if port == self.map.control {
            self.control_changed(ControlLines::from_raw(value));
        } else if port == self.map.ecr {
            self.ecr = Some(value);
        } else {
            log::trace!("sim: write {:#04x} to unmapped port {:#06x}", value, port);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpiblpt_core::controller::StatusByte;
    use gpiblpt_core::port::ECR_BYTE_MODE;
    use gpiblpt_core::{Gpib, ReadOptions};
    use std::time::{Duration, Instant};

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn open(bus: SimBus) -> Gpib<SimBus> {
        Gpib::open(bus, PortMap::default()).unwrap()
    }

    fn sim() -> SimBus {
        SimBus::new(PortMap::default())
    }

    fn assert_idle(gpib: &Gpib<SimBus>) {
        assert_eq!(gpib.io().control_raw(), 0x24);
    }

    #[test]
    fn test_open_selects_byte_mode() {
        let gpib = open(sim());
        assert_eq!(gpib.io().ecr(), Some(ECR_BYTE_MODE));
        assert_idle(&gpib);
    }

    #[test]
    fn test_read_string_command_sequence() {
        let mut gpib = open(sim().with_device(SimDevice::new(5).with_reply(b"1.25\n")));
        let data = gpib
            .read_string(Address::new(5), ReadOptions::new(64).eoi(), TIMEOUT)
            .unwrap();
        assert_eq!(data, b"1.25\n");
        // UNT UNL LAD0 TAD5 ... UNT UNL
        assert_eq!(gpib.io().commands(), &[0x5F, 0x3F, 0x20, 0x45, 0x5F, 0x3F]);
        assert_idle(&gpib);
    }

    #[test]
    fn test_read_stops_at_terminator() {
        let dev = SimDevice::new(5).with_reply(&[0x41, 0x42, 0x0A, 0x43]).with_eoi(false);
        let mut gpib = open(sim().with_device(dev));
        let data = gpib
            .read_string(Address::new(5), ReadOptions::new(10).terminator(0x0A), TIMEOUT)
            .unwrap();
        assert_eq!(data, [0x41, 0x42, 0x0A]);
        assert_eq!(gpib.io().device(5).unwrap().pending(), [0x43]);
        assert_idle(&gpib);
    }

    #[test]
    fn test_read_stops_at_max_length() {
        let dev = SimDevice::new(7).with_endless(b'x');
        let mut gpib = open(sim().with_device(dev));
        let data = gpib
            .read_string(Address::new(7), ReadOptions::new(3).eoi(), TIMEOUT)
            .unwrap();
        assert_eq!(data, b"xxx");
        assert_idle(&gpib);
    }

    #[test]
    fn test_read_ignores_eoi_when_disabled() {
        let dev = SimDevice::new(5).with_reply(b"AB").with_endless(b'C');
        let mut gpib = open(sim().with_device(dev));
        let data = gpib
            .read_string(Address::new(5), ReadOptions::new(4), TIMEOUT)
            .unwrap();
        assert_eq!(data, b"ABCC");
    }

    #[test]
    fn test_read_timeout_mid_message() {
        let dev = SimDevice::new(5).with_reply(b"AB").with_eoi(false);
        let mut gpib = open(sim().with_device(dev));
        let err = gpib
            .read_string(Address::new(5), ReadOptions::new(10), TIMEOUT)
            .unwrap_err();
        assert_eq!(err.id(), "gpiblpt:waitfor_DAV:Timeout");
        assert_idle(&gpib);
    }

    #[test]
    fn test_write_then_read_loopback() {
        let mut gpib = open(sim().with_device(SimDevice::new(9).with_loopback()));
        gpib.write_string(&[Address::new(9)], b"*IDN?\n", TIMEOUT)
            .unwrap();
        assert_eq!(gpib.io().device(9).unwrap().received(), b"*IDN?\n");
        // UNT UNL LAD9 TAD0 ... UNT UNL
        assert_eq!(gpib.io().commands(), &[0x5F, 0x3F, 0x29, 0x40, 0x5F, 0x3F]);
        assert_idle(&gpib);

        let data = gpib
            .read_string(Address::new(9), ReadOptions::new(6), TIMEOUT)
            .unwrap();
        assert_eq!(data, b"*IDN?\n");
    }

    #[test]
    fn test_write_to_several_listeners() {
        let bus = sim()
            .with_device(SimDevice::new(3))
            .with_device(SimDevice::new(4))
            .with_device(SimDevice::new(6));
        let mut gpib = open(bus);
        gpib.write_string(&[Address::new(3), Address::new(4)], b"RUN", TIMEOUT)
            .unwrap();
        assert_eq!(gpib.io().device(3).unwrap().received(), b"RUN");
        assert_eq!(gpib.io().device(4).unwrap().received(), b"RUN");
        assert!(gpib.io().device(6).unwrap().received().is_empty());
    }

    #[test]
    fn test_address_is_masked() {
        // LAD31 encodes as 0x3F, the same byte as UNL
        let mut gpib = open(sim().with_device(SimDevice::new(2)));
        gpib.go_to_local(&[Address::new(31)], TIMEOUT).unwrap();
        let first = gpib.io().commands().to_vec();
        gpib.io_mut().clear_commands();
        gpib.go_to_local(&[Address::new(63)], TIMEOUT).unwrap();
        assert_eq!(gpib.io().commands(), first.as_slice());
        assert_eq!(first, [0x3F, 0x3F, 0x01, 0x3F]);
        assert_idle(&gpib);
    }

    #[test]
    fn test_timeout_without_devices() {
        let mut gpib = open(sim());
        let timeout = Duration::from_millis(20);
        let start = Instant::now();
        let err = gpib.device_clear(timeout).unwrap_err();
        let elapsed = start.elapsed();

        assert!(err.is_timeout());
        assert_eq!(err.id(), "gpiblpt:waitfor_NRFD:Timeout");
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(500));
        assert_idle(&gpib);
    }

    #[test]
    fn test_timeout_unresponsive_device() {
        let mut bus = sim().with_device(SimDevice::new(2));
        bus.set_unresponsive(true);
        let mut gpib = open(bus);
        let err = gpib
            .go_to_local(&[Address::new(2)], Duration::from_millis(10))
            .unwrap_err();
        assert!(err.is_timeout());
        assert_idle(&gpib);
        assert_eq!(gpib.io().device(2).unwrap().local_count(), 0);
    }

    #[test]
    fn test_write_without_listener_times_out() {
        let mut gpib = open(sim().with_device(SimDevice::new(2)));
        // Device 8 is absent, so no one accepts the data byte
        let err = gpib
            .write_string(&[Address::new(8)], b"x", Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err.id(), "gpiblpt:waitfor_NRFD:Timeout");
        assert_idle(&gpib);
    }

    #[test]
    fn test_io_fault_restores_idle() {
        let mut gpib = open(sim().with_device(SimDevice::new(2)));
        let status = gpib.io().map().status;
        gpib.io_mut().fail_port(status, 5);

        let err = gpib.device_clear(TIMEOUT).unwrap_err();
        assert_eq!(err.id(), "gpiblpt:read_port:E5");
        assert_idle(&gpib);

        gpib.io_mut().clear_fault();
        gpib.device_clear(TIMEOUT).unwrap();
    }

    #[test]
    fn test_addressed_commands() {
        let bus = sim()
            .with_device(SimDevice::new(1).with_reply(b"old"))
            .with_device(SimDevice::new(2).with_reply(b"old"));
        let mut gpib = open(bus);
        let one = [Address::new(1)];
        let both = [Address::new(1), Address::new(2)];

        gpib.selected_device_clear(&one, TIMEOUT).unwrap();
        // UNL LAD1 SDC UNL
        assert_eq!(gpib.io().commands(), &[0x3F, 0x21, 0x04, 0x3F]);
        gpib.io_mut().clear_commands();

        gpib.group_execute_trigger(&both, TIMEOUT).unwrap();
        assert_eq!(gpib.io().commands(), &[0x3F, 0x21, 0x22, 0x08, 0x3F]);
        gpib.go_to_local(&both, TIMEOUT).unwrap();
        assert_idle(&gpib);

        let d1 = gpib.io().device(1).unwrap();
        let d2 = gpib.io().device(2).unwrap();
        assert_eq!((d1.clear_count(), d2.clear_count()), (1, 0));
        assert!(d1.pending().is_empty());
        assert_eq!(d2.pending(), b"old");
        assert_eq!((d1.trigger_count(), d2.trigger_count()), (1, 1));
        assert_eq!((d1.local_count(), d2.local_count()), (1, 1));
        assert!(!d1.is_listening() && !d2.is_listening());
    }

    #[test]
    fn test_device_clear_reaches_all() {
        let bus = sim()
            .with_device(SimDevice::new(1))
            .with_device(SimDevice::new(2));
        let mut gpib = open(bus);
        gpib.device_clear(TIMEOUT).unwrap();
        // UNT UNL DCL
        assert_eq!(gpib.io().commands(), &[0x5F, 0x3F, 0x14]);
        assert!(gpib.io().devices().iter().all(|d| d.clear_count() == 1));
        assert_idle(&gpib);
    }

    #[test]
    fn test_serial_poll_cycle() {
        let bus = sim()
            .with_device(SimDevice::new(4).with_status(0x50).with_srq(true))
            .with_device(SimDevice::new(6).with_status(0x10));
        let mut gpib = open(bus);
        assert!(gpib.read_srq().unwrap());

        gpib.serial_poll_enable(TIMEOUT).unwrap();
        assert!(gpib.io().in_serial_poll());
        let first = gpib.serial_poll(Address::new(4), TIMEOUT).unwrap();
        let second = gpib.serial_poll(Address::new(6), TIMEOUT).unwrap();
        gpib.serial_poll_disable(TIMEOUT).unwrap();

        assert_eq!(first, StatusByte(0x50));
        assert!(first.requests_service());
        assert_eq!(second, StatusByte(0x10));
        assert!(!second.requests_service());
        assert!(!gpib.io().in_serial_poll());
        assert!(!gpib.read_srq().unwrap());
        // UNT UNL LAD0 SPE TAD4 TAD6 SPD UNT UNL
        assert_eq!(
            gpib.io().commands(),
            &[0x5F, 0x3F, 0x20, 0x18, 0x44, 0x46, 0x19, 0x5F, 0x3F]
        );
        assert_idle(&gpib);
    }

    #[test]
    fn test_repeated_poll_after_service() {
        let mut dev = SimDevice::new(4);
        dev.request_service(0x01);
        let mut gpib = open(sim().with_device(dev));

        gpib.serial_poll_enable(TIMEOUT).unwrap();
        assert_eq!(gpib.serial_poll(Address::new(4), TIMEOUT).unwrap(), StatusByte(0x41));
        assert_eq!(gpib.serial_poll(Address::new(4), TIMEOUT).unwrap(), StatusByte(0x01));
        gpib.serial_poll_disable(TIMEOUT).unwrap();
        assert_eq!(gpib.io().device(4).unwrap().poll_count(), 2);
    }

    #[test]
    fn test_read_srq_leaves_control_alone() {
        let mut gpib = open(sim().with_device(SimDevice::new(1)));
        assert!(!gpib.read_srq().unwrap());
        gpib.io_mut().device_mut(1).unwrap().request_service(0);
        assert!(gpib.read_srq().unwrap());
        assert!(gpib.io().commands().is_empty());
        assert_idle(&gpib);
    }
}
