//! Simulated instruments

use std::collections::VecDeque;

use gpiblpt_core::controller::StatusByte;
use gpiblpt_core::Address;

/// A simulated GPIB instrument
///
/// The instrument keeps its own addressing state (listener/talker), a
/// queue of bytes to talk, everything it has heard as a listener, and
/// counters for the interface commands it has acted on.
#[derive(Debug, Clone)]
pub struct SimDevice {
    address: Address,
    output: VecDeque<u8>,
    eoi_on_last: bool,
    endless: Option<u8>,
    loopback: bool,
    status: u8,
    srq: bool,

    listening: bool,
    talking: bool,
    received: Vec<u8>,
    clears: u32,
    triggers: u32,
    local: u32,
    polls: u32,
}

impl SimDevice {
    /// A silent instrument at `address`
    pub fn new(address: u8) -> Self {
        Self {
            address: Address::new(address),
            output: VecDeque::new(),
            eoi_on_last: true,
            endless: None,
            loopback: false,
            status: 0,
            srq: false,
            listening: false,
            talking: false,
            received: Vec::new(),
            clears: 0,
            triggers: 0,
            local: 0,
            polls: 0,
        }
    }

    /// Queue bytes to send when addressed as talker
    pub fn with_reply(mut self, bytes: &[u8]) -> Self {
        self.output.extend(bytes);
        self
    }

    /// Assert EOI with the last queued byte (default: on)
    pub fn with_eoi(mut self, eoi: bool) -> Self {
        self.eoi_on_last = eoi;
        self
    }

    /// Keep talking `byte` forever once the queue is empty
    pub fn with_endless(mut self, byte: u8) -> Self {
        self.endless = Some(byte);
        self
    }

    /// Queue everything received as listener for talking back
    pub fn with_loopback(mut self) -> Self {
        self.loopback = true;
        self
    }

    /// Serial poll status byte
    pub fn with_status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    /// Assert SRQ until serviced by a serial poll
    pub fn with_srq(mut self, srq: bool) -> Self {
        self.srq = srq;
        self
    }

    /// Device address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Append bytes to the talk queue
    pub fn queue_reply(&mut self, bytes: &[u8]) {
        self.output.extend(bytes);
    }

    /// Request service: set RQS in the status byte and assert SRQ
    pub fn request_service(&mut self, status: u8) {
        self.status = status | StatusByte::RQS;
        self.srq = true;
    }

    /// Bytes received while addressed as listener
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Take and reset the received bytes
    pub fn take_received(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.received)
    }

    /// Bytes still waiting in the talk queue
    pub fn pending(&self) -> Vec<u8> {
        self.output.iter().copied().collect()
    }

    /// Current serial poll status byte
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Whether the device is asserting SRQ
    pub fn srq(&self) -> bool {
        self.srq
    }

    /// Addressed as listener
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Addressed as talker
    pub fn is_talking(&self) -> bool {
        self.talking
    }

    /// Number of DCL/SDC clears acted on
    pub fn clear_count(&self) -> u32 {
        self.clears
    }

    /// Number of GET triggers acted on
    pub fn trigger_count(&self) -> u32 {
        self.triggers
    }

    /// Number of GTL commands acted on
    pub fn local_count(&self) -> u32 {
        self.local
    }

    /// Number of serial polls answered
    pub fn poll_count(&self) -> u32 {
        self.polls
    }

    pub(crate) fn set_listening(&mut self, listening: bool) {
        self.listening = listening;
    }

    pub(crate) fn set_talking(&mut self, talking: bool) {
        self.talking = talking;
    }

    /// Next byte to talk and whether it carries EOI
    pub(crate) fn next_byte(&self) -> Option<(u8, bool)> {
        match self.output.front() {
            Some(&b) => {
                let last = self.output.len() == 1 && self.endless.is_none();
                Some((b, last && self.eoi_on_last))
            }
            None => self.endless.map(|b| (b, false)),
        }
    }

    /// The controller accepted the byte from [`next_byte`](Self::next_byte)
    pub(crate) fn byte_accepted(&mut self) {
        self.output.pop_front();
    }

    /// The controller accepted the serial poll status byte
    pub(crate) fn status_accepted(&mut self) {
        self.polls += 1;
        self.status &= !StatusByte::RQS;
        self.srq = false;
    }

    pub(crate) fn receive(&mut self, byte: u8) {
        self.received.push(byte);
        if self.loopback {
            self.output.push_back(byte);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.clears += 1;
        self.output.clear();
    }

    pub(crate) fn trigger(&mut self) {
        self.triggers += 1;
    }

    pub(crate) fn go_to_local(&mut self) {
        self.local += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eoi_on_last_byte() {
        let mut dev = SimDevice::new(3).with_reply(b"AB");
        assert_eq!(dev.next_byte(), Some((b'A', false)));
        dev.byte_accepted();
        assert_eq!(dev.next_byte(), Some((b'B', true)));
        dev.byte_accepted();
        assert_eq!(dev.next_byte(), None);
    }

    #[test]
    fn test_endless_source() {
        let mut dev = SimDevice::new(3).with_reply(b"A").with_endless(b'Z');
        assert_eq!(dev.next_byte(), Some((b'A', false)));
        dev.byte_accepted();
        for _ in 0..100 {
            assert_eq!(dev.next_byte(), Some((b'Z', false)));
            dev.byte_accepted();
        }
    }

    #[test]
    fn test_status_cleared_by_poll() {
        let mut dev = SimDevice::new(3);
        dev.request_service(0x10);
        assert_eq!(dev.status(), 0x50);
        assert!(dev.srq());
        dev.status_accepted();
        assert_eq!(dev.status(), 0x10);
        assert!(!dev.srq());
        assert_eq!(dev.poll_count(), 1);
    }
}
