//! GPIB protocol layers
//!
//! - [`wait`] - bounded busy-wait on status lines
//! - [`handshake`] - single-byte transfers and role switching
//! - [`command`] - command bytes and addresses

pub mod command;
pub mod handshake;
pub mod wait;

/// Which side of the handshake the controller plays
///
/// Exactly one role is active at any time. As Talker the controller owns
/// DAV and may drive the data lines; as Listener it owns NRFD and NDAC and
/// leaves the data lines in input mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Controller drives DAV and the data lines
    Talker,
    /// Controller drives NRFD/NDAC and reads the data lines
    Listener,
}
