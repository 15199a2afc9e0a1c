//! Bounded wait engine
//!
//! GPIB handshakes complete in microseconds, so this is a tight poll of
//! the status register against a monotonic clock with no sleeping. On
//! expiry the bus is forced back to idle Talker before the timeout is
//! reported.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::port::{ControlLines, LptPort, PortIo, StatusLines};

/// Poll until `status & mask == expected` or `timeout` has elapsed
///
/// The condition is always checked at least once, so a zero timeout still
/// succeeds if the lines are already in the expected state.
pub fn wait_for<P: PortIo>(
    port: &mut LptPort<P>,
    mask: StatusLines,
    expected: StatusLines,
    timeout: Duration,
    op: &'static str,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let status = port.read_status()?;
        if status & mask == expected {
            return Ok(());
        }
        if start.elapsed() > timeout {
            log::debug!(
                "{}: no response after {:?} (status {:?})",
                op,
                timeout,
                status
            );
            if let Err(e) = port.write_control(ControlLines::TALKER_IDLE) {
                log::warn!("{}: failed to restore idle bus state: {}", op, e);
            }
            return Err(Error::Timeout { op });
        }
        std::hint::spin_loop();
    }
}

fn wait_for_line<P: PortIo>(
    port: &mut LptPort<P>,
    line: StatusLines,
    asserted: bool,
    timeout: Duration,
    op: &'static str,
) -> Result<()> {
    let expected = if asserted { line } else { StatusLines::empty() };
    wait_for(port, line, expected, timeout, op)
}

/// Wait for DAV to reach the given state
pub fn wait_for_dav<P: PortIo>(
    port: &mut LptPort<P>,
    asserted: bool,
    timeout: Duration,
) -> Result<()> {
    wait_for_line(port, StatusLines::DAV, asserted, timeout, "waitfor_DAV")
}

/// Wait for NRFD to reach the given state
pub fn wait_for_nrfd<P: PortIo>(
    port: &mut LptPort<P>,
    asserted: bool,
    timeout: Duration,
) -> Result<()> {
    wait_for_line(port, StatusLines::NRFD, asserted, timeout, "waitfor_NRFD")
}

/// Wait for NDAC to reach the given state
pub fn wait_for_ndac<P: PortIo>(
    port: &mut LptPort<P>,
    asserted: bool,
    timeout: Duration,
) -> Result<()> {
    wait_for_line(port, StatusLines::NDAC, asserted, timeout, "waitfor_NDAC")
}
