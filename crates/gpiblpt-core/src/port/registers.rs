//! Status and control register bit definitions
//!
//! Flags are kept at their physical bit positions. A set flag always means
//! the line is asserted; [`StatusLines::from_raw`] and
//! [`ControlLines::to_raw`] apply the hardware inversions.

use bitflags::bitflags;

bitflags! {
    /// Logical state of the status register lines (set = asserted)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusLines: u8 {
        /// Not ready for data
        const NRFD = 1 << 3;
        /// Not data accepted
        const NDAC = 1 << 4;
        /// Data valid
        const DAV  = 1 << 5;
        /// Service request
        const SRQ  = 1 << 6;
        /// End or identify
        const EOI  = 1 << 7;
    }
}

impl StatusLines {
    /// Status bits that read as 0 when the line is asserted
    pub const INVERTED: Self = Self::NRFD
        .union(Self::NDAC)
        .union(Self::DAV)
        .union(Self::SRQ);

    /// Decode a raw status register value
    pub fn from_raw(raw: u8) -> Self {
        Self::from_bits_truncate(raw ^ Self::INVERTED.bits())
    }

    /// Encode as the raw value the status register would show
    ///
    /// Unused low bits read as 1.
    pub fn to_raw(self) -> u8 {
        (self.bits() ^ Self::INVERTED.bits()) | 0x07
    }
}

bitflags! {
    /// Logical state of the control register lines (set = asserted)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlLines: u8 {
        /// Data valid
        const DAV  = 1 << 0;
        /// Not ready for data
        const NRFD = 1 << 1;
        /// Attention
        const ATN  = 1 << 2;
        /// Not data accepted
        const NDAC = 1 << 3;
        /// Drive the data register onto the bus
        const DOUT = 1 << 5;
    }
}

impl ControlLines {
    /// Control bits that are written as 0 to assert the line
    pub const INVERTED: Self = Self::ATN.union(Self::DOUT);

    /// Idle Talker: every line released, data lines in input mode
    pub const TALKER_IDLE: Self = Self::empty();

    /// Idle Listener: holding off the talker with NRFD and NDAC
    pub const LISTENER_IDLE: Self = Self::NRFD.union(Self::NDAC);

    /// Encode as a full control register value
    pub fn to_raw(self) -> u8 {
        self.bits() ^ Self::INVERTED.bits()
    }

    /// Decode a raw control register value
    pub fn from_raw(raw: u8) -> Self {
        Self::from_bits_truncate(raw ^ Self::INVERTED.bits())
    }
}
