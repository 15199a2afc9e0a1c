//! gpiblpt-core - GPIB (IEEE-488) bus protocol over parallel port registers
//!
//! This crate drives a GPIB bus by bit-banging the data, status and control
//! registers of a parallel port. No GPIB controller chip is involved: every
//! byte is moved with the three-wire DAV/NRFD/NDAC handshake in software.
//!
//! # Layers
//!
//! ```text
//! binding     named operations + argument validation
//!    │
//! controller  readString, writeString, serialPoll, ... (Gpib)
//!    │
//! command     command bytes and addressing sequences
//!    │
//! handshake   send/receive one byte, Talker/Listener roles
//!    │
//! wait        bounded busy-wait on status lines
//!    │
//! port        data/status/control registers, polarity
//!    │
//! PortIo      readPort/writePort provided by a backend crate
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use gpiblpt_core::{Address, Gpib, PortMap, ReadOptions};
//!
//! fn identify<P: gpiblpt_core::PortIo>(io: P) -> gpiblpt_core::Result<Vec<u8>> {
//!     let timeout = Duration::from_millis(1000);
//!     let mut bus = Gpib::open(io, PortMap::default())?;
//!     bus.write_string(&[Address::new(5)], b"*IDN?\n", timeout)?;
//!     bus.read_string(Address::new(5), ReadOptions::new(256).terminator(b'\n'), timeout)
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod binding;
pub mod controller;
pub mod error;
pub mod port;
pub mod protocol;

pub use controller::{Gpib, ReadOptions, StatusByte};
pub use error::{Error, Result};
pub use port::{LptPort, PortIo, PortMap};
pub use protocol::command::{Address, Command};
pub use protocol::Role;
