//! Error types for gpiblpt-core
//!
//! Every fault is raised synchronously to the caller of the high-level
//! operation. Nothing is retried internally.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// The privileged-I/O provider could not be opened
    #[error("unable to open the port driver '{}': {source}", path.display())]
    DriverOpen {
        /// Device path or provider name that failed to open
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// A single port read or write failed at the OS level
    #[error("I/O error in '{op}' at port {port:#06x}: {source}")]
    SystemIo {
        /// The primitive that failed (`read_port` or `write_port`)
        op: &'static str,
        /// Port address being accessed
        port: u16,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// A bounded wait on a status line exceeded its deadline
    #[error("timeout in '{op}'")]
    Timeout {
        /// The wait that expired (e.g. `waitfor_NRFD`)
        op: &'static str,
    },

    /// Malformed call at the binding boundary, rejected before bus activity
    #[error("invalid argument to '{op}': {reason}")]
    InvalidArgument {
        /// Operation name as given by the caller
        op: String,
        /// What was wrong with the call
        reason: String,
    },
}

impl Error {
    /// Build an [`Error::InvalidArgument`]
    pub fn invalid_argument(op: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            op: op.into(),
            reason: reason.into(),
        }
    }

    /// Stable identifier of the form `gpiblpt:<op>:<kind>`
    ///
    /// I/O faults carry the OS error code as `E<code>`.
    pub fn id(&self) -> String {
        match self {
            Self::DriverOpen { .. } => "gpiblpt:DriverError".to_string(),
            Self::SystemIo { op, source, .. } => match source.raw_os_error() {
                Some(code) => format!("gpiblpt:{}:E{}", op, code),
                None => format!("gpiblpt:{}:E{:?}", op, source.kind()),
            },
            Self::Timeout { op } => format!("gpiblpt:{}:Timeout", op),
            Self::InvalidArgument { op, .. } => format!("gpiblpt:{}:InvalidArgument", op),
        }
    }

    /// Returns true for bounded-wait expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
