//! Port I/O through the `/dev/port` character device
//!
//! `/dev/port` exposes the x86 I/O port space as a file: a one-byte
//! `pread`/`pwrite` at offset N performs `inb`/`outb` on port N. Opening it
//! requires root (or `CAP_SYS_RAWIO`).
//!
//! The device is locked with `flock(LOCK_EX | LOCK_NB)` so two processes
//! cannot drive the same bus. The lock and the descriptor are released on
//! drop.

use std::path::{Path, PathBuf};

use gpiblpt_core::error::{Error, Result};
use gpiblpt_core::port::{PortIo, PortMap};

/// Default device path
pub const DEFAULT_DEVICE: &str = "/dev/port";

/// Configuration for opening the parallel port provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LptConfig {
    /// Port device path
    pub device: PathBuf,
    /// Register addresses
    pub map: PortMap,
}

impl Default for LptConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            map: PortMap::default(),
        }
    }
}

/// Exclusive handle on the I/O port space
#[cfg(unix)]
#[derive(Debug)]
pub struct DevPort {
    file: std::fs::File,
    path: PathBuf,
}

#[cfg(unix)]
impl DevPort {
    /// Open and lock the port device
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        use std::fs::OpenOptions;
        use std::os::unix::io::AsRawFd;

        let path = path.as_ref().to_path_buf();
        log::debug!("lpt: opening {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::DriverOpen {
                path: path.clone(),
                source,
            })?;

        // SAFETY: the descriptor is owned by `file` and valid for the call
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            return Err(Error::DriverOpen {
                path,
                source: std::io::Error::last_os_error(),
            });
        }

        log::info!("lpt: opened {}", path.display());
        Ok(Self { file, path })
    }

    /// Path of the opened device
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
impl PortIo for DevPort {
    fn read_port(&mut self, port: u16) -> Result<u8> {
        use std::os::unix::fs::FileExt;

        let mut buf = [0u8; 1];
        self.file
            .read_exact_at(&mut buf, u64::from(port))
            .map_err(|source| Error::SystemIo {
                op: "read_port",
                port,
                source,
            })?;
        Ok(buf[0])
    }

    fn write_port(&mut self, port: u16, value: u8) -> Result<()> {
        use std::os::unix::fs::FileExt;

        self.file
            .write_all_at(&[value], u64::from(port))
            .map_err(|source| Error::SystemIo {
                op: "write_port",
                port,
                source,
            })
    }
}

#[cfg(unix)]
impl Drop for DevPort {
    fn drop(&mut self) {
        log::debug!("lpt: closing {}", self.path.display());
    }
}

/// Port I/O is only implemented through `/dev/port`
#[cfg(not(unix))]
#[derive(Debug)]
pub struct DevPort {
    _private: (),
}

#[cfg(not(unix))]
impl DevPort {
    /// Always fails: no port device on this platform
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Err(Error::DriverOpen {
            path: path.as_ref().to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "port I/O is not supported on this platform",
            ),
        })
    }
}

#[cfg(not(unix))]
impl PortIo for DevPort {
    fn read_port(&mut self, port: u16) -> Result<u8> {
        Err(Error::SystemIo {
            op: "read_port",
            port,
            source: std::io::ErrorKind::Unsupported.into(),
        })
    }

    fn write_port(&mut self, port: u16, _value: u8) -> Result<()> {
        Err(Error::SystemIo {
            op: "write_port",
            port,
            source: std::io::ErrorKind::Unsupported.into(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device() {
        let err = DevPort::open("/nonexistent/port").unwrap_err();
        assert_eq!(err.id(), "gpiblpt:DriverError");
    }

    #[test]
    fn test_regular_file_as_port_space() {
        // A plain file behaves like the port space for offset arithmetic
        let path = std::env::temp_dir().join(format!("gpiblpt-port-{}", std::process::id()));
        std::fs::write(&path, vec![0u8; 0x400]).unwrap();

        let mut port = DevPort::open(&path).unwrap();
        port.write_port(0x379, 0x5A).unwrap();
        assert_eq!(port.read_port(0x379).unwrap(), 0x5A);
        assert_eq!(port.read_port(0x378).unwrap(), 0x00);

        // Reading past the end of the file is a short read
        let err = port.read_port(0xD011).unwrap_err();
        assert!(err.id().starts_with("gpiblpt:read_port:"));

        drop(port);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    #[ignore] // Requires root and a parallel port
    fn test_dev_port_open() {
        let _port = DevPort::open(DEFAULT_DEVICE).unwrap();
    }
}
