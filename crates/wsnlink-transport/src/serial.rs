use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{poll_readable, WaitReadable};

/// Line speeds accepted by [`SerialConfig::baud`].
pub const SUPPORTED_BAUD_RATES: [u32; 17] = [
    230400, 115200, 57600, 38400, 19200, 9600, 4800, 2400, 1800, 1200, 300, 200, 150, 134, 110,
    75, 50,
];

/// Configuration applied when opening a serial line.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line speed. `None` keeps whatever the device is already configured for.
    pub baud: Option<u32>,
    /// Delay between opening the device and discarding its kernel queues.
    /// Some drivers ignore a flush issued immediately after open.
    pub flush_settle: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud: None,
            flush_settle: Duration::from_micros(500),
        }
    }
}

/// A byte-oriented duplex descriptor attached to the transceiver.
///
/// Usually a tty opened with [`SerialLine::open`], but any descriptor
/// (pipe, pseudo-terminal, socket file) can be wrapped with
/// [`SerialLine::from_file`].
pub struct SerialLine {
    file: File,
    path: PathBuf,
}

impl SerialLine {
    /// Open a tty, configure it and drop any stale input.
    pub fn open(path: impl AsRef<Path>, config: &SerialConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let speed = match config.baud {
            Some(rate) => Some(baud_constant(rate).ok_or(TransportError::UnsupportedBaud(rate))?),
            None => None,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        let fd = file.as_raw_fd();

        // SAFETY: `fd` is an open descriptor owned by `file`.
        if unsafe { libc::isatty(fd) } != 1 {
            return Err(TransportError::NotATty { path });
        }

        if let Some(speed) = speed {
            configure_raw_8n1(fd, speed).map_err(|source| TransportError::Configure {
                path: path.clone(),
                source,
            })?;
            debug!(?path, baud = config.baud, "configured serial line");
        }

        // The kernel may hold bytes received while nobody had the device open,
        // which would leave us in the middle of a message.
        std::thread::sleep(config.flush_settle);
        // SAFETY: `fd` is an open tty descriptor.
        if unsafe { libc::tcflush(fd, libc::TCIOFLUSH) } < 0 {
            return Err(TransportError::Configure {
                path,
                source: std::io::Error::last_os_error(),
            });
        }

        info!(?path, "opened serial line");
        Ok(Self { file, path })
    }

    /// Wrap an already open descriptor without any tty checks or setup.
    pub fn from_file(file: File) -> Self {
        let path = PathBuf::from(format!("<fd {}>", file.as_raw_fd()));
        Self { file, path }
    }

    /// Try to clone this line (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            path: self.path.clone(),
        })
    }

    /// The path this line was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for SerialLine {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SerialLine {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl WaitReadable for SerialLine {
    fn wait_readable(&mut self, timeout: Duration) -> std::io::Result<bool> {
        poll_readable(self.file.as_raw_fd(), timeout)
    }
}

impl AsRawFd for SerialLine {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl std::fmt::Debug for SerialLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLine")
            .field("path", &self.path)
            .field("fd", &self.file.as_raw_fd())
            .finish()
    }
}

/// Map a numeric line speed to its termios constant.
pub fn baud_constant(rate: u32) -> Option<libc::speed_t> {
    let speed = match rate {
        230400 => libc::B230400,
        115200 => libc::B115200,
        57600 => libc::B57600,
        38400 => libc::B38400,
        19200 => libc::B19200,
        9600 => libc::B9600,
        4800 => libc::B4800,
        2400 => libc::B2400,
        1800 => libc::B1800,
        1200 => libc::B1200,
        300 => libc::B300,
        200 => libc::B200,
        150 => libc::B150,
        134 => libc::B134,
        110 => libc::B110,
        75 => libc::B75,
        50 => libc::B50,
        _ => return None,
    };
    Some(speed)
}

/// 8N1, break ignored, everything else cleared.
fn configure_raw_8n1(fd: RawFd, speed: libc::speed_t) -> std::io::Result<()> {
    // SAFETY: termios is a plain C struct for which all-zero is a valid value.
    let mut options: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `options` is a valid, writable termios.
    if unsafe { libc::cfsetspeed(&mut options, speed) } < 0 {
        return Err(std::io::Error::last_os_error());
    }

    options.c_iflag |= libc::IGNBRK;
    options.c_cflag |= libc::CS8 | libc::CREAD | libc::CLOCAL;

    // SAFETY: `fd` is an open tty and `options` is fully initialized.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &options) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
