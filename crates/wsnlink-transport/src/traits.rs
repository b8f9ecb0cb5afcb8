use std::io::Read;
use std::time::Duration;

/// A byte source that can wait, for a bounded time, until a read would not block.
///
/// The reassembly loop and the ready handshake only ever block inside
/// [`WaitReadable::wait_readable`], which lets them count deadlines down in
/// fixed ticks and keep a liveness indicator moving.
pub trait WaitReadable: Read {
    /// Wait up to `timeout` for the source to become readable.
    ///
    /// Returns `Ok(true)` when a read would make progress (data, end-of-file
    /// or hang-up), `Ok(false)` when the timeout elapsed first. An
    /// `ErrorKind::Interrupted` error means a signal arrived and the caller
    /// should simply wait again.
    fn wait_readable(&mut self, timeout: Duration) -> std::io::Result<bool>;
}

impl<T: WaitReadable + ?Sized> WaitReadable for &mut T {
    fn wait_readable(&mut self, timeout: Duration) -> std::io::Result<bool> {
        (**self).wait_readable(timeout)
    }
}

impl<T: WaitReadable + ?Sized> WaitReadable for Box<T> {
    fn wait_readable(&mut self, timeout: Duration) -> std::io::Result<bool> {
        (**self).wait_readable(timeout)
    }
}

#[cfg(unix)]
impl WaitReadable for std::os::unix::net::UnixStream {
    fn wait_readable(&mut self, timeout: Duration) -> std::io::Result<bool> {
        use std::os::fd::AsRawFd;
        poll_readable(self.as_raw_fd(), timeout)
    }
}

#[cfg(unix)]
impl WaitReadable for std::fs::File {
    fn wait_readable(&mut self, timeout: Duration) -> std::io::Result<bool> {
        use std::os::fd::AsRawFd;
        poll_readable(self.as_raw_fd(), timeout)
    }
}

/// Poll a single descriptor for readability.
#[cfg(unix)]
pub(crate) fn poll_readable(fd: std::os::fd::RawFd, timeout: Duration) -> std::io::Result<bool> {
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    // SAFETY: `pfd` is a valid, writable pollfd and we pass a count of exactly one.
    let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(rc > 0)
}
