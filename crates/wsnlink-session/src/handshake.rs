use std::io::ErrorKind;
use std::time::{Duration, Instant};

use tracing::debug;
use wsnlink_transport::WaitReadable;

use crate::error::{Result, SessionError};

/// Sentinel sent once by the firmware when it is ready to receive.
pub const READY_BYTE: u8 = 0xFF;

/// Configuration for the ready handshake.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// How long to wait for the ready byte.
    pub timeout: Duration,
    /// The expected sentinel value.
    pub ready_byte: u8,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            ready_byte: READY_BYTE,
        }
    }
}

/// Wait for the firmware's ready byte.
///
/// Reads exactly one byte, so anything the firmware sends after it stays
/// queued for the reassembly loop. Timeout and mismatch are both fatal.
pub fn wait_ready<T>(stream: &mut T, config: &HandshakeConfig) -> Result<()>
where
    T: WaitReadable + ?Sized,
{
    let deadline = Instant::now() + config.timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SessionError::ReadyTimeout(config.timeout));
        }

        match stream.wait_readable(remaining) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(SessionError::Frame(err.into())),
        }

        let mut byte = [0u8; 1];
        match stream.read(&mut byte) {
            Ok(0) => {
                return Err(SessionError::Disconnected(
                    "line closed before ready byte".to_string(),
                ))
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(SessionError::Frame(err.into())),
        }

        if byte[0] != config.ready_byte {
            return Err(SessionError::InvalidReadyByte(byte[0]));
        }
        debug!("transceiver ready");
        return Ok(());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    use super::*;

    fn quick() -> HandshakeConfig {
        HandshakeConfig {
            timeout: Duration::from_millis(50),
            ..HandshakeConfig::default()
        }
    }

    #[test]
    fn ready_byte_is_accepted_and_nothing_more_is_read() {
        let (mut firmware, mut host) = UnixStream::pair().unwrap();
        firmware.write_all(&[READY_BYTE, 0x81, 0x00]).unwrap();

        wait_ready(&mut host, &quick()).unwrap();

        let mut rest = [0u8; 2];
        host.read_exact(&mut rest).unwrap();
        assert_eq!(rest, [0x81, 0x00]);
    }

    #[test]
    fn wrong_byte_is_fatal() {
        let (mut firmware, mut host) = UnixStream::pair().unwrap();
        firmware.write_all(&[0x42]).unwrap();

        let err = wait_ready(&mut host, &quick()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidReadyByte(0x42)));
    }

    #[test]
    fn silence_times_out() {
        let (_firmware, mut host) = UnixStream::pair().unwrap();

        let err = wait_ready(&mut host, &quick()).unwrap_err();
        assert!(matches!(err, SessionError::ReadyTimeout(t) if t == Duration::from_millis(50)));
    }

    #[test]
    fn closed_line_is_disconnected() {
        let (firmware, mut host) = UnixStream::pair().unwrap();
        drop(firmware);

        let err = wait_ready(&mut host, &quick()).unwrap_err();
        assert!(matches!(err, SessionError::Disconnected(_)));
    }

    #[test]
    fn custom_sentinel() {
        let (mut firmware, mut host) = UnixStream::pair().unwrap();
        firmware.write_all(&[0xA5]).unwrap();

        let config = HandshakeConfig {
            ready_byte: 0xA5,
            ..quick()
        };
        wait_ready(&mut host, &config).unwrap();
    }
}
