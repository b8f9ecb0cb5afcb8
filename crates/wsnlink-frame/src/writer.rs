use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_message, Message, MessageKind, MAX_WIRE_SIZE};
use crate::control::ControlSubtype;
use crate::error::{FrameError, Result};

/// Writes complete messages to any `Write` stream.
///
/// Each message (information byte + payload) is encoded into one buffer
/// and handed to the descriptor as a single write.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> MessageWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_WIRE_SIZE),
        }
    }

    /// Write a complete message (blocking).
    pub fn write_message(&mut self, message: &Message<'_>) -> Result<()> {
        self.send(message.kind, message.payload)
    }

    /// Encode and send a payload as one message.
    pub fn send(&mut self, kind: MessageKind, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_message(kind, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Send a raw MAC frame.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.send(MessageKind::Frame, frame)
    }

    /// Send a control message made of a subtype byte followed by `data`.
    pub fn send_control(&mut self, subtype: ControlSubtype, data: &[u8]) -> Result<()> {
        let mut payload = Vec::with_capacity(1 + data.len());
        payload.push(subtype.code());
        payload.extend_from_slice(data);
        self.send(MessageKind::Control, &payload)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::codec::decode_message;

    /// Records every `write` call separately.
    #[derive(Default)]
    struct CallRecorder {
        calls: Vec<Vec<u8>>,
    }

    impl Write for CallRecorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct InterruptOnce {
        interrupted: bool,
        out: Vec<u8>,
    }

    impl Write for InterruptOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::new(ErrorKind::Interrupted, "signal"));
            }
            // Accept one byte at a time to exercise the partial-write loop.
            self.out.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn message_goes_out_in_one_write() {
        let mut writer = MessageWriter::new(CallRecorder::default());
        writer.send_frame(b"\x41\x88\x01").unwrap();

        let calls = &writer.get_ref().calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![0x03, 0x41, 0x88, 0x01]);
    }

    #[test]
    fn control_message_prefixes_subtype() {
        let mut writer = MessageWriter::new(Vec::new());
        writer
            .send_control(ControlSubtype::ConfigChannel, &[0x0B, 0x00])
            .unwrap();

        assert_eq!(writer.get_ref().as_slice(), &[0x83, 0x07, 0x0B, 0x00]);
    }

    #[test]
    fn write_message_roundtrips_through_decoder() {
        let mut writer = MessageWriter::new(Vec::new());
        writer
            .write_message(&Message::new(MessageKind::Control, b"\x00ready"))
            .unwrap();

        let wire = writer.into_inner();
        let (message, used) = decode_message(&wire).unwrap();
        assert_eq!(used, wire.len());
        assert_eq!(message.kind, MessageKind::Control);
        assert_eq!(message.payload, b"\x00ready");
    }

    #[test]
    fn oversized_payload_writes_nothing() {
        let mut writer = MessageWriter::new(CallRecorder::default());
        let result = writer.send_frame(&[0u8; 128]);

        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
        assert!(writer.get_ref().calls.is_empty());
    }

    #[test]
    fn interrupted_and_partial_writes_complete() {
        let mut writer = MessageWriter::new(InterruptOnce {
            interrupted: false,
            out: Vec::new(),
        });
        writer.send_frame(b"abc").unwrap();
        assert_eq!(writer.get_ref().out, b"\x03abc");
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let mut writer = MessageWriter::new(Closed);
        let result = writer.send_frame(b"x");
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }
}
