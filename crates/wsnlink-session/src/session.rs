use std::cell::RefCell;
use std::io::Write;
#[cfg(unix)]
use std::path::Path;
use std::time::Duration;

use tracing::debug;
use wsnlink_frame::{
    ControlMessage, ControlSubtype, Flow, LoopExit, Message, MessageKind, MessageReader,
    MessageWriter, ReaderConfig,
};
use wsnlink_transport::WaitReadable;
#[cfg(unix)]
use wsnlink_transport::{SerialConfig, SerialLine};

use crate::control::ControlQueue;
use crate::error::{Result, SessionError};
use crate::handshake::{wait_ready, HandshakeConfig};

/// Everything needed to open a session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    #[cfg(unix)]
    pub serial: SerialConfig,
    pub reader: ReaderConfig,
    pub handshake: HandshakeConfig,
}

/// Receives the messages of a session, one method per kind.
///
/// Returning an error stops the loop and makes [`Session::dispatch`] fail
/// with it.
pub trait MessageHandler {
    /// A frame message with a non-empty payload.
    fn on_frame(&mut self, frame: &[u8]) -> Result<Flow>;

    /// A control message with at least its subtype byte.
    fn on_control(&mut self, control: ControlMessage<'_>) -> Result<Flow>;

    /// A message without payload. Fatal unless overridden.
    fn on_empty(&mut self, _kind: MessageKind) -> Result<Flow> {
        Err(SessionError::EmptyMessage)
    }

    /// Called each poll interval without input.
    fn on_idle(&mut self) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}

/// A live link to the transceiver firmware.
pub struct Session<R, W> {
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
}

#[cfg(unix)]
impl Session<SerialLine, SerialLine> {
    /// Open the serial line, wait for the ready byte and send the queued
    /// control messages.
    pub fn open(
        path: impl AsRef<Path>,
        config: &SessionConfig,
        queue: ControlQueue,
    ) -> Result<Self> {
        let line = SerialLine::open(path, &config.serial)?;
        let read_half = line.try_clone()?;
        Self::connect(read_half, line, config, queue)
    }
}

impl<R: WaitReadable, W: Write> Session<R, W> {
    /// Start a session over already open halves of a line.
    pub fn connect(
        mut read_half: R,
        write_half: W,
        config: &SessionConfig,
        queue: ControlQueue,
    ) -> Result<Self> {
        wait_ready(&mut read_half, &config.handshake)?;

        let mut writer = MessageWriter::new(write_half);
        let sent = queue.flush(&mut writer)?;
        debug!(sent, "session started");

        let reader = MessageReader::with_config(read_half, config.reader.clone());
        Ok(Self::from_parts(reader, writer))
    }

    /// Build a session from parts, skipping the handshake.
    pub fn from_parts(reader: MessageReader<R>, writer: MessageWriter<W>) -> Self {
        Self { reader, writer }
    }

    /// Run the reassembly loop with a closure. See [`MessageReader::run`].
    pub fn run<H>(&mut self, handler: H) -> Result<LoopExit>
    where
        H: FnMut(Message<'_>) -> Flow,
    {
        Ok(self.reader.run(handler)?)
    }

    /// Run the reassembly loop with an idle callback.
    pub fn run_with_idle<H, I>(&mut self, handler: H, on_idle: I) -> Result<LoopExit>
    where
        H: FnMut(Message<'_>) -> Flow,
        I: FnMut() -> Flow,
    {
        Ok(self.reader.run_with_idle(handler, on_idle)?)
    }

    /// Run the reassembly loop, routing each message to `handler`.
    pub fn dispatch<H>(&mut self, handler: &mut H) -> Result<LoopExit>
    where
        H: MessageHandler + ?Sized,
    {
        let state = RefCell::new((handler, None::<SessionError>));

        let exit = self.reader.run_with_idle(
            |message| {
                let mut state = state.borrow_mut();
                let (handler, failure) = &mut *state;
                match deliver(&mut **handler, message) {
                    Ok(flow) => flow,
                    Err(err) => {
                        *failure = Some(err);
                        Flow::Stop
                    }
                }
            },
            || {
                let mut state = state.borrow_mut();
                let (handler, failure) = &mut *state;
                match handler.on_idle() {
                    Ok(flow) => flow,
                    Err(err) => {
                        *failure = Some(err);
                        Flow::Stop
                    }
                }
            },
        )?;

        match state.into_inner().1 {
            Some(err) => Err(err),
            None => Ok(exit),
        }
    }

    /// Send a raw MAC frame.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        Ok(self.writer.send_frame(frame)?)
    }

    /// Send a control message.
    pub fn send_control(&mut self, subtype: ControlSubtype, data: &[u8]) -> Result<()> {
        Ok(self.writer.send_control(subtype, data)?)
    }

    /// Change the inactivity budget of subsequent runs.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.reader.set_timeout(timeout);
    }

    /// Bytes received but not yet delivered.
    pub fn pending(&self) -> &[u8] {
        self.reader.pending()
    }

    pub fn reader_mut(&mut self) -> &mut MessageReader<R> {
        &mut self.reader
    }

    pub fn writer_mut(&mut self) -> &mut MessageWriter<W> {
        &mut self.writer
    }

    pub fn into_parts(self) -> (MessageReader<R>, MessageWriter<W>) {
        (self.reader, self.writer)
    }
}

fn deliver<H>(handler: &mut H, message: Message<'_>) -> Result<Flow>
where
    H: MessageHandler + ?Sized,
{
    match message.kind {
        _ if message.payload.is_empty() => handler.on_empty(message.kind),
        MessageKind::Frame => handler.on_frame(message.payload),
        MessageKind::Control => match message.as_control() {
            Some(control) => handler.on_control(control),
            None => handler.on_empty(message.kind),
        },
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Read;
    use std::os::unix::net::UnixStream;

    use bytes::BytesMut;
    use wsnlink_frame::encode_message;

    use super::*;
    use crate::handshake::READY_BYTE;

    fn quick_config() -> SessionConfig {
        SessionConfig {
            reader: ReaderConfig {
                poll_interval: Duration::from_millis(5),
                timeout: Some(Duration::from_millis(100)),
                ..ReaderConfig::default()
            },
            handshake: HandshakeConfig {
                timeout: Duration::from_millis(200),
                ..HandshakeConfig::default()
            },
            ..SessionConfig::default()
        }
    }

    fn wire(messages: &[(MessageKind, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (kind, payload) in messages {
            encode_message(*kind, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn connect(queue: ControlQueue) -> (Session<UnixStream, UnixStream>, UnixStream) {
        let (mut firmware, host) = UnixStream::pair().unwrap();
        firmware.write_all(&[READY_BYTE]).unwrap();
        let session =
            Session::connect(host.try_clone().unwrap(), host, &quick_config(), queue).unwrap();
        (session, firmware)
    }

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Vec<u8>>,
        controls: Vec<(u8, Vec<u8>)>,
        stop_after: Option<usize>,
    }

    impl Recorder {
        fn seen(&self) -> usize {
            self.frames.len() + self.controls.len()
        }

        fn flow(&self) -> Flow {
            match self.stop_after {
                Some(n) if self.seen() >= n => Flow::Stop,
                _ => Flow::Continue,
            }
        }
    }

    impl MessageHandler for Recorder {
        fn on_frame(&mut self, frame: &[u8]) -> Result<Flow> {
            self.frames.push(frame.to_vec());
            Ok(self.flow())
        }

        fn on_control(&mut self, control: ControlMessage<'_>) -> Result<Flow> {
            if control.subtype().is_none() {
                return Err(SessionError::UnexpectedMessage(control.name().into_owned()));
            }
            self.controls.push((control.code, control.data.to_vec()));
            Ok(self.flow())
        }
    }

    #[test]
    fn queue_is_flushed_after_ready() {
        let mut queue = ControlQueue::new();
        queue.push_channel(26);
        let (_session, mut firmware) = connect(queue);

        let mut sent = [0u8; 4];
        firmware.read_exact(&mut sent).unwrap();
        assert_eq!(sent, [0x83, 0x07, 0x1A, 0x00]);
    }

    #[test]
    fn dispatch_routes_by_kind() {
        let (mut session, mut firmware) = connect(ControlQueue::new());
        firmware
            .write_all(&wire(&[
                (MessageKind::Control, b"\x02"),
                (MessageKind::Frame, b"\x41\x88"),
                (MessageKind::Control, b"\x00text"),
            ]))
            .unwrap();

        let mut recorder = Recorder {
            stop_after: Some(3),
            ..Recorder::default()
        };
        let exit = session.dispatch(&mut recorder).unwrap();

        assert_eq!(exit, LoopExit::Completed);
        assert_eq!(recorder.frames, vec![b"\x41\x88".to_vec()]);
        assert_eq!(
            recorder.controls,
            vec![(2, Vec::new()), (0, b"text".to_vec())]
        );
    }

    #[test]
    fn handler_error_ends_dispatch() {
        let (mut session, mut firmware) = connect(ControlQueue::new());
        firmware
            .write_all(&wire(&[
                (MessageKind::Control, b"\x42"),
                (MessageKind::Frame, b"never"),
            ]))
            .unwrap();

        let mut recorder = Recorder::default();
        let err = session.dispatch(&mut recorder).unwrap_err();

        assert!(matches!(err, SessionError::UnexpectedMessage(ref name) if name == "(0x42)"));
        assert!(recorder.frames.is_empty());
        assert!(!session.pending().is_empty());
    }

    #[test]
    fn empty_message_is_fatal_by_default() {
        let (mut session, mut firmware) = connect(ControlQueue::new());
        firmware.write_all(&[0x80]).unwrap();

        let err = session.dispatch(&mut Recorder::default()).unwrap_err();
        assert!(matches!(err, SessionError::EmptyMessage));
    }

    #[test]
    fn silence_times_out() {
        let (mut session, _firmware) = connect(ControlQueue::new());
        let exit = session.dispatch(&mut Recorder::default()).unwrap();
        assert_eq!(exit, LoopExit::TimedOut);
    }

    #[test]
    fn sends_reach_the_firmware() {
        let (mut session, mut firmware) = connect(ControlQueue::new());
        session.send_frame(b"\x01\x00\x00").unwrap();
        session.send_control(ControlSubtype::Ping, b"\x01").unwrap();

        let mut sent = [0u8; 7];
        firmware.read_exact(&mut sent).unwrap();
        assert_eq!(sent, [0x03, 0x01, 0x00, 0x00, 0x82, 0x05, 0x01]);
    }

    #[test]
    fn missing_ready_byte_fails_connect() {
        let (_firmware, host) = UnixStream::pair().unwrap();
        let result = Session::connect(
            host.try_clone().unwrap(),
            host,
            &quick_config(),
            ControlQueue::new(),
        );
        assert!(matches!(result, Err(SessionError::ReadyTimeout(_))));
    }
}
