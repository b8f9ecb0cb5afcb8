use std::collections::VecDeque;
use std::io::Write;

use tracing::debug;
use wsnlink_frame::{ControlMessage, ControlSubtype, MessageWriter, MAX_PAYLOAD};

use crate::error::{Result, SessionError};

/// A control message waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedControlMessage {
    pub subtype: ControlSubtype,
    pub data: Vec<u8>,
}

/// Control messages declared before the line is open.
///
/// Filled while parsing arguments, then sent once, in order, right after
/// the ready handshake.
#[derive(Debug, Default)]
pub struct ControlQueue {
    entries: VecDeque<QueuedControlMessage>,
}

impl ControlQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a control message.
    ///
    /// # Panics
    ///
    /// If `data` does not leave room for the subtype byte in one message.
    pub fn push(&mut self, subtype: ControlSubtype, data: impl Into<Vec<u8>>) {
        let data = data.into();
        assert!(
            data.len() < MAX_PAYLOAD,
            "control data too large ({} bytes)",
            data.len()
        );
        self.entries.push_back(QueuedControlMessage { subtype, data });
    }

    /// Queue a channel selection.
    pub fn push_channel(&mut self, channel: u16) {
        self.push(
            ControlSubtype::ConfigChannel,
            wsnlink_frame::control::config_channel_data(channel),
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedControlMessage> {
        self.entries.iter()
    }

    /// Send every queued message in order, each as its own control message.
    /// Returns how many were sent.
    pub fn flush<W: Write>(self, writer: &mut MessageWriter<W>) -> Result<usize> {
        let count = self.entries.len();
        for entry in self.entries {
            debug!(
                subtype = entry.subtype.name(),
                len = entry.data.len(),
                "sending queued control message"
            );
            writer.send_control(entry.subtype, &entry.data)?;
        }
        Ok(count)
    }
}

/// Handle the control messages every tool treats the same way.
///
/// INFO text goes to `info_out` as is, DEBUG text goes to `debug_out` with
/// a `debug: ` prefix. CLI_ERROR and SRV_ERROR become fatal errors. Returns
/// `false` for any other subtype, which the caller must handle.
pub fn preparse_control<O, E>(
    control: &ControlMessage<'_>,
    info_out: &mut O,
    debug_out: &mut E,
) -> Result<bool>
where
    O: Write + ?Sized,
    E: Write + ?Sized,
{
    match control.subtype() {
        Some(ControlSubtype::Info) => {
            info_out.write_all(control.data)?;
            info_out.flush()?;
        }
        Some(ControlSubtype::Debug) => {
            debug!(text = %control.text(), "firmware debug message");
            debug_out.write_all(b"debug: ")?;
            debug_out.write_all(control.data)?;
            debug_out.write_all(b"\n")?;
        }
        Some(ControlSubtype::ClientError) => return Err(SessionError::ClientError),
        Some(ControlSubtype::ServerError) => return Err(SessionError::ServerError),
        _ => return Ok(false),
    }
    Ok(true)
}
