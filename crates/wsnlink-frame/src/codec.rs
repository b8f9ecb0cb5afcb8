use bytes::{BufMut, Bytes, BytesMut};

use crate::control::ControlMessage;
use crate::error::{FrameError, Result};

/// Largest payload a single message can carry (7-bit length).
pub const MAX_PAYLOAD: usize = 127;

/// Largest encoded message: information byte + payload.
pub const MAX_WIRE_SIZE: usize = MAX_PAYLOAD + 1;

const KIND_BIT: u8 = 0x80;
const LEN_MASK: u8 = 0x7F;

/// The kind of a message, carried in bit 7 of the information byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A raw MAC frame to or from the air.
    Frame,
    /// A subtype byte followed by command/response data.
    Control,
}

impl MessageKind {
    /// Extract the kind from an information byte.
    pub fn from_info(info: u8) -> Self {
        if info & KIND_BIT == 0 {
            Self::Frame
        } else {
            Self::Control
        }
    }

    /// The kind bit as it appears in the information byte.
    pub fn info_bit(self) -> u8 {
        match self {
            Self::Frame => 0,
            Self::Control => KIND_BIT,
        }
    }

    /// Human-readable name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Frame => "FRAME",
            Self::Control => "CONTROL",
        }
    }
}

/// A decoded message borrowing its payload from the reassembly buffer.
///
/// The payload is only valid for the duration of the handler call it is
/// delivered to; use [`Message::to_owned_message`] to keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub kind: MessageKind,
    pub payload: &'a [u8],
}

impl<'a> Message<'a> {
    /// Create a message view.
    pub fn new(kind: MessageKind, payload: &'a [u8]) -> Self {
        Self { kind, payload }
    }

    /// The total wire size of this message (information byte + payload).
    pub fn wire_size(&self) -> usize {
        1 + self.payload.len()
    }

    /// View a control message as subtype + data.
    ///
    /// Returns `None` for frame messages and for control messages without
    /// a subtype byte.
    pub fn as_control(&self) -> Option<ControlMessage<'a>> {
        match self.kind {
            MessageKind::Control => ControlMessage::parse(self.payload),
            MessageKind::Frame => None,
        }
    }

    /// Copy the payload out of the reassembly buffer.
    pub fn to_owned_message(&self) -> OwnedMessage {
        OwnedMessage {
            kind: self.kind,
            payload: Bytes::copy_from_slice(self.payload),
        }
    }
}

/// A message that owns its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedMessage {
    pub kind: MessageKind,
    pub payload: Bytes,
}

impl OwnedMessage {
    /// Create an owned message.
    pub fn new(kind: MessageKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Borrow this message as a [`Message`] view.
    pub fn as_message(&self) -> Message<'_> {
        Message::new(self.kind, self.payload.as_ref())
    }
}

/// Encode a message into the wire format.
///
/// Wire format:
/// ```text
/// ┌───┬──────────────┬──────────────────────┐
/// │ K │ Length (7b)  │ Payload              │
/// │ 1b│ 0..=127      │ (Length bytes)       │
/// └───┴──────────────┴──────────────────────┘
///  info byte
/// ```
/// The information byte and the payload are appended to `dst` together so
/// the caller can hand the whole message to a single write.
pub fn encode_message(kind: MessageKind, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(1 + payload.len());
    dst.put_u8(kind.info_bit() | payload.len() as u8);
    dst.put_slice(payload);
    Ok(())
}

/// Decode the first message of a buffer.
///
/// Returns `None` if the buffer doesn't contain a complete message yet; the
/// caller must keep the bytes and read more. On success returns the message,
/// borrowing from `src`, and the number of bytes it occupied.
pub fn decode_message(src: &[u8]) -> Option<(Message<'_>, usize)> {
    let info = *src.first()?;
    let len = (info & LEN_MASK) as usize;
    let total = 1 + len;

    if src.len() < total {
        return None; // Need more data
    }

    let message = Message::new(MessageKind::from_info(info), &src[1..total]);
    Some((message, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlSubtype;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, transceiver";

        encode_message(MessageKind::Frame, payload, &mut buf).unwrap();
        assert_eq!(buf.len(), 1 + payload.len());

        let (message, used) = decode_message(&buf).unwrap();
        assert_eq!(message.kind, MessageKind::Frame);
        assert_eq!(message.payload, payload);
        assert_eq!(used, buf.len());
    }

    #[test]
    fn test_info_byte_layout() {
        let mut buf = BytesMut::new();
        encode_message(MessageKind::Control, &[0u8; 5], &mut buf).unwrap();
        assert_eq!(buf[0], 0x85);

        buf.clear();
        encode_message(MessageKind::Frame, &[0u8; 127], &mut buf).unwrap();
        assert_eq!(buf[0], 0x7F);
    }

    #[test]
    fn test_config_channel_encoding() {
        let mut buf = BytesMut::new();
        let payload = [ControlSubtype::ConfigChannel.code(), 0x0B, 0x00];
        encode_message(MessageKind::Control, &payload, &mut buf).unwrap();

        assert_eq!(buf.as_ref(), &[0x83, 0x07, 0x0B, 0x00]);
    }

    #[test]
    fn test_payload_too_large() {
        let mut buf = BytesMut::new();
        let result = encode_message(MessageKind::Frame, &[0u8; 128], &mut buf);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size: 128, max: 127 })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_empty_buffer() {
        assert!(decode_message(&[]).is_none());
    }

    #[test]
    fn test_every_strict_prefix_is_incomplete() {
        let mut buf = BytesMut::new();
        encode_message(MessageKind::Control, b"\x00some info text", &mut buf).unwrap();

        for end in 0..buf.len() {
            assert!(
                decode_message(&buf[..end]).is_none(),
                "prefix of {end} bytes decoded"
            );
        }
        assert!(decode_message(&buf).is_some());
    }

    #[test]
    fn test_every_info_byte_is_valid() {
        let wire = [0u8; MAX_WIRE_SIZE];
        for info in 0..=u8::MAX {
            let mut buf = wire;
            buf[0] = info;
            let (message, used) = decode_message(&buf).unwrap();
            assert_eq!(used, 1 + (info & 0x7F) as usize);
            assert_eq!(message.kind, MessageKind::from_info(info));
        }
    }

    #[test]
    fn test_multiple_messages() {
        let mut buf = BytesMut::new();
        encode_message(MessageKind::Frame, b"first", &mut buf).unwrap();
        encode_message(MessageKind::Control, b"\x06", &mut buf).unwrap();

        let (m1, used1) = decode_message(&buf).unwrap();
        assert_eq!(m1.kind, MessageKind::Frame);
        assert_eq!(m1.payload, b"first");

        let (m2, used2) = decode_message(&buf[used1..]).unwrap();
        assert_eq!(m2.kind, MessageKind::Control);
        assert_eq!(m2.as_control().unwrap().subtype(), Some(ControlSubtype::Ack));
        assert_eq!(used1 + used2, buf.len());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_message(MessageKind::Control, b"", &mut buf).unwrap();

        let (message, used) = decode_message(&buf).unwrap();
        assert_eq!(used, 1);
        assert!(message.payload.is_empty());
        assert!(message.as_control().is_none());
    }

    #[test]
    fn test_owned_message_copies_payload() {
        let wire = [0x02, 0xAA, 0xBB];
        let (message, _) = decode_message(&wire).unwrap();
        let owned = message.to_owned_message();
        assert_eq!(owned.as_message(), message);
        assert_eq!(owned.payload.as_ref(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_message_wire_size() {
        let message = Message::new(MessageKind::Frame, b"test");
        assert_eq!(message.wire_size(), 5);
    }
}
