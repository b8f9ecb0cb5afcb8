//! Message framing between the host tools and the transceiver firmware.
//!
//! The transmission unit is a message: one information byte followed by
//! 0 to 127 payload bytes.
//! - Bit 7 of the information byte is the message kind (0 = frame, 1 = control)
//! - Bits 6..0 are the payload length
//!
//! Frame messages carry a raw IEEE 802.15.4 frame. Control messages start
//! with a subtype byte and carry configuration, diagnostics and replies.
//!
//! [`MessageReader`] turns a byte stream read in arbitrary chunks into
//! complete messages; [`MessageWriter`] sends one message per write.

pub mod codec;
pub mod control;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_message, encode_message, Message, MessageKind, OwnedMessage, MAX_PAYLOAD,
    MAX_WIRE_SIZE,
};
pub use control::{config_channel_data, subtype_name, ControlMessage, ControlSubtype};
pub use error::{FrameError, Result};
pub use reader::{Flow, LoopExit, MessageReader, ReaderConfig};
pub use writer::MessageWriter;
