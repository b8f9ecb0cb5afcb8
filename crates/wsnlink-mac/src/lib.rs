//! IEEE 802.15.4 MAC frame codec.
//!
//! Covers the subset of 2003/2006 MAC framing the transceiver carries:
//! frame control word, sequence number, destination and source addressing
//! with PAN-ID compression, payload and an optional trailing FCS. Security
//! headers are recognised and rejected.

pub mod addr;
pub mod display;
pub mod error;
pub mod frame;
pub mod frame_control;
pub mod parse;

pub use addr::{AddrMode, MacAddr};
pub use display::{DisplayFlags, FrameDisplay};
pub use error::{MacError, ParseError, Result};
pub use frame::{
    decode as decode_mac_frame, encode as encode_mac_frame, encode_header, MacFrame, FCS_LEN,
    MAX_FRAME_SIZE,
};
pub use frame_control::{FrameControl, FrameType, MacVersion};
pub use parse::ParsedAddress;
