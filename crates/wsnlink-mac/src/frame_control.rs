//! Frame control word accessors.
//!
//! Bit layout (little-endian on the wire):
//! ```text
//!  15 14 | 13 12 | 11 10 | 9 8 7 | 6 | 5 | 4 | 3 | 2 1 0
//!   SAM  | vers. |  DAM  | rsvd  | C | A | P | S | type
//! ```

use serde::Serialize;

use crate::addr::AddrMode;

pub const TYPE_MASK: u16 = 0x0007;
pub const SECURITY: u16 = 0x0008;
pub const PENDING: u16 = 0x0010;
pub const ACK_REQUEST: u16 = 0x0020;
pub const PAN_COMPRESSION: u16 = 0x0040;
pub const RESERVED_MASK: u16 = 0x0380;
pub const RESERVED_SHIFT: u16 = 7;
pub const DAM_MASK: u16 = 0x0C00;
pub const DAM_SHIFT: u16 = 10;
pub const VERSION_MASK: u16 = 0x3000;
pub const VERSION_SHIFT: u16 = 12;
pub const SAM_MASK: u16 = 0xC000;
pub const SAM_SHIFT: u16 = 14;

/// IEEE 802.15.4 frame type (3 bits).
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    Beacon,
    Data,
    Ack,
    Command,
    /// Codes 4..=7, not defined by the 2003/2006 standard.
    Unknown(u8),
}

impl FrameType {
    pub fn bits(self) -> u8 {
        match self {
            Self::Beacon => 0,
            Self::Data => 1,
            Self::Ack => 2,
            Self::Command => 3,
            Self::Unknown(raw) => raw & TYPE_MASK as u8,
        }
    }
}

impl From<u8> for FrameType {
    fn from(value: u8) -> Self {
        match value & TYPE_MASK as u8 {
            0 => Self::Beacon,
            1 => Self::Data,
            2 => Self::Ack,
            3 => Self::Command,
            raw => Self::Unknown(raw),
        }
    }
}

/// MAC version field (2 bits).
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MacVersion {
    /// IEEE 802.15.4-2003.
    Ieee2003,
    /// IEEE 802.15.4 (2006 and later).
    Current,
    Unknown(u8),
}

impl MacVersion {
    pub fn bits(self) -> u8 {
        match self {
            Self::Ieee2003 => 0,
            Self::Current => 1,
            Self::Unknown(raw) => raw & 0b11,
        }
    }
}

impl From<u8> for MacVersion {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => Self::Ieee2003,
            1 => Self::Current,
            raw => Self::Unknown(raw),
        }
    }
}

/// The 16-bit frame control word.
///
/// Field positions are fixed by the protocol; the accessors only give them
/// names and types.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct FrameControl(u16);

impl FrameControl {
    pub const fn from_bits(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    fn field(self, mask: u16, shift: u16) -> u8 {
        ((self.0 & mask) >> shift) as u8
    }

    fn set_field(&mut self, mask: u16, shift: u16, value: u8) {
        self.0 = (self.0 & !mask) | (((value as u16) << shift) & mask);
    }

    fn flag(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    fn set_flag(&mut self, bit: u16, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn frame_type(self) -> FrameType {
        FrameType::from(self.field(TYPE_MASK, 0))
    }

    pub fn set_frame_type(&mut self, frame_type: FrameType) {
        self.set_field(TYPE_MASK, 0, frame_type.bits());
    }

    pub fn security_enabled(self) -> bool {
        self.flag(SECURITY)
    }

    pub fn set_security_enabled(&mut self, on: bool) {
        self.set_flag(SECURITY, on);
    }

    pub fn frame_pending(self) -> bool {
        self.flag(PENDING)
    }

    pub fn set_frame_pending(&mut self, on: bool) {
        self.set_flag(PENDING, on);
    }

    pub fn ack_request(self) -> bool {
        self.flag(ACK_REQUEST)
    }

    pub fn set_ack_request(&mut self, on: bool) {
        self.set_flag(ACK_REQUEST, on);
    }

    pub fn pan_id_compression(self) -> bool {
        self.flag(PAN_COMPRESSION)
    }

    pub fn set_pan_id_compression(&mut self, on: bool) {
        self.set_flag(PAN_COMPRESSION, on);
    }

    /// The three reserved bits (7..=9).
    pub fn reserved(self) -> u8 {
        self.field(RESERVED_MASK, RESERVED_SHIFT)
    }

    pub fn set_reserved(&mut self, value: u8) {
        self.set_field(RESERVED_MASK, RESERVED_SHIFT, value);
    }

    pub fn dst_addr_mode(self) -> AddrMode {
        AddrMode::from(self.field(DAM_MASK, DAM_SHIFT))
    }

    pub fn set_dst_addr_mode(&mut self, mode: AddrMode) {
        self.set_field(DAM_MASK, DAM_SHIFT, mode.bits());
    }

    pub fn mac_version(self) -> MacVersion {
        MacVersion::from(self.field(VERSION_MASK, VERSION_SHIFT))
    }

    pub fn set_mac_version(&mut self, version: MacVersion) {
        self.set_field(VERSION_MASK, VERSION_SHIFT, version.bits());
    }

    pub fn src_addr_mode(self) -> AddrMode {
        AddrMode::from(self.field(SAM_MASK, SAM_SHIFT))
    }

    pub fn set_src_addr_mode(&mut self, mode: AddrMode) {
        self.set_field(SAM_MASK, SAM_SHIFT, mode.bits());
    }
}
