//! Addressing modes and addresses.

use std::fmt;

use serde::Serialize;

/// IEEE 802.15.4 addressing mode (2 bits).
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddrMode {
    /// Neither PAN nor address present.
    Full = 0b00,
    /// PAN and a 64-bit field present, meaning left undefined.
    Reserved = 0b01,
    /// PAN and 16-bit short address.
    Short = 0b10,
    /// PAN and 64-bit extended address.
    Long = 0b11,
}

impl AddrMode {
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Size of the address field on the wire, PAN excluded.
    pub fn addr_len(self) -> usize {
        match self {
            Self::Full => 0,
            Self::Short => 2,
            Self::Long | Self::Reserved => 8,
        }
    }

    /// Whether a PAN field accompanies the address.
    pub fn has_pan(self) -> bool {
        self != Self::Full
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Reserved => "reserved",
            Self::Short => "short",
            Self::Long => "long",
        }
    }
}

impl From<u8> for AddrMode {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::Full,
            0b01 => Self::Reserved,
            0b10 => Self::Short,
            _ => Self::Long,
        }
    }
}

impl fmt::Display for AddrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A PAN identifier and a device address.
///
/// `mac` holds a short address in its low 16 bits or a full EUI-64,
/// depending on the addressing mode of the enclosing frame.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash, Default, Serialize)]
pub struct MacAddr {
    pub pan: u16,
    pub mac: u64,
}

impl MacAddr {
    /// Broadcast PAN and all-ones address.
    pub const BROADCAST: MacAddr = MacAddr {
        pan: 0xFFFF,
        mac: u64::MAX,
    };

    pub const fn new(pan: u16, mac: u64) -> Self {
        Self { pan, mac }
    }

    /// The short address (low 16 bits).
    pub fn short(&self) -> u16 {
        self.mac as u16
    }

    /// Format this address as it is interpreted under `mode`.
    pub fn display(&self, mode: AddrMode) -> AddrDisplay {
        AddrDisplay { addr: *self, mode }
    }
}

/// Formats an address for a given addressing mode.
///
/// `ignored` for Full, `PPPP-SSSS` for Short, `PPPP-AA:BB:CC:DD:EE:FF:GG:HH`
/// for Long (most significant byte first). Reserved addresses are shown
/// like Long with a `(reserved) ` prefix.
#[derive(Debug, Clone, Copy)]
pub struct AddrDisplay {
    addr: MacAddr,
    mode: AddrMode,
}

impl fmt::Display for AddrDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            AddrMode::Full => return f.write_str("ignored"),
            AddrMode::Reserved => f.write_str("(reserved) ")?,
            AddrMode::Short | AddrMode::Long => {}
        }

        write!(f, "{:04X}-", self.addr.pan)?;

        match self.mode {
            AddrMode::Short => write!(f, "{:04X}", self.addr.short()),
            _ => {
                let bytes = self.addr.mac.to_be_bytes();
                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(":")?;
                    }
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits_roundtrip() {
        for raw in 0..4u8 {
            assert_eq!(AddrMode::from(raw).bits(), raw);
        }
    }

    #[test]
    fn field_sizes() {
        assert_eq!(AddrMode::Full.addr_len(), 0);
        assert_eq!(AddrMode::Short.addr_len(), 2);
        assert_eq!(AddrMode::Long.addr_len(), 8);
        assert_eq!(AddrMode::Reserved.addr_len(), 8);
        assert!(!AddrMode::Full.has_pan());
        assert!(AddrMode::Reserved.has_pan());
    }

    #[test]
    fn display_per_mode() {
        let short = MacAddr::new(0x1234, 0xBEEF);
        assert_eq!(short.display(AddrMode::Short).to_string(), "1234-BEEF");
        assert_eq!(short.display(AddrMode::Full).to_string(), "ignored");

        let long = MacAddr::new(0xABCD, 0x0011_2233_4455_6677);
        assert_eq!(
            long.display(AddrMode::Long).to_string(),
            "ABCD-00:11:22:33:44:55:66:77"
        );
        assert_eq!(
            long.display(AddrMode::Reserved).to_string(),
            "(reserved) ABCD-00:11:22:33:44:55:66:77"
        );
    }
}
