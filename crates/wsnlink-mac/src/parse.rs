//! Text parsing of frame fields, as typed on a command line.

use crate::addr::{AddrMode, MacAddr};
use crate::error::ParseError;
use crate::frame::MacFrame;
use crate::frame_control::{FrameControl, FrameType, MacVersion};

/// Parse an unsigned integer no larger than `max`.
///
/// Accepts decimal, `0x` hexadecimal, `0b` binary and `0`-prefixed octal.
pub fn parse_uint(input: &str, max: u64) -> Result<u64, ParseError> {
    let s = input.trim();
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
    let bin = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B"));
    let (digits, radix) = if let Some(hex) = hex {
        (hex, 16)
    } else if let Some(bin) = bin {
        (bin, 2)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };

    let value =
        u64::from_str_radix(digits, radix).map_err(|_| ParseError::new("number", input))?;
    if value > max {
        return Err(ParseError::new("number (too large)", input));
    }
    Ok(value)
}

fn starts_with_digit(s: &str) -> bool {
    s.trim_start().starts_with(|c: char| c.is_ascii_digit())
}

/// `beacon`, `data`, `ack`, `cmd`/`command`, or a code 0..=7.
pub fn parse_frame_type(input: &str) -> Result<FrameType, ParseError> {
    if starts_with_digit(input) {
        return Ok(FrameType::from(parse_uint(input, 7)? as u8));
    }
    match input.trim() {
        "beacon" => Ok(FrameType::Beacon),
        "data" => Ok(FrameType::Data),
        "ack" => Ok(FrameType::Ack),
        "cmd" | "command" => Ok(FrameType::Command),
        _ => Err(ParseError::new("type", input)),
    }
}

/// `full`, `reserved`, `short`, `long`, or a code 0..=3.
pub fn parse_addr_mode(input: &str) -> Result<AddrMode, ParseError> {
    if starts_with_digit(input) {
        return Ok(AddrMode::from(parse_uint(input, 3)? as u8));
    }
    match input.trim() {
        "full" => Ok(AddrMode::Full),
        "reserved" => Ok(AddrMode::Reserved),
        "short" => Ok(AddrMode::Short),
        "long" => Ok(AddrMode::Long),
        _ => Err(ParseError::new("address mode", input)),
    }
}

/// `2003`, `current`, or a code 0..=3.
pub fn parse_mac_version(input: &str) -> Result<MacVersion, ParseError> {
    match input.trim() {
        "2003" => Ok(MacVersion::Ieee2003),
        "current" => Ok(MacVersion::Current),
        other if starts_with_digit(other) => Ok(MacVersion::from(parse_uint(other, 3)? as u8)),
        _ => Err(ParseError::new("MAC version", input)),
    }
}

/// The reserved control bits, 0..=7.
pub fn parse_reserved(input: &str) -> Result<u8, ParseError> {
    Ok(parse_uint(input, 7)? as u8)
}

pub fn parse_seqno(input: &str) -> Result<u8, ParseError> {
    Ok(parse_uint(input, u8::MAX as u64)? as u8)
}

const FLAGS: [(&str, char, u16); 3] = [
    ("pending", 'p', crate::frame_control::PENDING),
    ("ack", 'a', crate::frame_control::ACK_REQUEST),
    ("pan-comp", 'c', crate::frame_control::PAN_COMPRESSION),
];

/// Apply a comma-separated flag list to a control word.
///
/// Each item is a flag name (`pending`, `ack`, `pan-comp`) or a run of
/// single letters (`p`, `a`, `c`), optionally prefixed with `+` (set, the
/// default) or `-` (clear). Flags not mentioned are left as they are.
pub fn apply_flags(control: &mut FrameControl, input: &str) -> Result<(), ParseError> {
    let mut bits = control.bits();

    for item in input.split(',').map(str::trim) {
        let (set, names) = match item.as_bytes().first() {
            Some(b'+') => (true, &item[1..]),
            Some(b'-') => (false, &item[1..]),
            Some(_) => (true, item),
            None => return Err(ParseError::new("flag", input)),
        };

        let mut masks = Vec::new();
        if let Some((_, _, mask)) = FLAGS.iter().find(|(name, _, _)| *name == names) {
            masks.push(*mask);
        } else {
            for letter in names.chars() {
                let (_, _, mask) = FLAGS
                    .iter()
                    .find(|(_, short, _)| *short == letter)
                    .ok_or_else(|| ParseError::new("flag", item))?;
                masks.push(*mask);
            }
        }
        if masks.is_empty() {
            return Err(ParseError::new("flag", item));
        }

        for mask in masks {
            if set {
                bits |= mask;
            } else {
                bits &= !mask;
            }
        }
    }

    *control = FrameControl::from_bits(bits);
    Ok(())
}

/// An address typed as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAddress {
    pub mode: AddrMode,
    /// Set when the text carried a PAN identifier.
    pub pan: Option<u16>,
    pub mac: u64,
}

fn parse_hex(input: &str, part: &str, max: u64, what: &'static str) -> Result<u64, ParseError> {
    let value = u64::from_str_radix(part, 16).map_err(|_| ParseError::new(what, input))?;
    if value > max {
        return Err(ParseError::new(what, input));
    }
    Ok(value)
}

/// Parse an address. All numbers are hexadecimal.
///
/// - `*` or `#`: no address (Full mode)
/// - `PAN-SHORT`, `SHORT`: short address
/// - `PAN-AA:BB:CC:DD:EE:FF:GG:HH`, `AA:..:HH`: extended address, most
///   significant byte first
pub fn parse_address(input: &str) -> Result<ParsedAddress, ParseError> {
    let s = input.trim();
    if s == "*" || s == "#" {
        return Ok(ParsedAddress {
            mode: AddrMode::Full,
            pan: None,
            mac: 0,
        });
    }

    let (pan, addr) = match s.split_once('-') {
        Some((pan, addr)) => (Some(parse_hex(input, pan, 0xFFFF, "PAN-ID")? as u16), addr),
        None => (None, s),
    };

    if addr.contains(':') {
        let parts: Vec<&str> = addr.split(':').collect();
        if parts.len() != 8 {
            return Err(ParseError::new("EUI-64", input));
        }
        let mut mac = 0u64;
        for part in parts {
            mac = (mac << 8) | parse_hex(input, part, 0xFF, "EUI-64")?;
        }
        return Ok(ParsedAddress {
            mode: AddrMode::Long,
            pan,
            mac,
        });
    }

    let mac = parse_hex(input, addr, 0xFFFF, "MAC address")?;
    Ok(ParsedAddress {
        mode: AddrMode::Short,
        pan,
        mac,
    })
}

impl MacFrame {
    /// Set the source address and mode. A source given without a PAN turns
    /// PAN-ID compression on; one with a PAN turns it off.
    pub fn set_source(&mut self, addr: ParsedAddress) {
        self.control.set_src_addr_mode(addr.mode);
        self.control.set_pan_id_compression(addr.pan.is_none());
        self.src = MacAddr::new(addr.pan.unwrap_or(self.src.pan), addr.mac);
    }

    /// Set the destination address and mode. Returns `false` if an address
    /// was given without the PAN it belongs to.
    pub fn set_destination(&mut self, addr: ParsedAddress) -> bool {
        self.control.set_dst_addr_mode(addr.mode);
        self.dst = MacAddr::new(addr.pan.unwrap_or(self.dst.pan), addr.mac);
        addr.pan.is_some() || addr.mode == AddrMode::Full
    }
}
