use crate::addr::{AddrMode, MacAddr};
use crate::error::{MacError, Result};
use crate::frame_control::{FrameControl, FrameType, MacVersion};

/// Length of the trailing frame check sequence.
pub const FCS_LEN: usize = 2;

/// Largest header + payload the encoder produces: a 127-byte PHY payload
/// minus room for the FCS.
pub const MAX_FRAME_SIZE: usize = 127 - FCS_LEN;

/// Largest payload a decoded frame may carry.
const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// A decoded MAC frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacFrame {
    pub control: FrameControl,
    pub seqno: u8,
    pub dst: MacAddr,
    pub src: MacAddr,
    /// An auxiliary security header was requested. Never carried: both
    /// directions of the codec refuse such frames.
    pub security: bool,
    /// `None` when the frame carries no payload.
    pub payload: Option<Vec<u8>>,
    /// Only meaningful for frames decoded with their checksum.
    pub fcs: u16,
}

impl Default for MacFrame {
    /// A broadcast data frame: 2003 version, no addressing fields on the
    /// wire, sequence number 0, no payload.
    fn default() -> Self {
        let mut control = FrameControl::default();
        control.set_frame_type(FrameType::Data);
        control.set_dst_addr_mode(AddrMode::Full);
        control.set_src_addr_mode(AddrMode::Full);
        control.set_mac_version(MacVersion::Ieee2003);

        Self {
            control,
            seqno: 0,
            dst: MacAddr::BROADCAST,
            src: MacAddr::BROADCAST,
            security: false,
            payload: None,
            fcs: 0,
        }
    }
}

impl MacFrame {
    /// Decode a frame. See [`decode`].
    pub fn decode(buf: &[u8], with_checksum: bool) -> Result<Self> {
        decode(buf, with_checksum)
    }

    /// Encode into a fresh buffer. See [`encode`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(MAX_FRAME_SIZE);
        encode(self, &mut out)?;
        Ok(out)
    }

    pub fn frame_type(&self) -> FrameType {
        self.control.frame_type()
    }

    /// Size of the encoded header: control word, sequence number and both
    /// addressing fields.
    pub fn header_len(&self) -> usize {
        let dst_mode = self.control.dst_addr_mode();
        let src_mode = self.control.src_addr_mode();
        let mut len = 3 + addr_field_len(dst_mode, true);
        len += addr_field_len(src_mode, !self.control.pan_id_compression());
        len
    }

    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }

    pub fn payload_len(&self) -> usize {
        self.payload().len()
    }

    /// Set the payload, storing `None` for an empty one.
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = if payload.is_empty() {
            None
        } else {
            Some(payload)
        };
    }
}

fn addr_field_len(mode: AddrMode, with_pan: bool) -> usize {
    let pan = if with_pan && mode.has_pan() { 2 } else { 0 };
    pan + mode.addr_len()
}

/// Bounds-checked little-endian reader.
struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        let bytes = self.buf.get(self.pos..end).ok_or(MacError::Truncated {
            needed: end,
            available: self.buf.len(),
        })?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u64_le(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    fn addr(&mut self, mode: AddrMode, with_pan: bool) -> Result<MacAddr> {
        let mut addr = MacAddr::default();
        if !mode.has_pan() {
            return Ok(addr);
        }
        if with_pan {
            addr.pan = self.u16_le()?;
        }
        addr.mac = match mode {
            AddrMode::Short => self.u16_le()? as u64,
            _ => self.u64_le()?,
        };
        Ok(addr)
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Decode a MAC frame.
///
/// With `with_checksum` the last two bytes are taken as the FCS (big-endian)
/// and excluded from the payload. Addresses in Full mode decode as zero. When
/// PAN-ID compression is set the source PAN is not on the wire and is copied
/// from the destination.
///
/// A payload longer than 255 bytes is dropped (`payload` is `None`) rather
/// than rejected.
pub fn decode(buf: &[u8], with_checksum: bool) -> Result<MacFrame> {
    let mut fields = Fields::new(buf);

    let control = FrameControl::from_bits(fields.u16_le()?);
    if control.security_enabled() {
        return Err(MacError::SecurityUnsupported);
    }

    let seqno = fields.u8()?;
    let dst = fields.addr(control.dst_addr_mode(), true)?;
    let compressed = control.pan_id_compression();
    let mut src = fields.addr(control.src_addr_mode(), !compressed)?;
    if compressed {
        src.pan = dst.pan;
    }

    let trailer = if with_checksum { FCS_LEN } else { 0 };
    let fcs = if with_checksum {
        if fields.remaining() < FCS_LEN {
            return Err(MacError::Truncated {
                needed: fields.pos + FCS_LEN,
                available: buf.len(),
            });
        }
        let end = buf.len();
        u16::from_be_bytes([buf[end - 2], buf[end - 1]])
    } else {
        0
    };

    let payload_len = fields.remaining() - trailer;
    let payload = if payload_len == 0 || payload_len > MAX_PAYLOAD_LEN {
        None
    } else {
        Some(fields.take(payload_len)?.to_vec())
    };

    Ok(MacFrame {
        control,
        seqno,
        dst,
        src,
        security: false,
        payload,
        fcs,
    })
}

/// Append the encoded header of `frame` to `out`. Returns the bytes written.
pub fn encode_header(frame: &MacFrame, out: &mut Vec<u8>) -> Result<usize> {
    check_encodable(frame, frame.header_len())?;
    Ok(write_header(frame, out))
}

/// Append the encoded frame (header and payload, no FCS) to `out`.
/// Returns the bytes written.
///
/// The FCS is left to the caller or the radio.
pub fn encode(frame: &MacFrame, out: &mut Vec<u8>) -> Result<usize> {
    check_encodable(frame, frame.header_len() + frame.payload_len())?;
    let written = write_header(frame, out);
    out.extend_from_slice(frame.payload());
    Ok(written + frame.payload_len())
}

fn check_encodable(frame: &MacFrame, size: usize) -> Result<()> {
    if frame.security || frame.control.security_enabled() {
        return Err(MacError::SecurityUnsupported);
    }
    if size > MAX_FRAME_SIZE {
        return Err(MacError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(())
}

fn write_header(frame: &MacFrame, out: &mut Vec<u8>) -> usize {
    let start = out.len();
    out.extend_from_slice(&frame.control.to_le_bytes());
    out.push(frame.seqno);
    write_addr(out, frame.control.dst_addr_mode(), &frame.dst, true);
    write_addr(
        out,
        frame.control.src_addr_mode(),
        &frame.src,
        !frame.control.pan_id_compression(),
    );
    out.len() - start
}

fn write_addr(out: &mut Vec<u8>, mode: AddrMode, addr: &MacAddr, with_pan: bool) {
    if !mode.has_pan() {
        return;
    }
    if with_pan {
        out.extend_from_slice(&addr.pan.to_le_bytes());
    }
    match mode {
        AddrMode::Short => out.extend_from_slice(&addr.short().to_le_bytes()),
        _ => out.extend_from_slice(&addr.mac.to_le_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_frame(dam: AddrMode, sam: AddrMode) -> MacFrame {
        let mut frame = MacFrame {
            dst: MacAddr::default(),
            src: MacAddr::default(),
            ..MacFrame::default()
        };
        frame.control.set_dst_addr_mode(dam);
        frame.control.set_src_addr_mode(sam);
        frame
    }

    fn sample_mac(mode: AddrMode, long: u64) -> u64 {
        match mode {
            AddrMode::Short => long & 0xFFFF,
            _ => long,
        }
    }

    #[test]
    fn encode_short_destination_scenario() {
        let mut frame = data_frame(AddrMode::Short, AddrMode::Full);
        frame.seqno = 7;
        frame.dst = MacAddr::new(0x1234, 0xBEEF);
        frame.set_payload(vec![0xAA, 0xBB]);

        let mut out = Vec::new();
        let written = encode(&frame, &mut out).unwrap();

        assert_eq!(written, 9);
        assert_eq!(out, vec![0x01, 0x08, 0x07, 0x34, 0x12, 0xEF, 0xBE, 0xAA, 0xBB]);
        assert_eq!(hex::encode(&out), "0108073412efbeaabb");
    }

    #[test]
    fn decode_short_destination_scenario() {
        let bytes = hex::decode("0108073412efbeaabb").unwrap();
        let frame = decode(&bytes, false).unwrap();

        assert_eq!(frame.frame_type(), FrameType::Data);
        assert_eq!(frame.seqno, 7);
        assert_eq!(frame.dst, MacAddr::new(0x1234, 0xBEEF));
        assert_eq!(frame.src, MacAddr::default());
        assert_eq!(frame.payload(), &[0xAA, 0xBB]);
        assert_eq!(frame.fcs, 0);
    }

    #[test]
    fn roundtrip_every_addressing_combination() {
        let modes = [
            AddrMode::Full,
            AddrMode::Reserved,
            AddrMode::Short,
            AddrMode::Long,
        ];
        for dam in modes {
            for sam in modes {
                let mut frame = data_frame(dam, sam);
                frame.seqno = 0x42;
                if dam.has_pan() {
                    frame.dst = MacAddr::new(0xCAFE, sample_mac(dam, 0x0102_0304_0506_0708));
                }
                if sam.has_pan() {
                    frame.src = MacAddr::new(0xF00D, sample_mac(sam, 0x1112_1314_1516_1718));
                }
                frame.set_payload(b"payload".to_vec());

                let bytes = frame.to_bytes().unwrap();
                assert_eq!(bytes.len(), frame.header_len() + 7);
                let decoded = decode(&bytes, false).unwrap();
                assert_eq!(decoded, frame, "dam={dam} sam={sam}");
            }
        }
    }

    #[test]
    fn pan_compression_is_symmetric() {
        let mut frame = data_frame(AddrMode::Short, AddrMode::Long);
        frame.control.set_pan_id_compression(true);
        frame.dst = MacAddr::new(0xABCD, 0x0001);
        frame.src = MacAddr::new(0x9999, 0x0011_2233_4455_6677);

        let bytes = frame.to_bytes().unwrap();
        // control + seqno + dst (PAN + short) + src (long only)
        assert_eq!(bytes.len(), 3 + 4 + 8);

        let decoded = decode(&bytes, false).unwrap();
        assert_eq!(decoded.src.pan, 0xABCD);
        assert_eq!(decoded.src.mac, 0x0011_2233_4455_6677);
    }

    #[test]
    fn checksum_is_read_big_endian_from_the_end() {
        let bytes = hex::decode("0108073412efbeaabb1234").unwrap();
        let frame = decode(&bytes, true).unwrap();

        assert_eq!(frame.payload(), &[0xAA, 0xBB]);
        assert_eq!(frame.fcs, 0x1234);
    }

    #[test]
    fn checksum_without_payload() {
        let bytes = hex::decode("0108073412efbe5678").unwrap();
        let frame = decode(&bytes, true).unwrap();

        assert!(frame.payload.is_none());
        assert_eq!(frame.fcs, 0x5678);
    }

    #[test]
    fn missing_checksum_is_truncated() {
        let bytes = hex::decode("0108073412efbe56").unwrap();
        assert_eq!(
            decode(&bytes, true),
            Err(MacError::Truncated {
                needed: 9,
                available: 8
            })
        );
    }

    #[test]
    fn oversized_payload_is_dropped() {
        // Full/Full header followed by more bytes than a payload may hold.
        let mut bytes = vec![0x01, 0x00, 0x00];
        bytes.extend(std::iter::repeat(0x55).take(300));

        let frame = decode(&bytes, false).unwrap();
        assert!(frame.payload.is_none());

        let frame = decode(&bytes, true).unwrap();
        assert!(frame.payload.is_none());
        assert_eq!(frame.fcs, 0x5555);
    }

    #[test]
    fn largest_payload_is_kept() {
        let mut bytes = vec![0x01, 0x00, 0x00];
        bytes.extend(std::iter::repeat(0x77).take(255));
        let frame = decode(&bytes, false).unwrap();
        assert_eq!(frame.payload_len(), 255);
    }

    #[test]
    fn security_bit_is_rejected() {
        let bytes = [0x09, 0x00, 0x01];
        assert_eq!(decode(&bytes, false), Err(MacError::SecurityUnsupported));

        let mut frame = MacFrame::default();
        frame.control.set_security_enabled(true);
        assert_eq!(frame.to_bytes(), Err(MacError::SecurityUnsupported));

        let frame = MacFrame {
            security: true,
            ..MacFrame::default()
        };
        assert_eq!(frame.to_bytes(), Err(MacError::SecurityUnsupported));
    }

    #[test]
    fn truncated_fields() {
        assert_eq!(
            decode(&[0x01], false),
            Err(MacError::Truncated {
                needed: 2,
                available: 1
            })
        );
        assert_eq!(
            decode(&[0x01, 0x08], false),
            Err(MacError::Truncated {
                needed: 3,
                available: 2
            })
        );
        // Long destination announced, only part of it present.
        assert_eq!(
            decode(&[0x01, 0x0C, 0x00, 0x34, 0x12, 0x01, 0x02], false),
            Err(MacError::Truncated {
                needed: 13,
                available: 7
            })
        );
    }

    #[test]
    fn too_large_frame_is_rejected() {
        let mut frame = MacFrame::default();
        frame.set_payload(vec![0; 122]);
        assert_eq!(frame.to_bytes().map(|b| b.len()), Ok(125));

        frame.set_payload(vec![0; 123]);
        assert_eq!(
            frame.to_bytes(),
            Err(MacError::FrameTooLarge { size: 126, max: 125 })
        );
    }

    #[test]
    fn header_only_encoding() {
        let mut frame = data_frame(AddrMode::Short, AddrMode::Short);
        frame.control.set_pan_id_compression(true);
        frame.dst = MacAddr::new(0x1234, 0x0001);
        frame.src = MacAddr::new(0x1234, 0x0002);
        frame.set_payload(vec![1, 2, 3]);

        let mut out = Vec::new();
        let written = encode_header(&frame, &mut out).unwrap();
        assert_eq!(written, frame.header_len());
        assert_eq!(out, vec![0x41, 0x88, 0x00, 0x34, 0x12, 0x01, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn default_frame_is_broadcast_data() {
        let frame = MacFrame::default();
        assert_eq!(frame.frame_type(), FrameType::Data);
        assert_eq!(frame.control.mac_version(), MacVersion::Ieee2003);
        assert_eq!(frame.dst, MacAddr::BROADCAST);
        assert_eq!(frame.header_len(), 3);
        assert_eq!(frame.to_bytes().unwrap(), vec![0x01, 0x00, 0x00]);
    }
}
