//! Human-readable frame rendering.

use std::fmt;

use crate::frame::MacFrame;
use crate::frame_control::{FrameType, MacVersion};

impl FrameType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Beacon => "BEACON",
            Self::Data => "DATA",
            Self::Ack => "ACK",
            Self::Command => "COMMAND",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "UNKNOWN frame (0x{raw:x})"),
            other => write!(f, "{} frame", other.name()),
        }
    }
}

impl fmt::Display for MacVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ieee2003 => f.write_str("IEEE 802.15.4-2003"),
            Self::Current => f.write_str("IEEE 802.15.4"),
            Self::Unknown(raw) => write!(f, "unknown (0x{raw:x})"),
        }
    }
}

/// Which sections of a frame to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayFlags {
    pub control: bool,
    pub seqno: bool,
    pub addr: bool,
    pub security: bool,
}

impl DisplayFlags {
    pub const ALL: DisplayFlags = DisplayFlags {
        control: true,
        seqno: true,
        addr: true,
        security: true,
    };

    pub fn any(&self) -> bool {
        self.control || self.seqno || self.addr || self.security
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Multi-line rendering of a frame. With no section selected only the
/// frame type line is produced.
pub struct FrameDisplay<'a> {
    frame: &'a MacFrame,
    flags: DisplayFlags,
}

impl MacFrame {
    pub fn display(&self, flags: DisplayFlags) -> FrameDisplay<'_> {
        FrameDisplay { frame: self, flags }
    }
}

impl fmt::Display for FrameDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.frame;
        let fc = frame.control;

        write!(f, "{}", fc.frame_type())?;
        if !self.flags.any() {
            return writeln!(f);
        }
        writeln!(f, ":")?;

        if self.flags.control {
            writeln!(f, " Control:")?;
            let version = fc.mac_version();
            if version != MacVersion::Current {
                writeln!(f, "  Version   : {version}")?;
            }
            writeln!(f, "  Type      : {}", fc.frame_type())?;
            writeln!(f, "  Security  : {}", yes_no(fc.security_enabled()))?;
            writeln!(f, "  Pending   : {}", yes_no(fc.frame_pending()))?;
            writeln!(f, "  ACK req.  : {}", yes_no(fc.ack_request()))?;
            writeln!(f, "  PAN comp. : {}", yes_no(fc.pan_id_compression()))?;
            writeln!(f, "  DAM       : {}", fc.dst_addr_mode())?;
            writeln!(f, "  SAM       : {}", fc.src_addr_mode())?;
            if fc.reserved() != 0 {
                writeln!(f, "  Reserved  : 0x{:x}", fc.reserved())?;
            }
        }

        if self.flags.seqno {
            writeln!(f, " Sequence number: {}", frame.seqno)?;
        }

        if self.flags.addr {
            writeln!(f, " Src. address  : {}", frame.src.display(fc.src_addr_mode()))?;
            writeln!(f, " Dest. address : {}", frame.dst.display(fc.dst_addr_mode()))?;
        }

        if frame.security && self.flags.security {
            writeln!(f, " Security not implemented")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{AddrMode, MacAddr};

    #[test]
    fn type_names() {
        assert_eq!(FrameType::Command.to_string(), "COMMAND frame");
        assert_eq!(FrameType::Unknown(6).to_string(), "UNKNOWN frame (0x6)");
        assert_eq!(FrameType::Ack.name(), "ACK");
    }

    #[test]
    fn summary_only() {
        let frame = MacFrame::default();
        assert_eq!(
            frame.display(DisplayFlags::default()).to_string(),
            "DATA frame\n"
        );
    }

    #[test]
    fn full_rendering() {
        let mut frame = MacFrame::default();
        frame.seqno = 7;
        frame.control.set_dst_addr_mode(AddrMode::Short);
        frame.control.set_ack_request(true);
        frame.dst = MacAddr::new(0x1234, 0xBEEF);

        let text = frame.display(DisplayFlags::ALL).to_string();
        let expected = "DATA frame:\n \
                        Control:\n  \
                        Version   : IEEE 802.15.4-2003\n  \
                        Type      : DATA frame\n  \
                        Security  : no\n  \
                        Pending   : no\n  \
                        ACK req.  : yes\n  \
                        PAN comp. : no\n  \
                        DAM       : short\n  \
                        SAM       : full\n \
                        Sequence number: 7\n \
                        Src. address  : ignored\n \
                        Dest. address : 1234-BEEF\n";
        assert_eq!(text, expected);
    }
}
