use std::borrow::Cow;

/// Control message subtypes understood by the host tools.
///
/// The code is the first payload byte of every control message and is
/// shared with the firmware; the numbering must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlSubtype {
    /// Informative text from the firmware, printed to stdout.
    Info = 0,
    /// Debug text from the firmware, printed to stderr.
    Debug = 1,
    /// Request processed.
    Ok = 2,
    /// The firmware rejected a request from the host.
    ClientError = 3,
    /// The firmware failed internally.
    ServerError = 4,
    /// Echo request/reply used to test the line.
    Ping = 5,
    /// The transmitted frame was acknowledged by its recipient.
    Ack = 6,
    /// Select the radio channel; data is a 16-bit little-endian channel.
    ConfigChannel = 7,
}

impl ControlSubtype {
    /// Every known subtype, in code order.
    pub const ALL: [ControlSubtype; 8] = [
        Self::Info,
        Self::Debug,
        Self::Ok,
        Self::ClientError,
        Self::ServerError,
        Self::Ping,
        Self::Ack,
        Self::ConfigChannel,
    ];

    /// Look up a subtype by its wire code.
    pub fn from_u8(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// The wire code of this subtype.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Ok => "OK",
            Self::ClientError => "CLI_ERROR",
            Self::ServerError => "SRV_ERROR",
            Self::Ping => "PING",
            Self::Ack => "ACK",
            Self::ConfigChannel => "CONFIG_CHANNEL",
        }
    }
}

impl std::fmt::Display for ControlSubtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Name of a raw subtype code, `(0x..)` for codes this host doesn't know.
pub fn subtype_name(code: u8) -> Cow<'static, str> {
    match ControlSubtype::from_u8(code) {
        Some(subtype) => Cow::Borrowed(subtype.name()),
        None => Cow::Owned(format!("(0x{code:x})")),
    }
}

/// A control message split into its subtype code and data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage<'a> {
    pub code: u8,
    pub data: &'a [u8],
}

impl<'a> ControlMessage<'a> {
    /// Split a control payload. Returns `None` if it has no subtype byte.
    pub fn parse(payload: &'a [u8]) -> Option<Self> {
        let (&code, data) = payload.split_first()?;
        Some(Self { code, data })
    }

    /// The subtype, if the code is known.
    pub fn subtype(&self) -> Option<ControlSubtype> {
        ControlSubtype::from_u8(self.code)
    }

    pub fn name(&self) -> Cow<'static, str> {
        subtype_name(self.code)
    }

    /// The data as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.data)
    }
}

/// Data of a `ConfigChannel` request.
pub fn config_channel_data(channel: u16) -> [u8; 2] {
    channel.to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let codes: Vec<u8> = ControlSubtype::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        for subtype in ControlSubtype::ALL {
            assert_eq!(ControlSubtype::from_u8(subtype.code()), Some(subtype));
        }
        assert_eq!(ControlSubtype::from_u8(8), None);
    }

    #[test]
    fn unknown_subtype_is_named_by_code() {
        assert_eq!(subtype_name(0x2a), "(0x2a)");
        assert_eq!(subtype_name(3), "CLI_ERROR");
        assert_eq!(ControlSubtype::ServerError.to_string(), "SRV_ERROR");
    }

    #[test]
    fn parse_splits_subtype_and_data() {
        let control = ControlMessage::parse(b"\x00hello").unwrap();
        assert_eq!(control.subtype(), Some(ControlSubtype::Info));
        assert_eq!(control.text(), "hello");

        assert!(ControlMessage::parse(b"").is_none());

        let bare = ControlMessage::parse(&[0x02]).unwrap();
        assert_eq!(bare.subtype(), Some(ControlSubtype::Ok));
        assert!(bare.data.is_empty());
    }

    #[test]
    fn channel_data_is_little_endian() {
        assert_eq!(config_channel_data(11), [0x0B, 0x00]);
        assert_eq!(config_channel_data(0x0102), [0x02, 0x01]);
    }
}
