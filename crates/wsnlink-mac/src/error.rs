/// Errors that can occur while encoding or decoding MAC frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacError {
    /// A field extends past the end of the buffer.
    #[error("truncated frame (needed {needed} bytes, have {available})")]
    Truncated { needed: usize, available: usize },

    /// The security-enabled bit is set; auxiliary security headers are not supported.
    #[error("security headers are not supported")]
    SecurityUnsupported,

    /// Header and payload exceed the encoder budget.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, MacError>;

/// A textual frame field (type, address, flags...) could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {what} -- '{input}'")]
pub struct ParseError {
    pub what: &'static str,
    pub input: String,
}

impl ParseError {
    pub(crate) fn new(what: &'static str, input: &str) -> Self {
        Self {
            what,
            input: input.to_string(),
        }
    }
}
