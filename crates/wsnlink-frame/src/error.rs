/// Errors that can occur during message encoding, sending and reassembly.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit the 7-bit length of the information byte.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing messages.
    #[error("message I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The descriptor accepted zero bytes while a message was being written.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
