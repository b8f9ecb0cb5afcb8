use std::time::Duration;

/// Errors that can occur during a transceiver session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] wsnlink_transport::TransportError),

    /// Message-level error.
    #[error("message error: {0}")]
    Frame(#[from] wsnlink_frame::FrameError),

    /// The firmware did not send its ready byte in time.
    #[error("transceiver not ready after {0:?}")]
    ReadyTimeout(Duration),

    /// The first byte received was not the ready byte.
    #[error("invalid ready byte 0x{0:02x}")]
    InvalidReadyByte(u8),

    /// The line was closed by the other side.
    #[error("transceiver disconnected: {0}")]
    Disconnected(String),

    /// The firmware rejected a request from the host.
    #[error("error from the client")]
    ClientError,

    /// The firmware failed while processing a request.
    #[error("error from the transceiver")]
    ServerError,

    /// A message arrived with no payload.
    #[error("empty message")]
    EmptyMessage,

    /// A message arrived that the current operation has no use for.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Writing a pre-parsed message to its output failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
