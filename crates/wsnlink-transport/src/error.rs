use std::path::PathBuf;

/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the specified device.
    #[error("cannot open serial port {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The opened path is not a terminal device.
    #[error("invalid serial port {path}: not a tty")]
    NotATty { path: PathBuf },

    /// The requested speed has no termios equivalent.
    #[error("unrecognized speed {0}")]
    UnsupportedBaud(u32),

    /// Failed to apply line settings.
    #[error("cannot set tty attributes on {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the serial line.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
