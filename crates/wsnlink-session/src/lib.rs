//! Transceiver sessions.
//!
//! A session owns the serial line, waits for the firmware's ready byte,
//! sends the control messages queued while parsing arguments, then runs the
//! reassembly loop and dispatches messages to a handler.

pub mod control;
pub mod error;
pub mod handshake;
pub mod session;

pub use control::{preparse_control, ControlQueue, QueuedControlMessage};
pub use error::{Result, SessionError};
pub use handshake::{wait_ready, HandshakeConfig, READY_BYTE};
pub use session::{MessageHandler, Session, SessionConfig};
