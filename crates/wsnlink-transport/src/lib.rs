//! Serial line transport for IEEE 802.15.4 transceivers.
//!
//! This is the lowest layer of wsnlink. It opens the tty the transceiver
//! firmware is attached to, optionally configures its speed, and exposes a
//! bounded readiness wait so upper layers never block without a deadline.
//!
//! Everything else builds on the [`SerialLine`] and [`WaitReadable`] types
//! provided here.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod serial;

pub use error::{Result, TransportError};
pub use traits::WaitReadable;

#[cfg(unix)]
pub use serial::{SerialConfig, SerialLine, SUPPORTED_BAUD_RATES};
