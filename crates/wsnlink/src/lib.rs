//! Host toolkit for IEEE 802.15.4 transceivers on a serial line.
//!
//! wsnlink talks to a small firmware that forwards radio frames over a
//! UART. Every exchange is a message made of an information byte and up to
//! 127 payload bytes; frame messages carry raw MAC frames, control messages
//! carry configuration and diagnostics.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial line open, speed setup, bounded readiness wait
//! - [`frame`]: message codec, reassembly loop, control subtypes
//! - [`mac`]: IEEE 802.15.4 MAC frame codec, display and text parsing
//! - [`session`]: ready handshake, control queue, message dispatch

/// Re-export transport types.
pub mod transport {
    pub use wsnlink_transport::*;
}

/// Re-export message framing types.
pub mod frame {
    pub use wsnlink_frame::*;
}

/// Re-export MAC codec types.
pub mod mac {
    pub use wsnlink_mac::*;
}

/// Re-export session types.
pub mod session {
    pub use wsnlink_session::*;
}
