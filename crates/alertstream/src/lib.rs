//! ISAPI alert stream listener.
//!
//! Connects to an access-control device's alert stream, picks identity-match
//! events out of it and forwards them as attendance records.
//!
//! # Crate Structure
//!
//! - [`frame`]: incremental boundary/tag framing of the raw stream
//! - [`event`]: per-frame JSON/XML decoding into attendance records
//! - [`session`]: HTTP sessions, reconnect loop and webhook delivery (behind `session` feature)

/// Re-export frame types.
pub mod frame {
    pub use alertstream_frame::*;
}

/// Re-export event types.
pub mod event {
    pub use alertstream_event::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use alertstream_session::*;
}
