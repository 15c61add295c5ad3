//! Decoding of ISAPI alert frames.
//!
//! A frame body is either JSON-like text or XML markup; the encoding is
//! detected per frame. Only identity-match events carry identity fields
//! forward, and only those become [`AttendanceRecord`]s.

pub mod decoder;
pub mod error;
pub mod event;
pub mod markup;
pub mod text;

pub use decoder::{decode, detect_encoding};
pub use error::{DecodeError, Result};
pub use event::{
    is_target_pair, now_timestamp, AttendanceRecord, DecodedEvent, FrameEncoding,
    MARKUP_TARGET_EVENT_TYPES, MARKUP_TARGET_MINOR_EVENT, STATUS_PRESENT, TEXT_TARGET_EVENT_TYPE,
    TIMESTAMP_FORMAT, UNKNOWN_EMPLOYEE_NO, UNKNOWN_NAME,
};
pub use markup::{parse_tree, Element};
