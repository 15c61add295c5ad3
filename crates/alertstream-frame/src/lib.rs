//! Incremental framing for ISAPI alert streams.
//!
//! An alert stream is an open-ended HTTP body with no length prefixes. Frames
//! are recovered in one of two ways:
//! - Boundary mode: MIME-multipart sections split on a literal marker
//! - Tag mode: concatenated `<EventNotificationAlert>` documents
//!
//! The extractor buffers across chunk boundaries and never holds more than
//! a configured ceiling of unresolved bytes.

pub mod codec;
pub mod error;
pub mod extractor;
pub mod mode;

pub use codec::{
    sniff_mode, split_documents, split_sections, Frame, FrameConfig, ALERT_END_TAG,
    ALERT_START_TAG, DEFAULT_BOUNDARY, DEFAULT_BUFFER_CEILING,
};
pub use error::{FrameError, Result};
pub use extractor::{ExtractorStats, FrameExtractor};
pub use mode::FramingMode;
