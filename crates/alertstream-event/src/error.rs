/// Errors that can occur while decoding one frame.
///
/// All of these are frame-local: the frame is dropped and the stream goes on.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame has no content once part headers are removed.
    #[error("frame has no body")]
    EmptyFrame,

    /// The frame is a MIME part with a non-event payload (e.g. a snapshot).
    #[error("unsupported part content type {0:?}")]
    UnsupportedContent(String),

    /// The markup could not be parsed (often a document cut by a reconnect).
    #[error("malformed markup: {0}")]
    MalformedMarkup(String),

    /// No classification field was found in the frame.
    #[error("no eventType field in frame")]
    MissingClassification,
}

pub type Result<T> = std::result::Result<T, DecodeError>;
