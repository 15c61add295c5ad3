/// Errors that can occur while configuring or driving the frame extractor.
///
/// Malformed stream content is never an error: unresolvable bytes are kept
/// or dropped according to the extractor's buffering rules.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The framing mode name is not one of `boundary`, `tag` or `auto`.
    #[error("unknown framing mode {0:?} (expected boundary, tag or auto)")]
    UnknownMode(String),

    /// A delimiter in the configuration is empty.
    #[error("empty {0} delimiter")]
    EmptyDelimiter(&'static str),

    /// The buffer ceiling is smaller than the delimiters it has to hold.
    #[error("buffer ceiling too small ({ceiling} bytes, min {min})")]
    CeilingTooSmall { ceiling: usize, min: usize },

    /// An I/O error occurred while reading a stream through the codec.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
