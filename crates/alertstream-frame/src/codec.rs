use bytes::{Buf, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::mode::FramingMode;

/// MIME-multipart separator used by ISAPI alert streams.
pub const DEFAULT_BOUNDARY: &str = "--MIME_boundary";

/// Opening tag of one alert document. Left unterminated so `xmlns`
/// attributes still match.
pub const ALERT_START_TAG: &str = "<EventNotificationAlert";

/// Closing tag of one alert document.
pub const ALERT_END_TAG: &str = "</EventNotificationAlert>";

/// Default buffer ceiling: 50 KB.
pub const DEFAULT_BUFFER_CEILING: usize = 50_000;

/// One complete event unit cut out of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The strategy that delimited this frame (never `Auto`).
    pub mode: FramingMode,
    /// The frame bytes. Boundary frames exclude the marker; tag frames
    /// include both tags.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(mode: FramingMode, payload: impl Into<Bytes>) -> Self {
        Self {
            mode,
            payload: payload.into(),
        }
    }

    /// Frame payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Configuration for the frame extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Framing strategy. Default: `Auto`.
    pub mode: FramingMode,
    /// Boundary marker for `Boundary` mode.
    pub boundary: String,
    /// Start tag for `Tag` mode.
    pub start_tag: String,
    /// End tag for `Tag` mode.
    pub end_tag: String,
    /// Maximum bytes retained without a resolvable frame. Default: 50 KB.
    pub buffer_ceiling: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            mode: FramingMode::Auto,
            boundary: DEFAULT_BOUNDARY.to_string(),
            start_tag: ALERT_START_TAG.to_string(),
            end_tag: ALERT_END_TAG.to_string(),
            buffer_ceiling: DEFAULT_BUFFER_CEILING,
        }
    }
}

impl FrameConfig {
    /// Default configuration with an explicit mode.
    pub fn with_mode(mode: FramingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Check delimiters and ceiling before an extractor is built.
    pub fn validate(&self) -> Result<()> {
        if self.boundary.is_empty() {
            return Err(FrameError::EmptyDelimiter("boundary"));
        }
        if self.start_tag.is_empty() {
            return Err(FrameError::EmptyDelimiter("start tag"));
        }
        if self.end_tag.is_empty() {
            return Err(FrameError::EmptyDelimiter("end tag"));
        }

        let min = self
            .boundary
            .len()
            .max(self.start_tag.len() + self.end_tag.len());
        if self.buffer_ceiling < min {
            return Err(FrameError::CeilingTooSmall {
                ceiling: self.buffer_ceiling,
                min,
            });
        }
        Ok(())
    }
}

/// Split complete boundary-delimited sections off the front of `src`.
///
/// Every section followed by a boundary is complete; the trailing section
/// stays in `src`. Whitespace-only sections are dropped. Returns the number
/// of frames pushed to `out`.
pub fn split_sections(src: &mut BytesMut, boundary: &[u8], out: &mut Vec<Frame>) -> usize {
    let before = out.len();

    while let Some(pos) = find(src, boundary) {
        let section = src.split_to(pos).freeze();
        src.advance(boundary.len());

        if !is_blank(&section) {
            out.push(Frame::new(FramingMode::Boundary, section));
        }
    }

    out.len() - before
}

/// Split complete start/end tag documents off the front of `src`.
///
/// Bytes before a start tag are discarded. If a document is still open, `src`
/// keeps everything from its start tag; with no start tag at all, only a
/// trailing partial start tag is kept. Returns the number of frames pushed.
pub fn split_documents(
    src: &mut BytesMut,
    start_tag: &[u8],
    end_tag: &[u8],
    out: &mut Vec<Frame>,
) -> usize {
    let before = out.len();

    loop {
        let Some(start) = find(src, start_tag) else {
            let keep = partial_suffix_len(src, start_tag);
            src.advance(src.len() - keep);
            break;
        };

        let body = start + start_tag.len();
        let Some(rel_end) = find(&src[body..], end_tag) else {
            src.advance(start);
            break;
        };
        let end = body + rel_end + end_tag.len();

        // A second start tag before the end tag means the first document was cut short.
        let start = rfind(&src[body..body + rel_end], start_tag).map_or(start, |p| body + p);

        src.advance(start);
        let document = src.split_to(end - start).freeze();
        out.push(Frame::new(FramingMode::Tag, document));
    }

    out.len() - before
}

/// Decide between boundary and tag framing from the buffered bytes.
///
/// Returns `None` until one of the markers has been seen in full.
pub fn sniff_mode(src: &[u8], boundary: &[u8], start_tag: &[u8]) -> Option<FramingMode> {
    match (find(src, boundary), find(src, start_tag)) {
        (Some(b), Some(t)) if t < b => Some(FramingMode::Tag),
        (Some(_), _) => Some(FramingMode::Boundary),
        (None, Some(_)) => Some(FramingMode::Tag),
        (None, None) => None,
    }
}

pub(crate) fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Length of the longest suffix of `src` that is a proper prefix of `tag`.
fn partial_suffix_len(src: &[u8], tag: &[u8]) -> usize {
    let max = tag.len().saturating_sub(1).min(src.len());
    (1..=max)
        .rev()
        .find(|&k| src[src.len() - k..] == tag[..k])
        .unwrap_or(0)
}
