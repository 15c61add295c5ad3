use std::borrow::Cow;

use tracing::trace;

use crate::error::{DecodeError, Result};
use crate::event::{DecodedEvent, FrameEncoding};
use crate::{markup, text};

/// Decode one frame into its classification and identity fields.
///
/// Pure function of `frame`. Multipart frames may start with part headers;
/// they are skipped before the body encoding is detected. Invalid UTF-8 is
/// replaced rather than rejected.
pub fn decode(frame: &[u8]) -> Result<DecodedEvent> {
    let text: Cow<'_, str> = String::from_utf8_lossy(frame);
    let (content_type, body) = split_part_headers(&text);

    if let Some(content_type) = content_type {
        if !is_event_content(content_type) {
            return Err(DecodeError::UnsupportedContent(content_type.to_string()));
        }
    }
    if body.trim().is_empty() {
        return Err(DecodeError::EmptyFrame);
    }

    let encoding = detect_encoding(body);
    trace!(encoding = %encoding, bytes = body.len(), "decoding frame body");

    match encoding {
        FrameEncoding::Markup => markup::decode(body),
        FrameEncoding::Text => text::decode(body),
    }
}

/// Markup if the body opens with `<`, text otherwise.
pub fn detect_encoding(body: &str) -> FrameEncoding {
    if body.trim_start().starts_with('<') {
        FrameEncoding::Markup
    } else {
        FrameEncoding::Text
    }
}

/// Split leading MIME part headers from the body.
///
/// Returns the `Content-Type` value if one was present. Frames without a
/// header block are returned whole.
fn split_part_headers(frame: &str) -> (Option<&str>, &str) {
    let trimmed = frame.trim_start();
    if !starts_with_header(trimmed) {
        return (None, trimmed);
    }

    let (headers, body) = match [find_sep(trimmed, "\r\n\r\n"), find_sep(trimmed, "\n\n")]
        .into_iter()
        .flatten()
        .min_by_key(|(pos, _)| *pos)
    {
        Some((pos, len)) => (&trimmed[..pos], &trimmed[pos + len..]),
        None => (trimmed, ""),
    };

    let content_type = headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-type")
            .then(|| value.trim())
    });

    (content_type, body)
}

fn find_sep(s: &str, sep: &'static str) -> Option<(usize, usize)> {
    s.find(sep).map(|pos| (pos, sep.len()))
}

fn starts_with_header(s: &str) -> bool {
    let line = s.lines().next().unwrap_or_default();
    match line.split_once(':') {
        Some((name, _)) => {
            !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        }
        None => false,
    }
}

fn is_event_content(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.is_empty()
        || essence.starts_with("text/")
        || essence.ends_with("/json")
        || essence.ends_with("/xml")
        || essence.ends_with("+json")
        || essence.ends_with("+xml")
}
