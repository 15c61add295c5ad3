//! JSON and JSON-like alert bodies.
//!
//! Well-formed JSON is parsed and searched key by key. Anything else (a part
//! cut short, or text with stray bytes around the object) falls back to a
//! pattern search, with identity fields looked up only within a fixed window
//! after the classification marker so a neighbouring event cannot leak in.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{DecodeError, Result};
use crate::event::{is_target_pair, DecodedEvent, FrameEncoding, TEXT_TARGET_EVENT_TYPE};

/// Bytes after the `eventType` marker searched for identity fields.
pub const IDENTITY_SEARCH_WINDOW: usize = 1000;

static EVENT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""eventType"\s*:\s*"?(\d+)"?"#).expect("invalid eventType pattern")
});

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""name"\s*:\s*"([^"]+)""#).expect("invalid name pattern"));

static EMPLOYEE_NO_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""employeeNoString"\s*:\s*"([^"]+)""#).expect("invalid employeeNoString pattern")
});

static SERIAL_NO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""serialNo"\s*:\s*"?(\d+)"?"#).expect("invalid serialNo pattern"));

static EMPLOYEE_NO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""employeeNo"\s*:\s*"?([^",}\s]+)"?"#).expect("invalid employeeNo pattern")
});

/// Decode a text body, preferring a real JSON parse.
pub(crate) fn decode(body: &str) -> Result<DecodedEvent> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return decode_value(&value);
        }
    }
    decode_windowed(body)
}

fn decode_value(root: &Value) -> Result<DecodedEvent> {
    let event_type = find_key(root, "eventType").ok_or(DecodeError::MissingClassification)?;

    let code = match event_type {
        Value::Number(n) => n.to_string(),
        Value::String(s) if is_numeric(s) => s.clone(),
        // Newer firmware names the event and carries the codes alongside it.
        Value::String(s) => {
            let minor = find_scalar(root, "subEventType").or_else(|| find_scalar(root, "minorEventType"));
            if !is_target_pair(s, minor.as_deref()) {
                let code = match minor {
                    Some(minor) => format!("{s}/{minor}"),
                    None => s.clone(),
                };
                return Ok(DecodedEvent::rejected(FrameEncoding::Text, code));
            }
            let code = format!("{s}/{}", minor.unwrap_or_default());
            return Ok(identity_from_value(root, code));
        }
        _ => return Err(DecodeError::MissingClassification),
    };

    if code != TEXT_TARGET_EVENT_TYPE {
        return Ok(DecodedEvent::rejected(FrameEncoding::Text, code));
    }
    Ok(identity_from_value(root, code))
}

fn identity_from_value(root: &Value, code: String) -> DecodedEvent {
    let name = find_scalar(root, "name");
    let id = find_scalar(root, "employeeNoString").or_else(|| find_scalar(root, "employeeNo"));
    DecodedEvent::matched(FrameEncoding::Text, code, name, id)
        .with_serial_no(find_scalar(root, "serialNo"))
}

fn decode_windowed(body: &str) -> Result<DecodedEvent> {
    let mut first_code = None;
    for captures in EVENT_TYPE.captures_iter(body) {
        let Some(code) = captures.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if code != TEXT_TARGET_EVENT_TYPE {
            first_code.get_or_insert(code);
            continue;
        }

        let start = captures.get(0).map_or(0, |m| m.start());
        let window = window_after(body, start, IDENTITY_SEARCH_WINDOW);

        let name = first_capture(&NAME, window);
        let id = first_capture(&EMPLOYEE_NO_STRING, window)
            .or_else(|| first_capture(&EMPLOYEE_NO, window));

        let serial = first_capture(&SERIAL_NO, window);

        return Ok(DecodedEvent::matched(FrameEncoding::Text, code, name, id).with_serial_no(serial));
    }

    // No identity match anywhere in the part; report the first event seen.
    let code = first_code.ok_or(DecodeError::MissingClassification)?;
    Ok(DecodedEvent::rejected(FrameEncoding::Text, code))
}

/// `len` bytes of `body` from `start`, shortened to a char boundary.
fn window_after(body: &str, start: usize, len: usize) -> &str {
    let mut end = start.saturating_add(len).min(body.len());
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[start..end]
}

fn first_capture(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First value stored under `key`, depth-first in document order.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.iter().find_map(|(k, v)| {
            if k == key {
                Some(v)
            } else {
                find_key(v, key)
            }
        }),
        Value::Array(items) => items.iter().find_map(|item| find_key(item, key)),
        _ => None,
    }
}

fn find_scalar(value: &Value, key: &str) -> Option<String> {
    match find_key(value, key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
