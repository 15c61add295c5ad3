use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric `eventType` of a face-match event in JSON alert streams.
pub const TEXT_TARGET_EVENT_TYPE: &str = "38";

/// `eventType` values of access-control events in markup alerts.
pub const MARKUP_TARGET_EVENT_TYPES: [&str; 2] = ["AccessControlEvent", "AccessControllerEvent"];

/// Minor event code of an access-control identity match.
pub const MARKUP_TARGET_MINOR_EVENT: &str = "75";

/// Record name used when the frame carries no `name`.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Record id used when the frame carries no employee number.
pub const UNKNOWN_EMPLOYEE_NO: &str = "N/A";

/// Status sent with every attendance record.
pub const STATUS_PRESENT: &str = "Present";

/// `strftime` format of [`AttendanceRecord::timestamp`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Serialization detected for a frame body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameEncoding {
    /// JSON or JSON-like key/value text.
    Text,
    /// XML markup.
    Markup,
}

impl fmt::Display for FrameEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameEncoding::Text => f.write_str("text"),
            FrameEncoding::Markup => f.write_str("markup"),
        }
    }
}

/// Returns true if an `eventType`/minor code pair is an access-control identity match.
pub fn is_target_pair(event_type: &str, minor: Option<&str>) -> bool {
    MARKUP_TARGET_EVENT_TYPES.contains(&event_type) && minor == Some(MARKUP_TARGET_MINOR_EVENT)
}

/// Classification and, for target events, identity fields of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub encoding: FrameEncoding,
    pub classification_code: String,
    pub is_target_event: bool,
    pub identity_name: Option<String>,
    pub identity_id: Option<String>,
    /// Device-assigned event sequence number, when the frame carries one.
    pub serial_no: Option<String>,
}

impl DecodedEvent {
    pub(crate) fn rejected(encoding: FrameEncoding, classification_code: impl Into<String>) -> Self {
        Self {
            encoding,
            classification_code: classification_code.into(),
            is_target_event: false,
            identity_name: None,
            identity_id: None,
            serial_no: None,
        }
    }

    pub(crate) fn matched(
        encoding: FrameEncoding,
        classification_code: impl Into<String>,
        identity_name: Option<String>,
        identity_id: Option<String>,
    ) -> Self {
        Self {
            encoding,
            classification_code: classification_code.into(),
            is_target_event: true,
            identity_name,
            identity_id,
            serial_no: None,
        }
    }

    pub(crate) fn with_serial_no(mut self, serial_no: Option<String>) -> Self {
        self.serial_no = serial_no;
        self
    }

    /// Project a target event into an attendance record stamped with the
    /// current local time. Non-target events yield `None`.
    pub fn into_record(self) -> Option<AttendanceRecord> {
        self.into_record_at(now_timestamp())
    }

    /// Like [`DecodedEvent::into_record`] with an explicit timestamp.
    pub fn into_record_at(self, timestamp: impl Into<String>) -> Option<AttendanceRecord> {
        if !self.is_target_event {
            return None;
        }
        Some(AttendanceRecord {
            timestamp: timestamp.into(),
            name: self
                .identity_name
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            employee_no: self
                .identity_id
                .unwrap_or_else(|| UNKNOWN_EMPLOYEE_NO.to_string()),
            status: STATUS_PRESENT.to_string(),
        })
    }
}

/// Local wall-clock time in the format the attendance sheet expects.
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// The payload posted to the attendance webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub timestamp: String,
    pub name: String,
    pub employee_no: String,
    pub status: String,
}
