use std::fmt;
use std::time::Duration;

/// Boxed source error for transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure classes used in logs and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeout, refused or reset connection, closed stream.
    TransientNetwork,
    /// The device rejected the credentials.
    AuthFailure,
    /// A frame could not be decoded; the frame is dropped.
    MalformedFrame,
    /// The buffer hit its ceiling without a frame; the buffer is reset.
    BufferOverflow,
    /// The webhook did not accept a record; the record is dropped.
    SinkDeliveryFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::AuthFailure => "auth_failure",
            ErrorKind::MalformedFrame => "malformed_frame",
            ErrorKind::BufferOverflow => "buffer_overflow",
            ErrorKind::SinkDeliveryFailure => "sink_delivery_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a stream session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The HTTP request to the device failed before a response arrived.
    #[error("request to {url} failed: {source}")]
    Connect { url: String, source: BoxError },

    /// The device answered 401.
    #[error("device rejected credentials (HTTP 401)")]
    AuthFailure,

    /// The digest challenge could not be parsed or answered.
    #[error("digest challenge failed: {0}")]
    DigestChallenge(String),

    /// The device answered 404 for the alert stream path.
    #[error("alert stream endpoint not found (HTTP 404)")]
    EndpointNotFound,

    /// Any other non-success status.
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    /// No response or chunk arrived within the idle timeout.
    #[error("no data from device for {0:?}")]
    IdleTimeout(Duration),

    /// Reading the response body failed.
    #[error("alert stream read failed: {0}")]
    Read(#[source] BoxError),

    /// The device ended the response body.
    #[error("device closed the alert stream")]
    StreamClosed,

    /// The session configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Frame extractor setup failed.
    #[error("frame error: {0}")]
    Frame(#[from] alertstream_frame::FrameError),
}

impl SessionError {
    /// Failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::AuthFailure | SessionError::DigestChallenge(_) => ErrorKind::AuthFailure,
            _ => ErrorKind::TransientNetwork,
        }
    }
}

/// Errors on the delivery side. None of them reach the ingestion loop.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The webhook request failed to complete.
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The webhook answered with a non-2xx status.
    #[error("webhook returned HTTP {0}")]
    Status(u16),

    /// The delivery queue was full; the newest record was dropped.
    #[error("delivery queue full, record dropped")]
    QueueFull,

    /// The delivery worker has stopped.
    #[error("delivery queue closed")]
    QueueClosed,
}

impl NotifyError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::SinkDeliveryFailure
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
