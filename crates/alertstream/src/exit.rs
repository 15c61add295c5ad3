use std::fmt;
use std::io;

use alertstream_frame::FrameError;
use alertstream_session::{NotifyError, SessionError};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        other => CliError::new(USAGE, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Config(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::AuthFailure | SessionError::DigestChallenge(_) => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        SessionError::IdleTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn notify_error(context: &str, err: NotifyError) -> CliError {
    match err {
        NotifyError::Request(_) | NotifyError::Status(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn session_errors_map_to_distinct_codes() {
        assert_eq!(
            session_error("x", SessionError::Config("bad".into())).code,
            USAGE
        );
        assert_eq!(
            session_error("x", SessionError::AuthFailure).code,
            PERMISSION_DENIED
        );
        assert_eq!(
            session_error("x", SessionError::IdleTimeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        assert_eq!(
            session_error("x", SessionError::EndpointNotFound).code,
            TRANSPORT_ERROR
        );
    }

    #[test]
    fn frame_config_errors_are_usage_errors() {
        let err = frame_error("setup", FrameError::EmptyDelimiter("boundary"));
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("setup: "));
    }

    #[test]
    fn missing_file_is_a_plain_failure() {
        let err = io_error("open", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.code, FAILURE);
    }
}
