use std::fmt;
use std::time::Duration;

use alertstream_frame::FrameConfig;

use crate::error::{Result, SessionError};

/// ISAPI path of the event notification stream.
pub const ALERT_STREAM_PATH: &str = "/ISAPI/Event/notification/alertStream";

/// Default idle timeout for the connect and every chunk read.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default webhook request timeout.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delivery queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default window in which a repeated identity event is suppressed.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(10);

/// Device address and credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Sent only as a digest response; never logged.
    pub password: String,
}

impl DeviceConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Full URL of the alert stream endpoint.
    pub fn alert_stream_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, ALERT_STREAM_PATH)
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .finish()
    }
}

/// Delay schedule between sessions.
///
/// The delay doubles after each consecutive failure up to `max_delay`, and
/// starts over once a session gets as far as streaming.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Same delay after every failure.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

/// Everything one stream session needs, fixed at startup.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub device: DeviceConfig,
    pub idle_timeout: Duration,
    pub frame: FrameConfig,
    pub retry: RetryPolicy,
    /// Zero disables duplicate suppression.
    pub dedup_window: Duration,
}

impl SessionConfig {
    pub fn new(device: DeviceConfig) -> Self {
        Self {
            device,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            frame: FrameConfig::default(),
            retry: RetryPolicy::default(),
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dedup_window(mut self, dedup_window: Duration) -> Self {
        self.dedup_window = dedup_window;
        self
    }

    /// Reject configurations the session loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.device.host.trim().is_empty() {
            return Err(SessionError::Config("device host is empty".into()));
        }
        if self.idle_timeout.is_zero() {
            return Err(SessionError::Config("idle timeout must be positive".into()));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(SessionError::Config(
                "initial retry delay exceeds maximum retry delay".into(),
            ));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(SessionError::Config("retry multiplier must be >= 1".into()));
        }
        self.frame.validate()?;
        Ok(())
    }
}

/// Webhook delivery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Target URL. `None` disables delivery; records are only logged.
    pub webhook_url: Option<String>,
    pub request_timeout: Duration,
    pub queue_capacity: usize,
}

impl NotifierConfig {
    /// Reject settings the delivery side cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(SessionError::Config(
                "delivery queue capacity must be positive".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(SessionError::Config(
                "webhook request timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            request_timeout: DEFAULT_WEBHOOK_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceConfig {
        DeviceConfig::new("192.168.1.17", 80, "admin", "s3cret")
    }

    #[test]
    fn builds_alert_stream_url() {
        assert_eq!(
            device().alert_stream_url(),
            "http://192.168.1.17:80/ISAPI/Event/notification/alertStream"
        );
    }

    #[test]
    fn debug_output_redacts_password() {
        let out = format!("{:?}", device());
        assert!(!out.contains("s3cret"));
        assert!(out.contains("<redacted:6 bytes>"));
    }

    #[test]
    fn exponential_backoff_caps_at_max() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn fixed_policy_never_grows() {
        let policy = RetryPolicy::fixed(Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(9), Duration::from_secs(5));
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        assert!(SessionConfig::new(device()).validate().is_ok());

        let cfg = SessionConfig::new(DeviceConfig::new(" ", 80, "u", "p"));
        assert!(matches!(cfg.validate(), Err(SessionError::Config(_))));

        let cfg = SessionConfig::new(device()).with_idle_timeout(Duration::ZERO);
        assert!(matches!(cfg.validate(), Err(SessionError::Config(_))));

        let cfg = SessionConfig::new(device()).with_retry(RetryPolicy {
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        });
        assert!(matches!(cfg.validate(), Err(SessionError::Config(_))));

        let cfg = SessionConfig::new(device()).with_frame_config(FrameConfig {
            buffer_ceiling: 1,
            ..FrameConfig::default()
        });
        assert!(matches!(cfg.validate(), Err(SessionError::Frame(_))));
    }

    #[test]
    fn notifier_validation_rejects_zero_capacity() {
        assert!(NotifierConfig::default().validate().is_ok());

        let cfg = NotifierConfig {
            queue_capacity: 0,
            ..NotifierConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SessionError::Config(_))));
    }
}
