//! Alert stream sessions against an ISAPI device.
//!
//! A [`StreamSession`] opens the device's alert stream, cuts the body into
//! frames, decodes them and hands identity matches to a [`Notifier`]. The
//! [`ReconnectLoop`] keeps sessions running with backoff until cancelled, and
//! [`run_delivery_worker`] drains the notifier's queue into a [`RecordSink`].

pub mod config;
pub mod dedup;
pub mod error;
pub mod notifier;
pub mod reconnect;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    DeviceConfig, NotifierConfig, RetryPolicy, SessionConfig, ALERT_STREAM_PATH,
    DEFAULT_DEDUP_WINDOW, DEFAULT_IDLE_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_WEBHOOK_TIMEOUT,
};
pub use dedup::{EventKey, RecentEvents, DEFAULT_DEDUP_CAPACITY};
pub use error::{BoxError, ErrorKind, NotifyError, Result, SessionError};
pub use notifier::{
    run_delivery_worker, ConfiguredSink, DeliveryStats, LogSink, Notifier, RecordSink, WebhookSink,
};
pub use reconnect::{ReconnectLoop, ReconnectSummary};
pub use session::{SessionOutcome, SessionReport, SessionState, SessionStats, StreamSession};
pub use transport::{check_status, AlertTransport, ChunkStream, HttpTransport};
