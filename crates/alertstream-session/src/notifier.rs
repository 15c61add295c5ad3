use std::future::Future;
use std::time::Duration;

use alertstream_event::AttendanceRecord;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::NotifierConfig;
use crate::error::{ErrorKind, NotifyError, SessionError};

/// Downstream destination for attendance records.
pub trait RecordSink: Send + Sync {
    fn deliver(
        &self,
        record: &AttendanceRecord,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Posts each record as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RecordSink for WebhookSink {
    async fn deliver(&self, record: &AttendanceRecord) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(record).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Logs records instead of delivering them. Used when no webhook is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl RecordSink for LogSink {
    async fn deliver(&self, record: &AttendanceRecord) -> Result<(), NotifyError> {
        info!(
            timestamp = %record.timestamp,
            name = %record.name,
            employee_no = %record.employee_no,
            "webhook URL not set, record not delivered"
        );
        Ok(())
    }
}

/// The sink a [`NotifierConfig`] asks for.
#[derive(Debug, Clone)]
pub enum ConfiguredSink {
    Webhook(WebhookSink),
    Log(LogSink),
}

impl ConfiguredSink {
    /// Webhook delivery when a non-empty URL is configured, logging otherwise.
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        match config.webhook_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(ConfiguredSink::Webhook(WebhookSink::new(
                url,
                config.request_timeout,
            )?)),
            _ => {
                warn!("webhook URL not set, records will only be logged");
                Ok(ConfiguredSink::Log(LogSink))
            }
        }
    }
}

impl RecordSink for ConfiguredSink {
    async fn deliver(&self, record: &AttendanceRecord) -> Result<(), NotifyError> {
        match self {
            ConfiguredSink::Webhook(sink) => sink.deliver(record).await,
            ConfiguredSink::Log(sink) => sink.deliver(record).await,
        }
    }
}

/// Producer handle for the delivery queue.
///
/// `notify` never waits: when the queue is full the record being offered is
/// dropped, so a slow webhook cannot stall stream ingestion.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<AttendanceRecord>,
}

impl Notifier {
    /// Create a notifier and the receiving end for [`run_delivery_worker`].
    /// A zero `capacity` is a configuration error.
    pub fn channel(
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<AttendanceRecord>), SessionError> {
        if capacity == 0 {
            return Err(SessionError::Config(
                "delivery queue capacity must be positive".into(),
            ));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok((Self { tx }, rx))
    }

    /// Enqueue `record` for delivery.
    pub fn notify(&self, record: AttendanceRecord) -> Result<(), NotifyError> {
        match self.tx.try_send(record) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(record)) => {
                warn!(
                    kind = %ErrorKind::SinkDeliveryFailure,
                    name = %record.name,
                    employee_no = %record.employee_no,
                    "delivery queue full, dropping record"
                );
                Err(NotifyError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(NotifyError::QueueClosed),
        }
    }
}

/// Delivery worker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Deliver queued records to `sink` one at a time until the queue closes or
/// `cancel` fires. Records already queued are delivered before a
/// cancellation is honored.
pub async fn run_delivery_worker<S: RecordSink>(
    mut rx: mpsc::Receiver<AttendanceRecord>,
    sink: S,
    cancel: CancellationToken,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();

    loop {
        let record = tokio::select! {
            biased;
            record = rx.recv() => match record {
                Some(record) => record,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        match sink.deliver(&record).await {
            Ok(()) => {
                stats.delivered += 1;
                debug!(name = %record.name, employee_no = %record.employee_no, "record delivered");
            }
            Err(err) => {
                stats.failed += 1;
                warn!(
                    kind = %err.kind(),
                    error = %err,
                    name = %record.name,
                    "record delivery failed, dropping"
                );
            }
        }
    }

    debug!(delivered = stats.delivered, failed = stats.failed, "delivery worker stopped");
    stats
}
