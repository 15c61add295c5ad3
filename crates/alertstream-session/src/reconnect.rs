use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::SessionConfig;
use crate::dedup::{RecentEvents, DEFAULT_DEDUP_CAPACITY};
use crate::error::ErrorKind;
use crate::notifier::Notifier;
use crate::session::{SessionOutcome, StreamSession};
use crate::transport::AlertTransport;

/// Totals across every session the loop ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectSummary {
    pub sessions: u64,
    pub failures: u64,
    pub target_events: u64,
    pub duplicates: u64,
}

/// Runs stream sessions back to back until cancelled.
///
/// A failed session is followed by a backoff delay and a fresh session; there
/// is no retry limit. The delay schedule starts over after any session that
/// reached streaming. Duplicate suppression carries over from one session
/// to the next, so a replay after reconnecting is not forwarded twice.
pub struct ReconnectLoop<T> {
    transport: T,
    config: SessionConfig,
    notifier: Notifier,
}

impl<T: AlertTransport> ReconnectLoop<T> {
    pub fn new(transport: T, config: SessionConfig, notifier: Notifier) -> Self {
        Self {
            transport,
            config,
            notifier,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run until `cancel` fires.
    pub async fn run(&self, cancel: &CancellationToken) -> ReconnectSummary {
        let mut summary = ReconnectSummary::default();
        let mut attempt = 0u32;
        let mut recent = RecentEvents::new(self.config.dedup_window, DEFAULT_DEDUP_CAPACITY);

        while !cancel.is_cancelled() {
            summary.sessions += 1;
            let report = StreamSession::new(&self.transport, &self.config, &self.notifier)
                .with_recent_events(recent)
                .run(cancel)
                .await;
            summary.target_events += report.stats.target_events;
            summary.duplicates += report.stats.duplicates;
            recent = report.recent;

            let err = match report.outcome {
                SessionOutcome::Completed => break,
                SessionOutcome::Failed(err) => err,
            };
            summary.failures += 1;

            attempt = if report.streamed { 1 } else { attempt.saturating_add(1) };
            let delay = self.config.retry.delay_for_attempt(attempt);

            match err.kind() {
                ErrorKind::AuthFailure => error!(
                    kind = %err.kind(),
                    error = %err,
                    attempt,
                    retry_in = ?delay,
                    "device rejected credentials, retrying"
                ),
                kind => warn!(
                    kind = %kind,
                    error = %err,
                    attempt,
                    retry_in = ?delay,
                    "alert stream lost, reconnecting"
                ),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(
            sessions = summary.sessions,
            failures = summary.failures,
            target_events = summary.target_events,
            duplicates = summary.duplicates,
            "reconnect loop stopped"
        );
        summary
    }
}
