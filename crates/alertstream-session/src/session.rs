use std::fmt;

use alertstream_event::{decode, DecodeError};
use alertstream_frame::{Frame, FrameExtractor};
use futures_util::StreamExt;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::dedup::{EventKey, RecentEvents, DEFAULT_DEDUP_CAPACITY};
use crate::error::{ErrorKind, SessionError};
use crate::notifier::Notifier;
use crate::transport::{AlertTransport, ChunkStream};

/// Lifecycle of a single stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
        })
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Cancelled from outside.
    Completed,
    /// The connection failed or ended; the caller decides whether to retry.
    Failed(SessionError),
}

/// Per-session counters, logged when the session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub chunks: u64,
    pub bytes: u64,
    pub frames: u64,
    pub target_events: u64,
    pub decode_failures: u64,
    pub skipped_parts: u64,
    pub duplicates: u64,
    pub dropped_records: u64,
    pub overflow_resets: u64,
    pub discarded_bytes: u64,
}

/// Everything known about a session after it ended.
#[derive(Debug)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub stats: SessionStats,
    /// True if the session got as far as `Streaming`.
    pub streamed: bool,
    /// Recently forwarded events, for the next session to continue with.
    pub recent: RecentEvents,
}

/// One connection attempt and the stream that follows it.
///
/// Owns its frame buffer: partial frames never carry over into the next
/// session.
pub struct StreamSession<'a, T> {
    transport: &'a T,
    config: &'a SessionConfig,
    notifier: &'a Notifier,
    state: SessionState,
    stats: SessionStats,
    recent: RecentEvents,
}

impl<'a, T: AlertTransport> StreamSession<'a, T> {
    pub fn new(transport: &'a T, config: &'a SessionConfig, notifier: &'a Notifier) -> Self {
        Self {
            transport,
            config,
            notifier,
            state: SessionState::Connecting,
            stats: SessionStats::default(),
            recent: RecentEvents::new(config.dedup_window, DEFAULT_DEDUP_CAPACITY),
        }
    }

    /// Continue duplicate suppression from an earlier session.
    pub fn with_recent_events(mut self, recent: RecentEvents) -> Self {
        self.recent = recent;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run until cancelled or the connection fails.
    pub async fn run(mut self, cancel: &CancellationToken) -> SessionReport {
        let outcome = self.drive(cancel).await;
        let streamed = self.state == SessionState::Streaming;
        self.transition(SessionState::Closing);

        let stats = self.stats;
        match &outcome {
            SessionOutcome::Completed => info!(
                chunks = stats.chunks,
                frames = stats.frames,
                target_events = stats.target_events,
                duplicates = stats.duplicates,
                dropped_records = stats.dropped_records,
                "session cancelled"
            ),
            SessionOutcome::Failed(err) => info!(
                kind = %err.kind(),
                error = %err,
                chunks = stats.chunks,
                bytes = stats.bytes,
                frames = stats.frames,
                target_events = stats.target_events,
                decode_failures = stats.decode_failures,
                skipped_parts = stats.skipped_parts,
                duplicates = stats.duplicates,
                dropped_records = stats.dropped_records,
                overflow_resets = stats.overflow_resets,
                discarded_bytes = stats.discarded_bytes,
                "session ended"
            ),
        }

        SessionReport {
            outcome,
            stats,
            streamed,
            recent: self.recent,
        }
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> SessionOutcome {
        let mut extractor = match FrameExtractor::new(self.config.frame.clone()) {
            Ok(extractor) => extractor,
            Err(err) => return SessionOutcome::Failed(err.into()),
        };
        let idle = self.config.idle_timeout;

        debug!(idle_timeout = ?idle, "connecting to alert stream");
        let mut stream: ChunkStream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionOutcome::Completed,
            opened = timeout(idle, self.transport.open()) => match opened {
                Ok(Ok(stream)) => stream,
                Ok(Err(err)) => return SessionOutcome::Failed(err),
                Err(_) => return SessionOutcome::Failed(SessionError::IdleTimeout(idle)),
            },
        };
        self.transition(SessionState::Streaming);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionOutcome::Completed,
                next = timeout(idle, stream.next()) => next,
            };

            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(err))) => return SessionOutcome::Failed(err),
                Ok(None) => {
                    let dropped = extractor.finish();
                    if dropped > 0 {
                        debug!(bytes = dropped, "device closed mid-frame, discarding partial frame");
                    }
                    self.stats.discarded_bytes = extractor.stats().discarded_bytes;
                    return SessionOutcome::Failed(SessionError::StreamClosed);
                }
                Err(_) => return SessionOutcome::Failed(SessionError::IdleTimeout(idle)),
            };

            self.stats.chunks += 1;
            self.stats.bytes += chunk.len() as u64;
            trace!(bytes = chunk.len(), "chunk received");

            for frame in extractor.feed(&chunk) {
                self.handle_frame(&frame);
            }
            self.stats.overflow_resets = extractor.stats().overflow_resets;
            self.stats.discarded_bytes = extractor.stats().discarded_bytes;
        }
    }

    fn handle_frame(&mut self, frame: &Frame) {
        self.stats.frames += 1;

        let event = match decode(&frame.payload) {
            Ok(event) => event,
            Err(err @ (DecodeError::UnsupportedContent(_) | DecodeError::EmptyFrame)) => {
                self.stats.skipped_parts += 1;
                trace!(reason = %err, bytes = frame.len(), "skipping frame");
                return;
            }
            Err(err) => {
                self.stats.decode_failures += 1;
                warn!(
                    kind = %ErrorKind::MalformedFrame,
                    error = %err,
                    bytes = frame.len(),
                    "dropping undecodable frame"
                );
                return;
            }
        };

        let code = event.classification_code.clone();
        let key = EventKey::of(&event);
        let Some(record) = event.into_record() else {
            trace!(code = %code, "ignoring event");
            return;
        };

        if !self.recent.observe(key, Instant::now()) {
            self.stats.duplicates += 1;
            debug!(
                name = %record.name,
                employee_no = %record.employee_no,
                "suppressing repeated event"
            );
            return;
        }

        self.stats.target_events += 1;
        info!(
            code = %code,
            name = %record.name,
            employee_no = %record.employee_no,
            "identity match"
        );
        if self.notifier.notify(record).is_err() {
            self.stats.dropped_records += 1;
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "session state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alertstream_event::AttendanceRecord;
    use alertstream_frame::{FrameConfig, FramingMode};
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::DeviceConfig;
    use crate::testing::{End, Script, ScriptedTransport, Step};

    fn config(mode: FramingMode) -> SessionConfig {
        SessionConfig::new(DeviceConfig::new("127.0.0.1", 80, "admin", "pw"))
            .with_idle_timeout(Duration::from_secs(60))
            .with_frame_config(FrameConfig::with_mode(mode))
    }

    fn drain(rx: &mut mpsc::Receiver<AttendanceRecord>) -> Vec<AttendanceRecord> {
        let mut records = Vec::new();
        while let Ok(record) = rx.try_recv() {
            records.push(record);
        }
        records
    }

    async fn run_script(
        steps: Vec<Step>,
        end: End,
        config: &SessionConfig,
    ) -> (SessionReport, Vec<AttendanceRecord>) {
        let transport = ScriptedTransport::new(vec![Script::stream(steps, end)]);
        let (notifier, mut rx) = Notifier::channel(16).unwrap();
        let report = StreamSession::new(&transport, config, &notifier)
            .run(&CancellationToken::new())
            .await;
        (report, drain(&mut rx))
    }

    #[tokio::test]
    async fn json_frame_split_across_chunks_yields_one_record() {
        let steps = vec![
            Step::chunk("--MIME_boundary\r\nContent-Type: application/json\r\n\r\n{\"eventType\": 38, \"name\": \"Jane"),
            Step::chunk(" Doe\", \"employeeNoString\": \"E123\"}\r\n--MIME_boundary\r\n"),
        ];
        let (report, records) = run_script(steps, End::Eof, &config(FramingMode::Auto)).await;

        assert!(matches!(
            report.outcome,
            SessionOutcome::Failed(SessionError::StreamClosed)
        ));
        assert!(report.streamed);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Jane Doe");
        assert_eq!(records[0].employee_no, "E123");
        assert_eq!(records[0].status, "Present");
        assert_eq!(report.stats.chunks, 2);
        assert_eq!(report.stats.target_events, 1);
    }

    #[tokio::test]
    async fn xml_documents_are_decoded_in_tag_mode() {
        let doc = "<EventNotificationAlert version=\"2.0\"><eventType>AccessControllerEvent</eventType><AccessControllerEvent><subEventType>75</subEventType><name>John</name><employeeNoString>7</employeeNoString></AccessControllerEvent></EventNotificationAlert>";
        let (head, tail) = doc.split_at(40);
        let steps = vec![Step::chunk(head), Step::chunk(tail)];
        let (_, records) = run_script(steps, End::Eof, &config(FramingMode::Tag)).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "John");
        assert_eq!(records[0].employee_no, "7");
    }

    #[tokio::test]
    async fn other_minor_code_produces_no_record() {
        let doc = "<EventNotificationAlert><eventType>AccessControlEvent</eventType><minorEventType>76</minorEventType><name>John</name></EventNotificationAlert>";
        let (report, records) =
            run_script(vec![Step::chunk(doc)], End::Eof, &config(FramingMode::Tag)).await;

        assert!(records.is_empty());
        assert_eq!(report.stats.frames, 1);
        assert_eq!(report.stats.target_events, 0);
    }

    #[tokio::test]
    async fn malformed_frame_does_not_end_the_session() {
        let steps = vec![Step::chunk(
            "--MIME_boundary\r\n<EventNotificationAlert><eventType>AccessControlEvent\r\n--MIME_boundary\r\n{\"eventType\": 38, \"name\": \"Ana\"}\r\n--MIME_boundary\r\n",
        )];
        let (report, records) = run_script(steps, End::Eof, &config(FramingMode::Boundary)).await;

        assert_eq!(report.stats.decode_failures, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Ana");
        assert_eq!(records[0].employee_no, "N/A");
    }

    #[tokio::test]
    async fn unterminated_part_is_discarded_when_device_closes() {
        let chunk = "--MIME_boundary\r\nContent-Type: application/json\r\n\r\n{\"eventType\": 38, \"name\": \"Jane Do";
        for mode in [FramingMode::Boundary, FramingMode::Auto] {
            let (report, records) =
                run_script(vec![Step::chunk(chunk)], End::Eof, &config(mode)).await;

            assert!(matches!(
                report.outcome,
                SessionOutcome::Failed(SessionError::StreamClosed)
            ));
            assert!(records.is_empty(), "{mode}: {records:?}");
            assert_eq!(report.stats.frames, 0);
            assert_eq!(report.stats.target_events, 0);
            // Only the opening delimiter was consumed.
            let leading = "--MIME_boundary".len();
            assert_eq!(report.stats.discarded_bytes, (chunk.len() - leading) as u64);
        }
    }

    #[tokio::test]
    async fn complete_part_without_closing_boundary_is_not_emitted() {
        let steps = vec![Step::chunk(
            "--MIME_boundary\r\n{\"eventType\": 38, \"name\": \"Last\"}\r\n",
        )];
        let (report, records) = run_script(steps, End::Eof, &config(FramingMode::Boundary)).await;

        assert!(records.is_empty());
        assert_eq!(report.stats.frames, 0);
    }

    #[tokio::test]
    async fn repeated_event_is_forwarded_once() {
        let frame = "--MIME_boundary\r\n{\"eventType\": 38, \"name\": \"Jane\", \"employeeNoString\": \"E1\"}\r\n";
        let steps = vec![Step::chunk(frame), Step::chunk(frame), Step::chunk("--MIME_boundary\r\n")];
        let (report, records) = run_script(steps, End::Eof, &config(FramingMode::Boundary)).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Jane");
        assert_eq!(report.stats.frames, 2);
        assert_eq!(report.stats.target_events, 1);
        assert_eq!(report.stats.duplicates, 1);
    }

    #[tokio::test]
    async fn distinct_serial_numbers_are_not_duplicates() {
        let first = "--MIME_boundary\r\n{\"eventType\": 38, \"serialNo\": 10, \"name\": \"Jane\", \"employeeNoString\": \"E1\"}\r\n";
        let second = "--MIME_boundary\r\n{\"eventType\": 38, \"serialNo\": 11, \"name\": \"Jane\", \"employeeNoString\": \"E1\"}\r\n";
        let steps = vec![
            Step::chunk(first),
            Step::chunk(second),
            Step::chunk(first),
            Step::chunk("--MIME_boundary\r\n"),
        ];
        let (report, records) = run_script(steps, End::Eof, &config(FramingMode::Boundary)).await;

        assert_eq!(records.len(), 2);
        assert_eq!(report.stats.duplicates, 1);
    }

    #[tokio::test]
    async fn zero_window_forwards_every_repeat() {
        let frame = "--MIME_boundary\r\n{\"eventType\": 38, \"name\": \"Jane\"}\r\n";
        let steps = vec![Step::chunk(frame.repeat(3)), Step::chunk("--MIME_boundary\r\n")];
        let cfg = config(FramingMode::Boundary).with_dedup_window(Duration::ZERO);
        let (report, records) = run_script(steps, End::Eof, &cfg).await;

        assert_eq!(records.len(), 3);
        assert_eq!(report.stats.duplicates, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_stream_hits_idle_timeout() {
        let cfg = config(FramingMode::Auto).with_idle_timeout(Duration::from_secs(5));
        let (report, records) = run_script(Vec::new(), End::Hang, &cfg).await;

        assert!(matches!(
            report.outcome,
            SessionOutcome::Failed(SessionError::IdleTimeout(d)) if d == Duration::from_secs(5)
        ));
        assert!(report.streamed);
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn transport_error_fails_the_session() {
        let steps = vec![Step::chunk("--MIME_boundary\r\n"), Step::Fail("connection reset")];
        let (report, _) = run_script(steps, End::Hang, &config(FramingMode::Auto)).await;

        assert!(matches!(
            report.outcome,
            SessionOutcome::Failed(SessionError::Read(_))
        ));
        assert_eq!(report.stats.chunks, 1);
    }

    #[tokio::test]
    async fn refused_connection_never_streams() {
        let transport = ScriptedTransport::new(vec![Script::Refuse(SessionError::AuthFailure)]);
        let (notifier, _rx) = Notifier::channel(4).unwrap();
        let cfg = config(FramingMode::Auto);

        let report = StreamSession::new(&transport, &cfg, &notifier)
            .run(&CancellationToken::new())
            .await;

        assert!(matches!(
            report.outcome,
            SessionOutcome::Failed(SessionError::AuthFailure)
        ));
        assert!(!report.streamed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_completes_the_session() {
        let transport = ScriptedTransport::new(Vec::new());
        let (notifier, _rx) = Notifier::channel(4).unwrap();
        let cfg = config(FramingMode::Auto);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let report = StreamSession::new(&transport, &cfg, &notifier)
            .run(&cancel)
            .await;
        assert!(matches!(report.outcome, SessionOutcome::Completed));
        assert!(report.streamed);
    }

    #[tokio::test]
    async fn full_queue_counts_dropped_records() {
        let body: String = ["A", "B", "C"]
            .iter()
            .map(|name| format!("--MIME_boundary\r\n{{\"eventType\": 38, \"name\": \"{name}\"}}\r\n"))
            .chain(std::iter::once("--MIME_boundary\r\n".to_string()))
            .collect();
        let transport = ScriptedTransport::new(vec![Script::stream(
            vec![Step::chunk(body)],
            End::Eof,
        )]);
        let (notifier, _rx) = Notifier::channel(1).unwrap();
        let cfg = config(FramingMode::Boundary);

        let report = StreamSession::new(&transport, &cfg, &notifier)
            .run(&CancellationToken::new())
            .await;
        assert_eq!(report.stats.target_events, 3);
        assert_eq!(report.stats.dropped_records, 2);
    }
}
