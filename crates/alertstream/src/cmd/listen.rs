use std::time::Duration;

use alertstream_session::{
    run_delivery_worker, ConfiguredSink, DeviceConfig, HttpTransport, Notifier, NotifierConfig,
    ReconnectLoop, RetryPolicy, SessionConfig, DEFAULT_WEBHOOK_TIMEOUT,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{io_error, notify_error, session_error, CliResult, SUCCESS};
use crate::output::{OutputFormat, PrintingSink};

/// How long queued records may take to drain after shutdown is requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let session_config = session_config(&args);
    session_config
        .validate()
        .map_err(|err| session_error("invalid configuration", err))?;
    let notifier_config = notifier_config(&args);
    notifier_config
        .validate()
        .map_err(|err| session_error("invalid configuration", err))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;

    runtime.block_on(listen(session_config, notifier_config, format))
}

fn session_config(args: &ListenArgs) -> SessionConfig {
    let device = DeviceConfig::new(
        args.host.clone(),
        args.port,
        args.username.clone(),
        args.password.clone(),
    );
    let retry = RetryPolicy {
        initial_delay: Duration::from_secs(args.retry_delay_seconds),
        max_delay: Duration::from_secs(args.max_retry_delay_seconds),
        ..RetryPolicy::default()
    };

    SessionConfig::new(device)
        .with_idle_timeout(Duration::from_secs(args.idle_timeout_seconds))
        .with_frame_config(args.framing.frame_config())
        .with_retry(retry)
        .with_dedup_window(Duration::from_secs(args.dedup_window_seconds))
}

fn notifier_config(args: &ListenArgs) -> NotifierConfig {
    let url = args.webhook_url.trim();
    NotifierConfig {
        webhook_url: (!url.is_empty()).then(|| url.to_string()),
        request_timeout: DEFAULT_WEBHOOK_TIMEOUT,
        queue_capacity: args.queue_capacity,
    }
}

async fn listen(
    session_config: SessionConfig,
    notifier_config: NotifierConfig,
    format: OutputFormat,
) -> CliResult<i32> {
    let transport = HttpTransport::new(session_config.device.clone(), session_config.idle_timeout)
        .map_err(|err| session_error("transport setup failed", err))?;
    let sink = ConfiguredSink::from_config(&notifier_config)
        .map_err(|err| notify_error("webhook setup failed", err))?;

    let (notifier, rx) = Notifier::channel(notifier_config.queue_capacity)
        .map_err(|err| session_error("invalid configuration", err))?;
    let delivery_cancel = CancellationToken::new();
    let mut worker = tokio::spawn(run_delivery_worker(
        rx,
        PrintingSink::new(sink, format),
        delivery_cancel.clone(),
    ));

    let cancel = CancellationToken::new();
    let signals = tokio::spawn(wait_for_shutdown(cancel.clone()));

    info!(
        url = %transport.url(),
        framing_mode = %session_config.frame.mode,
        idle_timeout = ?session_config.idle_timeout,
        webhook = notifier_config.webhook_url.is_some(),
        "listening for alert events"
    );

    let reconnect = ReconnectLoop::new(transport, session_config, notifier);
    reconnect.run(&cancel).await;
    // Dropping the loop drops the last notifier handle, which lets the worker
    // finish once the queue is empty.
    drop(reconnect);
    signals.abort();

    match tokio::time::timeout(DRAIN_TIMEOUT, &mut worker).await {
        Ok(Ok(stats)) => info!(
            delivered = stats.delivered,
            failed = stats.failed,
            "delivery finished"
        ),
        Ok(Err(err)) => warn!(error = %err, "delivery worker panicked"),
        Err(_) => {
            warn!(timeout = ?DRAIN_TIMEOUT, "delivery queue not drained, abandoning records");
            delivery_cancel.cancel();
            let _ = worker.await;
        }
    }

    Ok(SUCCESS)
}

async fn wait_for_shutdown(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                wait_for_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;

    info!("shutdown requested");
    cancel.cancel();
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}
