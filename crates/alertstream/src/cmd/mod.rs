use clap::{Args, Subcommand};
use std::path::PathBuf;

use alertstream_frame::{FrameConfig, FramingMode, DEFAULT_BOUNDARY, DEFAULT_BUFFER_CEILING};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Listen to a device's alert stream and forward identity matches.
    Listen(ListenArgs),
    /// Decode a captured alert stream file and print its records.
    Replay(ReplayArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Framing options shared by `listen` and `replay`.
#[derive(Args, Debug, Clone)]
pub struct FramingArgs {
    /// Framing strategy: boundary, tag or auto.
    #[arg(long, env = "ALERTSTREAM_FRAMING_MODE", default_value = "auto")]
    pub framing_mode: FramingMode,
    /// Multipart boundary marker, including the leading dashes.
    #[arg(long, env = "ALERTSTREAM_BOUNDARY", default_value = DEFAULT_BOUNDARY)]
    pub boundary: String,
    /// Buffered bytes without a complete frame before the buffer is reset.
    #[arg(long, env = "ALERTSTREAM_BUFFER_CEILING_BYTES", default_value_t = DEFAULT_BUFFER_CEILING)]
    pub buffer_ceiling_bytes: usize,
}

impl FramingArgs {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            mode: self.framing_mode,
            boundary: self.boundary.clone(),
            buffer_ceiling: self.buffer_ceiling_bytes,
            ..FrameConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Device host name or IP address.
    #[arg(long, env = "ALERTSTREAM_HOST")]
    pub host: String,
    /// Device HTTP port.
    #[arg(long, env = "ALERTSTREAM_PORT", default_value_t = 80)]
    pub port: u16,
    /// Digest auth user name.
    #[arg(long, env = "ALERTSTREAM_USERNAME", default_value = "admin")]
    pub username: String,
    /// Digest auth password.
    #[arg(long, env = "ALERTSTREAM_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
    /// Webhook receiving attendance records. Empty disables delivery.
    #[arg(long, env = "ALERTSTREAM_WEBHOOK_URL", default_value = "")]
    pub webhook_url: String,
    /// Seconds to wait for the connection or the next chunk.
    #[arg(long, env = "ALERTSTREAM_IDLE_TIMEOUT_SECONDS", default_value_t = 60)]
    pub idle_timeout_seconds: u64,
    /// Delay before the first reconnect after a failure.
    #[arg(long, env = "ALERTSTREAM_RETRY_DELAY_SECONDS", default_value_t = 2)]
    pub retry_delay_seconds: u64,
    /// Upper bound for the growing reconnect delay.
    #[arg(long, env = "ALERTSTREAM_MAX_RETRY_DELAY_SECONDS", default_value_t = 60)]
    pub max_retry_delay_seconds: u64,
    /// Records held for delivery before new ones are dropped.
    #[arg(long, env = "ALERTSTREAM_QUEUE_CAPACITY", default_value_t = 64)]
    pub queue_capacity: usize,
    /// Seconds during which a repeated identity event is not forwarded again. 0 disables.
    #[arg(long, env = "ALERTSTREAM_DEDUP_WINDOW_SECONDS", default_value_t = 10)]
    pub dedup_window_seconds: u64,
    #[command(flatten)]
    pub framing: FramingArgs,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Captured alert stream body.
    pub file: PathBuf,
    #[command(flatten)]
    pub framing: FramingArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
