mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "alertstream",
    version,
    about = "Forward ISAPI identity-match events to an attendance webhook"
)]
struct Cli {
    /// Output format for detected records.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use alertstream_frame::FramingMode;

    use super::*;

    #[test]
    fn parses_listen_subcommand() {
        let cli = Cli::try_parse_from([
            "alertstream",
            "listen",
            "--host",
            "192.168.1.17",
            "--password",
            "pw",
            "--framing-mode",
            "xml",
            "--idle-timeout-seconds",
            "30",
        ])
        .expect("listen args should parse");

        let Command::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(args.host, "192.168.1.17");
        assert_eq!(args.framing.framing_mode, FramingMode::Tag);
        assert_eq!(args.idle_timeout_seconds, 30);
    }

    #[test]
    fn rejects_unknown_framing_mode() {
        let err = Cli::try_parse_from([
            "alertstream",
            "replay",
            "capture.bin",
            "--framing-mode",
            "length",
        ])
        .expect_err("unknown mode should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_replay_subcommand() {
        let cli = Cli::try_parse_from(["alertstream", "--format", "json", "replay", "capture.bin"])
            .expect("replay args should parse");
        assert!(matches!(cli.command, Command::Replay(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
