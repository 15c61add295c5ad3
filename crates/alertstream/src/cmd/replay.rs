use alertstream_event::{decode, DecodeError};
use alertstream_frame::FrameExtractor;
use futures_util::StreamExt;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::cmd::ReplayArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Debug, Default)]
struct ReplaySummary {
    frames: u64,
    records: u64,
    ignored: u64,
    skipped: u64,
    decode_failures: u64,
}

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let extractor = FrameExtractor::new(args.framing.frame_config())
        .map_err(|err| frame_error("invalid framing configuration", err))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;

    runtime.block_on(async {
        let context = format!("cannot read {}", args.file.display());
        let file = tokio::fs::File::open(&args.file)
            .await
            .map_err(|err| io_error(&context, err))?;

        let mut frames = FramedRead::new(file, extractor);
        let mut summary = ReplaySummary::default();

        while let Some(frame) = frames.next().await {
            let frame = frame.map_err(|err| frame_error(&context, err))?;
            summary.frames += 1;

            match decode(&frame.payload) {
                Ok(event) => match event.into_record() {
                    Some(record) => {
                        summary.records += 1;
                        print_record(&record, format);
                    }
                    None => summary.ignored += 1,
                },
                Err(err @ (DecodeError::UnsupportedContent(_) | DecodeError::EmptyFrame)) => {
                    summary.skipped += 1;
                    debug!(reason = %err, "skipping frame");
                }
                Err(err) => {
                    summary.decode_failures += 1;
                    warn!(error = %err, bytes = frame.len(), "dropping undecodable frame");
                }
            }
        }

        let stats = frames.decoder().stats();
        info!(
            frames = summary.frames,
            records = summary.records,
            ignored = summary.ignored,
            skipped = summary.skipped,
            decode_failures = summary.decode_failures,
            overflow_resets = stats.overflow_resets,
            mode = %frames.decoder().active_mode(),
            "replay finished"
        );
        Ok(SUCCESS)
    })
}
