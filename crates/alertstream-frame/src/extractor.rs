use bytes::BytesMut;
use tracing::{debug, warn};

use crate::codec::{sniff_mode, split_documents, split_sections, Frame, FrameConfig};
use crate::error::Result;
use crate::mode::FramingMode;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Counters kept for the life of one extractor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractorStats {
    /// Bytes fed in.
    pub bytes_in: u64,
    /// Frames emitted.
    pub frames: u64,
    /// Times the buffer was discarded for exceeding the ceiling.
    pub overflow_resets: u64,
    /// Bytes lost to ceiling resets.
    pub discarded_bytes: u64,
}

/// Turns arbitrarily chunked stream bytes into complete frames.
///
/// Handles partial frames internally: a frame is emitted exactly once, as
/// soon as both of its delimiters are buffered, however the stream was split.
#[derive(Debug)]
pub struct FrameExtractor {
    config: FrameConfig,
    active: FramingMode,
    buf: BytesMut,
    #[cfg(feature = "async")]
    pending: std::collections::VecDeque<Frame>,
    stats: ExtractorStats,
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::from_valid_config(FrameConfig::default())
    }
}

impl FrameExtractor {
    /// Create an extractor after validating `config`.
    pub fn new(config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: FrameConfig) -> Self {
        Self {
            active: config.mode,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            #[cfg(feature = "async")]
            pending: std::collections::VecDeque::new(),
            stats: ExtractorStats::default(),
            config,
        }
    }

    /// Append `chunk` and return every frame it completed, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.stats.bytes_in += chunk.len() as u64;
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        self.extract(&mut frames);
        self.enforce_ceiling();

        self.stats.frames += frames.len() as u64;
        frames
    }

    /// Discard whatever the stream left behind once it has ended.
    ///
    /// The trailing bytes never saw their closing marker, so they are an
    /// incomplete frame in every mode and are dropped. Returns the number of
    /// bytes discarded.
    pub fn finish(&mut self) -> usize {
        let rest = self.buf.len();
        self.buf.clear();
        if rest > 0 {
            self.stats.discarded_bytes += rest as u64;
            debug!(bytes = rest, mode = %self.active, "discarding incomplete trailing frame");
        }
        rest
    }

    /// Bytes currently held back waiting for a delimiter.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// The strategy in effect; `Auto` until a marker has been sniffed.
    pub fn active_mode(&self) -> FramingMode {
        self.active
    }

    /// Counters since construction.
    pub fn stats(&self) -> ExtractorStats {
        self.stats
    }

    /// Current extractor configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn extract(&mut self, frames: &mut Vec<Frame>) {
        if self.active == FramingMode::Auto {
            match sniff_mode(
                &self.buf,
                self.config.boundary.as_bytes(),
                self.config.start_tag.as_bytes(),
            ) {
                Some(mode) => {
                    debug!(mode = %mode, "framing mode sniffed from stream");
                    self.active = mode;
                }
                None => return,
            }
        }

        match self.active {
            FramingMode::Boundary => {
                split_sections(&mut self.buf, self.config.boundary.as_bytes(), frames);
            }
            FramingMode::Tag => {
                split_documents(
                    &mut self.buf,
                    self.config.start_tag.as_bytes(),
                    self.config.end_tag.as_bytes(),
                    frames,
                );
            }
            FramingMode::Auto => {}
        }
    }

    fn enforce_ceiling(&mut self) {
        if self.buf.len() <= self.config.buffer_ceiling {
            return;
        }

        let dropped = self.buf.len();
        self.buf.clear();
        self.stats.overflow_resets += 1;
        self.stats.discarded_bytes += dropped as u64;

        warn!(
            kind = "buffer_overflow",
            dropped_bytes = dropped,
            ceiling = self.config.buffer_ceiling,
            mode = %self.active,
            resets = self.stats.overflow_resets,
            "no frame boundary within buffer ceiling, buffer discarded"
        );
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Decoder for FrameExtractor {
    type Item = Frame;
    type Error = crate::error::FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if self.pending.is_empty() && !src.is_empty() {
            let chunk = src.split();
            let frames = self.feed(&chunk);
            self.pending.extend(frames);
        }
        Ok(self.pending.pop_front())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        self.finish();
        Ok(None)
    }
}
