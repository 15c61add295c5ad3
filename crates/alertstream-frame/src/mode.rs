//! Framing strategies.
//!
//! An alert stream is either MIME-multipart (sections separated by a literal
//! boundary marker) or a run of concatenated XML documents (start/end tag
//! pairs). `Auto` defers the choice until the first marker shows up.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Configured framing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingMode {
    /// Sections delimited by a literal boundary marker.
    Boundary,
    /// Documents delimited by a start tag and its end tag.
    Tag,
    /// Pick `Boundary` or `Tag` from whichever marker appears first.
    #[default]
    Auto,
}

impl FramingMode {
    /// Returns the lowercase configuration name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            FramingMode::Boundary => "boundary",
            FramingMode::Tag => "tag",
            FramingMode::Auto => "auto",
        }
    }

    /// Returns true if the mode is fixed rather than sniffed.
    pub fn is_resolved(self) -> bool {
        !matches!(self, FramingMode::Auto)
    }
}

impl fmt::Display for FramingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FramingMode {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boundary" | "multipart" => Ok(FramingMode::Boundary),
            "tag" | "xml" => Ok(FramingMode::Tag),
            "auto" => Ok(FramingMode::Auto),
            other => Err(FrameError::UnknownMode(other.to_string())),
        }
    }
}
