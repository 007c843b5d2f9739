//! Stream identity: what kind of stream is on the wire, which version of
//! the protocol framed it, and whether packet tags are variable-width.
use snafu::{Backtrace, Snafu};
use std::fmt;
use std::str::FromStr;

/// Triggered when a version string does not name a supported das stream
/// version.
#[derive(Debug, Snafu)]
#[snafu(display("Unknown das stream version `{}`", version))]
pub struct UnknownVersionError {
    /// the version string as found
    version: String,
    /// backtrace of the error's creation
    backtrace: Backtrace,
}

/// The content family transported by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// A das2 (or das3) stream.
    Das2,
    /// A QStream, a sibling format which is recognized but not decoded
    /// beyond its framing.
    QStream,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamKind::Das2 => "das2",
            StreamKind::QStream => "qstream",
        })
    }
}

/// A supported das stream protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamVersion {
    /// Version 2.2, the legacy fixed-tag framing.
    V2_2,
    /// Version 3.0, the pipe-delimited variable-tag framing.
    V3_0,
}

impl StreamVersion {
    /// The version as it appears in stream headers.
    pub fn as_str(self) -> &'static str {
        match self {
            StreamVersion::V2_2 => "2.2",
            StreamVersion::V3_0 => "3.0",
        }
    }
}

impl fmt::Display for StreamVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamVersion {
    type Err = UnknownVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2.2" => Ok(StreamVersion::V2_2),
            "3.0" => Ok(StreamVersion::V3_0),
            _ => UnknownVersionSnafu { version: s }.fail(),
        }
    }
}

/// The full identity of a stream, detected once from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamType {
    /// the content family
    pub kind: StreamKind,
    /// the protocol version
    pub version: StreamVersion,
    /// whether packets use variable pipe-delimited tags
    pub variable_tags: bool,
}

impl Default for StreamType {
    fn default() -> Self {
        StreamType {
            kind: StreamKind::Das2,
            version: StreamVersion::V2_2,
            variable_tags: false,
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{} ({} tags)",
            self.kind,
            self.version,
            if self.variable_tags { "variable" } else { "fixed" }
        )
    }
}
