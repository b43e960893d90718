//! # Error Types
//!
//! Custom error types for the telemetry relay using `thiserror`.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why an open link stopped producing or accepting data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkLossCause {
    /// No data arrived within the read timeout
    Timeout(Duration),
    /// The peer closed the stream (EOF)
    Closed,
    /// Underlying I/O failure
    Io(String),
}

impl fmt::Display for LinkLossCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkLossCause::Timeout(t) => write!(f, "no data for {} ms", t.as_millis()),
            LinkLossCause::Closed => write!(f, "stream closed"),
            LinkLossCause::Io(msg) => write!(f, "{}", msg),
        }
    }
}

/// Main error type for the relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Candidate device or endpoint could not be opened
    #[error("Port unavailable: {0}")]
    PortUnavailable(String),

    /// An open link stopped producing/accepting data
    #[error("Link lost on {link}: {cause}")]
    LinkLost { link: String, cause: LinkLossCause },

    /// Bytes could not be interpreted as any known record
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Outbound transport rejected a write
    #[error("Write failed on {link}: {reason}")]
    WriteFailed { link: String, reason: String },

    /// Listening socket could not be acquired
    #[error("Failed to bind UDP socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Snapshot serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Construct a `LinkLost` error from an I/O failure
    pub fn link_io(link: &str, err: std::io::Error) -> Self {
        RelayError::LinkLost {
            link: link.to_string(),
            cause: LinkLossCause::Io(err.to_string()),
        }
    }

    /// True for a read that merely timed out on an otherwise healthy link
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RelayError::LinkLost {
                cause: LinkLossCause::Timeout(_),
                ..
            }
        )
    }
}

/// Result type alias for the relay
pub type Result<T> = std::result::Result<T, RelayError>;
