//! Per-frame failure kinds.
//!
//! None of these are fatal. The transport decides whether to log, drop or
//! close; the relay itself only reports.

use crate::registry::ConnectionId;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("frame from unbound connection {0}")]
    UnboundSender(ConnectionId),

    #[error("frame from unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("failed to encode outbound frame: {0}")]
    Encode(#[source] serde_json::Error),
}

impl RelayError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::MalformedFrame(_) => "malformed_frame",
            Self::UnboundSender(_) => "unbound_sender",
            Self::UnknownConnection(_) => "unknown_connection",
            Self::Encode(_) => "encode_failed",
        }
    }

    /// Whether the frame was dropped for routing reasons rather than content.
    pub fn is_routing(&self) -> bool {
        matches!(self, Self::UnboundSender(_) | Self::UnknownConnection(_))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::MalformedFrame(err.to_string())
    }
}

impl From<std::str::Utf8Error> for RelayError {
    fn from(err: std::str::Utf8Error) -> Self {
        RelayError::MalformedFrame(err.to_string())
    }
}
