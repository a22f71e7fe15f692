//! Error types for Retrace operations

/// Result type for Retrace operations
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Error types for the replay engine
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A trace in the document has no spans
    #[error("Trace {trace_id} has no root span")]
    EmptyTrace {
        /// Offending trace
        trace_id: String,
    },

    /// A recorded label is present but cannot be decoded
    #[error("Invalid label {key} on span {span_id}: {reason}")]
    InvalidLabel {
        /// Span carrying the label
        span_id: String,
        /// Label key
        key: &'static str,
        /// Decode failure
        reason: String,
    },

    /// Checkpoint file holds something other than an index
    #[error("Corrupt checkpoint {path}: {content:?}")]
    CorruptCheckpoint {
        /// Checkpoint file
        path: String,
        /// Raw file content
        content: String,
    },

    /// Trace source failed to produce a document
    #[error("Trace source error: {0}")]
    Source(String),

    /// Completion notification was not acknowledged
    #[error("Completion notification failed with status {status}: {body}")]
    Notification {
        /// HTTP status returned by the bus
        status: u16,
        /// Response body
        body: String,
    },

    /// Service version could not be resolved
    #[error("Version resolution failed: {0}")]
    Version(String),

    /// Run was cancelled before completion
    #[error("Replay cancelled")]
    Cancelled,

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ReplayError {
    fn from(s: String) -> Self {
        ReplayError::Other(s)
    }
}

impl From<&str> for ReplayError {
    fn from(s: &str) -> Self {
        ReplayError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ReplayError {
    fn from(err: anyhow::Error) -> Self {
        ReplayError::Other(err.to_string())
    }
}

/// Failure raised by an inbound replayer while replaying one trace.
///
/// These never abort a run; the orchestrator logs them and moves on.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    /// The service under test rejected or failed the replayed request
    #[error("Replayed request failed: {0:#}")]
    Request(#[source] anyhow::Error),

    /// The replayer could not build a request from the recorded root
    #[error("Unsupported root span {span_id}: {reason}")]
    Unsupported {
        /// Root span
        span_id: String,
        /// Why it cannot be replayed
        reason: String,
    },
}

impl From<anyhow::Error> for InboundError {
    fn from(err: anyhow::Error) -> Self {
        InboundError::Request(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_label_display() {
        let err = ReplayError::InvalidLabel {
            span_id: "s1".to_string(),
            key: "/http/status_code",
            reason: "not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid label /http/status_code on span s1: not a number"
        );
    }

    #[test]
    fn test_inbound_error_keeps_chain() {
        let err: InboundError = anyhow::anyhow!("connection reset")
            .context("POST /orders")
            .into();
        let rendered = err.to_string();
        assert!(rendered.contains("POST /orders"));
        assert!(rendered.contains("connection reset"));
    }
}
