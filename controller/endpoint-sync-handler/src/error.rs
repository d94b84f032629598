//! Error types for control-plane adapters and reconciliation

use thiserror::Error;

/// Failure of a single control-plane round trip
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} rejected with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid {operation} response: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
}

impl ClientError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Transport { .. } => "transport",
            ClientError::Rejected { .. } => "rejected",
            ClientError::InvalidResponse { .. } => "invalid_response",
        }
    }
}

/// Outcome of one invocation that did not succeed
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },

    #[error("could not describe endpoint group: {source}")]
    DescribeFailure {
        #[source]
        source: ClientError,
    },

    #[error("could not update endpoint group: {source}")]
    UpdateFailure {
        #[source]
        source: ClientError,
    },

    #[error("endpoint group update rejected with status {status}")]
    UpdateRejected { status: u16 },

    #[error("lifecycle hook could not be abandoned: {reason}")]
    AbandonFailure { reason: String },
}

impl SyncError {
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        SyncError::InvalidEvent {
            reason: reason.into(),
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::InvalidEvent { .. } => "invalid_event",
            SyncError::DescribeFailure { .. } => "describe_failure",
            SyncError::UpdateFailure { .. } => "update_failure",
            SyncError::UpdateRejected { .. } => "update_rejected",
            SyncError::AbandonFailure { .. } => "abandon_failure",
        }
    }
}
