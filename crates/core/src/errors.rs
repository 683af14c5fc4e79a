use thiserror::Error;

/// Failure taxonomy for a reconciliation run.
///
/// Per-record mapping/upsert failures never surface here: the reconciler
/// catches them, logs the record's external id and counts them into the
/// run summary instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing, invalid or revoked credentials. Fatal to the whole run.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Transport or non-2xx response mid-segment. Fatal to that entity
    /// type's segment only; segments already committed stay committed.
    #[error("sync segment `{segment}` failed: {message}")]
    Segment { segment: &'static str, message: String },
    /// A run for this account is already active. The trigger is rejected,
    /// not queued.
    #[error("a sync run is already in progress for account {account_id}")]
    AlreadyRunning { account_id: String },
    #[error("persistence failure: {0}")]
    Repository(String),
}

impl SyncError {
    pub fn segment(segment: &'static str, message: impl Into<String>) -> Self {
        Self::Segment { segment, message: message.into() }
    }

    /// True when the error aborts the run before any segment can commit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::AlreadyRunning { .. })
    }
}
