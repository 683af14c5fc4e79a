use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a run was triggered. Persisted verbatim into `sync_logs.type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncType {
    Properties,
    Manual,
    Scheduled,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Properties => "PROPERTIES",
            Self::Manual => "MANUAL",
            Self::Scheduled => "SCHEDULED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PROPERTIES" => Some(Self::Properties),
            "MANUAL" => Some(Self::Manual),
            "SCHEDULED" => Some(Self::Scheduled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Success,
    Partial,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Some(Self::Success),
            "PARTIAL" => Some(Self::Partial),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Append-only record of one orchestrator run. Never updated after insert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: Uuid,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub created_count: i64,
    pub updated_count: i64,
    pub archived_count: i64,
    pub failed_count: i64,
    pub total_processed: i64,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Final status of a run.
///
/// A fetch failure (an aborted run or a dead segment) with nothing
/// processed is `FAILED`: no result was produced at all. The same
/// failure after some records landed is `PARTIAL`, as is any completed
/// run with per-record failures. A clean run is `SUCCESS`.
pub fn derive_status(
    fetch_failed: bool,
    failed_count: i64,
    processed_count: i64,
) -> SyncStatus {
    if fetch_failed && processed_count == 0 {
        SyncStatus::Failed
    } else if fetch_failed || failed_count > 0 {
        SyncStatus::Partial
    } else {
        SyncStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::{derive_status, SyncStatus, SyncType};

    #[test]
    fn fetch_failure_with_nothing_processed_is_failed() {
        assert_eq!(derive_status(true, 0, 0), SyncStatus::Failed);
    }

    #[test]
    fn fetch_failure_after_progress_is_partial() {
        assert_eq!(derive_status(true, 0, 8), SyncStatus::Partial);
        assert_eq!(derive_status(true, 2, 8), SyncStatus::Partial);
    }

    #[test]
    fn completed_with_record_failures_is_partial() {
        assert_eq!(derive_status(false, 1, 10), SyncStatus::Partial);
    }

    #[test]
    fn completed_clean_is_success() {
        assert_eq!(derive_status(false, 0, 10), SyncStatus::Success);
        assert_eq!(derive_status(false, 0, 0), SyncStatus::Success);
    }

    #[test]
    fn type_tag_round_trips() {
        for tag in [SyncType::Properties, SyncType::Manual, SyncType::Scheduled] {
            assert_eq!(SyncType::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(SyncType::parse("WEBHOOK"), None);
    }
}
