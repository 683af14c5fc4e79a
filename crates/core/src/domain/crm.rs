use serde::{Deserialize, Serialize};

use crate::domain::lead::LeadStatus;

/// One CRM account's token pair. Created on first OAuth connection,
/// rewritten on every refresh, never deleted while the integration lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmToken {
    pub account_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch seconds.
    pub expires_at: i64,
    pub base_domain: String,
}

impl CrmToken {
    /// True when the token should be refreshed before use: expired, or
    /// inside the safety margin of its expiry.
    pub fn needs_refresh(&self, now_epoch_secs: i64, safety_margin_secs: i64) -> bool {
        now_epoch_secs >= self.expires_at - safety_margin_secs
    }
}

/// A sales funnel mirrored from the CRM, keyed by the CRM's own id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    pub sort: i64,
    pub is_main: bool,
    pub is_unsorted_on: bool,
    pub account_id: String,
}

/// A step within a pipeline. Everything but `mapped_status` is CRM-sourced;
/// `mapped_status` belongs to the local operator and survives re-sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    pub pipeline_id: i64,
    pub name: String,
    pub sort: i64,
    pub is_editable: bool,
    pub color: Option<String>,
    pub mapped_status: Option<LeadStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmUser {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub lang: Option<String>,
    pub account_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmRole {
    pub id: i64,
    pub name: String,
    pub account_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmContact {
    pub id: i64,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub responsible_user_id: Option<i64>,
    pub account_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmTask {
    pub id: i64,
    pub text: String,
    pub task_type_id: Option<i64>,
    /// Epoch seconds deadline, as delivered by the CRM.
    pub complete_till: Option<i64>,
    pub is_completed: bool,
    pub responsible_user_id: Option<i64>,
    pub entity_id: Option<i64>,
    pub entity_type: Option<String>,
    pub account_id: String,
}

#[cfg(test)]
mod tests {
    use super::CrmToken;

    fn token(expires_at: i64) -> CrmToken {
        CrmToken {
            account_id: "31920194".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            base_domain: "testco.amocrm.ru".to_string(),
        }
    }

    #[test]
    fn fresh_token_does_not_need_refresh() {
        let now = 1_000_000;
        assert!(!token(now + 3600).needs_refresh(now, 300));
    }

    #[test]
    fn token_inside_safety_margin_needs_refresh() {
        let now = 1_000_000;
        // Expires 5 seconds from now with a 60 second margin.
        assert!(token(now + 5).needs_refresh(now, 60));
    }

    #[test]
    fn expired_token_needs_refresh_even_without_margin() {
        let now = 1_000_000;
        assert!(token(now - 1).needs_refresh(now, 0));
    }

    #[test]
    fn boundary_is_inclusive() {
        let now = 1_000_000;
        assert!(token(now + 60).needs_refresh(now, 60));
        assert!(!token(now + 61).needs_refresh(now, 60));
    }
}
