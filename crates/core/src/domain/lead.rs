use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a lead in the local product.
///
/// CRM stages map onto these three states through an operator-configured
/// stage mapping; unmapped stages leave a CRM-created lead at `New`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    InProgress,
    Closed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::InProgress => "IN_PROGRESS",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NEW" => Some(Self::New),
            "IN_PROGRESS" => Some(Self::InProgress),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactMethod {
    Call,
    Whatsapp,
    Email,
}

impl ContactMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CALL",
            Self::Whatsapp => "WHATSAPP",
            Self::Email => "EMAIL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CALL" => Some(Self::Call),
            "WHATSAPP" => Some(Self::Whatsapp),
            "EMAIL" => Some(Self::Email),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactTime {
    Morning,
    Afternoon,
    Evening,
    Anytime,
}

impl ContactTime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "MORNING",
            Self::Afternoon => "AFTERNOON",
            Self::Evening => "EVENING",
            Self::Anytime => "ANYTIME",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MORNING" => Some(Self::Morning),
            "AFTERNOON" => Some(Self::Afternoon),
            "EVENING" => Some(Self::Evening),
            "ANYTIME" => Some(Self::Anytime),
            _ => None,
        }
    }
}

/// A prospective customer, created locally (web form, broker entry) or
/// mirrored from the CRM (`amo_lead_id` set).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub amo_lead_id: Option<i64>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub guest_email: Option<String>,
    pub status: LeadStatus,
    /// Set once a human moves `status` off the CRM-driven value; from then
    /// on the sync never overwrites `status`.
    pub status_locked: bool,
    pub responsible_user_id: Option<i64>,
    pub property_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub amo_contact_id: Option<i64>,
    pub comment: Option<String>,
    pub contact_method: ContactMethod,
    pub contact_time: ContactTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn originates_from_crm(&self) -> bool {
        self.amo_lead_id.is_some()
    }
}

/// The CRM-sourced slice of a lead, as produced by the entity mapper.
///
/// Only these fields are touched when reconciling against an existing row;
/// locally owned fields (a human-edited `status`, comments, contact
/// preferences) are never overwritten by the sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmLeadRecord {
    pub amo_lead_id: i64,
    pub guest_name: Option<String>,
    pub status: LeadStatus,
    pub responsible_user_id: Option<i64>,
    pub amo_contact_id: Option<i64>,
}
