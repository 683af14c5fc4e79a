pub mod config;
pub mod domain;
pub mod errors;

pub use domain::crm::{CrmContact, CrmRole, CrmTask, CrmToken, CrmUser, Pipeline, Stage};
pub use domain::lead::{ContactMethod, ContactTime, CrmLeadRecord, Lead, LeadStatus};
pub use domain::sync::{derive_status, SyncLog, SyncStatus, SyncType};
pub use errors::SyncError;
