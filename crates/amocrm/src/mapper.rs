//! Wire-to-domain mapping. Pure functions, no I/O: the engine feeds them
//! deserialized API records and writes the results through the
//! repositories with bound parameters.

use std::collections::HashMap;

use leadsync_core::domain::crm::{CrmContact, CrmRole, CrmTask, CrmUser, Pipeline, Stage};
use leadsync_core::domain::lead::{CrmLeadRecord, LeadStatus};

use crate::models::{AmoContact, AmoLead, AmoPipeline, AmoRole, AmoStatus, AmoTask, AmoUser};

/// Blank upstream strings become `None`; absence and emptiness are the
/// same fact and must not round-trip as `""`.
fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn map_pipeline(pipeline: &AmoPipeline, account_id: &str) -> Pipeline {
    Pipeline {
        id: pipeline.id,
        name: pipeline.name.clone(),
        sort: pipeline.sort,
        is_main: pipeline.is_main,
        is_unsorted_on: pipeline.is_unsorted_on,
        account_id: account_id.to_string(),
    }
}

/// `mapped_status` is operator-owned and never derived from CRM data;
/// the stage repository ignores it on upsert regardless.
pub fn map_stage(status: &AmoStatus, pipeline_id: i64) -> Stage {
    Stage {
        id: status.id,
        pipeline_id,
        name: status.name.clone(),
        sort: status.sort,
        is_editable: status.is_editable,
        color: status.color.clone(),
        mapped_status: None,
    }
}

/// Reduce one CRM lead to the columns the reconciler writes. The lead's
/// local status is `NEW` unless the operator has mapped its stage to
/// something else.
pub fn map_lead(lead: &AmoLead, stage_mappings: &HashMap<i64, LeadStatus>) -> CrmLeadRecord {
    let status = stage_mappings.get(&lead.status_id).copied().unwrap_or(LeadStatus::New);

    let amo_contact_id = lead.embedded.as_ref().and_then(|embedded| {
        embedded
            .contacts
            .iter()
            .find(|c| c.is_main)
            .or_else(|| embedded.contacts.first())
            .map(|c| c.id)
    });

    CrmLeadRecord {
        amo_lead_id: lead.id,
        guest_name: non_blank(lead.name.as_deref()),
        status,
        responsible_user_id: lead.responsible_user_id,
        amo_contact_id,
    }
}

pub fn map_user(user: &AmoUser, account_id: &str) -> CrmUser {
    CrmUser {
        id: user.id,
        name: user.name.clone(),
        email: non_blank(user.email.as_deref()),
        lang: non_blank(user.lang.as_deref()),
        account_id: account_id.to_string(),
    }
}

pub fn map_role(role: &AmoRole, account_id: &str) -> CrmRole {
    CrmRole { id: role.id, name: role.name.clone(), account_id: account_id.to_string() }
}

pub fn map_contact(contact: &AmoContact, account_id: &str) -> CrmContact {
    CrmContact {
        id: contact.id,
        name: non_blank(contact.name.as_deref()),
        first_name: non_blank(contact.first_name.as_deref()),
        last_name: non_blank(contact.last_name.as_deref()),
        responsible_user_id: contact.responsible_user_id,
        account_id: account_id.to_string(),
    }
}

pub fn map_task(task: &AmoTask, account_id: &str) -> CrmTask {
    CrmTask {
        id: task.id,
        text: task.text.clone(),
        task_type_id: task.task_type_id,
        complete_till: task.complete_till,
        is_completed: task.is_completed,
        responsible_user_id: task.responsible_user_id,
        entity_id: task.entity_id,
        entity_type: non_blank(task.entity_type.as_deref()),
        account_id: account_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use leadsync_core::domain::lead::LeadStatus;

    use super::*;
    use crate::models::{AmoLead, AmoLeadContactRef, AmoLeadEmbedded, AmoStatus};

    fn lead(status_id: i64) -> AmoLead {
        AmoLead {
            id: 7001,
            name: Some("Booking request".to_string()),
            status_id,
            pipeline_id: 3,
            responsible_user_id: Some(501),
            embedded: None,
        }
    }

    #[test]
    fn unmapped_stage_defaults_to_new() {
        let record = map_lead(&lead(142), &HashMap::new());
        assert_eq!(record.status, LeadStatus::New);
    }

    #[test]
    fn mapped_stage_drives_the_status() {
        let mappings = HashMap::from([(142, LeadStatus::Closed)]);
        let record = map_lead(&lead(142), &mappings);
        assert_eq!(record.status, LeadStatus::Closed);
    }

    #[test]
    fn mapping_for_a_different_stage_does_not_apply() {
        let mappings = HashMap::from([(143, LeadStatus::Closed)]);
        let record = map_lead(&lead(142), &mappings);
        assert_eq!(record.status, LeadStatus::New);
    }

    #[test]
    fn blank_name_maps_to_none() {
        let mut raw = lead(142);
        raw.name = Some("   ".to_string());
        let record = map_lead(&raw, &HashMap::new());
        assert_eq!(record.guest_name, None);
    }

    #[test]
    fn main_contact_wins_over_first_listed() {
        let mut raw = lead(142);
        raw.embedded = Some(AmoLeadEmbedded {
            contacts: vec![
                AmoLeadContactRef { id: 900, is_main: false },
                AmoLeadContactRef { id: 901, is_main: true },
            ],
        });
        let record = map_lead(&raw, &HashMap::new());
        assert_eq!(record.amo_contact_id, Some(901));
    }

    #[test]
    fn stage_mapping_never_sets_the_operator_field() {
        let status = AmoStatus {
            id: 142,
            name: "First contact".to_string(),
            sort: 10,
            is_editable: true,
            color: Some("#99ccff".to_string()),
        };
        let stage = map_stage(&status, 3);
        assert_eq!(stage.mapped_status, None);
        assert_eq!(stage.pipeline_id, 3);
    }
}
