//! Wire-format structs for the amoCRM v4 API. Everything the engine
//! touches past the client boundary is typed here; nullable upstream
//! fields are `Option`s, never empty strings.

use serde::Deserialize;

/// Response of `POST /oauth2/access_token` for both the authorization-code
/// and refresh-token grants.
#[derive(Clone, Debug, Deserialize)]
pub struct AmoAuthResponse {
    pub token_type: String,
    /// Lifetime in seconds from the moment of issue.
    pub expires_in: i64,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AmoPipeline {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub sort: i64,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub is_unsorted_on: bool,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<AmoPipelineEmbedded>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AmoPipelineEmbedded {
    #[serde(default)]
    pub statuses: Vec<AmoStatus>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AmoStatus {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub sort: i64,
    #[serde(default)]
    pub is_editable: bool,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AmoLead {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub status_id: i64,
    pub pipeline_id: i64,
    #[serde(default)]
    pub responsible_user_id: Option<i64>,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<AmoLeadEmbedded>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AmoLeadEmbedded {
    #[serde(default)]
    pub contacts: Vec<AmoLeadContactRef>,
}

/// Contact reference embedded in a lead when fetched `with=contacts`.
#[derive(Clone, Debug, Deserialize)]
pub struct AmoLeadContactRef {
    pub id: i64,
    #[serde(default)]
    pub is_main: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AmoUser {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<AmoUserEmbedded>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AmoUserEmbedded {
    #[serde(default)]
    pub roles: Vec<AmoRole>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AmoRole {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AmoContact {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub responsible_user_id: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AmoTask {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub task_type_id: Option<i64>,
    /// Epoch seconds deadline.
    #[serde(default)]
    pub complete_till: Option<i64>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub responsible_user_id: Option<i64>,
    #[serde(default)]
    pub entity_id: Option<i64>,
    #[serde(default)]
    pub entity_type: Option<String>,
}

/// Generic `_embedded` list envelope shared by the v4 collection endpoints.
#[derive(Clone, Debug, Deserialize)]
pub struct AmoPage<E> {
    #[serde(rename = "_embedded")]
    pub embedded: E,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PipelinesEmbedded {
    #[serde(default)]
    pub pipelines: Vec<AmoPipeline>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LeadsEmbedded {
    #[serde(default)]
    pub leads: Vec<AmoLead>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UsersEmbedded {
    #[serde(default)]
    pub users: Vec<AmoUser>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContactsEmbedded {
    #[serde(default)]
    pub contacts: Vec<AmoContact>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TasksEmbedded {
    #[serde(default)]
    pub tasks: Vec<AmoTask>,
}
