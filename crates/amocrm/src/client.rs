//! Typed HTTP client for the amoCRM v4 API.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::json;

use leadsync_core::config::{AmoConfig, SyncConfig};
use leadsync_core::SyncError;

use crate::models::{
    AmoAuthResponse, AmoContact, AmoLead, AmoPage, AmoPipeline, AmoTask, AmoUser,
    ContactsEmbedded, LeadsEmbedded, PipelinesEmbedded, TasksEmbedded, UsersEmbedded,
};

#[derive(Clone)]
pub struct AmoClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl AmoClient {
    pub fn new(amo: &AmoConfig, sync: &SyncConfig) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(sync.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::segment("client", format!("http client init: {e}")))?;

        Ok(Self {
            http,
            base_url: format!("https://{}", amo.base_domain),
            client_id: amo.client_id.clone(),
            client_secret: amo.client_secret.expose_secret().to_string(),
            redirect_uri: amo.redirect_uri.clone(),
        })
    }

    /// Point the client at a different origin. Used by tests to target a
    /// local mock server instead of the account's amoCRM domain.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Exchange a refresh token for a fresh access/refresh pair.
    ///
    /// Any failure here is fatal for the run: without a valid token no
    /// segment can proceed.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<AmoAuthResponse, SyncError> {
        let url = format!("{}/oauth2/access_token", self.base_url);
        let body = json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
            "redirect_uri": self.redirect_uri,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "token refresh rejected ({status}): {detail}"
            )));
        }

        response
            .json::<AmoAuthResponse>()
            .await
            .map_err(|e| SyncError::Auth(format!("malformed token response: {e}")))
    }

    /// `GET /api/v4/leads/pipelines`. Pipelines arrive in one request with
    /// their stages embedded; the endpoint is not paginated.
    pub async fn list_pipelines(&self, access_token: &str) -> Result<Vec<AmoPipeline>, SyncError> {
        let url = format!("{}/api/v4/leads/pipelines", self.base_url);
        let page: Option<AmoPage<PipelinesEmbedded>> =
            self.get_json("pipelines", &url, access_token).await?;
        Ok(page.map(|p| p.embedded.pipelines).unwrap_or_default())
    }

    pub async fn list_leads(
        &self,
        access_token: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<AmoLead>, SyncError> {
        let url = format!(
            "{}/api/v4/leads?limit={limit}&page={page}&with=contacts",
            self.base_url
        );
        let envelope: Option<AmoPage<LeadsEmbedded>> =
            self.get_json("leads", &url, access_token).await?;
        Ok(envelope.map(|p| p.embedded.leads).unwrap_or_default())
    }

    pub async fn list_users(
        &self,
        access_token: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<AmoUser>, SyncError> {
        let url = format!(
            "{}/api/v4/users?limit={limit}&page={page}&with=role",
            self.base_url
        );
        let envelope: Option<AmoPage<UsersEmbedded>> =
            self.get_json("users", &url, access_token).await?;
        Ok(envelope.map(|p| p.embedded.users).unwrap_or_default())
    }

    pub async fn list_contacts(
        &self,
        access_token: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<AmoContact>, SyncError> {
        let url = format!("{}/api/v4/contacts?limit={limit}&page={page}", self.base_url);
        let envelope: Option<AmoPage<ContactsEmbedded>> =
            self.get_json("contacts", &url, access_token).await?;
        Ok(envelope.map(|p| p.embedded.contacts).unwrap_or_default())
    }

    pub async fn list_tasks(
        &self,
        access_token: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<AmoTask>, SyncError> {
        let url = format!("{}/api/v4/tasks?limit={limit}&page={page}", self.base_url);
        let envelope: Option<AmoPage<TasksEmbedded>> =
            self.get_json("tasks", &url, access_token).await?;
        Ok(envelope.map(|p| p.embedded.tasks).unwrap_or_default())
    }

    /// Authenticated GET returning `None` for HTTP 204, which amoCRM uses
    /// for a page past the end of a collection.
    async fn get_json<T: DeserializeOwned>(
        &self,
        segment: &'static str,
        url: &str,
        access_token: &str,
    ) -> Result<Option<T>, SyncError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SyncError::segment(segment, format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SyncError::segment(
                segment,
                format!("unexpected status {status}: {detail}"),
            ));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| SyncError::segment(segment, format!("malformed response body: {e}")))
    }
}
