//! Stored-token lifecycle: load, refresh inside the safety margin,
//! persist the rotated pair.

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use leadsync_core::domain::crm::CrmToken;
use leadsync_core::SyncError;
use leadsync_db::repositories::TokenRepository;

use crate::client::AmoClient;

/// Hands out a usable access token for one account, refreshing it when
/// expiry is near. amoCRM rotates the refresh token on every exchange,
/// so concurrent refreshes would invalidate each other; the mutex
/// serializes them within this process.
pub struct TokenProvider<R> {
    repo: R,
    client: AmoClient,
    account_id: String,
    safety_margin_secs: i64,
    refresh_lock: Mutex<()>,
}

impl<R: TokenRepository> TokenProvider<R> {
    pub fn new(repo: R, client: AmoClient, account_id: String, safety_margin_secs: i64) -> Self {
        Self { repo, client, account_id, safety_margin_secs, refresh_lock: Mutex::new(()) }
    }

    pub async fn get_valid_token(&self) -> Result<String, SyncError> {
        let token = self.load().await?;
        if !token.needs_refresh(Utc::now().timestamp(), self.safety_margin_secs) {
            return Ok(token.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Re-read under the lock: a concurrent caller may have refreshed
        // while we waited.
        let token = self.load().await?;
        if !token.needs_refresh(Utc::now().timestamp(), self.safety_margin_secs) {
            return Ok(token.access_token);
        }

        let auth = self.client.refresh_token(&token.refresh_token).await?;
        let refreshed = CrmToken {
            account_id: self.account_id.clone(),
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
            expires_at: Utc::now().timestamp() + auth.expires_in,
            base_domain: token.base_domain,
        };
        self.repo
            .save(&refreshed)
            .await
            .map_err(|e| SyncError::Repository(e.to_string()))?;

        info!(account_id = %self.account_id, expires_at = refreshed.expires_at, "access token refreshed");
        Ok(refreshed.access_token)
    }

    async fn load(&self) -> Result<CrmToken, SyncError> {
        self.repo
            .find_by_account(&self.account_id)
            .await
            .map_err(|e| SyncError::Repository(e.to_string()))?
            .ok_or_else(|| {
                SyncError::Auth(format!(
                    "no stored token for account {}; connect the account first",
                    self.account_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use secrecy::SecretString;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use leadsync_core::config::{AmoConfig, SyncConfig};
    use leadsync_core::domain::crm::CrmToken;
    use leadsync_core::SyncError;
    use leadsync_db::repositories::{SqlTokenRepository, TokenRepository};
    use leadsync_db::{connect, memory_config, migrations};

    use super::TokenProvider;
    use crate::client::AmoClient;

    const ACCOUNT: &str = "31920194";

    async fn setup_repo() -> SqlTokenRepository {
        let pool = connect(&memory_config()).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlTokenRepository::new(pool)
    }

    fn client(base_url: &str) -> AmoClient {
        let amo = AmoConfig {
            account_id: ACCOUNT.to_string(),
            base_domain: "testco.amocrm.ru".to_string(),
            client_id: "client-id".to_string(),
            client_secret: SecretString::from("client-secret"),
            redirect_uri: "https://testco.example/callback".to_string(),
        };
        let sync = SyncConfig {
            page_size: 250,
            token_safety_margin_secs: 300,
            request_timeout_secs: 5,
            schedule_interval_secs: 3600,
        };
        AmoClient::new(&amo, &sync).expect("client").with_base_url(base_url)
    }

    fn stored_token(expires_at: i64) -> CrmToken {
        CrmToken {
            account_id: ACCOUNT.to_string(),
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at,
            base_domain: "testco.amocrm.ru".to_string(),
        }
    }

    fn refresh_response() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 86400,
            "access_token": "access-2",
            "refresh_token": "refresh-2",
        }))
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_a_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/access_token"))
            .respond_with(refresh_response())
            .expect(0)
            .mount(&server)
            .await;

        let repo = setup_repo().await;
        repo.save(&stored_token(Utc::now().timestamp() + 86_400)).await.expect("seed");

        let provider = TokenProvider::new(repo, client(&server.uri()), ACCOUNT.to_string(), 300);
        assert_eq!(provider.get_valid_token().await.expect("token"), "access-1");
    }

    #[tokio::test]
    async fn token_inside_the_margin_is_refreshed_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/access_token"))
            .respond_with(refresh_response())
            .expect(1)
            .mount(&server)
            .await;

        let repo = setup_repo().await;
        // Expires in 60s, margin is 300s: due for refresh.
        repo.save(&stored_token(Utc::now().timestamp() + 60)).await.expect("seed");

        let provider = TokenProvider::new(repo, client(&server.uri()), ACCOUNT.to_string(), 300);
        assert_eq!(provider.get_valid_token().await.expect("first"), "access-2");
        // Second call sees the rotated token and does not refresh again.
        assert_eq!(provider.get_valid_token().await.expect("second"), "access-2");
    }

    #[tokio::test]
    async fn rotated_pair_is_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/access_token"))
            .respond_with(refresh_response())
            .mount(&server)
            .await;

        let pool = connect(&memory_config()).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlTokenRepository::new(pool.clone());
        repo.save(&stored_token(Utc::now().timestamp() - 10)).await.expect("seed");

        let provider = TokenProvider::new(
            SqlTokenRepository::new(pool.clone()),
            client(&server.uri()),
            ACCOUNT.to_string(),
            300,
        );
        provider.get_valid_token().await.expect("refresh");

        let stored = repo.find_by_account(ACCOUNT).await.expect("find").expect("exists");
        assert_eq!(stored.refresh_token, "refresh-2");
        assert!(stored.expires_at > Utc::now().timestamp());
    }

    #[tokio::test]
    async fn missing_token_is_fatal() {
        let server = MockServer::start().await;
        let provider =
            TokenProvider::new(setup_repo().await, client(&server.uri()), ACCOUNT.to_string(), 300);
        let err = provider.get_valid_token().await.expect_err("must fail");
        assert!(matches!(err, SyncError::Auth(_)));
    }
}
