//! Outbound path: posting activities back to the conversation.
//!
//! Replies go to `{serviceUrl}/v3/conversations/{conversationId}/activities`
//! (or `…/activities/{replyToId}` when replying to a specific activity),
//! authorised with a bot-service token obtained through the client
//! credentials grant. A bot without an app id (local emulator) sends no
//! `Authorization` header.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Url;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{BotCredentials, ConnectorConfig};
use crate::error::AppError;

use super::activity::{Activity, ResourceResponse};

/// Tokens are renewed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// A boxed future returned by [`ActivitySender::send`].
pub type SendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ResourceResponse, AppError>> + Send + 'a>>;

/// Delivers a fully-addressed activity to its conversation.
pub trait ActivitySender: Send + Sync {
    fn send<'a>(&'a self, activity: &'a Activity) -> SendFuture<'a>;
}

// ── Credentials ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Bot application credentials and the cached bot-service token.
pub struct AppCredentials {
    app_id: String,
    app_password: Option<String>,
    token_endpoint: String,
    scope: String,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl AppCredentials {
    pub fn new(credentials: &BotCredentials, connector: &ConnectorConfig, http: reqwest::Client) -> Self {
        let tenant = credentials
            .tenant_id
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&connector.default_tenant);
        Self {
            app_id: credentials.app_id.clone(),
            app_password: credentials.app_password.clone(),
            token_endpoint: format!("{}/{tenant}/oauth2/v2.0/token", connector.login_authority),
            scope: connector.scope.clone(),
            http,
            cached: Mutex::new(None),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.app_id.trim().is_empty()
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Bearer token for the connector, `None` for an anonymous bot.
    pub async fn access_token(&self) -> Result<Option<String>, AppError> {
        if self.is_anonymous() {
            return Ok(None);
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(Some(token.access_token.clone()));
            }
        }

        let password = self
            .app_password
            .as_deref()
            .ok_or_else(|| AppError::Connector("MicrosoftAppPassword is not set".into()))?;

        debug!(endpoint = %self.token_endpoint, "requesting bot service token");
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.app_id.as_str()),
                ("client_secret", password),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Connector(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });

        Ok(Some(token.access_token))
    }
}

// ── Connector client ──────────────────────────────────────────────────────────

/// REST client for the bot connector service.
pub struct ConnectorClient {
    http: reqwest::Client,
    credentials: Arc<AppCredentials>,
}

impl ConnectorClient {
    pub fn new(http: reqwest::Client, credentials: Arc<AppCredentials>) -> Self {
        Self { http, credentials }
    }

    /// Build an HTTP client with the configured request timeout.
    pub fn http_client(config: &ConnectorConfig) -> Result<reqwest::Client, AppError> {
        reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Connector(format!("cannot build http client: {e}")))
    }

    async fn post_activity(&self, activity: &Activity) -> Result<ResourceResponse, AppError> {
        let url = activities_url(activity)?;
        let mut request = self.http.post(url.clone()).json(activity);
        if let Some(token) = self.credentials.access_token().await? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(%url, %status, "connector rejected activity");
            return Err(AppError::Connector(format!("POST {url} returned {status}: {body}")));
        }

        if body.trim().is_empty() {
            return Ok(ResourceResponse::default());
        }
        serde_json::from_str(&body)
            .map_err(|e| AppError::Connector(format!("invalid connector response: {e}")))
    }
}

impl ActivitySender for ConnectorClient {
    fn send<'a>(&'a self, activity: &'a Activity) -> SendFuture<'a> {
        Box::pin(self.post_activity(activity))
    }
}

/// Connector endpoint for `activity`, which must already be addressed.
pub fn activities_url(activity: &Activity) -> Result<Url, AppError> {
    let service_url = activity
        .service_url
        .as_deref()
        .ok_or_else(|| AppError::Connector("activity has no serviceUrl".into()))?;
    let conversation_id = activity
        .conversation_id()
        .ok_or_else(|| AppError::Connector("activity has no conversation id".into()))?;

    let mut url = Url::parse(service_url)
        .map_err(|e| AppError::Connector(format!("invalid serviceUrl '{service_url}': {e}")))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| AppError::Connector(format!("serviceUrl '{service_url}' cannot be a base")))?;
        segments
            .pop_if_empty()
            .extend(["v3", "conversations", conversation_id, "activities"]);
        if let Some(reply_to) = activity.reply_to_id.as_deref().filter(|r| !r.is_empty()) {
            segments.push(reply_to);
        }
    }
    Ok(url)
}
