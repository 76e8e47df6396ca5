//! Credential lifecycle against the platform's connect-auth flow.
//!
//! One `Credential` slot per process, guarded by an async mutex that is held
//! across the login/refresh network call. Concurrent callers therefore wait
//! on the same exchange instead of racing their own (single-flight).

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{truncate_detail, PlatformError};
use crate::config::PlatformConfig;

/// Tokens within this window of expiry are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;
const TOKEN_CALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ACCESS_TTL_SECS: f64 = 600.0;
const DEFAULT_REFRESH_TTL_SECS: f64 = 86_400.0;

/// A live access/refresh token pair. Replaced atomically, never patched.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl Credential {
    fn access_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) < self.access_expires_at
    }

    fn refresh_fresh(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token.is_some()
            && now + Duration::seconds(EXPIRY_SKEW_SECS) < self.refresh_expires_at
    }
}

/// Wire shape of both the login and refresh exchanges.
#[derive(Debug, Deserialize)]
struct TokenExchange {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<f64>,
    refresh_expires_in: Option<f64>,
}

impl TokenExchange {
    fn into_credential(self, now: DateTime<Utc>) -> Credential {
        let access_ttl = self.expires_in.unwrap_or(DEFAULT_ACCESS_TTL_SECS);
        let refresh_ttl = self.refresh_expires_in.unwrap_or(DEFAULT_REFRESH_TTL_SECS);
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            issued_at: now,
            access_expires_at: now + Duration::milliseconds((access_ttl * 1000.0) as i64),
            refresh_expires_at: now + Duration::milliseconds((refresh_ttl * 1000.0) as i64),
        }
    }
}

/// Owns the process-wide credential slot.
pub struct TokenManager {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    client_id: String,
    client_secret: String,
    user_token: Option<String>,
    slot: Mutex<Option<Credential>>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, config: &PlatformConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            user_token: config.user_token.clone(),
            slot: Mutex::new(None),
        }
    }

    /// A valid access token, from cache when fresh.
    ///
    /// On expiry: refresh with the cached refresh token; if the refresh token
    /// is stale or the refresh call is rejected, fall back to one full login.
    /// Both failing surfaces `PlatformError::Auth`.
    pub async fn access_token(&self) -> Result<String, PlatformError> {
        let mut slot = self.slot.lock().await;
        let now = Utc::now();

        if let Some(cred) = slot.as_ref() {
            if cred.access_fresh(now) {
                return Ok(cred.access_token.clone());
            }
            if cred.refresh_fresh(now) {
                match self.refresh(cred).await {
                    Ok(renewed) => {
                        let token = renewed.access_token.clone();
                        *slot = Some(renewed);
                        return Ok(token);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "token refresh failed, falling back to login");
                    }
                }
            }
        }

        let fresh = self.login().await?;
        let token = fresh.access_token.clone();
        *slot = Some(fresh);
        Ok(token)
    }

    /// Report a 401 observed while holding `observed`. Clears the slot only
    /// if that token is still the cached one, so a racing caller that already
    /// replaced it does not lose the fresh credential.
    pub async fn invalidate(&self, observed: &str) {
        let mut slot = self.slot.lock().await;
        if slot
            .as_ref()
            .is_some_and(|c| c.access_token == observed)
        {
            tracing::info!("invalidating cached credential after auth failure");
            *slot = None;
        }
    }

    async fn login(&self) -> Result<Credential, PlatformError> {
        let url = format!("{}/connect-auth/v1/account/login", self.base_url);
        let mut payload = serde_json::json!({
            "api_key": self.api_key,
            "client_id": self.client_id,
            "client_secret": self.client_secret,
        });
        if let Some(user_token) = &self.user_token {
            payload["user_token"] = serde_json::Value::String(user_token.clone());
        }

        let response = self
            .http
            .post(&url)
            .timeout(std::time::Duration::from_secs(TOKEN_CALL_TIMEOUT_SECS))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PlatformError::Auth(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Auth(format!(
                "login rejected ({}): {}",
                status.as_u16(),
                truncate_detail(&body, 300)
            )));
        }

        let exchange: TokenExchange = response
            .json()
            .await
            .map_err(|e| PlatformError::Auth(format!("login response undecodable: {e}")))?;
        tracing::debug!("platform login succeeded");
        Ok(exchange.into_credential(Utc::now()))
    }

    async fn refresh(&self, current: &Credential) -> Result<Credential, PlatformError> {
        let refresh_token = current
            .refresh_token
            .as_ref()
            .ok_or_else(|| PlatformError::Auth("no refresh token cached".into()))?;

        let url = format!("{}/connect-auth/v1/account/refresh-token", self.base_url);
        let payload = serde_json::json!({
            "access_token": current.access_token,
            "refresh_token": refresh_token,
        });

        let response = self
            .http
            .post(&url)
            .timeout(std::time::Duration::from_secs(TOKEN_CALL_TIMEOUT_SECS))
            .bearer_auth(&current.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PlatformError::Transport(format!("refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api {
                status: status.as_u16(),
                detail: truncate_detail(&body, 300),
            });
        }

        let exchange: TokenExchange = response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(format!("refresh response undecodable: {e}")))?;
        tracing::debug!("platform token refreshed");
        Ok(exchange.into_credential(Utc::now()))
    }
}
