//! Graph Authentication
//!
//! Client-credentials grant against the tenant's token endpoint. By default
//! a fresh token is requested on every call; an optional cache keeps the
//! last token until shortly before it expires.

use crate::config::SiteContext;
use crate::error::{ConnectorError, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Scope requested for application permissions
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Refresh cached tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// App credentials for one site context
#[derive(Clone)]
pub struct GraphCredentials {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    token_cache: Option<Arc<RwLock<Option<CachedToken>>>>,
}

impl GraphCredentials {
    pub fn new(http: reqwest::Client, login_base_url: &str, site: &SiteContext) -> Self {
        Self {
            http,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                login_base_url.trim_end_matches('/'),
                site.tenant_id
            ),
            client_id: site.client_id.clone(),
            client_secret: site.client_secret.clone(),
            token_cache: None,
        }
    }

    /// Keep tokens between calls until they are about to expire
    pub fn with_cache(mut self) -> Self {
        self.token_cache = Some(Arc::new(RwLock::new(None)));
        self
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        if let Some(cache) = &self.token_cache {
            let guard = cache.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let response = self.request_token().await?;

        if let Some(cache) = &self.token_cache {
            let ttl = Duration::from_secs(response.expires_in.unwrap_or(3600));
            let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);
            *cache.write().await = Some(CachedToken {
                token: response.access_token.clone(),
                expires_at,
            });
            tracing::debug!(
                "New token cached, expires in ~{} minutes",
                ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
            );
        }

        Ok(response.access_token)
    }

    /// Drop any cached token and fetch a new one
    pub async fn refresh_token(&self) -> Result<String> {
        if let Some(cache) = &self.token_cache {
            *cache.write().await = None;
        }
        self.get_token().await
    }

    async fn request_token(&self) -> Result<TokenResponse> {
        tracing::debug!("POST {}", self.token_url);

        let form = [
            ("grant_type", "client_credentials"),
            ("scope", GRAPH_SCOPE),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self.http.post(&self.token_url).form(&form).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                "Token request failed: {} - {}",
                status,
                super::http::sanitize_for_log(&body)
            );
            return Err(ConnectorError::Auth(format!("token endpoint returned {status}")));
        }

        serde_json::from_str(&body)
            .map_err(|e| ConnectorError::Auth(format!("unexpected token response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_token_validity() {
        let fresh = CachedToken {
            token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(fresh.is_valid());

        let stale = CachedToken {
            token: "t".into(),
            expires_at: Instant::now() - Duration::from_secs(1),
        };
        assert!(!stale.is_valid());
    }

    #[test]
    fn test_token_url() {
        let site = SiteContext {
            tenant_id: "tenant-1".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            site_id: "site".into(),
            list_id: "list".into(),
        };
        let creds = GraphCredentials::new(reqwest::Client::new(), "https://login.example/", &site);
        assert_eq!(creds.token_url, "https://login.example/tenant-1/oauth2/v2.0/token");
    }
}
