//! Analytics Authentication
//!
//! Tokens come from Application Default Credentials or an explicit
//! service-account key file, through `gcp_auth`. A fixed token can be
//! supplied instead (local proxies, tests).

use crate::error::{ConnectorError, Result};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Read-only access to reporting data
pub const ANALYTICS_SCOPES: &[&str] = &["https://www.googleapis.com/auth/analytics.readonly"];

/// Refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Assumed token lifetime when the provider does not say
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    Static(String),
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Credentials holder with token caching
#[derive(Clone)]
pub struct AnalyticsCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl AnalyticsCredentials {
    fn with_source(source: TokenSource) -> Self {
        Self {
            source,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Application Default Credentials
    pub async fn discover() -> Result<Self> {
        let provider = gcp_auth::provider().await.map_err(|e| {
            ConnectorError::Auth(format!(
                "no application default credentials ({e}); set GOOGLE_APPLICATION_CREDENTIALS"
            ))
        })?;
        Ok(Self::with_source(TokenSource::Provider(provider)))
    }

    /// Service-account key file
    pub fn from_file(path: &Path) -> Result<Self> {
        let account = CustomServiceAccount::from_file(path)
            .map_err(|e| ConnectorError::Auth(format!("{}: {e}", path.display())))?;
        Ok(Self::with_source(TokenSource::Provider(Arc::new(account))))
    }

    /// Key file when given, otherwise Application Default Credentials
    pub async fn resolve(credentials_file: Option<&Path>) -> Result<Self> {
        match credentials_file {
            Some(path) => Self::from_file(path),
            None => Self::discover().await,
        }
    }

    /// Fixed bearer token
    pub fn static_token(token: impl Into<String>) -> Self {
        Self::with_source(TokenSource::Static(token.into()))
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        let provider = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Provider(provider) => provider,
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = provider
            .token(ANALYTICS_SCOPES)
            .await
            .map_err(|e| ConnectorError::Auth(format!("failed to get access token: {e}")))?;
        let token = token.as_str().to_string();

        *self.token_cache.write().await = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER,
        });

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let creds = AnalyticsCredentials::static_token("abc");
        assert_eq!(creds.get_token().await.unwrap(), "abc");
    }

    #[test]
    fn test_missing_key_file() {
        let result = AnalyticsCredentials::from_file(Path::new("/nonexistent/key.json"));
        assert!(matches!(result, Err(ConnectorError::Auth(_))));
    }
}
