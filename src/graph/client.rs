//! Graph Client
//!
//! Main client for the document platform, combining authentication,
//! HTTP functionality and the site context every request is scoped to.

use super::auth::GraphCredentials;
use super::http::{GraphHttpClient, Reply};
use crate::config::{GraphSettings, SiteContext};
use crate::error::Result;
use serde_json::Value;

/// Main Graph client
#[derive(Clone)]
pub struct GraphClient {
    pub credentials: GraphCredentials,
    pub http: GraphHttpClient,
    pub site: SiteContext,
    pub settings: GraphSettings,
}

impl GraphClient {
    /// Create a client for an explicit site context
    pub fn new(settings: GraphSettings, site: SiteContext) -> Result<Self> {
        let http = GraphHttpClient::new()?;

        let mut credentials =
            GraphCredentials::new(http.inner().clone(), &settings.login_base_url, &site);
        if settings.cache_tokens {
            credentials = credentials.with_cache();
        }

        Ok(Self {
            credentials,
            http,
            site,
            settings,
        })
    }

    /// Create a client for `group` (or the default site) from the environment
    pub fn from_env(settings: GraphSettings, group: Option<&str>) -> Result<Self> {
        let site = settings.site_context(group)?;
        Self::new(settings, site)
    }

    /// Get an access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    pub async fn get_reply(&self, url: &str) -> Result<Reply> {
        let token = self.get_token().await?;
        self.http.get_reply(url, &token).await
    }

    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Reply> {
        let token = self.get_token().await?;
        self.http.post(url, &token, body).await
    }

    pub async fn patch(&self, url: &str, body: &Value) -> Result<Reply> {
        let token = self.get_token().await?;
        self.http.patch(url, &token, body).await
    }

    pub async fn delete(&self, url: &str) -> Result<Reply> {
        let token = self.get_token().await?;
        self.http.delete(url, &token).await
    }

    /// Switch to another group's site context
    pub fn switch_group(&mut self, group: Option<&str>) -> Result<()> {
        *self = Self::from_env(self.settings.clone(), group)?;
        Ok(())
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    pub fn base_url(&self) -> &str {
        self.settings.graph_base_url.trim_end_matches('/')
    }

    /// `{base}/sites/{site_id}/{path}`
    pub fn site_url(&self, path: &str) -> String {
        format!("{}/sites/{}/{}", self.base_url(), self.site.site_id, path)
    }

    /// `{base}/sites/{site_id}/lists/{list_id}/{path}`
    pub fn list_url(&self, path: &str) -> String {
        self.site_url(&format!("lists/{}/{}", self.site.list_id, path))
    }

    /// Path-addressed drive item: `.../drive/root:/{folder}/{name}:`
    pub fn drive_path_url(&self, folder: Option<&str>, name: &str) -> String {
        let mut path = String::from("drive/root:");
        if let Some(folder) = folder {
            path.push_str(&encode_path(folder));
        }
        path.push('/');
        path.push_str(&urlencoding::encode(name));
        path.push(':');
        self.site_url(&path)
    }

    /// Path-addressed folder: `.../drive/root:/{folder}:`
    pub fn drive_folder_url(&self, folder: &str) -> String {
        self.site_url(&format!("drive/root:{}:", encode_path(folder)))
    }

    /// Id-addressed drive item: `.../drive/items/{id}`
    pub fn drive_item_url(&self, item_id: &str) -> String {
        self.site_url(&format!("drive/items/{item_id}"))
    }

    /// Shared-link lookup: `{base}/shares/{token}/driveItem`
    pub fn share_url(&self, share_token: &str) -> String {
        format!("{}/shares/{}/driveItem", self.base_url(), share_token)
    }

    /// Tenant-level resource: `{base}/{path}`
    pub fn graph_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path)
    }
}

/// Percent-encode each segment of a folder path, keeping the separators.
/// The result starts with `/` and has no trailing slash.
fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| format!("/{}", urlencoding::encode(s)))
        .collect()
}
