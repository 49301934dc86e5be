//! Configuration Management
//!
//! Non-secret settings live in a JSON file (`config.json` under the user's
//! config directory, or a path given on the command line). Credentials are
//! always read from the environment, looked up by name prefix.

use crate::error::{ConnectorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_ANALYTICS_BASE_URL: &str = "https://analyticsdata.googleapis.com";
pub const DEFAULT_ROSTER_PATH: &str = "Shared Document/All Employee/All Staff.csv";
pub const DEFAULT_AUDIT_PATH: &str =
    "Shared Document/Reporting and Data Management/Connector Log/Microsoft Graph API log.xlsx";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub sql: SqlSettings,
}

/// Document-platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub graph_base_url: String,
    pub login_base_url: String,
    /// Named groups whose site, list and app credentials come from
    /// `{env_prefix}_SITE_ID`, `{env_prefix}_LIST_ID`, ...
    pub groups: Vec<GroupProfile>,
    /// Roster CSV (`email`, `object_id`) used to resolve identities
    pub roster_path: String,
    pub audit: AuditSettings,
    /// Reuse tokens until shortly before expiry instead of fetching per call
    pub cache_tokens: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            login_base_url: DEFAULT_LOGIN_BASE_URL.to_string(),
            groups: Vec::new(),
            roster_path: DEFAULT_ROSTER_PATH.to_string(),
            audit: AuditSettings::default(),
            cache_tokens: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupProfile {
    pub name: String,
    pub env_prefix: String,
}

/// Where mutating operations are recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    pub enabled: bool,
    pub file_path: String,
    pub sheet: String,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            file_path: DEFAULT_AUDIT_PATH.to_string(),
            sheet: crate::codec::DEFAULT_SHEET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub base_url: String,
    pub property_id: Option<String>,
    /// Service-account key file; Application Default Credentials when unset
    pub credentials_file: Option<PathBuf>,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ANALYTICS_BASE_URL.to_string(),
            property_id: None,
            credentials_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlSettings {
    /// Environment prefix used when no connection is named
    pub default_connection: String,
}

impl Default for SqlSettings {
    fn default() -> Self {
        Self {
            default_connection: "mysql".to_string(),
        }
    }
}

/// Site, list and app registration one Graph client works against
#[derive(Clone)]
pub struct SiteContext {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub site_id: String,
    pub list_id: String,
}

impl std::fmt::Debug for SiteContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteContext")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("site_id", &self.site_id)
            .field("list_id", &self.list_id)
            .finish()
    }
}

impl GraphSettings {
    /// Build the site context for `group` from the environment.
    ///
    /// Base values come from `TENANT_ID`, `CLIENT_ID`, `CLIENT_SECRET`,
    /// `SITE_ID` and `LIST_ID`; a configured group overrides any of them
    /// with its prefixed variables when those are set.
    pub fn site_context(&self, group: Option<&str>) -> Result<SiteContext> {
        let mut ctx = SiteContext {
            tenant_id: require_env("TENANT_ID")?,
            client_id: require_env("CLIENT_ID")?,
            client_secret: require_env("CLIENT_SECRET")?,
            site_id: require_env("SITE_ID")?,
            list_id: require_env("LIST_ID")?,
        };

        let Some(group) = group else {
            return Ok(ctx);
        };

        let Some(profile) = self.groups.iter().find(|p| p.name == group) else {
            tracing::warn!("Unknown group '{}', using default site", group);
            return Ok(ctx);
        };

        let prefix = profile.env_prefix.to_uppercase();
        let overrides = [
            ("SITE_ID", &mut ctx.site_id),
            ("LIST_ID", &mut ctx.list_id),
            ("CLIENT_ID", &mut ctx.client_id),
            ("CLIENT_SECRET", &mut ctx.client_secret),
        ];
        for (key, slot) in overrides {
            if let Some(value) = env_value(&format!("{prefix}_{key}")) {
                *slot = value;
            }
        }

        tracing::debug!("Using site context for group '{}'", group);
        Ok(ctx)
    }
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dataconnect").join("config.json"))
    }

    /// Load configuration from the default location; defaults when missing
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from an explicit file; errors are reported
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ConnectorError::Config(format!("{}: {e}", path.display())))
    }
}

/// Read an environment variable, trying the upper-case name then the
/// lower-case one. Empty values count as unset.
pub fn env_value(name: &str) -> Option<String> {
    [name.to_uppercase(), name.to_lowercase()]
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .filter(|v| !v.is_empty())
}

pub fn require_env(name: &str) -> Result<String> {
    env_value(name).ok_or_else(|| ConnectorError::Config(format!("environment variable {name} is not set")))
}
