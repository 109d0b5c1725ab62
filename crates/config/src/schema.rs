//! Typed vendor profile.
//!
//! Every block uses `#[serde(default)]` so a partial document still parses;
//! required fields are enforced afterwards by [`crate::validator`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::OffsetDateTime;

/// Default user-agent template, expanded by [`Config::user_agent`].
pub const DEFAULT_USER_AGENT: &str = "{APP_NAME_DASH}/{VERSION} ({UNAME_S}; {UNAME_R})";

const DEFAULT_STATE_FILE: &str = "state.json";
const DEFAULT_CHECK_INTERVAL: u64 = 3600;
const DEFAULT_PROJECT_CONFIG_FLAVOR: &str = "platform";

/// The vendor profile driving every part of the wrapper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "WrapperConfig::is_empty")]
    pub wrapper: WrapperConfig,
    pub application: ApplicationConfig,
    pub updates: UpdatesConfig,
    pub api: ApiConfig,
    pub ssh: SshConfig,
    pub detection: DetectionConfig,
    pub service: ServiceConfig,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,

    /// Where this profile was read from. `None` for the embedded profile.
    #[serde(skip)]
    pub source_file: Option<PathBuf>,

    #[serde(skip)]
    pub(crate) raw: Vec<u8>,
}

impl PartialEq for Config {
    // The raw bytes are formatting detail; two profiles are equal when their
    // parsed content and origin match.
    fn eq(&self, other: &Self) -> bool {
        self.wrapper == other.wrapper
            && self.application == other.application
            && self.updates == other.updates
            && self.api == other.api
            && self.ssh == other.ssh
            && self.detection == other.detection
            && self.service == other.service
            && self.metadata == other.metadata
            && self.source_file == other.source_file
    }
}

impl Config {
    /// The document bytes this profile was parsed from.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Serialize the typed profile back to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Fill values that derive from other fields.
    pub(crate) fn apply_dynamic_defaults(&mut self) {
        if self.application.writable_user_dir.is_empty() {
            self.application.writable_user_dir = self.application.user_config_dir.clone();
        }
        if self.application.temp_sub_dir.is_empty() {
            self.application.temp_sub_dir = format!("{}-tmp", self.application.slug);
        }
    }
}

/// Packaging hints for the release pipeline. Stripped from fetched profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub homebrew_tap: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub github_repo: String,
}

impl WrapperConfig {
    pub fn is_empty(&self) -> bool {
        self.homebrew_tap.is_empty() && self.github_repo.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub slug: String,
    pub executable: String,
    pub env_prefix: String,
    /// Relative to the home directory.
    pub user_config_dir: String,
    pub user_state_file: String,
    /// Relative to the home directory. Defaults to `user_config_dir`.
    pub writable_user_dir: String,
    /// Defaults to `<slug>-tmp`.
    pub temp_sub_dir: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            slug: String::new(),
            executable: String::new(),
            env_prefix: String::new(),
            user_config_dir: String::new(),
            user_state_file: DEFAULT_STATE_FILE.to_string(),
            writable_user_dir: String::new(),
            temp_sub_dir: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatesConfig {
    pub check: bool,
    /// Seconds between checks.
    pub check_interval: u64,
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            check: true,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub oauth2_auth_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub oauth2_token_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub oauth2_revoke_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub certifier_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ai_url: String,
    pub enable_organizations: bool,
    pub user_agent: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub session_id: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_url: String::new(),
            oauth2_auth_url: String::new(),
            oauth2_token_url: String::new(),
            oauth2_revoke_url: String::new(),
            certifier_url: String::new(),
            ai_url: String::new(),
            enable_organizations: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            session_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub domain_wildcards: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub git_remote_name: String,
    pub site_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub slug: String,
    pub env_prefix: String,
    pub project_config_dir: String,
    pub project_config_flavor: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub console_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub docs_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            slug: String::new(),
            env_prefix: String::new(),
            project_config_dir: String::new(),
            project_config_flavor: DEFAULT_PROJECT_CONFIG_FLAVOR.to_string(),
            console_url: String::new(),
            docs_url: String::new(),
        }
    }
}

/// Provenance of a profile, used by the auto-updater.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub downloaded_at: Option<OffsetDateTime>,
    /// Where the auto-updater fetches fresh copies from.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.version.is_empty()
            && self.updated_at.is_none()
            && self.downloaded_at.is_none()
            && self.url.is_empty()
    }
}
