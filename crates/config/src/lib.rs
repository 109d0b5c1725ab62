//! Vendor profile loading for the platwrap CLI.
//!
//! A profile is a YAML document describing the branded application, its API
//! endpoints, and the hosted service it fronts. The embedded default is used
//! unless `CLI_CONFIG_FILE` points at another file.
//!
//! Loading proceeds in four steps: static defaults, YAML decode, field
//! validation, then derived defaults. The raw bytes are kept so the
//! document can be handed to the agent unchanged.

mod atomic;
mod context;
mod paths;
mod schema;
mod user_agent;
pub mod validator;
pub mod version;

pub use atomic::write_atomic;
pub use context::RequestContext;
pub use paths::home_dir;
pub use schema::{
    ApiConfig, ApplicationConfig, Config, DetectionConfig, Metadata, ServiceConfig, SshConfig,
    UpdatesConfig, WrapperConfig, DEFAULT_USER_AGENT,
};
pub use user_agent::uname;
pub use validator::{FieldError, ValidationErrors};

use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming an alternative profile file.
pub const CONFIG_FILE_ENV: &str = "CLI_CONFIG_FILE";

/// The default profile compiled into the binary.
pub const EMBEDDED_CONFIG: &[u8] = include_bytes!("../config.yaml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("home directory not found")]
    NoHomeDir,

    #[error("could not create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read the profile bytes: `CLI_CONFIG_FILE` when set, else the embedded default.
///
/// Returns the bytes along with the file they came from, if any.
pub fn load_yaml() -> Result<(Vec<u8>, Option<PathBuf>), ConfigError> {
    match std::env::var(CONFIG_FILE_ENV) {
        Ok(path) if !path.is_empty() => {
            let path = PathBuf::from(path);
            tracing::debug!(target: "platwrap::config", path = %path.display(), "Loading config file");
            let bytes = std::fs::read(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            Ok((bytes, Some(path)))
        }
        _ => Ok((EMBEDDED_CONFIG.to_vec(), None)),
    }
}

/// Parse and validate a profile from YAML bytes.
pub fn from_yaml(bytes: &[u8]) -> Result<Config, ConfigError> {
    let mut cfg: Config = serde_yaml::from_slice(bytes)?;
    cfg.apply_dynamic_defaults();
    validator::validate(&cfg)?;
    cfg.raw = bytes.to_vec();
    Ok(cfg)
}

/// Load the active profile, recording its source file.
pub fn load() -> Result<Config, ConfigError> {
    let (bytes, source) = load_yaml()?;
    let mut cfg = from_yaml(&bytes)?;
    cfg.source_file = source;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use platwrap_test_utils::{env_guard, set_env_var, TestFixture, TEST_CONFIG_YAML};

    #[test]
    fn embedded_profile_is_valid() {
        let cfg = from_yaml(EMBEDDED_CONFIG).expect("embedded profile");
        assert!(!cfg.application.executable.is_empty());
        assert_eq!(cfg.raw(), EMBEDDED_CONFIG);
    }

    #[test]
    fn static_and_dynamic_defaults_apply() {
        let cfg = from_yaml(TEST_CONFIG_YAML.as_bytes()).unwrap();
        assert_eq!(cfg.application.user_state_file, "state.json");
        assert!(cfg.updates.check);
        assert_eq!(cfg.updates.check_interval, 3600);
        assert_eq!(cfg.application.writable_user_dir, ".test-cli");
        assert_eq!(cfg.application.temp_sub_dir, "test-cli-tmp");
        assert_eq!(cfg.service.project_config_flavor, "platform");
        assert_eq!(cfg.api.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn explicit_values_beat_defaults() {
        let yaml = format!(
            "{TEST_CONFIG_YAML}updates:\n  check: false\n  check_interval: 60\n"
        );
        let cfg = from_yaml(yaml.as_bytes()).unwrap();
        assert!(!cfg.updates.check);
        assert_eq!(cfg.updates.check_interval, 60);
    }

    #[test]
    fn missing_required_field_is_reported() {
        let yaml = TEST_CONFIG_YAML.replace("  env_prefix: TEST_CLI_\n", "");
        let err = from_yaml(yaml.as_bytes()).unwrap_err();
        assert!(err
            .to_string()
            .contains("Field validation for 'application.env_prefix' failed on the 'required' tag"));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = from_yaml(b"application: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
        assert!(err.to_string().starts_with("invalid config YAML"));
    }

    #[test]
    fn metadata_timestamps_parse() {
        let yaml = format!(
            "{TEST_CONFIG_YAML}metadata:\n  version: 1.0.1\n  updated_at: 2024-05-01T10:00:00Z\n  url: https://example.com/config.yaml\n"
        );
        let cfg = from_yaml(yaml.as_bytes()).unwrap();
        assert_eq!(cfg.metadata.version, "1.0.1");
        assert_eq!(
            cfg.metadata.updated_at.map(|t| t.unix_timestamp()),
            Some(1_714_557_600)
        );
        assert!(cfg.metadata.downloaded_at.is_none());
    }

    #[test]
    fn load_prefers_config_file_env() {
        let _g = env_guard();
        let fixture = TestFixture::new().unwrap();
        let _env = set_env_var(
            CONFIG_FILE_ENV,
            Some(&fixture.config_path.to_string_lossy()),
        );
        let cfg = load().unwrap();
        assert_eq!(cfg.application.name, "Test CLI");
        assert_eq!(cfg.source_file.as_deref(), Some(fixture.config_path.as_path()));
    }

    #[test]
    fn load_falls_back_to_embedded() {
        let _g = env_guard();
        let _env = set_env_var(CONFIG_FILE_ENV, None);
        let cfg = load().unwrap();
        assert!(cfg.source_file.is_none());
        assert_eq!(cfg.raw(), EMBEDDED_CONFIG);
    }

    #[test]
    fn load_reports_missing_file() {
        let _g = env_guard();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("platwrap.yaml");
        let _env = set_env_var(CONFIG_FILE_ENV, Some(&missing.to_string_lossy()));
        assert!(matches!(load(), Err(ConfigError::Read { .. })));
    }
}
