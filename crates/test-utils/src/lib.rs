//! Shared test utilities for platwrap crates.
//!
//! Provides env-var guards plus a scratch home directory with a vendor
//! profile that validates, so each crate can build a `Config` without
//! touching the real user environment.

use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};

/// Environment prefix used by [`TEST_CONFIG_YAML`].
pub const TEST_ENV_PREFIX: &str = "TEST_CLI_";

/// A vendor profile that passes validation.
///
/// Metadata is left empty so auto-update tests can fill it in.
pub const TEST_CONFIG_YAML: &str = r#"application:
  name: Test CLI
  slug: test-cli
  executable: test
  env_prefix: TEST_CLI_
  user_config_dir: .test-cli

api:
  base_url: https://api.cli.example.com
  auth_url: https://auth.cli.example.com

detection:
  git_remote_name: test
  site_domains:
    - cli.example.site

service:
  name: Test
  slug: test
  env_prefix: TEST_
  project_config_dir: .test

ssh:
  domain_wildcards:
    - "*.cli.example.com"
"#;

/// Serialize tests that mutate process-global state (env vars, cwd, etc).
///
/// Acquire this guard at the start of any test that modifies environment
/// variables to prevent race conditions between parallel tests.
pub fn env_guard() -> MutexGuard<'static, ()> {
    static TEST_SERIAL: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// RAII guard for environment variables - restores original value on drop.
pub struct EnvVarGuard {
    key: &'static str,
    previous: Option<String>,
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        if let Some(v) = &self.previous {
            std::env::set_var(self.key, v);
        } else {
            std::env::remove_var(self.key);
        }
    }
}

/// Set an environment variable and return a guard that restores the original on drop.
///
/// # Example
/// ```
/// let _guard = platwrap_test_utils::set_env_var("MY_VAR", Some("value"));
/// // MY_VAR is set to "value" until _guard drops
/// ```
pub fn set_env_var(key: &'static str, value: Option<&str>) -> EnvVarGuard {
    let previous = std::env::var(key).ok();
    if let Some(val) = value {
        std::env::set_var(key, val);
    } else {
        std::env::remove_var(key);
    }
    EnvVarGuard { key, previous }
}

/// Scratch home directory holding a vendor profile.
///
/// The tempdir is removed when this struct is dropped.
pub struct TestFixture {
    pub tempdir: tempfile::TempDir,
    /// Location of the profile written by [`TestFixture::new`].
    pub config_path: PathBuf,
}

impl TestFixture {
    /// Create a fixture with `TEST_CONFIG_YAML` written to `config.yaml`.
    ///
    /// Does NOT set HOME; use `home_guard()` for that.
    pub fn new() -> std::io::Result<Self> {
        Self::with_config(TEST_CONFIG_YAML)
    }

    /// Create a fixture holding the given profile text.
    pub fn with_config(yaml: &str) -> std::io::Result<Self> {
        let tempdir = tempfile::tempdir()?;
        let config_path = tempdir.path().join("config.yaml");
        std::fs::write(&config_path, yaml)?;
        Ok(Self {
            tempdir,
            config_path,
        })
    }

    /// Get the path that should be set as HOME.
    pub fn home_path(&self) -> &Path {
        self.tempdir.path()
    }

    /// Create an RAII guard that sets HOME to this fixture's temp directory.
    pub fn home_guard(&self) -> EnvVarGuard {
        set_env_var("HOME", Some(&self.home_path().to_string_lossy()))
    }

    /// Write a file relative to the fixture root, creating parents.
    pub fn write_file(&self, rel: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.tempdir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_guard_serializes_tests() {
        let _g = env_guard();
    }

    #[test]
    fn test_set_env_var_sets_and_restores() {
        let _g = env_guard();

        const KEY: &str = "PLATWRAP_TEST_UTILS_TEST_VAR";
        std::env::remove_var(KEY);

        {
            let _guard = set_env_var(KEY, Some("test_value"));
            assert_eq!(std::env::var(KEY).ok(), Some("test_value".to_string()));
        }
        assert!(std::env::var(KEY).is_err());
    }

    #[test]
    fn test_set_env_var_removes_when_none() {
        let _g = env_guard();

        const KEY: &str = "PLATWRAP_TEST_REMOVE_VAR";
        std::env::set_var(KEY, "exists");

        {
            let _guard = set_env_var(KEY, None);
            assert!(std::env::var(KEY).is_err());
        }
        assert_eq!(std::env::var(KEY).ok(), Some("exists".to_string()));

        std::env::remove_var(KEY);
    }

    #[test]
    fn test_fixture_writes_profile() {
        let fixture = TestFixture::new().expect("fixture creation");
        let text = std::fs::read_to_string(&fixture.config_path).expect("read profile");
        assert!(text.contains("env_prefix: TEST_CLI_"));
        assert!(fixture.config_path.starts_with(fixture.home_path()));
    }

    #[test]
    fn test_fixture_write_file_creates_parents() {
        let fixture = TestFixture::new().expect("fixture creation");
        let path = fixture
            .write_file("a/b/c.txt", "hello")
            .expect("write nested file");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
