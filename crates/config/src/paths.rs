//! Directories derived from the profile and environment.

use crate::{Config, ConfigError};
use std::path::{Path, PathBuf};

/// Returns the user's home directory.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    #[cfg(unix)]
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    dirs::home_dir().ok_or(ConfigError::NoHomeDir)
}

impl Config {
    /// Read `<env_prefix><name>` from the environment, ignoring empty values.
    pub fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}{}", self.application.env_prefix, name))
            .ok()
            .filter(|v| !v.is_empty())
    }

    /// True when `<env_prefix><name>` is `1` or `true`.
    pub fn env_flag(&self, name: &str) -> bool {
        self.env_var(name)
            .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Home directory, overridable with `<env_prefix>HOME`.
    pub fn home_dir(&self) -> Result<PathBuf, ConfigError> {
        match self.env_var("HOME") {
            Some(home) => Ok(PathBuf::from(home)),
            None => home_dir(),
        }
    }

    /// The per-user writable directory, created with owner-only access.
    pub fn writable_user_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = self
            .home_dir()?
            .join(&self.application.writable_user_dir);
        create_private_dir(&dir)?;
        Ok(dir)
    }

    /// Root for temporary and cache files: `<env_prefix>TMP` or the system temp dir.
    pub fn cache_root(&self) -> PathBuf {
        match self.env_var("TMP") {
            Some(tmp) => PathBuf::from(tmp),
            None => std::env::temp_dir(),
        }
    }

    /// The wrapper's own temporary directory under [`Config::cache_root`].
    pub fn temp_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = self.cache_root().join(&self.application.temp_sub_dir);
        create_private_dir(&dir)?;
        Ok(dir)
    }

    /// Location of the persisted user state document.
    pub fn state_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self
            .writable_user_dir()?
            .join(&self.application.user_state_file))
    }
}

fn create_private_dir(path: &Path) -> Result<(), ConfigError> {
    if path.is_dir() {
        return Ok(());
    }
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(path)
        .map_err(|source| ConfigError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use crate::from_yaml;
    use platwrap_test_utils::{env_guard, set_env_var, TestFixture, TEST_CONFIG_YAML};

    #[test]
    fn prefixed_home_overrides_home() {
        let _g = env_guard();
        let fixture = TestFixture::new().unwrap();
        let _home = set_env_var("HOME", Some("/nonexistent-home"));
        let _prefixed = set_env_var(
            "TEST_CLI_HOME",
            Some(&fixture.home_path().to_string_lossy()),
        );
        let cfg = from_yaml(TEST_CONFIG_YAML.as_bytes()).unwrap();
        assert_eq!(cfg.home_dir().unwrap(), fixture.home_path());
    }

    #[test]
    fn writable_user_dir_is_created_private() {
        let _g = env_guard();
        let fixture = TestFixture::new().unwrap();
        let _home = fixture.home_guard();
        let _prefixed = set_env_var("TEST_CLI_HOME", None);
        let cfg = from_yaml(TEST_CONFIG_YAML.as_bytes()).unwrap();

        let dir = cfg.writable_user_dir().unwrap();
        assert_eq!(dir, fixture.home_path().join(".test-cli"));
        assert!(dir.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
        assert_eq!(cfg.state_file().unwrap(), dir.join("state.json"));
    }

    #[test]
    fn temp_dir_honours_prefixed_tmp() {
        let _g = env_guard();
        let fixture = TestFixture::new().unwrap();
        let _tmp = set_env_var("TEST_CLI_TMP", Some(&fixture.home_path().to_string_lossy()));
        let cfg = from_yaml(TEST_CONFIG_YAML.as_bytes()).unwrap();

        assert_eq!(cfg.cache_root(), fixture.home_path());
        let dir = cfg.temp_dir().unwrap();
        assert_eq!(dir, fixture.home_path().join("test-cli-tmp"));
        assert!(dir.is_dir());
    }

    #[test]
    fn env_flag_accepts_one_and_true() {
        let _g = env_guard();
        let cfg = from_yaml(TEST_CONFIG_YAML.as_bytes()).unwrap();
        {
            let _v = set_env_var("TEST_CLI_NO_INTERACTION", Some("1"));
            assert!(cfg.env_flag("NO_INTERACTION"));
        }
        {
            let _v = set_env_var("TEST_CLI_NO_INTERACTION", Some("TRUE"));
            assert!(cfg.env_flag("NO_INTERACTION"));
        }
        {
            let _v = set_env_var("TEST_CLI_NO_INTERACTION", Some("0"));
            assert!(!cfg.env_flag("NO_INTERACTION"));
        }
        let _v = set_env_var("TEST_CLI_NO_INTERACTION", None);
        assert!(!cfg.env_flag("NO_INTERACTION"));
    }
}
