use std::path::{Path, PathBuf};

use platwrap_config::CONFIG_FILE_ENV;
use serde_yaml::Value;

use crate::fs::write_file;
use crate::AltError;

/// An alternate CLI instance: a profile plus a launcher that selects it.
#[derive(Debug, Clone)]
pub struct Alt {
    exec_path: PathBuf,
    comment: String,
    target: String,
    config_path: PathBuf,
    config: Value,
    head_comment: Option<String>,
}

impl Alt {
    /// `target` is the program the launcher runs; `comment` is written at
    /// the top of the launcher.
    pub fn new(
        exec_path: impl Into<PathBuf>,
        comment: impl Into<String>,
        target: impl Into<String>,
        config_path: impl Into<PathBuf>,
        config: Value,
    ) -> Self {
        Self {
            exec_path: exec_path.into(),
            comment: comment.into(),
            target: target.into(),
            config_path: config_path.into(),
            config,
            head_comment: None,
        }
    }

    /// Comment to place above the profile document.
    pub fn with_head_comment(mut self, comment: impl Into<String>) -> Self {
        self.head_comment = Some(comment.into());
        self
    }

    pub fn exec_path(&self) -> &Path {
        &self.exec_path
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Write the profile, then the launcher.
    pub fn generate_and_save(&self) -> Result<(), AltError> {
        let mut content = String::new();
        if let Some(comment) = &self.head_comment {
            for line in comment.lines() {
                content.push_str(&format!("# {line}\n"));
            }
        }
        content.push_str(&serde_yaml::to_string(&self.config).map_err(AltError::Encode)?);
        write_file(&self.config_path, content.as_bytes(), Some(0o755), 0o644)?;
        write_file(
            &self.exec_path,
            self.launcher_script().as_bytes(),
            Some(0o755),
            0o755,
        )
    }

    /// The launcher text for the current platform.
    pub fn launcher_script(&self) -> String {
        let config_path = format_config_path(&self.config_path.to_string_lossy());
        if cfg!(windows) {
            format!(
                ":: {comment}\r\n@echo off\r\nsetlocal\r\nset {CONFIG_FILE_ENV}={config_path}\r\n{target} %*\r\nendlocal\r\n",
                comment = self.comment,
                target = self.target,
            )
        } else {
            format!(
                "#!/bin/sh\n# {comment}\nexport {CONFIG_FILE_ENV}={config_path}\n{target} \"$@\"\n",
                comment = self.comment,
                target = self.target,
            )
        }
    }
}

/// Render a profile path for the launcher, relative to a well-known
/// directory variable when possible.
fn format_config_path(config_path: &str) -> String {
    if cfg!(windows) {
        return match std::env::var("AppData") {
            Ok(app_data) if !app_data.is_empty() && config_path.starts_with(&app_data) => {
                format!("%AppData%{}", &config_path[app_data.len()..])
            }
            _ => config_path.to_string(),
        };
    }
    for var in ["XDG_CONFIG_HOME", "HOME"] {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() && config_path.starts_with(&value) {
                return format!("\"${{{var}}}{}\"", &config_path[value.len()..]);
            }
        }
    }
    format!("\"{config_path}\"")
}

/// File extension for launchers on this platform.
pub fn executable_extension() -> &'static str {
    if cfg!(windows) {
        ".bat"
    } else {
        ""
    }
}
