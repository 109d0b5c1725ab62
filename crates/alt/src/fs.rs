use std::fs;
use std::path::{Path, PathBuf};

use platwrap_config::{home_dir, write_atomic, Config};

use crate::path::in_path_value;
use crate::AltError;

/// Directory for alternate profiles: under the user config root when that
/// exists, else a hidden directory in the home directory.
pub fn find_config_dir(cnf: &Config) -> Result<PathBuf, AltError> {
    let config_root = dirs::config_dir().ok_or(AltError::NoConfigDir)?;
    if config_root.is_dir() {
        return Ok(config_root.join(alt_dir_name(cnf)));
    }
    Ok(home_dir()?.join(format!(".{}", alt_dir_name(cnf))))
}

/// Directory for launchers: the first per-user bin directory already on
/// `PATH`, else a fallback under the home directory.
pub fn find_bin_dir(cnf: &Config) -> Result<PathBuf, AltError> {
    let home = home_dir()?;
    let mut candidates = Vec::new();
    if cfg!(windows) {
        candidates.push(home.join("AppData").join("Local").join("Programs"));
    }
    candidates.push(home.join(".local").join("bin"));
    candidates.push(home.join("bin"));

    let path_value = std::env::var_os("PATH").unwrap_or_default();
    for candidate in candidates {
        if in_path_value(&candidate, &path_value) {
            return Ok(candidate);
        }
    }
    Ok(home.join(format!(".{}", alt_dir_name(cnf))).join("bin"))
}

fn alt_dir_name(cnf: &Config) -> String {
    format!("{}-alt", cnf.application.slug)
}

/// Replace `path` atomically with `content`.
///
/// When `dir_mode` is set the parent directory is created first. Modes are
/// ignored off Unix.
pub fn write_file(
    path: &Path,
    content: &[u8],
    dir_mode: Option<u32>,
    file_mode: u32,
) -> Result<(), AltError> {
    let write_err = |source| AltError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let (Some(mode), Some(parent)) = (dir_mode, path.parent()) {
        create_dir_all(parent, mode).map_err(write_err)?;
    }
    write_atomic(path, content, file_mode).map_err(write_err)?;
    tracing::debug!(target: "platwrap::alt", path = %path.display(), "Wrote file");
    Ok(())
}

#[cfg(unix)]
fn create_dir_all(dir: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(mode).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all(dir: &Path, _mode: u32) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}
