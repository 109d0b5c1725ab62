//! Project digest: a compact summary of a repository sent as AI input.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use platwrap_config::Config;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::InitError;

/// Maximum directory depth when walking the repository.
const MAX_SCAN_DEPTH: usize = 8;
/// Maximum number of paths listed in the digest.
const MAX_LISTED_FILES: usize = 500;
/// Maximum bytes kept from each manifest file.
const MAX_MANIFEST_BYTES: usize = 8 * 1024;

const LANGUAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "Rust"),
    ("py", "Python"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("mjs", "JavaScript"),
    ("go", "Go"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("cs", "C#"),
    ("ex", "Elixir"),
    ("exs", "Elixir"),
    ("scala", "Scala"),
    ("c", "C"),
    ("cpp", "C++"),
    ("swift", "Swift"),
    ("lua", "Lua"),
];

/// Files whose content says how a project is built and run.
const MANIFEST_FILES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "composer.json",
    "pyproject.toml",
    "requirements.txt",
    "Pipfile",
    "go.mod",
    "Gemfile",
    "pom.xml",
    "build.gradle",
    "mix.exs",
    "Dockerfile",
    "docker-compose.yml",
    "Procfile",
];

/// Directories to skip during analysis.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "vendor",
    "venv",
    "__pycache__",
    "coverage",
    "_www",
];

/// Produces the digest sent to the configuration service.
pub trait DigestProvider: Send + Sync {
    fn digest(&self, root: &Path) -> Result<serde_json::Value, InitError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    /// File count per language.
    pub languages: BTreeMap<String, usize>,
    /// Repository-relative paths, sorted and capped.
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub files_truncated: bool,
    /// Manifest path to (possibly truncated) content.
    pub manifests: BTreeMap<String, String>,
}

/// Default digest built from a walk of the working tree.
#[derive(Debug, Clone)]
pub struct FileTreeDigest {
    ignore: Vec<String>,
}

impl FileTreeDigest {
    /// Skips the service's own project config directory besides the usual
    /// dependency and build output directories.
    pub fn new(cnf: &Config) -> Self {
        let mut ignore = vec![".platform".to_string()];
        if !cnf.service.project_config_dir.is_empty() {
            ignore.push(cnf.service.project_config_dir.clone());
        }
        Self { ignore }
    }

    pub fn build(&self, root: &Path) -> Digest {
        let mut digest = Digest::default();
        let walker = WalkDir::new(root)
            .max_depth(MAX_SCAN_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                if self.ignore.iter().any(|i| i == name.as_ref()) {
                    return false;
                }
                if e.file_type().is_dir() {
                    return !name.starts_with('.') && !SKIP_DIRS.contains(&name.as_ref());
                }
                true
            })
            .filter_map(|e| e.ok());

        for entry in walker {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");

            if let Some(lang) = language_of(entry.path()) {
                *digest.languages.entry(lang.to_string()).or_default() += 1;
            }
            let file_name = entry.file_name().to_string_lossy();
            if MANIFEST_FILES.contains(&file_name.as_ref()) {
                match read_truncated(entry.path()) {
                    Ok(content) => {
                        digest.manifests.insert(rel.clone(), content);
                    }
                    Err(e) => {
                        tracing::debug!(target: "platwrap::init", error = %e, path = %entry.path().display(), "Could not read manifest");
                    }
                }
            }
            if digest.files.len() < MAX_LISTED_FILES {
                digest.files.push(rel);
            } else {
                digest.files_truncated = true;
            }
        }
        digest
    }
}

impl DigestProvider for FileTreeDigest {
    fn digest(&self, root: &Path) -> Result<serde_json::Value, InitError> {
        serde_json::to_value(self.build(root)).map_err(InitError::Encode)
    }
}

fn language_of(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    LANGUAGE_EXTENSIONS
        .iter()
        .find(|(e, _)| ext.eq_ignore_ascii_case(e))
        .map(|(_, lang)| *lang)
}

fn read_truncated(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    let end = bytes.len().min(MAX_MANIFEST_BYTES);
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}
