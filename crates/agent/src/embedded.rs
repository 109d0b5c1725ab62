//! Files compiled into the wrapper and unpacked into the cache directory.
//!
//! The archives directory holds placeholders in source checkouts; release
//! builds replace them before compiling.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

static AGENT_BUNDLE: &[u8] = include_bytes!("../archives/agent.bundle");

#[cfg(not(windows))]
static INTERPRETER: &[u8] = include_bytes!("../archives/interpreter");

#[cfg(windows)]
static INTERPRETER: &[u8] = include_bytes!("../archives/interpreter.exe");

#[cfg(windows)]
static CA_CERT: &[u8] = include_bytes!("../archives/cacert.pem");

/// Checksum of the interpreter binary, injected at build time.
const INTERPRETER_SHA256: Option<&str> = option_env!("PLATWRAP_INTERPRETER_SHA256");

/// One file to place under the cache directory.
#[derive(Debug, Clone)]
pub struct EmbeddedFile {
    /// Path relative to the cache directory.
    pub rel_path: PathBuf,
    pub bytes: Cow<'static, [u8]>,
    pub mode: u32,
    /// Hex SHA-256 the written file must have, if known.
    pub expected_sha256: Option<String>,
}

impl EmbeddedFile {
    pub fn new(rel_path: impl Into<PathBuf>, bytes: impl Into<Cow<'static, [u8]>>, mode: u32) -> Self {
        Self {
            rel_path: rel_path.into(),
            bytes: bytes.into(),
            mode,
            expected_sha256: None,
        }
    }

    pub fn with_sha256(mut self, hash: impl Into<String>) -> Self {
        self.expected_sha256 = Some(hash.into());
        self
    }
}

/// Everything the agent needs in its cache directory, besides the profile.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bundle: Cow<'static, [u8]>,
    pub interpreter: Vec<EmbeddedFile>,
    /// Interpreter executable, relative to the cache directory.
    pub interpreter_path: PathBuf,
    /// Interpreter settings as `(name, path relative to the cache directory)`.
    pub settings: Vec<(String, PathBuf)>,
}

impl Payload {
    /// The payload compiled into this binary.
    #[cfg(not(windows))]
    pub fn embedded() -> Self {
        let mut interpreter = EmbeddedFile::new("interpreter", INTERPRETER, 0o755);
        if let Some(hash) = INTERPRETER_SHA256 {
            interpreter = interpreter.with_sha256(hash);
        }
        Self {
            bundle: Cow::Borrowed(AGENT_BUNDLE),
            interpreter: vec![interpreter],
            interpreter_path: PathBuf::from("interpreter"),
            settings: Vec::new(),
        }
    }

    /// The payload compiled into this binary.
    #[cfg(windows)]
    pub fn embedded() -> Self {
        let dir = Path::new("interpreter");
        let mut interpreter = EmbeddedFile::new(dir.join("interpreter.exe"), INTERPRETER, 0o755);
        if let Some(hash) = INTERPRETER_SHA256 {
            interpreter = interpreter.with_sha256(hash);
        }
        let ca_cert = dir.join("extras").join("cacert.pem");
        Self {
            bundle: Cow::Borrowed(AGENT_BUNDLE),
            interpreter: vec![interpreter, EmbeddedFile::new(&ca_cert, CA_CERT, 0o644)],
            interpreter_path: dir.join("interpreter.exe"),
            settings: vec![("openssl.cafile".to_string(), ca_cert)],
        }
    }

    /// True when release archives were not supplied at build time.
    pub fn is_placeholder(&self) -> bool {
        self.bundle.is_empty() || self.interpreter.iter().any(|f| f.bytes.is_empty())
    }

    /// Render settings as `name=<absolute path>` for the given cache directory.
    pub fn render_settings(&self, cache_dir: &Path) -> Vec<String> {
        self.settings
            .iter()
            .map(|(name, rel)| format!("{}={}", name, cache_dir.join(rel).display()))
            .collect()
    }
}
