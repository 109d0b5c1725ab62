use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use platwrap_config::version::{AGENT_VERSION, INTERPRETER_VERSION, WRAPPER_VERSION};
use platwrap_config::{Config, CONFIG_FILE_ENV};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::embedded::Payload;
use crate::file::{sha256_file, write_if_changed};
use crate::lock::CacheLock;
use crate::AgentError;

/// Where a child stream goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputTarget {
    #[default]
    Inherit,
    Discard,
    Capture,
}

impl OutputTarget {
    fn stdio(self) -> Stdio {
        match self {
            OutputTarget::Inherit => Stdio::inherit(),
            OutputTarget::Discard => Stdio::null(),
            OutputTarget::Capture => Stdio::piped(),
        }
    }
}

/// One agent command.
#[derive(Debug, Clone, Default)]
pub struct AgentInvocation {
    pub args: Vec<String>,
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
    /// Force non-interactive mode for this call.
    pub disable_interaction: bool,
}

impl AgentInvocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn stdout(mut self, target: OutputTarget) -> Self {
        self.stdout = target;
        self
    }

    pub fn stderr(mut self, target: OutputTarget) -> Self {
        self.stderr = target;
        self
    }

    pub fn non_interactive(mut self) -> Self {
        self.disable_interaction = true;
        self
    }
}

/// Captured output of a successful agent command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs agent commands. Implemented by [`AgentWrapper`]; tests substitute fakes.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(
        &self,
        cancel: &CancellationToken,
        invocation: AgentInvocation,
    ) -> Result<AgentOutput, AgentError>;
}

/// Launches the embedded agent from a per-version cache directory.
#[derive(Debug, Clone)]
pub struct AgentWrapper {
    config: Arc<Config>,
    payload: Arc<Payload>,
    version: String,
    debug: bool,
    disable_interaction: bool,
    custom_bundle: Option<PathBuf>,
}

impl AgentWrapper {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            payload: Arc::new(Payload::embedded()),
            version: WRAPPER_VERSION.to_string(),
            debug: false,
            disable_interaction: false,
            custom_bundle: None,
        }
    }

    /// Replace the embedded payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Arc::new(payload);
        self
    }

    /// Version reported to the agent as the application version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_disable_interaction(mut self, disable: bool) -> Self {
        self.disable_interaction = disable;
        self
    }

    /// Run an agent bundle from disk instead of the embedded one.
    pub fn with_bundle_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_bundle = Some(path.into());
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// `<cache root>/<slug>-<agent version>-<interpreter version>`.
    pub fn cache_dir(&self) -> PathBuf {
        self.config.cache_root().join(format!(
            "{}-{}-{}",
            self.config.application.slug, AGENT_VERSION, INTERPRETER_VERSION
        ))
    }

    pub fn bundle_path(&self) -> PathBuf {
        match &self.custom_bundle {
            Some(path) => path.clone(),
            None => self
                .cache_dir()
                .join(format!("{}.bundle", self.config.application.executable)),
        }
    }

    pub fn interpreter_path(&self) -> PathBuf {
        self.cache_dir().join(&self.payload.interpreter_path)
    }

    /// The profile copy handed to the agent.
    pub fn config_path(&self) -> PathBuf {
        self.cache_dir().join("config.yaml")
    }

    /// Bring the cache directory up to date under the cache lock.
    pub async fn init(&self) -> Result<(), AgentError> {
        let cache_dir = self.cache_dir();
        let bundle_path = self.bundle_path();
        let custom = self.custom_bundle.is_some();
        let payload = self.payload.clone();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            materialise(&cache_dir, &bundle_path, custom, &payload, config.raw())
        })
        .await?
    }

    /// Arguments for the interpreter: settings, the bundle, then `args`.
    pub fn command_args(&self, args: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        for setting in self.payload.render_settings(&self.cache_dir()) {
            out.push("-d".to_string());
            out.push(setting);
        }
        out.push(self.bundle_path().display().to_string());
        out.extend(args.iter().cloned());
        out
    }

    /// Variables added on top of the inherited environment.
    pub fn child_env(&self, disable_interaction: bool) -> Vec<(String, String)> {
        let prefix = &self.config.application.env_prefix;
        let mut env = vec![
            (
                CONFIG_FILE_ENV.to_string(),
                self.config_path().display().to_string(),
            ),
            (format!("{prefix}UPDATES_CHECK"), "0".to_string()),
            (format!("{prefix}MIGRATE_CHECK"), "0".to_string()),
            (format!("{prefix}APPLICATION_PROMPT_SELF_INSTALL"), "0".to_string()),
            (format!("{prefix}WRAPPED"), "1".to_string()),
            (format!("{prefix}APPLICATION_VERSION"), self.version.clone()),
        ];
        if self.debug {
            env.push((format!("{prefix}CLI_DEBUG"), "1".to_string()));
        }
        if disable_interaction || self.disable_interaction {
            env.push((format!("{prefix}NO_INTERACTION"), "1".to_string()));
        }
        // Placeholders are expanded by the agent itself.
        env.push((
            format!("{prefix}USER_AGENT"),
            format!(
                "{{APP_NAME_DASH}}/{AGENT_VERSION} ({{UNAME_S}}; {{UNAME_R}}; INTERPRETER {INTERPRETER_VERSION}; WRAPPER {})",
                self.version
            ),
        ));
        env
    }

    /// Run an agent command, returning its output when it exits with code 0.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        invocation: AgentInvocation,
    ) -> Result<AgentOutput, AgentError> {
        self.init().await?;

        let mut cmd = Command::new(self.interpreter_path());
        cmd.args(self.command_args(&invocation.args))
            .envs(self.child_env(invocation.disable_interaction))
            .stdin(Stdio::inherit())
            .stdout(invocation.stdout.stdio())
            .stderr(invocation.stderr.stdio())
            .kill_on_drop(true);

        tracing::debug!(target: "platwrap::agent", args = ?invocation.args, "Running agent command");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.teardown();
                return Err(AgentError::Spawn(source));
            }
        };

        let stdout = child.stdout.take().map(|mut out| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                out.read_to_end(&mut buf).await.map(|_| buf)
            })
        });
        let stderr = child.stderr.take().map(|mut err| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                err.read_to_end(&mut buf).await.map(|_| buf)
            })
        });

        let status = tokio::select! {
            status = child.wait() => status.map_err(AgentError::Wait)?,
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(AgentError::Cancelled);
            }
        };

        let output = AgentOutput {
            stdout: collect(stdout).await?,
            stderr: collect(stderr).await?,
        };
        self.check_status(status, output)
    }

    fn check_status(&self, status: ExitStatus, output: AgentOutput) -> Result<AgentOutput, AgentError> {
        match status.code() {
            Some(0) => Ok(output),
            Some(code) => {
                tracing::debug!(target: "platwrap::agent", code, "Agent command failed");
                Err(AgentError::Exited {
                    code,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
            None => {
                self.teardown();
                Err(AgentError::Terminated)
            }
        }
    }

    /// Remove the cache directory so the next run starts clean.
    fn teardown(&self) {
        let dir = self.cache_dir();
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            tracing::warn!(target: "platwrap::agent", path = %dir.display(), error = %e, "Could not remove cache directory");
        }
    }
}

#[async_trait]
impl AgentRunner for AgentWrapper {
    async fn run(
        &self,
        cancel: &CancellationToken,
        invocation: AgentInvocation,
    ) -> Result<AgentOutput, AgentError> {
        self.execute(cancel, invocation).await
    }
}

async fn collect(
    task: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
) -> Result<Vec<u8>, AgentError> {
    match task {
        Some(task) => task.await?.map_err(AgentError::Wait),
        None => Ok(Vec::new()),
    }
}

fn materialise(
    cache_dir: &Path,
    bundle_path: &Path,
    custom_bundle: bool,
    payload: &Payload,
    config_yaml: &[u8],
) -> Result<(), AgentError> {
    create_cache_dir(cache_dir)?;

    let lock_path = cache_dir.join(".lock");
    let _lock = CacheLock::acquire(&lock_path).map_err(|source| AgentError::Lock {
        path: lock_path.clone(),
        source,
    })?;
    tracing::debug!(target: "platwrap::agent", path = %lock_path.display(), "Lock acquired");

    if custom_bundle {
        if !bundle_path.is_file() {
            return Err(AgentError::BundleNotFound {
                path: bundle_path.to_path_buf(),
            });
        }
    } else {
        place(bundle_path, &payload.bundle, 0o644)?;
    }

    place(&cache_dir.join("config.yaml"), config_yaml, 0o644)?;

    for file in &payload.interpreter {
        let path = cache_dir.join(&file.rel_path);
        if let Some(parent) = path.parent() {
            create_cache_dir(parent)?;
        }
        place(&path, &file.bytes, file.mode)?;
        if let Some(expected) = &file.expected_sha256 {
            let actual = sha256_file(&path).map_err(|source| AgentError::Write {
                path: path.clone(),
                source,
            })?;
            if !actual.eq_ignore_ascii_case(expected) {
                let _ = std::fs::remove_file(&path);
                return Err(AgentError::Checksum {
                    path,
                    expected: expected.clone(),
                    actual,
                });
            }
        }
    }
    Ok(())
}

fn place(path: &Path, data: &[u8], mode: u32) -> Result<(), AgentError> {
    let written = write_if_changed(path, data, mode).map_err(|source| AgentError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    if written {
        tracing::debug!(target: "platwrap::agent", path = %path.display(), "Wrote cache file");
    }
    Ok(())
}

fn create_cache_dir(path: &Path) -> Result<(), AgentError> {
    if path.is_dir() {
        return Ok(());
    }
    tracing::debug!(target: "platwrap::agent", path = %path.display(), "Creating cache directory");
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path).map_err(|source| AgentError::CacheDir {
        path: path.to_path_buf(),
        source,
    })
}
