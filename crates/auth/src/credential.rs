use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use platwrap_agent::{AgentInvocation, AgentRunner, OutputTarget};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::jwt::unsafe_token_expiry;
use crate::TokenError;

/// Tokens this close to expiry are treated as expired.
const EXPIRY_DELTA: Duration = Duration::from_secs(10);

/// A bearer token and when it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: OffsetDateTime,
}

impl Credential {
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && self.expires_at - EXPIRY_DELTA > OffsetDateTime::now_utc()
    }
}

/// Supplies bearer tokens to the transport stack.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// A token that is not known to be expired.
    async fn token(&self) -> Result<Credential, TokenError>;

    /// Ask the upstream to refresh, dropping any cached token.
    async fn refresh(&self) -> Result<(), TokenError>;

    /// Mark the cached token unusable so the next `token()` refreshes.
    async fn invalidate(&self) -> Result<(), TokenError>;
}

/// Credential source backed by the external agent, which owns the login.
pub struct AgentCredentialSource {
    runner: Arc<dyn AgentRunner>,
    cancel: CancellationToken,
    cached: Mutex<Option<Credential>>,
}

impl AgentCredentialSource {
    pub fn new(runner: Arc<dyn AgentRunner>, cancel: CancellationToken) -> Self {
        Self {
            runner,
            cancel,
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<Credential, TokenError> {
        let output = self
            .runner
            .run(
                &self.cancel,
                AgentInvocation::new(["auth:token", "-W"])
                    .stdout(OutputTarget::Capture)
                    .non_interactive(),
            )
            .await
            .map_err(TokenError::Retrieve)?;
        let access_token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let expires_at = unsafe_token_expiry(&access_token)?;
        tracing::debug!(target: "platwrap::auth", %expires_at, "Retrieved token from agent");
        Ok(Credential {
            access_token,
            expires_at,
        })
    }

    async fn refresh_locked(&self, cached: &mut Option<Credential>) -> Result<(), TokenError> {
        *cached = None;
        self.runner
            .run(
                &self.cancel,
                AgentInvocation::new(["auth:info", "--refresh"])
                    .stdout(OutputTarget::Discard)
                    .non_interactive(),
            )
            .await
            .map_err(TokenError::Refresh)?;
        tracing::debug!(target: "platwrap::auth", "Refreshed credentials");
        Ok(())
    }
}

#[async_trait]
impl CredentialSource for AgentCredentialSource {
    async fn token(&self) -> Result<Credential, TokenError> {
        let mut cached = self.cached.lock().await;
        if let Some(cred) = cached.as_ref() {
            if cred.is_valid() {
                return Ok(cred.clone());
            }
        } else {
            let cred = self.fetch().await?;
            if cred.is_valid() {
                *cached = Some(cred.clone());
                return Ok(cred);
            }
        }
        self.refresh_locked(&mut cached).await?;
        let cred = self.fetch().await?;
        *cached = Some(cred.clone());
        Ok(cred)
    }

    async fn refresh(&self) -> Result<(), TokenError> {
        let mut cached = self.cached.lock().await;
        self.refresh_locked(&mut cached).await
    }

    async fn invalidate(&self) -> Result<(), TokenError> {
        if let Some(cred) = self.cached.lock().await.as_mut() {
            cred.access_token.clear();
        }
        Ok(())
    }
}
