use std::sync::Arc;

use platwrap_config::{Config, RequestContext};
use reqwest::{Method, Response, Url};
use tokio_util::sync::CancellationToken;

use crate::context::{event_name_from_context, transport_from_context};
use crate::credential::CredentialSource;
use crate::transport::{
    ApiRequest, AuthTransport, BearerTransport, EventTransport, HttpTransport, ReqwestTransport,
};
use crate::TransportError;

/// Authenticated client for the platform API.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<Config>,
    cancel: CancellationToken,
    credentials: Arc<dyn CredentialSource>,
    transport: Arc<dyn HttpTransport>,
}

impl ApiClient {
    /// Build the full stack, retrying once on 401.
    pub fn new(
        ctx: &RequestContext,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, TransportError> {
        Self::build(ctx, credentials, true)
    }

    /// Build a stack without the 401 retry layer.
    pub fn without_retry(
        ctx: &RequestContext,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, TransportError> {
        Self::build(ctx, credentials, false)
    }

    fn build(
        ctx: &RequestContext,
        credentials: Arc<dyn CredentialSource>,
        retry_on_401: bool,
    ) -> Result<Self, TransportError> {
        let config = ctx.config().clone();
        let base: Arc<dyn HttpTransport> = match transport_from_context(ctx) {
            Some(base) => base,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let event: Arc<dyn HttpTransport> = Arc::new(EventTransport::new(
            base,
            event_name_from_context(ctx).map(str::to_string),
            Some(config.user_agent()),
        ));
        let bearer: Arc<dyn HttpTransport> =
            Arc::new(BearerTransport::new(event, credentials.clone()));
        let transport: Arc<dyn HttpTransport> = if retry_on_401 {
            Arc::new(AuthTransport::new(bearer, credentials.clone()))
        } else {
            bearer
        };
        Ok(Self {
            config,
            cancel: ctx.cancellation().clone(),
            credentials,
            transport,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolve `target` against the API base URL unless it is already absolute.
    pub fn resolve(&self, target: &str) -> Result<Url, TransportError> {
        if target.starts_with("http://") || target.starts_with("https://") {
            return Url::parse(target).map_err(|e| TransportError::InvalidUrl(e.to_string()));
        }
        let base = self.config.api.base_url.trim_end_matches('/');
        let path = if target.starts_with('/') {
            target.to_string()
        } else {
            format!("/{target}")
        };
        Url::parse(&format!("{base}{path}")).map_err(|e| TransportError::InvalidUrl(e.to_string()))
    }

    pub fn request(&self, method: Method, target: &str) -> Result<ApiRequest, TransportError> {
        Ok(ApiRequest::new(method, self.resolve(target)?))
    }

    /// Send through the transport stack, giving up when the context is cancelled.
    pub async fn send(&self, request: ApiRequest) -> Result<Response, TransportError> {
        tracing::debug!(target: "platwrap::auth", method = %request.method, url = %request.url, "Sending API request");
        tokio::select! {
            res = self.transport.send(request) => res,
            _ = self.cancel.cancelled() => Err(TransportError::Cancelled),
        }
    }

    /// Confirm a usable token can be obtained before starting long work.
    pub async fn ensure_authenticated(&self) -> Result<(), TransportError> {
        match self.credentials.token().await {
            Ok(_) => Ok(()),
            Err(source) => Err(TransportError::NotAuthenticated {
                executable: self.config.application.executable.clone(),
                source,
            }),
        }
    }
}
