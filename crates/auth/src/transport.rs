//! Layered HTTP transports.
//!
//! Each layer wraps an inner [`HttpTransport`]. The client stack is
//! `AuthTransport(BearerTransport(EventTransport(base)))`, where the base is
//! a [`ReqwestTransport`] unless one was placed in the request context.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Response, StatusCode, Url};

use crate::credential::CredentialSource;
use crate::TransportError;

/// Header carrying the command name for server-side diagnostics.
pub const EVENT_HEADER: &str = "x-cli-event";

/// A request whose body is held in memory so it can be sent twice.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Buffer a reqwest request. Streaming bodies cannot be replayed and are refused.
    pub fn from_reqwest(request: reqwest::Request) -> Result<Self, TransportError> {
        let body = match request.body() {
            None => None,
            Some(body) => Some(
                body.as_bytes()
                    .ok_or(TransportError::UnreplayableBody)?
                    .to_vec(),
            ),
        };
        Ok(Self {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            body,
            timeout: request.timeout().copied(),
        })
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the body and set the JSON content type.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Result<Self, TransportError> {
        self.body = Some(serde_json::to_vec(value)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a header given as text, validating both parts.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<(), TransportError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader(format!("{name}: {value}")))?;
        self.headers.append(header_name, header_value);
        Ok(())
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Response, TransportError>;
}

/// Base transport over a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::build(true)
    }

    /// A transport that neither requests nor decodes compressed responses.
    pub fn without_compression() -> Result<Self, TransportError> {
        Self::build(false)
    }

    fn build(gzip: bool) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .gzip(gzip)
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<Response, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.send().await?)
    }
}

/// Adds the event header and a default user agent.
pub struct EventTransport {
    inner: Arc<dyn HttpTransport>,
    event_name: Option<String>,
    user_agent: Option<String>,
}

impl EventTransport {
    pub fn new(
        inner: Arc<dyn HttpTransport>,
        event_name: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            inner,
            event_name: event_name.filter(|s| !s.is_empty()),
            user_agent: user_agent.filter(|s| !s.is_empty()),
        }
    }
}

#[async_trait]
impl HttpTransport for EventTransport {
    async fn send(&self, mut request: ApiRequest) -> Result<Response, TransportError> {
        if let Some(event) = &self.event_name {
            let value = HeaderValue::from_str(event)
                .map_err(|_| TransportError::InvalidHeader(event.clone()))?;
            request
                .headers
                .insert(HeaderName::from_static(EVENT_HEADER), value);
        }
        if let Some(ua) = &self.user_agent {
            if !request.headers.contains_key(USER_AGENT) {
                let value = HeaderValue::from_str(ua)
                    .map_err(|_| TransportError::InvalidHeader(ua.clone()))?;
                request.headers.insert(USER_AGENT, value);
            }
        }
        self.inner.send(request).await
    }
}

/// Injects `Authorization: Bearer <token>` from a credential source.
pub struct BearerTransport {
    inner: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialSource>,
}

impl BearerTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self { inner, credentials }
    }
}

#[async_trait]
impl HttpTransport for BearerTransport {
    async fn send(&self, mut request: ApiRequest) -> Result<Response, TransportError> {
        let credential = self.credentials.token().await?;
        let value = HeaderValue::from_str(&format!("Bearer {}", credential.access_token))
            .map_err(|_| TransportError::InvalidHeader("Authorization".to_string()))?;
        request.headers.insert(AUTHORIZATION, value);
        self.inner.send(request).await
    }
}

/// Retries a request once after a 401, invalidating the credential first.
pub struct AuthTransport {
    inner: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialSource>,
}

impl AuthTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self { inner, credentials }
    }
}

#[async_trait]
impl HttpTransport for AuthTransport {
    async fn send(&self, request: ApiRequest) -> Result<Response, TransportError> {
        let response = self.inner.send(request.clone()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!(target: "platwrap::auth", url = %request.url, "401: refreshing token");
        // Drain so the connection can be reused.
        let _ = response.bytes().await;
        self.credentials.invalidate().await?;
        self.inner.send(request).await
    }
}
