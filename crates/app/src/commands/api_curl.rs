//! Handler for the `api:curl` command.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use futures::StreamExt;
use platwrap_auth::{
    with_event_name, with_transport, ApiClient, CredentialSource, HttpTransport, ReqwestTransport,
};
use platwrap_config::RequestContext;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Response};

use crate::cli::CurlArgs;

/// Handle the `api:curl` command, writing the response to `out`.
pub(crate) async fn handle_api_curl_command(
    ctx: &RequestContext,
    credentials: Arc<dyn CredentialSource>,
    args: &CurlArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let data = args.data.as_deref().filter(|d| !d.is_empty());
    let json = args.json.as_deref().filter(|j| !j.is_empty());
    if data.is_some() && json.is_some() {
        bail!("cannot use --data and --json together");
    }
    let method = resolve_method(args.request.as_deref(), args.head, data.is_some() || json.is_some())?;
    let headers = args
        .headers
        .iter()
        .filter_map(|h| parse_header(h).transpose())
        .collect::<Result<Vec<_>>>()?;

    let mut ctx = with_event_name(ctx, "api:curl");
    if args.disable_compression {
        let base: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::without_compression()?);
        ctx = with_transport(&ctx, base);
    }
    let client = if args.no_retry_401 {
        ApiClient::without_retry(&ctx, credentials)?
    } else {
        ApiClient::new(&ctx, credentials)?
    };

    let mut request = client.request(method.clone(), args.path.as_deref().unwrap_or("/"))?;
    if let Some(json) = json {
        request = request
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(json);
    } else if let Some(data) = data {
        let has_content_type = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
        if !has_content_type {
            request = request.header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
        }
        request = request.body(data);
    }
    for (name, value) in &headers {
        request.append_header(name, value)?;
    }

    let url = request.url.clone();
    let response = client.send(request).await?;
    let status = response.status();
    let fail = args.fail || !args.no_retry_401;
    if fail && (status.is_client_error() || status.is_server_error()) {
        bail!("server returned HTTP {} for {}", status.as_u16(), url);
    }

    let show_headers = args.include || method == Method::HEAD;
    match write_response(response, show_headers, method != Method::HEAD, out).await {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            tracing::debug!(target: "platwrap::app", "Output closed early");
            Ok(())
        }
        other => Ok(other?),
    }
}

fn resolve_method(request: Option<&str>, head: bool, has_body: bool) -> Result<Method> {
    let mut name = request
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("GET")
        .to_ascii_uppercase();
    if head {
        name = "HEAD".to_string();
    }
    if name == "GET" && has_body {
        name = "POST".to_string();
    }
    Method::from_bytes(name.as_bytes()).map_err(|_| anyhow!("invalid request method: {name}"))
}

/// Split a `-H` value. Blank values are skipped.
fn parse_header(raw: &str) -> Result<Option<(String, String)>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let (name, value) = raw
        .split_once(':')
        .or_else(|| raw.split_once('='))
        .ok_or_else(|| anyhow!("invalid header format: {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid header: empty name in {raw:?}");
    }
    Ok(Some((name.to_string(), value.trim().to_string())))
}

async fn write_response(
    response: Response,
    show_headers: bool,
    show_body: bool,
    out: &mut dyn Write,
) -> io::Result<()> {
    if show_headers {
        write!(out, "{:?} {}\r\n", response.version(), response.status())?;
        for (name, value) in response.headers() {
            write!(out, "{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()))?;
        }
        write!(out, "\r\n")?;
    }
    if show_body {
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            out.write_all(&chunk.map_err(io::Error::other)?)?;
        }
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use platwrap_auth::{Credential, TokenError};
    use platwrap_config::from_yaml;
    use platwrap_test_utils::TEST_CONFIG_YAML;
    use std::time::Duration;
    use time::OffsetDateTime;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken;

    #[async_trait]
    impl CredentialSource for StaticToken {
        async fn token(&self) -> Result<Credential, TokenError> {
            Ok(Credential {
                access_token: "tok".into(),
                expires_at: OffsetDateTime::now_utc() + Duration::from_secs(3600),
            })
        }
        async fn refresh(&self) -> Result<(), TokenError> {
            Ok(())
        }
        async fn invalidate(&self) -> Result<(), TokenError> {
            Ok(())
        }
    }

    fn context(server: &MockServer) -> RequestContext {
        let mut cnf = from_yaml(TEST_CONFIG_YAML.as_bytes()).unwrap();
        cnf.api.base_url = server.uri();
        RequestContext::new(Arc::new(cnf))
    }

    async fn curl(server: &MockServer, args: CurlArgs) -> (Result<()>, String) {
        let mut out = Vec::new();
        let result =
            handle_api_curl_command(&context(server), Arc::new(StaticToken), &args, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn header_forms() {
        assert_eq!(
            parse_header(" Accept: text/plain ").unwrap(),
            Some(("Accept".into(), "text/plain".into()))
        );
        assert_eq!(
            parse_header("X-Token=a=b").unwrap(),
            Some(("X-Token".into(), "a=b".into()))
        );
        assert_eq!(parse_header("  ").unwrap(), None);
        assert_eq!(
            parse_header("nonsense").unwrap_err().to_string(),
            "invalid header format: \"nonsense\""
        );
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn method_resolution() {
        assert_eq!(resolve_method(None, false, false).unwrap(), Method::GET);
        assert_eq!(resolve_method(None, false, true).unwrap(), Method::POST);
        assert_eq!(resolve_method(Some(" patch "), false, true).unwrap(), Method::PATCH);
        assert_eq!(resolve_method(Some("POST"), true, false).unwrap(), Method::HEAD);
    }

    #[tokio::test]
    async fn data_turns_get_into_form_post() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects"))
            .and(header("authorization", "Bearer tok"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(header("x-extra", "1"))
            .and(body_string("a=b"))
            .respond_with(ResponseTemplate::new(200).set_body_string("created"))
            .expect(1)
            .mount(&server)
            .await;

        let (result, out) = curl(
            &server,
            CurlArgs {
                path: Some("projects".into()),
                data: Some("a=b".into()),
                headers: vec!["X-Extra=1".into()],
                ..Default::default()
            },
        )
        .await;
        result.unwrap();
        assert_eq!(out, "created");
    }

    #[tokio::test]
    async fn json_sets_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/x"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"a":1}"#))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let (result, out) = curl(
            &server,
            CurlArgs {
                path: Some("/x".into()),
                request: Some("put".into()),
                json: Some(r#"{"a":1}"#.into()),
                ..Default::default()
            },
        )
        .await;
        result.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn data_and_json_conflict() {
        let server = MockServer::start().await;
        let (result, _) = curl(
            &server,
            CurlArgs {
                data: Some("a".into()),
                json: Some("{}".into()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "cannot use --data and --json together"
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_status_fails_by_default() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let (result, out) = curl(
            &server,
            CurlArgs {
                path: Some("/missing".into()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            format!("server returned HTTP 404 for {}/missing", server.uri())
        );
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn no_retry_prints_error_bodies() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let (result, out) = curl(
            &server,
            CurlArgs {
                path: Some("/missing".into()),
                no_retry_401: true,
                ..Default::default()
            },
        )
        .await;
        result.unwrap();
        assert_eq!(out, "nope");
    }

    #[tokio::test]
    async fn include_and_head_print_headers() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-request-id", "abc")
                    .set_body_string("body"),
            )
            .mount(&server)
            .await;

        let (result, out) = curl(
            &server,
            CurlArgs {
                include: true,
                ..Default::default()
            },
        )
        .await;
        result.unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("x-request-id: abc\r\n"));
        assert!(out.ends_with("\r\n\r\nbody"));

        let (result, out) = curl(
            &server,
            CurlArgs {
                head: true,
                ..Default::default()
            },
        )
        .await;
        result.unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.last().unwrap().method.as_str(), "HEAD");
    }
}
