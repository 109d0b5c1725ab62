use std::time::Duration;

use platwrap_config::{from_yaml, Config, RequestContext};
use reqwest::{StatusCode, Url};
use serde_yaml::{Mapping, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::AltError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fields that only make sense for the binary that shipped the profile.
const WRAPPER_ONLY_KEYS: [&str; 2] = ["github_repo", "homebrew_tap"];

/// A downloaded profile, ready to persist.
#[derive(Debug, Clone)]
pub struct FetchedConfig {
    /// Document to write, stripped of wrapper fields and annotated with provenance.
    pub node: Value,
    /// Comment placed above the document when written.
    pub head_comment: String,
    /// The validated profile, for comparison against the active one.
    pub config: Config,
}

impl FetchedConfig {
    pub fn to_yaml(&self) -> Result<String, AltError> {
        let body = serde_yaml::to_string(&self.node).map_err(AltError::Encode)?;
        let comment: String = self
            .head_comment
            .lines()
            .map(|line| format!("# {line}\n"))
            .collect();
        Ok(format!("{comment}{body}"))
    }
}

/// Download and validate the profile at `url`.
pub async fn fetch_config(ctx: &RequestContext, url: &str) -> Result<FetchedConfig, AltError> {
    let parsed = Url::parse(url).map_err(|e| AltError::InvalidUrl(format!("{url}: {e}")))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(AltError::InvalidUrl(format!("{url}: missing host")));
    }

    tracing::debug!(target: "platwrap::alt", url = %parsed, "Fetching config");
    let client = reqwest::Client::builder()
        .user_agent(ctx.config().user_agent())
        .timeout(FETCH_TIMEOUT)
        .build()?;
    let send = async {
        let response = client.get(parsed.clone()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(AltError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(response.bytes().await?)
    };
    let body = tokio::select! {
        res = send => res?,
        _ = ctx.cancellation().cancelled() => return Err(AltError::Cancelled),
    };

    let mut config = from_yaml(&body)?;
    let mut node: Value = serde_yaml::from_slice(&body).map_err(AltError::Yaml)?;
    let downloaded_at = OffsetDateTime::now_utc();
    let origin = annotate(&mut node, url, downloaded_at)?;

    config.wrapper = Default::default();
    config.metadata.url = origin;
    config.metadata.downloaded_at = Some(downloaded_at);

    Ok(FetchedConfig {
        node,
        head_comment: format!("Downloaded from {url}"),
        config,
    })
}

/// Strip wrapper fields and record provenance. Returns the effective origin URL.
fn annotate(node: &mut Value, url: &str, now: OffsetDateTime) -> Result<String, AltError> {
    let Value::Mapping(root) = node else {
        return Err(AltError::NotAMapping);
    };

    let wrapper_emptied = match root.get_mut("wrapper") {
        Some(Value::Mapping(wrapper)) => {
            for key in WRAPPER_ONLY_KEYS {
                wrapper.remove(key);
            }
            wrapper.is_empty()
        }
        _ => false,
    };
    if wrapper_emptied {
        root.remove("wrapper");
    }

    if !matches!(root.get("metadata"), Some(Value::Mapping(_))) {
        root.insert("metadata".into(), Value::Mapping(Mapping::new()));
    }
    let mut origin = url.to_string();
    if let Some(Value::Mapping(meta)) = root.get_mut("metadata") {
        // A profile may name its own canonical URL; keep it.
        let existing = meta
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        match existing {
            Some(existing) => origin = existing,
            None => {
                meta.insert("url".into(), url.into());
            }
        }
        let stamp = now.format(&Rfc3339).unwrap_or_default();
        meta.insert("downloaded_at".into(), stamp.into());
    }
    Ok(origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_strips_wrapper_and_records_origin() {
        let mut node: Value = serde_yaml::from_str(
            "wrapper:\n  github_repo: a/b\n  homebrew_tap: a/tap\napplication:\n  name: X\n",
        )
        .unwrap();
        let origin = annotate(&mut node, "https://example.com/c.yaml", OffsetDateTime::UNIX_EPOCH)
            .unwrap();
        assert_eq!(origin, "https://example.com/c.yaml");
        assert!(node.get("wrapper").is_none());
        let meta = node.get("metadata").unwrap();
        assert_eq!(meta.get("url").unwrap().as_str(), Some("https://example.com/c.yaml"));
        assert_eq!(
            meta.get("downloaded_at").unwrap().as_str(),
            Some("1970-01-01T00:00:00Z")
        );
    }

    #[test]
    fn annotate_keeps_existing_url() {
        let mut node: Value =
            serde_yaml::from_str("metadata:\n  url: https://canonical.example.com\n").unwrap();
        let origin = annotate(&mut node, "https://mirror.example.com", OffsetDateTime::now_utc())
            .unwrap();
        assert_eq!(origin, "https://canonical.example.com");
    }

    #[test]
    fn annotate_rejects_non_mapping() {
        let mut node: Value = serde_yaml::from_str("[a, b]").unwrap();
        assert!(matches!(
            annotate(&mut node, "https://x.example.com", OffsetDateTime::now_utc()),
            Err(AltError::NotAMapping)
        ));
    }

    #[test]
    fn to_yaml_prefixes_comment() {
        let fetched = FetchedConfig {
            node: serde_yaml::from_str("a: 1").unwrap(),
            head_comment: "Downloaded from https://x".into(),
            config: from_yaml(platwrap_test_utils::TEST_CONFIG_YAML.as_bytes()).unwrap(),
        };
        assert_eq!(fetched.to_yaml().unwrap(), "# Downloaded from https://x\na: 1\n");
    }
}
