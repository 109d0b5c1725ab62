use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use platwrap_auth::{ApiClient, ApiRequest};
use platwrap_config::{write_atomic, Config};
use platwrap_stream::{consume, Message};
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::digest::DigestProvider;
use crate::git::find_git_root;
use crate::printer::LogPrinter;
use crate::prompt::Confirmer;
use crate::InitError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const GENERATE_PATH: &str = "/ai/generate-configuration";
const OUTPUT_DATA_KEY: &str = "output";

/// Caller choices for an init run.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub extra_context: String,
    pub organization_id: String,
    pub project_id: String,
    pub interactive: bool,
    /// Overwrite an existing file without asking.
    pub yes: bool,
    pub debug: bool,
    /// Defaults to [`DEFAULT_REQUEST_TIMEOUT`].
    pub request_timeout: Option<Duration>,
}

/// Request body for the configuration service.
#[derive(Debug, Clone, Serialize)]
pub struct Input {
    pub digest: serde_json::Value,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub extra_context: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub organization_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub debug: bool,
}

/// The generated configuration, carried by the `output` data record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Output {
    #[serde(default)]
    pub config_yaml: String,
    #[serde(default)]
    pub valid: bool,
}

/// The AI service URL, honouring the `<ENV_PREFIX>API_AI_URL` override.
pub fn ai_service_url(cnf: &Config) -> Option<String> {
    cnf.env_var("API_AI_URL")
        .or_else(|| Some(cnf.api.ai_url.clone()))
        .filter(|u| !u.is_empty())
}

/// The AI service URL, or why AI configuration is unavailable.
pub fn check_ai_available(cnf: &Config) -> Result<String, InitError> {
    if !cnf.api.enable_organizations {
        return Err(InitError::CannotUseAi(
            "using AI requires Organizations to be enabled",
        ));
    }
    ai_service_url(cnf).ok_or(InitError::CannotUseAi(
        "using AI requires the service URL to be set",
    ))
}

/// Print the digest of the repository around `start` as YAML.
pub fn show_digest(
    digester: &dyn DigestProvider,
    start: &Path,
    stdout: &mut dyn Write,
) -> Result<(), InitError> {
    let root = require_git_root(start)?;
    let digest = digester.digest(&root)?;
    stdout.write_all(serde_yaml::to_string(&digest)?.as_bytes())?;
    Ok(())
}

/// Generate a project configuration with the AI service and save it.
pub async fn run_ai_config(
    client: &ApiClient,
    digester: &dyn DigestProvider,
    start: &Path,
    opts: &Options,
    confirmer: &dyn Confirmer,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<(), InitError> {
    let cnf = client.config();
    let root = require_git_root(start)?;
    let ai_url = check_ai_available(cnf)?;
    client.ensure_authenticated().await?;

    tracing::debug!(target: "platwrap::init", root = %root.display(), "Analyzing repository");
    let digest = digester.digest(&root)?;

    let relative_path = Path::new(&cnf.service.project_config_dir).join("config.yaml");
    let config_path = root.join(&relative_path);
    if !confirm_overwrite(opts, &config_path, confirmer, stderr)? {
        return Ok(());
    }

    let mut url = Url::parse(&ai_url).map_err(|e| InitError::InvalidUrl(format!("{ai_url}: {e}")))?;
    url.set_path(GENERATE_PATH);
    let input = Input {
        digest,
        extra_context: opts.extra_context.clone(),
        organization_id: opts.organization_id.clone(),
        project_id: opts.project_id.clone(),
        debug: opts.debug,
    };
    let request = ApiRequest::new(Method::POST, url.clone())
        .json(&input)?
        .timeout(opts.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT));
    tracing::debug!(target: "platwrap::init", bytes = request.body.as_ref().map_or(0, Vec::len), url = %url, "Sending digest");

    let mut printer = LogPrinter::new(&mut *stderr);
    let streamed = stream_output(client, request, &url, &mut printer, stdout).await;
    printer.clear()?;
    drop(printer);
    let output = streamed?;
    writeln!(stderr)?;

    if !output.valid || output.config_yaml.trim().is_empty() {
        return Err(InitError::NoValidConfig);
    }

    writeln!(stdout, "{}", output.config_yaml.trim())?;
    writeln!(stderr)?;
    writeln!(
        stderr,
        "AI can make mistakes. Please check and modify the configuration to fit your needs."
    )?;

    if opts.interactive
        && !confirmer.confirm(
            &format!(
                "Do you want to save this configuration to {}?",
                relative_path.display()
            ),
            true,
        )?
    {
        return Ok(());
    }

    let content = format!(
        "# {} configuration, generated using AI at: {}\n\
         # AI can make mistakes. Please modify this file to suit your needs.\n{}",
        cnf.service.name,
        OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        output.config_yaml
    );
    save_configuration(&config_path, &content)?;
    writeln!(stderr, "\nConfiguration saved to: {}", config_path.display())?;

    let exe = &cnf.application.executable;
    writeln!(stderr, "\nYou can now deploy your project to {}.", cnf.service.name)?;
    writeln!(stderr, "\nTo do so, commit the new configuration file and push:\n")?;
    writeln!(stderr, "  git add {}", relative_path.display())?;
    writeln!(stderr, "  git commit -m 'Add {} configuration'", cnf.service.name)?;
    writeln!(stderr, "  {exe} project:set-remote")?;
    writeln!(stderr, "  {exe} push")?;
    Ok(())
}

/// Send the request and dispatch the streamed reply.
async fn stream_output<W: Write>(
    client: &ApiClient,
    request: ApiRequest,
    url: &Url,
    printer: &mut LogPrinter<W>,
    stdout: &mut dyn Write,
) -> Result<Output, InitError> {
    printer.status("Calling the AI API")?;
    let response = client.send(request).await?;
    check_status(&response, url)?;
    let response = match response.status() {
        StatusCode::OK => response,
        StatusCode::BAD_REQUEST => return Err(bad_request(response).await),
        status => {
            return Err(InitError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    };

    let mut output = None;
    consume(client.cancellation(), response, |message| {
        handle_message(message, printer, &mut *stdout, &mut output)
    })
    .await?;
    Ok(output.unwrap_or_default())
}

fn require_git_root(start: &Path) -> Result<PathBuf, InitError> {
    find_git_root(start)?.ok_or(InitError::NotInGitRepo)
}

fn confirm_overwrite(
    opts: &Options,
    path: &Path,
    confirmer: &dyn Confirmer,
    stderr: &mut dyn Write,
) -> Result<bool, InitError> {
    if !path.exists() {
        return Ok(true);
    }
    if !opts.interactive && !opts.yes {
        return Err(InitError::ConfigExists(path.to_path_buf()));
    }
    writeln!(stderr, "The configuration file already exists: {}", path.display())?;
    if opts.yes {
        return Ok(true);
    }
    let overwrite = confirmer.confirm("Are you sure you want to overwrite it?", false)?;
    if overwrite {
        writeln!(stderr)?;
    }
    Ok(overwrite)
}

fn check_status(response: &reqwest::Response, url: &Url) -> Result<(), InitError> {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return Ok(());
    }
    tracing::debug!(target: "platwrap::init", url = %url, "Rate limited");
    match response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        Some(after) => Err(InitError::RateLimitedFor(after.to_string())),
        None => Err(InitError::RateLimited),
    }
}

async fn bad_request(response: reqwest::Response) -> InitError {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error: String,
    }
    let url = response.url().to_string();
    match response.json::<ErrorBody>().await {
        Ok(body) if !body.error.is_empty() => InitError::InvalidRequest(body.error),
        _ => InitError::UnexpectedStatus { status: 400, url },
    }
}

fn handle_message<W: Write>(
    message: Message,
    printer: &mut LogPrinter<W>,
    stdout: &mut dyn Write,
    output: &mut Option<Output>,
) -> Result<(), InitError> {
    match message {
        Message::Log {
            level,
            message,
            tags,
            ..
        } => printer.print(level, &message, &tags)?,
        Message::OutputChunk { message, .. } => {
            printer.clear()?;
            stdout.write_all(message.as_bytes())?;
        }
        Message::Data { key, data, .. } if key == OUTPUT_DATA_KEY => {
            *output = Some(serde_json::from_value(data).map_err(InitError::Decode)?);
        }
        Message::Data { key, .. } => return Err(InitError::UnexpectedDataKey(key)),
        Message::Unknown { kind } => printer.print(
            platwrap_stream::LogLevel::Error,
            &format!("Unknown message type: {kind}"),
            &[],
        )?,
        Message::KeepAlive { .. } | Message::Done { .. } => {}
    }
    Ok(())
}

/// Write `content` atomically, readable only by the owner.
fn save_configuration(path: &Path, content: &str) -> Result<(), InitError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| InitError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    write_atomic(path, content.as_bytes(), 0o600).map_err(|source| InitError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(target: "platwrap::init", path = %path.display(), "Saved configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::FixedAnswer;
    use platwrap_config::from_yaml;
    use platwrap_test_utils::TEST_CONFIG_YAML;

    #[test]
    fn ai_requires_organizations_and_url() {
        let mut cnf = from_yaml(TEST_CONFIG_YAML.as_bytes()).unwrap();
        let err = check_ai_available(&cnf).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot use AI: using AI requires Organizations to be enabled"
        );

        cnf.api.enable_organizations = true;
        let err = check_ai_available(&cnf).unwrap_err();
        assert!(err.to_string().ends_with("the service URL to be set"));

        cnf.api.ai_url = "https://ai.example.com".into();
        assert_eq!(check_ai_available(&cnf).unwrap(), "https://ai.example.com");
    }

    #[test]
    fn overwrite_rules() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        let mut sink = Vec::new();
        let batch = Options::default();
        assert!(confirm_overwrite(&batch, &path, &FixedAnswer(false), &mut sink).unwrap());

        fs::write(&path, "x").unwrap();
        let err = confirm_overwrite(&batch, &path, &FixedAnswer(true), &mut sink).unwrap_err();
        assert!(err.to_string().starts_with("the configuration file already exists: "));

        let yes = Options {
            yes: true,
            ..Default::default()
        };
        assert!(confirm_overwrite(&yes, &path, &FixedAnswer(false), &mut sink).unwrap());

        let interactive = Options {
            interactive: true,
            ..Default::default()
        };
        assert!(!confirm_overwrite(&interactive, &path, &FixedAnswer(false), &mut sink).unwrap());
        assert!(confirm_overwrite(&interactive, &path, &FixedAnswer(true), &mut sink).unwrap());
    }

    #[test]
    fn data_records_fill_output_and_reject_unknown_keys() {
        let mut printer = LogPrinter::new(Vec::new());
        let mut stdout = Vec::new();
        let mut output = None;

        handle_message(
            Message::Data {
                time: None,
                key: "output".into(),
                data: serde_json::json!({"config_yaml": "a: 1", "valid": true}),
            },
            &mut printer,
            &mut stdout,
            &mut output,
        )
        .unwrap();
        assert_eq!(
            output,
            Some(Output {
                config_yaml: "a: 1".into(),
                valid: true
            })
        );

        let err = handle_message(
            Message::Data {
                time: None,
                key: "other".into(),
                data: serde_json::Value::Null,
            },
            &mut printer,
            &mut stdout,
            &mut output,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "unexpected data key: other");
    }

    #[test]
    fn chunks_go_to_stdout_and_unknown_types_are_logged() {
        let mut printer = LogPrinter::new(Vec::new());
        let mut stdout = Vec::new();
        let mut output = None;
        handle_message(
            Message::OutputChunk {
                time: None,
                message: "abc".into(),
            },
            &mut printer,
            &mut stdout,
            &mut output,
        )
        .unwrap();
        handle_message(
            Message::Unknown {
                kind: "progress".into(),
            },
            &mut printer,
            &mut stdout,
            &mut output,
        )
        .unwrap();
        assert_eq!(stdout, b"abc");
        assert_eq!(
            String::from_utf8(printer.into_inner()).unwrap(),
            "Error: Unknown message type: progress\n"
        );
    }

    #[test]
    fn saved_file_is_private() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".test").join("config.yaml");
        save_configuration(&path, "a: 1\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a: 1\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }
}
