#![cfg(unix)]

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use platwrap_agent::{
    AgentError, AgentInvocation, AgentRunner, AgentWrapper, EmbeddedFile, OutputTarget, Payload,
};
use platwrap_config::from_yaml;
use platwrap_test_utils::{set_env_var, TEST_CONFIG_YAML};
use serial_test::serial;
use tokio_util::sync::CancellationToken;

const FAKE_INTERPRETER: &str = r#"#!/bin/sh
echo "args:$*"
echo "config:$CLI_CONFIG_FILE"
echo "wrapped:$TEST_CLI_WRAPPED"
echo "updates:$TEST_CLI_UPDATES_CHECK"
echo "version:$TEST_CLI_APPLICATION_VERSION"
echo "nointeraction:$TEST_CLI_NO_INTERACTION"
echo "ua:$TEST_CLI_USER_AGENT"
case "$2" in
  fail) echo "boom" >&2; exit 3 ;;
esac
"#;

fn fake_payload() -> Payload {
    Payload {
        bundle: Cow::Borrowed(b"agent bundle bytes"),
        interpreter: vec![EmbeddedFile::new(
            "interpreter",
            FAKE_INTERPRETER.as_bytes().to_vec(),
            0o755,
        )],
        interpreter_path: PathBuf::from("interpreter"),
        settings: Vec::new(),
    }
}

fn wrapper() -> AgentWrapper {
    let cnf = from_yaml(TEST_CONFIG_YAML.as_bytes()).unwrap();
    AgentWrapper::new(Arc::new(cnf))
        .with_payload(fake_payload())
        .with_version("1.2.3")
}

fn stdout_of(out: &[u8]) -> String {
    String::from_utf8_lossy(out).into_owned()
}

#[tokio::test]
#[serial]
async fn execute_passes_args_and_environment() {
    let tmp = tempfile::tempdir().unwrap();
    let _tmp = set_env_var("TEST_CLI_TMP", Some(&tmp.path().to_string_lossy()));
    let _ni = set_env_var("TEST_CLI_NO_INTERACTION", None);

    let wrapper = wrapper();
    let out = wrapper
        .execute(
            &CancellationToken::new(),
            AgentInvocation::new(["auth:token", "-W"])
                .stdout(OutputTarget::Capture)
                .non_interactive(),
        )
        .await
        .unwrap();
    let text = stdout_of(&out.stdout);

    let bundle = wrapper.bundle_path();
    assert!(bundle.starts_with(tmp.path()));
    assert!(text.contains(&format!("args:{} auth:token -W", bundle.display())));
    assert!(text.contains(&format!("config:{}", wrapper.config_path().display())));
    assert!(text.contains("wrapped:1"));
    assert!(text.contains("updates:0"));
    assert!(text.contains("version:1.2.3"));
    assert!(text.contains("nointeraction:1"));
    assert!(text.contains("ua:{APP_NAME_DASH}/"));
    assert!(text.contains("WRAPPER 1.2.3)"));

    assert_eq!(
        std::fs::read(wrapper.config_path()).unwrap(),
        TEST_CONFIG_YAML.as_bytes()
    );
    assert!(wrapper.cache_dir().join(".lock").exists());
}

#[tokio::test]
#[serial]
async fn second_run_leaves_cache_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let _tmp = set_env_var("TEST_CLI_TMP", Some(&tmp.path().to_string_lossy()));

    let wrapper = wrapper();
    wrapper.init().await.unwrap();
    let files = [
        wrapper.bundle_path(),
        wrapper.interpreter_path(),
        wrapper.config_path(),
    ];
    let before: Vec<_> = files
        .iter()
        .map(|p| std::fs::metadata(p).unwrap().modified().unwrap())
        .collect();

    wrapper.init().await.unwrap();
    let after: Vec<_> = files
        .iter()
        .map(|p| std::fs::metadata(p).unwrap().modified().unwrap())
        .collect();
    assert_eq!(before, after);
    assert_eq!(
        std::fs::read(wrapper.bundle_path()).unwrap(),
        b"agent bundle bytes"
    );
}

#[tokio::test]
#[serial]
async fn non_zero_exit_is_propagated() {
    let tmp = tempfile::tempdir().unwrap();
    let _tmp = set_env_var("TEST_CLI_TMP", Some(&tmp.path().to_string_lossy()));

    let wrapper = wrapper();
    let err = wrapper
        .run(
            &CancellationToken::new(),
            AgentInvocation::new(["fail"])
                .stdout(OutputTarget::Discard)
                .stderr(OutputTarget::Capture),
        )
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), Some(3));
    match err {
        AgentError::Exited { stderr, .. } => assert_eq!(stderr, "boom"),
        other => panic!("unexpected error: {other}"),
    }
    // A normal failure keeps the cache.
    assert!(wrapper.interpreter_path().exists());
}

#[tokio::test]
#[serial]
async fn checksum_mismatch_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let _tmp = set_env_var("TEST_CLI_TMP", Some(&tmp.path().to_string_lossy()));

    let mut payload = fake_payload();
    payload.interpreter[0] = payload.interpreter[0].clone().with_sha256("00");
    let cnf = from_yaml(TEST_CONFIG_YAML.as_bytes()).unwrap();
    let wrapper = AgentWrapper::new(Arc::new(cnf)).with_payload(payload);

    let err = wrapper.init().await.unwrap_err();
    assert!(matches!(err, AgentError::Checksum { .. }));
    assert!(!wrapper.interpreter_path().exists());
}

#[tokio::test]
#[serial]
async fn missing_custom_bundle_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let _tmp = set_env_var("TEST_CLI_TMP", Some(&tmp.path().to_string_lossy()));

    let wrapper = wrapper().with_bundle_path(tmp.path().join("missing.bundle"));
    let err = wrapper.init().await.unwrap_err();
    assert!(matches!(err, AgentError::BundleNotFound { .. }));
}

#[tokio::test]
#[serial]
async fn embedded_payload_runs_when_bundled() {
    let payload = Payload::embedded();
    if payload.is_placeholder() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let _tmp = set_env_var("TEST_CLI_TMP", Some(&tmp.path().to_string_lossy()));
    let cnf = from_yaml(TEST_CONFIG_YAML.as_bytes()).unwrap();
    let wrapper = AgentWrapper::new(Arc::new(cnf)).with_version("1.2.3");
    let out = wrapper
        .execute(
            &CancellationToken::new(),
            AgentInvocation::new(["--version"])
                .stdout(OutputTarget::Capture)
                .non_interactive(),
        )
        .await
        .unwrap();
    assert_eq!(stdout_of(&out.stdout).trim_end(), "Test CLI 1.2.3");
}
