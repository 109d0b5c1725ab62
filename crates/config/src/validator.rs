//! Declarative field validation for [`Config`].
//!
//! Each field is paired with a list of rules. Format rules (`Url`, `Ascii`,
//! `Semver`) only apply to non-empty values; emptiness is the business of
//! `Required` and `RequiredWithout`.

use crate::schema::Config;
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Rule<'a> {
    Required,
    /// Required unless the named sibling field is set.
    RequiredWithout(&'static str, &'a str),
    Url,
    Ascii,
    Semver,
}

impl Rule<'_> {
    fn tag(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::RequiredWithout(..) => "required_without",
            Rule::Url => "url",
            Rule::Ascii => "ascii",
            Rule::Semver => "semver",
        }
    }
}

enum Value<'a> {
    Str(&'a str),
    List(&'a [String]),
}

struct Check<'a> {
    field: &'static str,
    value: Value<'a>,
    rules: Vec<Rule<'a>>,
}

impl<'a> Check<'a> {
    fn str(field: &'static str, value: &'a str, rules: Vec<Rule<'a>>) -> Self {
        Self {
            field,
            value: Value::Str(value),
            rules,
        }
    }

    fn list(field: &'static str, value: &'a [String], rules: Vec<Rule<'a>>) -> Self {
        Self {
            field,
            value: Value::List(value),
            rules,
        }
    }
}

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub tag: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Field validation for '{}' failed on the '{}' tag",
            self.field, self.tag
        )
    }
}

/// All rules that failed for a profile, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn checks(cfg: &Config) -> Vec<Check<'_>> {
    use Rule::*;
    let app = &cfg.application;
    let api = &cfg.api;
    let svc = &cfg.service;
    vec![
        Check::str("application.name", &app.name, vec![Required]),
        Check::str("application.slug", &app.slug, vec![Required, Ascii]),
        Check::str("application.executable", &app.executable, vec![Required]),
        Check::str("application.env_prefix", &app.env_prefix, vec![Required]),
        Check::str("application.user_config_dir", &app.user_config_dir, vec![Required]),
        Check::str("application.user_state_file", &app.user_state_file, vec![Required]),
        Check::str("application.writable_user_dir", &app.writable_user_dir, vec![Required]),
        Check::str("application.temp_sub_dir", &app.temp_sub_dir, vec![Required]),
        Check::str("api.base_url", &api.base_url, vec![Required, Url]),
        Check::str("api.auth_url", &api.auth_url, vec![Url]),
        Check::str(
            "api.oauth2_auth_url",
            &api.oauth2_auth_url,
            vec![RequiredWithout("api.auth_url", &api.auth_url), Url],
        ),
        Check::str(
            "api.oauth2_token_url",
            &api.oauth2_token_url,
            vec![RequiredWithout("api.auth_url", &api.auth_url), Url],
        ),
        Check::str(
            "api.oauth2_revoke_url",
            &api.oauth2_revoke_url,
            vec![RequiredWithout("api.auth_url", &api.auth_url), Url],
        ),
        Check::str(
            "api.certifier_url",
            &api.certifier_url,
            vec![RequiredWithout("api.auth_url", &api.auth_url), Url],
        ),
        Check::str("api.ai_url", &api.ai_url, vec![Url]),
        Check::str("api.user_agent", &api.user_agent, vec![Required]),
        Check::list("ssh.domain_wildcards", &cfg.ssh.domain_wildcards, vec![Required]),
        Check::str("detection.git_remote_name", &cfg.detection.git_remote_name, vec![Required]),
        Check::list("detection.site_domains", &cfg.detection.site_domains, vec![Required]),
        Check::str("service.name", &svc.name, vec![Required]),
        Check::str("service.slug", &svc.slug, vec![Required, Ascii]),
        Check::str("service.env_prefix", &svc.env_prefix, vec![Required]),
        Check::str("service.project_config_dir", &svc.project_config_dir, vec![Required]),
        Check::str("service.project_config_flavor", &svc.project_config_flavor, vec![Required]),
        Check::str("service.console_url", &svc.console_url, vec![Url]),
        Check::str("service.docs_url", &svc.docs_url, vec![Url]),
        Check::str("metadata.version", &cfg.metadata.version, vec![Semver]),
        Check::str("metadata.url", &cfg.metadata.url, vec![Url]),
    ]
}

fn passes(rule: &Rule<'_>, value: &Value<'_>) -> bool {
    match (rule, value) {
        (Rule::Required, Value::Str(s)) => !s.is_empty(),
        (Rule::Required, Value::List(l)) => !l.is_empty(),
        (Rule::RequiredWithout(_, other), Value::Str(s)) => !other.is_empty() || !s.is_empty(),
        (Rule::RequiredWithout(_, other), Value::List(l)) => !other.is_empty() || !l.is_empty(),
        (_, Value::Str("")) => true,
        (Rule::Url, Value::Str(s)) => is_url(s),
        (Rule::Ascii, Value::Str(s)) => s.is_ascii(),
        (Rule::Semver, Value::Str(s)) => crate::version::validate(s).is_ok(),
        (_, Value::List(_)) => true,
    }
}

fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok_and(|u| !u.scheme().is_empty())
}

/// Run every rule against the profile.
pub fn validate(cfg: &Config) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    for check in checks(cfg) {
        for rule in &check.rules {
            if !passes(rule, &check.value) {
                errors.push(FieldError {
                    field: check.field,
                    tag: rule.tag(),
                });
                // Later rules on the same field add nothing once one fails.
                break;
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}
