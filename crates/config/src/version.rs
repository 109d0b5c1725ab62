//! Build versions and lenient semantic-version comparison.

use semver::Version;
use std::cmp::Ordering;

/// Version of this wrapper.
pub const WRAPPER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the embedded agent bundle, injected at build time.
pub const AGENT_VERSION: &str = match option_env!("PLATWRAP_AGENT_VERSION") {
    Some(v) => v,
    None => "0.0.0",
};

/// Version of the embedded interpreter, injected at build time.
pub const INTERPRETER_VERSION: &str = match option_env!("PLATWRAP_INTERPRETER_VERSION") {
    Some(v) => v,
    None => "0.0.0",
};

/// Parse a version, accepting a leading `v` and missing minor/patch parts.
pub fn parse(v: &str) -> Result<Version, semver::Error> {
    let trimmed = v.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    // Split off pre-release/build before padding the numeric core.
    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => trimmed.to_string(),
    };
    Version::parse(&padded)
}

/// Check that `v` is a valid version.
pub fn validate(v: &str) -> Result<(), semver::Error> {
    parse(v).map(|_| ())
}

/// Compare two versions by precedence. Build metadata is ignored.
pub fn compare(v1: &str, v2: &str) -> Result<Ordering, semver::Error> {
    if v1 == v2 {
        return Ok(Ordering::Equal);
    }
    let a = parse(v1)?;
    let b = parse(v2)?;
    Ok((a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre)))
}
