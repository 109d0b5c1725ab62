use std::cmp::Ordering;
use std::path::Path;
use std::time::{Duration, SystemTime};

use platwrap_config::{version, Config, RequestContext};
use platwrap_state::{State, StateError};
use time::OffsetDateTime;

use crate::fetch::fetch_config;
use crate::fs::write_file;
use crate::AltError;

/// Result of an update check that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The profile is not eligible; nothing was fetched or saved.
    Disabled,
    CheckedRecently,
    FileUpdatedRecently,
    UpToDate,
    Updated,
}

/// Whether the active profile is eligible for auto-update.
///
/// `<ENV_PREFIX>UPDATES_CHECK=0` disables checks regardless of the profile.
pub fn should_update(cnf: &Config) -> bool {
    cnf.updates.check
        && cnf.env_var("UPDATES_CHECK").as_deref() != Some("0")
        && cnf.source_file.is_some()
        && !cnf.metadata.url.is_empty()
}

/// Replace the active profile file with its remote copy when that is newer.
///
/// Ineligible profiles (see [`should_update`]) are left alone. The context's
/// profile is not modified; the new one takes effect on the next run.
pub async fn update(ctx: &RequestContext) -> Result<UpdateOutcome, AltError> {
    let cnf = ctx.config();
    if !should_update(cnf) {
        return Ok(UpdateOutcome::Disabled);
    }
    let mut state = match platwrap_state::load(cnf) {
        Ok(state) => state,
        // Rewritten below once the check has run.
        Err(e @ StateError::Parse { .. }) => {
            tracing::debug!(target: "platwrap::alt", error = %e, "Ignoring unreadable state");
            State::default()
        }
        Err(e) => return Err(e.into()),
    };
    let interval = Duration::from_secs(cnf.updates.check_interval);

    // A check stamped in the future (clock skew) also counts as recent.
    let since_check = OffsetDateTime::now_utc().unix_timestamp() - state.config_updates.last_checked;
    if since_check < i64::try_from(interval.as_secs()).unwrap_or(i64::MAX) {
        tracing::debug!(target: "platwrap::alt", ago_secs = since_check, "Config updates checked recently");
        return Ok(UpdateOutcome::CheckedRecently);
    }

    let source = cnf.source_file.as_deref().ok_or(AltError::NoSourceFile)?;
    let modified_ago = modified_ago(source)?;
    if modified_ago < interval {
        tracing::debug!(
            target: "platwrap::alt",
            ago_secs = modified_ago.as_secs(),
            path = %source.display(),
            "Config file updated recently"
        );
        return Ok(UpdateOutcome::FileUpdatedRecently);
    }

    let outcome = check_remote(ctx, cnf, source).await;

    state.config_updates.last_checked = OffsetDateTime::now_utc().unix_timestamp();
    if let Err(e) = platwrap_state::save(cnf, &state) {
        tracing::debug!(target: "platwrap::alt", error = %e, "Error saving state");
    }
    outcome
}

async fn check_remote(
    ctx: &RequestContext,
    cnf: &Config,
    source: &Path,
) -> Result<UpdateOutcome, AltError> {
    tracing::debug!(target: "platwrap::alt", url = %cnf.metadata.url, "Checking for config updates");
    let fetched = fetch_config(ctx, &cnf.metadata.url).await?;
    let remote = &fetched.config.metadata;

    if let Some(remote_at) = remote.updated_at {
        if cnf.metadata.updated_at.is_some_and(|local_at| remote_at <= local_at) {
            tracing::debug!(target: "platwrap::alt", "Config is already up to date (updated at {remote_at})");
            return Ok(UpdateOutcome::UpToDate);
        }
    }
    if !remote.version.is_empty() && !cnf.metadata.version.is_empty() {
        let ordering = version::compare(&cnf.metadata.version, &remote.version)
            .map_err(AltError::CompareVersions)?;
        if ordering != Ordering::Less {
            tracing::debug!(
                target: "platwrap::alt",
                "Config is already up to date (version {})",
                cnf.metadata.version
            );
            return Ok(UpdateOutcome::UpToDate);
        }
    }

    write_file(source, fetched.to_yaml()?.as_bytes(), None, 0o644)?;
    tracing::debug!(target: "platwrap::alt", path = %source.display(), "Automatically updated config file");
    Ok(UpdateOutcome::Updated)
}

fn modified_ago(path: &Path) -> Result<Duration, AltError> {
    let stat_err = |source| AltError::Stat {
        path: path.to_path_buf(),
        source,
    };
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(stat_err)?;
    // A timestamp in the future counts as just modified.
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default())
}
