//! Handler for the `config:install` command.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Result};
use platwrap_alt::{executable_extension, fetch_config, find_bin_dir, find_config_dir, in_path, Alt};
use platwrap_config::RequestContext;

use crate::cli::InstallArgs;

/// Install the profile at `args.url` as a separate CLI that runs this program.
pub(crate) async fn handle_config_install_command(
    ctx: &RequestContext,
    args: &InstallArgs,
    stderr: &mut dyn Write,
) -> Result<()> {
    let cnf = ctx.config();
    let fetched = fetch_config(ctx, &args.url).await?;
    let executable = fetched.config.application.executable.clone();
    if executable == cnf.application.executable {
        bail!("cannot install config for same executable name as this program: {executable}");
    }

    let config_dir = match &args.config_dir {
        Some(dir) => dir.clone(),
        None => find_config_dir(cnf)?,
    };
    let bin_dir = match &args.bin_dir {
        Some(dir) => dir.clone(),
        None => find_bin_dir(cnf)?,
    };
    let config_path = config_dir.join(format!("{executable}.yaml"));
    let exec_path = bin_dir.join(format!("{executable}{}", executable_extension()));

    let alt = Alt::new(
        &exec_path,
        format!(
            "Launcher for {}, installed by the {}",
            fetched.config.application.name, cnf.application.name
        ),
        cnf.application.executable.clone(),
        &config_path,
        fetched.node.clone(),
    )
    .with_head_comment(fetched.head_comment.clone());
    alt.generate_and_save()?;
    tracing::debug!(target: "platwrap::app", exec = %exec_path.display(), config = %config_path.display(), "Installed alternate CLI");

    let home = cnf.home_dir().ok();
    let home = home.as_deref();
    writeln!(stderr, "The configuration file was saved to: {}", abbreviate(&config_path, home))?;
    writeln!(stderr, "The launcher was saved to: {}", abbreviate(&exec_path, home))?;
    if !in_path(&bin_dir) {
        writeln!(stderr)?;
        writeln!(stderr, "Add the following directory to your PATH:")?;
        writeln!(stderr, "  {}", abbreviate(&bin_dir, home))?;
    }
    writeln!(stderr)?;
    writeln!(stderr, "Run the new CLI with: {executable}")?;
    Ok(())
}

/// Replace a leading home directory with `~`.
fn abbreviate(path: &Path, home: Option<&Path>) -> String {
    match home.and_then(|home| path.strip_prefix(home).ok()) {
        Some(rest) => Path::new("~").join(rest).display().to_string(),
        None => path.display().to_string(),
    }
}
