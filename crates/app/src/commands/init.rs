//! Handler for the `init` command and its aliases.

use std::io::{IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use platwrap_auth::{with_event_name, ApiClient, CredentialSource};
use platwrap_config::RequestContext;
use platwrap_init::{
    run_ai_config, show_digest, Confirmer, FileTreeDigest, FixedAnswer, Options,
    TerminalConfirmer,
};

use crate::cli::{GlobalFlags, InitArgs};

pub(crate) async fn handle_init_command(
    ctx: &RequestContext,
    credentials: Arc<dyn CredentialSource>,
    args: &InitArgs,
    flags: &GlobalFlags,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let cwd = std::env::current_dir().context("could not determine the current directory")?;
    let digester = FileTreeDigest::new(ctx.config());
    if args.digest {
        show_digest(&digester, &cwd, stdout)?;
        return Ok(());
    }

    let interactive = !flags.no_interaction && std::io::stdin().is_terminal();
    let opts = options(args, flags, interactive);
    let confirmer: Box<dyn Confirmer> = if interactive {
        Box::new(TerminalConfirmer)
    } else {
        Box::new(FixedAnswer(opts.yes))
    };

    let client = ApiClient::new(&with_event_name(ctx, "init"), credentials)?;
    run_ai_config(
        &client,
        &digester,
        &cwd,
        &opts,
        confirmer.as_ref(),
        stdout,
        stderr,
    )
    .await?;
    Ok(())
}

fn options(args: &InitArgs, flags: &GlobalFlags, interactive: bool) -> Options {
    Options {
        extra_context: args.context.clone().unwrap_or_default(),
        organization_id: args.organization_id.clone().unwrap_or_default(),
        project_id: args.project_id.clone().unwrap_or_default(),
        interactive,
        yes: args.yes || flags.yes,
        debug: flags.debug,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_merge_flags_and_arguments() {
        let args = InitArgs {
            context: Some("uses redis".into()),
            organization_id: Some("org-1".into()),
            ..Default::default()
        };
        let flags = GlobalFlags {
            yes: true,
            debug: true,
            ..Default::default()
        };
        let opts = options(&args, &flags, false);
        assert_eq!(opts.extra_context, "uses redis");
        assert_eq!(opts.organization_id, "org-1");
        assert!(opts.project_id.is_empty());
        assert!(opts.yes);
        assert!(opts.debug);
        assert!(!opts.interactive);
        assert!(opts.request_timeout.is_none());
    }

    #[test]
    fn yes_defaults_off() {
        let opts = options(&InitArgs::default(), &GlobalFlags::default(), true);
        assert!(!opts.yes);
        assert!(opts.interactive);
    }
}
