//! Process entry point: profile loading, logging, routing and exit codes.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use platwrap_agent::{AgentError, AgentWrapper};
use platwrap_alt::update;
use platwrap_auth::{AgentCredentialSource, CredentialSource};
use platwrap_config::{Config, RequestContext};
use tracing_subscriber::EnvFilter;

use crate::cli::{route, GlobalFlags, NativeCommand, Route};
use crate::commands::{
    handle_agent_command, handle_api_curl_command, handle_config_install_command,
    handle_init_command, handle_version_command,
};

/// Everything one invocation needs.
struct App {
    ctx: RequestContext,
    agent: Arc<AgentWrapper>,
    flags: GlobalFlags,
}

impl App {
    fn new(config: Arc<Config>, flags: GlobalFlags) -> Self {
        let agent = AgentWrapper::new(config.clone())
            .with_debug(flags.debug)
            .with_disable_interaction(flags.no_interaction);
        Self {
            ctx: RequestContext::new(config),
            agent: Arc::new(agent),
            flags,
        }
    }

    fn config(&self) -> &Config {
        self.ctx.config()
    }

    fn credentials(&self) -> Arc<dyn CredentialSource> {
        Arc::new(AgentCredentialSource::new(
            self.agent.clone(),
            self.ctx.cancellation().clone(),
        ))
    }

    fn stderr(&self) -> Box<dyn Write> {
        if self.flags.suppress_stderr() {
            Box::new(io::sink())
        } else {
            Box::new(io::stderr())
        }
    }

    async fn dispatch(&self, route: Route) -> Result<()> {
        let cli = match route {
            Route::Delegate(args) => {
                return handle_agent_command(&self.agent, self.ctx.cancellation(), args).await
            }
            Route::Version => {
                return Ok(handle_version_command(self.config(), self.flags.debug, &mut io::stdout())?)
            }
            Route::Native(cli) => cli,
        };
        let mut stdout = io::stdout();
        let mut stderr = self.stderr();
        match cli.command {
            NativeCommand::ApiCurl(args) => {
                handle_api_curl_command(&self.ctx, self.credentials(), &args, &mut stdout).await
            }
            NativeCommand::Init(args) => {
                handle_init_command(
                    &self.ctx,
                    self.credentials(),
                    &args,
                    &self.flags,
                    &mut stdout,
                    &mut stderr,
                )
                .await
            }
            NativeCommand::ConfigInstall(args) => {
                handle_config_install_command(&self.ctx, &args, &mut stderr).await
            }
            NativeCommand::Version => Ok(handle_version_command(
                self.config(),
                self.flags.debug,
                &mut stdout,
            )?),
        }
    }

    /// Refresh an installed alternate profile. Failures are only logged.
    async fn check_config_update(&self) {
        match update(&self.ctx).await {
            Ok(outcome) => {
                tracing::debug!(target: "platwrap::app", ?outcome, "Config update check finished")
            }
            Err(e) => tracing::debug!(target: "platwrap::app", error = %e, "Config update failed"),
        }
    }
}

/// The main entry point for the wrapper binary.
pub fn run() -> ExitCode {
    let args: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    let config = match platwrap_config::load() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let flags = GlobalFlags::scan(&args, &config);
    init_tracing(flags.debug);

    let route = match route(&args, &config.application.executable) {
        Ok(route) => route,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(2));
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("could not start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let app = App::new(config, flags);
    let result = runtime.block_on(async {
        let result = app.dispatch(route).await;
        app.check_config_update().await;
        result
    });
    exit_code(result)
}

/// `RUST_LOG` wins; otherwise `debug` with `--debug`, else `warn`.
fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Map a command result to the process exit code.
///
/// An agent that exited non-zero has already reported its own error, so
/// only its code is passed on.
fn exit_code(result: Result<()>) -> ExitCode {
    ExitCode::from(exit_status(result))
}

fn exit_status(result: Result<()>) -> u8 {
    let Err(err) = result else {
        return 0;
    };
    match err.downcast_ref::<AgentError>() {
        Some(AgentError::Exited { .. }) => {
            tracing::debug!(target: "platwrap::app", error = %err, "Agent command failed")
        }
        _ => eprintln!("{err}"),
    }
    let code = err
        .chain()
        .find_map(|e| e.downcast_ref::<AgentError>())
        .and_then(AgentError::exit_code)
        .unwrap_or(1);
    u8::try_from(code).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn agent_exit_codes_pass_through() {
        let err = anyhow::Error::from(AgentError::Exited {
            code: 3,
            stderr: String::new(),
        });
        assert_eq!(exit_status(Err(err)), 3);
    }

    #[test]
    fn other_failures_exit_with_one() {
        assert_eq!(exit_status(Err(anyhow!("boom"))), 1);
        assert_eq!(exit_status(Err(AgentError::Terminated.into())), 1);
        assert_eq!(exit_status(Ok(())), 0);
    }

    #[test]
    fn wrapped_agent_exit_code_is_found_in_the_chain() {
        let err = anyhow::Error::from(AgentError::Exited {
            code: 4,
            stderr: String::new(),
        })
        .context("login required");
        assert_eq!(exit_status(Err(err)), 4);
    }
}
