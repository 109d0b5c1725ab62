//! Command routing for the platwrap CLI.
//!
//! `api:curl`, `init` (with its aliases), `config:install` and `version` are
//! handled here. Every other command, help included, is run by the external
//! agent with the arguments exactly as given.
//!
//! The `run` function is the binary's entry point. After each command a
//! best-effort check refreshes the active profile if it was installed from
//! a URL.

mod app;
mod cli;
mod commands;

pub use app::run;
pub use cli::{
    is_native, route, Cli, CurlArgs, GlobalArgs, GlobalFlags, InitArgs, InstallArgs,
    NativeCommand, Route,
};
