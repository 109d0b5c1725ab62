//! Command-line interface for the platwrap wrapper.
//!
//! This crate serves as the main entry point for the executable, delegating
//! its core functionality to the `platwrap-app` crate.

fn main() -> std::process::ExitCode {
    platwrap_app::run()
}
