use std::io::{self, Write};

use platwrap_config::version::{AGENT_VERSION, INTERPRETER_VERSION, WRAPPER_VERSION};
use platwrap_config::Config;

pub(crate) fn handle_version_command(cnf: &Config, debug: bool, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{} {WRAPPER_VERSION}", cnf.application.name)?;
    if debug {
        writeln!(out, "Agent version {AGENT_VERSION}")?;
        writeln!(out, "Interpreter version {INTERPRETER_VERSION}")?;
    }
    Ok(())
}
