use clap::{Args, CommandFactory, Parser, Subcommand};
use platwrap_config::Config;
use std::path::PathBuf;

/// Commands handled by the wrapper itself.
///
/// Anything not listed here is passed to the external agent untouched.
#[derive(Debug, Parser)]
#[command(
    name = "platwrap",
    disable_help_subcommand = true,
    disable_version_flag = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: NativeCommand,
}

/// Flags accepted by every command. They are also scanned from the raw
/// arguments so that delegated commands see the same settings.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Enable debug logging.
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
    /// Enable non-interactive mode.
    #[arg(long, global = true, default_value_t = false)]
    pub no_interaction: bool,
    /// Enable verbose output.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
    /// Suppress messages on stderr. Implies --no-interaction unless verbose.
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum NativeCommand {
    /// Runs an authenticated cURL-like request against the API.
    #[command(name = "api:curl")]
    ApiCurl(CurlArgs),
    /// Generates a project configuration file with AI.
    #[command(name = "init", visible_aliases = ["project:init", "ify"])]
    Init(InitArgs),
    /// Installs an alternate CLI from a remote profile URL.
    #[command(name = "config:install")]
    ConfigInstall(InstallArgs),
    /// Prints the version number.
    Version,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CurlArgs {
    /// API path or absolute URL.
    #[arg(value_name = "PATH")]
    pub path: Option<String>,
    /// The request method to use.
    #[arg(short = 'X', long = "request", value_name = "METHOD")]
    pub request: Option<String>,
    /// Data to send.
    #[arg(short = 'd', long, value_name = "DATA")]
    pub data: Option<String>,
    /// JSON data to send.
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,
    /// Include headers in the output.
    #[arg(short = 'i', long, default_value_t = false)]
    pub include: bool,
    /// Fetch headers only.
    #[arg(short = 'I', long, default_value_t = false)]
    pub head: bool,
    /// Do not request compressed responses.
    #[arg(long, default_value_t = false)]
    pub disable_compression: bool,
    /// Accepted for curl compatibility; has no effect.
    #[arg(long, hide = true, default_value_t = false)]
    pub enable_glob: bool,
    /// Disable the automatic retry on 401 errors.
    #[arg(long = "no-retry-401", default_value_t = false)]
    pub no_retry_401: bool,
    /// Fail with no output on an error response. On unless --no-retry-401 is given.
    #[arg(short = 'f', long, default_value_t = false)]
    pub fail: bool,
    /// Extra header, as "Name: value" or "Name=value" (repeatable).
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct InitArgs {
    /// Print the project digest instead of generating a configuration.
    #[arg(long, default_value_t = false)]
    pub digest: bool,
    /// Extra context for the AI about the project.
    #[arg(long, value_name = "TEXT")]
    pub context: Option<String>,
    /// Organization ID sent with the request.
    #[arg(long = "org", value_name = "ID")]
    pub organization_id: Option<String>,
    /// Project ID sent with the request.
    #[arg(long = "project", value_name = "ID")]
    pub project_id: Option<String>,
    /// Overwrite an existing configuration without asking.
    #[arg(short, long, default_value_t = false)]
    pub yes: bool,
}

#[derive(Debug, Clone, Args)]
pub struct InstallArgs {
    /// URL of the profile to install.
    #[arg(required = true, value_name = "URL")]
    pub url: String,
    /// Directory for the profile file.
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
    /// Directory for the launcher.
    #[arg(long, value_name = "DIR")]
    pub bin_dir: Option<PathBuf>,
}

/// Settings that apply whichever way a command runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalFlags {
    pub debug: bool,
    pub no_interaction: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub yes: bool,
}

impl GlobalFlags {
    /// Read global flags from raw arguments and the environment.
    pub fn scan(args: &[String], cnf: &Config) -> Self {
        let mut flags = GlobalFlags::default();
        for arg in args {
            match arg.as_str() {
                "--" => break,
                "--debug" => flags.debug = true,
                "--no-interaction" => flags.no_interaction = true,
                "-v" | "-vv" | "-vvv" | "--verbose" => flags.verbose = true,
                "-q" | "--quiet" => flags.quiet = true,
                "-y" | "--yes" => flags.yes = true,
                _ => {}
            }
        }
        flags.debug |= cnf.env_flag("DEBUG");
        flags.no_interaction |= cnf.env_flag("NO_INTERACTION");
        flags.yes |= cnf.env_flag("YES");
        if flags.suppress_stderr() {
            flags.no_interaction = true;
        }
        flags
    }

    /// Quiet wins only when neither debug nor verbose output was asked for.
    pub fn suppress_stderr(&self) -> bool {
        self.quiet && !self.debug && !self.verbose
    }
}

/// How one invocation is handled.
#[derive(Debug)]
pub enum Route {
    Native(Cli),
    Version,
    Delegate(Vec<String>),
}

/// True when `name` (or an alias) is a native command.
pub fn is_native(name: &str) -> bool {
    Cli::command().find_subcommand(name).is_some()
}

/// Decide whether the wrapper or the agent runs `args`.
///
/// The command name is the first argument that is not a flag. A bare
/// `-h`/`--help` becomes the agent's `list`, and `-V`/`--version` before any
/// command prints the wrapper version.
pub fn route(args: &[String], bin_name: &str) -> Result<Route, clap::Error> {
    let command = args.iter().position(|a| !a.starts_with('-'));
    match command {
        Some(i) if is_native(&args[i]) => {
            let argv = std::iter::once(bin_name.to_string()).chain(args.iter().cloned());
            Ok(Route::Native(Cli::try_parse_from(argv)?))
        }
        Some(_) => Ok(Route::Delegate(args.to_vec())),
        None if args.iter().any(|a| a == "-V" || a == "--version") => Ok(Route::Version),
        None if args.len() == 1 && (args[0] == "-h" || args[0] == "--help") => {
            Ok(Route::Delegate(vec!["list".to_string()]))
        }
        None => Ok(Route::Delegate(args.to_vec())),
    }
}
