//! Handlers for the native commands and agent delegation.

mod agent;
mod api_curl;
mod config_install;
mod init;
mod version;

pub(crate) use agent::handle_agent_command;
pub(crate) use api_curl::handle_api_curl_command;
pub(crate) use config_install::handle_config_install_command;
pub(crate) use init::handle_init_command;
pub(crate) use version::handle_version_command;
