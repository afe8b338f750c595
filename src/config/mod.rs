pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "flash-form")]
#[command(about = "Process a form submission through the Flash Form pipeline")]
pub struct CliConfig {
    /// Path to the forms TOML configuration file
    #[arg(short, long, default_value = "forms.toml")]
    pub config: String,

    /// Id of the form being submitted
    #[arg(long)]
    pub form_id: String,

    /// JSON file with the submitted fields (object of string / string-array values)
    #[arg(long)]
    pub payload: Option<String>,

    /// Raw `application/x-www-form-urlencoded` body instead of a JSON payload
    #[arg(long, conflicts_with = "payload")]
    pub urlencoded: Option<String>,

    #[arg(long, default_value = "127.0.0.1")]
    pub remote_addr: String,

    #[arg(long)]
    pub x_forwarded_for: Option<String>,

    /// Submission comes from a logged-in user
    #[arg(long)]
    pub authenticated: bool,

    /// Print the JSON envelope used by background submissions
    #[arg(long)]
    pub async_response: bool,

    /// Print a fresh nonce token for the form and exit
    #[arg(long)]
    pub issue_nonce: bool,

    #[arg(long)]
    pub json_logs: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}
