use clap::{Parser, Subcommand};

use crate::gate::format::Format;
use crate::gate::types::Mode;

// Display order for log level option (placed at end of help text)
const LOG_LEVEL_DISPLAY_ORDER: usize = 100;

/// CLI arguments
#[derive(Parser)]
#[command(name = "configkeeper", version, about = "Validate configuration updates before they are applied", long_about = None)]
pub struct Cli {
    /// Log level (see https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
    /// [env: CONFIGKEEPER_LOG=] [default: info]
    #[arg(
        long,
        env = "CONFIGKEEPER_LOG",
        default_value = "info",
        global = true,
        hide_default_value = true,
        hide_env = true,
        display_order = LOG_LEVEL_DISPLAY_ORDER,
        verbatim_doc_comment
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a default configkeeper.toml config file
    Init(InitArgs),
    /// Serve the configuration endpoint behind the validator
    Serve(ServeArgs),
    /// Run the validator against a local file and print the verdict
    Check(CheckArgs),
}

/// Arguments for the init command
#[derive(Parser)]
pub struct InitArgs {
    /// Path to config file
    #[arg(long, default_value = "configkeeper.toml")]
    pub config: String,

    /// Override existing config file
    #[arg(long)]
    pub r#override: bool,
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Path to config file (initialize with `configkeeper init`, .toml or .yaml)
    #[arg(long, default_value = "configkeeper.toml")]
    pub config: String,

    /// Override config values using dot notation (e.g. validator.mode=lenient)
    #[arg(long = "config-override")]
    pub config_overrides: Vec<String>,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Configuration document to validate
    pub file: String,

    /// Document format [default: from file extension, then content]
    #[arg(long, value_enum)]
    pub format: Option<Format>,

    /// Strictness mode [default: from config]
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Path to config file
    #[arg(long, default_value = "configkeeper.toml")]
    pub config: String,

    /// Override config values using dot notation (e.g. validator.security=true)
    #[arg(long = "config-override")]
    pub config_overrides: Vec<String>,
}
