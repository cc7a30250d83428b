mod cli;
mod config;
mod gate;
mod server;
mod util;

use anyhow::Context;
use clap::Parser;
use cli::{CheckArgs, Cli, Commands, InitArgs};
use config::Config;
use gate::MiddlewareConfig;
use gate::format::Format;
use gate::invoker::Validator;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
// Validator could not produce a verdict
const EXIT_UNAVAILABLE: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&cli.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init(args) => init(&args).map(|_| EXIT_SUCCESS),
        Commands::Serve(args) => match load_config(&args.config, &args.config_overrides) {
            Ok(config) => server::serve(&config).await.map(|_| EXIT_SUCCESS),
            Err(e) => Err(e),
        },
        Commands::Check(args) => check(&args).await,
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

/// Load the config file, falling back to defaults when it does not exist
fn load_config(path: &str, overrides: &[String]) -> anyhow::Result<Config> {
    if !Path::new(path).exists() {
        warn!("Config file {} not found, using defaults", path);
        return Ok(Config::parse("", false, overrides)?);
    }

    debug!("Loading config from {}", path);
    Config::load(path, overrides).with_context(|| format!("Failed to load config {}", path))
}

fn init(args: &InitArgs) -> anyhow::Result<()> {
    if Path::new(&args.config).exists() && !args.r#override {
        anyhow::bail!(
            "Config file {} already exists, use --override to replace it",
            args.config
        );
    }

    let content = Config::default().to_toml()?;
    std::fs::write(&args.config, content)
        .with_context(|| format!("Failed to write {}", args.config))?;
    info!("Created {}", args.config);
    Ok(())
}

/// Validate a local file and print the verdict as JSON
async fn check(args: &CheckArgs) -> anyhow::Result<i32> {
    let mut config = load_config(&args.config, &args.config_overrides)?;
    if let Some(mode) = args.mode {
        config.validator.mode = mode;
    }

    let middleware = MiddlewareConfig::resolve(&config.validator, config.server.max_body_bytes);
    let Some(validator) = middleware.process_validator() else {
        error!("Validator '{}' not found", config.validator.command);
        return Ok(EXIT_UNAVAILABLE);
    };

    let body = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file))?;
    let format = args
        .format
        .or_else(|| Format::from_path(Path::new(&args.file)))
        .unwrap_or_else(|| Format::sniff(&body));
    info!("Checking {} as {} in {} mode", args.file, format, middleware.mode);

    let cancel = CancellationToken::new();
    let verdict = match validator.validate(&body, format, &cancel).await {
        Ok(verdict) => verdict,
        Err(e) => {
            error!("{}", e);
            return Ok(EXIT_UNAVAILABLE);
        }
    };

    for problem in verdict.inconsistencies() {
        warn!("Inconsistent verdict: {}", problem);
    }
    println!("{}", serde_json::to_string_pretty(&verdict)?);

    if verdict.blocks() {
        info!(
            "Blocked: {} errors, {} warnings",
            verdict.errors.len(),
            verdict.warning_count()
        );
        Ok(EXIT_FAILURE)
    } else {
        Ok(EXIT_SUCCESS)
    }
}
