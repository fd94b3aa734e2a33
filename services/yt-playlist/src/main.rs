//! yt-playlist
//!
//! Single-binary CLI that:
//! 1. Loads configuration (file, env, defaults)
//! 2. Acquires an authorized YouTube handle, reusing or refreshing the
//!    stored token and falling back to browser consent
//! 3. Runs one playlist command
//! 4. Prints the result as JSON on stdout (`{"error": ...}` and exit 1 on failure)

mod cli;
mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use youtube_api::YouTube;
use youtube_auth::{BrowserLauncher, CredentialManager, PrintUrl, SystemBrowser};

use crate::cli::Cli;
use crate::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    // JSON logs on stderr; stdout carries command output only
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match commands::usage_error_output(&e) {
            Some(output) => {
                print_json(&output);
                return ExitCode::FAILURE;
            }
            None => e.exit(),
        },
    };

    match run(cli).await {
        Ok(output) => {
            print_json(&output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            print_json(&commands::error_output(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Value> {
    let (config_path, explicit) = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), explicit, "loading configuration");

    let config = if explicit {
        Config::load(&config_path)
    } else {
        Config::load_or_default(&config_path)
    }
    .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        client_secrets = %config.auth.client_secrets_path.display(),
        token_file = %config.auth.token_path.display(),
        api_base = %config.api.base_url,
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let launcher: Arc<dyn BrowserLauncher> = if config.auth.open_browser {
        Arc::new(SystemBrowser)
    } else {
        Arc::new(PrintUrl)
    };
    let manager = CredentialManager::new(config.auth_config(), http).with_launcher(launcher);
    let client = manager.acquire().await?;

    let yt = YouTube::new(client, config.api.base_url.clone());
    commands::execute(cli.command, &yt).await
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => println!("{{\"error\": \"failed to encode output: {e}\"}}"),
    }
}
