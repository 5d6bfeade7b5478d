use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clap_derive::Parser;
use homeworks_hub_rs::bridge::start_bridge;
use homeworks_hub_rs::logging::{LogConfig, setup_console_logging, setup_file_logging};
use homeworks_hub_rs::{HomeworksOptions, LoggingSink, Settings};

#[derive(Parser, Debug)]
pub struct Params {
    /// Hostname or IP address of the Homeworks processor (overrides the settings file)
    #[clap(long)]
    host: Option<String>,
    /// Integration port of the processor (overrides the settings file)
    #[clap(long)]
    port: Option<u16>,
    /// Integration user (overrides the settings file)
    #[clap(long)]
    user: Option<String>,
    /// Integration password (overrides the settings file)
    #[clap(long)]
    password: Option<String>,
    /// Settings file path (if not set, default settings are used)
    #[clap(long)]
    settings: Option<String>,
    /// Log file path (if not set, logs to stdout)
    #[clap(long)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();

    let _log_guard = match &params.log_file {
        Some(path) => setup_file_logging(LogConfig::from_path(path))?,
        None => setup_console_logging(),
    };

    let settings = Settings::load_or_default(params.settings.as_deref())?;
    let host = params
        .host
        .or_else(|| settings.host.clone())
        .context("No processor host given, use --host or set it in the settings file")?;

    let options = HomeworksOptions::builder()
        .host(host)
        .port(params.port.unwrap_or(settings.port))
        .user(params.user.unwrap_or_else(|| settings.username.clone()))
        .password(params.password.unwrap_or_else(|| settings.password.clone()))
        .build()?;

    start_bridge(options, settings, Arc::new(LoggingSink)).await
}
