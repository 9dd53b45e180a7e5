use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use feedrelay::config::Config;
use feedrelay::pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "feedrelay",
    about = "Polls a syndication feed and fans entries out to per-category file and email sinks"
)]
struct Args {
    /// Path to the TOML config file (missing file uses built-in defaults)
    #[arg(long, value_name = "FILE", default_value = "feedrelay.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    if args.check {
        println!(
            "Configuration OK: feed {}, {} route(s), {} sink(s), poll every {}ms",
            config.feed.url,
            config.routes.len(),
            config.sinks.len(),
            config.feed.poll_interval_ms
        );
        return Ok(());
    }

    tracing::info!(
        feed = %config.feed.url,
        interval_ms = config.feed.poll_interval_ms,
        sinks = config.sinks.len(),
        "Starting feedrelay"
    );

    let pipeline = Pipeline::start(config).context("Failed to start pipeline")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, draining");

    pipeline.shutdown().await;
    Ok(())
}
