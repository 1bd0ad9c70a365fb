//! apns-push CLI - send one notification to many device tokens.
//!
//! This is the main binary entry point. See the `apns_push` library for
//! the core functionality.

use std::path::PathBuf;

use anyhow::{Context, Result};
use apns_push::{ApnsClient, Config, DeliveryOptions, Payload, Priority};
use clap::{Parser, Subcommand};

// CLI
#[derive(Parser)]
#[command(name = "apns-push")]
#[command(version)]
#[command(about = "Send push notifications to APNs over a single HTTP/2 connection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one payload to every listed device token
    Send {
        /// Config file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Topic (overrides the config's default topic)
        #[arg(long)]
        topic: Option<String>,
        /// Delivery priority: immediate or delayed
        #[arg(long, default_value = "immediate")]
        priority: Priority,
        /// Expiration as seconds since the Unix epoch
        #[arg(long)]
        expiration: Option<i64>,
        /// Plain alert text
        #[arg(long, conflicts_with = "payload")]
        alert: Option<String>,
        /// Full payload as raw JSON
        #[arg(long)]
        payload: Option<String>,
        /// Hex device tokens
        #[arg(required = true)]
        tokens: Vec<String>,
    },
}

fn build_payload(alert: Option<String>, raw: Option<String>) -> Result<Payload> {
    match (alert, raw) {
        (_, Some(raw)) => serde_json::from_str(&raw).context("Invalid --payload JSON"),
        (Some(alert), None) => Ok(Payload::new().alert(alert)),
        (None, None) => anyhow::bail!("One of --alert or --payload is required"),
    }
}

async fn run_send(
    config_path: Option<PathBuf>,
    topic: Option<String>,
    priority: Priority,
    expiration: Option<i64>,
    alert: Option<String>,
    raw_payload: Option<String>,
    tokens: Vec<String>,
) -> Result<()> {
    let config_path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;
    let payload = build_payload(alert, raw_payload)?;
    let options = DeliveryOptions {
        priority,
        topic: topic.or_else(|| config.topic.clone()),
        expiration,
    };

    let mut client = ApnsClient::from_config(&config)?;
    log::info!("{:?} sending to {} tokens", client, tokens.len());

    let mut batch = client.send_notification_batch(tokens, &payload, &options).await?;
    let mut failures = 0usize;
    while let Some(item) = batch.next().await {
        let (token, outcome) = item?;
        if !outcome.is_success() {
            failures += 1;
        }
        println!("{token}\t{outcome}");
    }

    if failures > 0 {
        log::warn!("{} notifications rejected", failures);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Send {
            config,
            topic,
            priority,
            expiration,
            alert,
            payload,
            tokens,
        } => run_send(config, topic, priority, expiration, alert, payload, tokens).await,
    }
}
