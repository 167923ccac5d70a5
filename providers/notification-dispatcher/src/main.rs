//! # Notification Dispatcher Binary
//!
//! Reads a notification request as JSON from a file (or stdin), delivers it
//! through the configured channel strategies and prints the resulting
//! status as JSON.
//!
//! Usage: `notification-dispatcher [request.json]`

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use notification_common::NotificationRequest;
use notification_dispatcher::{build_sender, DispatcherConfig};

async fn read_request(path: Option<&str>) -> Result<NotificationRequest> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read request file {}", path))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read request from stdin")?;
            raw
        }
    };

    serde_json::from_str(&raw).context("Failed to parse notification request")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with environment filter
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("notification_dispatcher=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting notification dispatcher");

    let config = DispatcherConfig::from_env().context("Failed to load dispatcher configuration")?;
    info!("Configured channels: {}", config.channels.len());

    let signal = CancellationToken::new();
    let sender = build_sender(&config, signal.clone()).context("Invalid dispatcher configuration")?;

    let shutdown = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            shutdown.cancel();
        }
    });

    let path = std::env::args().nth(1);
    let request = read_request(path.as_deref()).await?;

    let status = sender
        .send(&request)
        .await
        .context("Failed to dispatch notification")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&status).context("Failed to serialize status")?
    );

    if status.is_success() {
        info!("Notification dispatched");
    } else {
        error!("Notification dispatched with errors");
        std::process::exit(1);
    }

    Ok(())
}
