use anyhow::Context;
use clap::Parser;
use kiosk_watch::{Cli, WatchConfig, Watcher, init_logger};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (.env) and CLI
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // 2. Configuration
    let config = WatchConfig::try_from(cli).context("invalid configuration")?;

    // 3. Logging
    let _log_guard = init_logger(&config.log_level, config.log_dir.as_deref());

    tracing::info!("Kiosk watcher starting...");

    // 4. Collaborators (source, printer, renderer) - fatal if unavailable
    let watcher = Watcher::from_config(&config)
        .await
        .context("startup failed")?;

    // 5. Ctrl+C stops the loop after the current iteration
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Interrupt received, finishing current iteration");
        signal.cancel();
    });

    let stats = watcher.run(shutdown).await;

    tracing::info!(
        iterations = stats.iterations,
        printed = stats.printed,
        failed = stats.failed,
        given_up = stats.given_up,
        listing_failures = stats.listing_failures,
        "Kiosk watcher stopped"
    );

    Ok(())
}
