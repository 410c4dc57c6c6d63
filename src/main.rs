use std::sync::atomic::Ordering;

use anyhow::Context;

use mail2bark::classifier::GeminiClassifier;
use mail2bark::config::Config;
use mail2bark::notifier::BarkNotifier;
use mail2bark::poller::spawn_poller;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().context("loading configuration")?;

    eprintln!("📬 mail2bark v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   IMAP: {}:{}", config.mail.host, config.mail.port);
    eprintln!("   Account: {}", config.mail.user);
    eprintln!("   Model: {}", config.classifier.model);
    eprintln!("   Poll interval: {}s\n", config.poll_interval_secs);

    let classifier = GeminiClassifier::new(config.classifier.clone());
    let notifier =
        BarkNotifier::new(config.bark.clone()).context("validating Bark configuration")?;

    let (handle, shutdown) = spawn_poller(config, classifier, notifier);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    eprintln!("\nShutting down...");
    shutdown.store(true, Ordering::Relaxed);
    handle.await?;

    Ok(())
}
