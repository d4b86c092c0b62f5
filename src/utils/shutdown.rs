use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;

/// Resolves on Ctrl+C or SIGTERM (what container platforms send on redeploy).
pub async fn shutdown_signal() -> anyhow::Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<anyhow::Result<()>>();

    tokio::select! {
        res = ctrl_c => res?,
        res = terminate => res?,
    }

    Ok(())
}

/// Spawns a listener that flips the returned channel to `true` on shutdown.
pub fn spawn_shutdown_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            tracing::error!("Error while waiting for shutdown signal: {}", e);
            // a dropped sender reads as shutdown, so hold it open
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received, stopping...");
        let _ = tx.send(true);
        // keep the sender alive so receivers see `true` rather than a closed channel
        tx.closed().await;
    });
    rx
}

/// Future that completes once `rx` observes shutdown, for `with_graceful_shutdown`.
pub async fn wait_for(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
