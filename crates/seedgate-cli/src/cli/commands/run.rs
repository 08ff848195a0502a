//! `seedgate run` – run contributors and the control loop until shutdown.

use anyhow::Result;
use seedgate_core::config::SeedgateConfig;
use seedgate_core::daemon::Daemon;
use tokio_util::sync::CancellationToken;

pub async fn run_daemon(cfg: &SeedgateConfig) -> Result<()> {
    let daemon = Daemon::from_config(cfg)?;
    tracing::info!(
        "starting seedgate: {} client(s), {} media server(s), {} schedule(s)",
        cfg.clients.len(),
        cfg.media_servers.len(),
        cfg.schedules.len()
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        tracing::info!("shutdown requested");
        shutdown.cancel();
    });

    daemon.run(cancel).await
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
