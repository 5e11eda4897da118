use anyhow::Result;
use repsol_sync::config::Config;
use repsol_sync::logging::init_logging;
use repsol_sync::{
    AccountApi, ApiClient, AuthSession, Coordinator, HttpAccountApi, RefreshEvent, Scheduler,
};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config =
        Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config.apply_env_overrides();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    info!("repsol-sync {} starting up", env!("CARGO_PKG_VERSION"));

    let api: Arc<dyn AccountApi> = Arc::new(
        HttpAccountApi::new(config.api.clone())
            .map_err(|e| anyhow::anyhow!("Failed to create API client: {}", e))?,
    );
    let auth = Arc::new(AuthSession::new(
        Arc::clone(&api),
        config.account.credentials(),
    ));
    let coordinator = Coordinator::new(
        ApiClient::new(api, auth),
        config.account.contract_id.clone(),
    );

    // Log cycle outcomes the way a device layer would consume them
    let mut events = coordinator.subscribe();
    let event_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RefreshEvent::Completed { cups }) => {
                    info!("Refresh completed: {}", cups.join(", "));
                }
                Ok(RefreshEvent::Failed { kind, message }) => {
                    warn!("Refresh failed ({}): {}", kind, message);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Dropped {} refresh event(s)", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            // Keep the sender alive so the scheduler keeps running
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let scheduler = Scheduler::new(coordinator.clone(), &config.sync);
    scheduler.run(shutdown_rx).await;

    event_task.abort();
    info!("Shutdown complete");
    Ok(())
}
