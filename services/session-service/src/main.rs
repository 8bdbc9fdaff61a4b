use anyhow::Context;
use ld_api_types::{AutoConnectOutcome, NoticeLevel};
use ld_network::NetworkRegistry;
use ld_session::SessionManager;
use ld_storage::{JsonFileStore, KeyValueStore};
use ld_wallet::{HttpTransport, ProviderFactory, WalletTransport};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

mod config;
mod routes;

use config::ServiceConfig;
use routes::{AppState, SERVICE_NAME, app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env()?;

    let factory = match &config.rpc_url {
        Some(rpc_url) => {
            let transport = Arc::new(HttpTransport::new(rpc_url.as_str()));
            transport.spawn_poller(config.poll_interval);
            info!(endpoint = transport.endpoint(), "using JSON-RPC wallet transport");
            let transport: Arc<dyn WalletTransport> = transport;
            ProviderFactory::new(Some(transport))
        }
        None => {
            warn!("LOTTERY_RPC_URL is not set; running without a wallet");
            ProviderFactory::new(None)
        }
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(
        JsonFileStore::open(&config.state_path)
            .await
            .with_context(|| format!("failed to open session state at {}", config.state_path.display()))?,
    );

    let session = SessionManager::new(
        factory,
        Arc::new(NetworkRegistry::builtin()),
        store,
        config.session.clone(),
    )
    .await;

    spawn_notice_log(&session);
    if session.spawn_event_pump().is_none() {
        warn!("wallet transport has no event stream; session follows explicit refreshes only");
    }

    match session.auto_connect().await {
        AutoConnectOutcome::Attempted(outcome) => info!(connected = outcome.is_connected(), "auto-connect attempted"),
        skipped => info!(outcome = ?skipped, "auto-connect skipped"),
    }

    let app = app(AppState { session });

    info!("{} listening on {}", SERVICE_NAME, config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Notices are toasts in a browser; here they end up in the log.
fn spawn_notice_log(session: &SessionManager) {
    let mut notices = session.notices();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => match notice.level {
                    NoticeLevel::Error => error!(message = %notice.message, "notice"),
                    NoticeLevel::Warning => warn!(message = %notice.message, "notice"),
                    NoticeLevel::Info | NoticeLevel::Success => info!(message = %notice.message, "notice"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notice log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
