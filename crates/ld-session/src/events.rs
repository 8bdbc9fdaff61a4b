use ld_wallet::WalletEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::SessionManager;

impl SessionManager {
    /// Applies wallet events one at a time, in emission order, until the transport
    /// closes. A lagged receiver resynchronises from the wallet instead of replaying.
    pub async fn run_events(&self, mut events: broadcast::Receiver<WalletEvent>) {
        loop {
            match events.recv().await {
                Ok(WalletEvent::AccountsChanged(accounts)) => {
                    debug!(count = accounts.len(), "accountsChanged");
                    self.on_accounts_changed(accounts).await;
                }
                Ok(WalletEvent::ChainChanged(raw)) => {
                    debug!(raw = %raw, "chainChanged");
                    self.on_chain_changed(&raw).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "wallet event stream lagged, refreshing wallet state");
                    if let Err(err) = self.refresh_wallet_state().await {
                        warn!(error = %err, "failed to refresh wallet state");
                    }
                }
                Err(RecvError::Closed) => {
                    self.reset_after_fault("wallet event stream closed").await;
                    break;
                }
            }
        }
    }

    /// Spawns [`SessionManager::run_events`] on the wallet's event stream, if it has one.
    pub fn spawn_event_pump(&self) -> Option<JoinHandle<()>> {
        let events = self.inner.factory.subscribe()?;
        let session = self.clone();
        Some(tokio::spawn(async move { session.run_events(events).await }))
    }
}
