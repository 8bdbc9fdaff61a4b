use alloy_primitives::Address;
use ld_api_types::{
    AutoConnectOutcome, ChainId, ConnectOutcome, ErrorKind, FailureReport, Notice, NoticeLevel,
    SessionSnapshot, SessionStatus, SwitchOutcome, format_address,
};
use ld_contracts::{BindingRegistry, BindingSet};
use ld_network::NetworkRegistry;
use ld_storage::{KeyValueStore, USER_DISCONNECTED_KEY, read_flag, write_flag};
use ld_wallet::{Provider, ProviderFactory, WalletError, WalletResult};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::SessionConfig;
use crate::state::{Generation, SessionState};

const NOTICE_CAPACITY: usize = 64;

/// Owns the wallet session. Cheap to clone; every clone drives the same state.
///
/// The state lock is never held across a wallet request. Async transitions capture a
/// [`Generation`] first and discard their result if a newer transition ran meanwhile.
#[derive(Clone)]
pub struct SessionManager {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub factory: ProviderFactory,
    pub bindings: BindingRegistry,
    pub store: Arc<dyn KeyValueStore>,
    pub config: SessionConfig,
    pub state: Mutex<SessionState>,
    snapshots: watch::Sender<SessionSnapshot>,
    notices: broadcast::Sender<Notice>,
}

impl SessionManager {
    /// Restores the persisted disconnect flag. Call [`SessionManager::auto_connect`]
    /// afterwards to reconnect silently.
    pub async fn new(
        factory: ProviderFactory,
        networks: Arc<NetworkRegistry>,
        store: Arc<dyn KeyValueStore>,
        config: SessionConfig,
    ) -> Self {
        let user_disconnected = match read_flag(store.as_ref(), USER_DISCONNECTED_KEY).await {
            Ok(flag) => flag,
            Err(err) => {
                warn!(error = %err, "failed to read persisted disconnect flag");
                false
            }
        };

        let bindings = BindingRegistry::new(networks, config.vault_policy);
        let state = SessionState {
            user_disconnected,
            ..SessionState::default()
        };
        let (snapshots, _) = watch::channel(state.snapshot(bindings.networks()));
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                factory,
                bindings,
                store,
                config,
                state: Mutex::new(state),
                snapshots,
                notices,
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    pub fn networks(&self) -> &NetworkRegistry {
        self.inner.bindings.networks()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn wallet_available(&self) -> bool {
        self.inner.factory.is_available()
    }

    /// Current contract handles, e.g. for submitting router transactions.
    pub async fn bindings(&self) -> BindingSet {
        self.inner.state.lock().await.bindings.clone()
    }

    pub fn network_name(&self) -> String {
        self.snapshot().network_name
    }

    pub fn is_network_supported(&self) -> bool {
        self.snapshot().network_supported
    }

    pub fn is_on_recommended_network(&self) -> bool {
        self.snapshot().chain_id == Some(self.networks().recommended_chain_id())
    }

    /// Interactive connect. Concurrent calls share one wallet prompt and its outcome.
    ///
    /// The attempt runs on its own task, so dropping the returned future does not leave
    /// the session in `Connecting`.
    pub async fn connect(&self, silent: bool) -> ConnectOutcome {
        let pending = {
            let mut state = self.inner.state.lock().await;
            if let Some(pending) = state.connect_in_flight.clone() {
                // A dropped sender means the attempt task died; start over.
                if pending.has_changed().is_ok() {
                    drop(state);
                    debug!("joining in-flight connection attempt");
                    return join_in_flight(pending).await;
                }
            }

            let (done, pending) = watch::channel(None);
            state.connect_in_flight = Some(pending.clone());
            state.status = SessionStatus::Connecting;
            state.clear_connection();
            state.observed_accounts = None;
            state.user_disconnected = false;
            self.publish(&state);

            let attempt = self.clone();
            let captured = state.generation;
            tokio::spawn(async move { attempt.run_connect(done, captured, silent).await });
            pending
        };

        join_in_flight(pending).await
    }

    async fn run_connect(
        self,
        done: watch::Sender<Option<ConnectOutcome>>,
        captured: Generation,
        silent: bool,
    ) {
        if let Err(err) = write_flag(self.inner.store.as_ref(), USER_DISCONNECTED_KEY, false).await {
            warn!(error = %err, "failed to persist disconnect flag");
        }

        let attempt = self.request_connection().await;
        let (outcome, bind_error) = self.finish_connect(attempt, captured).await;
        self.after_connect(&outcome, bind_error, silent).await;
        done.send_replace(Some(outcome));
    }

    async fn request_connection(&self) -> WalletResult<(Provider, Address, ChainId)> {
        let provider = self.inner.factory.create_provider()?;
        let accounts = provider.request_accounts().await?;
        let account = accounts
            .first()
            .copied()
            .ok_or_else(|| WalletError::Rpc("wallet returned no accounts".to_owned()))?;
        let chain_id = provider.chain_id().await?;
        Ok((provider, account, chain_id))
    }

    async fn finish_connect(
        &self,
        attempt: WalletResult<(Provider, Address, ChainId)>,
        captured: Generation,
    ) -> (ConnectOutcome, Option<WalletError>) {
        let mut state = self.inner.state.lock().await;
        state.connect_in_flight = None;

        if state.generation.session != captured.session {
            debug!("connection attempt overtaken by a disconnect");
            return (superseded("connection attempt was superseded by a disconnect"), None);
        }

        let (provider, mut account, mut chain_id) = match attempt {
            Ok(connection) => connection,
            Err(err) => {
                warn!(error = %err, "wallet connection failed");
                state.status = SessionStatus::Error;
                state.clear_connection();
                state.connection_error = Some(err.to_string());
                self.publish(&state);
                return (ConnectOutcome::Failed(err.report()), None);
            }
        };

        if state.generation.account != captured.account {
            match state
                .observed_accounts
                .as_ref()
                .and_then(|accounts| accounts.first().copied())
            {
                Some(latest) => {
                    debug!(account = %latest, "account changed while connecting");
                    account = latest;
                }
                None => {
                    state.status = SessionStatus::Disconnected;
                    state.clear_connection();
                    self.publish(&state);
                    return (superseded("wallet revoked access while connecting"), None);
                }
            }
        }
        if state.generation.chain != captured.chain {
            if let Some(latest) = state.observed_chain {
                debug!(chain_id = %latest, "chain changed while connecting");
                chain_id = latest;
            }
        }

        let bind_error = self.apply_connection(&mut state, provider, account, chain_id);
        state.observed_accounts = Some(vec![account]);
        self.publish(&state);
        (ConnectOutcome::Connected { account, chain_id }, bind_error)
    }

    async fn after_connect(&self, outcome: &ConnectOutcome, bind_error: Option<WalletError>, silent: bool) {
        match outcome {
            ConnectOutcome::Connected { account, chain_id } => {
                info!(account = %account, chain_id = %chain_id, silent, "wallet connected");
                if !silent {
                    self.notify(
                        NoticeLevel::Success,
                        format!("Wallet connected: {}", format_address(account)),
                    );
                }
                self.warn_missing_bindings(*chain_id, bind_error);

                if !self.networks().is_supported(*chain_id) {
                    let target = self.networks().recommended_chain_id();
                    info!(chain_id = %target, from = %chain_id, "connected on an unsupported network, requesting a switch");
                    self.request_switch(target, NoticeLevel::Warning).await;
                }
            }
            ConnectOutcome::Failed(report) => {
                if silent || report.kind == ErrorKind::Superseded {
                    return;
                }
                let message = match report.kind {
                    ErrorKind::UserRejected => "Connection cancelled".to_owned(),
                    ErrorKind::WalletUnavailable => {
                        "No wallet found. Install a browser wallet to continue".to_owned()
                    }
                    ErrorKind::RequestPending => {
                        "A wallet request is already pending. Check your wallet".to_owned()
                    }
                    _ => format!("Failed to connect wallet: {}", report.message),
                };
                self.notify(NoticeLevel::Error, message);
            }
        }
    }

    /// Explicit user disconnect. Arms the guard before touching anything else.
    pub async fn disconnect(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.guard_until = Some(Instant::now() + self.inner.config.disconnect_guard);
            state.generation.session += 1;
            state.status = SessionStatus::Disconnected;
            state.clear_connection();
            state.observed_accounts = None;
            state.observed_chain = None;
            state.connection_error = None;
            state.user_disconnected = true;
            self.publish(&state);
        }

        if let Err(err) = write_flag(self.inner.store.as_ref(), USER_DISCONNECTED_KEY, true).await {
            warn!(error = %err, "failed to persist disconnect flag");
        }
        info!("wallet disconnected");
        self.notify(NoticeLevel::Info, "Wallet disconnected");
    }

    pub async fn on_accounts_changed(&self, accounts: Vec<Address>) {
        let (provider, captured, account) = {
            let mut state = self.inner.state.lock().await;
            if state.guard_active() {
                debug!(count = accounts.len(), "ignoring accountsChanged during disconnect guard");
                return;
            }

            match state.status {
                SessionStatus::Connecting => {
                    state.observed_accounts = Some(accounts);
                    state.generation.account += 1;
                    return;
                }
                SessionStatus::Disconnected | SessionStatus::Error => {
                    debug!("ignoring accountsChanged while not connected");
                    return;
                }
                SessionStatus::Connected => {}
            }

            let Some(account) = accounts.first().copied() else {
                drop(state);
                info!("wallet revoked every account");
                self.disconnect().await;
                return;
            };
            if state.latest_account() == Some(account) {
                debug!(account = %account, "active account unchanged");
                return;
            }
            let Some(provider) = state.provider.clone() else {
                return;
            };

            state.observed_accounts = Some(accounts);
            state.generation.account += 1;
            (provider, state.generation, account)
        };

        let fetched = provider.chain_id().await;

        let mut state = self.inner.state.lock().await;
        if state.generation.session != captured.session
            || state.generation.account != captured.account
            || state.status != SessionStatus::Connected
        {
            debug!(account = %account, "discarding stale account initialization");
            return;
        }

        let chain_id = if state.generation.chain != captured.chain {
            state.chain_id
        } else {
            match fetched {
                Ok(chain_id) => Some(chain_id),
                Err(err) => {
                    warn!(error = %err, "failed to read chain id after account change");
                    state.chain_id
                }
            }
        };
        let Some(chain_id) = chain_id else {
            return;
        };

        let bind_error = self.apply_connection(&mut state, provider, account, chain_id);
        self.publish(&state);
        drop(state);

        info!(account = %account, chain_id = %chain_id, "active account changed");
        self.notify(
            NoticeLevel::Info,
            format!("Account switched to {}", format_address(&account)),
        );
        self.warn_missing_bindings(chain_id, bind_error);
    }

    /// `raw_chain_id` is the `0x`-prefixed payload of `chainChanged`.
    pub async fn on_chain_changed(&self, raw_chain_id: &str) {
        let Some(chain_id) = ChainId::from_hex(raw_chain_id) else {
            warn!(raw = raw_chain_id, "ignoring malformed chainChanged payload");
            return;
        };

        let mut state = self.inner.state.lock().await;
        if state.guard_active() {
            debug!(chain_id = %chain_id, "ignoring chainChanged during disconnect guard");
            return;
        }
        if state.chain_id.or(state.observed_chain) == Some(chain_id) {
            debug!(chain_id = %chain_id, "chain unchanged");
            return;
        }

        state.observed_chain = Some(chain_id);
        state.generation.chain += 1;
        if state.status != SessionStatus::Connected {
            debug!(chain_id = %chain_id, "recorded chain change while not connected");
            return;
        }
        let (Some(provider), Some(account)) = (state.provider.clone(), state.account) else {
            return;
        };

        let bind_error = self.apply_connection(&mut state, provider, account, chain_id);
        self.publish(&state);
        drop(state);

        let name = self.networks().network_name(Some(chain_id));
        info!(chain_id = %chain_id, network = %name, "wallet switched network");
        self.notify(NoticeLevel::Info, format!("Switched to {name}"));
        if !self.networks().is_supported(chain_id) {
            self.notify(
                NoticeLevel::Warning,
                format!("{name} is not supported. Switch to a supported network to use the lottery"),
            );
        } else {
            self.warn_missing_bindings(chain_id, bind_error);
        }
    }

    /// Asks the wallet to switch, registering the chain first if the wallet does not know
    /// it. Session state follows from the resulting `chainChanged` event.
    pub async fn switch_network(&self, target: ChainId) -> SwitchOutcome {
        self.request_switch(target, NoticeLevel::Error).await
    }

    /// `failure_level` is the notice level used when the wallet refuses.
    async fn request_switch(&self, target: ChainId, failure_level: NoticeLevel) -> SwitchOutcome {
        let provider = match self.inner.factory.create_provider() {
            Ok(provider) => provider,
            Err(err) => return SwitchOutcome::Failed(err.report()),
        };

        match provider.switch_chain(target).await {
            Ok(()) => {
                info!(chain_id = %target, "network switch accepted");
                SwitchOutcome::Switched { chain_id: target }
            }
            Err(WalletError::UnrecognizedChain(_)) => {
                let Some(definition) = self.networks().add_chain_parameter(target) else {
                    warn!(chain_id = %target, "no chain definition to offer the wallet");
                    self.notify(failure_level, "Failed to add network");
                    return SwitchOutcome::Failed(WalletError::UnsupportedNetwork(target).report());
                };
                match provider.add_chain(&definition).await {
                    Ok(()) => {
                        info!(chain_id = %target, "wallet accepted chain definition");
                        SwitchOutcome::Added { chain_id: target }
                    }
                    Err(err) => {
                        warn!(chain_id = %target, error = %err, "wallet refused chain definition");
                        self.notify(failure_level, "Failed to add network");
                        SwitchOutcome::Failed(err.report())
                    }
                }
            }
            Err(err) => {
                warn!(chain_id = %target, error = %err, "network switch failed");
                let message = if err == WalletError::UserRejected {
                    "Network switch cancelled".to_owned()
                } else {
                    format!("Failed to switch network: {err}")
                };
                self.notify(failure_level, message);
                SwitchOutcome::Failed(err.report())
            }
        }
    }

    /// Silent reconnect at startup, unless the user explicitly disconnected last time.
    pub async fn auto_connect(&self) -> AutoConnectOutcome {
        if self.inner.state.lock().await.user_disconnected {
            info!("skipping auto-connect, wallet was disconnected by the user");
            return AutoConnectOutcome::Suppressed;
        }
        let Ok(provider) = self.inner.factory.create_provider() else {
            debug!("skipping auto-connect, no wallet available");
            return AutoConnectOutcome::WalletUnavailable;
        };

        match provider.accounts().await {
            Ok(accounts) if !accounts.is_empty() => {}
            Ok(_) => return AutoConnectOutcome::NoAuthorizedAccounts,
            Err(err) => {
                warn!(error = %err, "failed to read authorized accounts");
                return AutoConnectOutcome::NoAuthorizedAccounts;
            }
        }

        AutoConnectOutcome::Attempted(self.connect(true).await)
    }

    /// Re-reads accounts and chain from the wallet and feeds them through the event
    /// handlers. Used when wallet events may have been missed.
    pub async fn refresh_wallet_state(&self) -> WalletResult<()> {
        let provider = self.inner.factory.create_provider()?;
        let accounts = provider.accounts().await?;
        let chain_id = provider.chain_id().await?;
        self.on_chain_changed(&chain_id.to_hex()).await;
        self.on_accounts_changed(accounts).await;
        Ok(())
    }

    /// Drops the session after the wallet transport failed. Leaves the persisted flag alone.
    pub async fn reset_after_fault(&self, reason: &str) {
        {
            let mut state = self.inner.state.lock().await;
            state.generation.session += 1;
            state.status = SessionStatus::Error;
            state.clear_connection();
            state.observed_accounts = None;
            state.observed_chain = None;
            state.connection_error = Some(reason.to_owned());
            self.publish(&state);
        }
        warn!(reason, "session reset after wallet fault");
        self.notify(NoticeLevel::Error, format!("Wallet connection lost: {reason}"));
    }

    fn apply_connection(
        &self,
        state: &mut SessionState,
        provider: Provider,
        account: Address,
        chain_id: ChainId,
    ) -> Option<WalletError> {
        let signer = provider.signer_for(account);
        let (bindings, bind_error) = match self.inner.bindings.bind(&signer, &provider, chain_id) {
            Ok(bindings) => (bindings, None),
            Err(err) => {
                warn!(chain_id = %chain_id, error = %err, "contract bindings unavailable");
                (BindingSet::empty(), Some(err))
            }
        };

        state.status = SessionStatus::Connected;
        state.account = Some(account);
        state.chain_id = Some(chain_id);
        state.observed_chain = Some(chain_id);
        state.provider = Some(provider);
        state.signer = Some(signer);
        state.bindings = bindings;
        state.connection_error = None;
        bind_error
    }

    /// Only a supported chain without deployments is worth a notice; unsupported chains
    /// get their own warning.
    fn warn_missing_bindings(&self, chain_id: ChainId, bind_error: Option<WalletError>) {
        if bind_error.is_some() && self.networks().is_supported(chain_id) {
            let name = self.networks().network_name(Some(chain_id));
            self.notify(
                NoticeLevel::Warning,
                format!("Lottery contracts are not deployed on {name}"),
            );
        }
    }

    fn publish(&self, state: &SessionState) {
        self.inner
            .snapshots
            .send_replace(state.snapshot(self.networks()));
    }

    pub(crate) fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice {
            level,
            message: message.into(),
        };
        debug!(level = ?notice.level, message = %notice.message, "session notice");
        // No subscribers is fine.
        let _ = self.inner.notices.send(notice);
    }
}

async fn join_in_flight(mut pending: watch::Receiver<Option<ConnectOutcome>>) -> ConnectOutcome {
    match pending.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome)
            .clone()
            .unwrap_or_else(|| superseded("connection attempt was abandoned")),
        Err(_) => superseded("connection attempt was abandoned"),
    }
}

fn superseded(message: &str) -> ConnectOutcome {
    ConnectOutcome::Failed(FailureReport::new(ErrorKind::Superseded, message))
}
