use alloy_primitives::Address;
use ld_api_types::{ChainId, ConnectOutcome, SessionSnapshot, SessionStatus};
use ld_contracts::BindingSet;
use ld_network::NetworkRegistry;
use ld_wallet::{Provider, Signer};
use tokio::sync::watch;
use tokio::time::Instant;

/// Counters bumped whenever a transition invalidates work that is still awaiting the
/// wallet. An async step captures them before its first await and re-checks after.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Generation {
    /// Bumped on disconnect and fault reset.
    pub session: u64,
    pub account: u64,
    pub chain: u64,
}

#[derive(Default)]
pub(crate) struct SessionState {
    pub status: SessionStatus,
    pub account: Option<Address>,
    /// Present iff `status == Connected`.
    pub chain_id: Option<ChainId>,
    pub provider: Option<Provider>,
    pub signer: Option<Signer>,
    pub bindings: BindingSet,
    pub user_disconnected: bool,
    pub connection_error: Option<String>,

    /// Latest `accountsChanged` payload, including ones seen while connecting.
    pub observed_accounts: Option<Vec<Address>>,
    /// Latest chain reported by the wallet, independent of the session status.
    pub observed_chain: Option<ChainId>,
    pub generation: Generation,
    pub guard_until: Option<Instant>,
    pub connect_in_flight: Option<watch::Receiver<Option<ConnectOutcome>>>,
}

impl SessionState {
    pub fn guard_active(&self) -> bool {
        self.guard_until.is_some_and(|until| Instant::now() < until)
    }

    /// Drops every piece of account-derived state.
    pub fn clear_connection(&mut self) {
        self.account = None;
        self.chain_id = None;
        self.provider = None;
        self.signer = None;
        self.bindings = BindingSet::empty();
    }

    /// Latest account the wallet told us about, falling back to the connected one.
    pub fn latest_account(&self) -> Option<Address> {
        self.observed_accounts
            .as_ref()
            .and_then(|accounts| accounts.first().copied())
            .or(self.account)
    }

    pub fn snapshot(&self, networks: &NetworkRegistry) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            account: self.account,
            chain_id: self.chain_id,
            network_name: networks.network_name(self.chain_id),
            network_supported: self
                .chain_id
                .is_some_and(|chain_id| networks.is_supported(chain_id)),
            bound_contracts: self.bindings.bound(),
            user_disconnected: self.user_disconnected,
            connection_error: self.connection_error.clone(),
        }
    }
}
