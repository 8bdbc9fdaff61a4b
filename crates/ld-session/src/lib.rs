//! Wallet/network session for the lottery front-end.
//!
//! [`SessionManager`] is the single owner of the session state. It reacts to user
//! actions (`connect`, `disconnect`, `switch_network`) and to wallet events, keeps the
//! contract bindings in step with the active account and chain, and publishes a
//! [`SessionSnapshot`](ld_api_types::SessionSnapshot) on every transition. The read
//! accessors in [`queries`] sit on top of the current bindings and never mutate state.

use ld_contracts::VaultPolicy;
use std::time::Duration;

mod events;
mod machine;
pub mod queries;
mod state;

#[cfg(test)]
mod fake;

pub use machine::SessionManager;
pub use queries::history_window;

pub const DEFAULT_DISCONNECT_GUARD: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_PAGE_SIZE: u64 = 50;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long wallet events are ignored after an explicit disconnect. Revoking a
    /// wallet permission echoes an `accountsChanged([])` right away.
    pub disconnect_guard: Duration,
    pub vault_policy: VaultPolicy,
    /// Upper bound applied to `get_lottery_history` page sizes.
    pub max_page_size: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            disconnect_guard: DEFAULT_DISCONNECT_GUARD,
            vault_policy: VaultPolicy::BestEffort,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}
