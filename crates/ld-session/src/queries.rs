//! Read accessors over the current bindings.
//!
//! Every accessor is gated in the same order: connected, then supported chain, then the
//! binding it needs. Anything short of a value comes back as
//! [`ReadOutcome::Unavailable`]; callers render it as an empty or loading state.

use alloy_primitives::Address;
use ld_api_types::{
    ChainId, ContractKind, ReadOutcome, RoundRecord, SessionStatus, Unavailable, format_ether_fixed,
};
use ld_contracts::{BindingSet, ContractError};
use ld_wallet::Provider;
use std::ops::RangeInclusive;
use tracing::{debug, warn};

use crate::SessionManager;

/// Round ids shown on `page` (1-based) when pages count back from the newest round.
///
/// `None` when the page lies past the oldest round. Callers walk the range in reverse so
/// the most recent round comes first.
pub fn history_window(current_round_id: u64, page: u64, page_size: u64) -> Option<RangeInclusive<u64>> {
    let total = current_round_id.saturating_add(1);
    let start = page.saturating_sub(1).saturating_mul(page_size);
    let end = page.saturating_mul(page_size).min(total);
    if start >= end {
        return None;
    }
    Some(current_round_id - (end - 1)..=current_round_id - start)
}

struct ReadContext {
    chain_id: ChainId,
    account: Address,
    provider: Provider,
    bindings: BindingSet,
}

macro_rules! require {
    ($binding:expr, $kind:expr) => {
        match $binding {
            Some(contract) => contract,
            None => {
                debug!(contract = %$kind, "read skipped, contract not bound");
                return ReadOutcome::Unavailable(Unavailable::MissingBinding { contract: $kind });
            }
        }
    };
}

macro_rules! gate {
    ($session:expr) => {
        match $session.read_context().await {
            Ok(context) => context,
            Err(reason) => {
                debug!(reason = ?reason, "read skipped");
                return ReadOutcome::Unavailable(reason);
            }
        }
    };
}

impl SessionManager {
    async fn read_context(&self) -> Result<ReadContext, Unavailable> {
        let state = self.inner.state.lock().await;
        let (SessionStatus::Connected, Some(chain_id), Some(account), Some(provider)) =
            (state.status, state.chain_id, state.account, state.provider.clone())
        else {
            return Err(Unavailable::NotConnected);
        };
        if !self.networks().is_supported(chain_id) {
            return Err(Unavailable::UnsupportedNetwork { chain_id });
        }
        Ok(ReadContext {
            chain_id,
            account,
            provider,
            bindings: state.bindings.clone(),
        })
    }

    /// Prize pool balance as an ether string with eight decimals.
    pub async fn get_prize_pool_amount(&self) -> ReadOutcome<String> {
        let context = gate!(self);
        let pool = require!(context.bindings.prize_pool.as_ref(), ContractKind::PrizePool);
        match pool.prize_pool_amount().await {
            Ok(amount) => ReadOutcome::Available(format_ether_fixed(amount)),
            Err(err) => call_failed("get_prize_pool_amount", &context, err),
        }
    }

    pub async fn get_current_round_id(&self) -> ReadOutcome<u64> {
        let context = gate!(self);
        let lottery = require!(context.bindings.lottery.as_ref(), ContractKind::Lottery);
        match lottery.current_round_id().await {
            Ok(round_id) => ReadOutcome::Available(round_id),
            Err(err) => call_failed("get_current_round_id", &context, err),
        }
    }

    /// Newest round first. `page_size` is capped by [`crate::SessionConfig::max_page_size`].
    pub async fn get_lottery_history(&self, page: u64, page_size: u64) -> ReadOutcome<Vec<RoundRecord>> {
        let context = gate!(self);
        let lottery = require!(context.bindings.lottery.as_ref(), ContractKind::Lottery);

        let current_round_id = match lottery.current_round_id().await {
            Ok(round_id) => round_id,
            Err(err) => return call_failed("get_lottery_history", &context, err),
        };
        let page_size = page_size.min(self.config().max_page_size);
        let Some(window) = history_window(current_round_id, page, page_size) else {
            return ReadOutcome::Available(Vec::new());
        };

        let mut records = Vec::new();
        for round_id in window.rev() {
            let round = match lottery.lottery_round(round_id).await {
                Ok(round) => round,
                Err(err) => return call_failed("get_lottery_history", &context, err),
            };
            records.push(RoundRecord {
                round_id,
                prize_amount: format_ether_fixed(round.prize_value),
                winner: round.winner,
                end_time_millis: round.draw_timestamp.saturating_mul(1000),
                is_claimed: round.is_claimed,
            });
        }
        ReadOutcome::Available(records)
    }

    /// Next draw as milliseconds since the epoch.
    pub async fn get_next_draw_timestamp(&self) -> ReadOutcome<u64> {
        let context = gate!(self);
        let lottery = require!(context.bindings.lottery.as_ref(), ContractKind::Lottery);
        match lottery.next_draw_timestamp().await {
            Ok(seconds) => ReadOutcome::Available(seconds.saturating_mul(1000)),
            Err(err) => call_failed("get_next_draw_timestamp", &context, err),
        }
    }

    /// Participants of the current round. Needs both the lottery and the vault.
    pub async fn get_participants_count(&self) -> ReadOutcome<u64> {
        let context = gate!(self);
        let lottery = require!(context.bindings.lottery.as_ref(), ContractKind::Lottery);
        let vault = require!(context.bindings.vault.as_ref(), ContractKind::Vault);

        let round_id = match lottery.current_round_id().await {
            Ok(round_id) => round_id,
            Err(err) => return call_failed("get_participants_count", &context, err),
        };
        match vault.current_total_participant_count(round_id).await {
            Ok(count) => ReadOutcome::Available(count),
            Err(err) => call_failed("get_participants_count", &context, err),
        }
    }

    /// Native balance of the connected account, formatted like the prize pool.
    pub async fn get_account_balance(&self) -> ReadOutcome<String> {
        let context = gate!(self);
        match context.provider.balance(context.account).await {
            Ok(balance) => ReadOutcome::Available(format_ether_fixed(balance)),
            Err(err) => call_failed("get_account_balance", &context, err.into()),
        }
    }
}

fn call_failed<T>(operation: &'static str, context: &ReadContext, err: ContractError) -> ReadOutcome<T> {
    warn!(
        operation,
        chain_id = %context.chain_id,
        account = %context.account,
        error = %err,
        "contract read failed"
    );
    ReadOutcome::Unavailable(Unavailable::CallFailed {
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionConfig;
    use crate::fake::{
        FakeWallet, ROUND_SPACING, ROUND_ZERO_DRAW, account, drain, round_prize, session, session_with,
    };
    use ld_api_types::NoticeLevel;
    use ld_network::{GOERLI, POLYGON, SEPOLIA};
    use ld_storage::InMemoryStore;
    use std::sync::Arc;

    async fn connected(wallet: &Arc<FakeWallet>) -> SessionManager {
        let manager = session(wallet).await;
        assert!(manager.connect(false).await.is_connected());
        manager
    }

    fn ids(records: &[RoundRecord]) -> Vec<u64> {
        records.iter().map(|record| record.round_id).collect()
    }

    #[test]
    fn history_pages_count_back_from_newest_round() {
        assert_eq!(history_window(7, 1, 5), Some(3..=7));
        assert_eq!(history_window(7, 2, 5), Some(0..=2));
        assert_eq!(history_window(7, 3, 5), None);
        assert_eq!(history_window(0, 1, 5), Some(0..=0));
        assert_eq!(history_window(2, 10, 5), None);
        assert_eq!(history_window(7, 0, 5), None);
        assert_eq!(history_window(7, 1, 0), None);
        assert_eq!(history_window(u64::MAX, u64::MAX, u64::MAX), None);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let wallet = Arc::new(FakeWallet::new(account(0xaa), SEPOLIA));
        let manager = connected(&wallet).await;

        let records = manager
            .get_lottery_history(1, 5)
            .await
            .available()
            .expect("history available");
        assert_eq!(ids(&records), vec![7, 6, 5, 4, 3]);

        let newest = &records[0];
        assert_eq!(newest.prize_amount, format_ether_fixed(round_prize(7)));
        assert_eq!(newest.prize_amount, "0.80000000");
        assert_eq!(newest.winner, account(8));
        assert_eq!(newest.end_time_millis, (ROUND_ZERO_DRAW + 7 * ROUND_SPACING) * 1000);
        assert!(!newest.is_claimed);
        assert!(records[1].is_claimed);

        let older = manager.get_lottery_history(2, 5).await.available();
        assert_eq!(older.as_deref().map(ids), Some(vec![2, 1, 0]));
    }

    #[tokio::test]
    async fn history_past_the_oldest_round_is_empty() {
        let wallet = Arc::new(FakeWallet::new(account(0xaa), SEPOLIA));
        wallet.configure(|sim| sim.current_round_id = 2);
        let manager = connected(&wallet).await;

        assert_eq!(
            manager.get_lottery_history(10, 5).await,
            ReadOutcome::Available(Vec::new())
        );
        assert_eq!(wallet.count("eth_call"), 1);
    }

    #[tokio::test]
    async fn history_page_size_is_capped() {
        let wallet = Arc::new(FakeWallet::new(account(0xaa), SEPOLIA));
        let config = SessionConfig {
            max_page_size: 3,
            ..SessionConfig::default()
        };
        let manager = session_with(Some(wallet.clone()), Arc::new(InMemoryStore::default()), config).await;
        assert!(manager.connect(false).await.is_connected());

        let records = manager.get_lottery_history(1, 100).await.available();
        assert_eq!(records.as_deref().map(ids), Some(vec![7, 6, 5]));
    }

    #[tokio::test]
    async fn scalar_reads() {
        let wallet = Arc::new(FakeWallet::new(account(0xaa), SEPOLIA));
        let manager = connected(&wallet).await;

        assert_eq!(
            manager.get_prize_pool_amount().await,
            ReadOutcome::Available("1.50000000".to_owned())
        );
        assert_eq!(manager.get_current_round_id().await, ReadOutcome::Available(7));
        assert_eq!(
            manager.get_next_draw_timestamp().await,
            ReadOutcome::Available(ROUND_ZERO_DRAW * 1000)
        );
        assert_eq!(manager.get_participants_count().await, ReadOutcome::Available(12));
        assert_eq!(
            manager.get_account_balance().await,
            ReadOutcome::Available("2.00000000".to_owned())
        );
    }

    #[tokio::test]
    async fn reads_require_a_connection() {
        let wallet = Arc::new(FakeWallet::new(account(0xaa), SEPOLIA));
        let manager = session(&wallet).await;

        let not_connected = Unavailable::NotConnected;
        assert_eq!(
            manager.get_prize_pool_amount().await,
            ReadOutcome::Unavailable(not_connected.clone())
        );
        assert_eq!(
            manager.get_current_round_id().await,
            ReadOutcome::Unavailable(not_connected.clone())
        );
        assert_eq!(
            manager.get_participants_count().await,
            ReadOutcome::Unavailable(not_connected.clone())
        );
        assert_eq!(
            manager.get_lottery_history(1, 5).await,
            ReadOutcome::Unavailable(not_connected)
        );
        assert_eq!(wallet.count("eth_call"), 0);
    }

    #[tokio::test]
    async fn unsupported_network_gates_before_bindings() {
        let wallet = Arc::new(FakeWallet::new(account(0xaa), POLYGON));
        let manager = connected(&wallet).await;
        let calls = wallet.count("eth_call");

        assert_eq!(
            manager.get_current_round_id().await,
            ReadOutcome::Unavailable(Unavailable::UnsupportedNetwork { chain_id: POLYGON })
        );
        assert_eq!(wallet.count("eth_call"), calls);
    }

    #[tokio::test]
    async fn missing_vault_only_affects_participant_count() {
        let wallet = Arc::new(FakeWallet::new(account(0xaa), GOERLI));
        let manager = connected(&wallet).await;

        assert_eq!(
            manager.get_participants_count().await,
            ReadOutcome::Unavailable(Unavailable::MissingBinding {
                contract: ContractKind::Vault
            })
        );
        assert!(manager.get_prize_pool_amount().await.is_available());
        assert!(manager.get_current_round_id().await.is_available());
    }

    #[tokio::test]
    async fn reverted_reads_are_unavailable_without_error_notices() {
        let wallet = Arc::new(FakeWallet::new(account(0xaa), SEPOLIA));
        let manager = connected(&wallet).await;
        let mut notices = manager.notices();
        wallet.configure(|sim| sim.revert_calls = true);

        let outcome = manager.get_prize_pool_amount().await;
        assert!(matches!(
            outcome,
            ReadOutcome::Unavailable(Unavailable::CallFailed { .. })
        ));
        assert!(!manager.get_lottery_history(1, 5).await.is_available());
        assert!(
            drain(&mut notices)
                .iter()
                .all(|notice| notice.level != NoticeLevel::Error)
        );
        assert_eq!(manager.snapshot().status, SessionStatus::Connected);
    }
}
