use alloy_primitives::Address;
use ld_api_types::{BoundContract, ChainId, ContractKind};
use ld_network::NetworkRegistry;
use ld_wallet::{Provider, Signer, WalletError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub mod abi;
mod contracts;

pub use abi::AbiError;
pub use contracts::{LotteryContract, LotteryRound, PrizePoolContract, RouterContract, VaultContract};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("malformed return data: {0}")]
    Abi(#[from] AbiError),
}

pub type ContractResult<T> = Result<T, ContractError>;

/// Whether a chain without a vault deployment can still be bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VaultPolicy {
    /// Participant counts are best-effort; a missing vault leaves that binding absent.
    #[default]
    BestEffort,
    Required,
}

/// Typed handles for the current chain. Every handle is absent when disconnected.
#[derive(Clone, Default)]
pub struct BindingSet {
    pub lottery: Option<LotteryContract>,
    pub router: Option<RouterContract>,
    pub prize_pool: Option<PrizePoolContract>,
    pub vault: Option<VaultContract>,
}

impl BindingSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lottery.is_none() && self.router.is_none() && self.prize_pool.is_none() && self.vault.is_none()
    }

    pub fn address(&self, kind: ContractKind) -> Option<Address> {
        match kind {
            ContractKind::Lottery => self.lottery.as_ref().map(LotteryContract::address),
            ContractKind::Router => self.router.as_ref().map(RouterContract::address),
            ContractKind::PrizePool => self.prize_pool.as_ref().map(PrizePoolContract::address),
            ContractKind::Vault => self.vault.as_ref().map(VaultContract::address),
        }
    }

    pub fn bound(&self) -> Vec<BoundContract> {
        ContractKind::ALL
            .into_iter()
            .filter_map(|kind| self.address(kind).map(|address| BoundContract { kind, address }))
            .collect()
    }
}

/// Builds [`BindingSet`]s from the network registry. No network calls happen at bind time.
#[derive(Clone)]
pub struct BindingRegistry {
    networks: Arc<NetworkRegistry>,
    vault_policy: VaultPolicy,
}

impl BindingRegistry {
    pub fn new(networks: Arc<NetworkRegistry>, vault_policy: VaultPolicy) -> Self {
        Self {
            networks,
            vault_policy,
        }
    }

    pub fn networks(&self) -> &NetworkRegistry {
        &self.networks
    }

    /// Lottery and router are bound to the signer; prize pool and vault only read, so
    /// they use the provider and never trigger a signature prompt.
    pub fn bind(&self, signer: &Signer, provider: &Provider, chain_id: ChainId) -> Result<BindingSet, WalletError> {
        let Some(addresses) = self.networks.addresses_for(chain_id) else {
            return Err(WalletError::MissingAddresses(chain_id));
        };

        let (Some(lottery), Some(router), Some(prize_pool)) =
            (addresses.lottery, addresses.router, addresses.prize_pool)
        else {
            return Err(WalletError::MissingAddresses(chain_id));
        };

        if addresses.vault.is_none() && self.vault_policy == VaultPolicy::Required {
            return Err(WalletError::MissingAddresses(chain_id));
        }

        debug!(
            chain_id = %chain_id,
            vault = addresses.vault.is_some(),
            "binding lottery contracts"
        );

        Ok(BindingSet {
            lottery: Some(LotteryContract::new(lottery, signer.clone())),
            router: Some(RouterContract::new(router, signer.clone())),
            prize_pool: Some(PrizePoolContract::new(prize_pool, provider.clone())),
            vault: addresses
                .vault
                .map(|vault| VaultContract::new(vault, provider.clone())),
        })
    }
}
