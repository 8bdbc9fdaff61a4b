//! Static knowledge about the chains the lottery front-end can talk to.
//!
//! Every lookup is pure and total: an unknown chain id is simply unsupported and has
//! no deployed contracts.

use alloy_primitives::Address;
use ld_api_types::{ChainId, ContractKind, NativeCurrency, NetworkSummary};
use serde::Serialize;
use std::collections::BTreeMap;

pub const MAINNET: ChainId = ChainId(1);
pub const GOERLI: ChainId = ChainId(5);
pub const SEPOLIA: ChainId = ChainId(11_155_111);
pub const POLYGON: ChainId = ChainId(137);
pub const BSC: ChainId = ChainId(56);
pub const AVALANCHE: ChainId = ChainId(43_114);
pub const ARBITRUM: ChainId = ChainId(42_161);
pub const OPTIMISM: ChainId = ChainId(10);

#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub chain_id: ChainId,
    pub name: String,
    pub currency: NativeCurrency,
    pub supported: bool,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractAddresses {
    pub lottery: Option<Address>,
    pub router: Option<Address>,
    pub prize_pool: Option<Address>,
    pub vault: Option<Address>,
}

impl ContractAddresses {
    pub fn get(&self, kind: ContractKind) -> Option<Address> {
        match kind {
            ContractKind::Lottery => self.lottery,
            ContractKind::Router => self.router,
            ContractKind::PrizePool => self.prize_pool,
            ContractKind::Vault => self.vault,
        }
    }
}

/// `wallet_addEthereumChain` parameter (EIP-3085).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParameter {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: BTreeMap<ChainId, NetworkInfo>,
    addresses: BTreeMap<ChainId, ContractAddresses>,
    recommended: ChainId,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NetworkRegistry {
    pub fn empty(recommended: ChainId) -> Self {
        Self {
            networks: BTreeMap::new(),
            addresses: BTreeMap::new(),
            recommended,
        }
    }

    /// The deployment table shipped with the front-end.
    pub fn builtin() -> Self {
        Self::empty(SEPOLIA)
            .with_network(network(
                MAINNET,
                "Ethereum Mainnet",
                "ETH",
                true,
                "https://cloudflare-eth.com",
                "https://etherscan.io",
            ))
            .with_network(network(
                SEPOLIA,
                "Sepolia Testnet",
                "ETH",
                true,
                "https://rpc.sepolia.org",
                "https://sepolia.etherscan.io",
            ))
            .with_network(network(
                GOERLI,
                "Goerli Testnet",
                "ETH",
                true,
                "https://rpc.ankr.com/eth_goerli",
                "https://goerli.etherscan.io",
            ))
            .with_network(network(
                POLYGON,
                "Polygon",
                "MATIC",
                false,
                "https://polygon-rpc.com",
                "https://polygonscan.com",
            ))
            .with_network(network(
                BSC,
                "BSC",
                "BNB",
                false,
                "https://bsc-dataseed.binance.org",
                "https://bscscan.com",
            ))
            .with_network(network(
                AVALANCHE,
                "Avalanche",
                "AVAX",
                false,
                "https://api.avax.network/ext/bc/C/rpc",
                "https://snowtrace.io",
            ))
            .with_network(network(
                ARBITRUM,
                "Arbitrum",
                "ETH",
                false,
                "https://arb1.arbitrum.io/rpc",
                "https://arbiscan.io",
            ))
            .with_network(network(
                OPTIMISM,
                "Optimism",
                "ETH",
                false,
                "https://mainnet.optimism.io",
                "https://optimistic.etherscan.io",
            ))
            .with_addresses(
                MAINNET,
                ContractAddresses {
                    lottery: deployed("0xC8aBb2452110b62d5A63dCa247fc2607bc1Ab088"),
                    router: deployed("0x5FC8d32690cc91D4c39d9d3abcBD16989F875707"),
                    prize_pool: deployed("0x7E5F70b1F978980D8a346522D771293c6d6C05F1"),
                    vault: None,
                },
            )
            .with_addresses(
                SEPOLIA,
                ContractAddresses {
                    lottery: deployed("0x431F7a770D8274781e02AcDd858eEDE39bac0Beb"),
                    router: deployed("0xfd1FFe0074aed0B9891F92584cC35FdF98eb7A32"),
                    prize_pool: deployed("0xb641F8b8Da2f92Da45e795FbCce04266226FA056"),
                    vault: deployed("0x5b1DEd0A8C017c0772F608225deCA4741622816f"),
                },
            )
            .with_addresses(
                GOERLI,
                ContractAddresses {
                    lottery: deployed("0xC8aBb2452110b62d5A63dCa247fc2607bc1Ab088"),
                    router: deployed("0x5FC8d32690cc91D4c39d9d3abcBD16989F875707"),
                    prize_pool: deployed("0x7E5F70b1F978980D8a346522D771293c6d6C05F1"),
                    vault: None,
                },
            )
    }

    pub fn with_network(mut self, info: NetworkInfo) -> Self {
        self.networks.insert(info.chain_id, info);
        self
    }

    pub fn with_addresses(mut self, chain_id: ChainId, addresses: ContractAddresses) -> Self {
        self.addresses.insert(chain_id, addresses);
        self
    }

    pub fn supported_networks(&self) -> &BTreeMap<ChainId, NetworkInfo> {
        &self.networks
    }

    pub fn network(&self, chain_id: ChainId) -> Option<&NetworkInfo> {
        self.networks.get(&chain_id)
    }

    pub fn is_supported(&self, chain_id: ChainId) -> bool {
        self.networks
            .get(&chain_id)
            .is_some_and(|info| info.supported)
    }

    pub fn addresses_for(&self, chain_id: ChainId) -> Option<&ContractAddresses> {
        self.addresses.get(&chain_id)
    }

    pub fn recommended_chain_id(&self) -> ChainId {
        self.recommended
    }

    pub fn network_name(&self, chain_id: Option<ChainId>) -> String {
        match chain_id {
            None => "Unknown network".to_owned(),
            Some(id) => self
                .networks
                .get(&id)
                .map(|info| info.name.clone())
                .unwrap_or_else(|| format!("Chain ID: {id}")),
        }
    }

    pub fn add_chain_parameter(&self, chain_id: ChainId) -> Option<AddChainParameter> {
        let info = self.networks.get(&chain_id)?;
        Some(AddChainParameter {
            chain_id: chain_id.to_hex(),
            chain_name: info.name.clone(),
            native_currency: info.currency.clone(),
            rpc_urls: info.rpc_urls.clone(),
            block_explorer_urls: info.block_explorer_urls.clone(),
        })
    }

    pub fn summaries(&self) -> Vec<NetworkSummary> {
        self.networks
            .values()
            .map(|info| NetworkSummary {
                chain_id: info.chain_id,
                name: info.name.clone(),
                currency: info.currency.symbol.clone(),
                supported: info.supported,
            })
            .collect()
    }
}

fn deployed(raw: &str) -> Option<Address> {
    raw.parse().ok()
}

fn network(
    chain_id: ChainId,
    name: &str,
    symbol: &str,
    supported: bool,
    rpc_url: &str,
    explorer_url: &str,
) -> NetworkInfo {
    NetworkInfo {
        chain_id,
        name: name.to_owned(),
        currency: NativeCurrency {
            name: symbol.to_owned(),
            symbol: symbol.to_owned(),
            decimals: 18,
        },
        supported,
        rpc_urls: vec![rpc_url.to_owned()],
        block_explorer_urls: vec![explorer_url.to_owned()],
    }
}
