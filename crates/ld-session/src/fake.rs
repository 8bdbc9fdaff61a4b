//! In-process wallet used by the session tests.

use alloy_primitives::{Address, U256, hex};
use async_trait::async_trait;
use ld_api_types::{ChainId, Notice};
use ld_contracts::abi::{decode_u64, selector};
use ld_network::{GOERLI, MAINNET, NetworkRegistry, SEPOLIA};
use ld_storage::{InMemoryStore, KeyValueStore};
use ld_wallet::{
    ProviderFactory, TransportError, UNRECOGNIZED_CHAIN, USER_REJECTED, WalletEvent, WalletTransport,
};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, broadcast};

use crate::{SessionConfig, SessionManager};

pub(crate) const ROUND_ZERO_DRAW: u64 = 1_700_000_000;
pub(crate) const ROUND_SPACING: u64 = 86_400;

pub(crate) fn account(byte: u8) -> Address {
    Address::from([byte; 20])
}

/// Mutable wallet and chain state the fake answers from.
pub(crate) struct WalletSim {
    pub accounts: Vec<Address>,
    pub chain_id: ChainId,
    pub known_chains: BTreeSet<ChainId>,
    pub reject_connect: bool,
    pub reject_add_chain: bool,
    pub revert_calls: bool,
    pub current_round_id: u64,
    pub prize_pool: U256,
    pub next_draw: u64,
    pub participants: u64,
    pub balance: U256,
}

pub(crate) struct FakeWallet {
    sim: Mutex<WalletSim>,
    requests: Mutex<Vec<(String, Value)>>,
    gate: Option<(&'static str, Semaphore)>,
    events: broadcast::Sender<WalletEvent>,
}

impl FakeWallet {
    pub fn new(account: Address, chain_id: ChainId) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            sim: Mutex::new(WalletSim {
                accounts: vec![account],
                chain_id,
                known_chains: BTreeSet::from([MAINNET, GOERLI, SEPOLIA, chain_id]),
                reject_connect: false,
                reject_add_chain: false,
                revert_calls: false,
                current_round_id: 7,
                prize_pool: U256::from(1_500_000_000_000_000_000u128),
                next_draw: ROUND_ZERO_DRAW,
                participants: 12,
                balance: U256::from(2_000_000_000_000_000_000u128),
            }),
            requests: Mutex::new(Vec::new()),
            gate: None,
            events,
        }
    }

    /// Requests for `method` block until [`FakeWallet::release`] hands out permits.
    pub fn gated(mut self, method: &'static str) -> Self {
        self.gate = Some((method, Semaphore::new(0)));
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some((_, gate)) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn configure(&self, f: impl FnOnce(&mut WalletSim)) {
        f(&mut self.sim.lock().expect("sim lock"));
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|(seen, _)| seen == method)
            .count()
    }

    pub fn params(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|(seen, _)| seen == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    fn answer_call(sim: &WalletSim, params: &Value) -> Result<Value, TransportError> {
        if sim.revert_calls {
            return Err(TransportError::new(-32000, "execution reverted"));
        }
        let data = params[0]["data"].as_str().unwrap_or_default();
        let bytes = hex::decode(data.trim_start_matches("0x"))
            .map_err(|err| TransportError::new(-32602, err.to_string()))?;
        if bytes.len() < 4 {
            return Err(TransportError::new(-32602, "missing selector"));
        }
        let (called, args) = bytes.split_at(4);
        let arg = |index| decode_u64(args, index).map_err(|err| TransportError::new(-32602, err.to_string()));

        let words: Vec<[u8; 32]> = if called == selector("getCurrentRoundId()") {
            vec![uint(U256::from(sim.current_round_id))]
        } else if called == selector("getPrizePoolAmount()") {
            vec![uint(sim.prize_pool)]
        } else if called == selector("nextDrawTimestamp()") {
            vec![uint(U256::from(sim.next_draw))]
        } else if called == selector("getCurrentTotalParticipantCount(uint256)") {
            let round_id = arg(0)?;
            let count = if round_id == sim.current_round_id { sim.participants } else { 0 };
            vec![uint(U256::from(count))]
        } else if called == selector("lotteryRound(uint256)") {
            round_words(arg(0)?)
        } else {
            return Err(TransportError::new(-32000, "execution reverted"));
        };

        Ok(json!(hex::encode_prefixed(words.concat())))
    }
}

/// 0.1 ether times `round_id + 1`.
pub(crate) fn round_prize(round_id: u64) -> U256 {
    U256::from(round_id + 1) * U256::from(100_000_000_000_000_000u64)
}

fn uint(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

fn round_words(round_id: u64) -> Vec<[u8; 32]> {
    let mut winner = [0u8; 32];
    winner[12..].copy_from_slice(account(round_id as u8 + 1).as_slice());
    vec![
        uint(U256::from(round_id + 100)),
        winner,
        uint(round_prize(round_id)),
        uint(U256::from(ROUND_ZERO_DRAW)),
        uint(U256::from(42u64)),
        uint(U256::from(u64::from(round_id % 2 == 0))),
        uint(U256::from(ROUND_ZERO_DRAW + round_id * ROUND_SPACING)),
    ]
}

#[async_trait]
impl WalletTransport for FakeWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push((method.to_owned(), params.clone()));

        if let Some((gated, gate)) = &self.gate {
            if *gated == method {
                gate.acquire()
                    .await
                    .map_err(|err| TransportError::new(-32603, err.to_string()))?
                    .forget();
            }
        }

        let mut sim = self.sim.lock().expect("sim lock");
        match method {
            "eth_requestAccounts" if sim.reject_connect => {
                Err(TransportError::new(USER_REJECTED, "User rejected the request."))
            }
            "eth_requestAccounts" | "eth_accounts" => Ok(json!(sim.accounts)),
            "eth_chainId" => Ok(json!(sim.chain_id.to_hex())),
            "eth_getBalance" => Ok(json!(format!("0x{:x}", sim.balance))),
            "wallet_switchEthereumChain" => {
                let target = requested_chain(&params)?;
                if !sim.known_chains.contains(&target) {
                    return Err(TransportError::new(UNRECOGNIZED_CHAIN, "Unrecognized chain ID"));
                }
                sim.chain_id = target;
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                if sim.reject_add_chain {
                    return Err(TransportError::new(USER_REJECTED, "User rejected the request."));
                }
                let target = requested_chain(&params)?;
                sim.known_chains.insert(target);
                sim.chain_id = target;
                Ok(Value::Null)
            }
            "eth_call" => Self::answer_call(&sim, &params),
            _ => Err(TransportError::new(-32601, "method not found")),
        }
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<WalletEvent>> {
        Some(self.events.subscribe())
    }
}

fn requested_chain(params: &Value) -> Result<ChainId, TransportError> {
    params[0]["chainId"]
        .as_str()
        .and_then(ChainId::from_hex)
        .ok_or_else(|| TransportError::new(-32602, "invalid chain id"))
}

pub(crate) async fn session_with(
    wallet: Option<Arc<FakeWallet>>,
    store: Arc<InMemoryStore>,
    config: SessionConfig,
) -> SessionManager {
    let transport = wallet.map(|wallet| wallet as Arc<dyn WalletTransport>);
    let store: Arc<dyn KeyValueStore> = store;
    SessionManager::new(
        ProviderFactory::new(transport),
        Arc::new(NetworkRegistry::builtin()),
        store,
        config,
    )
    .await
}

pub(crate) async fn session(wallet: &Arc<FakeWallet>) -> SessionManager {
    session_with(
        Some(wallet.clone()),
        Arc::new(InMemoryStore::default()),
        SessionConfig::default(),
    )
    .await
}

pub(crate) fn drain(notices: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut seen = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        seen.push(notice);
    }
    seen
}
