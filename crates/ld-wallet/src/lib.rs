use alloy_primitives::{Address, U256, hex};
use async_trait::async_trait;
use ld_api_types::{ChainId, ErrorKind, FailureReport};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

mod http;

pub use http::HttpTransport;

/// EIP-1193 provider error codes the session distinguishes.
pub const USER_REJECTED: i64 = 4001;
pub const REQUEST_PENDING: i64 = -32002;
pub const UNRECOGNIZED_CHAIN: i64 = 4902;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("wallet request failed ({code}): {message}")]
pub struct TransportError {
    pub code: i64,
    pub message: String,
}

impl TransportError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Events pushed by the wallet, delivered in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    /// Raw `0x`-prefixed chain id as the wallet emits it.
    ChainChanged(String),
}

/// Request/event surface of an injected wallet.
#[async_trait]
pub trait WalletTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// `None` when the transport cannot push events.
    fn subscribe(&self) -> Option<broadcast::Receiver<WalletEvent>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("no injected wallet found")]
    WalletUnavailable,
    #[error("request cancelled by the user")]
    UserRejected,
    #[error("a wallet request is already pending")]
    RequestPending,
    #[error("chain {0} is not recognized by the wallet")]
    UnrecognizedChain(ChainId),
    #[error("chain {0} is not supported")]
    UnsupportedNetwork(ChainId),
    #[error("contract addresses are missing for chain {0}")]
    MissingAddresses(ChainId),
    #[error("rpc failure: {0}")]
    Rpc(String),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::WalletUnavailable => ErrorKind::WalletUnavailable,
            WalletError::UserRejected => ErrorKind::UserRejected,
            WalletError::RequestPending => ErrorKind::RequestPending,
            WalletError::UnrecognizedChain(_) | WalletError::UnsupportedNetwork(_) => {
                ErrorKind::UnsupportedNetwork
            }
            WalletError::MissingAddresses(_) => ErrorKind::MissingAddresses,
            WalletError::Rpc(_) => ErrorKind::RpcFailure,
        }
    }

    pub fn report(&self) -> FailureReport {
        FailureReport::new(self.kind(), self.to_string())
    }
}

impl From<TransportError> for WalletError {
    fn from(err: TransportError) -> Self {
        match err.code {
            USER_REJECTED => WalletError::UserRejected,
            REQUEST_PENDING => WalletError::RequestPending,
            _ => WalletError::Rpc(err.to_string()),
        }
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

/// Hands out providers for the injected transport, if there is one.
#[derive(Clone, Default)]
pub struct ProviderFactory {
    transport: Option<Arc<dyn WalletTransport>>,
}

impl ProviderFactory {
    pub fn new(transport: Option<Arc<dyn WalletTransport>>) -> Self {
        Self { transport }
    }

    pub fn is_available(&self) -> bool {
        self.transport.is_some()
    }

    pub fn create_provider(&self) -> WalletResult<Provider> {
        self.transport
            .clone()
            .map(|transport| Provider { transport })
            .ok_or(WalletError::WalletUnavailable)
    }

    pub fn subscribe(&self) -> Option<broadcast::Receiver<WalletEvent>> {
        self.transport.as_ref().and_then(|transport| transport.subscribe())
    }
}

/// Read-only connection handle.
#[derive(Clone)]
pub struct Provider {
    transport: Arc<dyn WalletTransport>,
}

impl Provider {
    /// Interactive: may open a wallet prompt.
    pub async fn request_accounts(&self) -> WalletResult<Vec<Address>> {
        let value = self.transport.request("eth_requestAccounts", json!([])).await?;
        parse_accounts(value)
    }

    /// Accounts already authorized for this origin, without prompting.
    pub async fn accounts(&self) -> WalletResult<Vec<Address>> {
        let value = self.transport.request("eth_accounts", json!([])).await?;
        parse_accounts(value)
    }

    pub async fn chain_id(&self) -> WalletResult<ChainId> {
        let value = self.transport.request("eth_chainId", json!([])).await?;
        parse_chain_id(&value)
    }

    /// Signer for the first authorized account.
    pub async fn get_signer(&self) -> WalletResult<Signer> {
        let accounts = self.accounts().await?;
        let first = accounts
            .first()
            .copied()
            .ok_or_else(|| WalletError::Rpc("wallet returned no authorized accounts".to_owned()))?;
        Ok(self.signer_for(first))
    }

    pub fn signer_for(&self, account: Address) -> Signer {
        Signer {
            provider: self.clone(),
            address: account,
        }
    }

    pub async fn balance(&self, account: Address) -> WalletResult<U256> {
        let value = self
            .transport
            .request("eth_getBalance", json!([account, "latest"]))
            .await?;
        parse_quantity(&value)
    }

    pub async fn call(&self, to: Address, data: &[u8], from: Option<Address>) -> WalletResult<Vec<u8>> {
        let mut tx = json!({
            "to": to,
            "data": hex::encode_prefixed(data),
        });
        if let Some(from) = from {
            tx["from"] = json!(from);
        }
        let value = self.transport.request("eth_call", json!([tx, "latest"])).await?;
        parse_bytes(&value)
    }

    pub async fn switch_chain(&self, chain_id: ChainId) -> WalletResult<()> {
        let params = json!([{ "chainId": chain_id.to_hex() }]);
        match self
            .transport
            .request("wallet_switchEthereumChain", params)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if err.code == UNRECOGNIZED_CHAIN => Err(WalletError::UnrecognizedChain(chain_id)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn add_chain<P: Serialize + Sync>(&self, definition: &P) -> WalletResult<()> {
        let definition = serde_json::to_value(definition)
            .map_err(|err| WalletError::Rpc(format!("invalid chain definition: {err}")))?;
        self.transport
            .request("wallet_addEthereumChain", json!([definition]))
            .await?;
        Ok(())
    }
}

/// Authorization handle for one account; can submit transactions.
#[derive(Clone)]
pub struct Signer {
    provider: Provider,
    address: Address,
}

impl Signer {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub async fn call(&self, to: Address, data: &[u8]) -> WalletResult<Vec<u8>> {
        self.provider.call(to, data, Some(self.address)).await
    }

    /// Submits a transaction and returns its hash without waiting for inclusion.
    pub async fn send_transaction(&self, to: Address, data: &[u8], value: U256) -> WalletResult<String> {
        let tx = json!({
            "from": self.address,
            "to": to,
            "data": hex::encode_prefixed(data),
            "value": format!("0x{value:x}"),
        });
        let result = self
            .provider
            .transport
            .request("eth_sendTransaction", json!([tx]))
            .await?;
        result
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| WalletError::Rpc(format!("unexpected transaction hash: {result}")))
    }
}

fn parse_accounts(value: Value) -> WalletResult<Vec<Address>> {
    let raw: Vec<String> = serde_json::from_value(value)
        .map_err(|err| WalletError::Rpc(format!("malformed account list: {err}")))?;
    raw.iter()
        .map(|account| {
            account
                .parse::<Address>()
                .map_err(|err| WalletError::Rpc(format!("malformed account {account}: {err}")))
        })
        .collect()
}

pub fn parse_chain_id(value: &Value) -> WalletResult<ChainId> {
    match value {
        Value::String(raw) => ChainId::from_hex(raw)
            .ok_or_else(|| WalletError::Rpc(format!("malformed chain id: {raw}"))),
        Value::Number(number) => number
            .as_u64()
            .map(ChainId)
            .ok_or_else(|| WalletError::Rpc(format!("malformed chain id: {number}"))),
        other => Err(WalletError::Rpc(format!("malformed chain id: {other}"))),
    }
}

fn parse_quantity(value: &Value) -> WalletResult<U256> {
    let raw = value
        .as_str()
        .ok_or_else(|| WalletError::Rpc(format!("malformed quantity: {value}")))?;
    let digits = raw.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|err| WalletError::Rpc(format!("malformed quantity {raw}: {err}")))
}

fn parse_bytes(value: &Value) -> WalletResult<Vec<u8>> {
    let raw = value
        .as_str()
        .ok_or_else(|| WalletError::Rpc(format!("malformed call result: {value}")))?;
    hex::decode(raw.trim_start_matches("0x"))
        .map_err(|err| WalletError::Rpc(format!("malformed call result: {err}")))
}
