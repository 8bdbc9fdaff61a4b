use alloy_primitives::{Address, U256, hex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimals of the native currency on every chain the lottery is deployed to.
pub const ETHER_DECIMALS: u32 = 18;
/// Fractional digits shown for every monetary value leaving the read layer.
pub const DISPLAY_DECIMALS: usize = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    /// Parses the `0x`-prefixed hex form wallets use in `chainChanged` and `eth_chainId`.
    pub fn from_hex(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return None;
        }
        u64::from_str_radix(digits, 16).ok().map(Self)
    }

    pub fn to_hex(self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Lottery,
    Router,
    PrizePool,
    Vault,
}

impl ContractKind {
    pub const ALL: [ContractKind; 4] = [
        ContractKind::Lottery,
        ContractKind::Router,
        ContractKind::PrizePool,
        ContractKind::Vault,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContractKind::Lottery => "lottery",
            ContractKind::Router => "router",
            ContractKind::PrizePool => "prize_pool",
            ContractKind::Vault => "vault",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    WalletUnavailable,
    UserRejected,
    RequestPending,
    UnsupportedNetwork,
    MissingAddresses,
    RpcFailure,
    /// The attempt was overtaken by a newer transition (disconnect, revoked accounts).
    Superseded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl FailureReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConnectOutcome {
    Connected { account: Address, chain_id: ChainId },
    Failed(FailureReport),
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectOutcome::Connected { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "auto_connect", rename_all = "snake_case")]
pub enum AutoConnectOutcome {
    /// The user explicitly disconnected last time.
    Suppressed,
    WalletUnavailable,
    NoAuthorizedAccounts,
    Attempted(ConnectOutcome),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SwitchOutcome {
    Switched { chain_id: ChainId },
    /// The wallet did not know the chain and accepted its definition.
    Added { chain_id: ChainId },
    Failed(FailureReport),
}

impl SwitchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SwitchOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Unavailable {
    NotConnected,
    UnsupportedNetwork { chain_id: ChainId },
    MissingBinding { contract: ContractKind },
    CallFailed { message: String },
}

/// Result of a read accessor. `Unavailable` is an ordinary empty/loading state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ReadOutcome<T> {
    Available(T),
    Unavailable(Unavailable),
}

impl<T> ReadOutcome<T> {
    pub fn available(self) -> Option<T> {
        match self {
            ReadOutcome::Available(value) => Some(value),
            ReadOutcome::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ReadOutcome::Available(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundRecord {
    pub round_id: u64,
    pub prize_amount: String,
    pub winner: Address,
    pub end_time_millis: u64,
    pub is_claimed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundContract {
    pub kind: ContractKind,
    pub address: Address,
}

/// Read-only view of the session published to consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub account: Option<Address>,
    pub chain_id: Option<ChainId>,
    pub network_name: String,
    pub network_supported: bool,
    pub bound_contracts: Vec<BoundContract>,
    pub user_disconnected: bool,
    pub connection_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing notification emitted by the session (a toast in the browser build).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub chain_id: ChainId,
    pub name: String,
    pub currency: String,
    pub supported: bool,
}

/// Lowercase `0x`-prefixed hex form of an address.
pub fn address_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Short display form, `0x1234...abcd`.
pub fn format_address(address: &Address) -> String {
    let full = address_hex(address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Renders a base-unit amount as an ether string with [`DISPLAY_DECIMALS`] digits,
/// rounding half up.
pub fn format_ether_fixed(wei: U256) -> String {
    let step = U256::from(10_000_000_000u64);
    let half = U256::from(5_000_000_000u64);
    let scaled = wei.saturating_add(half) / step;
    let base = U256::from(100_000_000u64);
    let whole = scaled / base;
    let fraction = (scaled % base).as_limbs()[0];
    format!("{whole}.{fraction:0width$}", width = DISPLAY_DECIMALS)
}
