use anyhow::{Context, Result, bail};
use ld_contracts::VaultPolicy;
use ld_session::SessionConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub(crate) const DEFAULT_STATE_PATH: &str = "./lottery-session.json";
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub(crate) struct ServiceConfig {
    /// JSON-RPC endpoint holding the wallet accounts. Without it the service runs with
    /// no wallet and every connect reports `wallet_unavailable`.
    pub rpc_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub state_path: PathBuf,
    pub poll_interval: Duration,
    pub session: SessionConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| lookup(key).map(|raw| raw.trim().to_owned()).filter(|raw| !raw.is_empty());

        let bind_addr = value("LOTTERY_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned())
            .parse()
            .context("LOTTERY_BIND_ADDR must be a socket address")?;

        let poll_interval_ms = match value("LOTTERY_POLL_INTERVAL_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("LOTTERY_POLL_INTERVAL_MS must be a number of milliseconds")?,
            None => DEFAULT_POLL_INTERVAL_MS,
        };
        if poll_interval_ms == 0 {
            bail!("LOTTERY_POLL_INTERVAL_MS must be greater than zero");
        }

        let mut session = SessionConfig::default();
        if let Some(raw) = value("LOTTERY_DISCONNECT_GUARD_MS") {
            let millis = raw
                .parse::<u64>()
                .context("LOTTERY_DISCONNECT_GUARD_MS must be a number of milliseconds")?;
            session.disconnect_guard = Duration::from_millis(millis);
        }
        if let Some(raw) = value("LOTTERY_REQUIRE_VAULT") {
            session.vault_policy = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => VaultPolicy::Required,
                "0" | "false" | "no" => VaultPolicy::BestEffort,
                other => bail!("LOTTERY_REQUIRE_VAULT must be a boolean, got {other}"),
            };
        }

        Ok(Self {
            rpc_url: value("LOTTERY_RPC_URL"),
            bind_addr,
            state_path: value("LOTTERY_STATE_PATH")
                .unwrap_or_else(|| DEFAULT_STATE_PATH.to_owned())
                .into(),
            poll_interval: Duration::from_millis(poll_interval_ms),
            session,
        })
    }
}
