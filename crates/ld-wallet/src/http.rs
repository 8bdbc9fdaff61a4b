use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{INTERNAL_ERROR, TransportError, WalletEvent, WalletTransport};

const EVENT_CAPACITY: usize = 64;

/// JSON-RPC transport for node-managed accounts (dev nodes, signing proxies).
///
/// Nodes cannot push `accountsChanged`/`chainChanged`, so [`HttpTransport::spawn_poller`]
/// diffs `eth_accounts` and `eth_chainId` on an interval and emits the same events an
/// injected wallet would.
pub struct HttpTransport {
    endpoint: String,
    http: reqwest::Client,
    next_id: AtomicU64,
    events: broadcast::Sender<WalletEvent>,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            let mut last_accounts: Option<Vec<Address>> = None;
            let mut last_chain: Option<String> = None;
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;

                match transport.poll_accounts().await {
                    Ok(accounts) => {
                        if last_accounts.as_ref().is_some_and(|prev| *prev != accounts) {
                            debug!(count = accounts.len(), "node accounts changed");
                            let _ = transport
                                .events
                                .send(WalletEvent::AccountsChanged(accounts.clone()));
                        }
                        last_accounts = Some(accounts);
                    }
                    Err(err) => warn!(error = %err, "eth_accounts poll failed"),
                }

                match transport.request("eth_chainId", json!([])).await {
                    Ok(Value::String(chain)) => {
                        if last_chain.as_ref().is_some_and(|prev| !prev.eq_ignore_ascii_case(&chain)) {
                            debug!(chain = %chain, "node chain changed");
                            let _ = transport.events.send(WalletEvent::ChainChanged(chain.clone()));
                        }
                        last_chain = Some(chain);
                    }
                    Ok(other) => warn!(result = %other, "unexpected eth_chainId result"),
                    Err(err) => warn!(error = %err, "eth_chainId poll failed"),
                }
            }
        })
    }

    async fn poll_accounts(&self) -> Result<Vec<Address>, TransportError> {
        let value = self.request("eth_accounts", json!([])).await?;
        let raw: Vec<String> = serde_json::from_value(value)
            .map_err(|err| TransportError::new(INTERNAL_ERROR, format!("malformed accounts: {err}")))?;
        raw.iter()
            .map(|account| {
                account
                    .parse::<Address>()
                    .map_err(|err| TransportError::new(INTERNAL_ERROR, format!("malformed account: {err}")))
            })
            .collect()
    }
}

#[async_trait]
impl WalletTransport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportError::new(INTERNAL_ERROR, format!("{method} transport: {err}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(TransportError::new(
                INTERNAL_ERROR,
                format!("{method} HTTP {status}: {text}"),
            ));
        }

        decode_response(method, &text)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<WalletEvent>> {
        Some(self.events.subscribe())
    }
}

fn decode_response(method: &str, text: &str) -> Result<Value, TransportError> {
    let parsed: RpcResponse = serde_json::from_str(text)
        .map_err(|err| TransportError::new(INTERNAL_ERROR, format!("{method} parse: {err}")))?;

    if let Some(error) = parsed.error {
        return Err(TransportError::new(error.code, error.message));
    }

    Ok(parsed.result.unwrap_or(Value::Null))
}
