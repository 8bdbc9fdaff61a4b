use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use ld_api_types::{
    ChainId, ConnectOutcome, NetworkSummary, ReadOutcome, RoundRecord, SessionSnapshot, SwitchOutcome,
};
use ld_session::SessionManager;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

pub(crate) const SERVICE_NAME: &str = "session-service";
const DEFAULT_PAGE_SIZE: u64 = 5;

#[derive(Clone)]
pub(crate) struct AppState {
    pub session: SessionManager,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
    wallet_available: bool,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct NetworksResponse {
    recommended: ChainId,
    networks: Vec<NetworkSummary>,
}

#[derive(Debug, Deserialize)]
struct ConnectQuery {
    silent: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SwitchRequest {
    chain_id: ChainId,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    page: Option<u64>,
    page_size: Option<u64>,
}

pub(crate) type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

pub(crate) fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/networks", get(networks))
        .route("/session", get(session_snapshot))
        .route("/session/connect", post(session_connect))
        .route("/session/disconnect", post(session_disconnect))
        .route("/session/switch", post(session_switch))
        .route("/session/refresh", post(session_refresh))
        .route("/lottery/pool", get(lottery_pool))
        .route("/lottery/round", get(lottery_round))
        .route("/lottery/history", get(lottery_history))
        .route("/lottery/next-draw", get(lottery_next_draw))
        .route("/lottery/participants", get(lottery_participants))
        .route("/wallet/balance", get(wallet_balance))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: SERVICE_NAME,
        status: "ok",
        wallet_available: state.session.wallet_available(),
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn networks(State(state): State<AppState>) -> Json<NetworksResponse> {
    let registry = state.session.networks();
    Json(NetworksResponse {
        recommended: registry.recommended_chain_id(),
        networks: registry.summaries(),
    })
}

async fn session_snapshot(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

async fn session_connect(
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
) -> Json<ConnectOutcome> {
    Json(state.session.connect(query.silent.unwrap_or(false)).await)
}

async fn session_disconnect(State(state): State<AppState>) -> Json<SessionSnapshot> {
    state.session.disconnect().await;
    Json(state.session.snapshot())
}

async fn session_switch(
    State(state): State<AppState>,
    Json(request): Json<SwitchRequest>,
) -> ApiResult<SwitchOutcome> {
    if state.session.networks().network(request.chain_id).is_none() {
        return Err(bad_request(&format!("unknown chain id {}", request.chain_id)));
    }
    info!(chain_id = %request.chain_id, "network switch requested");
    Ok(Json(state.session.switch_network(request.chain_id).await))
}

async fn session_refresh(State(state): State<AppState>) -> ApiResult<SessionSnapshot> {
    state
        .session
        .refresh_wallet_state()
        .await
        .map_err(internal_error)?;
    Ok(Json(state.session.snapshot()))
}

async fn lottery_pool(State(state): State<AppState>) -> Json<ReadOutcome<String>> {
    Json(state.session.get_prize_pool_amount().await)
}

async fn lottery_round(State(state): State<AppState>) -> Json<ReadOutcome<u64>> {
    Json(state.session.get_current_round_id().await)
}

async fn lottery_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<ReadOutcome<Vec<RoundRecord>>> {
    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(bad_request("page starts at 1"));
    }
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size == 0 {
        return Err(bad_request("page_size must be greater than zero"));
    }
    Ok(Json(state.session.get_lottery_history(page, page_size).await))
}

async fn lottery_next_draw(State(state): State<AppState>) -> Json<ReadOutcome<u64>> {
    Json(state.session.get_next_draw_timestamp().await)
}

async fn lottery_participants(State(state): State<AppState>) -> Json<ReadOutcome<u64>> {
    Json(state.session.get_participants_count().await)
}

async fn wallet_balance(State(state): State<AppState>) -> Json<ReadOutcome<String>> {
    Json(state.session.get_account_balance().await)
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn internal_error(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use ld_contracts::abi::selector;
    use ld_network::NetworkRegistry;
    use ld_session::SessionConfig;
    use ld_storage::{JsonFileStore, KeyValueStore, USER_DISCONNECTED_KEY, read_flag};
    use ld_wallet::{ProviderFactory, TransportError, WalletEvent, WalletTransport};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    const ACCOUNT: &str = "0x5b1ded0a8c017c0772f608225deca4741622816f";

    /// Node-style wallet on Sepolia with one account and a lottery on round 2.
    struct DevNode;

    #[async_trait]
    impl WalletTransport for DevNode {
        async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
            match method {
                "eth_requestAccounts" | "eth_accounts" => Ok(json!([ACCOUNT])),
                "eth_chainId" => Ok(json!("0xaa36a7")),
                "eth_getBalance" => Ok(json!("0xde0b6b3a7640000")),
                "eth_call" => {
                    let data = params[0]["data"].as_str().unwrap_or_default();
                    let round_id = alloy_primitives::hex::encode(selector("getCurrentRoundId()"));
                    if data.trim_start_matches("0x").starts_with(&round_id) {
                        Ok(json!(alloy_primitives::hex::encode_prefixed(
                            U256::from(2u64).to_be_bytes::<32>()
                        )))
                    } else {
                        Err(TransportError::new(-32000, "execution reverted"))
                    }
                }
                _ => Err(TransportError::new(-32601, "method not found")),
            }
        }

        fn subscribe(&self) -> Option<broadcast::Receiver<WalletEvent>> {
            None
        }
    }

    async fn test_app(dir: &tempfile::TempDir) -> anyhow::Result<(Router, Arc<JsonFileStore>)> {
        let store = Arc::new(JsonFileStore::open(dir.path().join("session.json")).await?);
        let store_handle: Arc<dyn KeyValueStore> = store.clone();
        let transport: Arc<dyn WalletTransport> = Arc::new(DevNode);
        let session = SessionManager::new(
            ProviderFactory::new(Some(transport)),
            Arc::new(NetworkRegistry::builtin()),
            store_handle,
            SessionConfig::default(),
        )
        .await;
        Ok((app(AppState { session }), store))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> anyhow::Result<(StatusCode, Value)> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        let response = app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    #[tokio::test]
    async fn health_reports_wallet() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (app, _) = test_app(&dir).await?;
        let (status, body) = call(&app, "GET", "/health", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["wallet_available"], true);
        Ok(())
    }

    #[tokio::test]
    async fn connect_then_read() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (app, _) = test_app(&dir).await?;

        let (_, body) = call(&app, "GET", "/lottery/round", None).await?;
        assert_eq!(body["state"], "unavailable");
        assert_eq!(body["value"]["reason"], "not_connected");

        let (status, body) = call(&app, "POST", "/session/connect", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "connected");
        assert_eq!(body["chain_id"], 11_155_111);

        let (_, body) = call(&app, "GET", "/session", None).await?;
        assert_eq!(body["status"], "connected");
        assert_eq!(body["network_name"], "Sepolia Testnet");
        assert_eq!(body["bound_contracts"].as_array().map(Vec::len), Some(4));

        let (_, body) = call(&app, "GET", "/lottery/round", None).await?;
        assert_eq!(body, json!({ "state": "available", "value": 2 }));

        let (_, body) = call(&app, "GET", "/wallet/balance", None).await?;
        assert_eq!(body["value"], "1.00000000");

        let (_, body) = call(&app, "GET", "/lottery/pool", None).await?;
        assert_eq!(body["state"], "unavailable");
        assert_eq!(body["value"]["reason"], "call_failed");
        Ok(())
    }

    #[tokio::test]
    async fn disconnect_is_persisted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (app, store) = test_app(&dir).await?;

        call(&app, "POST", "/session/connect", None).await?;
        let (status, body) = call(&app, "POST", "/session/disconnect", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "disconnected");
        assert_eq!(body["user_disconnected"], true);
        assert!(read_flag(store.as_ref(), USER_DISCONNECTED_KEY).await?);

        let reopened = JsonFileStore::open(store.path()).await?;
        assert!(read_flag(&reopened, USER_DISCONNECTED_KEY).await?);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_requests_are_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (app, _) = test_app(&dir).await?;

        let (status, body) = call(&app, "GET", "/lottery/history?page=0", None).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "page starts at 1");

        let (status, _) = call(&app, "POST", "/session/switch", Some(json!({ "chain_id": 31337 }))).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn networks_lists_recommended_chain() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (app, _) = test_app(&dir).await?;
        let (_, body) = call(&app, "GET", "/networks", None).await?;
        assert_eq!(body["recommended"], 11_155_111);
        let networks = body["networks"].as_array().cloned().unwrap_or_default();
        assert_eq!(networks.len(), 8);
        assert_eq!(
            networks
                .iter()
                .filter(|network| network["supported"] == true)
                .count(),
            3
        );
        Ok(())
    }
}
