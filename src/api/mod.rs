//! HTTP API for receipts, swaps, prices, and token metadata

use crate::config::Settings;
use crate::error::{GatewayError, GatewayResult};
use crate::prices::SpotPriceClient;
use crate::receipts::{NewReceipt, ReceiptStore};
use crate::swap::engine::SwapEngine;
use crate::swap::protocol::HttpFusionClient;
use crate::swap::tracker::SwapTracker;
use crate::swap::types::SwapRequest;
use crate::swap::wallet::{ChainAccess, EthersWallet, ReadOnlyProvider, WalletSigner};
use crate::tokens::TokenRegistry;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<ReceiptStore>,
    pub tracker: Arc<SwapTracker>,
    pub prices: Arc<SpotPriceClient>,
    pub tokens: Arc<TokenRegistry>,
}

/// Run the HTTP API server
pub async fn run_server(
    settings: Arc<Settings>,
    store: Arc<ReceiptStore>,
    tracker: Arc<SwapTracker>,
) -> GatewayResult<()> {
    let state = AppState {
        prices: Arc::new(SpotPriceClient::new(&settings.fusion)),
        tokens: Arc::new(TokenRegistry::new(&settings.fusion)),
        settings,
        store,
        tracker,
    };

    let addr = format!("{}:{}", state.settings.api.host, state.settings.api.port);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/receipts", post(create_receipt))
        .route("/api/receipts/:code", get(get_receipt))
        .route("/api/swap/quote", post(quote_swap))
        .route("/api/swap/execute", post(execute_swap))
        .route("/api/swaps", get(list_swaps))
        .route("/api/spot-price/:chain_id/:token", get(spot_price))
        .route("/api/convert", get(convert))
        .route("/api/tokens/:chain_id", get(chain_tokens))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - verify dependencies
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.store.health_check().await.is_ok();

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: db_ok,
            database: db_ok,
        }),
    )
}

/// Create an emoji receipt
async fn create_receipt(
    State(state): State<AppState>,
    Json(new): Json<NewReceipt>,
) -> impl IntoResponse {
    match state.store.create(new).await {
        Ok(receipt) => {
            crate::metrics::record_receipt_created();
            (StatusCode::CREATED, Json(serde_json::json!(receipt))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Look up a receipt by emoji code
async fn get_receipt(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> impl IntoResponse {
    match state.store.get_by_code(&code).await {
        Ok(receipt) => {
            crate::metrics::record_receipt_lookup(true);
            Json(serde_json::json!(receipt)).into_response()
        }
        Err(e) => {
            crate::metrics::record_receipt_lookup(false);
            error_response(e)
        }
    }
}

/// Swap request payload shared by quote and execute
#[derive(Debug, Deserialize)]
pub struct SwapRequestBody {
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub src_token_address: String,
    pub dst_token_address: String,
    /// Amount in the smallest unit of the source token, as a decimal string
    pub amount: String,
    pub payer_address: String,
    pub receiver_address: String,
}

impl SwapRequestBody {
    fn into_request(self) -> GatewayResult<SwapRequest> {
        let parse_addr = |s: &str, what: &str| {
            s.parse::<Address>()
                .map_err(|_| GatewayError::Config(format!("Invalid {} address: {}", what, s)))
        };

        Ok(SwapRequest {
            src_chain_id: self.src_chain_id,
            dst_chain_id: self.dst_chain_id,
            src_token: parse_addr(&self.src_token_address, "source token")?,
            dst_token: parse_addr(&self.dst_token_address, "destination token")?,
            amount: U256::from_dec_str(&self.amount)
                .map_err(|_| GatewayError::Config(format!("Invalid amount: {}", self.amount)))?,
            payer: parse_addr(&self.payer_address, "payer")?,
            receiver: parse_addr(&self.receiver_address, "receiver")?,
        })
    }
}

/// Build an engine with a signing wallet for the source chain
fn signing_engine(state: &AppState, src_chain_id: u64) -> GatewayResult<SwapEngine> {
    let chain_cfg = state
        .settings
        .get_chain_by_id(src_chain_id)
        .ok_or(GatewayError::UnsupportedChain {
            chain_id: src_chain_id,
        })?;

    let wallet = Arc::new(EthersWallet::from_config(chain_cfg, &state.settings.wallet)?);
    let signer: Arc<dyn WalletSigner> = wallet.clone();
    let chain: Arc<dyn ChainAccess> = wallet;
    let protocol = Arc::new(HttpFusionClient::new(&state.settings.fusion, signer));

    Ok(SwapEngine::new(
        protocol,
        chain,
        state.settings.router_table(),
        state.settings.swap.clone(),
        state.settings.fusion.order_source.clone(),
        state.tracker.clone(),
    ))
}

/// Build an engine without a key, for quote-only requests
fn read_only_engine(state: &AppState, src_chain_id: u64) -> GatewayResult<SwapEngine> {
    let chain_cfg = state
        .settings
        .get_chain_by_id(src_chain_id)
        .ok_or(GatewayError::UnsupportedChain {
            chain_id: src_chain_id,
        })?;

    let provider = Arc::new(ReadOnlyProvider::from_config(chain_cfg)?);
    let signer: Arc<dyn WalletSigner> = provider.clone();
    let chain: Arc<dyn ChainAccess> = provider;
    let protocol = Arc::new(HttpFusionClient::new(&state.settings.fusion, signer));

    Ok(SwapEngine::new(
        protocol,
        chain,
        state.settings.router_table(),
        state.settings.swap.clone(),
        state.settings.fusion.order_source.clone(),
        state.tracker.clone(),
    ))
}

/// Quote-only mode: fetch a quote, no on-chain side effects
async fn quote_swap(
    State(state): State<AppState>,
    Json(body): Json<SwapRequestBody>,
) -> impl IntoResponse {
    let result = async {
        let request = body.into_request()?;
        let engine = read_only_engine(&state, request.src_chain_id)?;
        engine.quote(&request).await
    }
    .await;

    match result {
        Ok(summary) => Json(serde_json::json!({
            "success": true,
            "quote": summary,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// Execute mode: run the full swap flow to a terminal status
async fn execute_swap(
    State(state): State<AppState>,
    Json(body): Json<SwapRequestBody>,
) -> impl IntoResponse {
    let result = async {
        let request = body.into_request()?;
        let engine = signing_engine(&state, request.src_chain_id)?;
        engine.execute(&request).await
    }
    .await;

    match result {
        Ok(outcome) => Json(serde_json::json!({
            "success": true,
            "orderHash": outcome.order_hash,
            "status": outcome.status,
            "order": outcome.order,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// List tracked swap attempts, newest first
async fn list_swaps(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tracker.list())
}

/// USD spot price for a token
async fn spot_price(
    State(state): State<AppState>,
    Path((chain_id, token)): Path<(u64, String)>,
) -> impl IntoResponse {
    match state.prices.fetch_spot_price(chain_id, &token).await {
        Ok(price) => {
            crate::metrics::record_price_lookup(true);
            Json(serde_json::json!({ token: price.to_string() })).into_response()
        }
        Err(e) => {
            crate::metrics::record_price_lookup(false);
            error_response(e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConvertQuery {
    dst_chain_id: u64,
    dst_token: String,
    dst_amount: f64,
    src_chain_id: u64,
    src_token: String,
}

/// Source amount matching a destination amount by USD value
async fn convert(
    State(state): State<AppState>,
    Query(query): Query<ConvertQuery>,
) -> impl IntoResponse {
    match state
        .prices
        .source_amount_for(
            query.dst_chain_id,
            &query.dst_token,
            query.dst_amount,
            query.src_chain_id,
            &query.src_token,
        )
        .await
    {
        Ok(conversion) => Json(serde_json::json!(conversion)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Token list for a chain
async fn chain_tokens(
    State(state): State<AppState>,
    Path(chain_id): Path<u64>,
) -> impl IntoResponse {
    Json(state.tokens.tokens_for_chain(chain_id).await)
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    database: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    needs_reconciliation: bool,
}

fn error_response(e: GatewayError) -> axum::response::Response {
    let status = match &e {
        GatewayError::ReceiptNotFound { .. } => StatusCode::NOT_FOUND,
        GatewayError::InvalidReceipt(_)
        | GatewayError::UnsupportedChain { .. }
        | GatewayError::Config(_) => StatusCode::BAD_REQUEST,
        GatewayError::QuoteUnavailable(_)
        | GatewayError::OrderRejected(_)
        | GatewayError::Protocol(_)
        | GatewayError::Price(_) => StatusCode::BAD_GATEWAY,
        GatewayError::EscrowTimeout { .. } | GatewayError::StatusTimeout { .. } => {
            StatusCode::GATEWAY_TIMEOUT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = ErrorResponse {
        success: false,
        error: e.to_string(),
        stage: e.failed_stage(),
        needs_reconciliation: e.needs_reconciliation(),
    };

    (status, Json(body)).into_response()
}
