//! Swap protocol client
//!
//! `FusionProtocol` is the abstract surface the orchestrator drives; the HTTP
//! implementation talks to the protocol's quoter, relayer, and order-status
//! endpoints with bearer authentication. Order construction is requested from
//! the quoter and signed through the injected `WalletSigner`, so the client
//! never holds key material itself.

use crate::config::FusionConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::swap::types::{OrderParams, OrderStatus, PlacedOrder, Quote, ReadyFills, SwapRequest};
use crate::swap::wallet::WalletSigner;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

/// Operations the orchestrator needs from the swap protocol
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FusionProtocol: Send + Sync {
    /// Price/route quote for a request, with estimation enabled
    async fn get_quote(&self, request: &SwapRequest) -> GatewayResult<Quote>;

    /// Construct, sign, and submit an order against a quote
    async fn place_order(&self, quote: &Quote, params: &OrderParams) -> GatewayResult<PlacedOrder>;

    /// Escrow/finality readiness for an order
    async fn ready_fills(&self, order_hash: &str) -> GatewayResult<ReadyFills>;

    /// Reveal one secret (hex form) for an order
    async fn submit_secret(&self, order_hash: &str, secret: &str) -> GatewayResult<()>;

    /// Current order status
    async fn order_status(&self, order_hash: &str) -> GatewayResult<OrderStatus>;
}

/// HTTP client for the protocol's REST API
pub struct HttpFusionClient {
    http: reqwest::Client,
    base_url: String,
    auth_key: String,
    signer: Arc<dyn WalletSigner>,
}

#[derive(Debug, Deserialize)]
struct BuiltOrder {
    #[serde(rename = "orderHash")]
    order_hash: String,
    #[serde(rename = "typedData")]
    typed_data: serde_json::Value,
    #[serde(default)]
    extension: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: OrderStatus,
}

impl HttpFusionClient {
    pub fn new(config: &FusionConfig, signer: Arc<dyn WalletSigner>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_key: config.auth_key.clone(),
            signer,
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> GatewayResult<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.auth_key)
            .query(query)
            .send()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        if !status.is_success() {
            warn!(%url, %status, "Protocol API request failed");
            return Err(GatewayError::Protocol(format!("{}: {}", status, body)));
        }

        serde_json::from_str(&body)
            .map_err(|e| GatewayError::Protocol(format!("Invalid JSON response: {}", e)))
    }

    /// POST returning the response body, tolerating an empty body on success
    async fn post_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &serde_json::Value,
    ) -> GatewayResult<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.auth_key)
            .query(query)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        if !status.is_success() {
            warn!(%url, %status, "Protocol API request failed");
            return Err(GatewayError::Protocol(format!("{}: {}", status, text)));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| GatewayError::Protocol(format!("Invalid JSON response: {}", e)))
    }
}

fn hex32(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[async_trait]
impl FusionProtocol for HttpFusionClient {
    async fn get_quote(&self, request: &SwapRequest) -> GatewayResult<Quote> {
        let query = [
            ("srcChain", request.src_chain_id.to_string()),
            ("dstChain", request.dst_chain_id.to_string()),
            ("srcTokenAddress", format!("{:?}", request.src_token)),
            ("dstTokenAddress", format!("{:?}", request.dst_token)),
            ("amount", request.amount.to_string()),
            ("walletAddress", format!("{:?}", request.payer)),
            ("enableEstimate", "true".to_string()),
        ];

        let raw = self
            .get_json("quoter/v1.0/quote/receive", &query)
            .await
            .map_err(|e| GatewayError::QuoteUnavailable(e.to_string()))?;

        let mut quote: Quote = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::QuoteUnavailable(format!("Malformed quote: {}", e)))?;
        quote.raw = raw;

        debug!(preset = %quote.recommended_preset, "Quote received");
        Ok(quote)
    }

    async fn place_order(&self, quote: &Quote, params: &OrderParams) -> GatewayResult<PlacedOrder> {
        let secret_hashes: Vec<String> = params.secret_hashes.iter().map(hex32).collect();

        let build_body = json!({
            "quote": quote.raw,
            "walletAddress": format!("{:?}", params.payer),
            "receiver": format!("{:?}", params.receiver),
            "preset": params.preset.to_string(),
            "source": params.source,
            "hashLock": hex32(&params.hash_lock),
            "secretHashes": secret_hashes,
        });

        let built: BuiltOrder = serde_json::from_value(
            self.post_json("quoter/v1.0/quote/build", &[], &build_body)
                .await
                .map_err(|e| GatewayError::OrderRejected(e.to_string()))?,
        )
        .map_err(|e| GatewayError::OrderRejected(format!("Malformed order build: {}", e)))?;

        let signature = self
            .signer
            .sign_typed_data(params.payer, &built.typed_data)
            .await?;

        let order_message = built
            .typed_data
            .get("message")
            .cloned()
            .ok_or_else(|| GatewayError::OrderRejected("order typed data has no message".into()))?;

        let submit_body = json!({
            "order": order_message,
            "signature": signature,
            "extension": built.extension,
            "quoteId": quote.quote_id,
            "secretHashes": secret_hashes,
        });

        self.post_json("relayer/v1.0/submit", &[], &submit_body)
            .await
            .map_err(|e| GatewayError::OrderRejected(e.to_string()))?;

        debug!(order_hash = %built.order_hash, "Order placed");
        Ok(PlacedOrder {
            order_hash: built.order_hash,
            payload: order_message,
        })
    }

    async fn ready_fills(&self, order_hash: &str) -> GatewayResult<ReadyFills> {
        let path = format!("orders/v1.0/order/ready-to-accept-secret-fills/{}", order_hash);
        let raw = self.get_json(&path, &[]).await?;
        serde_json::from_value(raw)
            .map_err(|e| GatewayError::Protocol(format!("Malformed readiness response: {}", e)))
    }

    async fn submit_secret(&self, order_hash: &str, secret: &str) -> GatewayResult<()> {
        let body = json!({ "orderHash": order_hash, "secret": secret });
        self.post_json("relayer/v1.0/submit/secret", &[], &body)
            .await
            .map_err(|e| GatewayError::SecretSubmissionFailed(e.to_string()))?;
        Ok(())
    }

    async fn order_status(&self, order_hash: &str) -> GatewayResult<OrderStatus> {
        let path = format!("orders/v1.0/order/status/{}", order_hash);
        let raw = self.get_json(&path, &[]).await?;
        let parsed: StatusResponse = serde_json::from_value(raw)
            .map_err(|e| GatewayError::Protocol(format!("Malformed status response: {}", e)))?;
        Ok(parsed.status)
    }
}
