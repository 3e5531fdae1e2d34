//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Swap attempt outcomes and latency
//! - Receipt creation and lookups
//! - Spot price lookups

use crate::error::GatewayResult;
use crate::swap::types::OrderStatus;

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref SWAPS_STARTED: CounterVec = register_counter_vec!(
        "emojipay_swaps_started_total",
        "Total swap attempts started",
        &["src_chain_id"]
    )
    .unwrap();

    pub static ref SWAPS_COMPLETED: CounterVec = register_counter_vec!(
        "emojipay_swaps_completed_total",
        "Total swap attempts reaching a terminal status",
        &["status"]
    )
    .unwrap();

    pub static ref SWAPS_FAILED: CounterVec = register_counter_vec!(
        "emojipay_swaps_failed_total",
        "Total swap attempts failed, by stage",
        &["stage"]
    )
    .unwrap();

    pub static ref SWAP_DURATION: Histogram = register_histogram!(
        "emojipay_swap_duration_seconds",
        "End-to-end swap attempt duration",
        vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .unwrap();

    pub static ref RECEIPTS_CREATED: CounterVec = register_counter_vec!(
        "emojipay_receipts_created_total",
        "Total receipts created",
        &[]
    )
    .unwrap();

    pub static ref RECEIPT_LOOKUPS: CounterVec = register_counter_vec!(
        "emojipay_receipt_lookups_total",
        "Total receipt lookups by result",
        &["result"]
    )
    .unwrap();

    pub static ref PRICE_LOOKUPS: CounterVec = register_counter_vec!(
        "emojipay_price_lookups_total",
        "Total spot price lookups by result",
        &["result"]
    )
    .unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> GatewayResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

// Helper functions to record metrics

pub fn record_swap_started(src_chain_id: u64) {
    SWAPS_STARTED
        .with_label_values(&[&src_chain_id.to_string()])
        .inc();
}

pub fn record_swap_completed(status: OrderStatus) {
    SWAPS_COMPLETED
        .with_label_values(&[&status.to_string()])
        .inc();
}

pub fn record_swap_failed(stage: &str) {
    SWAPS_FAILED.with_label_values(&[stage]).inc();
}

pub fn record_swap_duration(seconds: f64) {
    SWAP_DURATION.observe(seconds);
}

pub fn record_receipt_created() {
    RECEIPTS_CREATED.with_label_values(&[]).inc();
}

pub fn record_receipt_lookup(found: bool) {
    let result = if found { "found" } else { "missing" };
    RECEIPT_LOOKUPS.with_label_values(&[result]).inc();
}

pub fn record_price_lookup(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    PRICE_LOOKUPS.with_label_values(&[result]).inc();
}
