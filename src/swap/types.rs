//! Data model for the cross-chain swap flow

use crate::error::{GatewayError, GatewayResult};

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A cross-chain swap request, immutable once constructed
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub src_token: Address,
    pub dst_token: Address,
    /// Amount in the smallest unit of the source token
    pub amount: U256,
    pub payer: Address,
    pub receiver: Address,
}

/// Named execution presets offered by the protocol's quoter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    Fast,
    Medium,
    Slow,
    Custom,
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PresetName::Fast => "fast",
            PresetName::Medium => "medium",
            PresetName::Slow => "slow",
            PresetName::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Per-preset route parameters from the quote
#[derive(Debug, Clone, Deserialize)]
pub struct QuotePreset {
    #[serde(rename = "secretsCount")]
    pub secrets_count: usize,
}

/// A price/route quote from the swap protocol.
///
/// Owned transiently by the orchestrator for one attempt; never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct Quote {
    #[serde(rename = "quoteId", default)]
    pub quote_id: Option<String>,
    #[serde(rename = "recommendedPreset")]
    pub recommended_preset: PresetName,
    pub presets: HashMap<PresetName, QuotePreset>,
    /// Full quoter payload, passed back verbatim when building the order
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl Quote {
    /// Parameters of a named preset
    pub fn preset(&self, name: PresetName) -> GatewayResult<&QuotePreset> {
        self.presets
            .get(&name)
            .ok_or_else(|| GatewayError::Protocol(format!("quote has no preset '{}'", name)))
    }

    /// Parameters of the recommended preset
    pub fn recommended(&self) -> GatewayResult<&QuotePreset> {
        self.preset(self.recommended_preset)
    }
}

/// Parameters for placing an order against a quote
#[derive(Debug, Clone)]
pub struct OrderParams {
    pub payer: Address,
    pub receiver: Address,
    pub preset: PresetName,
    /// Source tag identifying this integration to the protocol
    pub source: String,
    /// Hash-lock commitment (single-fill hash or multi-fill Merkle root)
    pub hash_lock: [u8; 32],
    /// Commitments for each secret, in generation order
    pub secret_hashes: Vec<[u8; 32]>,
}

/// A placed swap order
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order_hash: String,
    /// Full order payload as returned by the protocol
    pub payload: serde_json::Value,
}

/// Escrow readiness report for an order
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadyFills {
    pub fills: Vec<ReadyFill>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyFill {
    /// Index into the order's secret set this fill unlocks against
    pub idx: usize,
}

/// Protocol-defined order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Executed,
    Expired,
    Cancelled,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Terminal states admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Executed
                | OrderStatus::Expired
                | OrderStatus::Cancelled
                | OrderStatus::Refunded
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Executed => "executed",
            OrderStatus::Expired => "expired",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Stage of a swap attempt, for tracking and failure reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStage {
    Quote,
    Allowance,
    Secrets,
    PlacingOrder,
    AwaitingEscrow,
    RevealingSecrets,
    AwaitingTerminal,
    Completed,
    Failed,
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwapStage::Quote => "quote",
            SwapStage::Allowance => "allowance",
            SwapStage::Secrets => "secrets",
            SwapStage::PlacingOrder => "placing_order",
            SwapStage::AwaitingEscrow => "awaiting_escrow",
            SwapStage::RevealingSecrets => "revealing_secrets",
            SwapStage::AwaitingTerminal => "awaiting_terminal",
            SwapStage::Completed => "completed",
            SwapStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Successful result of a full swap attempt
#[derive(Debug, Clone, Serialize)]
pub struct SwapOutcome {
    pub order_hash: String,
    pub status: OrderStatus,
    pub order: serde_json::Value,
}

/// Result of a quote-only attempt
#[derive(Debug, Clone, Serialize)]
pub struct QuoteSummary {
    pub recommended_preset: PresetName,
    pub secrets_count: usize,
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub amount: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Executed.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_quote_preset_lookup() {
        let json = r#"{
            "quoteId": "q-1",
            "recommendedPreset": "fast",
            "presets": {
                "fast": { "secretsCount": 1 },
                "medium": { "secretsCount": 3 }
            }
        }"#;
        let quote: Quote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.recommended().unwrap().secrets_count, 1);
        assert_eq!(quote.preset(PresetName::Medium).unwrap().secrets_count, 3);
        assert!(quote.preset(PresetName::Slow).is_err());
    }
}
