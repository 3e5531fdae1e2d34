//! In-memory registry of swap attempts
//!
//! Each attempt owns its own quote, secrets, and order; the tracker only
//! records stage transitions so operators can see what in-flight attempts
//! are doing and where failed ones stopped.

use crate::swap::types::{SwapRequest, SwapStage};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct SwapAttempt {
    pub id: Uuid,
    pub payer: String,
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub amount: String,
    pub stage: SwapStage,
    pub order_hash: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SwapTracker {
    attempts: DashMap<Uuid, SwapAttempt>,
}

impl SwapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new attempt, returning its id
    pub fn begin(&self, request: &SwapRequest) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.attempts.insert(
            id,
            SwapAttempt {
                id,
                payer: format!("{:?}", request.payer),
                src_chain_id: request.src_chain_id,
                dst_chain_id: request.dst_chain_id,
                amount: request.amount.to_string(),
                stage: SwapStage::Quote,
                order_hash: None,
                error: None,
                started_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn set_stage(&self, id: Uuid, stage: SwapStage) {
        if let Some(mut attempt) = self.attempts.get_mut(&id) {
            attempt.stage = stage;
            attempt.updated_at = Utc::now();
        }
    }

    pub fn set_order_hash(&self, id: Uuid, order_hash: &str) {
        if let Some(mut attempt) = self.attempts.get_mut(&id) {
            attempt.order_hash = Some(order_hash.to_string());
            attempt.updated_at = Utc::now();
        }
    }

    pub fn complete(&self, id: Uuid) {
        self.set_stage(id, SwapStage::Completed);
    }

    pub fn fail(&self, id: Uuid, error: &str) {
        if let Some(mut attempt) = self.attempts.get_mut(&id) {
            attempt.stage = SwapStage::Failed;
            attempt.error = Some(error.to_string());
            attempt.updated_at = Utc::now();
        }
    }

    /// All tracked attempts, newest first
    pub fn list(&self) -> Vec<SwapAttempt> {
        let mut attempts: Vec<_> = self.attempts.iter().map(|e| e.value().clone()).collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        attempts
    }

    /// Drop finished attempts older than `max_age_secs`
    pub fn cleanup(&self, max_age_secs: i64) {
        let cutoff = Utc::now() - chrono::Duration::seconds(max_age_secs);
        self.attempts.retain(|_, attempt| {
            !(matches!(attempt.stage, SwapStage::Completed | SwapStage::Failed)
                && attempt.updated_at < cutoff)
        });
    }
}
