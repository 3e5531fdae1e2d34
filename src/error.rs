//! Error types for the emojipay gateway

use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Chain {chain_id} is not supported (no router configured)")]
    UnsupportedChain { chain_id: u64 },

    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("Allowance not updated after approval: have {current}, need {required}")]
    AllowanceNotUpdated { current: String, required: String },

    #[error("Order rejected by protocol: {0}")]
    OrderRejected(String),

    #[error("No escrow became ready within {attempts} polls")]
    EscrowTimeout { attempts: u32 },

    #[error("Secret submission failed: {0}")]
    SecretSubmissionFailed(String),

    #[error("Order did not reach a terminal state within {attempts} polls")]
    StatusTimeout { attempts: u32 },

    #[error("Unexpected protocol response: {0}")]
    Protocol(String),

    #[error("Chain access error on chain {chain_id}: {message}")]
    Chain { chain_id: u64, message: String },

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Receipt {code} not found")]
    ReceiptNotFound { code: String },

    #[error("Invalid receipt: {0}")]
    InvalidReceipt(String),

    #[error("Price lookup failed: {0}")]
    Price(String),
}

impl GatewayError {
    /// The orchestrator stage this error belongs to, if it arose inside the
    /// swap flow. A failed attempt reports the stage that failed together
    /// with the underlying reason.
    pub fn failed_stage(&self) -> Option<&'static str> {
        match self {
            GatewayError::UnsupportedChain { .. } => Some("route"),
            GatewayError::QuoteUnavailable(_) => Some("quote"),
            GatewayError::AllowanceNotUpdated { .. } => Some("allowance"),
            GatewayError::OrderRejected(_) => Some("order"),
            GatewayError::EscrowTimeout { .. } => Some("awaiting_escrow"),
            GatewayError::SecretSubmissionFailed(_) => Some("revealing_secrets"),
            GatewayError::StatusTimeout { .. } => Some("awaiting_terminal"),
            _ => None,
        }
    }

    /// Whether the attempt may have left on-chain state behind (an approval
    /// or a placed order) that the caller must reconcile out-of-band.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(
            self,
            GatewayError::EscrowTimeout { .. }
                | GatewayError::SecretSubmissionFailed(_)
                | GatewayError::StatusTimeout { .. }
        )
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
