//! PostgreSQL receipt store

use crate::config::DatabaseConfig;
use crate::error::{GatewayError, GatewayResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

/// A stored emoji receipt: the payment request a payer fulfils via a swap
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub id: Uuid,
    pub emoji_code: String,
    pub description: String,
    pub destination_chain_id: u64,
    pub destination_token_symbol: String,
    pub destination_token_address: String,
    pub destination_address: String,
    /// Destination amount as a decimal string
    pub amount: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a receipt
#[derive(Debug, Clone, Deserialize)]
pub struct NewReceipt {
    pub emoji_code: String,
    pub description: String,
    pub destination_chain_id: u64,
    pub destination_token_symbol: String,
    pub destination_token_address: String,
    pub destination_address: String,
    pub amount: String,
}

pub struct ReceiptStore {
    pool: PgPool,
}

impl ReceiptStore {
    pub async fn new(config: &DatabaseConfig) -> GatewayResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> GatewayResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS receipts (
                id UUID PRIMARY KEY,
                emoji_code TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                destination_chain_id BIGINT NOT NULL,
                destination_token_symbol TEXT NOT NULL,
                destination_token_address TEXT NOT NULL,
                destination_address TEXT NOT NULL,
                amount TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_receipts_code
            ON receipts (emoji_code)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create a receipt, validating its emoji code
    pub async fn create(&self, new: NewReceipt) -> GatewayResult<Receipt> {
        if !super::validate_code(&new.emoji_code) {
            return Err(GatewayError::InvalidReceipt(
                "emoji code must be exactly four emoji symbols".to_string(),
            ));
        }
        if new.destination_address.is_empty() {
            return Err(GatewayError::InvalidReceipt(
                "destination address is required".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"
            INSERT INTO receipts (
                id, emoji_code, description, destination_chain_id,
                destination_token_symbol, destination_token_address,
                destination_address, amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&new.emoji_code)
        .bind(&new.description)
        .bind(new.destination_chain_id as i64)
        .bind(&new.destination_token_symbol)
        .bind(&new.destination_token_address)
        .bind(&new.destination_address)
        .bind(&new.amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(receipt_from_row(&row))
    }

    /// Look up a receipt by its emoji code
    pub async fn get_by_code(&self, code: &str) -> GatewayResult<Receipt> {
        let row = sqlx::query("SELECT * FROM receipts WHERE emoji_code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| receipt_from_row(&r))
            .ok_or_else(|| GatewayError::ReceiptNotFound {
                code: code.to_string(),
            })
    }

    /// Total stored receipts
    pub async fn count(&self) -> GatewayResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM receipts")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.get("total");
        Ok(total as u64)
    }

    /// Health check
    pub async fn health_check(&self) -> GatewayResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn receipt_from_row(row: &PgRow) -> Receipt {
    Receipt {
        id: row.get("id"),
        emoji_code: row.get("emoji_code"),
        description: row.get("description"),
        destination_chain_id: row.get::<i64, _>("destination_chain_id") as u64,
        destination_token_symbol: row.get("destination_token_symbol"),
        destination_token_address: row.get("destination_token_address"),
        destination_address: row.get("destination_address"),
        amount: row.get("amount"),
        created_at: row.get("created_at"),
    }
}
