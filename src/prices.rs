//! USD spot prices and amount conversion
//!
//! A stateless unit converter: receipts fix a destination amount, and the
//! payer's source amount is whatever carries the same USD value.

use crate::config::FusionConfig;
use crate::error::{GatewayError, GatewayResult};

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Conversion between a destination amount and the matching source amount
#[derive(Debug, Clone, Serialize)]
pub struct PriceConversion {
    pub destination_token_price: f64,
    pub source_token_price: f64,
    pub destination_amount: f64,
    pub source_amount: f64,
    pub conversion_rate: f64,
}

/// Source amount whose USD value matches the destination amount
pub fn convert_to_source_amount(
    destination_amount: f64,
    destination_price: f64,
    source_price: f64,
) -> GatewayResult<PriceConversion> {
    if destination_price <= 0.0 || source_price <= 0.0 {
        return Err(GatewayError::Price(
            "Unable to fetch token prices".to_string(),
        ));
    }

    let destination_value_usd = destination_amount * destination_price;
    let source_amount = destination_value_usd / source_price;

    Ok(PriceConversion {
        destination_token_price: destination_price,
        source_token_price: source_price,
        destination_amount,
        source_amount,
        conversion_rate: destination_price / source_price,
    })
}

/// Client for the protocol's spot-price API
pub struct SpotPriceClient {
    http: reqwest::Client,
    price_url: String,
    auth_key: String,
}

impl SpotPriceClient {
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            price_url: config.price_url.trim_end_matches('/').to_string(),
            auth_key: config.auth_key.clone(),
        }
    }

    /// USD spot price for a token on a chain
    pub async fn fetch_spot_price(&self, chain_id: u64, token_address: &str) -> GatewayResult<f64> {
        let url = format!("{}/{}/{}", self.price_url, chain_id, token_address);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.auth_key)
            .query(&[("currency", "USD")])
            .send()
            .await
            .map_err(|e| GatewayError::Price(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Price(format!(
                "price API returned {}",
                response.status()
            )));
        }

        let prices: HashMap<String, String> = response
            .json()
            .await
            .map_err(|e| GatewayError::Price(e.to_string()))?;

        let price = prices
            .iter()
            .find(|(addr, _)| addr.eq_ignore_ascii_case(token_address))
            .and_then(|(_, p)| p.parse::<f64>().ok())
            .ok_or_else(|| {
                GatewayError::Price(format!("no price for {} on chain {}", token_address, chain_id))
            })?;

        debug!(chain_id, token_address, price, "Spot price fetched");
        Ok(price)
    }

    /// Conversion from a destination (chain, token, amount) to the source
    /// amount of another (chain, token)
    pub async fn source_amount_for(
        &self,
        destination_chain_id: u64,
        destination_token: &str,
        destination_amount: f64,
        source_chain_id: u64,
        source_token: &str,
    ) -> GatewayResult<PriceConversion> {
        let destination_price = self
            .fetch_spot_price(destination_chain_id, destination_token)
            .await?;
        let source_price = self.fetch_spot_price(source_chain_id, source_token).await?;

        convert_to_source_amount(destination_amount, destination_price, source_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_matches_usd_value() {
        // 100 OP at $2 is $200, which buys 0.1 ETH at $2000.
        let conv = convert_to_source_amount(100.0, 2.0, 2000.0).unwrap();
        assert!((conv.source_amount - 0.1).abs() < 1e-12);
        assert!((conv.conversion_rate - 0.001).abs() < 1e-12);
        assert_eq!(conv.destination_amount, 100.0);
    }

    #[test]
    fn test_identical_prices_give_equal_amounts() {
        let conv = convert_to_source_amount(5.0, 1.0, 1.0).unwrap();
        assert_eq!(conv.source_amount, 5.0);
        assert_eq!(conv.conversion_rate, 1.0);
    }

    #[test]
    fn test_zero_price_rejected() {
        assert!(convert_to_source_amount(1.0, 0.0, 10.0).is_err());
        assert!(convert_to_source_amount(1.0, 10.0, 0.0).is_err());
        assert!(convert_to_source_amount(1.0, -1.0, 10.0).is_err());
    }
}
