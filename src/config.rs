//! Configuration management for the emojipay gateway
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::error::{GatewayError, GatewayResult};

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub metrics: MetricsConfig,
    pub fusion: FusionConfig,
    pub swap: SwapConfig,
    pub wallet: WalletConfig,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

/// Swap protocol API endpoints and credentials
#[derive(Debug, Clone, Deserialize)]
pub struct FusionConfig {
    pub base_url: String,
    pub price_url: String,
    pub token_list_url: String,
    pub auth_key: String,
    /// Source tag attached to placed orders
    pub order_source: String,
}

/// Orchestrator timing and bounds
#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    pub poll_interval_ms: u64,
    pub max_escrow_attempts: u32,
    pub max_status_attempts: u32,
    /// Logs raw secrets and allowance internals when set. Never enable in
    /// production; secrets unlock escrows.
    #[serde(default)]
    pub verbose_secrets: bool,
}

impl SwapConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Name of the environment variable holding the payer private key
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub router_address: String,
    pub enabled: bool,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("EMOJIPAY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        for (name, chain) in &self.chains {
            if chain.enabled {
                if chain.rpc_url.is_empty() {
                    anyhow::bail!("Chain {} has no RPC URL configured", name);
                }
                chain
                    .router_address
                    .parse::<Address>()
                    .map_err(|_| anyhow::anyhow!("Chain {} has an invalid router address", name))?;
            }
        }

        if self.swap.max_escrow_attempts == 0 || self.swap.max_status_attempts == 0 {
            anyhow::bail!("Polling attempt bounds must be non-zero");
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }

    /// Get chain config by chain ID
    pub fn get_chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains
            .values()
            .find(|c| c.enabled && c.chain_id == chain_id)
    }

    /// Build the router lookup table from the enabled chains
    pub fn router_table(&self) -> RouterTable {
        RouterTable::from_chains(self.chains.values().filter(|c| c.enabled))
    }
}

/// Static per-chain lookup of the swap protocol's router contract.
///
/// A missing entry is a hard configuration error; resolution happens before
/// any network call is made for an attempt.
#[derive(Debug, Clone, Default)]
pub struct RouterTable {
    routers: HashMap<u64, Address>,
}

impl RouterTable {
    pub fn from_chains<'a>(chains: impl Iterator<Item = &'a ChainConfig>) -> Self {
        let routers = chains
            .filter_map(|c| c.router_address.parse::<Address>().ok().map(|a| (c.chain_id, a)))
            .collect();
        Self { routers }
    }

    /// Resolve the router address for a chain, failing fast on unknown ids
    pub fn resolve(&self, chain_id: u64) -> GatewayResult<Address> {
        self.routers
            .get(&chain_id)
            .copied()
            .ok_or(GatewayError::UnsupportedChain { chain_id })
    }
}

#[cfg(test)]
impl RouterTable {
    /// Table with a single entry, for tests
    pub fn single(chain_id: u64, router: Address) -> Self {
        let mut routers = HashMap::new();
        routers.insert(chain_id, router);
        Self { routers }
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_router_table_resolution() {
        let chains = vec![
            ChainConfig {
                chain_id: 42161,
                name: "arbitrum".to_string(),
                rpc_url: "https://rpc.example/42161".to_string(),
                router_address: "0x111111125421ca6dc452d289314280a0f8842a65".to_string(),
                enabled: true,
            },
            ChainConfig {
                chain_id: 10,
                name: "optimism".to_string(),
                rpc_url: "https://rpc.example/10".to_string(),
                router_address: "0x1111111254eeb25477b68fb85ed929f73a960582".to_string(),
                enabled: true,
            },
        ];

        let table = RouterTable::from_chains(chains.iter());

        let router = table.resolve(42161).unwrap();
        assert_eq!(
            format!("{:?}", router),
            "0x111111125421ca6dc452d289314280a0f8842a65"
        );

        match table.resolve(999) {
            Err(GatewayError::UnsupportedChain { chain_id }) => assert_eq!(chain_id, 999),
            other => panic!("expected UnsupportedChain, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_disabled_chains_excluded_from_router_table() {
        let chains = vec![ChainConfig {
            chain_id: 1,
            name: "mainnet".to_string(),
            rpc_url: "https://rpc.example/1".to_string(),
            router_address: "0x1111111254eeb25477b68fb85ed929f73a960582".to_string(),
            enabled: false,
        }];

        let table = RouterTable::from_chains(chains.iter().filter(|c| c.enabled));
        assert!(table.resolve(1).is_err());
    }
}
