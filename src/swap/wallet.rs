//! Chain access and signing capabilities
//!
//! The orchestrator never talks to a wallet library directly. It sees two
//! narrow capabilities: `ChainAccess` for ERC-20 allowance reads/writes and
//! receipt waiting, and `WalletSigner` for typed-data signing and read-only
//! contract calls. `EthersWallet` implements both over a JSON-RPC provider
//! and a headless key; alternate backends can be substituted without touching
//! orchestration logic.

use crate::config::{ChainConfig, WalletConfig};
use crate::error::{GatewayError, GatewayResult};

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip712::TypedData;
use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256};
use std::time::Duration;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

/// erc20 allowance(address,address)
const ALLOWANCE_SELECTOR: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];
/// erc20 approve(address,uint256)
const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const RECEIPT_MAX_POLLS: u32 = 150;

/// Read/write access to the source chain for allowance management
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainAccess: Send + Sync {
    /// Current ERC-20 allowance from `owner` to `spender`
    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> GatewayResult<U256>;

    /// Submit an approval transaction for exactly `amount`
    async fn send_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> GatewayResult<H256>;

    /// Block until the transaction is mined
    async fn wait_for_receipt(&self, tx_hash: H256) -> GatewayResult<TransactionReceipt>;
}

/// Typed-data signing and read-only calls, supplied by the execution
/// environment (headless key here, a browser wallet elsewhere)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// EIP-712 signature over `typed_data` for `address`
    async fn sign_typed_data(
        &self,
        address: Address,
        typed_data: &serde_json::Value,
    ) -> GatewayResult<String>;

    /// Read-only contract call
    async fn call(&self, contract: Address, data: Bytes) -> GatewayResult<Bytes>;
}

/// Both capabilities over an ethers provider and a local key
pub struct EthersWallet {
    provider: Provider<Http>,
    wallet: LocalWallet,
    chain_id: u64,
}

impl EthersWallet {
    /// Build a wallet for a chain, loading the key from the environment
    /// variable named in the wallet configuration.
    pub fn from_config(chain: &ChainConfig, wallet_cfg: &WalletConfig) -> GatewayResult<Self> {
        let key = std::env::var(&wallet_cfg.private_key_env).map_err(|_| {
            GatewayError::Config(format!(
                "No wallet key configured. Set {}",
                wallet_cfg.private_key_env
            ))
        })?;

        let wallet = key
            .parse::<LocalWallet>()
            .map_err(|e| GatewayError::Signer(format!("Invalid private key: {}", e)))?
            .with_chain_id(chain.chain_id);

        let provider = Provider::<Http>::try_from(chain.rpc_url.as_str())
            .map_err(|e| GatewayError::Chain {
                chain_id: chain.chain_id,
                message: format!("Invalid RPC URL: {}", e),
            })?
            .interval(Duration::from_millis(100));

        info!(
            chain_id = chain.chain_id,
            address = ?wallet.address(),
            "Wallet initialized"
        );

        Ok(Self {
            provider,
            wallet,
            chain_id: chain.chain_id,
        })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    fn chain_error(&self, message: impl ToString) -> GatewayError {
        GatewayError::Chain {
            chain_id: self.chain_id,
            message: message.to_string(),
        }
    }
}

fn encode_address(addr: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_bytes());
    word
}

fn encode_u256(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

#[async_trait]
impl ChainAccess for EthersWallet {
    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> GatewayResult<U256> {
        let mut data = ALLOWANCE_SELECTOR.to_vec();
        data.extend_from_slice(&encode_address(owner));
        data.extend_from_slice(&encode_address(spender));

        let result = self.call(token, Bytes::from(data)).await?;
        if result.len() < 32 {
            return Err(self.chain_error("allowance call returned short data"));
        }
        Ok(U256::from_big_endian(&result[..32]))
    }

    async fn send_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> GatewayResult<H256> {
        let mut data = APPROVE_SELECTOR.to_vec();
        data.extend_from_slice(&encode_address(spender));
        data.extend_from_slice(&encode_u256(amount));

        let tx = TransactionRequest::new()
            .to(token)
            .from(self.wallet.address())
            .data(data);

        let client = SignerMiddleware::new(self.provider.clone(), self.wallet.clone());
        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(|e| self.chain_error(e))?;

        let tx_hash = *pending;
        debug!(?tx_hash, "Approval transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> GatewayResult<TransactionReceipt> {
        for _ in 0..RECEIPT_MAX_POLLS {
            match self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| self.chain_error(e))?
            {
                Some(receipt) => return Ok(receipt),
                None => tokio::time::sleep(RECEIPT_POLL_INTERVAL).await,
            }
        }

        Err(self.chain_error(format!("No receipt for {:?} after waiting", tx_hash)))
    }
}

#[async_trait]
impl WalletSigner for EthersWallet {
    async fn sign_typed_data(
        &self,
        address: Address,
        typed_data: &serde_json::Value,
    ) -> GatewayResult<String> {
        if address != self.wallet.address() {
            return Err(GatewayError::Signer(format!(
                "Signer holds {:?}, order is for {:?}",
                self.wallet.address(),
                address
            )));
        }

        let typed: TypedData = serde_json::from_value(typed_data.clone())
            .map_err(|e| GatewayError::Signer(format!("Malformed typed data: {}", e)))?;

        let signature = self
            .wallet
            .sign_typed_data(&typed)
            .await
            .map_err(|e| GatewayError::Signer(e.to_string()))?;

        Ok(format!("0x{}", signature))
    }

    async fn call(&self, contract: Address, data: Bytes) -> GatewayResult<Bytes> {
        let tx = TransactionRequest::new().to(contract).data(data);
        self.provider
            .call(&tx.into(), None)
            .await
            .map_err(|e| self.chain_error(e))
    }
}

/// Read-only chain access without a key: calls and allowance reads work,
/// anything that needs a signature fails. Used for quote-only requests.
pub struct ReadOnlyProvider {
    provider: Provider<Http>,
    chain_id: u64,
}

impl ReadOnlyProvider {
    pub fn from_config(chain: &ChainConfig) -> GatewayResult<Self> {
        let provider = Provider::<Http>::try_from(chain.rpc_url.as_str())
            .map_err(|e| GatewayError::Chain {
                chain_id: chain.chain_id,
                message: format!("Invalid RPC URL: {}", e),
            })?
            .interval(Duration::from_millis(100));

        Ok(Self {
            provider,
            chain_id: chain.chain_id,
        })
    }

    fn chain_error(&self, message: impl ToString) -> GatewayError {
        GatewayError::Chain {
            chain_id: self.chain_id,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl WalletSigner for ReadOnlyProvider {
    async fn sign_typed_data(
        &self,
        _address: Address,
        _typed_data: &serde_json::Value,
    ) -> GatewayResult<String> {
        Err(GatewayError::Signer(
            "Signing requires a configured wallet key".to_string(),
        ))
    }

    async fn call(&self, contract: Address, data: Bytes) -> GatewayResult<Bytes> {
        let tx = TransactionRequest::new().to(contract).data(data);
        self.provider
            .call(&tx.into(), None)
            .await
            .map_err(|e| self.chain_error(e))
    }
}

#[async_trait]
impl ChainAccess for ReadOnlyProvider {
    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> GatewayResult<U256> {
        let mut data = ALLOWANCE_SELECTOR.to_vec();
        data.extend_from_slice(&encode_address(owner));
        data.extend_from_slice(&encode_address(spender));

        let result = self.call(token, Bytes::from(data)).await?;
        if result.len() < 32 {
            return Err(self.chain_error("allowance call returned short data"));
        }
        Ok(U256::from_big_endian(&result[..32]))
    }

    async fn send_approval(
        &self,
        _token: Address,
        _spender: Address,
        _amount: U256,
    ) -> GatewayResult<H256> {
        Err(GatewayError::Signer(
            "Approvals require a configured wallet key".to_string(),
        ))
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> GatewayResult<TransactionReceipt> {
        for _ in 0..RECEIPT_MAX_POLLS {
            match self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| self.chain_error(e))?
            {
                Some(receipt) => return Ok(receipt),
                None => tokio::time::sleep(RECEIPT_POLL_INTERVAL).await,
            }
        }

        Err(self.chain_error(format!("No receipt for {:?} after waiting", tx_hash)))
    }
}
