//! ERC-20 allowance management for the swap router
//!
//! Reads the payer's current allowance and, only when it falls short,
//! approves exactly the required amount and confirms it on-chain. The
//! post-approval re-read guards against a router/token returning success
//! without the effective allowance changing; that case is fatal for the
//! attempt and is not retried.

use crate::error::{GatewayError, GatewayResult};
use crate::swap::wallet::ChainAccess;

use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info};

pub struct AllowanceManager {
    chain: Arc<dyn ChainAccess>,
}

impl AllowanceManager {
    pub fn new(chain: Arc<dyn ChainAccess>) -> Self {
        Self { chain }
    }

    /// Ensure `owner`'s allowance to `spender` covers `required`.
    ///
    /// Side-effect free when the current allowance is already sufficient.
    pub async fn ensure(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        required: U256,
    ) -> GatewayResult<()> {
        let current = self.chain.read_allowance(token, owner, spender).await?;
        debug!(%current, %required, ?token, ?spender, "Checked allowance");

        if current >= required {
            debug!("Sufficient allowance already set");
            return Ok(());
        }

        info!(?token, ?spender, "Approving router for the swap amount");
        let tx_hash = self.chain.send_approval(token, spender, required).await?;

        let receipt = self.chain.wait_for_receipt(tx_hash).await?;
        debug!(
            ?tx_hash,
            gas_used = ?receipt.gas_used,
            "Approval transaction confirmed"
        );

        let updated = self.chain.read_allowance(token, owner, spender).await?;
        if updated < required {
            return Err(GatewayError::AllowanceNotUpdated {
                current: updated.to_string(),
                required: required.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::wallet::MockChainAccess;
    use ethers::types::{TransactionReceipt, H256};
    use mockall::Sequence;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    #[tokio::test]
    async fn test_sufficient_allowance_is_side_effect_free() {
        let mut chain = MockChainAccess::new();
        chain
            .expect_read_allowance()
            .times(1)
            .returning(|_, _, _| Ok(U256::from(10_000_000u64)));
        // No expectation for send_approval: any approval call fails the test.

        let manager = AllowanceManager::new(Arc::new(chain));
        manager
            .ensure(addr(1), addr(2), addr(3), U256::from(5_000_000u64))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insufficient_allowance_approves_exact_amount() {
        let required = U256::from(5_000_000u64);
        let mut chain = MockChainAccess::new();
        let mut seq = Sequence::new();

        chain
            .expect_read_allowance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(U256::zero()));
        chain
            .expect_send_approval()
            .withf(move |_, _, amount| *amount == required)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(H256::zero()));
        chain
            .expect_wait_for_receipt()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TransactionReceipt::default()));
        chain
            .expect_read_allowance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _, _| Ok(required));

        let manager = AllowanceManager::new(Arc::new(chain));
        manager
            .ensure(addr(1), addr(2), addr(3), required)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stale_post_approval_allowance_is_fatal() {
        let required = U256::from(5_000_000u64);
        let mut chain = MockChainAccess::new();
        let mut seq = Sequence::new();

        chain
            .expect_read_allowance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(U256::from(100u64)));
        chain
            .expect_send_approval()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(H256::zero()));
        chain
            .expect_wait_for_receipt()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TransactionReceipt::default()));
        chain
            .expect_read_allowance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(U256::from(100u64)));

        let manager = AllowanceManager::new(Arc::new(chain));
        let err = manager
            .ensure(addr(1), addr(2), addr(3), required)
            .await
            .unwrap_err();

        match err {
            GatewayError::AllowanceNotUpdated { current, required } => {
                assert_eq!(current, "100");
                assert_eq!(required, "5000000");
            }
            other => panic!("expected AllowanceNotUpdated, got {}", other),
        }
    }
}
