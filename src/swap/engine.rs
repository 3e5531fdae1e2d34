//! Cross-chain swap orchestrator
//!
//! Runs one swap attempt through five stages in strict forward sequence:
//! quote, allowance, secret/hash-lock generation, order placement, and
//! settlement monitoring. No stage retries on error; the only repeated calls
//! are the fixed-interval readiness and status polls, both bounded. Each
//! attempt owns its quote, secrets, hash-lock, and order; nothing is shared
//! between concurrent attempts.

use crate::config::{RouterTable, SwapConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::swap::allowance::AllowanceManager;
use crate::swap::hashlock::{HashLock, SecretSet};
use crate::swap::protocol::FusionProtocol;
use crate::swap::tracker::SwapTracker;
use crate::swap::types::{
    OrderParams, OrderStatus, QuoteSummary, SwapOutcome, SwapRequest, SwapStage,
};
use crate::swap::wallet::ChainAccess;

use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct SwapEngine {
    protocol: Arc<dyn FusionProtocol>,
    chain: Arc<dyn ChainAccess>,
    routers: RouterTable,
    config: SwapConfig,
    /// Source tag attached to placed orders
    source: String,
    tracker: Arc<SwapTracker>,
}

impl SwapEngine {
    pub fn new(
        protocol: Arc<dyn FusionProtocol>,
        chain: Arc<dyn ChainAccess>,
        routers: RouterTable,
        config: SwapConfig,
        source: String,
        tracker: Arc<SwapTracker>,
    ) -> Self {
        Self {
            protocol,
            chain,
            routers,
            config,
            source,
            tracker,
        }
    }

    /// Quote-only mode: resolve the route and fetch a quote, no side effects
    pub async fn quote(&self, request: &SwapRequest) -> GatewayResult<QuoteSummary> {
        self.routers.resolve(request.src_chain_id)?;

        let quote = self.protocol.get_quote(request).await?;
        let preset = quote.recommended()?;

        Ok(QuoteSummary {
            recommended_preset: quote.recommended_preset,
            secrets_count: preset.secrets_count,
            src_chain_id: request.src_chain_id,
            dst_chain_id: request.dst_chain_id,
            amount: request.amount.to_string(),
        })
    }

    /// Execute mode: run the full flow to a terminal order status
    pub async fn execute(&self, request: &SwapRequest) -> GatewayResult<SwapOutcome> {
        let attempt = self.tracker.begin(request);
        let started = Instant::now();
        crate::metrics::record_swap_started(request.src_chain_id);

        let result = self.run(request, attempt).await;

        match &result {
            Ok(outcome) => {
                self.tracker.complete(attempt);
                crate::metrics::record_swap_completed(outcome.status);
                crate::metrics::record_swap_duration(started.elapsed().as_secs_f64());
                info!(
                    order_hash = %outcome.order_hash,
                    status = %outcome.status,
                    "Swap attempt finished"
                );
            }
            Err(e) => {
                self.tracker.fail(attempt, &e.to_string());
                let stage = e.failed_stage().unwrap_or("internal");
                crate::metrics::record_swap_failed(stage);
                warn!(stage, error = %e, "Swap attempt failed");
                if e.needs_reconciliation() {
                    // The approval and order are already on-chain; nothing is
                    // rolled back. The caller must check the order status
                    // out-of-band.
                    warn!("Attempt left on-chain state behind; reconcile manually");
                }
            }
        }

        result
    }

    async fn run(&self, request: &SwapRequest, attempt: Uuid) -> GatewayResult<SwapOutcome> {
        // Router resolution is a pure table lookup and fails fast on unknown
        // chains before any network call is made.
        let router = self.routers.resolve(request.src_chain_id)?;

        self.tracker.set_stage(attempt, SwapStage::Quote);
        let quote = self.protocol.get_quote(request).await?;
        info!(preset = %quote.recommended_preset, "Quote received");

        self.tracker.set_stage(attempt, SwapStage::Allowance);
        AllowanceManager::new(self.chain.clone())
            .ensure(request.src_token, request.payer, router, request.amount)
            .await?;

        self.tracker.set_stage(attempt, SwapStage::Secrets);
        let secrets_count = quote.recommended()?.secrets_count;
        let secrets = SecretSet::generate(secrets_count)?;
        let hash_lock = HashLock::from_secrets(&secrets);
        debug!(
            secrets_count,
            multi_fill = hash_lock.is_multi_fill(),
            "Hash-lock generated"
        );

        self.tracker.set_stage(attempt, SwapStage::PlacingOrder);
        let params = OrderParams {
            payer: request.payer,
            receiver: request.receiver,
            preset: quote.recommended_preset,
            source: self.source.clone(),
            hash_lock: hash_lock.value(),
            secret_hashes: secrets.hashes().to_vec(),
        };
        let order = self.protocol.place_order(&quote, &params).await?;
        self.tracker.set_order_hash(attempt, &order.order_hash);
        info!(order_hash = %order.order_hash, "Order placed");

        let status = self.settle(&order.order_hash, &secrets, attempt).await?;

        Ok(SwapOutcome {
            order_hash: order.order_hash,
            status,
            order: order.payload,
        })
    }

    /// Settlement monitor: AwaitingEscrow -> RevealingSecrets ->
    /// AwaitingTerminal -> terminal status. Transitions are one-directional.
    async fn settle(
        &self,
        order_hash: &str,
        secrets: &SecretSet,
        attempt: Uuid,
    ) -> GatewayResult<OrderStatus> {
        self.tracker.set_stage(attempt, SwapStage::AwaitingEscrow);
        let mut polls = 0u32;
        loop {
            let ready = self.protocol.ready_fills(order_hash).await?;
            if !ready.fills.is_empty() {
                debug!(fills = ready.fills.len(), "Escrows ready");
                break;
            }

            polls += 1;
            if polls >= self.config.max_escrow_attempts {
                return Err(GatewayError::EscrowTimeout { attempts: polls });
            }
            debug!(polls, "Waiting for escrows and finality");
            sleep(self.config.poll_interval()).await;
        }

        // Secrets are revealed only after readiness has been observed, and
        // every secret must be submitted before status polling starts; a
        // partial reveal leaves escrows only partially unlockable.
        self.tracker.set_stage(attempt, SwapStage::RevealingSecrets);
        for idx in 0..secrets.len() {
            if self.config.verbose_secrets {
                warn!(idx, secret = %secrets.secret_hex(idx), "Submitting secret");
            } else {
                debug!(idx, "Submitting secret");
            }

            self.protocol
                .submit_secret(order_hash, &secrets.secret_hex(idx))
                .await
                .map_err(|e| match e {
                    GatewayError::SecretSubmissionFailed(_) => e,
                    other => GatewayError::SecretSubmissionFailed(other.to_string()),
                })?;
        }

        self.tracker.set_stage(attempt, SwapStage::AwaitingTerminal);
        let mut polls = 0u32;
        loop {
            let status = self.protocol.order_status(order_hash).await?;
            debug!(%status, "Order status");
            if status.is_terminal() {
                return Ok(status);
            }

            polls += 1;
            if polls >= self.config.max_status_attempts {
                return Err(GatewayError::StatusTimeout { attempts: polls });
            }
            sleep(self.config.poll_interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::protocol::MockFusionProtocol;
    use crate::swap::types::{PresetName, PlacedOrder, Quote, QuotePreset, ReadyFill, ReadyFills};
    use crate::swap::wallet::MockChainAccess;
    use ethers::types::{Address, TransactionReceipt, H256, U256};
    use mockall::Sequence;
    use std::collections::HashMap;

    const SRC_CHAIN: u64 = 42161;
    const DST_CHAIN: u64 = 10;

    fn router() -> Address {
        "0x111111125421ca6dc452d289314280a0f8842a65".parse().unwrap()
    }

    fn request() -> SwapRequest {
        SwapRequest {
            src_chain_id: SRC_CHAIN,
            dst_chain_id: DST_CHAIN,
            src_token: Address::from([0xaa; 20]),
            dst_token: Address::from([0xbb; 20]),
            amount: U256::from(5_000_000u64),
            payer: Address::from([0x01; 20]),
            receiver: Address::from([0x02; 20]),
        }
    }

    fn quote_with_secrets(count: usize) -> Quote {
        let mut presets = HashMap::new();
        presets.insert(PresetName::Fast, QuotePreset { secrets_count: count });
        Quote {
            quote_id: Some("q-1".to_string()),
            recommended_preset: PresetName::Fast,
            presets,
            raw: serde_json::Value::Null,
        }
    }

    fn test_config() -> SwapConfig {
        SwapConfig {
            poll_interval_ms: 1,
            max_escrow_attempts: 60,
            max_status_attempts: 120,
            verbose_secrets: false,
        }
    }

    fn engine(protocol: MockFusionProtocol, chain: MockChainAccess, config: SwapConfig) -> SwapEngine {
        SwapEngine::new(
            Arc::new(protocol),
            Arc::new(chain),
            RouterTable::single(SRC_CHAIN, router()),
            config,
            "emojipay-app".to_string(),
            Arc::new(SwapTracker::new()),
        )
    }

    fn chain_with_sufficient_allowance() -> MockChainAccess {
        let mut chain = MockChainAccess::new();
        chain
            .expect_read_allowance()
            .returning(|_, _, _| Ok(U256::MAX));
        chain
    }

    fn ready() -> ReadyFills {
        ReadyFills {
            fills: vec![ReadyFill { idx: 0 }],
        }
    }

    #[tokio::test]
    async fn test_single_fill_swap_executes() {
        // Scenario: one secret, escrow ready and terminal status each on the
        // second poll.
        let mut protocol = MockFusionProtocol::new();
        let mut seq = Sequence::new();

        protocol
            .expect_get_quote()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(quote_with_secrets(1)));
        protocol
            .expect_place_order()
            .withf(|_, params| {
                // Single-fill: the lock is the one secret's own hash.
                params.secret_hashes.len() == 1 && params.hash_lock == params.secret_hashes[0]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(PlacedOrder {
                    order_hash: "0xorder".to_string(),
                    payload: serde_json::json!({"maker": "0x01"}),
                })
            });
        protocol
            .expect_ready_fills()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ReadyFills::default()));
        protocol
            .expect_ready_fills()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ready()));
        protocol
            .expect_submit_secret()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        protocol
            .expect_order_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(OrderStatus::Pending));
        protocol
            .expect_order_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(OrderStatus::Executed));

        let engine = engine(protocol, chain_with_sufficient_allowance(), test_config());
        let outcome = engine.execute(&request()).await.unwrap();

        assert_eq!(outcome.order_hash, "0xorder");
        assert_eq!(outcome.status, OrderStatus::Executed);
    }

    #[tokio::test]
    async fn test_multi_fill_swap_reveals_all_secrets_first() {
        // Scenario: three secrets -> multi-fill lock, three sequential
        // reveals before any status poll.
        let mut protocol = MockFusionProtocol::new();
        let mut seq = Sequence::new();

        protocol
            .expect_get_quote()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(quote_with_secrets(3)));
        protocol
            .expect_place_order()
            .withf(|_, params| {
                let parts = u16::from_be_bytes([params.hash_lock[0], params.hash_lock[1]]);
                params.secret_hashes.len() == 3
                    && params.hash_lock != params.secret_hashes[0]
                    && parts == 2
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(PlacedOrder {
                    order_hash: "0xorder".to_string(),
                    payload: serde_json::Value::Null,
                })
            });
        protocol
            .expect_ready_fills()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ready()));
        protocol
            .expect_submit_secret()
            .times(3)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        protocol
            .expect_order_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(OrderStatus::Executed));

        let engine = engine(protocol, chain_with_sufficient_allowance(), test_config());
        let outcome = engine.execute(&request()).await.unwrap();
        assert_eq!(outcome.status, OrderStatus::Executed);
    }

    #[tokio::test]
    async fn test_stale_allowance_aborts_before_order_placement() {
        // Scenario: allowance stays below the requirement even after a
        // confirmed approval. No order placement call may happen.
        let required = U256::from(5_000_000u64);
        let mut protocol = MockFusionProtocol::new();
        protocol
            .expect_get_quote()
            .times(1)
            .returning(|_| Ok(quote_with_secrets(1)));

        let mut chain = MockChainAccess::new();
        let mut seq = Sequence::new();
        chain
            .expect_read_allowance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(U256::from(100u64)));
        chain
            .expect_send_approval()
            .withf(move |_, spender, amount| *spender == router() && *amount == required)
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

        let engine = engine(protocol, chain, test_config());
        let err = engine.execute(&request()).await.unwrap_err();

        assert!(matches!(err, GatewayError::AllowanceNotUpdated { .. }));
        assert_eq!(err.failed_stage(), Some("allowance"));
    }

    #[tokio::test]
    async fn test_unknown_chain_fails_before_any_network_call() {
        // Scenario: chain id missing from the router table. The mocks carry
        // no expectations, so any call would panic.
        let engine = engine(MockFusionProtocol::new(), MockChainAccess::new(), test_config());

        let mut req = request();
        req.src_chain_id = 123456;

        let err = engine.execute(&req).await.unwrap_err();
        match err {
            GatewayError::UnsupportedChain { chain_id } => assert_eq!(chain_id, 123456),
            other => panic!("expected UnsupportedChain, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_escrow_polling_is_bounded() {
        let mut protocol = MockFusionProtocol::new();
        protocol
            .expect_get_quote()
            .returning(|_| Ok(quote_with_secrets(1)));
        protocol.expect_place_order().returning(|_, _| {
            Ok(PlacedOrder {
                order_hash: "0xorder".to_string(),
                payload: serde_json::Value::Null,
            })
        });
        protocol
            .expect_ready_fills()
            .times(3)
            .returning(|_| Ok(ReadyFills::default()));
        // submit_secret has no expectation: revealing before readiness panics.

        let config = SwapConfig {
            max_escrow_attempts: 3,
            ..test_config()
        };
        let engine = engine(protocol, chain_with_sufficient_allowance(), config);

        let err = engine.execute(&request()).await.unwrap_err();
        match err {
            GatewayError::EscrowTimeout { attempts } => assert_eq!(attempts, 3),
            other => panic!("expected EscrowTimeout, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_status_polling_is_bounded() {
        let mut protocol = MockFusionProtocol::new();
        protocol
            .expect_get_quote()
            .returning(|_| Ok(quote_with_secrets(1)));
        protocol.expect_place_order().returning(|_, _| {
            Ok(PlacedOrder {
                order_hash: "0xorder".to_string(),
                payload: serde_json::Value::Null,
            })
        });
        protocol.expect_ready_fills().returning(|_| Ok(ready()));
        protocol.expect_submit_secret().returning(|_, _| Ok(()));
        protocol
            .expect_order_status()
            .times(2)
            .returning(|_| Ok(OrderStatus::Pending));

        let config = SwapConfig {
            max_status_attempts: 2,
            ..test_config()
        };
        let engine = engine(protocol, chain_with_sufficient_allowance(), config);

        let err = engine.execute(&request()).await.unwrap_err();
        match err {
            GatewayError::StatusTimeout { attempts } => assert_eq!(attempts, 2),
            other => panic!("expected StatusTimeout, got {}", other),
        }
        assert!(err.needs_reconciliation());
    }

    #[tokio::test]
    async fn test_secret_submission_failure_is_fatal() {
        let mut protocol = MockFusionProtocol::new();
        protocol
            .expect_get_quote()
            .returning(|_| Ok(quote_with_secrets(2)));
        protocol.expect_place_order().returning(|_, _| {
            Ok(PlacedOrder {
                order_hash: "0xorder".to_string(),
                payload: serde_json::Value::Null,
            })
        });
        protocol.expect_ready_fills().returning(|_| Ok(ready()));
        protocol
            .expect_submit_secret()
            .times(1)
            .returning(|_, _| Err(GatewayError::SecretSubmissionFailed("relayer 500".into())));
        // order_status has no expectation: polling after a failed reveal panics.

        let engine = engine(protocol, chain_with_sufficient_allowance(), test_config());
        let err = engine.execute(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::SecretSubmissionFailed(_)));
        assert_eq!(err.failed_stage(), Some("revealing_secrets"));
    }

    #[tokio::test]
    async fn test_quote_only_mode_has_no_side_effects() {
        let mut protocol = MockFusionProtocol::new();
        protocol
            .expect_get_quote()
            .times(1)
            .returning(|_| Ok(quote_with_secrets(1)));

        // Chain mock carries no expectations: any allowance touch panics.
        let engine = engine(protocol, MockChainAccess::new(), test_config());
        let summary = engine.quote(&request()).await.unwrap();

        assert_eq!(summary.recommended_preset, PresetName::Fast);
        assert_eq!(summary.secrets_count, 1);
        assert_eq!(summary.amount, "5000000");
    }

    #[tokio::test]
    async fn test_quote_only_mode_rejects_unknown_chain() {
        let engine = engine(MockFusionProtocol::new(), MockChainAccess::new(), test_config());
        let mut req = request();
        req.src_chain_id = 7;
        assert!(matches!(
            engine.quote(&req).await.unwrap_err(),
            GatewayError::UnsupportedChain { chain_id: 7 }
        ));
    }
}
