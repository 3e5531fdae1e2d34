//! Cross-chain swap orchestration
//!
//! The flow per attempt: quote, allowance, secrets/hash-lock, order
//! placement, settlement monitoring. `engine` drives the sequence; the
//! other modules supply the stages and the capabilities they run against.

pub mod allowance;
pub mod engine;
pub mod hashlock;
pub mod protocol;
pub mod tracker;
pub mod types;
pub mod wallet;

pub use engine::SwapEngine;
pub use protocol::{FusionProtocol, HttpFusionClient};
pub use tracker::SwapTracker;
pub use types::{OrderStatus, SwapOutcome, SwapRequest};
pub use wallet::{ChainAccess, EthersWallet, ReadOnlyProvider, WalletSigner};
