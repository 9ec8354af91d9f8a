//! Core ledger types
//!
//! Transactions and their outputs, blocks, the proof-of-work search and the
//! append-only chain.

pub mod block;
pub mod chain;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, GENESIS_PREVIOUS_HASH};
pub use chain::Chain;
pub use proof_of_work::{CancelToken, PauseGuard, ProofOfWork};
pub use transaction::{Transaction, TxInput, Utxo, GENESIS_SENDER};

/// Position of a node in the ring. The bootstrap node is always 0.
pub type NodeId = usize;

/// Coins each node receives from the bootstrap node, and the per-node share
/// of the genesis mint.
pub const COINS_PER_NODE: u64 = 100;
