//! In-memory ledger state owned by a node
//!
//! The pending transaction pool and the ring, the node's observed view of
//! every peer's balance and outputs.

pub mod memory_pool;
pub mod ring;

pub use memory_pool::PendingPool;
pub use ring::{Ring, RingEntry};
