//! The node state machine
//!
//! A `Node` owns the wallet, the chain, the cached ring and the pending pool,
//! runs the mining thread and answers peer and client requests.

mod admission;
mod bootstrap;
mod consensus;
mod miner;
#[allow(clippy::module_inception)]
mod node;

pub use admission::validate_transaction;
pub use node::Node;
