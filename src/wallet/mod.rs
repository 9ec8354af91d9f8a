//! Wallet and key management
//!
//! A node owns exactly one wallet: a key pair whose public key is the node's
//! address, and the set of outputs the node can spend.

#[allow(clippy::module_inception)]
pub mod wallet;

pub use wallet::{KeyPair, Wallet};
