//! # noobcash
//!
//! A small permissioned cryptocurrency. A fixed ring of nodes, founded by a
//! bootstrap node that mints `100 * N` coins, exchanges signed UTXO
//! transactions, mines them into proof-of-work blocks and settles forks by
//! adopting the longest valid chain.
//!
//! - `core/`: transactions, blocks, proof of work and the chain
//! - `wallet/`: key pair and owned outputs
//! - `storage/`: the cached ring ledger and the pending pool
//! - `node/`: the node state machine, mining thread and conflict resolution
//! - `network/`: wire messages, TCP and in-process transports, broadcast
//! - `config/`: settings file, environment and retry policy
//! - `cli/`: command-line parsing

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod node;
pub mod storage;
pub mod utils;
pub mod wallet;

pub use cli::{Command, Opt, ReplaySummary, ReplayTarget, StartOverrides};
pub use config::{NodeConfig, RetryPolicy, Settings};
pub use crate::core::{
    Block, CancelToken, Chain, NodeId, Transaction, TxInput, Utxo, COINS_PER_NODE,
};
pub use error::{NoobcashError, Result};
pub use network::{LoopbackNetwork, PeerClient, Request, Response, Server, TcpPeerClient};
pub use node::Node;
pub use storage::{PendingPool, Ring, RingEntry};
pub use wallet::{KeyPair, Wallet};
