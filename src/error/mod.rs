//! Error handling for the node
//!
//! One error type covers the ledger core, the transport and configuration.
//! Errors are serializable so a peer can return them over the wire.

use crate::core::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NoobcashError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoobcashError {
    /// Signature failed to verify or could not be produced
    InvalidSignature,
    /// Wallet cannot cover the requested amount
    InsufficientFunds { required: u64, available: u64 },
    /// Peer rejected a transaction (bad signature or cached balance too low)
    InvalidTransaction(String),
    /// Receiver id is not in the ring
    NoSuchPeer(NodeId),
    /// Receiver is this node
    SelfTransfer,
    /// Block failed hash, linkage, index or proof-of-work checks
    ChainAppendRejected(String),
    /// Peer call exhausted its retries
    NetworkUnreachable { peer: String, attempts: u32 },
    /// Any other transport failure
    Network(String),
    /// Request was fully sent but no response came back; it may have been
    /// processed, so it is never resent
    ResponseLost(String),
    /// Server is saturated, try again later
    Busy,
    /// Node has no ring id yet
    NotRegistered,
    /// Bootstrap ring already holds the expected number of nodes
    RingFull(usize),
    /// Only the bootstrap node accepts registrations
    NotBootstrap,
    /// Key generation or signing failure
    Crypto(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
}

impl NoobcashError {
    /// HTTP-like status code, used by the transport to classify failures.
    pub fn status(&self) -> u16 {
        match self {
            NoobcashError::InvalidSignature
            | NoobcashError::InvalidTransaction(_)
            | NoobcashError::SelfTransfer
            | NoobcashError::ChainAppendRejected(_)
            | NoobcashError::Serialization(_)
            | NoobcashError::Config(_) => 400,
            NoobcashError::InsufficientFunds { .. } => 402,
            NoobcashError::NoSuchPeer(_) => 404,
            NoobcashError::NotRegistered
            | NoobcashError::RingFull(_)
            | NoobcashError::NotBootstrap => 409,
            NoobcashError::Busy => 429,
            NoobcashError::NetworkUnreachable { .. } | NoobcashError::Network(_) => 503,
            NoobcashError::ResponseLost(_) => 504,
            NoobcashError::Crypto(_) | NoobcashError::Io(_) => 500,
        }
    }

    /// Whether a failed call may succeed if repeated (429 and 5xx), except
    /// when the request already reached the peer.
    pub fn is_retryable(&self) -> bool {
        if matches!(self, NoobcashError::ResponseLost(_)) {
            return false;
        }
        let status = self.status();
        status == 429 || status >= 500
    }
}

impl fmt::Display for NoobcashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoobcashError::InvalidSignature => write!(f, "Invalid signature"),
            NoobcashError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            NoobcashError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            NoobcashError::NoSuchPeer(id) => write!(f, "No peer with id {id}"),
            NoobcashError::SelfTransfer => write!(f, "Cannot send coins to yourself"),
            NoobcashError::ChainAppendRejected(msg) => write!(f, "Block rejected: {msg}"),
            NoobcashError::NetworkUnreachable { peer, attempts } => {
                write!(f, "Peer {peer} unreachable after {attempts} attempts")
            }
            NoobcashError::Network(msg) => write!(f, "Network error: {msg}"),
            NoobcashError::ResponseLost(msg) => {
                write!(f, "Request delivered but the response was lost: {msg}")
            }
            NoobcashError::Busy => write!(f, "Node is busy"),
            NoobcashError::NotRegistered => write!(f, "Node is not registered in the ring"),
            NoobcashError::RingFull(size) => write!(f, "Ring already has {size} nodes"),
            NoobcashError::NotBootstrap => write!(f, "Only the bootstrap node registers peers"),
            NoobcashError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            NoobcashError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            NoobcashError::Config(msg) => write!(f, "Configuration error: {msg}"),
            NoobcashError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for NoobcashError {}

impl From<std::io::Error> for NoobcashError {
    fn from(err: std::io::Error) -> Self {
        NoobcashError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for NoobcashError {
    fn from(err: serde_json::Error) -> Self {
        NoobcashError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for NoobcashError {
    fn from(err: toml::de::Error) -> Self {
        NoobcashError::Config(err.to_string())
    }
}
