use crate::core::{Block, Chain, NodeId, Transaction};
use crate::error::{NoobcashError, Result};
use crate::storage::Ring;
use serde::{Deserialize, Serialize};

/// Every operation a node exposes, to peers and to the local client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    RegisterNode {
        public_key: String,
        ip: String,
        port: u16,
    },
    ReceiveRingAndChain {
        ring: Ring,
        chain: Chain,
    },
    RegisterTransaction {
        transaction: Transaction,
    },
    RegisterBlock {
        block: Block,
    },
    SendChainAndId,
    SendRingAndPendingTransactions,
    CreateNewTransaction {
        receiver_id: NodeId,
        amount: u64,
    },
    ViewLastBlockTransactions,
    GetBalance,
}

impl Request {
    /// Short name for logging; payloads can be whole chains.
    pub fn name(&self) -> &'static str {
        match self {
            Request::RegisterNode { .. } => "register_node",
            Request::ReceiveRingAndChain { .. } => "receive_ring_and_chain",
            Request::RegisterTransaction { .. } => "register_transaction",
            Request::RegisterBlock { .. } => "register_block",
            Request::SendChainAndId => "send_chain_and_id",
            Request::SendRingAndPendingTransactions => "send_ring_and_pending_transactions",
            Request::CreateNewTransaction { .. } => "create_new_transaction",
            Request::ViewLastBlockTransactions => "view_last_block_transactions",
            Request::GetBalance => "get_balance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Ok,
    NodeId {
        id: NodeId,
    },
    ChainAndId {
        chain: Chain,
        id: NodeId,
    },
    RingAndPending {
        ring: Ring,
        pending: Vec<Transaction>,
    },
    Transactions {
        transactions: Vec<Transaction>,
    },
    Balance {
        balance: u64,
        ring: Ring,
    },
    Failure {
        error: NoobcashError,
    },
}

impl Response {
    /// Turn a `Failure` into an `Err`.
    pub fn into_result(self) -> Result<Response> {
        match self {
            Response::Failure { error } => Err(error),
            other => Ok(other),
        }
    }
}

impl From<Result<Response>> for Response {
    fn from(result: Result<Response>) -> Self {
        result.unwrap_or_else(|error| Response::Failure { error })
    }
}

/// Error for a response of the wrong shape.
pub fn unexpected(request: &str, response: &Response) -> NoobcashError {
    NoobcashError::Network(format!("Unexpected response to {request}: {response:?}"))
}
