// The node owns all ledger state and is the only thing that mutates it.
//
// Locking: `chain_state` (chain + pending pool) is always taken before
// `ledger` (wallet + ring). Neither lock is held across a network call.

use crate::config::NodeConfig;
use crate::core::{Block, CancelToken, Chain, NodeId, Transaction, COINS_PER_NODE};
use crate::error::{NoobcashError, Result};
use crate::network::{self, PeerClient, Request};
use crate::storage::{PendingPool, Ring, RingEntry};
use crate::wallet::Wallet;
use log::info;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;

pub(crate) struct ChainState {
    pub(crate) chain: Chain,
    pub(crate) pending: PendingPool,
}

pub(crate) struct LedgerState {
    pub(crate) wallet: Wallet,
    pub(crate) ring: Ring,
}

pub struct Node {
    pub(crate) config: NodeConfig,
    ip: String,
    port: u16,
    pub(crate) public_key: String,
    id: RwLock<Option<NodeId>>,
    pub(crate) chain_state: Mutex<ChainState>,
    pub(crate) ledger: Mutex<LedgerState>,
    pub(crate) cancel: CancelToken,
    pub(crate) peers: Arc<dyn PeerClient>,
    pub(crate) miner: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Node {
    fn with_state(
        config: NodeConfig,
        ip: &str,
        port: u16,
        peers: Arc<dyn PeerClient>,
        chain: Chain,
        ledger: LedgerState,
        id: Option<NodeId>,
    ) -> Result<Arc<Node>> {
        config.validate()?;
        Ok(Arc::new(Node {
            config,
            ip: ip.to_string(),
            port,
            public_key: ledger.wallet.public_key().to_string(),
            id: RwLock::new(id),
            chain_state: Mutex::new(ChainState {
                chain,
                pending: PendingPool::new(),
            }),
            ledger: Mutex::new(ledger),
            cancel: CancelToken::new(),
            peers,
            miner: Mutex::new(None),
        }))
    }

    /// The bootstrap node: id 0, owner of the genesis block that mints
    /// `100 * nodes` coins to its own wallet.
    pub fn bootstrap(
        config: NodeConfig,
        ip: &str,
        port: u16,
        peers: Arc<dyn PeerClient>,
    ) -> Result<Arc<Node>> {
        let mut wallet = Wallet::new()?;
        let minted = COINS_PER_NODE * config.nodes as u64;
        let genesis_tx = Transaction::genesis(wallet.public_key(), minted)?;
        if let Some(payment) = genesis_tx.payment() {
            wallet.receive(payment.clone());
        }
        let chain = Chain::new(Block::genesis(genesis_tx)?);

        let mut entry = RingEntry::new(0, ip, port, wallet.public_key());
        entry.balance = wallet.balance();
        entry.utxos = wallet.utxos().to_vec();
        let mut ring = Ring::new();
        ring.add(entry);

        info!("Bootstrap node created genesis block minting {minted} coins");
        Self::with_state(
            config,
            ip,
            port,
            peers,
            chain,
            LedgerState { wallet, ring },
            Some(0),
        )
    }

    /// A node that still has to register with the bootstrap node and
    /// receive its snapshot.
    pub fn new(
        config: NodeConfig,
        ip: &str,
        port: u16,
        peers: Arc<dyn PeerClient>,
    ) -> Result<Arc<Node>> {
        Self::with_state(
            config,
            ip,
            port,
            peers,
            Chain::from_blocks(Vec::new()),
            LedgerState {
                wallet: Wallet::new()?,
                ring: Ring::new(),
            },
            None,
        )
    }

    pub fn id(&self) -> Option<NodeId> {
        *self.id.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_id(&self, id: NodeId) {
        let mut current = self.id.write().unwrap_or_else(PoisonError::into_inner);
        if *current != Some(id) {
            info!("Assigned ring id {id}");
            *current = Some(id);
        }
    }

    pub(crate) fn require_id(&self) -> Result<NodeId> {
        self.id().ok_or(NoobcashError::NotRegistered)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn public_key(&self) -> &str {
        self.public_key.as_str()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn ip(&self) -> &str {
        self.ip.as_str()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Ring entries of every other node, i.e. broadcast targets.
    pub(crate) fn peer_entries(&self, ring: &Ring) -> Vec<RingEntry> {
        match self.id() {
            Some(id) => ring.peers_of(id),
            None => ring
                .entries()
                .iter()
                .filter(|entry| entry.public_key != self.public_key)
                .cloned()
                .collect(),
        }
    }

    /// Fire-and-forget broadcast to `targets`.
    pub(crate) fn broadcast(&self, request: Request, targets: Vec<RingEntry>) {
        network::spawn_fan_out(Arc::clone(&self.peers), request, targets);
    }

    /// Register with the bootstrap node at `bootstrap_address`.
    pub fn join(&self, bootstrap_address: &str) -> Result<NodeId> {
        let request = Request::RegisterNode {
            public_key: self.public_key.clone(),
            ip: self.ip.clone(),
            port: self.port,
        };
        match self.peers.send(bootstrap_address, &request)? {
            network::Response::NodeId { id } => {
                self.set_id(id);
                Ok(id)
            }
            other => Err(network::unexpected(request.name(), &other)),
        }
    }

    pub fn view_last_block_transactions(&self) -> Vec<Transaction> {
        lock(&self.chain_state).chain.last_transactions()
    }

    /// Wallet balance plus the ring as this node sees it.
    pub fn get_balance(&self) -> (u64, Ring) {
        let ledger = lock(&self.ledger);
        (ledger.wallet.balance(), ledger.ring.clone())
    }

    pub fn send_chain_and_id(&self) -> Result<(Chain, NodeId)> {
        let id = self.require_id()?;
        Ok((lock(&self.chain_state).chain.clone(), id))
    }

    /// Ring snapshot and every unconfirmed transaction, including the batch
    /// being mined.
    pub fn send_ring_and_pending_transactions(&self) -> (Ring, Vec<Transaction>) {
        let chain_state = lock(&self.chain_state);
        let ledger = lock(&self.ledger);
        (ledger.ring.clone(), chain_state.pending.snapshot())
    }

    pub fn chain(&self) -> Chain {
        lock(&self.chain_state).chain.clone()
    }

    pub fn ring(&self) -> Ring {
        lock(&self.ledger).ring.clone()
    }

    pub fn wallet(&self) -> Wallet {
        lock(&self.ledger).wallet.clone()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        lock(&self.chain_state).pending.snapshot()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.cancel.stop();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::network::Response;

    /// A transport where every peer is down.
    pub(crate) struct Offline;

    impl PeerClient for Offline {
        fn send(&self, address: &str, _request: &Request) -> Result<Response> {
            Err(NoobcashError::NetworkUnreachable {
                peer: address.to_string(),
                attempts: 1,
            })
        }
    }

    pub(crate) fn offline_node(difficulty: usize, capacity: usize, nodes: usize) -> Arc<Node> {
        let config = NodeConfig::new(difficulty, capacity, nodes).unwrap();
        Node::bootstrap(config, "127.0.0.1", 5000, Arc::new(Offline)).unwrap()
    }

    pub(crate) fn offline_bootstrap(nodes: usize) -> Arc<Node> {
        offline_node(1, 1, nodes)
    }

    /// Register `count` fresh wallets with `node` and return them in id order.
    pub(crate) fn with_peers(node: &Arc<Node>, count: usize) -> Vec<Wallet> {
        (1..=count)
            .map(|id| {
                let peer = Wallet::new().unwrap();
                let port = 6000 + id as u16;
                assert_eq!(node.register_node(peer.public_key(), "10.0.0.1", port), Ok(id));
                peer
            })
            .collect()
    }

    #[test]
    fn test_bootstrap_owns_genesis_mint() {
        let node = offline_bootstrap(3);
        assert_eq!(node.id(), Some(0));
        assert_eq!(node.chain().len(), 1);
        assert_eq!(node.wallet().balance(), 300);
        assert_eq!(node.ring().total_balance(), 300);
        assert_eq!(node.address(), "127.0.0.1:5000");

        let genesis = node.view_last_block_transactions();
        assert_eq!(genesis.len(), 1);
        assert!(genesis[0].is_genesis());
    }

    #[test]
    fn test_joining_node_starts_empty() {
        let config = NodeConfig::new(1, 1, 2).unwrap();
        let node = Node::new(config, "127.0.0.1", 5001, Arc::new(Offline)).unwrap();
        assert_eq!(node.id(), None);
        assert!(node.chain().is_empty());
        assert!(node.ring().is_empty());
        assert_eq!(node.send_chain_and_id(), Err(NoobcashError::NotRegistered));
        assert_eq!(
            node.create_transaction(0, 10).unwrap_err(),
            NoobcashError::NotRegistered
        );
    }

    #[test]
    fn test_join_fails_when_bootstrap_unreachable() {
        let config = NodeConfig::new(1, 1, 2).unwrap();
        let node = Node::new(config, "127.0.0.1", 5002, Arc::new(Offline)).unwrap();
        assert!(matches!(
            node.join("127.0.0.1:5000"),
            Err(NoobcashError::NetworkUnreachable { .. })
        ));
        assert_eq!(node.id(), None);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = NodeConfig {
            difficulty: 1,
            capacity: 0,
            nodes: 2,
        };
        assert!(Node::bootstrap(config, "127.0.0.1", 5000, Arc::new(Offline)).is_err());
    }
}
