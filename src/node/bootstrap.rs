// Ring formation: registration on the bootstrap node, snapshot distribution
// and initial funding once every expected node has joined.

use super::node::{lock, Node};
use crate::core::{Chain, NodeId, COINS_PER_NODE};
use crate::error::{NoobcashError, Result};
use crate::network::{self, Request};
use crate::storage::{Ring, RingEntry};
use log::{error, info, warn};
use std::sync::Arc;
use std::thread;

impl Node {
    /// Add a joining node to the ring and return its id.
    ///
    /// Registering the same key twice returns the id it already has. The
    /// registration that completes the ring starts distribution in the
    /// background.
    pub fn register_node(
        self: &Arc<Self>,
        public_key: &str,
        ip: &str,
        port: u16,
    ) -> Result<NodeId> {
        if self.id() != Some(0) {
            return Err(NoobcashError::NotBootstrap);
        }

        let (id, complete) = {
            let mut ledger = lock(&self.ledger);
            if let Some(entry) = ledger.ring.find_by_key(public_key) {
                return Ok(entry.id);
            }
            if ledger.ring.len() >= self.config.nodes {
                return Err(NoobcashError::RingFull(ledger.ring.len()));
            }
            let id = ledger.ring.next_id();
            ledger.ring.add(RingEntry::new(id, ip, port, public_key));
            (id, ledger.ring.len() == self.config.nodes)
        };
        info!("Registered node {id} at {ip}:{port}");

        if complete {
            let node = Arc::clone(self);
            thread::spawn(move || node.distribute());
        }
        Ok(id)
    }

    // Send every peer the ring and chain, then fund each with COINS_PER_NODE.
    fn distribute(&self) {
        let (ring, chain) = {
            let chain_state = lock(&self.chain_state);
            let ledger = lock(&self.ledger);
            (ledger.ring.clone(), chain_state.chain.clone())
        };
        let peers = ring.peers_of(0);
        info!("Ring complete with {} nodes, distributing snapshot", ring.len());

        let request = Request::ReceiveRingAndChain { ring, chain };
        for (id, result) in network::fan_out(self.peers.as_ref(), &request, &peers) {
            if let Err(e) = result {
                warn!("Node {id} did not accept the ring snapshot: {e}");
            }
        }

        for peer in &peers {
            if let Err(e) = self.create_transaction(peer.id, COINS_PER_NODE) {
                error!("Funding node {} failed: {e}", peer.id);
            }
        }
    }

    /// Adopt the snapshot sent by the bootstrap node.
    pub fn receive_ring_and_chain(&self, ring: Ring, chain: Chain) -> Result<()> {
        if !chain.validate(self.config.difficulty) {
            return Err(NoobcashError::ChainAppendRejected(
                "bootstrap chain failed validation".to_string(),
            ));
        }
        if ring.find_by_key(&self.public_key).is_none() {
            return Err(NoobcashError::NotRegistered);
        }

        let mut chain_state = lock(&self.chain_state);
        let mut ledger = lock(&self.ledger);
        chain_state.chain = chain;
        let ledger = &mut *ledger;
        ledger.ring = ring;
        self.resync_wallet(&mut ledger.wallet, &ledger.ring);
        info!(
            "Received ring of {} nodes and chain of {} blocks",
            ledger.ring.len(),
            chain_state.chain.len()
        );
        Ok(())
    }
}
