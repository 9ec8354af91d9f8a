// Longest-chain conflict resolution.

use super::node::{lock, Node};
use crate::core::{Chain, NodeId, Transaction};
use crate::error::Result;
use crate::network::{self, Request, Response};
use crate::storage::{Ring, RingEntry};
use crate::wallet::Wallet;
use log::{debug, info, warn};

impl Node {
    /// Adopt the longest valid chain in the ring, if it is strictly longer
    /// than ours. Returns whether anything was replaced.
    ///
    /// No lock is held while peers are queried.
    pub fn resolve_conflicts(&self) -> Result<bool> {
        let (local_len, targets) = {
            let chain_state = lock(&self.chain_state);
            let ledger = lock(&self.ledger);
            (chain_state.chain.len(), self.peer_entries(&ledger.ring))
        };
        if targets.is_empty() {
            return Ok(false);
        }

        let (chain, owner) = match self.longest_peer_chain(&targets) {
            Some(best) if best.0.len() > local_len => best,
            _ => {
                debug!("No peer chain longer than {local_len} blocks");
                return Ok(false);
            }
        };

        let (ring, pending) = self.fetch_ring_and_pending(&owner)?;
        Ok(self.adopt(chain, ring, pending))
    }

    // Ties keep the first candidate in ring order.
    fn longest_peer_chain(&self, targets: &[RingEntry]) -> Option<(Chain, RingEntry)> {
        let difficulty = self.config.difficulty;
        let mut best: Option<(Chain, RingEntry)> = None;
        for (id, result) in network::fan_out(self.peers.as_ref(), &Request::SendChainAndId, targets)
        {
            let chain = match result {
                Ok(Response::ChainAndId { chain, .. }) => chain,
                Ok(other) => {
                    warn!("Node {id} answered chain request with {other:?}");
                    continue;
                }
                Err(e) => {
                    warn!("Could not fetch chain from node {id}: {e}");
                    continue;
                }
            };
            if !chain.validate(difficulty) {
                warn!("Discarding invalid chain from node {id}");
                continue;
            }
            let longer = best
                .as_ref()
                .map_or(true, |(current, _)| chain.len() > current.len());
            if longer {
                if let Some(entry) = targets.iter().find(|entry| entry.id == id) {
                    best = Some((chain, entry.clone()));
                }
            }
        }
        best
    }

    fn fetch_ring_and_pending(&self, owner: &RingEntry) -> Result<(Ring, Vec<Transaction>)> {
        let request = Request::SendRingAndPendingTransactions;
        match self.peers.send(&owner.address(), &request)? {
            Response::RingAndPending { ring, pending } => Ok((ring, pending)),
            other => Err(network::unexpected(request.name(), &other)),
        }
    }

    // Re-checks the length under the locks; the local chain may have grown
    // while peers were being queried.
    fn adopt(&self, chain: Chain, ring: Ring, pending: Vec<Transaction>) -> bool {
        let mut chain_state = lock(&self.chain_state);
        if chain.len() <= chain_state.chain.len() {
            debug!("Local chain caught up during resolution");
            return false;
        }
        let mut ledger = lock(&self.ledger);

        let unconfirmed: Vec<Transaction> = pending
            .into_iter()
            .filter(|tx| !chain.contains_transaction(tx.get_id()))
            .collect();
        info!(
            "Adopting chain of {} blocks (was {}), {} pending transactions",
            chain.len(),
            chain_state.chain.len(),
            unconfirmed.len()
        );
        chain_state.chain = chain;
        chain_state.pending.replace(unconfirmed);
        let ledger = &mut *ledger;
        ledger.ring = ring;
        self.resync_wallet(&mut ledger.wallet, &ledger.ring);
        true
    }

    pub(crate) fn resync_wallet(&self, wallet: &mut Wallet, ring: &Ring) {
        let own: Option<(NodeId, Vec<_>)> = ring
            .find_by_key(&self.public_key)
            .map(|entry| (entry.id, entry.utxos.clone()));
        match own {
            Some((id, utxos)) => {
                self.set_id(id);
                wallet.replace_utxos(utxos);
            }
            None => warn!("Adopted ring has no entry for this node"),
        }
    }
}
