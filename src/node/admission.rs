// Transaction creation and admission of transactions and blocks.

use super::node::{lock, LedgerState, Node};
use crate::core::{Block, NodeId, Transaction};
use crate::error::{NoobcashError, Result};
use crate::network::Request;
use crate::storage::Ring;
use log::{debug, info, warn};
use std::collections::HashSet;

impl Node {
    /// Create, sign, apply and broadcast a transfer of `amount` coins to the
    /// ring member `receiver_id`.
    pub fn create_transaction(&self, receiver_id: NodeId, amount: u64) -> Result<Transaction> {
        let my_id = self.require_id()?;
        if receiver_id == my_id {
            return Err(NoobcashError::SelfTransfer);
        }
        if amount == 0 {
            return Err(NoobcashError::InvalidTransaction(
                "amount must be positive".to_string(),
            ));
        }

        let mut chain_state = lock(&self.chain_state);
        let mut ledger = lock(&self.ledger);
        let receiver = ledger
            .ring
            .get(receiver_id)
            .map(|entry| entry.public_key.clone())
            .ok_or(NoobcashError::NoSuchPeer(receiver_id))?;

        let inputs = ledger.wallet.select_inputs(amount)?;
        let signed = Transaction::create(ledger.wallet.key_pair(), &receiver, amount, &inputs)
            .and_then(|tx| validate_transaction(&ledger.ring, &tx).map(|_| tx));
        let tx = match signed {
            Ok(tx) => tx,
            Err(e) => {
                ledger.wallet.restore(inputs);
                return Err(e);
            }
        };

        self.apply(&mut ledger, &tx);
        chain_state.pending.add(tx.clone());
        let targets = self.peer_entries(&ledger.ring);
        drop(ledger);
        drop(chain_state);

        info!(
            "Created transaction {} sending {amount} coins to node {receiver_id}",
            tx.get_id()
        );
        self.broadcast(
            Request::RegisterTransaction {
                transaction: tx.clone(),
            },
            targets,
        );
        Ok(tx)
    }

    /// Admit a transaction broadcast by a peer.
    pub fn register_transaction(&self, tx: Transaction) -> Result<()> {
        let mut chain_state = lock(&self.chain_state);
        if chain_state.pending.contains(tx.get_id())
            || chain_state.chain.contains_transaction(tx.get_id())
        {
            debug!("Transaction {} already known", tx.get_id());
            return Ok(());
        }

        let mut ledger = lock(&self.ledger);
        validate_transaction(&ledger.ring, &tx).map_err(|e| match e {
            NoobcashError::InvalidSignature => {
                NoobcashError::InvalidTransaction("invalid signature".to_string())
            }
            other => other,
        })?;
        self.apply(&mut ledger, &tx);
        chain_state.pending.add(tx);
        Ok(())
    }

    /// Admit a block mined by a peer.
    ///
    /// Local mining is paused for the whole call. A block that does not
    /// extend the tip triggers conflict resolution instead of an error.
    pub fn register_block(&self, block: Block) -> Result<()> {
        let _pause = self.cancel.pause();
        {
            let mut chain_state = lock(&self.chain_state);
            if chain_state.chain.contains_block(block.get_hash()) {
                debug!("Block {} already in the chain", block.get_hash());
                return Ok(());
            }

            match chain_state.chain.append(&block, self.config.difficulty) {
                Ok(()) => {
                    let pooled = chain_state.pending.ids();
                    let in_block: HashSet<String> = block
                        .get_transactions()
                        .iter()
                        .map(|tx| tx.get_id().to_string())
                        .collect();
                    chain_state.pending.confirm(&in_block);

                    let mut ledger = lock(&self.ledger);
                    for tx in block.get_transactions() {
                        if !pooled.contains(tx.get_id()) {
                            self.apply(&mut ledger, tx);
                        }
                    }
                    info!(
                        "Accepted block {} with {} transactions",
                        block.get_index(),
                        block.get_transactions().len()
                    );
                    return Ok(());
                }
                Err(e) => warn!("Block {} not appended: {e}", block.get_index()),
            }
        }

        self.resolve_conflicts().map(|adopted| {
            if !adopted {
                debug!("Kept local chain after rejected block");
            }
        })
    }

    /// Update the wallet and the cached ring with the effects of `tx`.
    pub(crate) fn apply(&self, ledger: &mut LedgerState, tx: &Transaction) {
        if tx.get_sender_address() == self.public_key {
            ledger.wallet.spend(tx.get_inputs());
            if let Some(change) = tx.change() {
                ledger.wallet.receive(change.clone());
            }
        }
        if tx.get_receiver_address() == self.public_key {
            if let Some(payment) = tx.payment() {
                ledger.wallet.receive(payment.clone());
            }
        }
        ledger.ring.apply(tx);
    }
}

/// Signature and output checks plus the cached balance check against `ring`.
///
/// The balance check is approximate: it trusts the sender's cached ring
/// balance and does not look for inputs shared with other pending transfers.
pub fn validate_transaction(ring: &Ring, tx: &Transaction) -> Result<()> {
    if !tx.verify_signature() {
        return Err(NoobcashError::InvalidSignature);
    }
    tx.verify_outputs()?;
    let sender = ring
        .find_by_key(tx.get_sender_address())
        .ok_or_else(|| NoobcashError::InvalidTransaction("sender is not in the ring".to_string()))?;
    if sender.balance < tx.get_amount() {
        return Err(NoobcashError::InvalidTransaction(format!(
            "sender {} holds {} coins, needs {}",
            sender.id,
            sender.balance,
            tx.get_amount()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::node::lock;
    use crate::node::node::tests::offline_bootstrap;
    use crate::wallet::{KeyPair, Wallet};

    fn with_peer(nodes: usize) -> (std::sync::Arc<Node>, Wallet) {
        let node = offline_bootstrap(nodes);
        let peer = Wallet::new().unwrap();
        assert_eq!(node.register_node(peer.public_key(), "10.0.0.1", 6000).unwrap(), 1);
        (node, peer)
    }

    #[test]
    fn test_create_transaction_updates_wallet_ring_and_pool() {
        let (node, peer) = with_peer(3);
        let tx = node.create_transaction(1, 30).unwrap();

        assert_eq!(tx.get_receiver_address(), peer.public_key());
        assert_eq!(node.wallet().balance(), 270);
        let ring = node.ring();
        assert_eq!(ring.get(0).unwrap().balance, 270);
        assert_eq!(ring.get(1).unwrap().balance, 30);
        assert_eq!(ring.total_balance(), 300);
        assert_eq!(node.pending_transactions(), vec![tx]);
    }

    #[test]
    fn test_create_transaction_rejects_bad_receivers() {
        let (node, _) = with_peer(3);
        assert_eq!(
            node.create_transaction(0, 10).unwrap_err(),
            NoobcashError::SelfTransfer
        );
        assert_eq!(
            node.create_transaction(7, 10).unwrap_err(),
            NoobcashError::NoSuchPeer(7)
        );
        assert!(node.pending_transactions().is_empty());
    }

    #[test]
    fn test_overspend_leaves_wallet_untouched() {
        let (node, _) = with_peer(3);
        let before = node.wallet().utxos().to_vec();
        assert_eq!(
            node.create_transaction(1, 301).unwrap_err(),
            NoobcashError::InsufficientFunds {
                required: 301,
                available: 300
            }
        );
        assert_eq!(node.wallet().utxos(), before.as_slice());
        assert_eq!(node.ring().get(0).unwrap().balance, 300);
    }

    #[test]
    fn test_register_transaction_rejects_unknown_sender() {
        let (node, peer) = with_peer(3);
        let stranger = KeyPair::generate().unwrap();
        let funding = crate::core::Utxo::new("x", stranger.public_key(), 50);
        let tx = Transaction::create(&stranger, peer.public_key(), 10, &[funding]).unwrap();
        assert!(matches!(
            node.register_transaction(tx),
            Err(NoobcashError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_register_transaction_rejects_tampered_amount() {
        let (node, peer) = with_peer(3);
        let wallet = node.wallet();
        let tx = Transaction::create(wallet.key_pair(), peer.public_key(), 30, wallet.utxos())
            .unwrap();

        let mut json = serde_json::to_value(&tx).unwrap();
        json["amount"] = serde_json::json!(3);
        let forged: Transaction = serde_json::from_value(json).unwrap();
        assert_ne!(forged, tx);
        assert_eq!(
            node.register_transaction(forged),
            Err(NoobcashError::InvalidTransaction("invalid signature".to_string()))
        );
    }

    #[test]
    fn test_register_transaction_rejects_inflated_payment() {
        let (node, mut peer) = with_peer(3);
        // fund the peer in both its wallet and the bootstrap's ring
        let minted = Transaction::genesis(peer.public_key(), 100).unwrap();
        peer.receive(minted.payment().unwrap().clone());
        lock(&node.ledger).ring.apply(&minted);
        let tx =
            Transaction::create(peer.key_pair(), node.public_key(), 10, peer.utxos()).unwrap();

        let mut json = serde_json::to_value(&tx).unwrap();
        json["outputs"][1]["value"] = serde_json::json!(1_000_000u64);
        let forged: Transaction = serde_json::from_value(json).unwrap();
        assert!(forged.verify_signature());

        let wallet_before = node.wallet().balance();
        assert!(matches!(
            node.register_transaction(forged),
            Err(NoobcashError::InvalidTransaction(_))
        ));
        assert_eq!(node.wallet().balance(), wallet_before);
        assert!(node.pending_transactions().is_empty());

        node.register_transaction(tx).unwrap();
        assert_eq!(node.wallet().balance(), wallet_before + 10);
    }

    #[test]
    fn test_register_transaction_is_idempotent() {
        let (node, _) = with_peer(3);
        let tx = node.create_transaction(1, 30).unwrap();
        node.register_transaction(tx).unwrap();
        assert_eq!(node.pending_transactions().len(), 1);
        assert_eq!(node.ring().get(1).unwrap().balance, 30);
    }

    #[test]
    fn test_redelivered_block_is_ignored() {
        let (node, _) = with_peer(3);
        node.create_transaction(1, 30).unwrap();
        assert!(node.mine_once().unwrap());
        let chain = node.chain();
        assert_eq!(chain.len(), 2);
        assert!(node.pending_transactions().is_empty());

        let block = chain.tip().unwrap().clone();
        node.register_block(block).unwrap();
        assert_eq!(node.chain(), chain);
        assert_eq!(node.ring().get(1).unwrap().balance, 30);
        assert_eq!(node.wallet().balance(), 270);
    }

    #[test]
    fn test_block_with_unseen_transaction_is_applied_once() {
        let (node, mut peer) = with_peer(3);
        let minted = Transaction::genesis(peer.public_key(), 100).unwrap();
        peer.receive(minted.payment().unwrap().clone());
        lock(&node.ledger).ring.apply(&minted);

        // mined by the peer before its broadcast reached us
        let unseen =
            Transaction::create(peer.key_pair(), node.public_key(), 10, peer.utxos()).unwrap();
        let tip = node.chain().tip().unwrap().clone();
        let mut block = Block::new(1, vec![unseen.clone()], tip.get_hash().to_string()).unwrap();
        assert!(block.mine(1, &crate::core::CancelToken::new()).unwrap());

        node.register_block(block.clone()).unwrap();
        assert_eq!(node.chain().len(), 2);
        assert_eq!(node.wallet().balance(), 310);
        assert_eq!(node.ring().get(1).unwrap().balance, 90);
        assert_eq!(node.ring().get(0).unwrap().balance, 310);
        assert!(node.pending_transactions().is_empty());

        // the late broadcast and a second delivery change nothing
        node.register_transaction(unseen).unwrap();
        node.register_block(block).unwrap();
        assert_eq!(node.wallet().balance(), 310);
        assert_eq!(node.ring().get(1).unwrap().balance, 90);
        assert!(node.pending_transactions().is_empty());
    }

    #[test]
    fn test_validate_transaction_checks_cached_balance() {
        let (node, peer) = with_peer(3);
        let funding = crate::core::Utxo::new("x", peer.public_key(), 500);
        let tx = Transaction::create(peer.key_pair(), node.public_key(), 200, &[funding]).unwrap();
        assert!(matches!(
            validate_transaction(&node.ring(), &tx),
            Err(NoobcashError::InvalidTransaction(_))
        ));
    }
}
