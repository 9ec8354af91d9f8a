// The ring is this node's observed ledger of every peer: where to reach it,
// its public key, and the balance/outputs we believe it holds. It is derived
// from the transactions we have seen and is only as fresh as they are.

use crate::core::{NodeId, Transaction, Utxo};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingEntry {
    pub id: NodeId,
    pub ip: String,
    pub port: u16,
    pub public_key: String,
    pub balance: u64,
    pub utxos: Vec<Utxo>,
}

impl RingEntry {
    pub fn new(id: NodeId, ip: &str, port: u16, public_key: &str) -> RingEntry {
        RingEntry {
            id,
            ip: ip.to_string(),
            port,
            public_key: public_key.to_string(),
            balance: 0,
            utxos: Vec::new(),
        }
    }

    /// `ip:port` used by the transport.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    fn credit(&mut self, utxo: &Utxo) {
        if utxo.value > 0 && !self.utxos.iter().any(|owned| owned.id == utxo.id) {
            self.utxos.push(utxo.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ring {
    entries: Vec<RingEntry>,
}

impl Ring {
    pub fn new() -> Ring {
        Ring::default()
    }

    pub fn entries(&self) -> &[RingEntry] {
        self.entries.as_slice()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id the next registered node receives.
    pub fn next_id(&self) -> NodeId {
        self.entries.len()
    }

    pub fn add(&mut self, entry: RingEntry) {
        self.entries.push(entry);
    }

    pub fn get(&self, id: NodeId) -> Option<&RingEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn find_by_key(&self, public_key: &str) -> Option<&RingEntry> {
        self.entries
            .iter()
            .find(|entry| entry.public_key == public_key)
    }

    /// Every entry except `id`, i.e. the broadcast targets of node `id`.
    pub fn peers_of(&self, id: NodeId) -> Vec<RingEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect()
    }

    pub fn total_balance(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |sum, entry| sum.saturating_add(entry.balance))
    }

    /// Move `tx.amount` from the sender's entry to the receiver's.
    ///
    /// Consumed outputs are removed by id so a second application cannot
    /// remove anything the first did not.
    pub fn apply(&mut self, tx: &Transaction) {
        let consumed: HashSet<&str> = tx.get_inputs().iter().map(|i| i.id.as_str()).collect();

        if let Some(sender) = self
            .entries
            .iter_mut()
            .find(|entry| entry.public_key == tx.get_sender_address())
        {
            sender.balance = sender.balance.saturating_sub(tx.get_amount());
            sender.utxos.retain(|utxo| !consumed.contains(utxo.id.as_str()));
            if let Some(change) = tx.change() {
                sender.credit(change);
            }
        }

        if let Some(receiver) = self
            .entries
            .iter_mut()
            .find(|entry| entry.public_key == tx.get_receiver_address())
        {
            receiver.balance = receiver.balance.saturating_add(tx.get_amount());
            if let Some(payment) = tx.payment() {
                receiver.credit(payment);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn two_node_ring(sender: &Wallet, receiver: &Wallet, funding: &Utxo) -> Ring {
        let mut ring = Ring::new();
        let mut first = RingEntry::new(0, "127.0.0.1", 5000, sender.public_key());
        first.balance = funding.value;
        first.utxos.push(funding.clone());
        ring.add(first);
        ring.add(RingEntry::new(1, "127.0.0.1", 5001, receiver.public_key()));
        ring
    }

    #[test]
    fn test_apply_moves_balance_and_outputs() {
        let sender = Wallet::new().unwrap();
        let receiver = Wallet::new().unwrap();
        let funding = Utxo::new("genesis", sender.public_key(), 100);
        let mut ring = two_node_ring(&sender, &receiver, &funding);

        let tx = Transaction::create(sender.key_pair(), receiver.public_key(), 30, &[funding]).unwrap();
        ring.apply(&tx);

        let from = ring.get(0).unwrap();
        let to = ring.get(1).unwrap();
        assert_eq!(from.balance, 70);
        assert_eq!(from.utxos.len(), 1);
        assert_eq!(from.utxos[0].value, 70);
        assert_eq!(to.balance, 30);
        assert_eq!(to.utxos[0].value, 30);
        assert_eq!(ring.total_balance(), 100);
    }

    #[test]
    fn test_apply_ignores_unknown_parties() {
        let sender = Wallet::new().unwrap();
        let receiver = Wallet::new().unwrap();
        let stranger = Wallet::new().unwrap();
        let funding = Utxo::new("genesis", sender.public_key(), 100);
        let mut ring = two_node_ring(&sender, &receiver, &funding);
        let before = ring.clone();

        let stray_input = Utxo::new("elsewhere", stranger.public_key(), 5);
        let tx = Transaction::create(stranger.key_pair(), "nobody", 5, &[stray_input]).unwrap();
        ring.apply(&tx);
        assert_eq!(ring, before);
    }

    #[test]
    fn test_apply_saturates_receiver_balance() {
        let sender = Wallet::new().unwrap();
        let receiver = Wallet::new().unwrap();
        let funding = Utxo::new("genesis", sender.public_key(), 100);
        let mut ring = two_node_ring(&sender, &receiver, &funding);
        ring.entries[1].balance = u64::MAX - 5;

        let mint = Transaction::genesis(receiver.public_key(), 100).unwrap();
        ring.apply(&mint);
        assert_eq!(ring.get(1).unwrap().balance, u64::MAX);
        assert_eq!(ring.total_balance(), u64::MAX);
    }

    #[test]
    fn test_peers_of_excludes_self() {
        let sender = Wallet::new().unwrap();
        let receiver = Wallet::new().unwrap();
        let funding = Utxo::new("genesis", sender.public_key(), 100);
        let ring = two_node_ring(&sender, &receiver, &funding);

        let peers = ring.peers_of(0);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].id, 1);
        assert_eq!(peers[0].address(), "127.0.0.1:5001");
        assert_eq!(ring.next_id(), 2);
        assert_eq!(ring.find_by_key(receiver.public_key()).unwrap().id, 1);
    }
}
