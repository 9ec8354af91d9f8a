use crate::core::Transaction;
use std::collections::{HashSet, VecDeque};

/// Transactions admitted but not yet in an appended block.
///
/// The batch the miner is working on stays here as `in_flight` so that a
/// block arriving mid-mine can recognise and confirm it.
#[derive(Debug, Default)]
pub struct PendingPool {
    queue: VecDeque<Transaction>,
    in_flight: Vec<Transaction>,
}

impl PendingPool {
    pub fn new() -> PendingPool {
        PendingPool::default()
    }

    pub fn add(&mut self, tx: Transaction) {
        self.queue.push_back(tx);
    }

    /// Transactions waiting for a miner.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty()
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.queue
            .iter()
            .chain(self.in_flight.iter())
            .any(|tx| tx.get_id() == txid)
    }

    /// Ids of every pending transaction, mined or waiting.
    pub fn ids(&self) -> HashSet<String> {
        self.queue
            .iter()
            .chain(self.in_flight.iter())
            .map(|tx| tx.get_id().to_string())
            .collect()
    }

    /// Move the oldest `capacity` transactions in flight.
    ///
    /// Returns `None` when fewer are waiting or a batch is already in flight.
    pub fn take_batch(&mut self, capacity: usize) -> Option<Vec<Transaction>> {
        if !self.in_flight.is_empty() || self.queue.len() < capacity {
            return None;
        }
        self.in_flight = self.queue.drain(..capacity).collect();
        Some(self.in_flight.clone())
    }

    /// Put whatever is left of the in-flight batch back at the front.
    pub fn return_in_flight(&mut self) {
        for tx in self.in_flight.drain(..).rev() {
            self.queue.push_front(tx);
        }
    }

    /// The in-flight batch made it into the chain.
    pub fn finish_in_flight(&mut self) {
        self.in_flight.clear();
    }

    /// Drop every transaction whose id is in `ids`, queued or in flight.
    pub fn confirm(&mut self, ids: &HashSet<String>) {
        self.queue.retain(|tx| !ids.contains(tx.get_id()));
        self.in_flight.retain(|tx| !ids.contains(tx.get_id()));
    }

    /// Replace everything, as when adopting a peer's pool.
    pub fn replace(&mut self, transactions: Vec<Transaction>) {
        self.in_flight.clear();
        self.queue = transactions.into();
    }

    /// In-flight batch first, then the queue, in mining order.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.in_flight
            .iter()
            .chain(self.queue.iter())
            .cloned()
            .collect()
    }
}
