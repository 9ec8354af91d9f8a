use crate::core::{CancelToken, ProofOfWork, Transaction};
use crate::error::Result;
use crate::utils::{canonical_json, current_timestamp, sha256_hex};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: i64,
    transactions: Vec<Transaction>,
    nonce: u64,
    previous_hash: String,
    current_hash: String,
}

// Hashed fields. The index is deliberately not part of the pre-image.
#[derive(Serialize)]
struct BlockContent<'a> {
    timestamp: i64,
    transactions: &'a [Transaction],
    nonce: u64,
    previous_hash: &'a str,
}

impl Block {
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: String) -> Result<Block> {
        let mut block = Block {
            index,
            timestamp: current_timestamp()?,
            transactions,
            nonce: 0,
            previous_hash,
            current_hash: String::new(),
        };
        block.current_hash = block.calculate_hash()?;
        Ok(block)
    }

    pub fn genesis(transaction: Transaction) -> Result<Block> {
        Block::new(0, vec![transaction], GENESIS_PREVIOUS_HASH.to_string())
    }

    pub(crate) fn hash_preimage(&self, nonce: u64) -> Result<String> {
        canonical_json(&BlockContent {
            timestamp: self.timestamp,
            transactions: &self.transactions,
            nonce,
            previous_hash: &self.previous_hash,
        })
    }

    /// Fresh hash of the block's current fields.
    pub fn calculate_hash(&self) -> Result<String> {
        Ok(sha256_hex(self.hash_preimage(self.nonce)?.as_bytes()))
    }

    /// Tamper check: the stored hash matches a recomputation.
    pub fn has_valid_hash(&self) -> bool {
        matches!(self.calculate_hash(), Ok(hash) if hash == self.current_hash)
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        ProofOfWork::meets_difficulty(&self.current_hash, difficulty)
    }

    /// Search for a nonce giving `difficulty` leading zeros.
    ///
    /// Returns `Ok(false)` as soon as `cancel` fires; the block is then left
    /// with a stale nonce and must not be appended.
    pub fn mine(&mut self, difficulty: usize, cancel: &CancelToken) -> Result<bool> {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        if self.meets_difficulty(difficulty) {
            return Ok(true);
        }

        debug!(
            "Mining block {} with {} transactions at difficulty {difficulty}",
            self.index,
            self.transactions.len()
        );
        let pow = ProofOfWork::new_proof_of_work(self, difficulty)?;
        match pow.run(self.nonce.wrapping_add(1), cancel) {
            Some((nonce, hash)) => {
                self.nonce = nonce;
                self.current_hash = hash;
                info!("Mined block {}: {}", self.index, self.current_hash);
                Ok(true)
            }
            None => {
                debug!("Mining of block {} cancelled", self.index);
                Ok(false)
            }
        }
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.current_hash.as_str()
    }

    #[cfg(test)]
    pub(crate) fn set_nonce_unchecked(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    #[cfg(test)]
    pub(crate) fn set_hash_unchecked(&mut self, hash: &str) {
        self.current_hash = hash.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn sample_block() -> Block {
        let tx = Transaction::genesis("someone", 25).unwrap();
        Block::new(3, vec![tx], "abc".to_string()).unwrap()
    }

    #[test]
    fn test_new_block_hash_matches_fields() {
        let block = sample_block();
        assert_eq!(block.get_nonce(), 0);
        assert!(block.has_valid_hash());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = sample_block();
        let copy: Block = serde_json::from_str(&serde_json::to_string(&block).unwrap()).unwrap();
        assert_eq!(block.calculate_hash().unwrap(), copy.calculate_hash().unwrap());
    }

    #[test]
    fn test_hash_ignores_index() {
        let a = sample_block();
        let mut b = a.clone();
        b.index = 99;
        assert_eq!(a.calculate_hash().unwrap(), b.calculate_hash().unwrap());
    }

    #[test]
    fn test_hash_depends_on_transaction_order() {
        let first = Transaction::genesis("a", 1).unwrap();
        let second = Transaction::genesis("b", 2).unwrap();
        let mut block = Block::new(1, vec![first.clone(), second.clone()], "p".to_string()).unwrap();
        let original = block.calculate_hash().unwrap();

        block.transactions = vec![second, first];
        assert_ne!(original, block.calculate_hash().unwrap());
    }

    #[test]
    fn test_nonce_change_is_detected() {
        let mut block = sample_block();
        block.set_nonce_unchecked(42);
        assert!(!block.has_valid_hash());
    }

    #[test]
    fn test_mine_meets_difficulty() {
        let mut block = sample_block();
        assert!(block.mine(2, &CancelToken::new()).unwrap());
        assert!(block.meets_difficulty(2));
        assert!(block.has_valid_hash());
    }

    #[test]
    fn test_mine_cancelled_before_start() {
        let mut block = sample_block();
        let cancel = CancelToken::new();
        let _pause = cancel.pause();

        assert!(!block.mine(64, &cancel).unwrap());
    }

    #[test]
    fn test_mine_at_zero_difficulty_still_honours_cancel() {
        let mut block = sample_block();
        let cancel = CancelToken::new();
        let pause = cancel.pause();
        assert!(!block.mine(0, &cancel).unwrap());

        drop(pause);
        assert!(block.mine(0, &cancel).unwrap());
        cancel.stop();
        assert!(!block.mine(0, &cancel).unwrap());
    }

    #[test]
    fn test_mine_stops_promptly_when_paused_mid_search() {
        let cancel = CancelToken::new();
        let miner_cancel = cancel.clone();
        let handle = thread::spawn(move || {
            let mut block = sample_block();
            block.mine(64, &miner_cancel).unwrap()
        });

        thread::sleep(Duration::from_millis(50));
        let paused_at = Instant::now();
        let guard = cancel.pause();
        let mined = handle.join().unwrap();
        drop(guard);

        assert!(!mined);
        assert!(paused_at.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_genesis_block() {
        let tx = Transaction::genesis("bootstrap", 500).unwrap();
        let block = Block::genesis(tx).unwrap();
        assert_eq!(block.get_index(), 0);
        assert_eq!(block.get_previous_hash(), GENESIS_PREVIOUS_HASH);
        assert_eq!(block.get_transactions().len(), 1);
    }
}
