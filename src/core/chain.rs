// The local copy of the ledger. Blocks are only ever appended at the tip;
// the whole chain is swapped out during conflict resolution.

use crate::core::{Block, Transaction};
use crate::error::{NoobcashError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    pub fn new(genesis: Block) -> Chain {
        Chain {
            blocks: vec![genesis],
        }
    }

    /// Rebuild a chain from received blocks without checking them.
    /// Call `validate` before trusting it.
    pub fn from_blocks(blocks: Vec<Block>) -> Chain {
        Chain { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Index the next block must carry.
    pub fn next_index(&self) -> u64 {
        self.tip().map_or(0, |tip| tip.get_index() + 1)
    }

    pub fn contains_block(&self, hash: &str) -> bool {
        self.blocks.iter().any(|block| block.get_hash() == hash)
    }

    pub fn contains_transaction(&self, id: &str) -> bool {
        self.blocks
            .iter()
            .flat_map(|block| block.get_transactions())
            .any(|tx| tx.get_id() == id)
    }

    pub fn last_transactions(&self) -> Vec<Transaction> {
        self.tip()
            .map(|tip| tip.get_transactions().to_vec())
            .unwrap_or_default()
    }

    /// Append `block` if it extends the tip; leaves the chain unchanged otherwise.
    pub fn append(&mut self, block: &Block, difficulty: usize) -> Result<()> {
        let tip = self
            .tip()
            .ok_or_else(|| NoobcashError::ChainAppendRejected("chain has no genesis".to_string()))?;
        Self::validate_link(tip, block, difficulty)?;
        self.blocks.push(block.clone());
        Ok(())
    }

    fn validate_link(previous: &Block, block: &Block, difficulty: usize) -> Result<()> {
        if block.get_index() != previous.get_index() + 1 {
            return Err(NoobcashError::ChainAppendRejected(format!(
                "expected index {}, got {}",
                previous.get_index() + 1,
                block.get_index()
            )));
        }
        if block.get_previous_hash() != previous.get_hash() {
            return Err(NoobcashError::ChainAppendRejected(format!(
                "block {} does not link to {}",
                block.get_index(),
                previous.get_hash()
            )));
        }
        if !block.has_valid_hash() {
            return Err(NoobcashError::ChainAppendRejected(format!(
                "block {} hash does not match its contents",
                block.get_index()
            )));
        }
        if !block.meets_difficulty(difficulty) {
            return Err(NoobcashError::ChainAppendRejected(format!(
                "block {} misses difficulty {difficulty}",
                block.get_index()
            )));
        }
        Ok(())
    }

    /// Full scan: genesis self-hash, then every link, hash and proof of work.
    pub fn validate(&self, difficulty: usize) -> bool {
        let genesis = match self.blocks.first() {
            Some(genesis) => genesis,
            None => return false,
        };
        if genesis.get_index() != 0 || !genesis.has_valid_hash() {
            return false;
        }
        self.blocks.windows(2).all(|pair| {
            match Self::validate_link(&pair[0], &pair[1], difficulty) {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("Chain validation failed: {e}");
                    false
                }
            }
        })
    }
}
