// The mining thread. It only holds a weak reference so dropping the last
// `Arc<Node>` ends it.

use super::node::{lock, Node};
use crate::core::Block;
use crate::error::Result;
use crate::network::Request;
use log::{debug, error, info};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

const IDLE_WAIT: Duration = Duration::from_millis(10);

impl Node {
    /// Start the mining thread. Calling it again while it runs is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut miner = lock(&self.miner);
        if miner.is_some() {
            return;
        }
        let weak = Arc::downgrade(self);
        *miner = Some(thread::spawn(move || mining_loop(weak)));
        info!("Miner started for {}", self.address());
    }

    /// Stop the miner and wait for it to exit.
    pub fn stop(&self) {
        self.cancel.stop();
        let handle = lock(&self.miner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Miner thread panicked");
            }
        }
    }

    /// Mine one block from the pool if a full batch is waiting.
    ///
    /// Returns whether a batch was taken.
    pub fn mine_once(&self) -> Result<bool> {
        if self.cancel.is_cancelled() {
            return Ok(false);
        }
        let mut block = match self.take_candidate()? {
            Some(block) => block,
            None => return Ok(false),
        };
        let mined = block.mine(self.config.difficulty, &self.cancel);
        self.finish_candidate(block, mined)?;
        Ok(true)
    }

    /// Move a full batch in flight and wrap it in a block on the current tip.
    pub(crate) fn take_candidate(&self) -> Result<Option<Block>> {
        let mut chain_state = lock(&self.chain_state);
        let (index, previous_hash) = match chain_state.chain.tip() {
            Some(tip) => (tip.get_index() + 1, tip.get_hash().to_string()),
            None => return Ok(None),
        };
        let batch = match chain_state.pending.take_batch(self.config.capacity) {
            Some(batch) => batch,
            None => return Ok(None),
        };
        match Block::new(index, batch, previous_hash) {
            Ok(block) => Ok(Some(block)),
            Err(e) => {
                chain_state.pending.return_in_flight();
                Err(e)
            }
        }
    }

    /// Append and broadcast a mined candidate, or give whatever is still
    /// unconfirmed of its batch back to the pool.
    pub(crate) fn finish_candidate(&self, block: Block, mined: Result<bool>) -> Result<()> {
        let mut chain_state = lock(&self.chain_state);
        match mined {
            Ok(true) if !self.cancel.is_cancelled() => {
                match chain_state.chain.append(&block, self.config.difficulty) {
                    Ok(()) => {
                        chain_state.pending.finish_in_flight();
                        let targets = {
                            let ledger = lock(&self.ledger);
                            self.peer_entries(&ledger.ring)
                        };
                        drop(chain_state);
                        info!("Appended mined block {}", block.get_index());
                        self.broadcast(Request::RegisterBlock { block }, targets);
                    }
                    Err(e) => {
                        debug!("Mined block {} went stale: {e}", block.get_index());
                        chain_state.pending.return_in_flight();
                    }
                }
                Ok(())
            }
            Ok(_) => {
                chain_state.pending.return_in_flight();
                Ok(())
            }
            Err(e) => {
                chain_state.pending.return_in_flight();
                Err(e)
            }
        }
    }
}

fn mining_loop(node: Weak<Node>) {
    loop {
        let worked = {
            let node = match node.upgrade() {
                Some(node) => node,
                None => return,
            };
            if node.cancel.is_stopped() {
                return;
            }
            match node.mine_once() {
                Ok(worked) => worked,
                Err(e) => {
                    error!("Mining failed: {e}");
                    false
                }
            }
        };
        if !worked {
            thread::sleep(IDLE_WAIT);
        }
    }
}
