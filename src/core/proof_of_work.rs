use crate::core::Block;
use crate::error::{NoobcashError, Result};
use crate::utils::sha256_hex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// Canonical block JSON sorts keys, so the nonce is always the first field.
const NONCE_KEY: &str = "{\"nonce\":";

/// Cooperative cancellation for the proof-of-work search.
///
/// Any number of callers may pause mining at once; the search is cancelled
/// while at least one `PauseGuard` is alive or after `stop` has been called.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    pauses: Arc<AtomicUsize>,
    stopped: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn pause(&self) -> PauseGuard {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        PauseGuard {
            pauses: Arc::clone(&self.pauses),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pauses.load(Ordering::SeqCst) > 0
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_paused() || self.is_stopped()
    }
}

/// Resumes mining when dropped, unless another pause is still held.
#[derive(Debug)]
pub struct PauseGuard {
    pauses: Arc<AtomicUsize>,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.pauses.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Nonce search over a fixed block pre-image.
pub struct ProofOfWork {
    suffix: String,
    difficulty: usize,
}

impl ProofOfWork {
    pub fn new_proof_of_work(block: &Block, difficulty: usize) -> Result<ProofOfWork> {
        let canonical = block.hash_preimage(0)?;
        let suffix = canonical
            .strip_prefix(NONCE_KEY)
            .and_then(|rest| rest.strip_prefix('0'))
            .ok_or_else(|| {
                NoobcashError::Serialization("Unexpected block pre-image layout".to_string())
            })?
            .to_string();
        Ok(ProofOfWork { suffix, difficulty })
    }

    /// Whether `hash` starts with `difficulty` zero characters.
    pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
        hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    fn prepare_data(&self, nonce: u64) -> String {
        format!("{NONCE_KEY}{nonce}{}", self.suffix)
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> String {
        sha256_hex(self.prepare_data(nonce).as_bytes())
    }

    /// Search nonces from `start` upward, checking `cancel` before every
    /// attempt. Returns the winning nonce and hash, or `None` if cancelled.
    pub fn run(&self, start: u64, cancel: &CancelToken) -> Option<(u64, String)> {
        let mut nonce = start;
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            let hash = self.hash_with_nonce(nonce);
            if Self::meets_difficulty(&hash, self.difficulty) {
                return Some((nonce, hash));
            }
            nonce = nonce.wrapping_add(1);
        }
    }
}
