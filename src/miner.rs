//! Proof-of-work puzzle: find `proof` such that
//! `sha256(decimal(last_proof) ++ decimal(proof))` starts with [`DIFFICULTY`] zeros.
//!
//! The search is a plain linear scan from zero. It has no upper bound, so the
//! async entry point runs it on the blocking pool under a deadline and the
//! scan itself polls a cancellation flag.

use crate::crypto::sha256_hex;
use crate::error::ChainError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Number of leading `'0'` hex characters a valid proof digest must have.
pub const DIFFICULTY: usize = 4;

/// How many candidates are tried between two checks of the cancel flag.
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Returns true iff `proof` solves the puzzle posed by `last_proof`.
pub fn valid_proof(last_proof: u64, proof: u64) -> bool {
    let guess = format!("{}{}", last_proof, proof);
    let digest = sha256_hex(guess.as_bytes());
    digest.as_bytes()[..DIFFICULTY].iter().all(|b| *b == b'0')
}

/// Smallest non-negative proof for `last_proof`. Unbounded.
pub fn proof_of_work(last_proof: u64) -> u64 {
    let mut proof = 0u64;
    while !valid_proof(last_proof, proof) {
        proof += 1;
    }
    proof
}

/// Same search as [`proof_of_work`], but gives up with `None` once `cancel`
/// is observed set.
pub fn proof_of_work_until(last_proof: u64, cancel: &AtomicBool) -> Option<u64> {
    let mut proof = 0u64;
    loop {
        if proof % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            debug!(last_proof, tried = proof, "proof search cancelled");
            return None;
        }
        if valid_proof(last_proof, proof) {
            return Some(proof);
        }
        proof += 1;
    }
}

/// Sets the cancel flag when dropped, so an abandoned caller also stops the
/// blocking search.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Runs the proof search off the async runtime and abandons it after `timeout`.
pub async fn solve_with_timeout(last_proof: u64, timeout: Duration) -> Result<u64, ChainError> {
    solve_until(last_proof, timeout, Arc::new(AtomicBool::new(false))).await
}

/// Like [`solve_with_timeout`], with a caller-owned cancel flag.
///
/// Setting `cancel` from elsewhere ends the search early. The flag is left
/// raised once this returns or is dropped, so the blocking worker never
/// outlives its caller.
pub async fn solve_until(
    last_proof: u64,
    timeout: Duration,
    cancel: Arc<AtomicBool>,
) -> Result<u64, ChainError> {
    let _guard = CancelOnDrop(cancel.clone());
    let worker_cancel = cancel;
    let task =
        tokio::task::spawn_blocking(move || proof_of_work_until(last_proof, &worker_cancel));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Some(proof))) => Ok(proof),
        Ok(Ok(None)) => Err(ChainError::MiningTimeout),
        Ok(Err(e)) => Err(ChainError::IoError(format!("proof search task failed: {}", e))),
        // The guard raises the flag; the blocking thread notices it within one
        // check interval.
        Err(_) => Err(ChainError::MiningTimeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_vector() {
        // sha256("10035293") = 0000c415...
        assert!(valid_proof(100, 35293));
        assert_eq!(proof_of_work(100), 35293);
    }

    #[test]
    fn test_solution_is_smallest() {
        let proof = proof_of_work(35293);
        assert_eq!(proof, 35089);
        assert!((0..proof).all(|p| !valid_proof(35293, p)));
    }

    #[test]
    fn test_solve_then_verify() {
        for last_proof in [0u64, 1, 7, 100, 35293] {
            assert!(valid_proof(last_proof, proof_of_work(last_proof)));
        }
    }

    #[test]
    fn test_rejects_wrong_proof() {
        assert!(!valid_proof(100, 35292));
        assert!(!valid_proof(100, 0));
    }

    #[test]
    fn test_cancelled_search_returns_none() {
        let cancel = AtomicBool::new(true);
        assert_eq!(proof_of_work_until(100, &cancel), None);
    }

    #[test]
    fn test_uncancelled_search_matches_plain_search() {
        let cancel = AtomicBool::new(false);
        assert_eq!(proof_of_work_until(100, &cancel), Some(35293));
    }

    #[tokio::test]
    async fn test_solve_with_timeout() {
        let proof = solve_with_timeout(100, Duration::from_secs(60)).await.unwrap();
        assert_eq!(proof, 35293);
    }

    #[tokio::test]
    async fn test_dropped_solve_cancels_search() {
        let cancel = Arc::new(AtomicBool::new(false));
        let solve = solve_until(1, Duration::from_secs(60), cancel.clone());

        // A zero deadline polls the solve once, then drops it mid-search.
        let abandoned = tokio::time::timeout(Duration::ZERO, solve).await;
        assert!(abandoned.is_err());
        assert!(cancel.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_externally_cancelled_solve_reports_timeout() {
        let cancel = Arc::new(AtomicBool::new(true));
        let result = solve_until(1, Duration::from_secs(60), cancel).await;
        assert_eq!(result, Err(ChainError::MiningTimeout));
    }

    #[tokio::test]
    async fn test_solve_times_out() {
        let result = solve_with_timeout(1, Duration::ZERO).await;
        assert_eq!(result, Err(ChainError::MiningTimeout));
    }
}
