//! Per-account transaction sequence counter.
//!
//! Hands out strictly increasing sequence numbers and tracks the ledger's
//! pending transaction count. Sync only ever moves the counter forward;
//! after a failed submission the owner resets it to whatever the ledger
//! reports, which may be lower than the last reserved value.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Lock-free sequence counter.
///
/// # Guarantees
/// - `reserve` never returns the same value twice between resets
/// - `sync` never moves the counter backwards
/// - Thread-safe for concurrent access
#[derive(Debug, Default)]
pub struct SequenceCounter {
    /// Next value to hand out.
    next: AtomicU64,
    /// Whether `next` reflects the ledger at least once.
    synced: AtomicBool,
}

impl SequenceCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Next value `reserve` would return.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Acquire)
    }

    /// Reserve the next sequence number.
    ///
    /// Thread-safe via CAS loop.
    pub fn reserve(&self) -> u64 {
        loop {
            let current = self.next.load(Ordering::Acquire);
            match self.next.compare_exchange_weak(
                current,
                current.saturating_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return current,
                Err(_) => continue,
            }
        }
    }

    /// Fast-forward to at least the ledger's observed pending count.
    pub fn sync(&self, observed: u64) {
        loop {
            let current = self.next.load(Ordering::Acquire);
            if current >= observed {
                break;
            }

            match self.next.compare_exchange_weak(
                current,
                observed,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(_) => continue,
            }
        }
        self.synced.store(true, Ordering::Release);
    }

    /// Adopt the ledger's value unconditionally (after a failed submission).
    pub fn reset(&self, observed: u64) {
        let previous = self.next.swap(observed, Ordering::AcqRel);
        self.synced.store(true, Ordering::Release);
        if previous != observed {
            tracing::debug!(previous, observed, "sequence counter re-synced");
        }
    }

    /// Forget the ledger state; the next submission syncs again.
    pub fn invalidate(&self) {
        self.synced.store(false, Ordering::Release);
    }
}
