//! Cooperative run cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag that flips from `false` to `true` at most once per run.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` only for the call that flipped it.
    pub fn cancel(&self) -> bool {
        self.cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flips_once() {
        let flag = CancellationFlag::new();
        let shared = flag.clone();
        assert!(!flag.is_cancelled());
        assert!(shared.cancel());
        assert!(!flag.cancel());
        assert!(flag.is_cancelled());
    }
}
