//! Single-flight guard for passes that must not overlap.

use std::sync::atomic::{AtomicBool, Ordering};

/// Holds the in-flight flag for the duration of a pass and clears it on drop.
#[derive(Debug)]
pub struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    /// `None` if another pass holds the flag.
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_drop() {
        let flag = AtomicBool::new(false);
        let guard = InFlight::acquire(&flag);
        assert!(guard.is_some());
        assert!(InFlight::acquire(&flag).is_none());
        drop(guard);
        assert!(InFlight::acquire(&flag).is_some());
    }
}
