//! RAII guard for protecting against partial frame writes.
//!
//! When a client request times out, the future writing or reading the frame
//! is dropped mid-flight. A half-written frame leaves the lockstep stream
//! unusable, so every write arms a `PoisonGuard` first:
//!
//! 1. `PoisonGuard::new()` sets the flag to `true`
//! 2. If the future is dropped before completion, the flag stays `true`
//! 3. Only `disarm()` after the whole frame is written resets it
//!
//! A poisoned socket refuses further I/O and must be rebuilt.
//!
//! ```rust
//! use robotmq_core::poison::PoisonGuard;
//!
//! let mut is_poisoned = false;
//! let guard = PoisonGuard::new(&mut is_poisoned);
//! // ... write the frame ...
//! guard.disarm();
//! assert!(!is_poisoned);
//! ```

/// A RAII guard that marks a connection as poisoned if dropped before disarmed.
pub struct PoisonGuard<'a> {
    flag: &'a mut bool,
}

impl<'a> PoisonGuard<'a> {
    /// Create a new guard, immediately marking the connection as poisoned.
    #[inline]
    pub fn new(flag: &'a mut bool) -> Self {
        *flag = true;
        Self { flag }
    }

    /// Disarm the guard, marking the connection as healthy.
    ///
    /// Only call this when the entire I/O operation has completed.
    #[inline]
    pub fn disarm(self) {
        *self.flag = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poison_on_drop() {
        let mut poisoned = false;
        {
            let _guard = PoisonGuard::new(&mut poisoned);
        }
        assert!(poisoned, "Connection should be poisoned when guard is dropped");
    }

    #[test]
    fn test_disarm_clears_poison() {
        let mut poisoned = true;
        let guard = PoisonGuard::new(&mut poisoned);
        guard.disarm();
        assert!(!poisoned, "Connection should be healthy after disarm");
    }
}
