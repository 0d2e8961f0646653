use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Process-wide single-flight flag for trading cycles.
///
/// `false` at startup. [`RunGuard::try_acquire`] flips it with a
/// compare-exchange and hands out a [`RunPermit`]; dropping the permit flips
/// it back, so every exit path of a cycle (early return, error, unwinding
/// panic) releases it.
#[derive(Debug, Default)]
pub struct RunGuard {
    running: AtomicBool,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another cycle holds the permit.
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| {
                debug!("Run permit acquired");
                RunPermit { guard: self }
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Proof that the current task owns the cycle. Releases on drop.
#[derive(Debug)]
pub struct RunPermit<'a> {
    guard: &'a RunGuard,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
        debug!("Run permit released");
    }
}
