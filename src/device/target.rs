//! Device target.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A device configured through the controller.
///
/// The lock flag is only toggled by the lock coordinator; the client and
/// the reconciler read the address and nothing else.
#[derive(Debug)]
pub struct DeviceTarget {
    address: String,
    lock_held: AtomicBool,
}

impl DeviceTarget {
    /// A device whose lock is managed by this run.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            lock_held: AtomicBool::new(false),
        }
    }

    /// A device already locked by an enclosing orchestration layer.
    #[must_use]
    pub fn locked_externally(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            lock_held: AtomicBool::new(true),
        }
    }

    /// Device address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the configuration lock is currently held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock_held.load(Ordering::Acquire)
    }

    pub(crate) fn set_locked(&self, held: bool) {
        self.lock_held.store(held, Ordering::Release);
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}
