//! Device targets, configuration locks and policy commits.

mod commit;
mod lock;
mod target;

pub use commit::{CommitPolicy, CommitReport, PolicyCommit};
pub use lock::{LockCoordinator, LockMode, LockPolicy};
pub use target::DeviceTarget;
