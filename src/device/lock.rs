//! Device configuration lock coordination.
//!
//! A batch of mutations runs inside [`LockCoordinator::with_lock`]: the lock
//! is taken before the batch and released after it, whether the batch
//! succeeded or returned an error.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::target::DeviceTarget;
use crate::client::{ControllerClient, paths};
use crate::error::{ControllerError, LockError, Result, SyncError};
use crate::planner::ExecutionMode;

/// Default pause between lock attempts.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Who owns the device lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// This run locks and unlocks the device.
    #[default]
    Managed,
    /// An enclosing layer holds the lock; no lock or unlock call is sent.
    External,
}

/// How the lock is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Lock ownership.
    pub mode: LockMode,
    /// Acquisition attempts, at least one.
    pub attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            mode: LockMode::Managed,
            attempts: 1,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl LockPolicy {
    /// Policy for a lock held by an enclosing layer.
    #[must_use]
    pub fn external() -> Self {
        Self {
            mode: LockMode::External,
            ..Self::default()
        }
    }

    /// Sets the number of acquisition attempts.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }
}

/// Scoped acquisition of device configuration locks.
#[derive(Debug, Clone, Copy)]
pub struct LockCoordinator<'a> {
    client: &'a ControllerClient,
    policy: LockPolicy,
    mode: ExecutionMode,
}

impl<'a> LockCoordinator<'a> {
    /// Creates a coordinator.
    #[must_use]
    pub const fn new(client: &'a ControllerClient, policy: LockPolicy, mode: ExecutionMode) -> Self {
        Self {
            client,
            policy,
            mode,
        }
    }

    /// Runs `work` while holding the device lock.
    ///
    /// In preview mode the lock is only simulated. With [`LockMode::External`]
    /// the target must have been created with [`DeviceTarget::locked_externally`].
    ///
    /// # Errors
    ///
    /// Returns a lock error if the lock cannot be acquired (`work` is not run),
    /// `work`'s own error if it fails, or a release error if `work` succeeded
    /// but the unlock call failed.
    pub async fn with_lock<T, F, Fut>(&self, device: &DeviceTarget, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.policy.mode == LockMode::External {
            if !device.is_locked() {
                return Err(LockError::NotHeld {
                    device: device.address().to_string(),
                }
                .into());
            }
            debug!("Lock on {device} is held externally");
            return work().await;
        }

        if self.mode.is_preview() {
            info!("[preview] Would lock {device}");
            device.set_locked(true);
            let outcome = work().await;
            device.set_locked(false);
            info!("[preview] Would unlock {device}");
            return outcome;
        }

        self.acquire(device).await?;
        let outcome = work().await;
        let released = self.release(device).await;

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!("Unlock after failed batch also failed: {release_err}");
                Err(e)
            }
        }
    }

    async fn acquire(&self, device: &DeviceTarget) -> Result<()> {
        let path = paths::lock(device.address());
        let mut last_error = String::new();

        for attempt in 1..=self.policy.attempts {
            match self.client.post(&path, None).await {
                Ok(_) => {
                    device.set_locked(true);
                    info!("Locked {device}");
                    return Ok(());
                }
                Err(SyncError::Controller(ControllerError::Request { status, message })) => {
                    warn!(
                        "Lock attempt {attempt}/{} on {device} refused ({status}): {message}",
                        self.policy.attempts
                    );
                    last_error = message;
                    if attempt < self.policy.attempts {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(LockError::AcquireFailed {
            device: device.address().to_string(),
            attempts: self.policy.attempts,
            message: last_error,
        }
        .into())
    }

    async fn release(&self, device: &DeviceTarget) -> Result<()> {
        let result = self.client.post(&paths::unlock(device.address()), None).await;
        device.set_locked(false);

        match result {
            Ok(_) => {
                info!("Unlocked {device}");
                Ok(())
            }
            Err(e) => Err(LockError::ReleaseFailed {
                device: device.address().to_string(),
                message: e.to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerSettings;
    use crate::error::ItemError;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEVICE: &str = "10.0.0.5";

    async fn controller() -> (MockServer, ControllerClient) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(paths::LOGIN))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "JSESSIONID=abc")
                    .set_body_json(json!({"status": "ok"})),
            )
            .mount(&server)
            .await;
        let settings = ControllerSettings::new(server.uri(), "admin", "pw").unwrap();
        let client = ControllerClient::with_memory_store(settings).unwrap();
        (server, client)
    }

    async fn expect_call(server: &MockServer, p: String, status: u16, times: u64) {
        Mock::given(method("POST"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"status": "ok"})))
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_lock_released_after_success() {
        let (server, client) = controller().await;
        expect_call(&server, paths::lock(DEVICE), 200, 1).await;
        expect_call(&server, paths::unlock(DEVICE), 200, 1).await;

        let device = DeviceTarget::new(DEVICE);
        let coordinator = LockCoordinator::new(&client, LockPolicy::default(), ExecutionMode::Apply);
        let seen = coordinator
            .with_lock(&device, || async { Ok(device.is_locked()) })
            .await
            .unwrap();

        assert!(seen);
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_lock_released_when_work_fails() {
        let (server, client) = controller().await;
        expect_call(&server, paths::lock(DEVICE), 200, 1).await;
        Mock::given(method("POST"))
            .and(path(paths::unlock(DEVICE)))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let device = DeviceTarget::new(DEVICE);
        let coordinator = LockCoordinator::new(&client, LockPolicy::default(), ExecutionMode::Apply);
        let err = coordinator
            .with_lock(&device, || async {
                Err::<(), _>(SyncError::Item(ItemError::validation_general("boom")))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Item(_)));
        assert!(!device.is_locked());
    }

    #[tokio::test]
    async fn test_release_failure_after_success_is_reported() {
        let (server, client) = controller().await;
        expect_call(&server, paths::lock(DEVICE), 200, 1).await;
        expect_call(&server, paths::unlock(DEVICE), 500, 1).await;

        let device = DeviceTarget::new(DEVICE);
        let coordinator = LockCoordinator::new(&client, LockPolicy::default(), ExecutionMode::Apply);
        let err = coordinator
            .with_lock(&device, || async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Lock(LockError::ReleaseFailed { .. })));
    }

    #[tokio::test]
    async fn test_acquire_failure_is_bounded() {
        let (server, client) = controller().await;
        Mock::given(method("POST"))
            .and(path(paths::lock(DEVICE)))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"message": "locked by user1"})),
            )
            .expect(2)
            .mount(&server)
            .await;
        expect_call(&server, paths::unlock(DEVICE), 200, 0).await;

        let device = DeviceTarget::new(DEVICE);
        let policy = LockPolicy::default().with_attempts(2, Duration::ZERO);
        let coordinator = LockCoordinator::new(&client, policy, ExecutionMode::Apply);
        let err = coordinator
            .with_lock(&device, || async { Err::<(), _>(SyncError::internal("work ran")) })
            .await
            .unwrap_err();

        match err {
            SyncError::Lock(LockError::AcquireFailed { attempts, message, .. }) => {
                assert_eq!(attempts, 2);
                assert_eq!(message, "locked by user1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_external_and_preview_send_nothing() {
        let (server, client) = controller().await;
        expect_call(&server, paths::lock(DEVICE), 200, 0).await;
        expect_call(&server, paths::unlock(DEVICE), 200, 0).await;

        let external = DeviceTarget::locked_externally(DEVICE);
        LockCoordinator::new(&client, LockPolicy::external(), ExecutionMode::Apply)
            .with_lock(&external, || async { Ok(()) })
            .await
            .unwrap();
        assert!(external.is_locked());

        let previewed = DeviceTarget::new(DEVICE);
        let held = LockCoordinator::new(&client, LockPolicy::default(), ExecutionMode::Preview)
            .with_lock(&previewed, || async { Ok(previewed.is_locked()) })
            .await
            .unwrap();
        assert!(held);
        assert!(!previewed.is_locked());
    }

    #[tokio::test]
    async fn test_external_without_held_lock_is_rejected() {
        let (_server, client) = controller().await;
        let device = DeviceTarget::new(DEVICE);
        let err = LockCoordinator::new(&client, LockPolicy::external(), ExecutionMode::Apply)
            .with_lock(&device, || async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Lock(LockError::NotHeld { .. })));
    }
}
