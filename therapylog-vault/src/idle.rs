//! Inactivity auto-lock.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use therapylog_crypto::SessionKeyHolder;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Last time the vault was used. Clones share the same timestamp.
#[derive(Clone, Debug)]
pub struct ActivityClock {
    last: Arc<Mutex<Instant>>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn touch(&self) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).elapsed()
    }
}

/// Background task that clears the key holder after `timeout` without
/// activity. Stops when dropped.
#[derive(Debug)]
pub struct IdleLock {
    handle: JoinHandle<()>,
}

impl IdleLock {
    /// Must be called from within a tokio runtime.
    pub fn spawn(holder: SessionKeyHolder, activity: ActivityClock, timeout: Duration) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                let idle = activity.idle_for();
                if idle >= timeout {
                    if holder.is_unlocked() {
                        holder.clear();
                        tracing::info!(timeout_secs = timeout.as_secs(), "locked after inactivity");
                    }
                    tokio::time::sleep(timeout).await;
                } else {
                    tokio::time::sleep(timeout - idle).await;
                }
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for IdleLock {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
