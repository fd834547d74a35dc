use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting permit pool bounding simultaneous render sessions system-wide.
/// Each permit corresponds to one live browser page, so the pool is sized
/// to available memory. Permits release on drop, which covers every exit
/// path of a check run.
#[derive(Clone)]
pub struct RenderGate {
    permits: Arc<Semaphore>,
    wait: Duration,
}

impl RenderGate {
    pub fn new(size: usize, wait: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
            wait,
        }
    }

    /// Block up to the configured wait for a permit. `None` means no slot
    /// freed up in time and the caller should skip its run.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match tokio::time::timeout(self.wait, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Some(permit),
            _ => None,
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
