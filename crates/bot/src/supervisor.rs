//! Single-slot supervisor for the broadcast loop task.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct LoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LoopHandle {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Owns at most one running loop.
#[derive(Default)]
pub struct LoopSupervisor {
    handle: Mutex<Option<LoopHandle>>,
}

impl LoopSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<LoopHandle>> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.slot().as_ref().is_some_and(LoopHandle::is_live)
    }

    /// Spawn the loop built by `make` unless one is already live.
    ///
    /// Returns `false` without spawning when a loop is running.
    pub fn start<F, Fut>(&self, make: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(LoopHandle::is_live) {
            return false;
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(make(cancel.clone()));
        *slot = Some(LoopHandle { cancel, task });
        info!("Loop started");
        true
    }

    /// Cancel the live loop. Returns `false` if none was running.
    ///
    /// An in-flight send finishes; the loop exits at its next sleep.
    pub fn stop(&self) -> bool {
        match self.slot().take() {
            Some(handle) if handle.is_live() => {
                handle.cancel.cancel();
                info!("Loop stopped");
                true
            }
            _ => false,
        }
    }

    /// Drop any tracked loop after the session was re-established.
    pub fn reset(&self) {
        if let Some(handle) = self.slot().take() {
            handle.cancel.cancel();
            debug!("Cancelled loop from previous session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::settle;

    fn forever(cancel: CancellationToken) -> impl Future<Output = ()> + Send + 'static {
        async move { cancel.cancelled().await }
    }

    #[tokio::test]
    async fn start_then_stop() {
        let sup = LoopSupervisor::new();
        assert!(!sup.is_running());

        assert!(sup.start(forever));
        assert!(sup.is_running());
        assert!(!sup.start(forever));

        assert!(sup.stop());
        assert!(!sup.is_running());
        assert!(!sup.stop());
    }

    #[tokio::test]
    async fn finished_task_counts_as_stopped() {
        let sup = LoopSupervisor::new();
        assert!(sup.start(|_| async {}));
        settle().await;

        assert!(!sup.is_running());
        assert!(!sup.stop());
        assert!(sup.start(forever));
    }

    #[tokio::test]
    async fn reset_cancels_loop() {
        let sup = LoopSupervisor::new();
        let token = std::sync::Arc::new(Mutex::new(None));
        let seen = token.clone();
        sup.start(move |cancel| {
            *seen.lock().unwrap() = Some(cancel.clone());
            forever(cancel)
        });

        sup.reset();
        assert!(!sup.is_running());
        let cancel = token.lock().unwrap().clone().unwrap();
        assert!(cancel.is_cancelled());
    }
}
