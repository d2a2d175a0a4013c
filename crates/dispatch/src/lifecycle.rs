//! In-flight invocation tracking and pause/shutdown gating.

use std::sync::{Arc, Mutex};

use {
    tokio::sync::Notify,
    tracing::{debug, info},
};

#[derive(Debug, Default)]
struct State {
    running: usize,
    paused: bool,
    shutting_down: bool,
}

/// Why admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    Paused,
    ShuttingDown,
}

/// Outcome of the admission check.
pub enum Admission {
    /// Admitted: hold the guard for the lifetime of the plugin body.
    Admitted(RunningGuard),
    Refused(Refusal),
}

/// Counts running plugin bodies and gates new ones behind the paused and
/// shutting-down flags, all under one critical section.
pub struct Lifecycle {
    state: Mutex<State>,
    drained: Notify,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            drained: Notify::new(),
        }
    }

    /// Admission check, performed once per candidate invocation immediately
    /// before scheduling. The reserved abort command is always admitted.
    pub fn admit(self: &Arc<Self>, abort: bool) -> Admission {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !abort {
            if state.shutting_down {
                return Admission::Refused(Refusal::ShuttingDown);
            }
            if state.paused {
                return Admission::Refused(Refusal::Paused);
            }
        }
        state.running += 1;
        Admission::Admitted(RunningGuard {
            lifecycle: Arc::clone(self),
        })
    }

    /// Reversible refusal of new work. No drain implied.
    pub fn pause(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.paused = true;
        info!("dispatch paused");
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.paused = false;
        info!("dispatch resumed");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .shutting_down
    }

    pub fn running(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).running
    }

    /// One-way transition: refuse new non-abort work, then wait for every
    /// in-flight plugin body to finish.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.shutting_down = true;
            info!(in_flight = state.running, "shutting down, draining plugin tasks");
        }
        loop {
            let notified = self.drained.notified();
            if self.state.lock().unwrap_or_else(|e| e.into_inner()).running == 0 {
                break;
            }
            notified.await;
        }
        info!("all plugin tasks drained");
    }
}

/// Decrements the running count when dropped, so a plugin body that fails
/// or panics still releases its slot.
pub struct RunningGuard {
    lifecycle: Arc<Lifecycle>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut state = self
            .lifecycle
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        state.running = state.running.saturating_sub(1);
        debug!(running = state.running, "plugin task finished");
        if state.running == 0 {
            drop(state);
            self.lifecycle.drained.notify_waiters();
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration};

    #[tokio::test]
    async fn admits_while_running() {
        let lifecycle = Arc::new(Lifecycle::new());
        assert!(matches!(lifecycle.admit(false), Admission::Admitted(_)));
    }

    #[tokio::test]
    async fn pause_refuses_and_resume_readmits() {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.pause();
        assert!(matches!(
            lifecycle.admit(false),
            Admission::Refused(Refusal::Paused)
        ));
        // Abort bypasses the pause.
        assert!(matches!(lifecycle.admit(true), Admission::Admitted(_)));
        lifecycle.resume();
        assert!(matches!(lifecycle.admit(false), Admission::Admitted(_)));
    }

    #[tokio::test]
    async fn shutdown_waits_for_drain() {
        let lifecycle = Arc::new(Lifecycle::new());
        let Admission::Admitted(guard) = lifecycle.admit(false) else {
            panic!("expected admission");
        };

        let lc = Arc::clone(&lifecycle);
        let drain = tokio::spawn(async move { lc.shutdown().await });
        tokio::task::yield_now().await;
        assert!(!drain.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), drain)
            .await
            .expect("drain should complete once the guard drops")
            .expect("drain task");
        assert_eq!(lifecycle.running(), 0);
    }

    #[tokio::test]
    async fn shutdown_refuses_non_abort() {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.shutdown().await;
        assert!(matches!(
            lifecycle.admit(false),
            Admission::Refused(Refusal::ShuttingDown)
        ));
        assert!(matches!(lifecycle.admit(true), Admission::Admitted(_)));
    }
}
