//! Cleanup-on-interrupt coordination
//!
//! Resources created for a measurement run (a deployed service, a temporary
//! route) must be torn down even when the operator interrupts the run
//! mid-tier. Owners register an async cleanup with the [`CleanupRegistry`]
//! and either run it themselves on normal completion or let
//! [`CleanupRegistry::run_until_interrupted`] cancel the run and execute
//! everything still registered. Each cleanup runs at most once.

use futures::future::BoxFuture;
use log::{error, info, warn};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

type CleanupFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

/// Identifier returned by [`CleanupRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CleanupId(u64);

/// How a guarded run ended
#[derive(Debug)]
pub enum RunOutcome<T> {
    Completed(T),
    /// The interrupt fired first. The run was cancelled, then every pending
    /// cleanup ran.
    Interrupted(Vec<CleanupOutcome>),
}

/// Result of running one registered cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub name: String,
    pub result: Result<(), String>,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    pending: Vec<(CleanupId, String, CleanupFn)>,
}

/// Registry of pending cleanups shared between the run loop and the
/// interrupt handler
#[derive(Clone, Default)]
pub struct CleanupRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CleanupRegistry")
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cleanup to run on interrupt or on explicit request
    pub fn register<F, Fut>(&self, name: impl Into<String>, cleanup: F) -> CleanupId
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let mut state = self.state.lock();
        let id = CleanupId(state.next_id);
        state.next_id += 1;
        let boxed: CleanupFn = Box::new(move || Box::pin(cleanup()));
        state.pending.push((id, name.into(), boxed));
        id
    }

    /// Run one cleanup now. Returns `None` when it already ran (for example
    /// because an interrupt got there first).
    pub async fn run(&self, id: CleanupId) -> Option<CleanupOutcome> {
        let (name, cleanup) = self.take(id)?;
        Some(execute(name, cleanup).await)
    }

    /// Run every pending cleanup, most recently registered first
    pub async fn run_all(&self) -> Vec<CleanupOutcome> {
        let pending = {
            let mut state = self.state.lock();
            std::mem::take(&mut state.pending)
        };

        let mut outcomes = Vec::with_capacity(pending.len());
        for (_, name, cleanup) in pending.into_iter().rev() {
            outcomes.push(execute(name, cleanup).await);
        }
        outcomes
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Drive `work` until it finishes or Ctrl-C arrives. On interrupt the
    /// work is dropped first, so nothing is still using the resources when
    /// their cleanups run.
    pub async fn run_until_interrupted<F>(&self, work: F) -> std::io::Result<RunOutcome<F::Output>>
    where
        F: Future,
    {
        self.run_until(work, tokio::signal::ctrl_c()).await
    }

    /// [`run_until_interrupted`](Self::run_until_interrupted) with a custom
    /// interrupt signal
    pub async fn run_until<F, I>(&self, work: F, interrupt: I) -> std::io::Result<RunOutcome<F::Output>>
    where
        F: Future,
        I: Future<Output = std::io::Result<()>>,
    {
        let signal = tokio::select! {
            output = work => return Ok(RunOutcome::Completed(output)),
            signal = interrupt => signal,
        };
        signal?;

        warn!(
            "Interrupt received, run cancelled; running {} cleanups",
            self.pending_count()
        );
        Ok(RunOutcome::Interrupted(self.run_all().await))
    }

    fn take(&self, id: CleanupId) -> Option<(String, CleanupFn)> {
        let mut state = self.state.lock();
        let index = state.pending.iter().position(|(pending, _, _)| *pending == id)?;
        let (_, name, cleanup) = state.pending.remove(index);
        Some((name, cleanup))
    }
}

async fn execute(name: String, cleanup: CleanupFn) -> CleanupOutcome {
    let result = cleanup().await;
    match &result {
        Ok(()) => info!("Cleanup '{}' completed", name),
        Err(e) => error!("Cleanup '{}' failed: {}", name, e),
    }
    CleanupOutcome { name, result }
}
