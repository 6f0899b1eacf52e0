//! Dispatch Gate: holds back the controlling thread's pending events while
//! an install runs on a worker, and keeps the loop alive meanwhile.
//!
//! Phases: `Idle -> GateOpen -> Draining -> Idle`.
//!
//! - `GateOpen`: the pending list is detached and held by the gate, then the
//!   worker is spawned. Detaching first means the worker's sentinel can only
//!   ever land in the live queue.
//! - `Draining`: a hand-rolled pump pulls and dispatches whatever arrives
//!   (timers, callbacks, the worker's own posts) until it sees this gate's
//!   sentinel or the loop quits. The sentinel is consumed, never dispatched.
//! - Back to `Idle`: the held events go back to the front of the queue.
//!
//! Events dispatched during the drain run before install has finished. That
//! is the price of keeping the loop responsive; handlers must not assume the
//! spliced code is available yet.
//!
//! There is no timeout. If the worker hangs, the pump waits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use codesplice_types::BatchReport;
use tracing::{info, warn};

use crate::dispatch::{PendingEvents, Pulled, Scheduler};
use crate::errors::{GateError, LoadError};

/// What an install worker hands back through its sentinel.
pub type Completion = Result<BatchReport, LoadError>;

pub const WORKER_THREAD_NAME: &str = "codesplice-install";

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    GateOpen,
    Draining,
}

/// How the pump loop ended.
#[derive(Debug)]
pub enum GateExit {
    /// This gate's sentinel arrived.
    Completed(Completion),
    /// The loop quit first. The worker may still be running.
    ShutDown,
}

/// Gate state owned by one slow-path install.
///
/// Dropping an open gate reattaches the held events, so no exit path (error
/// or unwind) leaves the queue detached.
pub struct DispatchGate<'s, S: Scheduler + ?Sized> {
    scheduler: &'s S,
    original_queue_snapshot: Option<PendingEvents>,
    sentinel_seen: bool,
    epoch: u64,
    phase: GatePhase,
}

impl<'s, S: Scheduler + ?Sized> DispatchGate<'s, S> {
    /// Detach the pending list. `Idle -> GateOpen`.
    pub fn open(scheduler: &'s S) -> Result<Self, GateError> {
        if !scheduler.is_current_thread() {
            return Err(GateError::WrongThread);
        }
        let snapshot = scheduler.detach_pending()?;
        let epoch = NEXT_EPOCH.fetch_add(1, Ordering::Relaxed);
        info!(epoch, held = snapshot.len(), "Install gate open");
        Ok(Self {
            scheduler,
            original_queue_snapshot: Some(snapshot),
            sentinel_seen: false,
            epoch,
            phase: GatePhase::GateOpen,
        })
    }

    /// Run `work` on a fresh worker thread. Its result is posted back as
    /// this gate's sentinel once `work` returns.
    pub fn spawn_worker<F>(&self, work: F) -> Result<(), GateError>
    where
        F: FnOnce() -> Completion + Send + 'static,
    {
        let poster = self.scheduler.sentinel_poster(self.epoch);
        thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let completion = work();
                poster.post(completion);
            })
            .map(drop)
            .map_err(GateError::Spawn)
    }

    /// Pump the queue until this gate's sentinel or shutdown.
    pub fn drain(&mut self) -> GateExit {
        self.phase = GatePhase::Draining;
        loop {
            match self.scheduler.next_event() {
                Pulled::Event(event) => self.scheduler.dispatch(event),
                Pulled::Sentinel(sentinel) if sentinel.epoch() == self.epoch => {
                    self.sentinel_seen = true;
                    return GateExit::Completed(sentinel.into_completion());
                }
                Pulled::Sentinel(sentinel) => {
                    warn!(
                        epoch = self.epoch,
                        stale = sentinel.epoch(),
                        "Ignoring sentinel from another gate"
                    );
                }
                Pulled::Closed => {
                    warn!(epoch = self.epoch, "Event loop quit while install gate was draining");
                    return GateExit::ShutDown;
                }
            }
        }
    }

    /// Reattach the held events. `-> Idle`.
    pub fn close(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.original_queue_snapshot.take() {
            info!(
                epoch = self.epoch,
                restored = snapshot.len(),
                sentinel_seen = self.sentinel_seen,
                "Install gate closed"
            );
            self.scheduler.reattach_pending(snapshot);
        }
        self.phase = GatePhase::Idle;
    }

    #[must_use]
    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn sentinel_seen(&self) -> bool {
        self.sentinel_seen
    }

    /// Number of events held back while the gate is open.
    #[must_use]
    pub fn held(&self) -> usize {
        self.original_queue_snapshot
            .as_ref()
            .map_or(0, PendingEvents::len)
    }
}

impl<S: Scheduler + ?Sized> Drop for DispatchGate<'_, S> {
    fn drop(&mut self) {
        if self.phase != GatePhase::Idle {
            self.restore();
        }
    }
}

/// Full gate cycle: open, spawn `work`, call `on_open`, drain, close, call
/// `on_close`.
///
/// `on_close` runs after the held events are back in the queue but before
/// any of them has been dispatched.
pub fn run_gated<S, F>(
    scheduler: &S,
    work: F,
    on_open: impl FnOnce(),
    on_close: impl FnOnce(),
) -> Result<GateExit, GateError>
where
    S: Scheduler + ?Sized,
    F: FnOnce() -> Completion + Send + 'static,
{
    let mut gate = DispatchGate::open(scheduler)?;
    gate.spawn_worker(work)?;
    on_open();
    let exit = gate.drain();
    gate.close();
    on_close();
    Ok(exit)
}
