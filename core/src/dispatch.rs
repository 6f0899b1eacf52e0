//! Values that flow through the controlling thread's queue, and the
//! [`Scheduler`] seam the dispatch gate consumes.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;

use crate::errors::GateError;
use crate::event_loop::{LoopHandle, SentinelPoster};
use crate::gate::Completion;

/// An ordinary unit of work for the controlling thread.
pub struct Event {
    label: Cow<'static, str>,
    run: Box<dyn FnOnce() + Send>,
}

impl Event {
    pub fn new(label: impl Into<Cow<'static, str>>, run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            run: Box::new(run),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the event on the current thread.
    pub fn dispatch(self) {
        (self.run)();
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Completion marker posted by an install worker. Only the gate's pump ever
/// receives one; ordinary dispatch drops it.
pub struct Sentinel {
    epoch: u64,
    completion: Completion,
}

impl Sentinel {
    pub(crate) fn new(epoch: u64, completion: Completion) -> Self {
        Self { epoch, completion }
    }

    /// Identifies the gate that spawned the worker.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn into_completion(self) -> Completion {
        self.completion
    }
}

impl fmt::Debug for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sentinel")
            .field("epoch", &self.epoch)
            .field("ok", &self.completion.is_ok())
            .finish()
    }
}

/// Result of pulling the next slot off the queue.
#[derive(Debug)]
pub enum Pulled {
    Event(Event),
    Sentinel(Sentinel),
    /// The loop is quitting; nothing more will be delivered.
    Closed,
}

/// Events detached from the queue while a gate is open.
#[derive(Debug, Default)]
pub struct PendingEvents {
    events: VecDeque<Event>,
}

impl PendingEvents {
    pub(crate) fn new(events: VecDeque<Event>) -> Self {
        Self { events }
    }

    pub(crate) fn into_inner(self) -> VecDeque<Event> {
        self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// What the dispatch gate needs from a cooperative dispatcher.
///
/// Detach and reattach are only ever called on the controlling thread.
/// Sentinels may be posted from any thread.
pub trait Scheduler {
    /// Whether the caller is on the controlling thread.
    fn is_current_thread(&self) -> bool;

    /// Cross-thread posting handle.
    fn handle(&self) -> LoopHandle;

    /// Take every pending event, leaving the queue empty.
    fn detach_pending(&self) -> Result<PendingEvents, GateError>;

    /// Put `pending` back at the front of the queue, ahead of anything
    /// queued since the detach.
    fn reattach_pending(&self, pending: PendingEvents);

    /// Block until the next slot is available or the loop quits.
    fn next_event(&self) -> Pulled;

    fn dispatch(&self, event: Event);

    /// One-shot poster for the sentinel that ends the gate `epoch`.
    fn sentinel_poster(&self, epoch: u64) -> SentinelPoster;
}
