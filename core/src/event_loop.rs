//! The controlling thread's cooperative event loop.
//!
//! A FIFO of slots guarded by a mutex and a condvar. Any thread may post
//! through a [`LoopHandle`]; only the thread that created the [`EventLoop`]
//! pulls and dispatches.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::mem;
use std::rc::Rc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::{debug, warn};

use crate::dispatch::{Event, PendingEvents, Pulled, Scheduler, Sentinel};
use crate::errors::{GateError, LoadError};
use crate::gate::Completion;

enum Slot {
    Event(Event),
    Sentinel(Sentinel),
}

#[derive(Default)]
struct Queue {
    slots: VecDeque<Slot>,
    quitting: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

impl Shared {
    // Queue state stays consistent across a panicking holder: every critical
    // section is a single push, pop, or swap.
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, slot: Slot) {
        self.lock().slots.push_back(slot);
        self.ready.notify_all();
    }
}

/// Cloneable, `Send` handle for posting to an [`EventLoop`] from any thread.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl LoopHandle {
    /// Queue `event`. Returns false (and drops the event) if the loop is
    /// quitting.
    pub fn post(&self, event: Event) -> bool {
        {
            let mut queue = self.shared.lock();
            if queue.quitting {
                debug!(label = event.label(), "Dropping event posted to quitting loop");
                return false;
            }
            queue.slots.push_back(Slot::Event(event));
        }
        self.shared.ready.notify_all();
        true
    }

    pub fn post_fn(
        &self,
        label: impl Into<Cow<'static, str>>,
        run: impl FnOnce() + Send + 'static,
    ) -> bool {
        self.post(Event::new(label, run))
    }

    /// Ask the loop to stop. Pending events are kept but no longer delivered.
    pub fn quit(&self) {
        self.shared.lock().quitting = true;
        self.shared.ready.notify_all();
    }

    #[must_use]
    pub fn is_quitting(&self) -> bool {
        self.shared.lock().quitting
    }
}

/// One-shot sender for a gate's completion sentinel.
///
/// Dropping it without posting (the worker unwound) posts a
/// [`GateError::WorkerLost`] completion instead, so a pump waiting on this
/// epoch always wakes up.
pub struct SentinelPoster {
    shared: Option<Arc<Shared>>,
    epoch: u64,
}

impl SentinelPoster {
    pub fn post(mut self, completion: Completion) {
        self.send(completion);
    }

    fn send(&mut self, completion: Completion) {
        if let Some(shared) = self.shared.take() {
            shared.push(Slot::Sentinel(Sentinel::new(self.epoch, completion)));
        }
    }
}

impl Drop for SentinelPoster {
    fn drop(&mut self) {
        if self.shared.is_some() {
            warn!(epoch = self.epoch, "Install worker exited without completing");
            self.send(Err(LoadError::Gate(GateError::WorkerLost)));
        }
    }
}

/// Cooperative single-threaded dispatcher, bound to the thread that
/// created it.
pub struct EventLoop {
    shared: Arc<Shared>,
    owner: ThreadId,
    _thread_bound: PhantomData<Rc<()>>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::default(),
            owner: thread::current().id(),
            _thread_bound: PhantomData,
        }
    }

    /// Number of ordinary events waiting to be dispatched.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared
            .lock()
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Event(_)))
            .count()
    }

    pub fn quit(&self) {
        self.handle().quit();
    }

    /// Dispatch events until [`LoopHandle::quit`] is called.
    pub fn run(&self) {
        loop {
            match self.next_event() {
                Pulled::Event(event) => self.dispatch(event),
                Pulled::Sentinel(sentinel) => drop_stray(&sentinel),
                Pulled::Closed => break,
            }
        }
    }

    /// Dispatch until the queue is empty, without blocking. Returns the
    /// number of events dispatched.
    pub fn run_until_idle(&self) -> usize {
        let mut dispatched = 0;
        while let Some(slot) = self.try_pop() {
            match slot {
                Slot::Event(event) => {
                    self.dispatch(event);
                    dispatched += 1;
                }
                Slot::Sentinel(sentinel) => drop_stray(&sentinel),
            }
        }
        dispatched
    }

    fn try_pop(&self) -> Option<Slot> {
        let mut queue = self.shared.lock();
        if queue.quitting {
            return None;
        }
        queue.slots.pop_front()
    }
}

fn drop_stray(sentinel: &Sentinel) {
    warn!(epoch = sentinel.epoch(), "Dropping stray gate sentinel");
}

impl Scheduler for EventLoop {
    fn is_current_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn detach_pending(&self) -> Result<PendingEvents, GateError> {
        let mut queue = self.shared.lock();
        if queue.quitting {
            return Err(GateError::QueueUnavailable);
        }
        let mut events = VecDeque::with_capacity(queue.slots.len());
        for slot in mem::take(&mut queue.slots) {
            match slot {
                Slot::Event(event) => events.push_back(event),
                Slot::Sentinel(sentinel) => drop_stray(&sentinel),
            }
        }
        Ok(PendingEvents::new(events))
    }

    fn reattach_pending(&self, pending: PendingEvents) {
        {
            let mut queue = self.shared.lock();
            let arrived = mem::take(&mut queue.slots);
            queue.slots = pending
                .into_inner()
                .into_iter()
                .map(Slot::Event)
                .chain(arrived)
                .collect();
        }
        self.shared.ready.notify_all();
    }

    fn next_event(&self) -> Pulled {
        let mut queue = self.shared.lock();
        loop {
            if queue.quitting {
                return Pulled::Closed;
            }
            match queue.slots.pop_front() {
                Some(Slot::Event(event)) => return Pulled::Event(event),
                Some(Slot::Sentinel(sentinel)) => return Pulled::Sentinel(sentinel),
                None => {
                    queue = self
                        .shared
                        .ready
                        .wait(queue)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn dispatch(&self, event: Event) {
        debug!(label = event.label(), "Dispatching event");
        event.dispatch();
    }

    fn sentinel_poster(&self, epoch: u64) -> SentinelPoster {
        SentinelPoster {
            shared: Some(Arc::clone(&self.shared)),
            epoch,
        }
    }
}
