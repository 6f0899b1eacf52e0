//! Install progress callbacks.

use codesplice_types::{BatchReport, CodeUnit, ItemOutcome};

use crate::event_loop::LoopHandle;

/// Receives install progress. Every method defaults to a no-op.
///
/// `on_install_started` and `on_install_ended` run on the controlling
/// thread. Item and batch callbacks run on the install worker; use the
/// handle to get work back onto the controlling thread.
pub trait InstallObserver: Send + Sync {
    /// The gate is open and the worker is running. Registering an observer
    /// replaces the default notice.
    fn on_install_started(&self, _handle: &LoopHandle) {}

    /// The gate has closed and held events are queued again.
    fn on_install_ended(&self, _handle: &LoopHandle) {}

    fn on_item_started(&self, _unit: &CodeUnit, _handle: &LoopHandle) {}

    fn on_item_ended(&self, _unit: &CodeUnit, _outcome: &ItemOutcome, _handle: &LoopHandle) {}

    /// Every item has been attempted; the splice is next.
    fn on_batch_finished(&self, _report: &BatchReport, _handle: &LoopHandle) {}
}
