//! Gated install-and-splice for code split across several archives.
//!
//! An application whose code ships as several archives must copy them into
//! private storage and append them to its live search path before any
//! application logic runs. Copying can be slow, and the controlling thread
//! must not freeze while it happens. This crate:
//!
//! - decides whether the private copies are stale (`staleness`)
//! - copies archives out of the read-only bundle (`materializer`)
//! - appends them to the loader's search path (`splicer`, `loader`)
//! - holds back the controlling thread's pending events while a worker does
//!   the above, pumping the queue by hand until the worker's sentinel
//!   arrives (`gate`, `event_loop`)

mod bundle;
mod context;
mod dispatch;
pub mod errors;
mod event_loop;
pub mod gate;
mod install;
pub mod loader;
mod materializer;
mod observer;
pub mod splicer;
pub mod staleness;

pub use bundle::{BundleSource, DirBundle};
pub use context::{FsContext, HostContext};
pub use dispatch::{Event, PendingEvents, Pulled, Scheduler, Sentinel};
pub use errors::{GateError, LoadError, SpliceError};
pub use event_loop::{EventLoop, LoopHandle, SentinelPoster};
pub use gate::{Completion, DispatchGate, GateExit, GatePhase, run_gated};
pub use install::{Installer, LoadRequest, install_all_from_bundle, install_and_load};
pub use loader::{ArchiveLoader, Capabilities, CodeLoader, ListingOpener};
pub use materializer::{ItemEvent, Materializer};
pub use observer::InstallObserver;
pub use splicer::{ClasspathSplicer, select_splicer};
pub use staleness::{InstallSnapshot, Staleness};

pub use codesplice_config::{LoaderConfig, SplicePreference};
pub use codesplice_types::{
    BatchReport, CodeUnit, CodeUnits, ItemFailure, ItemOutcome, LoadOutcome,
};
