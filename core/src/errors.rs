//! Fatal error types.
//!
//! Everything here unwinds out of the entry points. Per-item copy failures
//! are not errors; they travel in a `BatchReport`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use codesplice_types::UnitListError;

/// The gate could not be opened, or lost its worker.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("install must run on the event loop's controlling thread")]
    WrongThread,
    #[error("event loop has shut down; pending events cannot be detached")]
    QueueUnavailable,
    #[error("failed to spawn install worker thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("install worker terminated without reporting completion")]
    WorkerLost,
}

/// The live search path could not be extended.
#[derive(Debug, Error)]
pub enum SpliceError {
    #[error("loader rejected archive {}: {source}", path.display())]
    Rejected {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot resolve absolute path for {}: {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("legacy loader tables are out of step ({paths} paths, {archives} archives)")]
    Inconsistent { paths: usize, archives: usize },
    #[error("loader does not support the {0} splice strategy")]
    Unsupported(&'static str),
}

/// Top-level error of the install entry points.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Request(#[from] UnitListError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Splice(#[from] SpliceError),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    pub(crate) fn io(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Io { context, source }
    }
}
