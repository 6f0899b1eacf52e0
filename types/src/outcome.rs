//! Results of an install attempt.
//!
//! Per-item copy failures are data, not errors: they are collected into a
//! [`BatchReport`] so the observer and the caller can see exactly which
//! archives made it into the private directory.

use std::fmt;
use std::io;

use crate::CodeUnit;

/// Why a single archive failed to materialize.
///
/// Holds the error kind and rendered message rather than the `io::Error`
/// itself so reports can be cloned and handed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    kind: io::ErrorKind,
    message: String,
}

impl ItemFailure {
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&io::Error> for ItemFailure {
    fn from(err: &io::Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<io::Error> for ItemFailure {
    fn from(err: io::Error) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The archive was copied in full and persisted under its final name.
    Copied { bytes: u64 },
    /// The copy failed; the destination is absent and the next launch will
    /// see the install as stale.
    Failed(ItemFailure),
}

impl ItemOutcome {
    #[must_use]
    pub fn is_copied(&self) -> bool {
        matches!(self, Self::Copied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub unit: CodeUnit,
    pub outcome: ItemOutcome,
}

/// Per-item outcomes of one materialize pass, in copy order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    items: Vec<ItemReport>,
}

impl BatchReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: CodeUnit, outcome: ItemOutcome) {
        self.items.push(ItemReport { unit, outcome });
    }

    #[must_use]
    pub fn items(&self) -> &[ItemReport] {
        &self.items
    }

    #[must_use]
    pub fn copied_count(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_copied()).count()
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.items
            .iter()
            .map(|i| match i.outcome {
                ItemOutcome::Copied { bytes } => bytes,
                ItemOutcome::Failed(_) => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&CodeUnit, &ItemFailure)> {
        self.items.iter().filter_map(|i| match &i.outcome {
            ItemOutcome::Failed(failure) => Some((&i.unit, failure)),
            ItemOutcome::Copied { .. } => None,
        })
    }

    /// True when every item was copied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|i| i.outcome.is_copied())
    }
}

/// How an entry point finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Private copies were fresh; the classpath was spliced synchronously
    /// and no worker ran.
    AlreadyInstalled,
    /// Archives were copied on the worker and then spliced.
    Installed(BatchReport),
    /// The event loop was told to quit while the gate was draining. The
    /// splice may not have happened; the process is going away.
    ShutDown,
}
