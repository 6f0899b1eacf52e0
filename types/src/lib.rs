//! Core domain types for codesplice.
//!
//! This crate contains pure domain types with no IO, no threads, and minimal
//! dependencies. Everything here can be used from any layer of the loader.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod outcome;
pub use outcome::{BatchReport, ItemFailure, ItemOutcome, ItemReport, LoadOutcome};

use std::collections::HashSet;
use std::fmt;
use std::slice;

use thiserror::Error;

// ============================================================================
// Code units
// ============================================================================

/// Name of one code archive, unique within a load request.
///
/// The name doubles as the file name inside the bundle and inside the private
/// directory, so it must be a single plain path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeUnit(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitNameError {
    #[error("code unit name must not be empty")]
    Empty,
    #[error("code unit name must be a plain file name (got {0:?})")]
    NotAFileName(String),
}

impl CodeUnit {
    pub fn new(name: impl Into<String>) -> Result<Self, UnitNameError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(UnitNameError::Empty);
        }
        if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(UnitNameError::NotAFileName(name));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name ends in `.{extension}`. Case-sensitive.
    #[must_use]
    pub fn has_extension(&self, extension: &str) -> bool {
        let Some((stem, ext)) = self.0.rsplit_once('.') else {
            return false;
        };
        !stem.is_empty() && ext == extension
    }
}

impl fmt::Display for CodeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CodeUnit {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CodeUnit {
    type Error = UnitNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for CodeUnit {
    type Error = UnitNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CodeUnit> for String {
    fn from(value: CodeUnit) -> Self {
        value.0
    }
}

// ============================================================================
// Unit lists
// ============================================================================

/// Ordered, duplicate-free list of code units for one load attempt.
///
/// Invariant: no name appears twice. Order is the order the caller supplied,
/// which is also the copy order and the splice order. An empty list is valid
/// and loads nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnits(Vec<CodeUnit>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitListError {
    #[error("code unit {0} appears more than once")]
    Duplicate(CodeUnit),
    #[error(transparent)]
    InvalidName(#[from] UnitNameError),
}

impl CodeUnits {
    pub fn new(units: Vec<CodeUnit>) -> Result<Self, UnitListError> {
        let mut seen = HashSet::with_capacity(units.len());
        for unit in &units {
            if !seen.insert(unit.as_str()) {
                return Err(UnitListError::Duplicate(unit.clone()));
            }
        }
        Ok(Self(units))
    }

    /// Validate and collect raw names.
    pub fn parse<I, S>(names: I) -> Result<Self, UnitListError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let units = names
            .into_iter()
            .map(CodeUnit::new)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(units)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[CodeUnit] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, CodeUnit> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a CodeUnits {
    type Item = &'a CodeUnit;
    type IntoIter = slice::Iter<'a, CodeUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
