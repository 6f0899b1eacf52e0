//! Staleness Detector: decides whether the private copies must be redone.
//!
//! [`InstallSnapshot::gather`] is the boundary that reads timestamps from disk;
//! [`InstallSnapshot::staleness`] is a pure decision over that snapshot.
//! Installs are all-or-nothing: one stale archive means every archive is
//! copied again.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use codesplice_types::{CodeUnit, CodeUnits};
use codesplice_utils::modified_time;

/// Timestamps relevant to one install decision.
#[derive(Debug, Clone)]
pub struct InstallSnapshot {
    package: SystemTime,
    private_dir: SystemTime,
    archives: Vec<(CodeUnit, Option<SystemTime>)>,
}

/// Why an install is needed, or that it is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    /// The package changed after the private directory was last written.
    PackageUpgraded,
    /// A required archive is absent (clean install, or a crash mid-copy).
    Missing(CodeUnit),
    /// A required archive predates the package.
    Outdated(CodeUnit),
}

impl Staleness {
    #[must_use]
    pub fn needs_install(&self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

impl InstallSnapshot {
    /// `private_dir` of `None` means the directory does not exist yet, which
    /// is older than any package.
    #[must_use]
    pub fn new(
        package: SystemTime,
        private_dir: Option<SystemTime>,
        archives: Vec<(CodeUnit, Option<SystemTime>)>,
    ) -> Self {
        Self {
            package,
            private_dir: private_dir.unwrap_or(SystemTime::UNIX_EPOCH),
            archives,
        }
    }

    /// Probe `dir` and every `dir/<unit>` on disk.
    pub fn gather(package: SystemTime, dir: &Path, units: &CodeUnits) -> io::Result<Self> {
        let private_dir = modified_time(dir)?;
        let archives = units
            .iter()
            .map(|unit| Ok((unit.clone(), modified_time(&dir.join(unit.as_str()))?)))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self::new(package, private_dir, archives))
    }

    /// Checks in order: package vs directory, then each archive in request
    /// order. The first failing check decides.
    #[must_use]
    pub fn staleness(&self) -> Staleness {
        if self.package > self.private_dir {
            return Staleness::PackageUpgraded;
        }
        for (unit, modified) in &self.archives {
            match modified {
                None => return Staleness::Missing(unit.clone()),
                Some(modified) if *modified < self.package => {
                    return Staleness::Outdated(unit.clone());
                }
                Some(_) => {}
            }
        }
        Staleness::Fresh
    }

    #[must_use]
    pub fn needs_install(&self) -> bool {
        self.staleness().needs_install()
    }
}
