//! Archive Materializer: copies bundled archives into the private directory.
//!
//! Best-effort: a failed item is logged and recorded in the report, and the
//! loop moves on to the next one. The destination directory must already
//! exist.

use std::path::Path;

use codesplice_types::{BatchReport, CodeUnit, CodeUnits, ItemFailure, ItemOutcome};
use codesplice_utils::{CopyOptions, copy_to_file};
use tracing::{debug, warn};

use crate::bundle::BundleSource;

/// Per-item progress, in the order it happens.
#[derive(Debug, Clone, Copy)]
pub enum ItemEvent<'a> {
    Started(&'a CodeUnit),
    Ended(&'a CodeUnit, &'a ItemOutcome),
}

pub struct Materializer<'a> {
    source: &'a dyn BundleSource,
    destination: &'a Path,
    options: CopyOptions,
}

impl<'a> Materializer<'a> {
    #[must_use]
    pub fn new(source: &'a dyn BundleSource, destination: &'a Path, options: CopyOptions) -> Self {
        Self {
            source,
            destination,
            options,
        }
    }

    /// Copy every unit in order, reporting start and end of each.
    pub fn materialize(
        &self,
        units: &CodeUnits,
        mut on_item: impl FnMut(ItemEvent<'_>),
    ) -> BatchReport {
        let mut report = BatchReport::new();
        for unit in units {
            on_item(ItemEvent::Started(unit));
            let outcome = self.copy_one(unit);
            on_item(ItemEvent::Ended(unit, &outcome));
            report.push(unit.clone(), outcome);
        }
        report
    }

    fn copy_one(&self, unit: &CodeUnit) -> ItemOutcome {
        let dest = self.destination.join(unit.as_str());
        debug!(unit = %unit, dest = %dest.display(), "Copying archive");

        let result = self
            .source
            .open(unit.as_str())
            .and_then(|reader| copy_to_file(reader, &dest, self.options));
        match result {
            Ok(bytes) => ItemOutcome::Copied { bytes },
            Err(err) => {
                warn!(unit = %unit, "Failed to copy archive, skipping: {err}");
                ItemOutcome::Failed(ItemFailure::from(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;

    use codesplice_types::{CodeUnits, ItemOutcome};
    use codesplice_utils::{CopyOptions, FileSyncPolicy, ParentDirSyncPolicy};

    use super::{ItemEvent, Materializer};
    use crate::bundle::DirBundle;

    fn opts() -> CopyOptions {
        CopyOptions {
            buffer_bytes: 3,
            file_sync: FileSyncPolicy::SkipSync,
            parent_dir_sync: ParentDirSyncPolicy::SkipSync,
            ..CopyOptions::default()
        }
    }

    #[test]
    fn copies_in_order_and_reports_progress() {
        let assets = tempfile::tempdir().unwrap();
        let private = tempfile::tempdir().unwrap();
        fs::write(assets.path().join("a.jar"), b"alpha").unwrap();
        fs::write(assets.path().join("b.jar"), b"beta").unwrap();
        let bundle = DirBundle::new(assets.path());
        let units = CodeUnits::parse(["a.jar", "b.jar"]).unwrap();

        let mut events = Vec::new();
        let report = Materializer::new(&bundle, private.path(), opts()).materialize(
            &units,
            |event| match event {
                ItemEvent::Started(unit) => events.push(format!("start {unit}")),
                ItemEvent::Ended(unit, _) => events.push(format!("end {unit}")),
            },
        );

        assert_eq!(events, ["start a.jar", "end a.jar", "start b.jar", "end b.jar"]);
        assert!(report.is_complete());
        assert_eq!(report.total_bytes(), 9);
        assert_eq!(fs::read(private.path().join("a.jar")).unwrap(), b"alpha");
        assert_eq!(fs::read(private.path().join("b.jar")).unwrap(), b"beta");
    }

    #[test]
    fn failed_item_does_not_abort_batch() {
        let assets = tempfile::tempdir().unwrap();
        let private = tempfile::tempdir().unwrap();
        fs::write(assets.path().join("a.jar"), b"alpha").unwrap();
        fs::write(assets.path().join("c.jar"), b"gamma").unwrap();
        let bundle = DirBundle::new(assets.path());
        let units = CodeUnits::parse(["a.jar", "missing.jar", "c.jar"]).unwrap();

        let mut ended = Vec::new();
        let report = Materializer::new(&bundle, private.path(), opts()).materialize(
            &units,
            |event| {
                if let ItemEvent::Ended(unit, outcome) = event {
                    ended.push((unit.to_string(), outcome.is_copied()));
                }
            },
        );

        assert_eq!(
            ended,
            [
                ("a.jar".to_string(), true),
                ("missing.jar".to_string(), false),
                ("c.jar".to_string(), true),
            ]
        );
        assert_eq!(report.copied_count(), 2);
        let failure = &report.items()[1].outcome;
        assert!(matches!(
            failure,
            ItemOutcome::Failed(f) if f.kind() == io::ErrorKind::NotFound
        ));
        assert!(!private.path().join("missing.jar").exists());
        assert!(private.path().join("c.jar").exists());
    }
}
