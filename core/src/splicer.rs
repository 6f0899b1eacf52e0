//! Classpath Splicer: appends installed archives to the live search path.
//!
//! Two strategies, one per [`CodeLoader`] mutation surface. The loader is
//! probed once by [`select_splicer`]. Both strategies open every archive
//! before touching the search path, so a rejected archive leaves the loader
//! exactly as it was. New entries always go after existing ones.

use std::path::{self, Path, PathBuf};
use std::sync::Arc;

use codesplice_config::SplicePreference;
use codesplice_types::CodeUnits;
use tracing::info;

use crate::errors::SpliceError;
use crate::loader::{Archive, CodeLoader, LegacyTables};

pub trait ClasspathSplicer: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    fn splice(&self, loader: &dyn CodeLoader, paths: &[PathBuf]) -> Result<(), SpliceError>;
}

/// Modern strategy: build elements, append them in one step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementListSplicer;

impl ClasspathSplicer for ElementListSplicer {
    fn name(&self) -> &'static str {
        "modern"
    }

    fn splice(&self, loader: &dyn CodeLoader, paths: &[PathBuf]) -> Result<(), SpliceError> {
        let elements = loader.make_elements(paths)?;
        loader.append_elements(elements)
    }
}

/// Legacy strategy: extend the parallel path and archive tables together.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyTableSplicer;

impl ClasspathSplicer for LegacyTableSplicer {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn splice(&self, loader: &dyn CodeLoader, paths: &[PathBuf]) -> Result<(), SpliceError> {
        let opened: Vec<Arc<dyn Archive>> = paths
            .iter()
            .map(|path| loader.open_archive(path))
            .collect::<Result<_, _>>()?;

        let mut pending = Some(opened);
        loader.with_legacy_tables(&mut |tables: LegacyTables<'_>| {
            if tables.paths.len() != tables.archives.len() {
                return Err(SpliceError::Inconsistent {
                    paths: tables.paths.len(),
                    archives: tables.archives.len(),
                });
            }
            let opened = pending.take().unwrap_or_default();
            tables.paths.extend(paths.iter().cloned());
            tables.archives.extend(opened);
            Ok(())
        })
    }
}

/// Pick the splice strategy for `loader`.
///
/// `Auto` prefers the element list and falls back to the legacy tables.
pub fn select_splicer(
    loader: &dyn CodeLoader,
    preference: SplicePreference,
) -> Result<Box<dyn ClasspathSplicer>, SpliceError> {
    let caps = loader.capabilities();
    match preference {
        SplicePreference::Modern if caps.element_list => Ok(Box::new(ElementListSplicer)),
        SplicePreference::Modern => Err(SpliceError::Unsupported("modern")),
        SplicePreference::Legacy if caps.legacy_tables => Ok(Box::new(LegacyTableSplicer)),
        SplicePreference::Legacy => Err(SpliceError::Unsupported("legacy")),
        SplicePreference::Auto if caps.element_list => Ok(Box::new(ElementListSplicer)),
        SplicePreference::Auto if caps.legacy_tables => Ok(Box::new(LegacyTableSplicer)),
        SplicePreference::Auto => Err(SpliceError::Unsupported("any")),
    }
}

/// Absolute path of every unit under `dir`, in unit order.
pub fn archive_paths(dir: &Path, units: &CodeUnits) -> Result<Vec<PathBuf>, SpliceError> {
    let dir = path::absolute(dir).map_err(|source| SpliceError::Path {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(units.iter().map(|unit| dir.join(unit.as_str())).collect())
}

/// Splice every unit under `dir` into `loader`.
pub fn splice_units(
    splicer: &dyn ClasspathSplicer,
    loader: &dyn CodeLoader,
    dir: &Path,
    units: &CodeUnits,
) -> Result<(), SpliceError> {
    let paths = archive_paths(dir, units)?;
    splicer.splice(loader, &paths)?;
    info!(
        strategy = splicer.name(),
        count = paths.len(),
        "Spliced archives into search path"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use codesplice_config::SplicePreference;
    use codesplice_types::CodeUnits;

    use super::{select_splicer, splice_units};
    use crate::errors::SpliceError;
    use crate::loader::{
        Archive, ArchiveLoader, Capabilities, CodeLoader, LegacyTables, ListingArchive,
        ListingOpener,
    };

    fn base_loader(caps: Capabilities) -> ArchiveLoader {
        let base: Arc<dyn Archive> = Arc::new(ListingArchive::new(["app.Main", "app.Shared"]));
        ArchiveLoader::new(ListingOpener)
            .with_capabilities(caps)
            .with_element("/pkg/base.jar", base)
    }

    fn write_archives(dir: &Path) -> CodeUnits {
        fs::write(dir.join("a.jar"), "feature.A\napp.Shared\n").unwrap();
        fs::write(dir.join("b.jar"), "feature.B\n").unwrap();
        CodeUnits::parse(["a.jar", "b.jar"]).unwrap()
    }

    #[test]
    fn auto_prefers_element_list() {
        let loader = base_loader(Capabilities::ALL);
        let splicer = select_splicer(&loader, SplicePreference::Auto).unwrap();
        assert_eq!(splicer.name(), "modern");

        let loader = base_loader(Capabilities::LEGACY_ONLY);
        let splicer = select_splicer(&loader, SplicePreference::Auto).unwrap();
        assert_eq!(splicer.name(), "legacy");
    }

    #[test]
    fn forced_strategy_must_be_supported() {
        let loader = base_loader(Capabilities::ELEMENT_LIST_ONLY);
        let err = select_splicer(&loader, SplicePreference::Legacy).err().unwrap();
        assert!(matches!(err, SpliceError::Unsupported("legacy")));
    }

    #[test]
    fn both_strategies_append_after_existing_entries() {
        for caps in [Capabilities::ELEMENT_LIST_ONLY, Capabilities::LEGACY_ONLY] {
            let dir = tempfile::tempdir().unwrap();
            let units = write_archives(dir.path());
            let loader = base_loader(caps);
            let splicer = select_splicer(&loader, SplicePreference::Auto).unwrap();

            splice_units(splicer.as_ref(), &loader, dir.path(), &units).unwrap();

            let path = loader.search_path();
            assert_eq!(path.len(), 3, "{}", splicer.name());
            assert_eq!(path[0], PathBuf::from("/pkg/base.jar"));
            assert!(path[1].ends_with("a.jar"));
            assert!(path[2].ends_with("b.jar"));
            assert!(path[1].is_absolute());

            // Original definition wins on collision.
            assert_eq!(loader.find_unit("app.Shared"), Some(path[0].clone()));
            assert_eq!(loader.find_unit("feature.B"), Some(path[2].clone()));
        }
    }

    #[test]
    fn rejected_archive_leaves_search_path_untouched() {
        for caps in [Capabilities::ELEMENT_LIST_ONLY, Capabilities::LEGACY_ONLY] {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("a.jar"), "feature.A\n").unwrap();
            let units = CodeUnits::parse(["a.jar", "gone.jar"]).unwrap();
            let loader = base_loader(caps);
            let splicer = select_splicer(&loader, SplicePreference::Auto).unwrap();

            let err = splice_units(splicer.as_ref(), &loader, dir.path(), &units).unwrap_err();

            assert!(matches!(
                err,
                SpliceError::Rejected { ref path, .. } if path.ends_with("gone.jar")
            ));
            assert_eq!(loader.len(), 1);
        }
    }

    #[test]
    fn legacy_detects_out_of_step_tables() {
        let dir = tempfile::tempdir().unwrap();
        let units = write_archives(dir.path());
        let loader = base_loader(Capabilities::LEGACY_ONLY);
        loader
            .with_legacy_tables(&mut |tables: LegacyTables<'_>| {
                tables.paths.push(PathBuf::from("/pkg/orphan.jar"));
                Ok(())
            })
            .unwrap();
        let splicer = select_splicer(&loader, SplicePreference::Legacy).unwrap();

        let err = splice_units(splicer.as_ref(), &loader, dir.path(), &units).unwrap_err();

        assert!(matches!(
            err,
            SpliceError::Inconsistent {
                paths: 2,
                archives: 1
            }
        ));
    }
}
