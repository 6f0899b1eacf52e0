//! The live code-resolution search path.
//!
//! [`CodeLoader`] is the seam to the host's code-loading primitive. It offers
//! two mutation surfaces, and a loader advertises which ones it has through
//! [`CodeLoader::capabilities`]:
//!
//! - element list: open every archive up front with
//!   [`CodeLoader::make_elements`], then append them in one step
//! - legacy tables: direct access to the parallel path and archive tables,
//!   which the caller must extend in step
//!
//! [`ArchiveLoader`] is the in-process implementation. Resolution walks the
//! search path front to back, so entries that were there first win.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::SpliceError;

/// One opened code archive.
pub trait Archive: Send + Sync {
    /// Whether the archive defines the named code unit entry.
    fn contains(&self, entry: &str) -> bool;
}

/// Opens archives found on disk.
pub trait ArchiveOpener: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<Arc<dyn Archive>>;
}

/// Archive whose contents are known by entry name only.
#[derive(Debug, Clone, Default)]
pub struct ListingArchive {
    entries: HashSet<String>,
}

impl ListingArchive {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }
}

impl Archive for ListingArchive {
    fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }
}

/// Reads an archive as a listing: one entry name per line, blank lines and
/// `#` comments ignored. The archive is not otherwise validated.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingOpener;

impl ArchiveOpener for ListingOpener {
    fn open(&self, path: &Path) -> io::Result<Arc<dyn Archive>> {
        let content = fs::read_to_string(path)?;
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        Ok(Arc::new(ListingArchive::new(entries)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub element_list: bool,
    pub legacy_tables: bool,
}

impl Capabilities {
    pub const ALL: Self = Self {
        element_list: true,
        legacy_tables: true,
    };
    pub const LEGACY_ONLY: Self = Self {
        element_list: false,
        legacy_tables: true,
    };
    pub const ELEMENT_LIST_ONLY: Self = Self {
        element_list: true,
        legacy_tables: false,
    };
}

/// An archive opened and ready to join the search path.
#[derive(Clone)]
pub struct Element {
    path: PathBuf,
    archive: Arc<dyn Archive>,
}

impl Element {
    #[must_use]
    pub fn new(path: PathBuf, archive: Arc<dyn Archive>) -> Self {
        Self { path, archive }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element").field("path", &self.path).finish()
    }
}

/// Mutable view of the legacy parallel tables. Entry `i` of `paths` and
/// entry `i` of `archives` describe the same archive.
pub struct LegacyTables<'a> {
    pub paths: &'a mut Vec<PathBuf>,
    pub archives: &'a mut Vec<Arc<dyn Archive>>,
}

pub type LegacyEdit<'e> = dyn FnMut(LegacyTables<'_>) -> Result<(), SpliceError> + 'e;

pub trait CodeLoader: Send + Sync {
    /// Feature probe. Called once when the splicer is selected.
    fn capabilities(&self) -> Capabilities;

    fn open_archive(&self, path: &Path) -> Result<Arc<dyn Archive>, SpliceError>;

    fn make_elements(&self, paths: &[PathBuf]) -> Result<Vec<Element>, SpliceError> {
        paths
            .iter()
            .map(|path| Ok(Element::new(path.clone(), self.open_archive(path)?)))
            .collect()
    }

    /// Append `elements` after every existing entry.
    fn append_elements(&self, _elements: Vec<Element>) -> Result<(), SpliceError> {
        Err(SpliceError::Unsupported("modern"))
    }

    /// Run `edit` with exclusive access to the legacy tables.
    fn with_legacy_tables(&self, _edit: &mut LegacyEdit<'_>) -> Result<(), SpliceError> {
        Err(SpliceError::Unsupported("legacy"))
    }

    /// Current search path, in resolution order.
    fn search_path(&self) -> Vec<PathBuf>;

    /// First archive on the search path that defines `entry`.
    fn find_unit(&self, entry: &str) -> Option<PathBuf>;
}

#[derive(Default)]
struct SearchPath {
    paths: Vec<PathBuf>,
    archives: Vec<Arc<dyn Archive>>,
}

/// In-process loader: an ordered search path of opened archives.
pub struct ArchiveLoader {
    opener: Box<dyn ArchiveOpener>,
    capabilities: Capabilities,
    state: RwLock<SearchPath>,
}

impl ArchiveLoader {
    #[must_use]
    pub fn new(opener: impl ArchiveOpener + 'static) -> Self {
        Self {
            opener: Box::new(opener),
            capabilities: Capabilities::ALL,
            state: RwLock::new(SearchPath::default()),
        }
    }

    /// Restrict the advertised capabilities, as an older host would.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Seed the search path with already-resolved archives (the package's
    /// own code).
    #[must_use]
    pub fn with_element(self, path: impl Into<PathBuf>, archive: Arc<dyn Archive>) -> Self {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.paths.push(path.into());
            state.archives.push(archive);
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .paths
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ArchiveLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveLoader")
            .field("capabilities", &self.capabilities)
            .field("search_path", &self.search_path())
            .finish_non_exhaustive()
    }
}

impl CodeLoader for ArchiveLoader {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn open_archive(&self, path: &Path) -> Result<Arc<dyn Archive>, SpliceError> {
        self.opener
            .open(path)
            .map_err(|source| SpliceError::Rejected {
                path: path.to_path_buf(),
                source,
            })
    }

    fn append_elements(&self, elements: Vec<Element>) -> Result<(), SpliceError> {
        if !self.capabilities.element_list {
            return Err(SpliceError::Unsupported("modern"));
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for element in elements {
            state.paths.push(element.path);
            state.archives.push(element.archive);
        }
        Ok(())
    }

    fn with_legacy_tables(&self, edit: &mut LegacyEdit<'_>) -> Result<(), SpliceError> {
        if !self.capabilities.legacy_tables {
            return Err(SpliceError::Unsupported("legacy"));
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let SearchPath { paths, archives } = &mut *state;
        edit(LegacyTables { paths, archives })
    }

    fn search_path(&self) -> Vec<PathBuf> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .paths
            .clone()
    }

    fn find_unit(&self, entry: &str) -> Option<PathBuf> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .paths
            .iter()
            .zip(&state.archives)
            .find(|(_, archive)| archive.contains(entry))
            .map(|(path, _)| path.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::{
        Archive, ArchiveLoader, ArchiveOpener, Capabilities, CodeLoader, ListingArchive,
        ListingOpener,
    };
    use crate::errors::SpliceError;

    #[test]
    fn listing_opener_reads_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jar");
        fs::write(&path, "# header\ncom.example.Foo\n\n  com.example.Bar  \n").unwrap();

        let archive = ListingOpener.open(&path).unwrap();
        assert!(archive.contains("com.example.Foo"));
        assert!(archive.contains("com.example.Bar"));
        assert!(!archive.contains("# header"));
    }

    #[test]
    fn find_unit_prefers_earlier_entries() {
        let first: Arc<dyn Archive> = Arc::new(ListingArchive::new(["Shared", "OnlyFirst"]));
        let second: Arc<dyn Archive> = Arc::new(ListingArchive::new(["Shared", "OnlySecond"]));
        let loader = ArchiveLoader::new(ListingOpener)
            .with_element("/pkg/base.jar", first)
            .with_element("/pkg/extra.jar", second);

        assert_eq!(loader.find_unit("Shared"), Some(PathBuf::from("/pkg/base.jar")));
        assert_eq!(
            loader.find_unit("OnlySecond"),
            Some(PathBuf::from("/pkg/extra.jar"))
        );
        assert_eq!(loader.find_unit("Nowhere"), None);
    }

    #[test]
    fn missing_archive_is_rejected() {
        let loader = ArchiveLoader::new(ListingOpener);
        let err = loader
            .open_archive(&PathBuf::from("/definitely/not/here.jar"))
            .err()
            .unwrap();
        assert!(matches!(err, SpliceError::Rejected { .. }));
    }

    #[test]
    fn restricted_loader_refuses_element_append() {
        let loader = ArchiveLoader::new(ListingOpener).with_capabilities(Capabilities::LEGACY_ONLY);
        let err = loader.append_elements(Vec::new()).unwrap_err();
        assert!(matches!(err, SpliceError::Unsupported("modern")));
        assert!(loader.is_empty());
    }
}
