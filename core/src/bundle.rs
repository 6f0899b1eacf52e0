//! Read-only source of bundled code archives.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// The read-only asset collection shipped with the package.
pub trait BundleSource: Send + Sync {
    /// Names of every top-level entry in the bundle.
    fn list(&self) -> io::Result<Vec<String>>;

    /// Open one entry for streaming.
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Bundle backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirBundle {
    root: PathBuf,
}

impl DirBundle {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BundleSource for DirBundle {
    fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let file = File::open(self.root.join(name))?;
        Ok(Box::new(io::BufReader::new(file)))
    }
}
