//! Boundary: what the loader needs from the host platform.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::info;

use crate::bundle::{BundleSource, DirBundle};
use crate::loader::CodeLoader;

pub trait HostContext {
    /// Read-only bundled archives.
    fn bundle(&self) -> Arc<dyn BundleSource>;

    /// Modification time of the installed package.
    fn package_modified(&self) -> io::Result<SystemTime>;

    /// Private writable directory `name`, created if absent.
    fn private_dir(&self, name: &str) -> io::Result<PathBuf>;

    /// The live loader whose search path gets spliced.
    fn code_loader(&self) -> Arc<dyn CodeLoader>;

    /// Minimal "please wait" indication, shown when no observer is
    /// registered.
    fn show_notice(&self, text: &str) {
        info!(notice = text, "Install in progress");
    }
}

/// Filesystem-backed host context.
pub struct FsContext {
    package: PathBuf,
    bundle: Arc<DirBundle>,
    data_root: PathBuf,
    loader: Arc<dyn CodeLoader>,
}

impl FsContext {
    /// `package` is the file whose timestamp marks an upgrade, `assets` the
    /// directory of bundled archives, `data_root` the parent of private
    /// directories.
    pub fn new(
        package: impl Into<PathBuf>,
        assets: impl Into<PathBuf>,
        data_root: impl Into<PathBuf>,
        loader: Arc<dyn CodeLoader>,
    ) -> Self {
        Self {
            package: package.into(),
            bundle: Arc::new(DirBundle::new(assets)),
            data_root: data_root.into(),
            loader,
        }
    }

    /// Place the data root at `<local data dir>/<app_id>`.
    pub fn with_default_data_root(
        app_id: &str,
        package: impl Into<PathBuf>,
        assets: impl Into<PathBuf>,
        loader: Arc<dyn CodeLoader>,
    ) -> io::Result<Self> {
        let base = dirs::data_local_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no local data directory for this user")
        })?;
        Ok(Self::new(package, assets, base.join(app_id), loader))
    }

    #[must_use]
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }
}

impl HostContext for FsContext {
    fn bundle(&self) -> Arc<dyn BundleSource> {
        self.bundle.clone()
    }

    fn package_modified(&self) -> io::Result<SystemTime> {
        fs::metadata(&self.package)?.modified()
    }

    fn private_dir(&self, name: &str) -> io::Result<PathBuf> {
        let dir = self.data_root.join(name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn code_loader(&self) -> Arc<dyn CodeLoader> {
        Arc::clone(&self.loader)
    }
}
