//! Loader configuration.
//!
//! Raw TOML deserialization structs (with `Option` fields) stay private here.
//! [`LoaderConfig::from_toml_str`] resolves them into a fully-populated,
//! validated [`LoaderConfig`] at the parse boundary; every other crate only
//! ever sees the resolved form.
//!
//! ```toml
//! [install]
//! dir_name = "codesplice"
//! archive_extension = "jar"
//! copy_buffer_bytes = 8192
//!
//! [splice]
//! strategy = "auto"   # auto | legacy | modern
//!
//! [gate]
//! notice = "Preparing application code..."
//! ```

use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

pub use codesplice_utils::DEFAULT_BUFFER_BYTES as DEFAULT_COPY_BUFFER_BYTES;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_DIR_NAME: &str = "codesplice";
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "jar";
pub const DEFAULT_NOTICE: &str = "Preparing application code...";

/// Which classpath splice strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplicePreference {
    /// Probe the loader once and pick the best strategy it offers.
    #[default]
    Auto,
    /// Force the parallel-table strategy.
    Legacy,
    /// Force the element-list strategy.
    Modern,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("install.dir_name must be a single non-empty path component (got {0:?})")]
    InvalidDirName(String),
    #[error("install.archive_extension must be a non-empty extension (got {0:?})")]
    InvalidExtension(String),
    #[error("install.copy_buffer_bytes must be greater than zero")]
    ZeroCopyBuffer,
    #[error("gate.notice must not be empty")]
    EmptyNotice,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    install: Option<RawInstall>,
    splice: Option<RawSplice>,
    gate: Option<RawGate>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInstall {
    dir_name: Option<String>,
    archive_extension: Option<String>,
    copy_buffer_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSplice {
    strategy: Option<SplicePreference>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGate {
    notice: Option<String>,
}

/// Resolved loader settings.
///
/// Invariant: `dir_name` is a single plain path component, `archive_extension`
/// is non-empty and carries no leading dot, and `notice` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    dir_name: String,
    archive_extension: String,
    copy_buffer_bytes: NonZeroUsize,
    splice: SplicePreference,
    notice: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            dir_name: DEFAULT_DIR_NAME.to_string(),
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
            copy_buffer_bytes: NonZeroUsize::new(DEFAULT_COPY_BUFFER_BYTES)
                .unwrap_or(NonZeroUsize::MIN),
            splice: SplicePreference::Auto,
            notice: DEFAULT_NOTICE.to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::resolve(raw)
    }

    /// Read and resolve the config file at `path`.
    ///
    /// Returns `None` on any error (missing file, unreadable, invalid); the
    /// caller continues with [`LoaderConfig::default`].
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return None;
            }
        };

        match Self::from_toml_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                None
            }
        }
    }

    /// Same as [`LoaderConfig::load`], falling back to defaults.
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    fn resolve(raw: RawConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let install = raw.install.unwrap_or_default();

        let dir_name = match install.dir_name {
            Some(name) => validate_dir_name(name)?,
            None => defaults.dir_name,
        };
        let archive_extension = match install.archive_extension {
            Some(ext) => validate_extension(ext)?,
            None => defaults.archive_extension,
        };
        let copy_buffer_bytes = match install.copy_buffer_bytes {
            Some(bytes) => NonZeroUsize::new(bytes).ok_or(ConfigError::ZeroCopyBuffer)?,
            None => defaults.copy_buffer_bytes,
        };
        let splice = raw
            .splice
            .and_then(|s| s.strategy)
            .unwrap_or(defaults.splice);
        let notice = match raw.gate.and_then(|g| g.notice) {
            Some(notice) if notice.trim().is_empty() => return Err(ConfigError::EmptyNotice),
            Some(notice) => notice,
            None => defaults.notice,
        };

        Ok(Self {
            dir_name,
            archive_extension,
            copy_buffer_bytes,
            splice,
            notice,
        })
    }

    /// Name of the private directory holding the installed archives.
    #[must_use]
    pub fn dir_name(&self) -> &str {
        &self.dir_name
    }

    /// Extension (without dot) used to discover archives in the bundle.
    #[must_use]
    pub fn archive_extension(&self) -> &str {
        &self.archive_extension
    }

    #[must_use]
    pub fn copy_buffer_bytes(&self) -> usize {
        self.copy_buffer_bytes.get()
    }

    #[must_use]
    pub fn splice(&self) -> SplicePreference {
        self.splice
    }

    /// Text of the default "please wait" indication.
    #[must_use]
    pub fn notice(&self) -> &str {
        &self.notice
    }
}

fn validate_dir_name(name: String) -> Result<String, ConfigError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
        return Err(ConfigError::InvalidDirName(name));
    }
    Ok(trimmed.to_string())
}

fn validate_extension(ext: String) -> Result<String, ConfigError> {
    let trimmed = ext.trim();
    let bare = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if bare.is_empty() || bare.contains(['.', '/', '\\']) {
        return Err(ConfigError::InvalidExtension(ext));
    }
    Ok(bare.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use codesplice_utils::CopyOptions;

    use super::{ConfigError, LoaderConfig, SplicePreference};

    #[test]
    fn empty_document_resolves_to_defaults() {
        let config = LoaderConfig::from_toml_str("").unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.dir_name(), "codesplice");
        assert_eq!(config.archive_extension(), "jar");
        assert_eq!(config.copy_buffer_bytes(), 8192);
        assert_eq!(config.splice(), SplicePreference::Auto);
    }

    #[test]
    fn default_buffer_matches_copy_default() {
        assert_eq!(
            LoaderConfig::default().copy_buffer_bytes(),
            CopyOptions::default().buffer_bytes
        );
    }

    #[test]
    fn full_document_overrides_everything() {
        let config = LoaderConfig::from_toml_str(
            r#"
            [install]
            dir_name = "dexes"
            archive_extension = ".zip"
            copy_buffer_bytes = 4096

            [splice]
            strategy = "legacy"

            [gate]
            notice = "Optimizing..."
            "#,
        )
        .unwrap();

        assert_eq!(config.dir_name(), "dexes");
        assert_eq!(config.archive_extension(), "zip");
        assert_eq!(config.copy_buffer_bytes(), 4096);
        assert_eq!(config.splice(), SplicePreference::Legacy);
        assert_eq!(config.notice(), "Optimizing...");
    }

    #[test]
    fn rejects_nested_dir_name() {
        let err = LoaderConfig::from_toml_str("[install]\ndir_name = \"a/b\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDirName(_)));
    }

    #[test]
    fn rejects_zero_buffer() {
        let err = LoaderConfig::from_toml_str("[install]\ncopy_buffer_bytes = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCopyBuffer));
    }

    #[test]
    fn rejects_blank_notice() {
        let err = LoaderConfig::from_toml_str("[gate]\nnotice = \"  \"").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyNotice));
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = LoaderConfig::from_toml_str("[splice]\nstrategy = \"newest\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LoaderConfig::load(&dir.path().join("codesplice.toml")).is_none());
    }

    #[test]
    fn load_invalid_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codesplice.toml");
        fs::write(&path, "[install\n").unwrap();

        assert!(LoaderConfig::load(&path).is_none());
        assert_eq!(LoaderConfig::load_or_default(&path), LoaderConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codesplice.toml");
        fs::write(&path, "[splice]\nstrategy = \"modern\"\n").unwrap();

        let config = LoaderConfig::load(&path).unwrap();
        assert_eq!(config.splice(), SplicePreference::Modern);
    }
}
