//! Modification-time probes.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Modification time of `path`, or `None` if nothing exists there.
///
/// Any error other than `NotFound` is returned; a permissions problem is not
/// the same thing as an absent file.
pub fn modified_time(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => meta.modified().map(Some),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    use super::modified_time;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = modified_time(&dir.path().join("absent.jar")).expect("probe");
        assert!(result.is_none());
    }

    #[test]
    fn reports_explicit_mtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.jar");
        let file = File::create(&path).expect("create");
        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        file.set_modified(when).expect("set_modified");
        drop(file);

        assert_eq!(modified_time(&path).expect("probe"), Some(when));
    }
}
