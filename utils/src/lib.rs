//! Shared filesystem utilities for codesplice.
//!
//! - **`stream_copy`**: Buffered copy of a byte stream into a file, persisted
//!   with the temp + rename pattern so a failed copy never leaves a partial
//!   file under the final name
//! - **`mtime`**: Modification-time probes that treat "missing" as data

pub mod mtime;
pub mod stream_copy;

pub use mtime::modified_time;
pub use stream_copy::{
    CopyOptions, DEFAULT_BUFFER_BYTES, FileSyncPolicy, ParentDirSyncPolicy, PersistMode,
    copy_to_file,
};
