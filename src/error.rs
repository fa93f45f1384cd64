//! Error taxonomy for database parsing and writing

use std::path::PathBuf;

/// Errors surfaced by the library core.
///
/// Parse primitives report `SeekOutOfRange` as soon as any read would
/// cross the declared file length; structural problems (missing hunks,
/// inconsistent lengths) are reported as `Corrupt` with the offending
/// offset where known.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A parse primitive attempted to read past the end of the file.
    #[error("seek out of range: offset {offset} + {len} bytes exceeds file length {file_len}")]
    SeekOutOfRange {
        offset: usize,
        len: usize,
        file_len: usize,
    },

    /// A structural invariant of the on-disk format failed.
    #[error("corrupt database: {0}")]
    Corrupt(String),

    /// An expected file or directory does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Renaming the play-counts sidecar after a successful merge failed.
    #[error("failed to rename '{}' to '{}': {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The in-memory model violates an invariant the writer cannot
    /// serialise (e.g. master playlist not at index 0, mixed slot sizes
    /// within one `.ithmb` file).
    #[error("inconsistent model: {0}")]
    InMemoryCorrupt(String),

    /// Underlying I/O failure, surfaced unchanged.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    pub(crate) fn model(msg: impl Into<String>) -> Self {
        Error::InMemoryCorrupt(msg.into())
    }
}

/// Convenience alias used by all fallible entry points.
pub type Result<T> = std::result::Result<T, Error>;
