use std::io;

use thiserror::Error;

/// Everything a volume operation can report to its caller.
///
/// One variant per observable failure kind; success is `Ok`. Display
/// strings double as the user-facing error message table.
#[derive(Debug, Error)]
pub enum FsError {
    /// Empty path or payload, oversize name, or malformed path.
    #[error("invalid argument")]
    InvalidArgument,

    /// The volume file could not be opened or created.
    #[error("no such volume: {0}")]
    NoVolume(#[source] io::Error),

    /// The file exists but its header, bitmap, or reference graph fails
    /// validation.
    #[error("not a volume")]
    NotVolume,

    /// A payload buffer could not be reserved.
    #[error("out of memory")]
    OutOfMemory,

    /// A path segment or file name was not found.
    #[error("no such entry")]
    NotFound,

    /// A path segment resolved to a file where a directory was required.
    #[error("not a directory")]
    NotDirectory,

    /// The terminal path segment is a directory where a file was required.
    #[error("not a file")]
    NotFile,

    /// The name is already taken in the target directory.
    #[error("entry already exists")]
    Exists,

    /// The directory entry table, or a file block's name table, is full.
    #[error("entry table full")]
    MaxEntries,

    /// No free block, or no contiguous free run of the required length.
    #[error("no space left on volume")]
    NoSpace,

    /// `rmdir` of a directory that still has entries.
    #[error("directory not empty")]
    NotEmpty,

    /// A positioned read or write failed after the volume was opened.
    #[error("volume I/O failed: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;
