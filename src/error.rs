//! Error types for FAT operations

use crate::disk::DiskError;
use core::fmt;

/// Result type for FAT operations
pub type Result<T> = core::result::Result<T, FatError>;

/// Errors surfaced by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatError {
    /// The volume is not a usable FAT filesystem: BPB validation failed,
    /// the first FAT entry does not carry the media sentinel, or a cluster
    /// chain references an impossible cluster number
    BadFilesystem(&'static str),

    /// Path traversal reached a non-directory, or `open` hit a directory
    BadFileType(&'static str),

    /// The directory scan ended without matching the requested component
    FileNotFound,

    /// Error from the block device, passed through unchanged
    Disk(DiskError),
}

impl fmt::Display for FatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadFilesystem(why) => write!(f, "not a fat filesystem: {}", why),
            Self::BadFileType(why) => write!(f, "bad file type: {}", why),
            Self::FileNotFound => write!(f, "file not found"),
            Self::Disk(e) => write!(f, "disk error: {}", e),
        }
    }
}

impl From<DiskError> for FatError {
    fn from(e: DiskError) -> Self {
        Self::Disk(e)
    }
}
