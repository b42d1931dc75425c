//! rb-io: collective `.npy` storage for offline data.

pub mod group;
pub mod npy;
pub mod numpy_io;
pub mod offline;

pub use group::{LocalGroup, ProcessGroup, SingleProcess};
pub use npy::NpyArray;
pub use numpy_io::NumpyIo;
pub use offline::{OfflineManifest, OfflineStorage, TermFiles, checksum};

use std::path::PathBuf;

pub type IoResult<T> = Result<T, IoError>;

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Invalid .npy data: {what}")]
    Format { what: String },

    #[error("Checksum mismatch for {file}: expected {expected}, found {actual}")]
    Checksum {
        file: String,
        expected: String,
        actual: String,
    },

    /// Failure reported by the leader rank.
    #[error("Collective operation failed on the leader: {message}")]
    Collective { message: String },

    #[error("Operator error: {0}")]
    Operator(#[from] rb_core::RbError),
}

impl IoError {
    pub(crate) fn format(what: impl Into<String>) -> Self {
        IoError::Format { what: what.into() }
    }
}
