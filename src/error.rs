//! Error types
//!
//! `FsError` is the filesystem-style failure a directory store reports for a
//! single mutation. `ApiError` covers the plumbing around the engine:
//! configuration, logging, watchers, and the CLI.

use crate::types::NodeId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of one directory store operation
#[derive(Debug, Error)]
pub enum FsError {
    #[error("{} is not writable", .0.display())]
    NotWritable(PathBuf),

    #[error("an item named {} already exists", .0.display())]
    NameCollision(PathBuf),

    #[error("{} was not found", .0.display())]
    NotFound(PathBuf),

    #[error("node {0} is no longer in the tree")]
    StaleNode(NodeId),

    #[error("cannot place {} inside {}", item.display(), target.display())]
    InvalidContainment { item: PathBuf, target: PathBuf },

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    /// Map an I/O error onto the store taxonomy where one applies
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path),
            io::ErrorKind::AlreadyExists => FsError::NameCollision(path),
            io::ErrorKind::PermissionDenied => FsError::NotWritable(path),
            _ => FsError::Io { path, source: err },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_) | FsError::StaleNode(_))
    }
}

/// Errors raised outside individual store mutations
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("No item at {}", .0.display())]
    PathNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_taxonomy() {
        let err = FsError::from_io("/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, FsError::NotFound(_)));
        assert!(err.is_not_found());

        let err = FsError::from_io("/x", io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(matches!(err, FsError::NameCollision(_)));

        let err = FsError::from_io("/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, FsError::NotWritable(_)));

        let err = FsError::from_io("/x", io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(matches!(err, FsError::Io { .. }));
        assert!(!err.is_not_found());
    }
}
