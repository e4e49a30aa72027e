//! Error types for container I/O

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while writing or reading a container
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by the HDF5 library
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Stored data does not match what was requested
    #[error("Format error: {0}")]
    Format(String),

    /// A dataset, group or attribute is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// The output path exists and is not an HDF5 file
    #[error("Path already exists and is not an HDF5 file: {}", .0.display())]
    AlreadyExists(PathBuf),
}

/// Result type for container operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Format(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::AlreadyExists(PathBuf::from("/tmp/out.hdf5"));
        assert_eq!(
            err.to_string(),
            "Path already exists and is not an HDF5 file: /tmp/out.hdf5"
        );
        assert_eq!(
            Error::NotFound("hnorm".into()).to_string(),
            "Not found: hnorm"
        );
    }
}
