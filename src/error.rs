//! Error type of the container writer driver

use thiserror::Error;

/// Errors raised while assembling or writing a fit container
#[derive(Error, Debug)]
pub enum Error {
    /// Histogram handling or tensor assembly failed
    #[error(transparent)]
    Assembly(#[from] templatefit_core::Error),

    /// Writing the container failed
    #[error(transparent)]
    Container(#[from] templatefit_container::Error),

    /// Invalid writer option
    #[error("Invalid writer option: {0}")]
    InvalidOption(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error stems from inconsistent configuration rather than I/O
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Assembly(err) => err.is_configuration(),
            Self::Container(_) => false,
            Self::InvalidOption(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping() {
        let err: Error = templatefit_core::Error::UnknownNuisance("x".into()).into();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Unknown nuisance: x");

        let err: Error = templatefit_container::Error::NotFound("hnorm".into()).into();
        assert!(!err.is_configuration());
        assert_eq!(err.to_string(), "Not found: hnorm");
    }
}
