//! Error types for template-to-tensor conversion
//!
//! Provides a unified error type for the histogram and tensor crates.

use thiserror::Error;

/// Core error type for histogram handling and tensor assembly
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid parameter provided to a function
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A histogram requested from the store does not exist
    #[error("Missing histogram: process \"{process}\", variation \"{variation}\"")]
    MissingHistogram { process: String, variation: String },

    /// A named axis is not present on a histogram
    #[error("Axis \"{axis}\" not found in {context}")]
    AxisNotFound { axis: String, context: String },

    /// Two arrays or histograms that must agree in shape do not
    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A process name referenced by a group is not in the process list
    #[error("Unknown process: {0}")]
    UnknownProcess(String),

    /// A nuisance name referenced by a group or flag list is not in the nuisance list
    #[error("Unknown nuisance: {0}")]
    UnknownNuisance(String),

    /// The same nuisance label was realized twice
    #[error("Duplicate nuisance: {0}")]
    DuplicateNuisance(String),

    /// Numerical computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// IO error (for snapshot and configuration files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Array reshape error
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

// Helper functions for common error patterns

impl Error {
    /// Create an error for a histogram missing from the store
    pub fn missing_histogram(process: &str, variation: &str) -> Self {
        Self::MissingHistogram {
            process: process.to_string(),
            variation: variation.to_string(),
        }
    }

    /// Create an error for an absent axis
    pub fn axis_not_found(axis: &str, context: &str) -> Self {
        Self::AxisNotFound {
            axis: axis.to_string(),
            context: context.to_string(),
        }
    }

    /// Create an error for a shape mismatch
    pub fn shape_mismatch(expected: &[usize], actual: &[usize], context: &str) -> Self {
        Self::ShapeMismatch {
            context: context.to_string(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create an error for a one-dimensional size mismatch
    pub fn size_mismatch(expected: usize, actual: usize, context: &str) -> Self {
        Self::shape_mismatch(&[expected], &[actual], context)
    }

    /// Whether this error stems from inconsistent configuration rather than I/O
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingHistogram { .. }
                | Self::AxisNotFound { .. }
                | Self::ShapeMismatch { .. }
                | Self::UnknownProcess(_)
                | Self::UnknownNuisance(_)
                | Self::DuplicateNuisance(_)
                | Self::InvalidParameter(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::missing_histogram("signal", "mass_var");
        assert_eq!(
            err.to_string(),
            "Missing histogram: process \"signal\", variation \"mass_var\""
        );

        let err = Error::axis_not_found("Zrap", "histogram signal_nominal");
        assert_eq!(err.to_string(), "Axis \"Zrap\" not found in histogram signal_nominal");

        let err = Error::shape_mismatch(&[2, 3], &[2, 4], "variation mass_var");
        assert_eq!(
            err.to_string(),
            "Shape mismatch in variation mass_var: expected [2, 3], got [2, 4]"
        );

        let err = Error::size_mismatch(10, 5, "sumw2");
        assert_eq!(err.to_string(), "Shape mismatch in sumw2: expected [10], got [5]");

        let err = Error::UnknownNuisance("mass_var_0.5".to_string());
        assert_eq!(err.to_string(), "Unknown nuisance: mass_var_0.5");
    }

    #[test]
    fn test_configuration_classification() {
        assert!(Error::missing_histogram("a", "b").is_configuration());
        assert!(Error::shape_mismatch(&[1], &[2], "x").is_configuration());
        assert!(Error::UnknownProcess("p".into()).is_configuration());
        assert!(!Error::Computation("nan".into()).is_configuration());

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_shape_error() {
        let shape_err = ndarray::Array2::<f64>::from_shape_vec((2, 2), vec![1.0; 3]).unwrap_err();
        let err: Error = shape_err.into();
        match err {
            Error::Shape(_) => {}
            _ => panic!("Wrong error type"),
        }
    }
}
