//! Error types for truncated and censored estimation
//!
//! Provides a unified error type for all truncated-stats crates.

use thiserror::Error;

/// Core error type for truncated estimation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Sample dimensionality does not match the configured dimension
    #[error("Invalid shape: expected dimension {expected}, got {actual}")]
    InvalidShape { expected: usize, actual: usize },

    /// Missing or mutually inconsistent configuration
    #[error("Invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),

    /// Empirical moments cannot seed the optimization
    #[error("Degenerate moments: {0}")]
    DegenerateMoments(String),

    /// The oracle accepted too few proposals within the resample cap
    #[error(
        "Rejection sampling exhausted: accepted {accepted} of {required} draws after {rounds} rounds"
    )]
    RejectionSamplingExhausted {
        accepted: usize,
        required: usize,
        rounds: usize,
    },

    /// A projected scale or variance is not positive (definite)
    #[error("Non-positive-definite projection: {0}")]
    NonPositiveDefiniteProjection(String),

    /// Numerical computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

// Helper functions for common error patterns

impl Error {
    /// Create an error for a dimension mismatch
    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Self::InvalidShape { expected, actual }
    }

    /// Create an error for an invalid hyperparameter value
    pub fn invalid_hyperparameter(name: &str, reason: &str) -> Self {
        Self::InvalidHyperparameters(format!("{name}: {reason}"))
    }

    /// Create an error for NaN/Inf values
    pub fn non_finite(context: &str) -> Self {
        Self::Computation(format!("{context} contains NaN or infinite values"))
    }

    /// Create an error for a matrix or scalar that lost positive definiteness
    pub fn not_positive_definite(context: &str) -> Self {
        Self::NonPositiveDefiniteProjection(format!("{context} is not positive definite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidShape { expected: 2, actual: 3 };
        assert_eq!(err.to_string(), "Invalid shape: expected dimension 2, got 3");

        let err = Error::InvalidHyperparameters("alpha is required".to_string());
        assert_eq!(err.to_string(), "Invalid hyperparameters: alpha is required");

        let err = Error::DegenerateMoments("empirical covariance is singular".to_string());
        assert_eq!(
            err.to_string(),
            "Degenerate moments: empirical covariance is singular"
        );

        let err = Error::RejectionSamplingExhausted {
            accepted: 3,
            required: 100,
            rounds: 50,
        };
        assert_eq!(
            err.to_string(),
            "Rejection sampling exhausted: accepted 3 of 100 draws after 50 rounds"
        );

        let err = Error::NonPositiveDefiniteProjection("covariance".to_string());
        assert_eq!(err.to_string(), "Non-positive-definite projection: covariance");
    }

    #[test]
    fn test_error_helper_functions() {
        match Error::shape_mismatch(4, 1) {
            Error::InvalidShape { expected, actual } => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 1);
            }
            _ => panic!("Wrong error type"),
        }

        let err = Error::invalid_hyperparameter("radius", "must be positive");
        assert_eq!(err.to_string(), "Invalid hyperparameters: radius: must be positive");

        let err = Error::non_finite("gradient");
        assert_eq!(
            err.to_string(),
            "Computation error: gradient contains NaN or infinite values"
        );

        let err = Error::not_positive_definite("projected covariance");
        assert_eq!(
            err.to_string(),
            "Non-positive-definite projection: projected covariance is not positive definite"
        );
    }

    #[test]
    fn test_error_chaining() {
        fn inner_function() -> Result<()> {
            Err(Error::DegenerateMoments("no observed samples".to_string()))
        }

        fn outer_function() -> Result<()> {
            inner_function()?;
            Ok(())
        }

        let err = outer_function().unwrap_err();
        assert!(matches!(err, Error::DegenerateMoments(_)));
        assert!(err.to_string().contains("no observed samples"));
    }
}
