//! Error types for the ATSP simulator.
//!
//! Every fallible operation returns `EnvResult<T>`. Nothing is recovered
//! internally: an invalid configuration, an action outside the legal mask or
//! a tour that is not a permutation is a bug in the caller and is surfaced
//! as-is.

use thiserror::Error;

/// Result alias used across the crate.
pub type EnvResult<T> = Result<T, EnvError>;

#[derive(Debug, Error)]
pub enum EnvError {
    /// Invalid construction parameters (bounds, sizes, batch shape).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A distance matrix that cannot be used as an ATSP instance.
    #[error("invalid distance matrix: {message}")]
    InvalidMatrix { message: String },

    /// The chosen node is out of range or already visited.
    #[error("illegal action {action} for instance {instance}: {reason}")]
    IllegalAction {
        instance: usize,
        action: usize,
        reason: String,
    },

    /// `step` was called on an instance that has already visited every node.
    #[error("instance {instance} has already finished its episode")]
    EpisodeFinished { instance: usize },

    /// The action sequence handed to the scorer is not a permutation.
    #[error("invalid tour for instance {instance}: {reason}")]
    InvalidTour { instance: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl EnvError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_matrix(message: impl Into<String>) -> Self {
        Self::InvalidMatrix {
            message: message.into(),
        }
    }

    pub fn illegal_action(instance: usize, action: usize, reason: impl Into<String>) -> Self {
        Self::IllegalAction {
            instance,
            action,
            reason: reason.into(),
        }
    }

    pub fn invalid_tour(instance: usize, reason: impl Into<String>) -> Self {
        Self::InvalidTour {
            instance,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EnvError::illegal_action(3, 7, "node already visited");
        assert_eq!(
            err.to_string(),
            "illegal action 7 for instance 3: node already visited"
        );

        let err = EnvError::config("min_dist > max_dist");
        assert!(err.to_string().contains("min_dist > max_dist"));
    }
}
