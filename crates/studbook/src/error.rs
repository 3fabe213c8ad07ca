//! Error types for studbook operations.
//!
//! Errors fall into two layers:
//!
//! - **`Error`**: top-level failures (missing records, persistence failures,
//!   cancelled sessions, registry I/O)
//! - **`ValidationError`**: rejected pedigree mutations; these are always
//!   raised *before* any in-memory state changes, so a validation failure
//!   guarantees the graph is untouched
//!
//! Soft conditions are deliberately not errors: a `NotFound` ancestor during
//! a graph build degrades to a warning plus an unknown-ancestor placeholder,
//! and a COI request with unknown parentage yields an explicit
//! "insufficient data" result rather than failing (or, worse, reporting 0).

use crate::domain::{DogId, ParentType, Sex};
use std::io;
use thiserror::Error;

/// The error type for studbook operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A dog record required as an operand does not exist.
    ///
    /// Raised for missing roots and mutation targets. Missing *ancestors*
    /// during a graph build are recorded as warnings instead.
    #[error("Dog not found: {0}")]
    DogNotFound(DogId),

    /// A pedigree mutation was rejected before being applied.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backing write for a mutation failed.
    ///
    /// The in-memory change has already been rolled back when this is
    /// returned; `retryable` indicates the caller may simply try again.
    #[error("Persistence failed (retryable: {retryable}): {message}")]
    Persistence {
        /// Description of the underlying persistence failure.
        message: String,
        /// Whether retrying the same mutation is reasonable.
        retryable: bool,
    },

    /// The hosting chart session ended while work was in flight.
    ///
    /// Fetch completions arriving after this point are discarded rather
    /// than applied to state.
    #[error("Chart session closed")]
    SessionClosed,

    /// Registry backend error.
    #[error("Registry error: {0}")]
    Registry(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A rejected pedigree mutation.
///
/// Every variant is checked during the `Validating` phase, before any
/// in-memory or persisted state changes; the graph is left byte-for-byte
/// unchanged when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The proposed parent's sex does not match the parent slot.
    #[error("{dog}: a {parent_type} must be {expected}, got {actual}")]
    SexMismatch {
        /// The dog whose parent slot was being set.
        dog: DogId,
        /// Which parent slot was targeted.
        parent_type: ParentType,
        /// The sex required by that slot.
        expected: Sex,
        /// The sex of the proposed parent.
        actual: Sex,
    },

    /// A dog was proposed as its own parent.
    #[error("{dog} cannot be its own ancestor")]
    SelfParent {
        /// The offending dog.
        dog: DogId,
    },

    /// The proposed parent is a descendant of the dog being edited.
    #[error("setting {parent} as a parent of {dog} would create a cycle")]
    WouldCreateCycle {
        /// The dog whose parent slot was being set.
        dog: DogId,
        /// The proposed parent, already descendant-reachable from `dog`.
        parent: DogId,
    },

    /// The dog's sire and dam reference the same record.
    #[error("{dog} lists the same dog as both sire and dam")]
    SameSireAndDam {
        /// The offending dog.
        dog: DogId,
    },

    /// An edit targeted a parent slot that holds no effective parent.
    #[error("{dog} has no {parent_type} to edit")]
    NoSuchParent {
        /// The dog whose parent slot was targeted.
        dog: DogId,
        /// The empty slot.
        parent_type: ParentType,
    },
}

/// A specialized Result type for studbook operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_render_context() {
        let err = ValidationError::SexMismatch {
            dog: DogId::new("dog-1"),
            parent_type: ParentType::Sire,
            expected: Sex::Male,
            actual: Sex::Female,
        };
        let msg = err.to_string();
        assert!(msg.contains("dog-1"), "message was: {msg}");
        assert!(msg.contains("sire"), "message was: {msg}");

        let err = ValidationError::SelfParent {
            dog: DogId::new("dog-2"),
        };
        assert!(err.to_string().contains("own ancestor"));
    }

    #[test]
    fn persistence_error_reports_retryability() {
        let err = Error::Persistence {
            message: "connection reset".to_string(),
            retryable: true,
        };
        let msg = err.to_string();
        assert!(msg.contains("retryable: true"), "message was: {msg}");
        assert!(msg.contains("connection reset"), "message was: {msg}");
    }
}
