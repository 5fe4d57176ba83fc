//! Error types for persona loading and authoring.

use std::path::PathBuf;

use thiserror::Error;
use usersim_expr::ExprError;

/// An authoring error raised while a persona builds its constraints.
///
/// The judge recovers from these: the persona is marked unsatisfied for that
/// scenario and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersonaError {
    /// A formula uses a fact at the wrong sort.
    #[error("Constraint '{label}' is ill-sorted: {source}")]
    Sort {
        label: String,
        #[source]
        source: ExprError,
    },

    /// A strict persona referenced a fact the scenario did not observe.
    #[error("Constraint '{label}' references unobserved fact '{fact}'")]
    MissingFact { label: String, fact: String },

    /// Any other failure inside a persona's constraint builder.
    #[error("{0}")]
    Authoring(String),
}

/// Errors raised while loading persona files.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// The file could not be read.
    #[error("Failed to read persona file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid persona document.
    #[error("Invalid persona file {}: {message}", .path.display())]
    Format { path: PathBuf, message: String },

    /// A constraint formula does not compile.
    #[error("Invalid formula in {}: {source}", .path.display())]
    Formula {
        path: PathBuf,
        #[source]
        source: ExprError,
    },

    /// A persona path does not exist.
    #[error("Persona path not found: {}", .0.display())]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, JudgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fact_display() {
        let err = PersonaError::MissingFact {
            label: "latency".to_string(),
            fact: "p99_ms".to_string(),
        };
        assert!(err.to_string().contains("p99_ms"));
        assert!(err.to_string().contains("latency"));
    }

    #[test]
    fn test_format_error_display() {
        let err = JudgeError::Format {
            path: PathBuf::from("users/dev.toml"),
            message: "missing field `name`".to_string(),
        };
        assert!(err.to_string().contains("users/dev.toml"));
        assert!(err.to_string().contains("missing field"));
    }
}
