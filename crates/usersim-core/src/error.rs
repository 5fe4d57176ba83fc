//! Error types for usersim core.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for usersim operations.
#[derive(Debug, Error)]
pub enum UsersimError {
    /// A document is missing its schema tag or a required key.
    #[error("Invalid {origin}: {message}")]
    Validation { origin: String, message: String },

    /// A file could not be read or written.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An external stage failed for one scenario.
    #[error("Scenario '{scenario}' failed at {stage}: {message}")]
    Stage {
        scenario: String,
        stage: &'static str,
        message: String,
    },

    /// JSON passthrough.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file passthrough.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Persona loading passthrough.
    #[error("Persona error: {0}")]
    Judge(#[from] usersim_judge::JudgeError),

    /// Audit passthrough.
    #[error("Audit error: {0}")]
    Audit(#[from] usersim_audit::AuditError),
}

impl UsersimError {
    pub(crate) fn validation(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            origin: origin.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is malformed input rather than a runtime failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Json(_) | Self::Yaml(_) | Self::Judge(_) | Self::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = UsersimError::validation("facts document smoke.json", "missing 'facts' object");
        assert_eq!(
            err.to_string(),
            "Invalid facts document smoke.json: missing 'facts' object"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_stage_is_not_validation() {
        let err = UsersimError::Stage {
            scenario: "cold".to_string(),
            stage: "instrumentation",
            message: "exit status 2".to_string(),
        };
        assert!(!err.is_validation());
        assert!(err.to_string().contains("instrumentation"));
    }
}
