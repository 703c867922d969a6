//! Error types for the meshplane control plane, built on `thiserror`.
//!
//! The taxonomy follows the boundary the core exposes to its collaborators:
//! client-caused [`ValidationError`]s reject a single connection attempt,
//! operator-caused configuration errors fail startup, and internal invariant
//! errors indicate programmer error after validation should have caught the
//! input.

mod validation;

pub use validation::{ValidationError, ValidationErrorKind};

/// Custom result type for meshplane operations.
pub type Result<T> = std::result::Result<T, MeshplaneError>;

/// Main error type for the meshplane control plane.
#[derive(thiserror::Error, Debug)]
pub enum MeshplaneError {
    /// Inconsistent static configuration. Fails startup, never ignored.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed or disallowed node metadata. Rejects the connection attempt,
    /// never crashes the process.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Programmer error: an internal compiler saw input that validation
    /// guarantees cannot occur.
    #[error("Internal invariant violated: {message}")]
    Internal { message: String },

    /// I/O errors with additional context (config file loading).
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
}

impl MeshplaneError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an internal invariant error.
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether this error should reject a single proxy connection rather than
    /// tear anything down.
    pub fn is_connection_rejection(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for MeshplaneError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<config::ConfigError> for MeshplaneError {
    fn from(error: config::ConfigError) -> Self {
        Self::config(format!("Configuration loading failed: {}", error))
    }
}

impl From<validator::ValidationErrors> for MeshplaneError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Validation failed: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_message() {
        let error = MeshplaneError::config("selector matching references unknown client");
        assert!(matches!(error, MeshplaneError::Config { .. }));
        assert_eq!(
            error.to_string(),
            "Configuration error: selector matching references unknown client"
        );
    }

    #[test]
    fn validation_error_is_connection_rejection() {
        let error: MeshplaneError = ValidationError::service_name_required().into();
        assert!(error.is_connection_rejection());
        assert!(!MeshplaneError::internal("boom").is_connection_rejection());
    }
}
