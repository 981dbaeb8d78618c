use thiserror::Error;

/// Central error type for the chaining core
#[derive(Error, Debug)]
pub enum EtlError {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error in {stage}: {message}")]
    Configuration { stage: String, message: String },

    #[error("Invalid value for config property '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Config section not found: {0}")]
    SectionNotFound(String),

    #[error("Invalid config schema: {0}")]
    InvalidSchema(String),

    // ============================================================================
    // Chain Errors
    // ============================================================================
    #[error("Incompatible stages linked: {upstream} and {downstream}")]
    Compatibility { upstream: String, downstream: String },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    GenericError(String),
}

impl EtlError {
    /// Shorthand for a configuration error attributed to a stage
    pub fn configuration(stage: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::Configuration {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a raw value that cannot be converted
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

// Automatic conversion from String (for stage code using format!)
impl From<String> for EtlError {
    fn from(err: String) -> Self {
        EtlError::GenericError(err)
    }
}

impl From<&str> for EtlError {
    fn from(err: &str) -> Self {
        EtlError::GenericError(err.to_string())
    }
}

// Helper type alias for Results
pub type EtlResult<T> = Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = EtlError::configuration("reader", "config property: path is required");
        assert_eq!(
            err.to_string(),
            "Configuration error in reader: config property: path is required"
        );
    }

    #[test]
    fn test_compatibility_display() {
        let err = EtlError::Compatibility {
            upstream: "reader: in=none out=string".to_string(),
            downstream: "writer: in=record out=none".to_string(),
        };
        assert!(err.to_string().contains("reader"));
        assert!(err.to_string().contains("writer"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let etl_err: EtlError = io_err.into();
        assert!(matches!(etl_err, EtlError::Io(_)));
    }

    #[test]
    fn test_string_conversion() {
        let err: EtlError = "boom".into();
        assert!(matches!(err, EtlError::GenericError(_)));
        assert_eq!(err.to_string(), "boom");
    }
}
