use thiserror::Error;

/// Top-level error type for the valet system.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for ValetError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for ValetError {
    fn from(err: toml::de::Error) -> Self {
        ValetError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ValetError {
    fn from(err: toml::ser::Error) -> Self {
        ValetError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ValetError {
    fn from(err: serde_json::Error) -> Self {
        ValetError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for valet operations.
pub type Result<T> = std::result::Result<T, ValetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValetError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ValetError = io_err.into();
        assert!(matches!(err, ValetError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let parsed: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let err: ValetError = parsed.unwrap_err().into();
        assert!(matches!(err, ValetError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        let err: ValetError = parsed.unwrap_err().into();
        assert!(matches!(err, ValetError::Serialization(_)));
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(ValetError, &str)> = vec![
            (
                ValetError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                ValetError::Service("calendar unreachable".to_string()),
                "Service error: calendar unreachable",
            ),
            (
                ValetError::Notify("queue full".to_string()),
                "Notification error: queue full",
            ),
            (
                ValetError::Engine("claim lost".to_string()),
                "Engine error: claim lost",
            ),
            (
                ValetError::Api("unauthorized".to_string()),
                "API error: unauthorized",
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }
}
