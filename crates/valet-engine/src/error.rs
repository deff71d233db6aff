//! Error types for the execution engine.

use valet_core::error::ValetError;

/// Errors the engine surfaces to its callers.
///
/// Deliberately narrow: executor failures, refused undos, and notifier
/// problems are outcomes, not errors. Only a fault in the engine's own
/// persistence makes an operation unrecoverable.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Store(#[from] ValetError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::Store(ValetError::Storage("disk full".to_string()));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_engine_error_from_valet_error() {
        let storage_err = ValetError::Storage("locked".to_string());
        let engine_err: EngineError = storage_err.into();
        assert!(matches!(engine_err, EngineError::Store(_)));
    }
}
