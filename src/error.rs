//! Error taxonomy for the evaluation engine
//!
//! Degraded judgments are data, not errors (see [`crate::types::FacetJudgment::degraded`]);
//! everything here is a named failure the caller must handle.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Rejected before any work started
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient models for comparison: need at least 2 evaluations, got {found}")]
    InsufficientModels { found: usize },

    #[error("failed to acquire model '{model}': {reason}")]
    ModelAcquisition { model: String, reason: String },

    /// Model acquisition exceeded the configured step timeout
    #[error("model acquisition for '{conversation_id}' timed out after {seconds}s")]
    Timeout { conversation_id: String, seconds: u64 },

    /// A fan-out task panicked or was cancelled
    #[error("evaluation task failed: {0}")]
    TaskFailed(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EvalError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        EvalError::InvalidInput(message.into())
    }

    pub fn model_acquisition(model: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        EvalError::ModelAcquisition {
            model: model.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that were rejected synchronously, before any work
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            EvalError::InvalidInput(_) | EvalError::InsufficientModels { .. }
        )
    }

    pub fn is_model_acquisition(&self) -> bool {
        matches!(self, EvalError::ModelAcquisition { .. })
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(e: serde_json::Error) -> Self {
        EvalError::Export(e.to_string())
    }
}

impl From<serde_yaml::Error> for EvalError {
    fn from(e: serde_yaml::Error) -> Self {
        EvalError::Export(e.to_string())
    }
}

pub type Result<T, E = EvalError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert!(EvalError::invalid_input("no facets").is_invalid_input());
        assert!(EvalError::InsufficientModels { found: 1 }.is_invalid_input());

        let err = EvalError::model_acquisition("llama", "not supported");
        assert!(err.is_model_acquisition());
        assert!(!err.is_invalid_input());
        assert_eq!(err.to_string(), "failed to acquire model 'llama': not supported");
    }
}
