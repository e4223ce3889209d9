//! Crate-level error taxonomy.
//!
//! Four kinds, matching the pipeline stages: validation (fix the request),
//! compile (dialect capability gap), execution (warehouse fault, surfaced
//! as-is), mapping (internal contract breach). Nothing here is retried by
//! the core.

use thiserror::Error;

use crate::compile::CompileError;
use crate::results::MappingError;
use crate::runner::ExecutionError;
use crate::validate::ValidationError;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("query validation failed: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

impl CoreError {
    /// The validation errors, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            CoreError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
