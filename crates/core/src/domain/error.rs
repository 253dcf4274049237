// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid recurrence pattern: {0}")]
    InvalidPattern(String),

    #[error("Circular dependency: {task} cannot depend on {depends_on}")]
    CircularDependency { task: String, depends_on: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
