//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use taskboard_core::domain::DomainError;
use taskboard_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CIRCULAR_DEPENDENCY: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::NotFound(msg) => ErrorObjectOwned::owned(code::NOT_FOUND, msg, None::<()>),
        AppError::Database(msg) => ErrorObjectOwned::owned(code::DB_ERROR, msg, None::<()>),
        AppError::Domain(e @ DomainError::CircularDependency { .. }) => {
            ErrorObjectOwned::owned(code::CIRCULAR_DEPENDENCY, e.to_string(), None::<()>)
        }
        AppError::Domain(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Serialization(e) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, e.to_string(), None::<()>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let cycle = AppError::Domain(DomainError::CircularDependency {
            task: "a".to_string(),
            depends_on: "b".to_string(),
        });
        assert_eq!(to_rpc_error(cycle).code(), code::CIRCULAR_DEPENDENCY);

        let invalid = AppError::Domain(DomainError::InvalidPattern("interval".to_string()));
        assert_eq!(to_rpc_error(invalid).code(), code::VALIDATION_ERROR);

        let missing = AppError::NotFound("Task x not found".to_string());
        let obj = to_rpc_error(missing);
        assert_eq!(obj.code(), code::NOT_FOUND);
        assert_eq!(obj.message(), "Task x not found");

        assert_eq!(
            to_rpc_error(AppError::Database("locked".to_string())).code(),
            code::DB_ERROR
        );
    }
}
