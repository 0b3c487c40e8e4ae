//! # Error Types
//!
//! Domain-specific error types for fairgate-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  fairgate-core errors (this file)                                      │
//! │  ├── CoreError        - Crypto and domain failures                     │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  fairgate-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  fairgate-pos errors (service layer)                                   │
//! │  └── PosError         - What the request layer sees                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PosError → Response code          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (lengths, field names)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
///
/// Crypto failures distinguish *malformed* inputs (undecodable key or
/// signature) from a well-formed signature that simply does not verify.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Public key decoded to the wrong number of bytes.
    /// Ed25519 public keys are exactly 32 bytes.
    #[error("Invalid public key length: expected 32 bytes, got {actual}")]
    InvalidKeyLength { actual: usize },

    /// Public key could not be decoded or is not a valid Ed25519 point.
    #[error("Invalid public key: {reason}")]
    MalformedKey { reason: String },

    /// Signature could not be decoded from base64 or has the wrong length.
    #[error("Invalid signature encoding: {reason}")]
    MalformedSignature { reason: String },

    /// Signature is well-formed but does not verify against the key.
    #[error("Invalid signature")]
    SignatureMismatch,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value has the wrong length.
    #[error("{field} must be {expected}")]
    InvalidLength { field: String, expected: String },

    /// Invalid format (e.g., non-numeric PIN).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidKeyLength { actual: 31 };
        assert_eq!(
            err.to_string(),
            "Invalid public key length: expected 32 bytes, got 31"
        );

        let err = ValidationError::Required {
            field: "pin".to_string(),
        };
        assert_eq!(err.to_string(), "pin is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
