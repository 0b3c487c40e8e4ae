//! # Service Error Types
//!
//! The request-facing error taxonomy.
//!
//! ## Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Validation     malformed key/signature, timestamp out of range        │
//! │                 → rejected, never retried automatically                │
//! │                                                                         │
//! │  Authorization  revoked terminal, bad PIN, dead session                │
//! │                 → caller must re-authenticate, not retry blindly       │
//! │                                                                         │
//! │  BusinessRule   insufficient stock, ineligible coupon, double refund   │
//! │                 → rejected BEFORE any mutation; no partial state       │
//! │                                                                         │
//! │  Storage        database failures                                      │
//! │                 → transient; safe to retry the whole request           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Advisory operations (`touch`, `increment_usage`) return results the
//! caller explicitly drops with a log line; they never reach this taxonomy.
//! Post-durability failures (deduction after a persisted sale) are logged
//! as inconsistencies, not surfaced - the sale itself succeeded.

use thiserror::Error;

use fairgate_core::{CoreError, ValidationError};
use fairgate_db::DbError;

/// Coarse classification used by the request layer to pick response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; surface verbatim, never retry.
    Validation,
    /// Authentication/authorization state; re-authenticate.
    Authorization,
    /// Business rule violated before any mutation.
    BusinessRule,
    /// Storage failure; retryable.
    Storage,
}

/// Service-layer errors.
#[derive(Debug, Error)]
pub enum PosError {
    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------
    /// Handshake timestamp outside the replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Registration-time public key rejection.
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// A stored public key failed to decode at verification time.
    #[error("Invalid public key: {0}")]
    MalformedKey(String),

    /// Presented signature failed to decode.
    #[error("Invalid signature encoding: {0}")]
    MalformedSignature(String),

    /// Input validation failure.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    // -------------------------------------------------------------------------
    // Authorization state
    // -------------------------------------------------------------------------
    #[error("Terminal not found")]
    TerminalNotFound,

    #[error("Terminal is revoked")]
    TerminalRevoked,

    /// Well-formed signature that does not verify.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Covers unknown employee, deactivated employee and wrong PIN alike,
    /// so login failures don't reveal which part was wrong.
    #[error("Invalid employee number or PIN")]
    PinMismatch,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("Missing POS session header")]
    MissingSessionHeader,

    /// Offline verification hash does not match the presented triple.
    #[error("Invalid offline verification hash")]
    InvalidOfflineToken,

    // -------------------------------------------------------------------------
    // Business rules
    // -------------------------------------------------------------------------
    #[error("Terminal ID already exists")]
    DuplicateTerminal,

    #[error("Employee number already exists")]
    DuplicateEmployee,

    #[error("Product {product_id} not found")]
    ProductNotFound { product_id: String },

    #[error("Insufficient stock for product {product_id}. Available: {available}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// First violated coupon eligibility rule, verbatim.
    #[error("Coupon error: {0}")]
    CouponRejected(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Sale {0} has already been refunded")]
    AlreadyRefunded(String),

    // -------------------------------------------------------------------------
    // Storage
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Db(#[from] DbError),
}

impl PosError {
    /// Classifies the error for response mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PosError::TimestampOutOfRange
            | PosError::InvalidKey(_)
            | PosError::MalformedKey(_)
            | PosError::MalformedSignature(_)
            | PosError::Validation(_) => ErrorKind::Validation,

            PosError::TerminalNotFound
            | PosError::TerminalRevoked
            | PosError::InvalidSignature
            | PosError::PinMismatch
            | PosError::SessionNotFound
            | PosError::SessionExpired
            | PosError::MissingSessionHeader
            | PosError::InvalidOfflineToken => ErrorKind::Authorization,

            PosError::DuplicateTerminal
            | PosError::DuplicateEmployee
            | PosError::ProductNotFound { .. }
            | PosError::InsufficientStock { .. }
            | PosError::CouponRejected(_)
            | PosError::SaleNotFound(_)
            | PosError::AlreadyRefunded(_) => ErrorKind::BusinessRule,

            PosError::Db(_) => ErrorKind::Storage,
        }
    }

    /// The message the session-header surface presents.
    ///
    /// Both dead-session cases collapse to one string so a probing client
    /// cannot distinguish "never existed" from "expired".
    pub fn response_message(&self) -> String {
        match self {
            PosError::SessionNotFound | PosError::SessionExpired => {
                "Invalid or expired session".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Map crypto errors into the service taxonomy.
///
/// Registration paths override this mapping with [`PosError::InvalidKey`]
/// where the key is caller input rather than stored state.
impl From<CoreError> for PosError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidKeyLength { .. } | CoreError::MalformedKey { .. } => {
                PosError::MalformedKey(err.to_string())
            }
            CoreError::MalformedSignature { reason } => PosError::MalformedSignature(reason),
            CoreError::SignatureMismatch => PosError::InvalidSignature,
            CoreError::Validation(v) => PosError::Validation(v),
        }
    }
}

/// Result type for service operations.
pub type PosResult<T> = Result<T, PosError>;
