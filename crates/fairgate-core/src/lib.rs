//! # fairgate-core: Pure Business Logic for Fairgate POS
//!
//! This crate is the **heart** of Fairgate POS. It contains the business
//! rules of the trust-and-consistency core as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Fairgate POS Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 fairgate-pos (Service Layer)                    │   │
//! │  │  TerminalRegistry · SignatureVerifier · SessionManager          │   │
//! │  │  StockLedger · CouponEngine · SaleProcessor · OfflineSyncQueue  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ fairgate-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  crypto   │  │  coupon   │  │ validation│  │   │
//! │  │   │ Terminal  │  │ Ed25519   │  │ eligibility│ │   rules   │  │   │
//! │  │   │  Session  │  │ HMAC-SHA2 │  │ discounts │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  fairgate-db (Database Layer)                   │   │
//! │  │             SQLite queries, migrations, repositories            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Terminal, EmployeeSession, Coupon, ...)
//! - [`crypto`] - Ed25519 handshake verification and HMAC-SHA256 integrity
//! - [`coupon`] - Coupon eligibility and discount math
//! - [`validation`] - Input validation rules
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: the same HMAC and discount math runs on terminals
//!    (offline verification) and on the server
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Amounts**: all monetary values are `i64` minor units
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coupon;
pub mod crypto;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::{
    CartLine, Coupon, CouponFilter, DiscountType, Employee, EmployeeSession, OfflineSalePayload,
    OfflineSaleRecord, OfflineSaleSubmission, OfflineSessionToken, ReservedLine, SaleRecord,
    SaleSource, SaleStatus, SessionGrant, StockHistoryEntry, StockItem, SyncStatus, Terminal,
    TerminalStatus,
};
