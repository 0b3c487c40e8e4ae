//! # fairgate-pos: Service Layer for Fairgate POS
//!
//! The request-facing services of the trust-and-consistency core.
//!
//! ## Control Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  terminal signs handshake                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SignatureVerifier + TerminalRegistry authenticate the device          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  employee presents a PIN → SessionManager issues a session             │
//! │  (plus an offline-verification hash usable without connectivity)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sale requests carry the session → SaleProcessor:                      │
//! │      StockLedger reserves → CouponEngine prices → sale persists        │
//! │      → StockLedger deducts                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  if the terminal was offline, OfflineSyncQueue later replays the       │
//! │  same sale exactly once                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! StockLedger and CouponEngine are leaf components; SessionManager and
//! SignatureVerifier depend only on the terminal/employee stores;
//! OfflineSyncQueue composes all of them.
//!
//! ## Modules
//!
//! - [`config`] - Shared secret and time constants, injected everywhere
//! - [`terminal`] - [`terminal::TerminalRegistry`]
//! - [`handshake`] - [`handshake::SignatureVerifier`]
//! - [`session`] - [`session::SessionManager`]
//! - [`stock`] - [`stock::StockLedger`]
//! - [`coupon`] - [`coupon::CouponEngine`]
//! - [`checkout`] - [`checkout::SaleProcessor`]
//! - [`sync`] - [`sync::OfflineSyncQueue`]
//! - [`error`] - [`error::PosError`] and the response taxonomy

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod config;
pub mod coupon;
pub mod error;
pub mod handshake;
pub mod session;
pub mod stock;
pub mod sync;
pub mod terminal;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{SaleOutcome, SaleProcessor, SaleRequest};
pub use config::{PosConfig, DEFAULT_REPLAY_WINDOW_SECS, DEFAULT_SESSION_LIFETIME_SECS};
pub use coupon::{AppliedCoupon, CouponEngine, NewCoupon};
pub use error::{ErrorKind, PosError, PosResult};
pub use handshake::{Handshake, SignatureVerifier};
pub use session::{NewEmployee, SessionManager};
pub use stock::StockLedger;
pub use sync::{FailedSale, OfflineSyncQueue, SubmitOutcome, SyncReport};
pub use terminal::{TerminalEnrollment, TerminalRegistry};
