//! # fairgate-db: Database Layer for Fairgate POS
//!
//! This crate provides database access for the Fairgate POS system.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Fairgate POS Data Flow                            │
//! │                                                                         │
//! │  Service call (e.g. StockLedger::reserve)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    fairgate-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (terminal.rs) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ TerminalRepo  │    │ 001_init.sql │  │   │
//! │  │   │ Management    │    │ StockRepo ... │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                        SQLite Database                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (terminal, stock, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fairgate_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/fairgate.db")).await?;
//! let terminal = db.terminals().get("term-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::coupon::CouponRepository;
pub use repository::employee::EmployeeRepository;
pub use repository::offline::OfflineQueueRepository;
pub use repository::sale::SaleRepository;
pub use repository::session::SessionRepository;
pub use repository::stock::StockRepository;
pub use repository::terminal::TerminalRepository;
