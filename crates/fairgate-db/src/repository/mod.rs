//! # Repository Module
//!
//! Database repository implementations for Fairgate POS.
//!
//! ## Conditional Single-Row Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The store contract: single-item conditional writes only.              │
//! │                                                                         │
//! │  Existence-gated insert:                                               │
//! │    INSERT OR IGNORE INTO terminals ...      → rows_affected == 0       │
//! │    means the id already existed (no pre-read, no race)                 │
//! │                                                                         │
//! │  Precondition-gated update:                                            │
//! │    UPDATE offline_sales_queue                                          │
//! │    SET sync_status = 'synced'                                          │
//! │    WHERE local_sale_id = ? AND sync_status = 'pending'                 │
//! │                                             → rows_affected == 0       │
//! │    means someone else performed the transition first                   │
//! │                                                                         │
//! │  There are NO cross-row transactions here: multi-step flows in the    │
//! │  service layer are sagas of these individually-atomic statements.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`terminal::TerminalRepository`] - Terminal keys and lifecycle
//! - [`employee::EmployeeRepository`] - POS employees and PIN hashes
//! - [`session::SessionRepository`] - Employee sessions
//! - [`stock::StockRepository`] - Stock levels and the audit trail
//! - [`coupon::CouponRepository`] - Coupons and usage counters
//! - [`sale::SaleRepository`] - Durable sale records
//! - [`offline::OfflineQueueRepository`] - Offline sale queue

pub mod coupon;
pub mod employee;
pub mod offline;
pub mod sale;
pub mod session;
pub mod stock;
pub mod terminal;
