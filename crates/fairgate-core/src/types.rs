//! # Domain Types
//!
//! Core domain types used throughout Fairgate POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Terminal     │   │ EmployeeSession │   │     Coupon      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  terminal_id    │   │  session_id     │   │  coupon_id      │       │
//! │  │  public_key     │   │  employee_number│   │  code (UPPER)   │       │
//! │  │  status         │   │  expires_at     │   │  discount_type  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockItem     │   │   SaleRecord    │   │OfflineSaleRecord│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_id     │   │  sale_id        │   │  local_sale_id  │       │
//! │  │  stock_quantity │   │  items (JSON)   │   │  sync_status    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Clock Conventions
//! - Wall-clock audit fields are `DateTime<Utc>`
//! - Handshake timestamps and session expiry are unix seconds (`i64`),
//!   because they participate in signed/HMAC'd messages and must be stable
//! - Stock history sort keys are unix milliseconds (`i64`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Terminal
// =============================================================================

/// Lifecycle status of a registered terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    /// Terminal may authenticate and record sales.
    Active,
    /// Terminal is blocked. Revocation is permanent; re-enrollment requires
    /// a fresh registration under a new terminal_id.
    Revoked,
}

/// A physical POS device holding an Ed25519 keypair.
/// Only the public half is ever server-known.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Terminal {
    /// Opaque identifier chosen by the device at enrollment (UUID).
    pub terminal_id: String,

    /// Base64-encoded 32-byte Ed25519 public key.
    pub public_key: String,

    /// Human-readable device name shown in admin listings.
    pub device_name: String,

    /// OS family reported at enrollment (macos, windows, android, ...).
    pub os_type: String,

    pub status: TerminalStatus,

    /// user_id of the administrator who approved the enrollment.
    pub registered_by: String,

    pub registered_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,

    /// Best-effort telemetry; updated on each verified handshake.
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Terminal {
    /// Whether this terminal may authenticate.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == TerminalStatus::Active
    }
}

// =============================================================================
// Employee & Session
// =============================================================================

/// A POS employee. The PIN is never stored; only its HMAC-SHA256 hash is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Employee {
    /// 7-digit business identifier. Doubles as the salt for PIN hashing.
    pub employee_number: String,

    pub display_name: String,

    /// HMAC-SHA256(secret, "{employee_number}:{pin}") as lowercase hex.
    #[serde(skip_serializing)]
    pub pin_hash: String,

    /// Optional publisher (circle) the employee sells for.
    pub publisher_id: Option<String>,

    /// Default event binding applied to new sessions.
    pub event_id: Option<String>,

    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A bounded-lifetime credential issued after PIN verification,
/// scoped to one terminal and optionally one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct EmployeeSession {
    pub session_id: String,
    pub employee_number: String,
    pub terminal_id: String,
    pub display_name: String,
    pub publisher_id: Option<String>,

    /// Settable post-creation via set_session_event; sales under the
    /// session inherit it.
    pub event_id: Option<String>,

    /// Unix seconds.
    pub issued_at: i64,

    /// Unix seconds. Expiry is checked lazily at verification time;
    /// there is no background sweep.
    pub expires_at: i64,
}

impl EmployeeSession {
    /// Lazy expiry check against the given clock (unix seconds).
    #[inline]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

/// A freshly issued or refreshed session together with the HMAC that lets
/// the terminal re-validate it without a network round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGrant {
    pub session: EmployeeSession,

    /// HMAC-SHA256(secret, "{session_id}:{employee_number}:{expires_at}").
    pub offline_verification_hash: String,
}

/// The triple a terminal caches for offline session validation, plus the
/// hash it was issued with. Verification recomputes the HMAC locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineSessionToken {
    pub session_id: String,
    pub employee_number: String,
    pub expires_at: i64,
    pub offline_verification_hash: String,
}

// =============================================================================
// Coupon
// =============================================================================

/// How a coupon's discount_value is interpreted.
///
/// A closed variant, not a string tag: calculate_discount matches
/// exhaustively and new types are compile-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// discount_value is an absolute amount.
    Fixed,
    /// discount_value is a percentage of the applicable base (0-100).
    Percentage,
}

/// Optional restriction of the discountable base to matching cart lines.
/// An empty filter means the entire cart is eligible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponFilter {
    #[serde(default)]
    pub product_ids: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl CouponFilter {
    /// A line is eligible if its product id or category is listed.
    pub fn matches(&self, product_id: &str, category: &str) -> bool {
        (!self.product_ids.is_empty() && self.product_ids.iter().any(|p| p == product_id))
            || (!self.categories.is_empty() && self.categories.iter().any(|c| c == category))
    }

    pub fn is_empty(&self) -> bool {
        self.product_ids.is_empty() && self.categories.is_empty()
    }
}

/// A promotional coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Coupon {
    pub coupon_id: String,

    /// Unique redemption code, normalized to upper-case on creation so
    /// lookups are case-insensitive exact matches.
    pub code: String,

    pub name: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,

    /// None = unlimited.
    pub usage_limit: Option<i64>,

    /// Incremented only after a sale referencing the coupon is durably
    /// recorded; best-effort under concurrency.
    pub usage_count: i64,

    pub min_purchase_amount: Option<i64>,

    /// Upper bound on the computed discount (applies to both types).
    pub max_discount_amount: Option<i64>,

    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,

    /// When set, the coupon only applies to sessions selling for this
    /// publisher / at this event.
    pub publisher_id: Option<String>,
    pub event_id: Option<String>,

    /// JSON-encoded [`CouponFilter`], or NULL for no filter.
    pub filter_json: Option<String>,

    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Parses the cart filter, if any. A present-but-empty filter is
    /// treated as no filter.
    pub fn filter(&self) -> Option<CouponFilter> {
        self.filter_json
            .as_deref()
            .and_then(|raw| serde_json::from_str::<CouponFilter>(raw).ok())
            .filter(|f| !f.is_empty())
    }
}

// =============================================================================
// Stock
// =============================================================================

/// Current stock level for one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockItem {
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub unit_price: i64,

    /// Invariant: never negative.
    pub stock_quantity: i64,

    pub updated_at: DateTime<Utc>,
}

/// One entry in the append-only stock audit trail.
///
/// Invariant: `quantity_after - quantity_before == quantity_change`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockHistoryEntry {
    pub product_id: String,

    /// Unix milliseconds; sort key within a product's trail.
    pub timestamp: i64,

    pub quantity_before: i64,
    pub quantity_after: i64,
    pub quantity_change: i64,

    /// Free-form audit reason (e.g. "sale (sale_id: ...)").
    pub reason: String,

    pub operator_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cart & Reservation
// =============================================================================

/// A requested sale line as submitted by the terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,

    /// Unit price the cashier sold at. Event pricing can differ from the
    /// listed stock price, so the terminal's value is authoritative.
    pub unit_price: i64,
}

/// Snapshot produced by a stock reservation.
///
/// This is a read-time check, not a lock: it freezes the name, price and
/// observed stock used to compute totals before the deduction write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservedLine {
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub subtotal: i64,

    /// Stock observed at reservation time; the later deduction writes
    /// `current_stock - quantity`.
    pub current_stock: i64,
}

// =============================================================================
// Sale
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
    Refunded,
}

/// Where a sale originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleSource {
    /// Recorded live against the server.
    Pos,
    /// Recorded on-device while disconnected, replayed later.
    PosOffline,
}

/// A durably recorded sale. Cart lines are stored as a JSON payload of
/// [`ReservedLine`]s, frozen at sale time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleRecord {
    pub sale_id: String,

    /// Unix seconds. For offline sales this is the terminal's clock.
    pub timestamp: i64,

    /// JSON array of [`ReservedLine`].
    pub items_json: String,

    /// Pre-discount subtotal; only recorded when a coupon was applied.
    pub subtotal: Option<i64>,

    pub discount_amount: i64,
    pub total_amount: i64,
    pub payment_method: String,
    pub status: SaleStatus,
    pub employee_number: String,
    pub terminal_id: Option<String>,
    pub event_id: Option<String>,
    pub coupon_id: Option<String>,
    pub coupon_code: Option<String>,
    pub source: SaleSource,
    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl SaleRecord {
    /// Decodes the frozen cart lines.
    pub fn lines(&self) -> Result<Vec<ReservedLine>, serde_json::Error> {
        serde_json::from_str(&self.items_json)
    }
}

// =============================================================================
// Offline Sale Queue
// =============================================================================

/// Sync state of an offline-recorded sale.
/// `Synced` and `Failed` are terminal (absorbing) states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

/// The sale data a terminal captured while disconnected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineSalePayload {
    pub items: Vec<CartLine>,
    pub total_amount: i64,
    pub payment_method: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    /// Pre-discount subtotal when a coupon was applied offline.
    #[serde(default)]
    pub subtotal: Option<i64>,
}

/// A queued offline sale as submitted on reconnection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineSaleSubmission {
    /// Client-generated idempotency key.
    pub local_sale_id: String,
    pub terminal_id: String,
    pub employee_number: String,
    pub session_id: String,

    /// Terminal clock at capture time, unix seconds. Used for audit
    /// fields only; expiry decisions use the server clock.
    pub recorded_at: i64,

    pub payload: OfflineSalePayload,
}

/// Persisted queue row tracking the per-`local_sale_id` state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OfflineSaleRecord {
    pub local_sale_id: String,
    pub terminal_id: String,
    pub employee_number: String,
    pub session_id: String,

    /// JSON-encoded [`OfflineSalePayload`].
    pub payload_json: String,

    pub recorded_at: i64,
    pub sync_status: SyncStatus,

    /// Server-side sale id once synced.
    pub sale_id: Option<String>,

    /// Business-rule rejection reason once failed.
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl OfflineSaleRecord {
    /// Decodes the captured sale payload.
    pub fn payload(&self) -> Result<OfflineSalePayload, serde_json::Error> {
        serde_json::from_str(&self.payload_json)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry_is_lazy() {
        let session = EmployeeSession {
            session_id: "s".into(),
            employee_number: "1234567".into(),
            terminal_id: "t".into(),
            display_name: "Cashier".into(),
            publisher_id: None,
            event_id: None,
            issued_at: 1_000,
            expires_at: 2_000,
        };
        assert!(!session.is_expired(1_999));
        assert!(!session.is_expired(2_000));
        assert!(session.is_expired(2_001));
    }

    #[test]
    fn test_coupon_filter_matches() {
        let filter = CouponFilter {
            product_ids: vec!["p-1".into()],
            categories: vec!["books".into()],
        };
        assert!(filter.matches("p-1", "goods"));
        assert!(filter.matches("p-9", "books"));
        assert!(!filter.matches("p-9", "goods"));
    }

    #[test]
    fn test_empty_filter_json_is_no_filter() {
        let coupon = Coupon {
            coupon_id: "c".into(),
            code: "SPRING".into(),
            name: String::new(),
            discount_type: DiscountType::Fixed,
            discount_value: 100,
            usage_limit: None,
            usage_count: 0,
            min_purchase_amount: None,
            max_discount_amount: None,
            valid_from: None,
            valid_until: None,
            publisher_id: None,
            event_id: None,
            filter_json: Some(r#"{"product_ids":[],"categories":[]}"#.into()),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(coupon.filter().is_none());
    }

    #[test]
    fn test_offline_payload_roundtrip() {
        let raw = r#"{"items":[{"product_id":"p-1","quantity":2,"unit_price":500}],"total_amount":1000,"payment_method":"cash"}"#;
        let payload: OfflineSalePayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.total_amount, 1000);
        assert!(payload.coupon_code.is_none());
    }
}
