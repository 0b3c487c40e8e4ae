//! # Sale Processor
//!
//! The checkout pipeline that every sale - live or replayed - runs through.
//!
//! ## Pipeline Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. session check          (authorization; live sales only)            │
//! │  2. ledger.reserve         (read-time stock gate, pricing snapshot)    │
//! │  3. coupon validate+price  (business rules; no mutation yet)           │
//! │  4. sales.insert           ← DURABILITY POINT                          │
//! │  5. ledger.deduct          (failure = logged inconsistency)            │
//! │  6. coupon usage bump      (advisory; failure logged)                  │
//! │                                                                         │
//! │  Steps 1-3 reject with NO partial state. From step 4 on, the sale      │
//! │  exists; later failures are reconciliation cases, never lost sales.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PosConfig;
use crate::coupon::{AppliedCoupon, CouponEngine};
use crate::error::{PosError, PosResult};
use crate::session::SessionManager;
use crate::stock::StockLedger;
use fairgate_core::{CartLine, SaleRecord, SaleSource, SaleStatus};
use fairgate_db::{Database, DbError, SaleRepository};

/// A live sale request from a terminal.
#[derive(Debug, Clone)]
pub struct SaleRequest {
    pub items: Vec<CartLine>,
    pub payment_method: String,
    /// Overrides the session's event binding when set.
    pub event_id: Option<String>,
    /// Overrides the session's terminal when set (roaming handhelds).
    pub terminal_id: Option<String>,
    pub coupon_code: Option<String>,
}

/// What the terminal gets back for its receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleOutcome {
    pub sale_id: String,
    pub timestamp: i64,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub coupon_code: Option<String>,
}

/// Runs the checkout pipeline.
#[derive(Debug, Clone)]
pub struct SaleProcessor {
    sessions: SessionManager,
    ledger: StockLedger,
    coupons: CouponEngine,
    sales: SaleRepository,
}

impl SaleProcessor {
    /// Creates a processor with the injected configuration.
    pub fn new(db: &Database, config: PosConfig) -> Self {
        SaleProcessor {
            sessions: SessionManager::new(db, config),
            ledger: StockLedger::new(db),
            coupons: CouponEngine::new(db),
            sales: db.sales(),
        }
    }

    /// Records a live sale under a verified session.
    pub async fn record_sale(
        &self,
        session_id: &str,
        request: SaleRequest,
    ) -> PosResult<SaleOutcome> {
        let session = self.sessions.verify(session_id).await?;

        let reserved = self.ledger.reserve(&request.items).await?;
        let subtotal: i64 = reserved.iter().map(|line| line.subtotal).sum();

        let event_id = request.event_id.or(session.event_id);
        let applied = match &request.coupon_code {
            Some(code) => Some(
                self.coupons
                    .apply_to_cart(
                        code,
                        &reserved,
                        session.publisher_id.as_deref(),
                        event_id.as_deref(),
                    )
                    .await?,
            ),
            None => None,
        };

        let discount_amount = applied.as_ref().map_or(0, |a| a.discount_amount);
        let now = Utc::now();

        let sale = SaleRecord {
            sale_id: Uuid::new_v4().to_string(),
            timestamp: now.timestamp(),
            items_json: serde_json::to_string(&reserved).map_err(DbError::Serialization)?,
            subtotal: applied.as_ref().map(|_| subtotal),
            discount_amount,
            total_amount: subtotal - discount_amount,
            payment_method: request.payment_method,
            status: SaleStatus::Completed,
            employee_number: session.employee_number.clone(),
            terminal_id: request.terminal_id.or(Some(session.terminal_id)),
            event_id,
            coupon_id: applied.as_ref().map(|a| a.coupon_id.clone()),
            coupon_code: applied.as_ref().map(|a| a.code.clone()),
            source: SaleSource::Pos,
            created_at: now,
            synced_at: None,
        };

        self.sales.insert(&sale).await?;
        self.finish_durable_sale(&sale, &reserved, applied.as_ref())
            .await;

        info!(
            sale_id = %sale.sale_id,
            total = %sale.total_amount,
            employee = %sale.employee_number,
            "Sale recorded"
        );

        Ok(SaleOutcome {
            sale_id: sale.sale_id,
            timestamp: sale.timestamp,
            subtotal,
            discount_amount,
            total_amount: sale.total_amount,
            coupon_code: sale.coupon_code,
        })
    }

    /// Fetches a sale for receipt display under a verified session.
    pub async fn get_sale(&self, session_id: &str, sale_id: &str) -> PosResult<SaleRecord> {
        self.sessions.verify(session_id).await?;
        self.sales
            .get(sale_id)
            .await?
            .ok_or_else(|| PosError::SaleNotFound(sale_id.to_string()))
    }

    /// Refunds a completed sale: marks it refunded (exactly once) and
    /// restores its stock through the compensating path.
    pub async fn refund(&self, session_id: &str, sale_id: &str) -> PosResult<SaleRecord> {
        self.sessions.verify(session_id).await?;

        let mut sale = self
            .sales
            .get(sale_id)
            .await?
            .ok_or_else(|| PosError::SaleNotFound(sale_id.to_string()))?;

        self.sales.mark_refunded(sale_id).await.map_err(|e| match e {
            DbError::ConditionFailed { .. } => PosError::AlreadyRefunded(sale_id.to_string()),
            other => other.into(),
        })?;
        sale.status = SaleStatus::Refunded;

        // The refund is durable; a failed restore is an inconsistency the
        // history trail surfaces, not a failed refund.
        if let Err(err) = self.ledger.restore(&sale).await {
            warn!(sale_id = %sale_id, error = %err, "Stock restore failed after refund");
        }

        info!(sale_id = %sale_id, "Sale refunded");
        Ok(sale)
    }

    /// Deduction and usage bump for a durably persisted sale. Failures
    /// are logged, never surfaced - the sale already succeeded.
    pub(crate) async fn finish_durable_sale(
        &self,
        sale: &SaleRecord,
        reserved: &[fairgate_core::ReservedLine],
        applied: Option<&AppliedCoupon>,
    ) {
        if let Err(err) = self
            .ledger
            .deduct(reserved, &sale.sale_id, &sale.employee_number)
            .await
        {
            warn!(
                sale_id = %sale.sale_id,
                error = %err,
                "Stock deduction failed after sale was recorded"
            );
        }

        if let Some(applied) = applied {
            if let Err(err) = self.coupons.increment_usage(&applied.coupon_id).await {
                warn!(
                    coupon_id = %applied.coupon_id,
                    error = %err,
                    "Coupon usage increment failed"
                );
            }
        }
    }

    /// The session manager this processor authenticates against.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The stock ledger this processor deducts through.
    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    /// The coupon engine this processor prices with.
    pub fn coupons(&self) -> &CouponEngine {
        &self.coupons
    }

    pub(crate) fn sales(&self) -> &SaleRepository {
        &self.sales
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
