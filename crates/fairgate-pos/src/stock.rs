//! # Stock Ledger
//!
//! The reserve → deduct → restore saga over single-item writes.
//!
//! ## Why a Saga
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The store offers single-row atomic writes only - no multi-row         │
//! │  transactions. A sale touching N products is therefore N independent   │
//! │  round trips with compensating actions instead of one ACID commit:     │
//! │                                                                         │
//! │  reserve   read-time availability check; snapshot of name, price and   │
//! │            observed stock per line. NOT a lock.                        │
//! │  deduct    after the sale record is durable: write                     │
//! │            snapshot_stock - quantity per line, append history          │
//! │  restore   compensate a refunded sale: re-read CURRENT stock and add   │
//! │            the quantity back (safe even if other mutations landed in   │
//! │            between), append a compensating history entry               │
//! │                                                                         │
//! │  Accepted race: two concurrent reservations of one product can both    │
//! │  observe sufficient stock and both proceed. The schema floor           │
//! │  (stock_quantity >= 0) bounds the damage; the history trail is the     │
//! │  reconciliation record.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{PosError, PosResult};
use fairgate_core::{validation, CartLine, ReservedLine, SaleRecord, StockHistoryEntry, StockItem};
use fairgate_db::{Database, StockRepository};

/// Reserves, deducts and restores stock, maintaining the audit trail.
#[derive(Debug, Clone)]
pub struct StockLedger {
    stock: StockRepository,
}

impl StockLedger {
    /// Creates a ledger backed by the given database.
    pub fn new(db: &Database) -> Self {
        StockLedger { stock: db.stock() }
    }

    /// Checks availability for every cart line and snapshots pricing data.
    ///
    /// Read-time check only: nothing is written, and a concurrent
    /// reservation can observe the same stock. Fails before any snapshot
    /// is returned, so a partial cart never reaches the caller.
    pub async fn reserve(&self, items: &[CartLine]) -> PosResult<Vec<ReservedLine>> {
        validation::validate_cart(items)?;

        let mut reserved = Vec::with_capacity(items.len());

        for item in items {
            let stock_item = self.stock.get(&item.product_id).await?.ok_or_else(|| {
                PosError::ProductNotFound {
                    product_id: item.product_id.clone(),
                }
            })?;

            if stock_item.stock_quantity < item.quantity {
                return Err(PosError::InsufficientStock {
                    product_id: item.product_id.clone(),
                    available: stock_item.stock_quantity,
                    requested: item.quantity,
                });
            }

            reserved.push(ReservedLine {
                product_id: item.product_id.clone(),
                product_name: stock_item.product_name,
                category: stock_item.category,
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.unit_price * item.quantity,
                current_stock: stock_item.stock_quantity,
            });
        }

        debug!(lines = reserved.len(), "Cart reserved");
        Ok(reserved)
    }

    /// Writes the deductions for a persisted sale.
    ///
    /// Per line: `new_stock = snapshot_stock - quantity`, unconditionally,
    /// plus a history entry tagged with the sale id. Runs only after the
    /// sale record is durable - a failure here is an inconsistency for
    /// out-of-band reconciliation, which is why the caller logs rather
    /// than fails the sale.
    pub async fn deduct(
        &self,
        reserved: &[ReservedLine],
        sale_id: &str,
        operator_id: &str,
    ) -> PosResult<()> {
        for line in reserved {
            let new_stock = line.current_stock - line.quantity;

            self.stock
                .set_quantity(&line.product_id, new_stock, Utc::now())
                .await?;

            self.record_history(
                &line.product_id,
                line.current_stock,
                new_stock,
                format!("sale (sale_id: {})", sale_id),
                operator_id,
            )
            .await;
        }

        debug!(sale_id = %sale_id, lines = reserved.len(), "Stock deducted");
        Ok(())
    }

    /// Compensates a refunded sale.
    ///
    /// Re-reads current stock and adds each line's quantity back - a
    /// relative restore, not an undo of the exact prior delta, so it is
    /// safe even if other mutations occurred in between. Lines whose
    /// product has since been removed are skipped.
    pub async fn restore(&self, sale: &SaleRecord) -> PosResult<()> {
        let lines = sale
            .lines()
            .map_err(fairgate_db::DbError::Serialization)?;

        for line in &lines {
            let Some(stock_item) = self.stock.get(&line.product_id).await? else {
                warn!(
                    product_id = %line.product_id,
                    sale_id = %sale.sale_id,
                    "Product missing during restore; skipping line"
                );
                continue;
            };

            let new_stock = stock_item.stock_quantity + line.quantity;
            self.stock
                .set_quantity(&line.product_id, new_stock, Utc::now())
                .await?;

            self.record_history(
                &line.product_id,
                stock_item.stock_quantity,
                new_stock,
                format!("sale cancelled (sale_id: {})", sale.sale_id),
                &sale.employee_number,
            )
            .await;
        }

        debug!(sale_id = %sale.sale_id, lines = lines.len(), "Stock restored");
        Ok(())
    }

    /// Manual stock adjustment (restock, damage, recount).
    ///
    /// Signed `quantity_change` with a mandatory reason; rejects
    /// adjustments that would drive stock negative.
    pub async fn adjust(
        &self,
        product_id: &str,
        quantity_change: i64,
        reason: &str,
        operator_id: &str,
    ) -> PosResult<StockItem> {
        let stock_item =
            self.stock
                .get(product_id)
                .await?
                .ok_or_else(|| PosError::ProductNotFound {
                    product_id: product_id.to_string(),
                })?;

        let new_stock = stock_item.stock_quantity + quantity_change;
        if new_stock < 0 {
            return Err(PosError::InsufficientStock {
                product_id: product_id.to_string(),
                available: stock_item.stock_quantity,
                requested: -quantity_change,
            });
        }

        self.stock
            .set_quantity(product_id, new_stock, Utc::now())
            .await?;

        self.record_history(
            product_id,
            stock_item.stock_quantity,
            new_stock,
            reason.to_string(),
            operator_id,
        )
        .await;

        Ok(StockItem {
            stock_quantity: new_stock,
            updated_at: Utc::now(),
            ..stock_item
        })
    }

    /// A product's audit trail, newest first.
    pub async fn history(
        &self,
        product_id: &str,
        limit: u32,
    ) -> PosResult<Vec<StockHistoryEntry>> {
        Ok(self.stock.history(product_id, limit).await?)
    }

    /// Appends a trail entry. The trail is an audit record: an append
    /// failure is logged, never allowed to fail the quantity write it
    /// describes.
    async fn record_history(
        &self,
        product_id: &str,
        quantity_before: i64,
        quantity_after: i64,
        reason: String,
        operator_id: &str,
    ) {
        let now = Utc::now();
        let entry = StockHistoryEntry {
            product_id: product_id.to_string(),
            timestamp: now.timestamp_millis(),
            quantity_before,
            quantity_after,
            quantity_change: quantity_after - quantity_before,
            reason,
            operator_id: operator_id.to_string(),
            created_at: now,
        };

        if let Err(err) = self.stock.append_history(&entry).await {
            warn!(
                product_id = %product_id,
                error = %err,
                "Stock history append failed"
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
