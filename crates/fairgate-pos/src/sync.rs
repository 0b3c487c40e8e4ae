//! # Offline Sync Queue
//!
//! Idempotent ingestion and replay of sales recorded while a terminal was
//! disconnected.
//!
//! ## Idempotency Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  submit(local_sale_id, ...)                                            │
//! │       │                                                                 │
//! │       ├── already synced?  → return the prior result, run NOTHING      │
//! │       ├── already failed?  → return the prior rejection; an operator   │
//! │       │                      reconciles, it is never auto-retried      │
//! │       │                                                                 │
//! │       └── first seen (or a pending row from a crashed attempt):        │
//! │             claim pending → reserve → coupon → persist → deduct        │
//! │             → conditional transition pending → synced / failed         │
//! │                                                                         │
//! │  The replayed sale's sale_id IS the local_sale_id, so even a crashed   │
//! │  attempt that persisted the sale cannot produce a second sale record   │
//! │  or a second deduction when the terminal retries.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Audit fields carry the terminal's recorded clock; expiry decisions
//! (coupon validity windows) use the server clock. The session the sale
//! was made under is not re-verified here - the terminal verified its
//! cached session offline at capture time, and the shift may be long over
//! by the time connectivity returns.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checkout::SaleProcessor;
use crate::config::PosConfig;
use crate::error::{ErrorKind, PosError, PosResult};
use fairgate_core::{
    OfflineSaleRecord, OfflineSaleSubmission, SaleRecord, SaleSource, SaleStatus, SyncStatus,
};
use fairgate_db::{Database, DbError, OfflineQueueRepository};

/// Result of one submission, terminal-facing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Synced {
        local_sale_id: String,
        sale_id: String,
        /// True when this call returned a previously settled result
        /// instead of running the pipeline.
        already_synced: bool,
    },
    Failed {
        local_sale_id: String,
        reason: String,
    },
}

/// Batch report for a reconnection flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub synced_count: usize,
    pub failed_items: Vec<FailedSale>,
    /// Server clock, unix seconds.
    pub sync_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSale {
    pub local_sale_id: String,
    pub reason: String,
}

/// Applies offline-recorded sales at most once each.
#[derive(Debug, Clone)]
pub struct OfflineSyncQueue {
    queue: OfflineQueueRepository,
    processor: SaleProcessor,
}

impl OfflineSyncQueue {
    /// Creates a queue with the injected configuration.
    pub fn new(db: &Database, config: PosConfig) -> Self {
        OfflineSyncQueue {
            queue: db.offline_queue(),
            processor: SaleProcessor::new(db, config),
        }
    }

    /// Submits one offline sale.
    ///
    /// Safe against terminal retries after a dropped response: a settled
    /// `local_sale_id` short-circuits to its prior result. Storage errors
    /// propagate and leave the row pending for a later retry.
    pub async fn submit(&self, submission: OfflineSaleSubmission) -> PosResult<SubmitOutcome> {
        let local_sale_id = submission.local_sale_id.clone();

        if let Some(existing) = self.queue.get(&local_sale_id).await? {
            match existing.sync_status {
                SyncStatus::Synced => {
                    return Ok(SubmitOutcome::Synced {
                        sale_id: existing.sale_id.unwrap_or_else(|| local_sale_id.clone()),
                        local_sale_id,
                        already_synced: true,
                    });
                }
                SyncStatus::Failed => {
                    return Ok(SubmitOutcome::Failed {
                        reason: existing
                            .error_message
                            .unwrap_or_else(|| "sync previously failed".to_string()),
                        local_sale_id,
                    });
                }
                // A crashed or concurrent earlier attempt; resume it.
                SyncStatus::Pending => {}
            }
        } else {
            self.queue.claim(&Self::pending_record(&submission)?).await?;
        }

        match self.replay(&submission).await {
            Ok(sale_id) => {
                let won = self
                    .queue
                    .mark_synced(&local_sale_id, &sale_id, Utc::now())
                    .await?;
                if !won {
                    // A concurrent duplicate settled the row first; defer
                    // to that result.
                    return self.settled_outcome(&local_sale_id).await;
                }

                info!(local_sale_id = %local_sale_id, sale_id = %sale_id, "Offline sale synced");
                Ok(SubmitOutcome::Synced {
                    local_sale_id,
                    sale_id,
                    already_synced: false,
                })
            }

            // Business-rule rejections (stock depleted during the offline
            // period, coupon no longer valid, malformed payload) settle the
            // row as failed for operator reconciliation.
            Err(err)
                if matches!(err.kind(), ErrorKind::BusinessRule | ErrorKind::Validation) =>
            {
                let reason = err.to_string();
                let won = self.queue.mark_failed(&local_sale_id, &reason).await?;
                if !won {
                    return self.settled_outcome(&local_sale_id).await;
                }

                warn!(local_sale_id = %local_sale_id, reason = %reason, "Offline sale rejected");
                Ok(SubmitOutcome::Failed {
                    local_sale_id,
                    reason,
                })
            }

            // Storage failures leave the row pending; the terminal retries.
            Err(err) => Err(err),
        }
    }

    /// Submits a batch, reporting per-item outcomes.
    ///
    /// A storage error on one item is reported but does not settle that
    /// item or stop the rest of the batch.
    pub async fn submit_batch(
        &self,
        submissions: Vec<OfflineSaleSubmission>,
    ) -> PosResult<SyncReport> {
        let mut synced_count = 0;
        let mut failed_items = Vec::new();

        for submission in submissions {
            let local_sale_id = submission.local_sale_id.clone();
            match self.submit(submission).await {
                Ok(SubmitOutcome::Synced { .. }) => synced_count += 1,
                Ok(SubmitOutcome::Failed { reason, .. }) => {
                    failed_items.push(FailedSale {
                        local_sale_id,
                        reason,
                    });
                }
                Err(err) => {
                    warn!(local_sale_id = %local_sale_id, error = %err, "Offline sale errored");
                    failed_items.push(FailedSale {
                        local_sale_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(SyncReport {
            synced_count,
            failed_items,
            sync_timestamp: Utc::now().timestamp(),
        })
    }

    /// A terminal's still-pending queue rows.
    pub async fn pending_for_terminal(
        &self,
        terminal_id: &str,
    ) -> PosResult<Vec<OfflineSaleRecord>> {
        Ok(self.queue.pending_for_terminal(terminal_id).await?)
    }

    /// Looks up one queue row by idempotency key.
    pub async fn get(&self, local_sale_id: &str) -> PosResult<Option<OfflineSaleRecord>> {
        Ok(self.queue.get(local_sale_id).await?)
    }

    // -------------------------------------------------------------------------
    // Replay pipeline
    // -------------------------------------------------------------------------

    /// Runs the sale pipeline for a submission. Returns the sale id.
    async fn replay(&self, submission: &OfflineSaleSubmission) -> PosResult<String> {
        let payload = &submission.payload;

        // A crashed earlier attempt may have persisted the sale (and
        // deducted) without settling the queue row. Re-running the reserve
        // against the already-deducted stock could spuriously reject the
        // record, so an existing sale short-circuits to settlement.
        if self
            .processor
            .sales()
            .get(&submission.local_sale_id)
            .await?
            .is_some()
        {
            return Ok(submission.local_sale_id.clone());
        }

        let reserved = self.processor.ledger().reserve(&payload.items).await?;
        let subtotal: i64 = reserved.iter().map(|line| line.subtotal).sum();

        let applied = match &payload.coupon_code {
            Some(code) => Some(
                self.processor
                    .coupons()
                    .apply_to_cart(code, &reserved, None, payload.event_id.as_deref())
                    .await?,
            ),
            None => None,
        };
        let discount_amount = applied.as_ref().map_or(0, |a| a.discount_amount);

        let now = Utc::now();
        let sale = SaleRecord {
            // The idempotency key doubles as the sale id: a retried replay
            // cannot create a second record.
            sale_id: submission.local_sale_id.clone(),
            timestamp: submission.recorded_at,
            items_json: serde_json::to_string(&reserved).map_err(DbError::Serialization)?,
            subtotal: applied.as_ref().map(|_| subtotal),
            discount_amount,
            total_amount: subtotal - discount_amount,
            payment_method: payload.payment_method.clone(),
            status: SaleStatus::Completed,
            employee_number: submission.employee_number.clone(),
            terminal_id: Some(submission.terminal_id.clone()),
            event_id: payload.event_id.clone(),
            coupon_id: applied.as_ref().map(|a| a.coupon_id.clone()),
            coupon_code: applied.as_ref().map(|a| a.code.clone()),
            source: SaleSource::PosOffline,
            created_at: now,
            synced_at: Some(now),
        };

        match self.processor.sales().insert(&sale).await {
            Ok(()) => {
                self.processor
                    .finish_durable_sale(&sale, &reserved, applied.as_ref())
                    .await;
            }
            // A crashed earlier attempt already persisted this sale. Do
            // not deduct again; whether ITS deduction landed is a
            // reconciliation question for the history trail.
            Err(DbError::UniqueViolation { .. }) => {
                warn!(
                    sale_id = %sale.sale_id,
                    "Replay found sale already persisted; skipping deduction"
                );
            }
            Err(other) => return Err(other.into()),
        }

        Ok(sale.sale_id)
    }

    fn pending_record(submission: &OfflineSaleSubmission) -> PosResult<OfflineSaleRecord> {
        Ok(OfflineSaleRecord {
            local_sale_id: submission.local_sale_id.clone(),
            terminal_id: submission.terminal_id.clone(),
            employee_number: submission.employee_number.clone(),
            session_id: submission.session_id.clone(),
            payload_json: serde_json::to_string(&submission.payload)
                .map_err(DbError::Serialization)?,
            recorded_at: submission.recorded_at,
            sync_status: SyncStatus::Pending,
            sale_id: None,
            error_message: None,
            created_at: Utc::now(),
            synced_at: None,
        })
    }

    /// Reads back a row someone else settled and renders its outcome.
    async fn settled_outcome(&self, local_sale_id: &str) -> PosResult<SubmitOutcome> {
        let record = self
            .queue
            .get(local_sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("OfflineSaleRecord", local_sale_id))?;

        Ok(match record.sync_status {
            SyncStatus::Synced | SyncStatus::Pending => SubmitOutcome::Synced {
                sale_id: record
                    .sale_id
                    .unwrap_or_else(|| local_sale_id.to_string()),
                local_sale_id: local_sale_id.to_string(),
                already_synced: true,
            },
            SyncStatus::Failed => SubmitOutcome::Failed {
                reason: record
                    .error_message
                    .unwrap_or_else(|| "sync previously failed".to_string()),
                local_sale_id: local_sale_id.to_string(),
            },
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fairgate_core::{CartLine, OfflineSalePayload, StockItem};
    use fairgate_db::DbConfig;

    struct Fixture {
        db: Database,
        queue: OfflineSyncQueue,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.stock()
            .insert(&StockItem {
                product_id: "p-1".to_string(),
                product_name: "Anthology Vol.1".to_string(),
                category: "books".to_string(),
                unit_price: 800,
                stock_quantity: 5,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        Fixture {
            queue: OfflineSyncQueue::new(&db, PosConfig::new("test-secret")),
            db,
        }
    }

    fn submission(local_sale_id: &str, quantity: i64) -> OfflineSaleSubmission {
        OfflineSaleSubmission {
            local_sale_id: local_sale_id.to_string(),
            terminal_id: "term-1".to_string(),
            employee_number: "1000001".to_string(),
            session_id: "s-1".to_string(),
            recorded_at: 1_700_000_000,
            payload: OfflineSalePayload {
                items: vec![CartLine {
                    product_id: "p-1".to_string(),
                    quantity,
                    unit_price: 800,
                }],
                total_amount: quantity * 800,
                payment_method: "cash".to_string(),
                event_id: None,
                coupon_code: None,
                subtotal: None,
            },
        }
    }

    #[tokio::test]
    async fn test_first_submission_applies_sale() {
        let f = fixture().await;

        let outcome = f.queue.submit(submission("local-1", 3)).await.unwrap();
        let SubmitOutcome::Synced {
            sale_id,
            already_synced,
            ..
        } = outcome
        else {
            panic!("expected synced outcome");
        };
        assert_eq!(sale_id, "local-1");
        assert!(!already_synced);

        // Stock deducted once; sale persisted with the terminal's clock
        // and the offline source tag.
        assert_eq!(
            f.db.stock().get("p-1").await.unwrap().unwrap().stock_quantity,
            2
        );
        let sale = f.db.sales().get("local-1").await.unwrap().unwrap();
        assert_eq!(sale.timestamp, 1_700_000_000);
        assert_eq!(sale.source, SaleSource::PosOffline);
        assert!(sale.synced_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_a_noop() {
        let f = fixture().await;

        f.queue.submit(submission("local-1", 3)).await.unwrap();
        let outcome = f.queue.submit(submission("local-1", 3)).await.unwrap();

        let SubmitOutcome::Synced {
            sale_id,
            already_synced,
            ..
        } = outcome
        else {
            panic!("expected synced outcome");
        };
        assert_eq!(sale_id, "local-1");
        assert!(already_synced);

        // One deduction, one sale record - not two.
        assert_eq!(
            f.db.stock().get("p-1").await.unwrap().unwrap().stock_quantity,
            2
        );
        let history = f.db.stock().history("p-1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_stock_depletion_settles_as_failed() {
        let f = fixture().await;

        // The shelf emptied while the terminal was offline.
        let outcome = f.queue.submit(submission("local-1", 9)).await.unwrap();
        let SubmitOutcome::Failed { reason, .. } = outcome else {
            panic!("expected failed outcome");
        };
        assert!(reason.contains("Insufficient stock"));

        // Absorbed: a retry reports the same failure without re-running
        // the pipeline, and no sale exists.
        let retry = f.queue.submit(submission("local-1", 9)).await.unwrap();
        assert!(matches!(retry, SubmitOutcome::Failed { .. }));
        assert!(f.db.sales().get("local-1").await.unwrap().is_none());
        assert_eq!(
            f.db.stock().get("p-1").await.unwrap().unwrap().stock_quantity,
            5
        );

        let record = f.queue.get("local-1").await.unwrap().unwrap();
        assert_eq!(record.sync_status, SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_batch_reports_mixed_outcomes() {
        let f = fixture().await;

        let report = f
            .queue
            .submit_batch(vec![
                submission("local-1", 2),
                submission("local-2", 9), // stock depleted
                submission("local-3", 1),
            ])
            .await
            .unwrap();

        assert_eq!(report.synced_count, 2);
        assert_eq!(report.failed_items.len(), 1);
        assert_eq!(report.failed_items[0].local_sale_id, "local-2");

        let pending = f.queue.pending_for_terminal("term-1").await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_crashed_pending_attempt_resumes_without_double_apply() {
        let f = fixture().await;

        // Simulate a crash after the sale was persisted and deducted but
        // before the queue row left pending.
        let sub = submission("local-1", 3);
        f.queue
            .queue
            .claim(&OfflineSyncQueue::pending_record(&sub).unwrap())
            .await
            .unwrap();
        let sale_id = f.queue.replay(&sub).await.unwrap();
        assert_eq!(sale_id, "local-1");

        // The terminal retries the whole submission.
        let outcome = f.queue.submit(sub).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Synced { .. }));

        // Still exactly one deduction and one sale.
        assert_eq!(
            f.db.stock().get("p-1").await.unwrap().unwrap().stock_quantity,
            2
        );
        assert_eq!(f.db.stock().history("p-1", 10).await.unwrap().len(), 1);
        let record = f.queue.get("local-1").await.unwrap().unwrap();
        assert_eq!(record.sync_status, SyncStatus::Synced);
    }
}
