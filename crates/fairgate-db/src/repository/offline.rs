//! # Offline Queue Repository
//!
//! Database operations for the offline sale queue.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            Per-local_sale_id state machine                              │
//! │                                                                         │
//! │                 ┌──────────┐                                           │
//! │    claim() ───► │ pending  │                                           │
//! │                 └────┬─────┘                                           │
//! │                      │                                                  │
//! │        mark_synced() │ mark_failed()                                   │
//! │          ┌───────────┴───────────┐                                     │
//! │          ▼                       ▼                                      │
//! │    ┌──────────┐            ┌──────────┐                                │
//! │    │  synced  │            │  failed  │   (absorbing)                  │
//! │    └──────────┘            └──────────┘                                │
//! │                                                                         │
//! │  Both transitions are conditional on sync_status = 'pending', so each  │
//! │  local_sale_id leaves pending EXACTLY once no matter how many times    │
//! │  the terminal retries a submission.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use fairgate_core::{OfflineSaleRecord, SyncStatus};

const SELECT_COLUMNS: &str = r#"
    local_sale_id,
    terminal_id,
    employee_number,
    session_id,
    payload_json,
    recorded_at,
    sync_status,
    sale_id,
    error_message,
    created_at,
    synced_at
"#;

/// Repository for offline sale queue operations.
#[derive(Debug, Clone)]
pub struct OfflineQueueRepository {
    pool: SqlitePool,
}

impl OfflineQueueRepository {
    /// Creates a new OfflineQueueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OfflineQueueRepository { pool }
    }

    /// Gets a queue row by idempotency key.
    pub async fn get(&self, local_sale_id: &str) -> DbResult<Option<OfflineSaleRecord>> {
        let record = sqlx::query_as::<_, OfflineSaleRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_sales_queue WHERE local_sale_id = ?1"
        ))
        .bind(local_sale_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Records a submission in `pending` state if it is not already known.
    ///
    /// ## Returns
    /// `true` if this call created the row (first submission), `false` if
    /// the key already existed (a retry or a concurrent duplicate).
    pub async fn claim(&self, record: &OfflineSaleRecord) -> DbResult<bool> {
        debug!(
            local_sale_id = %record.local_sale_id,
            terminal_id = %record.terminal_id,
            "Claiming offline sale"
        );

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO offline_sales_queue (
                local_sale_id, terminal_id, employee_number, session_id,
                payload_json, recorded_at, sync_status, sale_id,
                error_message, created_at, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&record.local_sale_id)
        .bind(&record.terminal_id)
        .bind(&record.employee_number)
        .bind(&record.session_id)
        .bind(&record.payload_json)
        .bind(record.recorded_at)
        .bind(record.sync_status)
        .bind(&record.sale_id)
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(record.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transitions `pending → synced`, recording the server-side sale id.
    ///
    /// ## Returns
    /// `true` if this call performed the transition, `false` if the row was
    /// no longer pending (someone else already finished it).
    pub async fn mark_synced(
        &self,
        local_sale_id: &str,
        sale_id: &str,
        synced_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE offline_sales_queue
            SET sync_status = ?2, sale_id = ?3, synced_at = ?4
            WHERE local_sale_id = ?1 AND sync_status = ?5
            "#,
        )
        .bind(local_sale_id)
        .bind(SyncStatus::Synced)
        .bind(sale_id)
        .bind(synced_at)
        .bind(SyncStatus::Pending)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transitions `pending → failed` with a rejection reason.
    ///
    /// Same exactly-once contract as [`Self::mark_synced`].
    pub async fn mark_failed(&self, local_sale_id: &str, error_message: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE offline_sales_queue
            SET sync_status = ?2, error_message = ?3
            WHERE local_sale_id = ?1 AND sync_status = ?4
            "#,
        )
        .bind(local_sale_id)
        .bind(SyncStatus::Failed)
        .bind(error_message)
        .bind(SyncStatus::Pending)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists a terminal's queue rows still in `pending`.
    pub async fn pending_for_terminal(
        &self,
        terminal_id: &str,
    ) -> DbResult<Vec<OfflineSaleRecord>> {
        let records = sqlx::query_as::<_, OfflineSaleRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM offline_sales_queue \
             WHERE terminal_id = ?1 AND sync_status = ?2 \
             ORDER BY recorded_at"
        ))
        .bind(terminal_id)
        .bind(SyncStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn record(local_sale_id: &str) -> OfflineSaleRecord {
        OfflineSaleRecord {
            local_sale_id: local_sale_id.to_string(),
            terminal_id: "term-1".to_string(),
            employee_number: "1000001".to_string(),
            session_id: "s-1".to_string(),
            payload_json: "{}".to_string(),
            recorded_at: 1_700_000_000,
            sync_status: SyncStatus::Pending,
            sale_id: None,
            error_message: None,
            created_at: Utc::now(),
            synced_at: None,
        }
    }

    #[tokio::test]
    async fn test_claim_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.offline_queue();

        assert!(repo.claim(&record("local-1")).await.unwrap());
        assert!(!repo.claim(&record("local-1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_synced_transition_happens_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.offline_queue();

        repo.claim(&record("local-1")).await.unwrap();
        assert!(repo
            .mark_synced("local-1", "sale-1", Utc::now())
            .await
            .unwrap());
        // Already out of pending: both transitions now lose.
        assert!(!repo
            .mark_synced("local-1", "sale-2", Utc::now())
            .await
            .unwrap());
        assert!(!repo.mark_failed("local-1", "late").await.unwrap());

        let row = repo.get("local-1").await.unwrap().unwrap();
        assert_eq!(row.sync_status, SyncStatus::Synced);
        assert_eq!(row.sale_id.as_deref(), Some("sale-1"));
    }

    #[tokio::test]
    async fn test_pending_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.offline_queue();

        repo.claim(&record("local-1")).await.unwrap();
        repo.claim(&record("local-2")).await.unwrap();
        repo.mark_failed("local-2", "stock depleted").await.unwrap();

        let pending = repo.pending_for_terminal("term-1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].local_sale_id, "local-1");

        let failed = repo.get("local-2").await.unwrap().unwrap();
        assert_eq!(failed.sync_status, SyncStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("stock depleted"));
    }
}
