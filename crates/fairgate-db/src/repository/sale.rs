//! # Sale Repository
//!
//! Database operations for durable sale records.
//!
//! A sale row is the durability point of the checkout pipeline: stock
//! deduction runs only after the insert here succeeds, so a deduction
//! failure afterwards is an inconsistency to reconcile, never a lost sale.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use fairgate_core::{SaleRecord, SaleStatus};

const SELECT_COLUMNS: &str = r#"
    sale_id,
    timestamp,
    items_json,
    subtotal,
    discount_amount,
    total_amount,
    payment_method,
    status,
    employee_number,
    terminal_id,
    event_id,
    coupon_id,
    coupon_code,
    source,
    created_at,
    synced_at
"#;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Inserts a sale record.
    pub async fn insert(&self, sale: &SaleRecord) -> DbResult<()> {
        debug!(sale_id = %sale.sale_id, total = %sale.total_amount, "Inserting sale");

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO sales (
                sale_id, timestamp, items_json, subtotal, discount_amount,
                total_amount, payment_method, status, employee_number,
                terminal_id, event_id, coupon_id, coupon_code, source,
                created_at, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&sale.sale_id)
        .bind(sale.timestamp)
        .bind(&sale.items_json)
        .bind(sale.subtotal)
        .bind(sale.discount_amount)
        .bind(sale.total_amount)
        .bind(&sale.payment_method)
        .bind(sale.status)
        .bind(&sale.employee_number)
        .bind(&sale.terminal_id)
        .bind(&sale.event_id)
        .bind(&sale.coupon_id)
        .bind(&sale.coupon_code)
        .bind(sale.source)
        .bind(sale.created_at)
        .bind(sale.synced_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::duplicate("sale_id", &sale.sale_id));
        }

        Ok(())
    }

    /// Gets a sale by id.
    pub async fn get(&self, sale_id: &str) -> DbResult<Option<SaleRecord>> {
        let sale = sqlx::query_as::<_, SaleRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM sales WHERE sale_id = ?1"
        ))
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Marks a completed sale as refunded.
    ///
    /// Conditional on the current status, so a sale can be refunded at
    /// most once.
    pub async fn mark_refunded(&self, sale_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales
            SET status = ?2
            WHERE sale_id = ?1 AND status = ?3
            "#,
        )
        .bind(sale_id)
        .bind(SaleStatus::Refunded)
        .bind(SaleStatus::Completed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::condition_failed("Sale (completed)", sale_id));
        }

        Ok(())
    }

    /// Lists sales for a terminal within a time range, newest first.
    pub async fn list_for_terminal(
        &self,
        terminal_id: &str,
        since: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<SaleRecord>> {
        let since_unix = since.timestamp();
        let sales = sqlx::query_as::<_, SaleRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM sales \
             WHERE terminal_id = ?1 AND timestamp >= ?2 \
             ORDER BY timestamp DESC LIMIT ?3"
        ))
        .bind(terminal_id)
        .bind(since_unix)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use fairgate_core::SaleSource;

    fn sale(id: &str) -> SaleRecord {
        SaleRecord {
            sale_id: id.to_string(),
            timestamp: 1_700_000_000,
            items_json: "[]".to_string(),
            subtotal: None,
            discount_amount: 0,
            total_amount: 1_600,
            payment_method: "cash".to_string(),
            status: SaleStatus::Completed,
            employee_number: "1000001".to_string(),
            terminal_id: Some("term-1".to_string()),
            event_id: None,
            coupon_id: None,
            coupon_code: None,
            source: SaleSource::Pos,
            created_at: Utc::now(),
            synced_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sales();

        repo.insert(&sale("sale-1")).await.unwrap();
        assert!(matches!(
            repo.insert(&sale("sale-1")).await,
            Err(DbError::UniqueViolation { .. })
        ));

        let loaded = repo.get("sale-1").await.unwrap().unwrap();
        assert_eq!(loaded.total_amount, 1_600);
        assert_eq!(loaded.status, SaleStatus::Completed);
        assert_eq!(loaded.source, SaleSource::Pos);
    }

    #[tokio::test]
    async fn test_refund_is_exactly_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sales();

        repo.insert(&sale("sale-1")).await.unwrap();
        repo.mark_refunded("sale-1").await.unwrap();
        assert_eq!(
            repo.get("sale-1").await.unwrap().unwrap().status,
            SaleStatus::Refunded
        );

        // Second refund loses the conditional write.
        assert!(matches!(
            repo.mark_refunded("sale-1").await,
            Err(DbError::ConditionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_for_terminal() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sales();

        let mut early = sale("sale-1");
        early.timestamp = 1_000;
        repo.insert(&early).await.unwrap();
        repo.insert(&sale("sale-2")).await.unwrap();

        let since = DateTime::from_timestamp(500_000, 0).unwrap();
        let sales = repo.list_for_terminal("term-1", since, 10).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].sale_id, "sale-2");
    }
}
