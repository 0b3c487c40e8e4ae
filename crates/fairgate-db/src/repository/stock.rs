//! # Stock Repository
//!
//! Database operations for stock levels and the append-only audit trail.
//!
//! The quantity column carries a `CHECK (stock_quantity >= 0)` constraint:
//! even a buggy caller cannot persist negative stock. Every quantity write
//! in the service layer is paired with a history append; the two are
//! separate single-row statements (the trail is an audit record, not a
//! transactional invariant).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use fairgate_core::{StockHistoryEntry, StockItem};

const ITEM_COLUMNS: &str = r#"
    product_id,
    product_name,
    category,
    unit_price,
    stock_quantity,
    updated_at
"#;

const HISTORY_COLUMNS: &str = r#"
    product_id,
    timestamp,
    quantity_before,
    quantity_after,
    quantity_change,
    reason,
    operator_id,
    created_at
"#;

/// Repository for stock database operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Inserts a new stock item.
    pub async fn insert(&self, item: &StockItem) -> DbResult<()> {
        debug!(product_id = %item.product_id, "Inserting stock item");

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO stock_items (
                product_id, product_name, category, unit_price,
                stock_quantity, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(&item.category)
        .bind(item.unit_price)
        .bind(item.stock_quantity)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::duplicate("product_id", &item.product_id));
        }

        Ok(())
    }

    /// Gets a stock item by product id.
    pub async fn get(&self, product_id: &str) -> DbResult<Option<StockItem>> {
        let item = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM stock_items WHERE product_id = ?1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Writes an absolute stock quantity.
    ///
    /// The service layer computes the target from its reservation snapshot
    /// (or a fresh read, for restores) and writes it unconditionally.
    pub async fn set_quantity(
        &self,
        product_id: &str,
        quantity: i64,
        updated_at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(product_id = %product_id, quantity = %quantity, "Writing stock quantity");

        let result = sqlx::query(
            r#"
            UPDATE stock_items
            SET stock_quantity = ?2, updated_at = ?3
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockItem", product_id));
        }

        Ok(())
    }

    /// Appends one entry to the audit trail.
    pub async fn append_history(&self, entry: &StockHistoryEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_history (
                product_id, timestamp, quantity_before, quantity_after,
                quantity_change, reason, operator_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&entry.product_id)
        .bind(entry.timestamp)
        .bind(entry.quantity_before)
        .bind(entry.quantity_after)
        .bind(entry.quantity_change)
        .bind(&entry.reason)
        .bind(&entry.operator_id)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists a product's history, newest first.
    pub async fn history(&self, product_id: &str, limit: u32) -> DbResult<Vec<StockHistoryEntry>> {
        let entries = sqlx::query_as::<_, StockHistoryEntry>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM stock_history \
             WHERE product_id = ?1 ORDER BY timestamp DESC LIMIT ?2"
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn item(product_id: &str, quantity: i64) -> StockItem {
        StockItem {
            product_id: product_id.to_string(),
            product_name: "Anthology Vol.1".to_string(),
            category: "books".to_string(),
            unit_price: 800,
            stock_quantity: quantity,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_get_set_quantity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.stock();

        repo.insert(&item("p-1", 5)).await.unwrap();
        assert!(matches!(
            repo.insert(&item("p-1", 5)).await,
            Err(DbError::UniqueViolation { .. })
        ));

        repo.set_quantity("p-1", 2, Utc::now()).await.unwrap();
        assert_eq!(repo.get("p-1").await.unwrap().unwrap().stock_quantity, 2);

        assert!(matches!(
            repo.set_quantity("ghost", 2, Utc::now()).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_negative_quantity_is_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.stock();

        repo.insert(&item("p-1", 5)).await.unwrap();
        let err = repo.set_quantity("p-1", -1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
        // Value unchanged.
        assert_eq!(repo.get("p-1").await.unwrap().unwrap().stock_quantity, 5);
    }

    #[tokio::test]
    async fn test_history_ordering() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.stock();

        for (ts, before, after) in [(1_000, 5, 2), (2_000, 2, 5)] {
            repo.append_history(&StockHistoryEntry {
                product_id: "p-1".to_string(),
                timestamp: ts,
                quantity_before: before,
                quantity_after: after,
                quantity_change: after - before,
                reason: "test".to_string(),
                operator_id: "op-1".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        let entries = repo.history("p-1", 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, 2_000);
        for entry in &entries {
            assert_eq!(
                entry.quantity_after - entry.quantity_before,
                entry.quantity_change
            );
        }
    }
}
