//! # Coupon Repository
//!
//! Database operations for coupons.
//!
//! Codes are stored normalized to upper-case; `get_by_code` upper-cases the
//! caller's input so lookups are case-insensitive exact matches on the
//! code index.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use fairgate_core::Coupon;

const SELECT_COLUMNS: &str = r#"
    coupon_id,
    code,
    name,
    discount_type,
    discount_value,
    usage_limit,
    usage_count,
    min_purchase_amount,
    max_discount_amount,
    valid_from,
    valid_until,
    publisher_id,
    event_id,
    filter_json,
    active,
    created_at,
    updated_at
"#;

/// Repository for coupon database operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    /// Creates a new CouponRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Inserts a new coupon. The code is stored upper-cased.
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<()> {
        debug!(coupon_id = %coupon.coupon_id, code = %coupon.code, "Inserting coupon");

        let code = coupon.code.to_uppercase();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO coupons (
                coupon_id, code, name, discount_type, discount_value,
                usage_limit, usage_count, min_purchase_amount, max_discount_amount,
                valid_from, valid_until, publisher_id, event_id, filter_json,
                active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&coupon.coupon_id)
        .bind(&code)
        .bind(&coupon.name)
        .bind(coupon.discount_type)
        .bind(coupon.discount_value)
        .bind(coupon.usage_limit)
        .bind(coupon.usage_count)
        .bind(coupon.min_purchase_amount)
        .bind(coupon.max_discount_amount)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(&coupon.publisher_id)
        .bind(&coupon.event_id)
        .bind(&coupon.filter_json)
        .bind(coupon.active)
        .bind(coupon.created_at)
        .bind(coupon.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::duplicate("coupon code", &code));
        }

        Ok(())
    }

    /// Gets a coupon by id.
    pub async fn get(&self, coupon_id: &str) -> DbResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {SELECT_COLUMNS} FROM coupons WHERE coupon_id = ?1"
        ))
        .bind(coupon_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    /// Gets a coupon by code, case-insensitively.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {SELECT_COLUMNS} FROM coupons WHERE code = ?1"
        ))
        .bind(code.to_uppercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    /// Bumps usage_count by one.
    ///
    /// A single-row atomic increment; callers treat the result as advisory.
    pub async fn increment_usage(&self, coupon_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET usage_count = usage_count + 1, updated_at = ?2
            WHERE coupon_id = ?1
            "#,
        )
        .bind(coupon_id)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", coupon_id));
        }

        Ok(())
    }
}
