//! # Coupon Engine
//!
//! Lookup, eligibility validation and discount application.
//!
//! Eligibility policy and the discount math live in
//! [`fairgate_core::coupon`]; this service adds the code index lookup, the
//! advisory usage counter and coupon provisioning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PosError, PosResult};
use fairgate_core::{coupon as coupon_math, Coupon, CouponFilter, DiscountType, ReservedLine};
use fairgate_db::{Database, CouponRepository, DbError};

/// Reported by [`CouponEngine::apply`] on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub coupon_id: String,
    pub code: String,
    pub name: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
}

/// Coupon provisioning request.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub name: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub usage_limit: Option<i64>,
    pub min_purchase_amount: Option<i64>,
    pub max_discount_amount: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub publisher_id: Option<String>,
    pub event_id: Option<String>,
    pub filter: Option<CouponFilter>,
}

/// Validates coupons and computes discounts.
#[derive(Debug, Clone)]
pub struct CouponEngine {
    coupons: CouponRepository,
}

impl CouponEngine {
    /// Creates an engine backed by the given database.
    pub fn new(db: &Database) -> Self {
        CouponEngine {
            coupons: db.coupons(),
        }
    }

    /// Provisions a coupon. The code is normalized upper-case on insert.
    pub async fn create(&self, new_coupon: NewCoupon) -> PosResult<Coupon> {
        let now = Utc::now();
        let filter_json = match &new_coupon.filter {
            Some(filter) if !filter.is_empty() => {
                Some(serde_json::to_string(filter).map_err(DbError::Serialization)?)
            }
            _ => None,
        };

        let coupon = Coupon {
            coupon_id: Uuid::new_v4().to_string(),
            code: new_coupon.code.to_uppercase(),
            name: new_coupon.name,
            discount_type: new_coupon.discount_type,
            discount_value: new_coupon.discount_value,
            usage_limit: new_coupon.usage_limit,
            usage_count: 0,
            min_purchase_amount: new_coupon.min_purchase_amount,
            max_discount_amount: new_coupon.max_discount_amount,
            valid_from: new_coupon.valid_from,
            valid_until: new_coupon.valid_until,
            publisher_id: new_coupon.publisher_id,
            event_id: new_coupon.event_id,
            filter_json,
            active: true,
            created_at: now,
            updated_at: now,
        };

        self.coupons.insert(&coupon).await?;

        info!(coupon_id = %coupon.coupon_id, code = %coupon.code, "Coupon created");
        Ok(coupon)
    }

    /// Case-insensitive exact-match lookup. `None` if absent.
    pub async fn lookup(&self, code: &str) -> PosResult<Option<Coupon>> {
        Ok(self.coupons.get_by_code(code).await?)
    }

    /// Validates and prices a coupon against a flat subtotal.
    ///
    /// Rejection carries the first violated rule as its reason; nothing is
    /// mutated either way.
    pub async fn apply(
        &self,
        code: &str,
        subtotal: i64,
        publisher_id: Option<&str>,
        event_id: Option<&str>,
    ) -> PosResult<AppliedCoupon> {
        let coupon = self.eligible(code, subtotal, publisher_id, event_id).await?;
        let discount_amount = coupon_math::calculate_discount(&coupon, subtotal);
        Ok(Self::applied(coupon, subtotal, discount_amount))
    }

    /// Validates and prices a coupon against a reserved cart, honoring the
    /// coupon's product/category filter for the discountable base.
    pub async fn apply_to_cart(
        &self,
        code: &str,
        lines: &[ReservedLine],
        publisher_id: Option<&str>,
        event_id: Option<&str>,
    ) -> PosResult<AppliedCoupon> {
        let subtotal: i64 = lines.iter().map(|line| line.subtotal).sum();
        let coupon = self.eligible(code, subtotal, publisher_id, event_id).await?;
        let discount_amount = coupon_math::calculate_cart_discount(&coupon, lines);
        Ok(Self::applied(coupon, subtotal, discount_amount))
    }

    /// Advisory usage bump, called only after the redeeming sale is
    /// durable. The caller drops a failure with a log line - the limit is
    /// best-effort under concurrency by design.
    pub async fn increment_usage(&self, coupon_id: &str) -> PosResult<()> {
        self.coupons.increment_usage(coupon_id).await?;
        debug!(coupon_id = %coupon_id, "Coupon usage incremented");
        Ok(())
    }

    async fn eligible(
        &self,
        code: &str,
        subtotal: i64,
        publisher_id: Option<&str>,
        event_id: Option<&str>,
    ) -> PosResult<Coupon> {
        let coupon = self
            .lookup(code)
            .await?
            .ok_or_else(|| PosError::CouponRejected("coupon not found".to_string()))?;

        coupon_math::validate(&coupon, subtotal, publisher_id, event_id, Utc::now())
            .map_err(PosError::CouponRejected)?;

        Ok(coupon)
    }

    fn applied(coupon: Coupon, subtotal: i64, discount_amount: i64) -> AppliedCoupon {
        AppliedCoupon {
            coupon_id: coupon.coupon_id,
            code: coupon.code,
            name: coupon.name,
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            discount_amount,
            final_amount: subtotal - discount_amount,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fairgate_db::DbConfig;

    async fn engine() -> CouponEngine {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        CouponEngine::new(&db)
    }

    fn percentage(code: &str, value: i64) -> NewCoupon {
        NewCoupon {
            code: code.to_string(),
            name: format!("{value}% off"),
            discount_type: DiscountType::Percentage,
            discount_value: value,
            usage_limit: None,
            min_purchase_amount: None,
            max_discount_amount: None,
            valid_from: None,
            valid_until: None,
            publisher_id: None,
            event_id: None,
            filter: None,
        }
    }

    #[tokio::test]
    async fn test_apply_computes_discount() {
        let engine = engine().await;
        engine.create(percentage("spring10", 10)).await.unwrap();

        let applied = engine.apply("SPRING10", 999, None, None).await.unwrap();
        assert_eq!(applied.discount_amount, 99);
        assert_eq!(applied.final_amount, 900);
        assert_eq!(applied.code, "SPRING10");

        // Lookup is case-insensitive.
        let applied = engine.apply("Spring10", 1_000, None, None).await.unwrap();
        assert_eq!(applied.discount_amount, 100);
    }

    #[tokio::test]
    async fn test_unknown_code_rejected() {
        let engine = engine().await;
        assert!(matches!(
            engine.apply("GHOST", 1_000, None, None).await,
            Err(PosError::CouponRejected(reason)) if reason == "coupon not found"
        ));
    }

    #[tokio::test]
    async fn test_exhausted_coupon_rejected_before_pricing() {
        let engine = engine().await;
        let mut new_coupon = percentage("ONCE", 10);
        new_coupon.usage_limit = Some(1);
        let coupon = engine.create(new_coupon).await.unwrap();

        engine.increment_usage(&coupon.coupon_id).await.unwrap();

        assert!(matches!(
            engine.apply("ONCE", 1_000_000, None, None).await,
            Err(PosError::CouponRejected(reason)) if reason == "usage upper limit reached"
        ));
    }

    #[tokio::test]
    async fn test_scoped_coupon() {
        let engine = engine().await;
        let mut new_coupon = percentage("CIRCLE", 10);
        new_coupon.publisher_id = Some("pub-1".to_string());
        engine.create(new_coupon).await.unwrap();

        assert!(engine
            .apply("CIRCLE", 1_000, Some("pub-1"), None)
            .await
            .is_ok());
        assert!(matches!(
            engine.apply("CIRCLE", 1_000, Some("pub-2"), None).await,
            Err(PosError::CouponRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_cart_filter_restricts_base() {
        let engine = engine().await;
        let mut new_coupon = percentage("BOOKS10", 10);
        new_coupon.filter = Some(CouponFilter {
            product_ids: vec![],
            categories: vec!["books".to_string()],
        });
        engine.create(new_coupon).await.unwrap();

        let lines = vec![
            ReservedLine {
                product_id: "p-1".to_string(),
                product_name: "Anthology".to_string(),
                category: "books".to_string(),
                quantity: 2,
                unit_price: 500,
                subtotal: 1_000,
                current_stock: 10,
            },
            ReservedLine {
                product_id: "p-2".to_string(),
                product_name: "Keychain".to_string(),
                category: "goods".to_string(),
                quantity: 1,
                unit_price: 600,
                subtotal: 600,
                current_stock: 10,
            },
        ];

        let applied = engine
            .apply_to_cart("BOOKS10", &lines, None, None)
            .await
            .unwrap();
        // 10% of the 1000 in books, not of the 1600 cart.
        assert_eq!(applied.discount_amount, 100);
        assert_eq!(applied.final_amount, 1_500);
    }

    #[tokio::test]
    async fn test_increment_on_missing_coupon_errors() {
        let engine = engine().await;
        // Callers drop this with a log line; it still reports honestly.
        assert!(engine.increment_usage("ghost").await.is_err());
    }
}
