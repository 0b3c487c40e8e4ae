//! # Coupon Math
//!
//! Pure eligibility validation and discount computation.
//!
//! ## Validation Policy
//! Checks run in a fixed order and short-circuit on the first violated rule:
//!
//! 1. active flag
//! 2. validity window start
//! 3. validity window end
//! 4. usage limit
//! 5. minimum purchase amount
//! 6. publisher scope
//! 7. event scope
//!
//! The returned reason is the *first* violated rule, not the most specific
//! one. Reasons are human-readable strings surfaced to the cashier verbatim.
//!
//! ## Discount Computation
//! - `percentage` → `floor(base * value / 100)`
//! - `fixed`      → `value`
//!
//! Both are capped at `max_discount_amount` (if set) and then at the
//! applicable base, so a discount never exceeds what it discounts.

use chrono::{DateTime, Utc};

use crate::types::{Coupon, DiscountType, ReservedLine};

// =============================================================================
// Eligibility
// =============================================================================

/// Validates a coupon against a purchase context.
///
/// `publisher_id` / `event_id` describe the session attempting to redeem;
/// a scoped coupon requires an exact match.
pub fn validate(
    coupon: &Coupon,
    subtotal: i64,
    publisher_id: Option<&str>,
    event_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), String> {
    if !coupon.active {
        return Err("this coupon is not active".to_string());
    }

    if let Some(valid_from) = coupon.valid_from {
        if now < valid_from {
            return Err("this coupon is not yet valid".to_string());
        }
    }

    if let Some(valid_until) = coupon.valid_until {
        if now > valid_until {
            return Err("this coupon has expired".to_string());
        }
    }

    if let Some(limit) = coupon.usage_limit {
        if coupon.usage_count >= limit {
            return Err("usage upper limit reached".to_string());
        }
    }

    if let Some(min_purchase) = coupon.min_purchase_amount {
        if subtotal < min_purchase {
            return Err(format!(
                "this coupon requires a minimum purchase of {}",
                min_purchase
            ));
        }
    }

    if let Some(ref required_publisher) = coupon.publisher_id {
        if publisher_id != Some(required_publisher.as_str()) {
            return Err("this coupon is limited to a specific publisher".to_string());
        }
    }

    if let Some(ref required_event) = coupon.event_id {
        if event_id != Some(required_event.as_str()) {
            return Err("this coupon is limited to a specific event".to_string());
        }
    }

    Ok(())
}

// =============================================================================
// Discount
// =============================================================================

/// Computes the discount on a flat subtotal (no cart filter).
pub fn calculate_discount(coupon: &Coupon, subtotal: i64) -> i64 {
    discount_on_base(coupon, subtotal)
}

/// Computes the discount against a reserved cart.
///
/// With a filter, only matching lines contribute to the discountable base;
/// without one, the entire cart is eligible.
pub fn calculate_cart_discount(coupon: &Coupon, lines: &[ReservedLine]) -> i64 {
    let base: i64 = match coupon.filter() {
        Some(filter) => lines
            .iter()
            .filter(|line| filter.matches(&line.product_id, &line.category))
            .map(|line| line.subtotal)
            .sum(),
        None => lines.iter().map(|line| line.subtotal).sum(),
    };

    discount_on_base(coupon, base)
}

fn discount_on_base(coupon: &Coupon, base: i64) -> i64 {
    let mut discount = match coupon.discount_type {
        // Integer division floors for non-negative operands.
        DiscountType::Percentage => base * coupon.discount_value / 100,
        DiscountType::Fixed => coupon.discount_value,
    };

    if let Some(max_discount) = coupon.max_discount_amount {
        discount = discount.min(max_discount);
    }

    // Never discount more than the applicable base.
    discount.clamp(0, base.max(0))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(discount_type: DiscountType, discount_value: i64) -> Coupon {
        Coupon {
            coupon_id: "c-1".into(),
            code: "TEST".into(),
            name: "Test coupon".into(),
            discount_type,
            discount_value,
            usage_limit: None,
            usage_count: 0,
            min_purchase_amount: None,
            max_discount_amount: None,
            valid_from: None,
            valid_until: None,
            publisher_id: None,
            event_id: None,
            filter_json: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(product_id: &str, category: &str, quantity: i64, unit_price: i64) -> ReservedLine {
        ReservedLine {
            product_id: product_id.into(),
            product_name: product_id.into(),
            category: category.into(),
            quantity,
            unit_price,
            subtotal: quantity * unit_price,
            current_stock: 100,
        }
    }

    #[test]
    fn test_percentage_discount_floors() {
        let c = coupon(DiscountType::Percentage, 10);
        assert_eq!(calculate_discount(&c, 999), 99);
        assert_eq!(calculate_discount(&c, 1000), 100);
        assert_eq!(calculate_discount(&c, 9), 0);
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let c = coupon(DiscountType::Fixed, 500);
        assert_eq!(calculate_discount(&c, 300), 300);
        assert_eq!(calculate_discount(&c, 500), 500);
        assert_eq!(calculate_discount(&c, 800), 500);
    }

    #[test]
    fn test_max_discount_amount_caps_first() {
        let mut c = coupon(DiscountType::Fixed, 500);
        c.max_discount_amount = Some(50);
        assert_eq!(calculate_discount(&c, 10_000), 50);

        let mut c = coupon(DiscountType::Percentage, 50);
        c.max_discount_amount = Some(120);
        assert_eq!(calculate_discount(&c, 1000), 120);
    }

    #[test]
    fn test_validate_order_first_rule_wins() {
        // Inactive AND exhausted: inactive is reported because it is
        // checked first.
        let mut c = coupon(DiscountType::Fixed, 100);
        c.active = false;
        c.usage_limit = Some(1);
        c.usage_count = 1;
        assert_eq!(
            validate(&c, 1_000, None, None, Utc::now()),
            Err("this coupon is not active".to_string())
        );
    }

    #[test]
    fn test_validate_usage_limit() {
        let mut c = coupon(DiscountType::Fixed, 100);
        c.usage_limit = Some(1);
        c.usage_count = 1;
        // Regardless of subtotal.
        assert_eq!(
            validate(&c, 1_000_000, None, None, Utc::now()),
            Err("usage upper limit reached".to_string())
        );

        c.usage_count = 0;
        assert!(validate(&c, 1_000_000, None, None, Utc::now()).is_ok());
    }

    #[test]
    fn test_validate_window() {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Fixed, 100);

        c.valid_from = Some(now + Duration::hours(1));
        assert_eq!(
            validate(&c, 1_000, None, None, now),
            Err("this coupon is not yet valid".to_string())
        );

        c.valid_from = Some(now - Duration::hours(2));
        c.valid_until = Some(now - Duration::hours(1));
        assert_eq!(
            validate(&c, 1_000, None, None, now),
            Err("this coupon has expired".to_string())
        );
    }

    #[test]
    fn test_validate_min_purchase_and_scopes() {
        let mut c = coupon(DiscountType::Fixed, 100);
        c.min_purchase_amount = Some(500);
        assert!(validate(&c, 499, None, None, Utc::now()).is_err());
        assert!(validate(&c, 500, None, None, Utc::now()).is_ok());

        c.min_purchase_amount = None;
        c.publisher_id = Some("pub-1".into());
        assert!(validate(&c, 500, Some("pub-1"), None, Utc::now()).is_ok());
        assert!(validate(&c, 500, Some("pub-2"), None, Utc::now()).is_err());
        assert!(validate(&c, 500, None, None, Utc::now()).is_err());

        c.publisher_id = None;
        c.event_id = Some("ev-1".into());
        assert!(validate(&c, 500, None, Some("ev-1"), Utc::now()).is_ok());
        assert!(validate(&c, 500, None, Some("ev-2"), Utc::now()).is_err());
    }

    #[test]
    fn test_cart_discount_without_filter_uses_whole_cart() {
        let c = coupon(DiscountType::Percentage, 10);
        let lines = vec![line("p-1", "books", 2, 500), line("p-2", "goods", 1, 300)];
        // base = 1300
        assert_eq!(calculate_cart_discount(&c, &lines), 130);
    }

    #[test]
    fn test_cart_discount_with_filter_restricts_base() {
        let mut c = coupon(DiscountType::Percentage, 10);
        c.filter_json = Some(r#"{"categories":["books"]}"#.into());
        let lines = vec![line("p-1", "books", 2, 500), line("p-2", "goods", 1, 300)];
        // base = 1000 (books only)
        assert_eq!(calculate_cart_discount(&c, &lines), 100);

        // Fixed discount is capped at the filtered base, not the cart total.
        let mut c = coupon(DiscountType::Fixed, 5_000);
        c.filter_json = Some(r#"{"product_ids":["p-2"]}"#.into());
        assert_eq!(calculate_cart_discount(&c, &lines), 300);
    }

    #[test]
    fn test_filter_matching_no_lines_yields_zero() {
        let mut c = coupon(DiscountType::Percentage, 50);
        c.filter_json = Some(r#"{"categories":["music"]}"#.into());
        let lines = vec![line("p-1", "books", 1, 500)];
        assert_eq!(calculate_cart_discount(&c, &lines), 0);
    }
}
