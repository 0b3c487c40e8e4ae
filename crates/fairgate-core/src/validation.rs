//! # Input Validation
//!
//! Early validation of caller-supplied identifiers and cart lines,
//! run before any business logic or storage round trip.

use crate::error::ValidationError;
use crate::types::CartLine;

/// Employee numbers are fixed-width 7-digit strings.
pub fn validate_employee_number(employee_number: &str) -> Result<(), ValidationError> {
    if employee_number.is_empty() {
        return Err(ValidationError::Required {
            field: "employee_number".to_string(),
        });
    }
    if employee_number.len() != 7 || !employee_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidLength {
            field: "employee_number".to_string(),
            expected: "exactly 7 digits".to_string(),
        });
    }
    Ok(())
}

/// PINs are 3-8 digit numeric strings. Short by design: they gate a
/// terminal-scoped session, not an account.
pub fn validate_pin(pin: &str) -> Result<(), ValidationError> {
    if pin.is_empty() {
        return Err(ValidationError::Required {
            field: "pin".to_string(),
        });
    }
    if !(3..=8).contains(&pin.len()) || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidLength {
            field: "pin".to_string(),
            expected: "3 to 8 digits".to_string(),
        });
    }
    Ok(())
}

/// A sellable cart: non-empty, every line with a product id, a positive
/// quantity and a non-negative price.
pub fn validate_cart(items: &[CartLine]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    for item in items {
        if item.product_id.is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            });
        }
        if item.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }
        if item.unit_price < 0 {
            return Err(ValidationError::InvalidFormat {
                field: "unit_price".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
    }
    Ok(())
}
