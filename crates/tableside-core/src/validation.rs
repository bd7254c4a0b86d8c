//! # Validation Module
//!
//! Input validation for cart lines and checkout data.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Floor UI                                                     │
//! │  └── Immediate operator feedback                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (runs before any store call)                     │
//! │  ├── Cart lines (code, name, quantity, weight, price)                  │
//! │  └── Checkout (discount, customer count, operator)                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store                                                        │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Conditional status updates                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::{GramRate, Money, Weight};
use crate::{
    MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_PRICE_PER_KG_CENTS, MAX_UNIT_PRICE_CENTS,
    MAX_WEIGHT_GRAMS,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a product code.
///
/// ## Example
/// ```rust
/// use tableside_core::validation::validate_product_code;
///
/// assert!(validate_product_code("ACAI-500").is_ok());
/// assert!(validate_product_code("").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    validate_required_text("product_code", code, 50)
}

/// Validates a product name (1-200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_required_text("product_name", name, 200)
}

/// Validates the operator name recorded on a sale.
pub fn validate_operator_name(name: &str) -> ValidationResult<()> {
    validate_required_text("operator_name", name, 100)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a unit quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price. Free lines are not sold through the cart.
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "unit_price".to_string(),
        });
    }

    if price.cents() > MAX_UNIT_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "unit_price".to_string(),
            min: 1,
            max: MAX_UNIT_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a scale reading (1 g to `MAX_WEIGHT_GRAMS`).
pub fn validate_weight(weight: Weight) -> ValidationResult<()> {
    if !weight.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "weight".to_string(),
        });
    }

    if weight.grams() > MAX_WEIGHT_GRAMS {
        return Err(ValidationError::OutOfRange {
            field: "weight".to_string(),
            min: 1,
            max: MAX_WEIGHT_GRAMS,
        });
    }

    Ok(())
}

/// Validates a per-gram price. Milli-cents per gram equal cents per kilo,
/// so the bound is `MAX_PRICE_PER_KG_CENTS`.
pub fn validate_gram_rate(rate: GramRate) -> ValidationResult<()> {
    if !rate.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "price_per_gram".to_string(),
        });
    }

    if rate.millicents() > MAX_PRICE_PER_KG_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "price_per_gram".to_string(),
            min: 1,
            max: MAX_PRICE_PER_KG_CENTS,
        });
    }

    Ok(())
}

/// Validates a sale discount against the subtotal it applies to.
///
/// ## Rules
/// - `0 ≤ discount ≤ subtotal` so the total never goes negative
///
/// ## Example
/// ```rust
/// use tableside_core::money::Money;
/// use tableside_core::validation::validate_discount;
///
/// assert!(validate_discount(Money::from_cents(500), Money::from_cents(5000)).is_ok());
/// assert!(validate_discount(Money::from_cents(6000), Money::from_cents(5000)).is_err());
/// ```
pub fn validate_discount(discount: Money, subtotal: Money) -> ValidationResult<()> {
    if discount.is_negative() || discount > subtotal {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: subtotal.cents(),
        });
    }

    Ok(())
}

/// Validates the change handed back to the guest.
pub fn validate_change(change: Money) -> ValidationResult<()> {
    if change.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "change".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates the number of guests at the table.
pub fn validate_customer_count(count: i64) -> ValidationResult<()> {
    if count < 1 {
        return Err(ValidationError::MustBePositive {
            field: "customer_count".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more line fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_code() {
        assert!(validate_product_code("ACAI-500").is_ok());
        assert!(validate_product_code("PROD1712345").is_ok());
        assert!(validate_product_code("").is_err());
        assert!(validate_product_code("   ").is_err());
        assert!(validate_product_code(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Açaí 500ml").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_prices_and_weights() {
        assert!(validate_unit_price(Money::from_cents(1)).is_ok());
        assert!(validate_unit_price(Money::zero()).is_err());
        assert!(validate_weight(Weight::from_grams(1)).is_ok());
        assert!(validate_weight(Weight::from_grams(-20)).is_err());
        assert!(validate_gram_rate(GramRate::from_millicents(5990)).is_ok());
        assert!(validate_gram_rate(GramRate::from_millicents(0)).is_err());
    }

    #[test]
    fn test_prices_and_weights_are_bounded() {
        assert!(validate_unit_price(Money::from_cents(MAX_UNIT_PRICE_CENTS)).is_ok());
        assert!(matches!(
            validate_unit_price(Money::from_cents(MAX_UNIT_PRICE_CENTS + 1)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validate_unit_price(Money::from_cents(i64::MAX / 100)).is_err());

        assert!(validate_weight(Weight::from_grams(MAX_WEIGHT_GRAMS)).is_ok());
        assert!(validate_weight(Weight::from_grams(i64::MAX / 2)).is_err());

        let max_rate = GramRate::from_price_per_kg(Money::from_cents(MAX_PRICE_PER_KG_CENTS));
        assert!(validate_gram_rate(max_rate).is_ok());
        assert!(validate_gram_rate(GramRate::from_millicents(MAX_PRICE_PER_KG_CENTS + 1)).is_err());
    }

    #[test]
    fn test_validate_discount() {
        let subtotal = Money::from_cents(5000);
        assert!(validate_discount(Money::zero(), subtotal).is_ok());
        assert!(validate_discount(subtotal, subtotal).is_ok());
        assert!(validate_discount(Money::from_cents(-1), subtotal).is_err());
        assert!(validate_discount(Money::from_cents(5001), subtotal).is_err());
    }

    #[test]
    fn test_validate_customer_count_and_change() {
        assert!(validate_customer_count(1).is_ok());
        assert!(validate_customer_count(0).is_err());
        assert!(validate_change(Money::zero()).is_ok());
        assert!(validate_change(Money::from_cents(-10)).is_err());
    }
}
