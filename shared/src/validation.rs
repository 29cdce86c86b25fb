//! Validation utilities for the Inventory & Procurement platform

use rust_decimal::Decimal;

use crate::types::ItemKind;

// ============================================================================
// Quantity and Price Validations
// ============================================================================

/// Validate that a quantity is strictly positive
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a unit price (zero allowed, negative not)
pub fn validate_unit_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Unit price cannot be negative");
    }
    Ok(())
}

/// Approved quantity must be positive and may not exceed what was requested
pub fn validate_approved_quantity(requested: Decimal, approved: Decimal) -> Result<(), &'static str> {
    validate_quantity(approved)?;
    if approved > requested {
        return Err("Approved quantity cannot exceed requested quantity");
    }
    Ok(())
}

/// Received quantity must be positive and fit in what is still outstanding
pub fn validate_receipt_quantity(
    ordered: Decimal,
    already_received: Decimal,
    incoming: Decimal,
) -> Result<(), &'static str> {
    validate_quantity(incoming)?;
    if already_received + incoming > ordered {
        return Err("Received quantity exceeds the approved amount");
    }
    Ok(())
}

/// Produced quantity may be zero while work is in progress, never negative
pub fn validate_produced_quantity(produced: Decimal) -> Result<(), &'static str> {
    if produced < Decimal::ZERO {
        return Err("Produced quantity cannot be negative");
    }
    Ok(())
}

/// Validate a supplier lead time in days
pub fn validate_lead_time_days(days: i32) -> Result<(), &'static str> {
    if days <= 0 {
        return Err("Lead time must be at least one day");
    }
    if days > 365 {
        return Err("Lead time cannot exceed one year");
    }
    Ok(())
}

// ============================================================================
// Request Composition Validations
// ============================================================================

/// A request holds either raw materials or products, never both, and at
/// least one line. Returns the shared kind.
pub fn validate_line_kinds(kinds: &[ItemKind]) -> Result<ItemKind, &'static str> {
    let first = *kinds.first().ok_or("A request needs at least one line")?;
    if kinds.iter().any(|kind| *kind != first) {
        return Err("A request cannot mix raw materials and products");
    }
    Ok(first)
}

/// Validate the free-text reason on a manual request
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    if reason.trim().is_empty() {
        return Err("Reason cannot be empty");
    }
    if reason.chars().count() > 500 {
        return Err("Reason must be at most 500 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // ========================================================================
    // Quantity and Price Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(dec("0.5")).is_ok());
        assert!(validate_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity(dec("-1")).is_err());
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(Decimal::ZERO).is_ok());
        assert!(validate_unit_price(dec("12500")).is_ok());
        assert!(validate_unit_price(dec("-1")).is_err());
    }

    #[test]
    fn test_validate_approved_quantity() {
        assert!(validate_approved_quantity(dec("100"), dec("80")).is_ok());
        assert!(validate_approved_quantity(dec("100"), dec("100")).is_ok());
        assert!(validate_approved_quantity(dec("100"), dec("120")).is_err());
        assert!(validate_approved_quantity(dec("100"), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_validate_receipt_quantity() {
        assert!(validate_receipt_quantity(dec("100"), dec("60"), dec("40")).is_ok());
        assert!(validate_receipt_quantity(dec("100"), dec("60"), dec("41")).is_err());
        assert!(validate_receipt_quantity(dec("100"), Decimal::ZERO, Decimal::ZERO).is_err());
    }

    #[test]
    fn test_validate_lead_time_days() {
        assert!(validate_lead_time_days(7).is_ok());
        assert!(validate_lead_time_days(0).is_err());
        assert!(validate_lead_time_days(400).is_err());
    }

    // ========================================================================
    // Request Composition Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_line_kinds() {
        assert_eq!(
            validate_line_kinds(&[ItemKind::RawMaterial, ItemKind::RawMaterial]),
            Ok(ItemKind::RawMaterial)
        );
        assert_eq!(validate_line_kinds(&[ItemKind::Product]), Ok(ItemKind::Product));
        assert!(validate_line_kinds(&[ItemKind::RawMaterial, ItemKind::Product]).is_err());
        assert!(validate_line_kinds(&[]).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason("Stok menipis").is_ok());
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason(&"x".repeat(501)).is_err());
    }
}
