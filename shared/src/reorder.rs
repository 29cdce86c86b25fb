//! Reorder policy: when to raise an automatic procurement request and how urgent it is
//!
//! The same threshold applies to the reactive stock-change path and the batch
//! scan: an item needs replenishment when its reorder point is positive and
//! stock has fallen to or below it.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Priority;

/// Thresholds computed by the metrics calculator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReorderLevels {
    pub eoq: Decimal,
    pub rop: Decimal,
    pub safety_stock: Decimal,
}

/// Why no request was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    StockUnchanged,
    NoReorderPoint,
    AboveReorderPoint,
    OpenRequestExists,
    NoSupplier,
    InactiveItem,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::StockUnchanged => "stock_unchanged",
            SkipReason::NoReorderPoint => "no_reorder_point",
            SkipReason::AboveReorderPoint => "above_reorder_point",
            SkipReason::OpenRequestExists => "open_request_exists",
            SkipReason::NoSupplier => "no_supplier",
            SkipReason::InactiveItem => "inactive_item",
        }
    }
}

/// What a reorder request should contain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReorderPlan {
    pub quantity: Decimal,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReorderDecision {
    Skip(SkipReason),
    Create(ReorderPlan),
}

/// Whether stock has reached the reorder point
pub fn needs_reorder(stock: Decimal, rop: Decimal) -> bool {
    rop > Decimal::ZERO && stock <= rop
}

/// Priority from how deep stock has fallen.
///
/// At or below safety stock is urgent, at or below half of
/// `rop + safety_stock` is high, anything else is normal.
pub fn reorder_priority(stock: Decimal, rop: Decimal, safety_stock: Decimal) -> Priority {
    if stock <= safety_stock {
        Priority::Urgent
    } else if stock <= (rop + safety_stock) / Decimal::from(2) {
        Priority::High
    } else {
        Priority::Normal
    }
}

/// Quantity to order: the EOQ, or the gap to the reorder point (at least one
/// unit) when the EOQ could not be computed
pub fn order_quantity(levels: &ReorderLevels, stock: Decimal) -> Decimal {
    if levels.eoq > Decimal::ZERO {
        return levels.eoq;
    }
    let gap = (levels.rop - stock).ceil();
    gap.max(Decimal::ONE)
}

/// Decide whether to create a request for an item at `stock`
pub fn evaluate(stock: Decimal, levels: &ReorderLevels, open_request_exists: bool) -> ReorderDecision {
    if levels.rop <= Decimal::ZERO {
        return ReorderDecision::Skip(SkipReason::NoReorderPoint);
    }
    if !needs_reorder(stock, levels.rop) {
        return ReorderDecision::Skip(SkipReason::AboveReorderPoint);
    }
    if open_request_exists {
        return ReorderDecision::Skip(SkipReason::OpenRequestExists);
    }

    ReorderDecision::Create(ReorderPlan {
        quantity: order_quantity(levels, stock),
        priority: reorder_priority(stock, levels.rop, levels.safety_stock),
    })
}

/// Needed-by date for an automatic request
pub fn needed_by(today: NaiveDate, lead_window_days: i64) -> NaiveDate {
    today + Duration::days(lead_window_days.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn levels() -> ReorderLevels {
        ReorderLevels {
            eoq: dec("100"),
            rop: dec("60"),
            safety_stock: dec("10"),
        }
    }

    #[test]
    fn test_normal_priority_just_below_rop() {
        let decision = evaluate(dec("55"), &levels(), false);
        assert_eq!(
            decision,
            ReorderDecision::Create(ReorderPlan {
                quantity: dec("100"),
                priority: Priority::Normal,
            })
        );
    }

    #[test]
    fn test_urgent_priority_below_safety_stock() {
        match evaluate(dec("5"), &levels(), false) {
            ReorderDecision::Create(plan) => assert_eq!(plan.priority, Priority::Urgent),
            other => panic!("expected a request, got {:?}", other),
        }
    }

    #[test]
    fn test_high_priority_below_half() {
        // half of (60 + 10) = 35
        assert_eq!(reorder_priority(dec("35"), dec("60"), dec("10")), Priority::High);
        assert_eq!(reorder_priority(dec("36"), dec("60"), dec("10")), Priority::Normal);
        assert_eq!(reorder_priority(dec("10"), dec("60"), dec("10")), Priority::Urgent);
    }

    #[test]
    fn test_skip_reasons() {
        assert_eq!(evaluate(dec("61"), &levels(), false), ReorderDecision::Skip(SkipReason::AboveReorderPoint));
        assert_eq!(evaluate(dec("40"), &levels(), true), ReorderDecision::Skip(SkipReason::OpenRequestExists));

        let no_rop = ReorderLevels { eoq: dec("100"), rop: Decimal::ZERO, safety_stock: Decimal::ZERO };
        assert_eq!(evaluate(Decimal::ZERO, &no_rop, false), ReorderDecision::Skip(SkipReason::NoReorderPoint));
    }

    #[test]
    fn test_order_quantity_fallback_without_eoq() {
        let levels = ReorderLevels { eoq: Decimal::ZERO, rop: dec("30"), safety_stock: dec("5") };
        assert_eq!(order_quantity(&levels, dec("12.5")), dec("18"));
        assert_eq!(order_quantity(&levels, dec("30")), Decimal::ONE);
    }

    #[test]
    fn test_needed_by() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(needed_by(today, 3), NaiveDate::from_ymd_opt(2026, 10, 22).unwrap());
    }
}
