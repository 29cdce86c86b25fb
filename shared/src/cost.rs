//! Cost feedback: learn ordering cost, price and holding percentage from receipts

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settings for the cost feedback rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostFeedbackSettings {
    /// How many recent receipts feed the rolling ordering cost
    pub window: usize,
    /// Relative price change that triggers a holding-percentage recompute
    pub price_change_threshold: Decimal,
}

impl Default for CostFeedbackSettings {
    fn default() -> Self {
        Self {
            window: 10,
            price_change_threshold: Decimal::new(10, 2),
        }
    }
}

/// Cost fields as currently stored on the item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemCosts {
    pub unit_price: Decimal,
    pub ordering_cost: Decimal,
    pub holding_cost_percent: Decimal,
}

/// Fields to write back; `None` leaves the stored value alone
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostUpdate {
    pub ordering_cost: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub holding_cost_percent: Option<Decimal>,
}

impl CostUpdate {
    pub fn is_empty(&self) -> bool {
        self.ordering_cost.is_none() && self.unit_price.is_none() && self.holding_cost_percent.is_none()
    }
}

/// Mean ordering cost over the newest `window` receipts (`costs` newest first)
pub fn rolling_ordering_cost(costs: &[Decimal], window: usize) -> Option<Decimal> {
    let recent: Vec<Decimal> = costs.iter().take(window.max(1)).copied().collect();
    if recent.is_empty() {
        return None;
    }
    let total: Decimal = recent.iter().sum();
    Some(total / Decimal::from(recent.len() as i64))
}

/// Holding percentage by price band: dearer items are cheaper to hold
/// relative to their value
pub fn holding_cost_band(unit_price: Decimal) -> Decimal {
    if unit_price >= Decimal::from(1_000_000) {
        Decimal::new(15, 2)
    } else if unit_price >= Decimal::from(100_000) {
        Decimal::new(20, 2)
    } else if unit_price >= Decimal::from(10_000) {
        Decimal::new(25, 2)
    } else {
        Decimal::new(30, 2)
    }
}

/// Whether the price moved by more than `threshold` relative to `old`.
/// Any positive price counts as significant when there was none before.
pub fn is_significant_price_change(old: Decimal, new: Decimal, threshold: Decimal) -> bool {
    if old <= Decimal::ZERO {
        return new > Decimal::ZERO;
    }
    ((new - old).abs() / old) > threshold
}

/// Work out what to write back after a receipt
pub fn plan_cost_update(
    current: &ItemCosts,
    recent_ordering_costs: &[Decimal],
    receipt_price: Option<Decimal>,
    settings: &CostFeedbackSettings,
) -> CostUpdate {
    let mut update = CostUpdate::default();

    if let Some(rolling) = rolling_ordering_cost(recent_ordering_costs, settings.window) {
        if rolling != current.ordering_cost {
            update.ordering_cost = Some(rolling);
        }
    }

    if let Some(price) = receipt_price.filter(|p| *p > Decimal::ZERO) {
        if price != current.unit_price {
            update.unit_price = Some(price);
        }
        if is_significant_price_change(current.unit_price, price, settings.price_change_threshold) {
            let band = holding_cost_band(price);
            if band != current.holding_cost_percent {
                update.holding_cost_percent = Some(band);
            }
        }
    }

    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn costs() -> ItemCosts {
        ItemCosts {
            unit_price: dec("12000"),
            ordering_cost: dec("40000"),
            holding_cost_percent: dec("0.25"),
        }
    }

    #[test]
    fn test_rolling_ordering_cost_uses_window() {
        let history = vec![dec("10"), dec("20"), dec("30"), dec("1000")];
        assert_eq!(rolling_ordering_cost(&history, 3), Some(dec("20")));
        assert_eq!(rolling_ordering_cost(&[], 10), None);
    }

    #[test]
    fn test_holding_cost_bands() {
        assert_eq!(holding_cost_band(dec("2500000")), dec("0.15"));
        assert_eq!(holding_cost_band(dec("100000")), dec("0.20"));
        assert_eq!(holding_cost_band(dec("15000")), dec("0.25"));
        assert_eq!(holding_cost_band(dec("800")), dec("0.30"));
    }

    #[test]
    fn test_significant_price_change() {
        let threshold = dec("0.10");
        assert!(!is_significant_price_change(dec("100"), dec("110"), threshold));
        assert!(is_significant_price_change(dec("100"), dec("111"), threshold));
        assert!(is_significant_price_change(dec("100"), dec("85"), threshold));
        assert!(is_significant_price_change(Decimal::ZERO, dec("5"), threshold));
    }

    #[test]
    fn test_plan_small_price_change_keeps_holding_percent() {
        let update = plan_cost_update(&costs(), &[dec("50000"), dec("30000")], Some(dec("12500")), &CostFeedbackSettings::default());
        // mean of the history equals the stored cost, nothing to write
        assert_eq!(update.ordering_cost, None);
        assert_eq!(update.unit_price, Some(dec("12500")));
        assert_eq!(update.holding_cost_percent, None);
    }

    #[test]
    fn test_plan_large_price_change_rebands() {
        let update = plan_cost_update(&costs(), &[dec("60000")], Some(dec("150000")), &CostFeedbackSettings::default());
        assert_eq!(update.ordering_cost, Some(dec("60000")));
        assert_eq!(update.unit_price, Some(dec("150000")));
        assert_eq!(update.holding_cost_percent, Some(dec("0.20")));
    }

    #[test]
    fn test_plan_without_price_or_history_is_empty() {
        let update = plan_cost_update(&costs(), &[], None, &CostFeedbackSettings::default());
        assert!(update.is_empty());
    }
}
