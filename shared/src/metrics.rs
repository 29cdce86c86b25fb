//! Inventory metrics calculator: EOQ, Reorder Point and Safety Stock
//!
//! All functions are best effort. Degenerate inputs (no demand, zero holding
//! cost, a single observation) resolve to zero instead of failing, so a daily
//! recompute over every item always finishes.
//!
//! ```text
//! holding cost   H   = unit price × holding %        (percentage mode)
//!                    = configured fixed amount        (fixed mode)
//! EOQ                = √(2 × D × S / H)
//! safety stock   SS  = z × σ(daily demand) × √(lead time)
//! reorder point  ROP = avg daily demand × lead time + SS
//! ```

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

/// Days used to annualise average daily demand
pub const DAYS_PER_YEAR: i64 = 365;

/// How the per-unit annual holding cost is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldingCostMethod {
    #[default]
    Percentage,
    Fixed,
}

/// Calculator settings, normally built from configuration.
///
/// `z_score` is expected to match `service_level` (1.65 for 95%, 2.33 for
/// 99%); the two are not cross-checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSettings {
    pub holding_cost_method: HoldingCostMethod,
    pub holding_cost_percentage: Decimal,
    pub holding_cost_fixed: Decimal,
    pub service_level: Decimal,
    pub z_score: Decimal,
    pub default_lead_time_days: i32,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            holding_cost_method: HoldingCostMethod::Percentage,
            holding_cost_percentage: Decimal::new(20, 2),
            holding_cost_fixed: Decimal::ZERO,
            service_level: Decimal::new(95, 2),
            z_score: Decimal::new(165, 2),
            default_lead_time_days: 7,
        }
    }
}

/// Summary of daily consumption over the history window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandStats {
    pub observations: usize,
    pub total: Decimal,
    pub average_daily: Decimal,
    pub std_deviation: Decimal,
}

impl DemandStats {
    pub fn empty() -> Self {
        Self {
            observations: 0,
            total: Decimal::ZERO,
            average_daily: Decimal::ZERO,
            std_deviation: Decimal::ZERO,
        }
    }

    /// Build from one consumption figure per day (zero days included).
    /// Uses the sample standard deviation; fewer than two days gives zero.
    pub fn from_daily(daily: &[Decimal]) -> Self {
        if daily.is_empty() {
            return Self::empty();
        }

        let n = Decimal::from(daily.len() as i64);
        let Some(total) = daily
            .iter()
            .try_fold(Decimal::ZERO, |acc, d| acc.checked_add(*d))
        else {
            return Self::empty();
        };
        let average_daily = total / n;

        let std_deviation = if daily.len() < 2 {
            Decimal::ZERO
        } else {
            daily
                .iter()
                .try_fold(Decimal::ZERO, |acc, d| {
                    let diff = d.checked_sub(average_daily)?;
                    acc.checked_add(diff.checked_mul(diff)?)
                })
                .and_then(|squared| squared.checked_div(n - Decimal::ONE))
                .and_then(|variance| variance.sqrt())
                .unwrap_or(Decimal::ZERO)
        };

        Self {
            observations: daily.len(),
            total,
            average_daily,
            std_deviation,
        }
    }

    /// Zero when annualising would overflow
    pub fn annual_demand(&self) -> Decimal {
        self.average_daily
            .checked_mul(Decimal::from(DAYS_PER_YEAR))
            .unwrap_or(Decimal::ZERO)
    }
}

/// Per-item inputs to the calculator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsInput {
    pub unit_price: Decimal,
    pub ordering_cost: Decimal,
    /// Item-specific holding percentage; the configured default applies when
    /// this is zero
    pub holding_cost_percent: Decimal,
    pub lead_time_days: Option<i32>,
    pub demand: DemandStats,
}

/// Calculator output, rounded up to whole units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMetrics {
    pub eoq: Decimal,
    pub rop: Decimal,
    pub safety_stock: Decimal,
    pub holding_cost_per_unit: Decimal,
    pub annual_demand: Decimal,
    pub average_daily_demand: Decimal,
    pub lead_time_days: i32,
}

impl InventoryMetrics {
    pub fn zero(lead_time_days: i32) -> Self {
        Self {
            eoq: Decimal::ZERO,
            rop: Decimal::ZERO,
            safety_stock: Decimal::ZERO,
            holding_cost_per_unit: Decimal::ZERO,
            annual_demand: Decimal::ZERO,
            average_daily_demand: Decimal::ZERO,
            lead_time_days,
        }
    }
}

/// Annual holding cost of one unit
pub fn holding_cost_per_unit(
    settings: &MetricsSettings,
    unit_price: Decimal,
    item_percent: Decimal,
) -> Decimal {
    match settings.holding_cost_method {
        HoldingCostMethod::Fixed => settings.holding_cost_fixed,
        HoldingCostMethod::Percentage => {
            let percent = if item_percent > Decimal::ZERO {
                item_percent
            } else {
                settings.holding_cost_percentage
            };
            unit_price.checked_mul(percent).unwrap_or(Decimal::ZERO)
        }
    }
}

/// Economic order quantity, unrounded. Zero when any input is non-positive
/// or the intermediate product overflows.
pub fn economic_order_quantity(
    annual_demand: Decimal,
    ordering_cost: Decimal,
    holding_cost: Decimal,
) -> Decimal {
    if holding_cost <= Decimal::ZERO
        || annual_demand <= Decimal::ZERO
        || ordering_cost <= Decimal::ZERO
    {
        return Decimal::ZERO;
    }

    Decimal::from(2)
        .checked_mul(annual_demand)
        .and_then(|v| v.checked_mul(ordering_cost))
        .and_then(|v| v.checked_div(holding_cost))
        .and_then(|v| v.sqrt())
        .unwrap_or(Decimal::ZERO)
}

/// Safety stock, unrounded
pub fn safety_stock(z_score: Decimal, std_deviation: Decimal, lead_time_days: i32) -> Decimal {
    if lead_time_days <= 0 || std_deviation <= Decimal::ZERO || z_score <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let lead_time_root = Decimal::from(lead_time_days)
        .sqrt()
        .unwrap_or(Decimal::ZERO);
    z_score
        .checked_mul(std_deviation)
        .and_then(|v| v.checked_mul(lead_time_root))
        .unwrap_or(Decimal::ZERO)
}

/// Reorder point, unrounded
pub fn reorder_point(
    average_daily_demand: Decimal,
    lead_time_days: i32,
    safety_stock: Decimal,
) -> Decimal {
    let lead_time = Decimal::from(lead_time_days.max(0));
    average_daily_demand
        .checked_mul(lead_time)
        .map(|cycle| cycle.max(Decimal::ZERO))
        .and_then(|cycle| cycle.checked_add(safety_stock))
        .unwrap_or(Decimal::ZERO)
}

/// Round a quantity up to whole units.
/// Trims sqrt noise first so an exact 100 does not become 101.
pub fn whole_units(quantity: Decimal) -> Decimal {
    if quantity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    quantity.round_dp(6).ceil()
}

/// Compute EOQ, ROP and Safety Stock for one item
pub fn calculate_metrics(settings: &MetricsSettings, input: &MetricsInput) -> InventoryMetrics {
    let lead_time_days = input
        .lead_time_days
        .filter(|days| *days > 0)
        .unwrap_or(settings.default_lead_time_days);

    if input.demand.observations == 0 {
        return InventoryMetrics::zero(lead_time_days);
    }

    let holding_cost =
        holding_cost_per_unit(settings, input.unit_price, input.holding_cost_percent);
    let annual_demand = input.demand.annual_demand();

    let eoq = economic_order_quantity(annual_demand, input.ordering_cost, holding_cost);
    let safety = whole_units(safety_stock(
        settings.z_score,
        input.demand.std_deviation,
        lead_time_days,
    ));
    let rop = whole_units(reorder_point(
        input.demand.average_daily,
        lead_time_days,
        safety,
    ));

    InventoryMetrics {
        eoq: whole_units(eoq),
        rop,
        safety_stock: safety,
        holding_cost_per_unit: holding_cost,
        annual_demand,
        average_daily_demand: input.demand.average_daily,
        lead_time_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_eoq_textbook_example() {
        // D = 1200, S = 50, H = 12 -> sqrt(10000) = 100
        let eoq = economic_order_quantity(dec("1200"), dec("50"), dec("12"));
        assert_eq!(whole_units(eoq), dec("100"));
    }

    #[test]
    fn test_eoq_zero_holding_cost() {
        assert_eq!(economic_order_quantity(dec("1200"), dec("50"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(economic_order_quantity(dec("1200"), dec("50"), dec("-1")), Decimal::ZERO);
    }

    #[test]
    fn test_eoq_zero_demand() {
        assert_eq!(economic_order_quantity(Decimal::ZERO, dec("50"), dec("12")), Decimal::ZERO);
    }

    #[test]
    fn test_holding_cost_modes() {
        let mut settings = MetricsSettings::default();
        assert_eq!(holding_cost_per_unit(&settings, dec("10000"), Decimal::ZERO), dec("2000"));
        assert_eq!(holding_cost_per_unit(&settings, dec("10000"), dec("0.25")), dec("2500"));

        settings.holding_cost_method = HoldingCostMethod::Fixed;
        settings.holding_cost_fixed = dec("750");
        assert_eq!(holding_cost_per_unit(&settings, dec("10000"), dec("0.25")), dec("750"));
    }

    #[test]
    fn test_demand_stats_sample_deviation() {
        let stats = DemandStats::from_daily(&[dec("2"), dec("4"), dec("4"), dec("4"), dec("5"), dec("5"), dec("7"), dec("9")]);
        assert_eq!(stats.observations, 8);
        assert_eq!(stats.average_daily, dec("5"));
        // sample variance = 32 / 7
        let expected = (dec("32") / dec("7")).sqrt().unwrap();
        assert!((stats.std_deviation - expected).abs() < dec("0.000001"));
    }

    #[test]
    fn test_demand_stats_single_observation() {
        let stats = DemandStats::from_daily(&[dec("12")]);
        assert_eq!(stats.std_deviation, Decimal::ZERO);
        assert_eq!(stats.average_daily, dec("12"));
    }

    #[test]
    fn test_safety_stock_and_rop() {
        // z = 1.65, sigma = 2, LT = 4 -> 1.65 * 2 * 2 = 6.6
        let ss = safety_stock(dec("1.65"), dec("2"), 4);
        assert!((ss - dec("6.6")).abs() < dec("0.000001"));
        // 10/day * 4 days + 7 = 47
        assert_eq!(reorder_point(dec("10"), 4, dec("7")), dec("47"));
    }

    #[test]
    fn test_safety_stock_zero_variance() {
        assert_eq!(safety_stock(dec("1.65"), Decimal::ZERO, 7), Decimal::ZERO);
    }

    #[test]
    fn test_calculate_metrics_no_history_is_zero() {
        let input = MetricsInput {
            unit_price: dec("15000"),
            ordering_cost: dec("50000"),
            holding_cost_percent: Decimal::ZERO,
            lead_time_days: None,
            demand: DemandStats::empty(),
        };
        let metrics = calculate_metrics(&MetricsSettings::default(), &input);
        assert_eq!(metrics, InventoryMetrics::zero(7));
    }

    #[test]
    fn test_calculate_metrics_constant_demand() {
        // 10 units every day for 30 days, price 100, 20% holding, S = 60
        let daily = vec![dec("10"); 30];
        let input = MetricsInput {
            unit_price: dec("100"),
            ordering_cost: dec("60"),
            holding_cost_percent: Decimal::ZERO,
            lead_time_days: Some(5),
            demand: DemandStats::from_daily(&daily),
        };
        let metrics = calculate_metrics(&MetricsSettings::default(), &input);

        // D = 3650, H = 20 -> sqrt(2 * 3650 * 60 / 20) = sqrt(21900) = 147.98...
        assert_eq!(metrics.eoq, dec("148"));
        assert_eq!(metrics.safety_stock, Decimal::ZERO);
        assert_eq!(metrics.rop, dec("50"));
        assert_eq!(metrics.lead_time_days, 5);
    }

    #[test]
    fn test_eoq_overflowing_inputs_resolve_to_zero() {
        let huge = dec("1000000000000000");
        assert_eq!(economic_order_quantity(huge, huge, Decimal::ONE), Decimal::ZERO);
        assert_eq!(economic_order_quantity(Decimal::MAX, dec("2"), Decimal::ONE), Decimal::ZERO);
    }

    #[test]
    fn test_demand_stats_overflow_is_empty() {
        let stats = DemandStats::from_daily(&[Decimal::MAX, Decimal::MAX]);
        assert_eq!(stats, DemandStats::empty());
    }

    #[test]
    fn test_demand_stats_overflowing_variance_is_zero() {
        let stats = DemandStats::from_daily(&[Decimal::MAX, Decimal::ZERO]);
        assert_eq!(stats.observations, 2);
        assert_eq!(stats.std_deviation, Decimal::ZERO);
    }

    #[test]
    fn test_rop_and_safety_stock_overflow_is_zero() {
        assert_eq!(safety_stock(Decimal::MAX, Decimal::MAX, 4), Decimal::ZERO);
        assert_eq!(reorder_point(Decimal::MAX, 30, Decimal::ZERO), Decimal::ZERO);
        let stats = DemandStats::from_daily(&[Decimal::MAX]);
        assert_eq!(stats.annual_demand(), Decimal::ZERO);
    }

    #[test]
    fn test_whole_units_rounds_up() {
        assert_eq!(whole_units(dec("12.01")), dec("13"));
        assert_eq!(whole_units(dec("12")), dec("12"));
        assert_eq!(whole_units(dec("-3")), Decimal::ZERO);
    }
}
