//! Inventory metrics tests
//!
//! Tests for the EOQ / ROP / Safety Stock calculator including:
//! - Known values and degenerate inputs
//! - Property: EOQ is non-negative, whole and deterministic
//! - Batch recompute through the metrics service

mod common;

use common::{dec, item, settings, steady_demand, MemoryStore};
use inventory_procurement_backend::services::metrics::daily_demand_series;
use inventory_procurement_backend::services::MetricsService;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::metrics::{
    calculate_metrics, economic_order_quantity, reorder_point, safety_stock, whole_units, DemandStats,
    HoldingCostMethod, MetricsInput,
};
use shared::types::{ItemKind, ItemRef};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_eoq_known_value() {
        // √(2 × 3650 × 100 / 73) = 100
        let eoq = economic_order_quantity(dec("3650"), dec("100"), dec("73"));
        assert_eq!(whole_units(eoq), dec("100"));
    }

    #[test]
    fn test_eoq_degenerate_inputs_are_zero() {
        assert_eq!(economic_order_quantity(Decimal::ZERO, dec("100"), dec("73")), Decimal::ZERO);
        assert_eq!(economic_order_quantity(dec("3650"), Decimal::ZERO, dec("73")), Decimal::ZERO);
        assert_eq!(economic_order_quantity(dec("3650"), dec("100"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_reorder_point_includes_safety_stock() {
        assert_eq!(reorder_point(dec("10"), 5, dec("10")), dec("60"));
        assert_eq!(reorder_point(dec("10"), 0, dec("10")), dec("10"));
    }

    #[test]
    fn test_safety_stock_zero_without_variation() {
        assert_eq!(safety_stock(dec("1.65"), Decimal::ZERO, 7), Decimal::ZERO);
    }

    #[test]
    fn test_fixed_holding_cost() {
        let mut settings = settings();
        settings.holding_cost_method = HoldingCostMethod::Fixed;
        settings.holding_cost_fixed = dec("73");

        let input = MetricsInput {
            unit_price: dec("999999"),
            ordering_cost: dec("100"),
            holding_cost_percent: Decimal::ZERO,
            lead_time_days: Some(5),
            demand: DemandStats::from_daily(&[dec("10"); 30]),
        };
        let metrics = calculate_metrics(&settings, &input);

        assert_eq!(metrics.holding_cost_per_unit, dec("73"));
        assert_eq!(metrics.eoq, dec("100"));
        assert_eq!(metrics.safety_stock, Decimal::ZERO);
        assert_eq!(metrics.rop, dec("50"));
    }

    #[test]
    fn test_default_lead_time_applies() {
        let input = MetricsInput {
            unit_price: dec("365"),
            ordering_cost: dec("100"),
            holding_cost_percent: Decimal::ZERO,
            lead_time_days: None,
            demand: DemandStats::from_daily(&[dec("10"); 10]),
        };
        let metrics = calculate_metrics(&settings(), &input);

        assert_eq!(metrics.lead_time_days, 7);
        assert_eq!(metrics.rop, dec("70"));
    }

    #[test]
    fn test_series_starts_at_first_movement() {
        let history = steady_demand();
        let today = chrono::Utc::now().date_naive();
        let series = daily_demand_series(&history, today);
        assert_eq!(series, vec![dec("5"), dec("15"), dec("5"), dec("15")]);
    }
}

// ============================================================================
// Service Tests
// ============================================================================

#[tokio::test]
async fn test_calculate_metrics_persists_levels() {
    let store = MemoryStore::new();
    let flour = store.insert_item(item(ItemKind::RawMaterial, "100"));
    store.set_demand(flour, steady_demand());
    let service = MetricsService::new(store.clone(), settings(), 90);

    let metrics = service.calculate_metrics(flour).await.unwrap();

    assert_eq!(metrics.eoq, dec("100"));
    assert_eq!(metrics.safety_stock, dec("10"));
    assert_eq!(metrics.rop, dec("60"));
    assert_eq!(store.saved_metrics(flour), Some(metrics));
}

#[tokio::test]
async fn test_insufficient_history_yields_zeros() {
    let store = MemoryStore::new();
    let flour = store.insert_item(item(ItemKind::RawMaterial, "100"));
    let service = MetricsService::new(store.clone(), settings(), 90);

    let metrics = service.calculate_metrics(flour).await.unwrap();

    assert_eq!(metrics.eoq, Decimal::ZERO);
    assert_eq!(metrics.rop, Decimal::ZERO);
    assert_eq!(metrics.safety_stock, Decimal::ZERO);
}

#[tokio::test]
async fn test_update_all_continues_past_failures() {
    let store = MemoryStore::new();
    let flour = store.insert_item(item(ItemKind::RawMaterial, "100"));
    store.set_demand(flour, steady_demand());
    let bread = store.insert_item(item(ItemKind::Product, "100"));
    store.add_missing(ItemRef::raw_material(uuid::Uuid::new_v4()));
    let service = MetricsService::new(store.clone(), settings(), 90);

    let report = service.update_all_metrics().await.unwrap();

    assert_eq!(report.scanned, 3);
    assert_eq!(report.updated, 2);
    assert_eq!(report.failed, 1);
    assert!(store.saved_metrics(flour).is_some());
    assert!(store.saved_metrics(bread).is_some());
}

// ============================================================================
// Property Tests
// ============================================================================

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    /// EOQ is a whole, non-negative quantity
    #[test]
    fn prop_eoq_is_whole_and_non_negative(
        demand in amount_strategy(),
        ordering in amount_strategy(),
        holding in amount_strategy(),
    ) {
        let eoq = whole_units(economic_order_quantity(demand, ordering, holding));
        prop_assert!(eoq >= Decimal::ZERO);
        prop_assert_eq!(eoq, eoq.trunc());
    }

    /// Amounts far beyond any real stock level resolve instead of panicking,
    /// so one bad row cannot stop the daily recompute
    #[test]
    fn prop_huge_inputs_never_panic(
        daily in prop::collection::vec(1_000_000_000_000i64..i64::MAX, 2..60),
        ordering in 1_000_000_000_000_000i64..i64::MAX,
        lead_time in 1i32..365,
    ) {
        let daily: Vec<Decimal> = daily.into_iter().map(Decimal::from).collect();
        let input = MetricsInput {
            unit_price: Decimal::ONE,
            ordering_cost: Decimal::from(ordering),
            holding_cost_percent: Decimal::ZERO,
            lead_time_days: Some(lead_time),
            demand: DemandStats::from_daily(&daily),
        };
        let metrics = calculate_metrics(&settings(), &input);
        prop_assert!(metrics.eoq >= Decimal::ZERO);
        prop_assert!(metrics.rop >= Decimal::ZERO);
        prop_assert_eq!(
            economic_order_quantity(Decimal::from(ordering), Decimal::from(ordering), Decimal::ONE),
            Decimal::ZERO
        );
    }

    /// Same inputs always give the same levels
    #[test]
    fn prop_metrics_are_deterministic(
        daily in prop::collection::vec(0i64..500i64, 0..60),
        lead_time in 1i32..60,
    ) {
        let daily: Vec<Decimal> = daily.into_iter().map(Decimal::from).collect();
        let input = MetricsInput {
            unit_price: dec("365"),
            ordering_cost: dec("100"),
            holding_cost_percent: Decimal::ZERO,
            lead_time_days: Some(lead_time),
            demand: DemandStats::from_daily(&daily),
        };
        let first = calculate_metrics(&settings(), &input);
        let second = calculate_metrics(&settings(), &input);
        prop_assert_eq!(first, second);
    }

    /// Reorder point never sits below safety stock
    #[test]
    fn prop_rop_covers_safety_stock(
        daily in prop::collection::vec(0i64..500i64, 1..60),
        lead_time in 1i32..60,
    ) {
        let daily: Vec<Decimal> = daily.into_iter().map(Decimal::from).collect();
        let input = MetricsInput {
            unit_price: dec("365"),
            ordering_cost: dec("100"),
            holding_cost_percent: Decimal::ZERO,
            lead_time_days: Some(lead_time),
            demand: DemandStats::from_daily(&daily),
        };
        let metrics = calculate_metrics(&settings(), &input);
        prop_assert!(metrics.rop >= metrics.safety_stock);
        prop_assert!(metrics.safety_stock >= Decimal::ZERO);
    }
}
