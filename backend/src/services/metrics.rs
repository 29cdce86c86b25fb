//! Inventory metrics service: EOQ, ROP and Safety Stock per item

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::metrics::{calculate_metrics, DemandStats, InventoryMetrics, MetricsInput, MetricsSettings};
use shared::models::Item;
use shared::types::ItemRef;
use tracing::{debug, error, info};

use crate::error::AppResult;
use crate::jobs::BatchReport;
use crate::services::store::{DemandHistory, InventoryStore};

/// Metrics service recomputing and persisting derived stock levels
#[derive(Clone)]
pub struct MetricsService {
    store: Arc<dyn InventoryStore>,
    settings: MetricsSettings,
    history_days: i64,
}

impl MetricsService {
    pub fn new(store: Arc<dyn InventoryStore>, settings: MetricsSettings, history_days: i64) -> Self {
        Self {
            store,
            settings,
            history_days,
        }
    }

    pub fn settings(&self) -> &MetricsSettings {
        &self.settings
    }

    /// Recompute EOQ, ROP and Safety Stock for one item and persist them.
    ///
    /// Insufficient history yields zeros, never an error.
    pub async fn calculate_metrics(&self, item: ItemRef) -> AppResult<InventoryMetrics> {
        let record = self.store.get_item(item).await?;
        let metrics = self.compute(&record, Utc::now().date_naive()).await?;
        self.store.save_metrics(item, &metrics).await?;

        debug!(
            "Metrics for {} {}: eoq={} rop={} safety_stock={}",
            item, record.code, metrics.eoq, metrics.rop, metrics.safety_stock
        );

        Ok(metrics)
    }

    /// Recompute every active item. One item failing is logged and the scan
    /// continues.
    pub async fn update_all_metrics(&self) -> AppResult<BatchReport> {
        let items = self.store.active_items().await?;
        let mut report = BatchReport::default();

        for item in items {
            report.scanned += 1;
            match self.calculate_metrics(item).await {
                Ok(_) => report.updated += 1,
                Err(e) => {
                    report.failed += 1;
                    error!("Failed to update metrics for {}: {}", item, e);
                }
            }
        }

        info!(
            "Metrics recompute finished: scanned={} updated={} failed={}",
            report.scanned, report.updated, report.failed
        );

        Ok(report)
    }

    async fn compute(&self, item: &Item, today: NaiveDate) -> AppResult<InventoryMetrics> {
        let since = today - Duration::days(self.history_days.max(1) - 1);
        let history = self.store.demand_history(item.item_ref(), since).await?;
        let daily = daily_demand_series(&history, today);

        let input = MetricsInput {
            unit_price: item.unit_price,
            ordering_cost: item.ordering_cost,
            holding_cost_percent: item.holding_cost_percent,
            lead_time_days: item.lead_time_days,
            demand: DemandStats::from_daily(&daily),
        };

        Ok(calculate_metrics(&self.settings, &input))
    }
}

/// One demand figure per day from the first movement through `today`.
/// Days without outflow count as zero demand.
pub fn daily_demand_series(history: &DemandHistory, today: NaiveDate) -> Vec<Decimal> {
    let Some(start) = history.first_movement else {
        return Vec::new();
    };
    if start > today {
        return Vec::new();
    }

    let days = (today - start).num_days() as usize + 1;
    let mut series = vec![Decimal::ZERO; days];
    for (day, quantity) in &history.outflows {
        if *day < start || *day > today {
            continue;
        }
        let index = (*day - start).num_days() as usize;
        series[index] += *quantity;
    }
    series
}
