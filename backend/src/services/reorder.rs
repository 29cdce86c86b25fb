//! Reorder trigger: raise an automatic procurement request when stock falls
//! to the reorder point

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shared::reorder::{evaluate, needed_by, ReorderDecision, ReorderLevels, ReorderPlan, SkipReason};
use shared::types::{ItemKind, ItemRef};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::events::{DomainEvent, EventHandler};
use crate::jobs::BatchReport;
use crate::services::metrics::MetricsService;
use crate::services::store::{InventoryStore, NewReorderRequest, ReorderOutcome};

/// Result of checking one item
#[derive(Debug, Clone, PartialEq)]
pub enum ReorderResult {
    Created {
        request_id: Uuid,
        code: String,
        plan: ReorderPlan,
    },
    Skipped(SkipReason),
}

impl ReorderResult {
    pub fn is_created(&self) -> bool {
        matches!(self, ReorderResult::Created { .. })
    }
}

#[derive(Clone)]
pub struct ReorderService {
    store: Arc<dyn InventoryStore>,
    metrics: MetricsService,
    lead_window_days: i64,
}

impl ReorderService {
    pub fn new(store: Arc<dyn InventoryStore>, metrics: MetricsService, lead_window_days: i64) -> Self {
        Self {
            store,
            metrics,
            lead_window_days,
        }
    }

    /// Reactive path, run after a committed stock change
    pub async fn on_stock_changed(
        &self,
        item: ItemRef,
        old_stock: Decimal,
        new_stock: Decimal,
    ) -> AppResult<ReorderResult> {
        if old_stock == new_stock {
            return Ok(ReorderResult::Skipped(SkipReason::StockUnchanged));
        }
        self.check_item(item).await
    }

    /// Recompute the item's metrics, then create a request if stock is at or
    /// below the reorder point and nothing is open for the item yet
    pub async fn check_item(&self, item: ItemRef) -> AppResult<ReorderResult> {
        let record = self.store.get_item(item).await?;
        if !record.is_active {
            return Ok(ReorderResult::Skipped(SkipReason::InactiveItem));
        }

        let metrics = self.metrics.calculate_metrics(item).await?;
        let levels = ReorderLevels {
            eoq: metrics.eoq,
            rop: metrics.rop,
            safety_stock: metrics.safety_stock,
        };

        let open_exists = self.store.has_open_request(item).await?;
        let plan = match evaluate(record.stock, &levels, open_exists) {
            ReorderDecision::Skip(reason) => {
                debug!("Reorder skipped for {}: {}", item, reason.as_str());
                return Ok(ReorderResult::Skipped(reason));
            }
            ReorderDecision::Create(plan) => plan,
        };

        let supplier_id = match item.kind {
            ItemKind::Product => None,
            ItemKind::RawMaterial => match self.store.default_supplier().await? {
                Some(supplier) => Some(supplier.id),
                None => {
                    warn!(
                        "No active supplier, automatic procurement for {} ({}) aborted",
                        record.code, item
                    );
                    return Ok(ReorderResult::Skipped(SkipReason::NoSupplier));
                }
            },
        };

        let request = NewReorderRequest {
            item,
            item_name: record.name.clone(),
            unit: record.unit.clone(),
            quantity: plan.quantity,
            unit_price: record.unit_price,
            priority: plan.priority,
            supplier_id,
            needed_by: needed_by(Utc::now().date_naive(), self.lead_window_days),
            reason: format!(
                "Automatic reorder: stock {} at or below reorder point {}",
                record.stock, levels.rop
            ),
        };

        match self.store.create_reorder_request(&request).await? {
            ReorderOutcome::Created { request_id, code } => {
                info!(
                    "Created automatic procurement {} for {} ({}): quantity={} priority={}",
                    code,
                    record.code,
                    item,
                    plan.quantity,
                    plan.priority.as_str()
                );
                Ok(ReorderResult::Created {
                    request_id,
                    code,
                    plan,
                })
            }
            ReorderOutcome::AlreadyOpen => {
                debug!("Open request appeared concurrently for {}", item);
                Ok(ReorderResult::Skipped(SkipReason::OpenRequestExists))
            }
        }
    }

    /// Batch path over every active item; per-item failures are logged
    pub async fn scan_all(&self) -> AppResult<BatchReport> {
        let items = self.store.active_items().await?;
        let mut report = BatchReport::default();

        for item in items {
            report.scanned += 1;
            match self.check_item(item).await {
                Ok(ReorderResult::Created { .. }) => report.created += 1,
                Ok(ReorderResult::Skipped(_)) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!("Reorder check failed for {}: {}", item, e);
                }
            }
        }

        info!(
            "Reorder scan finished: scanned={} created={} skipped={} failed={}",
            report.scanned, report.created, report.skipped, report.failed
        );

        Ok(report)
    }

    /// Body of the `CreateAutomaticProcurement` job
    pub async fn run(&self, item: Option<ItemRef>) -> AppResult<BatchReport> {
        match item {
            None => self.scan_all().await,
            Some(item) => {
                let result = self.check_item(item).await?;
                Ok(BatchReport {
                    scanned: 1,
                    created: usize::from(result.is_created()),
                    skipped: usize::from(!result.is_created()),
                    ..BatchReport::default()
                })
            }
        }
    }
}

/// Event handler feeding `StockChanged` into the reorder trigger
pub struct ReorderHandler {
    reorder: ReorderService,
}

impl ReorderHandler {
    pub fn new(reorder: ReorderService) -> Self {
        Self { reorder }
    }
}

#[async_trait]
impl EventHandler for ReorderHandler {
    fn name(&self) -> &'static str {
        "reorder_trigger"
    }

    async fn handle_event(&self, event: &DomainEvent) -> AppResult<()> {
        let DomainEvent::StockChanged {
            item,
            old_stock,
            new_stock,
            ..
        } = event;

        // A failed check never reaches the stock write that caused it
        if let Err(e) = self.reorder.on_stock_changed(*item, *old_stock, *new_stock).await {
            error!("Reorder check failed for {}: {}", item, e);
        }
        Ok(())
    }
}
