//! Downstream cost feedback after goods receipts
//!
//! Learns the ordering cost, unit price and holding percentage of an item
//! from what was actually received. Writes only cost fields, so no stock
//! event and no reorder check follows.

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::cost::{plan_cost_update, CostFeedbackSettings, CostUpdate, ItemCosts};
use shared::models::GoodsReceipt;
use shared::types::ItemRef;
use tracing::{debug, error, info};

use crate::error::AppResult;
use crate::services::store::InventoryStore;

#[derive(Clone)]
pub struct CostFeedbackService {
    store: Arc<dyn InventoryStore>,
    settings: CostFeedbackSettings,
}

impl CostFeedbackService {
    pub fn new(store: Arc<dyn InventoryStore>, settings: CostFeedbackSettings) -> Self {
        Self { store, settings }
    }

    /// Recompute and persist the cost fields of one item
    pub async fn apply(&self, item: ItemRef, receipt_price: Option<Decimal>) -> AppResult<CostUpdate> {
        let record = self.store.get_item(item).await?;
        let recent = self
            .store
            .recent_ordering_costs(item, self.settings.window)
            .await?;

        let current = ItemCosts {
            unit_price: record.unit_price,
            ordering_cost: record.ordering_cost,
            holding_cost_percent: record.holding_cost_percent,
        };
        let update = plan_cost_update(&current, &recent, receipt_price, &self.settings);

        if update.is_empty() {
            debug!("No cost change for {}", item);
            return Ok(update);
        }

        self.store.update_costs(item, &update).await?;
        info!(
            "Cost feedback for {} {}: ordering_cost={:?} unit_price={:?} holding_cost_percent={:?}",
            record.code, item, update.ordering_cost, update.unit_price, update.holding_cost_percent
        );
        Ok(update)
    }

    /// Run feedback for every item on a receipt. Failures are logged and
    /// never undo the receipt.
    pub async fn after_receipt(&self, receipt: &GoodsReceipt) {
        for line in &receipt.lines {
            let item = ItemRef::new(line.item_kind, line.item_id);
            if let Err(e) = self.apply(item, line.unit_price).await {
                error!(
                    "Cost feedback failed for {} after receipt {}: {}",
                    item, receipt.id, e
                );
            }
        }
    }
}
