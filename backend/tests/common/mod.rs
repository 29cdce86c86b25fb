//! In-memory `InventoryStore` shared by the service tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use inventory_procurement_backend::services::store::{
    DemandHistory, InventoryStore, NewReorderRequest, ReorderOutcome,
};
use inventory_procurement_backend::services::{MetricsService, ReorderService};
use inventory_procurement_backend::{AppError, AppResult};
use rust_decimal::Decimal;
use shared::cost::CostUpdate;
use shared::metrics::{HoldingCostMethod, InventoryMetrics, MetricsSettings};
use shared::models::{pick_default_supplier, Item, SupplierCandidate};
use shared::types::{ItemKind, ItemRef};
use uuid::Uuid;

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[derive(Default)]
struct MemoryState {
    items: HashMap<ItemRef, Item>,
    demand: HashMap<ItemRef, DemandHistory>,
    suppliers: Vec<SupplierCandidate>,
    requests: Vec<NewReorderRequest>,
    ordering_costs: HashMap<ItemRef, Vec<Decimal>>,
    saved_metrics: HashMap<ItemRef, InventoryMetrics>,
    missing: HashSet<ItemRef>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_item(&self, item: Item) -> ItemRef {
        let item_ref = item.item_ref();
        self.state.lock().unwrap().items.insert(item_ref, item);
        item_ref
    }

    pub fn set_demand(&self, item: ItemRef, history: DemandHistory) {
        self.state.lock().unwrap().demand.insert(item, history);
    }

    pub fn add_supplier(&self, name: &str, completed: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().suppliers.push(SupplierCandidate {
            id,
            name: name.to_string(),
            completed_procurements: completed,
        });
        id
    }

    /// Listed as active but fails on lookup
    pub fn add_missing(&self, item: ItemRef) {
        self.state.lock().unwrap().missing.insert(item);
    }

    /// Newest first
    pub fn set_ordering_costs(&self, item: ItemRef, costs: Vec<Decimal>) {
        self.state.lock().unwrap().ordering_costs.insert(item, costs);
    }

    pub fn set_stock(&self, item: ItemRef, stock: Decimal) {
        if let Some(record) = self.state.lock().unwrap().items.get_mut(&item) {
            record.stock = stock;
        }
    }

    pub fn item(&self, item: ItemRef) -> Item {
        self.state.lock().unwrap().items[&item].clone()
    }

    pub fn requests(&self) -> Vec<NewReorderRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn saved_metrics(&self, item: ItemRef) -> Option<InventoryMetrics> {
        self.state.lock().unwrap().saved_metrics.get(&item).cloned()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn get_item(&self, item: ItemRef) -> AppResult<Item> {
        self.state
            .lock()
            .unwrap()
            .items
            .get(&item)
            .cloned()
            .ok_or_else(|| AppError::NotFound(item.kind.to_string()))
    }

    async fn active_items(&self) -> AppResult<Vec<ItemRef>> {
        let state = self.state.lock().unwrap();
        let mut refs: Vec<ItemRef> = state
            .items
            .values()
            .filter(|item| item.is_active)
            .map(Item::item_ref)
            .collect();
        refs.extend(state.missing.iter().copied());
        Ok(refs)
    }

    async fn demand_history(&self, item: ItemRef, since: NaiveDate) -> AppResult<DemandHistory> {
        let history = self.state.lock().unwrap().demand.get(&item).cloned().unwrap_or_default();
        Ok(DemandHistory {
            first_movement: history.first_movement.map(|day| day.max(since)),
            outflows: history.outflows.into_iter().filter(|(day, _)| *day >= since).collect(),
        })
    }

    async fn save_metrics(&self, item: ItemRef, metrics: &InventoryMetrics) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .items
            .get_mut(&item)
            .ok_or_else(|| AppError::NotFound(item.kind.to_string()))?;
        record.eoq = metrics.eoq;
        record.rop = metrics.rop;
        record.safety_stock = metrics.safety_stock;
        state.saved_metrics.insert(item, metrics.clone());
        Ok(())
    }

    async fn has_open_request(&self, item: ItemRef) -> AppResult<bool> {
        Ok(self.state.lock().unwrap().requests.iter().any(|r| r.item == item))
    }

    async fn default_supplier(&self) -> AppResult<Option<SupplierCandidate>> {
        let state = self.state.lock().unwrap();
        Ok(pick_default_supplier(&state.suppliers).cloned())
    }

    async fn create_reorder_request(&self, request: &NewReorderRequest) -> AppResult<ReorderOutcome> {
        let mut state = self.state.lock().unwrap();
        if state.requests.iter().any(|r| r.item == request.item) {
            return Ok(ReorderOutcome::AlreadyOpen);
        }
        state.requests.push(request.clone());
        Ok(ReorderOutcome::Created {
            request_id: Uuid::new_v4(),
            code: format!("PGD-2026-{:04}", state.requests.len()),
        })
    }

    async fn recent_ordering_costs(&self, item: ItemRef, limit: usize) -> AppResult<Vec<Decimal>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ordering_costs
            .get(&item)
            .map(|costs| costs.iter().take(limit).copied().collect())
            .unwrap_or_default())
    }

    async fn update_costs(&self, item: ItemRef, update: &CostUpdate) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .items
            .get_mut(&item)
            .ok_or_else(|| AppError::NotFound(item.kind.to_string()))?;
        if let Some(cost) = update.ordering_cost {
            record.ordering_cost = cost;
        }
        if let Some(price) = update.unit_price {
            record.unit_price = price;
        }
        if let Some(percent) = update.holding_cost_percent {
            record.holding_cost_percent = percent;
        }
        Ok(())
    }
}

pub fn item(kind: ItemKind, stock: &str) -> Item {
    let now = Utc::now();
    Item {
        id: Uuid::new_v4(),
        kind,
        code: match kind {
            ItemKind::RawMaterial => "BB-0001".to_string(),
            ItemKind::Product => "PRD-0001".to_string(),
        },
        name: "Tepung Terigu".to_string(),
        unit: "kg".to_string(),
        stock: dec(stock),
        unit_price: dec("365"),
        eoq: Decimal::ZERO,
        rop: Decimal::ZERO,
        safety_stock: Decimal::ZERO,
        ordering_cost: dec("100"),
        holding_cost_percent: Decimal::ZERO,
        lead_time_days: Some(5),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Holding 20% of price, z = 0.75
pub fn settings() -> MetricsSettings {
    MetricsSettings {
        holding_cost_method: HoldingCostMethod::Percentage,
        holding_cost_percentage: dec("0.20"),
        holding_cost_fixed: Decimal::ZERO,
        service_level: dec("0.95"),
        z_score: dec("0.75"),
        default_lead_time_days: 7,
    }
}

/// Four days of 5, 15, 5, 15 ending today.
///
/// With `item()` and `settings()` this gives EOQ 100, safety stock 10 and
/// reorder point 60: average 10/day, σ ≈ 5.77, lead time 5 days,
/// H = 365 × 0.20 = 73, S = 100.
pub fn steady_demand() -> DemandHistory {
    let today = Utc::now().date_naive();
    let start = today - Duration::days(3);
    DemandHistory {
        first_movement: Some(start),
        outflows: vec![
            (start, dec("5")),
            (start + Duration::days(1), dec("15")),
            (start + Duration::days(2), dec("5")),
            (today, dec("15")),
        ],
    }
}

pub fn services(store: Arc<MemoryStore>) -> (MetricsService, ReorderService) {
    let metrics = MetricsService::new(store.clone(), settings(), 90);
    let reorder = ReorderService::new(store, metrics.clone(), 7);
    (metrics, reorder)
}
