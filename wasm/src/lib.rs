//! WebAssembly module for the Inventory & Procurement platform
//!
//! Provides client-side computation for:
//! - EOQ, safety stock and reorder point previews
//! - Full metrics preview from a JSON item profile
//! - Reorder priority
//! - Which procurement actions a role may take

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

use shared::metrics::{
    calculate_metrics, economic_order_quantity, reorder_point, safety_stock, whole_units,
    MetricsInput, MetricsSettings,
};
use shared::models::{ProcurementStatus, RoleId};
use shared::reorder::reorder_priority;
use shared::workflow::{authorize_transition, roles_acting_on};

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// EOQ rounded up to whole units, zero for degenerate input
#[wasm_bindgen]
pub fn calculate_eoq(annual_demand: f64, ordering_cost: f64, holding_cost: f64) -> f64 {
    let eoq = economic_order_quantity(
        to_decimal(annual_demand),
        to_decimal(ordering_cost),
        to_decimal(holding_cost),
    );
    to_f64(whole_units(eoq))
}

/// Safety stock rounded up to whole units
#[wasm_bindgen]
pub fn calculate_safety_stock(z_score: f64, std_deviation: f64, lead_time_days: i32) -> f64 {
    let ss = safety_stock(to_decimal(z_score), to_decimal(std_deviation), lead_time_days);
    to_f64(whole_units(ss))
}

/// Reorder point rounded up to whole units
#[wasm_bindgen]
pub fn calculate_reorder_point(average_daily_demand: f64, lead_time_days: i32, safety: f64) -> f64 {
    let rop = reorder_point(to_decimal(average_daily_demand), lead_time_days, to_decimal(safety));
    to_f64(whole_units(rop))
}

/// EOQ, ROP and safety stock for one item profile under default settings.
/// Takes a `MetricsInput` as JSON and returns `InventoryMetrics` as JSON.
#[wasm_bindgen]
pub fn calculate_metrics_preview(input_json: &str) -> Result<String, JsValue> {
    let input: MetricsInput = serde_json::from_str(input_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid metrics input: {}", e)))?;

    let metrics = calculate_metrics(&MetricsSettings::default(), &input);
    serde_json::to_string(&metrics).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// "normal", "high" or "urgent"
#[wasm_bindgen]
pub fn classify_reorder_priority(stock: f64, rop: f64, safety: f64) -> String {
    reorder_priority(to_decimal(stock), to_decimal(rop), to_decimal(safety))
        .as_str()
        .to_string()
}

/// Whether `role` may move a request from `from` to `to`. Line guards are
/// checked server-side.
#[wasm_bindgen]
pub fn can_transition(role: &str, from: &str, to: &str) -> bool {
    let (Some(role), Some(from), Some(to)) = (
        RoleId::parse(role),
        ProcurementStatus::parse(from),
        ProcurementStatus::parse(to),
    ) else {
        web_sys::console::warn_1(&JsValue::from_str("can_transition: unknown role or status"));
        return false;
    };
    authorize_transition(role, from, to).is_ok()
}

/// Roles that may act on a request in `status`, for approval badges
#[wasm_bindgen]
pub fn roles_for_status(status: &str) -> Result<js_sys::Array, JsValue> {
    let status = ProcurementStatus::parse(status)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown status: {}", status)))?;

    Ok(roles_acting_on(status)
        .into_iter()
        .map(|role| JsValue::from_str(role.as_str()))
        .collect())
}
