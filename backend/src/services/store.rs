//! Persistence seam for the metrics, reorder and cost feedback services
//!
//! `InventoryStore` covers exactly what those services read and write, so
//! they can run against PostgreSQL in production and an in-memory store in
//! tests. The query helpers at the bottom are shared with the procurement
//! services that work directly on a transaction.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::cost::CostUpdate;
use shared::metrics::InventoryMetrics;
use shared::models::{
    generate_request_code, pick_default_supplier, Item, ProcurementKind, ProcurementLine,
    ProcurementRequest, ProcurementStatus, Priority, SupplierCandidate,
};
use shared::types::{ItemKind, ItemRef};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Outbound stock per calendar day inside the history window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemandHistory {
    /// Day of the first movement of any direction inside the window
    pub first_movement: Option<NaiveDate>,
    /// (day, quantity consumed), days without outflow omitted
    pub outflows: Vec<(NaiveDate, Decimal)>,
}

/// Everything needed to insert an automatic request
#[derive(Debug, Clone)]
pub struct NewReorderRequest {
    pub item: ItemRef,
    pub item_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub priority: Priority,
    pub supplier_id: Option<Uuid>,
    pub needed_by: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReorderOutcome {
    Created { request_id: Uuid, code: String },
    /// Another open request for the item won the race
    AlreadyOpen,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get_item(&self, item: ItemRef) -> AppResult<Item>;

    /// Every active item of both kinds
    async fn active_items(&self) -> AppResult<Vec<ItemRef>>;

    async fn demand_history(&self, item: ItemRef, since: NaiveDate) -> AppResult<DemandHistory>;

    async fn save_metrics(&self, item: ItemRef, metrics: &InventoryMetrics) -> AppResult<()>;

    /// Whether any non-terminal request references the item
    async fn has_open_request(&self, item: ItemRef) -> AppResult<bool>;

    async fn default_supplier(&self) -> AppResult<Option<SupplierCandidate>>;

    /// Insert an automatic request unless an open one already exists. The
    /// check and the insert happen under the item's row lock.
    async fn create_reorder_request(&self, request: &NewReorderRequest) -> AppResult<ReorderOutcome>;

    /// Ordering costs of the newest receipts referencing the item, newest first
    async fn recent_ordering_costs(&self, item: ItemRef, limit: usize) -> AppResult<Vec<Decimal>>;

    /// Write cost fields only. Never touches stock.
    async fn update_costs(&self, item: ItemRef, update: &CostUpdate) -> AppResult<()>;
}

/// PostgreSQL implementation
#[derive(Clone)]
pub struct PgInventoryStore {
    db: PgPool,
}

impl PgInventoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn get_item(&self, item: ItemRef) -> AppResult<Item> {
        fetch_item(&self.db, item).await
    }

    async fn active_items(&self) -> AppResult<Vec<ItemRef>> {
        let rows = sqlx::query_as::<_, (String, Uuid)>(
            r#"
            SELECT 'raw_material' AS kind, id FROM raw_materials WHERE is_active
            UNION ALL
            SELECT 'product' AS kind, id FROM products WHERE is_active
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|(kind, id)| Ok(ItemRef::new(parse_kind(&kind)?, id)))
            .collect()
    }

    async fn demand_history(&self, item: ItemRef, since: NaiveDate) -> AppResult<DemandHistory> {
        let first_movement = sqlx::query_scalar::<_, Option<NaiveDate>>(
            r#"
            SELECT MIN((created_at AT TIME ZONE 'UTC')::date)
            FROM stock_movements
            WHERE item_kind = $1 AND item_id = $2
              AND (created_at AT TIME ZONE 'UTC')::date >= $3
            "#,
        )
        .bind(item.kind.as_str())
        .bind(item.id)
        .bind(since)
        .fetch_one(&self.db)
        .await?;

        let outflows = sqlx::query_as::<_, (NaiveDate, Decimal)>(
            r#"
            SELECT (created_at AT TIME ZONE 'UTC')::date AS day, SUM(-delta) AS quantity
            FROM stock_movements
            WHERE item_kind = $1 AND item_id = $2 AND delta < 0
              AND (created_at AT TIME ZONE 'UTC')::date >= $3
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(item.kind.as_str())
        .bind(item.id)
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        Ok(DemandHistory {
            first_movement,
            outflows,
        })
    }

    async fn save_metrics(&self, item: ItemRef, metrics: &InventoryMetrics) -> AppResult<()> {
        let sql = format!(
            "UPDATE {} SET eoq = $2, rop = $3, safety_stock = $4, updated_at = NOW() WHERE id = $1",
            item.kind.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(item.id)
            .bind(metrics.eoq)
            .bind(metrics.rop)
            .bind(metrics.safety_stock)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(item.kind.to_string()));
        }
        Ok(())
    }

    async fn has_open_request(&self, item: ItemRef) -> AppResult<bool> {
        let mut conn = self.db.acquire().await?;
        open_request_exists(&mut conn, item).await
    }

    async fn default_supplier(&self) -> AppResult<Option<SupplierCandidate>> {
        let rows = sqlx::query_as::<_, (Uuid, String, i64)>(
            r#"
            SELECT s.id, s.name, COUNT(r.id) AS completed_procurements
            FROM suppliers s
            LEFT JOIN procurement_requests r
                   ON r.supplier_id = s.id AND r.status = 'completed'
            WHERE s.is_active
            GROUP BY s.id, s.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let candidates: Vec<SupplierCandidate> = rows
            .into_iter()
            .map(|(id, name, completed_procurements)| SupplierCandidate {
                id,
                name,
                completed_procurements,
            })
            .collect();

        Ok(pick_default_supplier(&candidates).cloned())
    }

    async fn create_reorder_request(&self, request: &NewReorderRequest) -> AppResult<ReorderOutcome> {
        let mut tx = self.db.begin().await?;

        // Serializes concurrent checks for the same item
        let locked = sqlx::query_scalar::<_, Uuid>(&format!(
            "SELECT id FROM {} WHERE id = $1 FOR UPDATE",
            request.item.kind.table_name()
        ))
        .bind(request.item.id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            return Err(AppError::NotFound(request.item.kind.to_string()));
        }

        if open_request_exists(&mut tx, request.item).await? {
            return Ok(ReorderOutcome::AlreadyOpen);
        }

        let code = next_request_code(&mut tx, Utc::now().year()).await?;
        let status = ProcurementStatus::PendingWarehouseApproval;
        let line_total = request.quantity * request.unit_price;

        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO procurement_requests (
                code, supplier_id, kind, needed_by, priority, reason, status, total_cost,
                reorder_item_kind, reorder_item_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&code)
        .bind(request.supplier_id)
        .bind(ProcurementKind::Reorder.as_str())
        .bind(request.needed_by)
        .bind(request.priority.as_str())
        .bind(&request.reason)
        .bind(status.as_str())
        .bind(line_total)
        .bind(request.item.kind.as_str())
        .bind(request.item.id)
        .fetch_one(&mut *tx)
        .await;

        let request_id = match inserted {
            Ok(id) => id,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Ok(ReorderOutcome::AlreadyOpen);
            }
            Err(e) => return Err(e.into()),
        };

        sqlx::query(
            r#"
            INSERT INTO procurement_lines (
                request_id, item_kind, item_id, item_name, unit, requested_quantity,
                unit_price, line_total, supplier_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(request_id)
        .bind(request.item.kind.as_str())
        .bind(request.item.id)
        .bind(&request.item_name)
        .bind(&request.unit)
        .bind(request.quantity)
        .bind(request.unit_price)
        .bind(line_total)
        .bind(request.supplier_id)
        .execute(&mut *tx)
        .await?;

        record_status_change(
            &mut tx,
            request_id,
            None,
            status,
            SYSTEM_ROLE,
            None,
            Some(&request.reason),
        )
        .await?;

        tx.commit().await?;

        Ok(ReorderOutcome::Created { request_id, code })
    }

    async fn recent_ordering_costs(&self, item: ItemRef, limit: usize) -> AppResult<Vec<Decimal>> {
        let costs = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT g.ordering_cost
            FROM goods_receipts g
            WHERE EXISTS (
                SELECT 1 FROM goods_receipt_lines gl
                WHERE gl.receipt_id = g.id AND gl.item_kind = $1 AND gl.item_id = $2
            )
            ORDER BY g.received_at DESC
            LIMIT $3
            "#,
        )
        .bind(item.kind.as_str())
        .bind(item.id)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        Ok(costs)
    }

    async fn update_costs(&self, item: ItemRef, update: &CostUpdate) -> AppResult<()> {
        let sql = format!(
            r#"
            UPDATE {}
            SET ordering_cost = COALESCE($2, ordering_cost),
                unit_price = COALESCE($3, unit_price),
                holding_cost_percent = COALESCE($4, holding_cost_percent),
                updated_at = NOW()
            WHERE id = $1
            "#,
            item.kind.table_name()
        );
        sqlx::query(&sql)
            .bind(item.id)
            .bind(update.ordering_cost)
            .bind(update.unit_price)
            .bind(update.holding_cost_percent)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Row mapping and shared queries
// ============================================================================

/// Role recorded in the audit trail for system-driven transitions
pub const SYSTEM_ROLE: &str = "system";

pub(crate) const ITEM_COLUMNS: &str = "id, code, name, unit, stock, unit_price, eoq, rop, \
    safety_stock, ordering_cost, holding_cost_percent, lead_time_days, is_active, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct ItemRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub stock: Decimal,
    pub unit_price: Decimal,
    pub eoq: Decimal,
    pub rop: Decimal,
    pub safety_stock: Decimal,
    pub ordering_cost: Decimal,
    pub holding_cost_percent: Decimal,
    pub lead_time_days: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ItemRow {
    pub fn into_item(self, kind: ItemKind) -> Item {
        Item {
            id: self.id,
            kind,
            code: self.code,
            name: self.name,
            unit: self.unit,
            stock: self.stock,
            unit_price: self.unit_price,
            eoq: self.eoq,
            rop: self.rop,
            safety_stock: self.safety_stock,
            ordering_cost: self.ordering_cost,
            holding_cost_percent: self.holding_cost_percent,
            lead_time_days: self.lead_time_days,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub(crate) async fn fetch_item(db: &PgPool, item: ItemRef) -> AppResult<Item> {
    let sql = format!("SELECT {} FROM {} WHERE id = $1", ITEM_COLUMNS, item.kind.table_name());
    let row = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(item.id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(item.kind.to_string()))?;
    Ok(row.into_item(item.kind))
}

pub(crate) fn parse_kind(s: &str) -> AppResult<ItemKind> {
    ItemKind::parse(s).ok_or_else(|| AppError::Internal(format!("Unknown item kind: {}", s)))
}

pub(crate) fn parse_status(s: &str) -> AppResult<ProcurementStatus> {
    ProcurementStatus::parse(s)
        .ok_or_else(|| AppError::Internal(format!("Unknown procurement status: {}", s)))
}

fn open_status_list() -> Vec<String> {
    ProcurementStatus::open_statuses()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Whether a non-terminal request references the item, either as its
/// automatic target or through one of its lines
pub(crate) async fn open_request_exists(conn: &mut PgConnection, item: ItemRef) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM procurement_requests r
            WHERE r.status = ANY($3)
              AND (
                (r.reorder_item_kind = $1 AND r.reorder_item_id = $2)
                OR EXISTS (
                    SELECT 1 FROM procurement_lines l
                    WHERE l.request_id = r.id AND l.item_kind = $1 AND l.item_id = $2
                )
              )
        )
        "#,
    )
    .bind(item.kind.as_str())
    .bind(item.id)
    .bind(open_status_list())
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Next `PGD-YYYY-NNNN` code; the counter row makes this safe under concurrency
pub(crate) async fn next_request_code(conn: &mut PgConnection, year: i32) -> AppResult<String> {
    let seq = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO procurement_code_counters (year, last_seq)
        VALUES ($1, 1)
        ON CONFLICT (year) DO UPDATE SET last_seq = procurement_code_counters.last_seq + 1
        RETURNING last_seq
        "#,
    )
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    Ok(generate_request_code(year, seq))
}

pub(crate) async fn record_status_change(
    conn: &mut PgConnection,
    request_id: Uuid,
    from: Option<ProcurementStatus>,
    to: ProcurementStatus,
    role: &str,
    actor_id: Option<Uuid>,
    note: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO procurement_status_history (request_id, from_status, to_status, role, actor_id, note)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(request_id)
    .bind(from.map(|s| s.as_str()))
    .bind(to.as_str())
    .bind(role)
    .bind(actor_id)
    .bind(note)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Debug, FromRow)]
pub(crate) struct RequestRow {
    pub id: Uuid,
    pub code: String,
    pub supplier_id: Option<Uuid>,
    pub kind: String,
    pub requested_at: DateTime<Utc>,
    pub needed_by: NaiveDate,
    pub priority: String,
    pub reason: Option<String>,
    pub status: String,
    pub total_cost: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const REQUEST_COLUMNS: &str = "id, code, supplier_id, kind, requested_at, needed_by, \
    priority, reason, status, total_cost, created_by, created_at, updated_at";

impl RequestRow {
    pub fn into_request(self, lines: Vec<ProcurementLine>) -> AppResult<ProcurementRequest> {
        Ok(ProcurementRequest {
            id: self.id,
            code: self.code,
            supplier_id: self.supplier_id,
            kind: ProcurementKind::parse(&self.kind)
                .ok_or_else(|| AppError::Internal(format!("Unknown procurement kind: {}", self.kind)))?,
            requested_at: self.requested_at,
            needed_by: self.needed_by,
            priority: Priority::parse(&self.priority)
                .ok_or_else(|| AppError::Internal(format!("Unknown priority: {}", self.priority)))?,
            reason: self.reason,
            status: parse_status(&self.status)?,
            total_cost: self.total_cost,
            created_by: self.created_by,
            lines,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct LineRow {
    pub id: Uuid,
    pub request_id: Uuid,
    pub item_kind: String,
    pub item_id: Uuid,
    pub item_name: String,
    pub unit: String,
    pub requested_quantity: Decimal,
    pub approved_quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub line_total: Decimal,
    pub supplier_id: Option<Uuid>,
    pub note: Option<String>,
}

pub(crate) const LINE_COLUMNS: &str = "id, request_id, item_kind, item_id, item_name, unit, \
    requested_quantity, approved_quantity, unit_price, line_total, supplier_id, note";

impl LineRow {
    pub fn into_line(self) -> AppResult<ProcurementLine> {
        Ok(ProcurementLine {
            id: self.id,
            request_id: self.request_id,
            item_kind: parse_kind(&self.item_kind)?,
            item_id: self.item_id,
            item_name: self.item_name,
            unit: self.unit,
            requested_quantity: self.requested_quantity,
            approved_quantity: self.approved_quantity,
            unit_price: self.unit_price,
            line_total: self.line_total,
            supplier_id: self.supplier_id,
            note: self.note,
        })
    }
}

pub(crate) async fn fetch_lines(conn: &mut PgConnection, request_id: Uuid) -> AppResult<Vec<ProcurementLine>> {
    let sql = format!(
        "SELECT {} FROM procurement_lines WHERE request_id = $1 ORDER BY item_name, id",
        LINE_COLUMNS
    );
    sqlx::query_as::<_, LineRow>(&sql)
        .bind(request_id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(LineRow::into_line)
        .collect()
}

/// Load a request with its lines, locking the request row
pub(crate) async fn lock_request(conn: &mut PgConnection, request_id: Uuid) -> AppResult<ProcurementRequest> {
    let sql = format!(
        "SELECT {} FROM procurement_requests WHERE id = $1 FOR UPDATE",
        REQUEST_COLUMNS
    );
    let row = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Procurement request".to_string()))?;

    let lines = fetch_lines(conn, request_id).await?;
    row.into_request(lines)
}
