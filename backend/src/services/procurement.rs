//! Procurement service: manual requests, approvals, line edits and deletion
//!
//! Every role and state decision is delegated to `shared::workflow`; this
//! service loads the request under a row lock, asks the workflow, and
//! writes the result together with its audit row.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::{
    calculate_line_total, calculate_request_total, Action, Actor, LineField, Priority,
    ProcurementKind, ProcurementLine, ProcurementRequest, ProcurementStatus, Resource,
    StatusHistoryEntry,
};
use shared::types::{ItemKind, ItemRef, Pagination};
use shared::validation::{
    validate_approved_quantity, validate_line_kinds, validate_quantity, validate_reason,
    validate_unit_price,
};
use shared::workflow::{
    approval_target, authorize_delete, authorize_line_edit, check_guard, check_no_dependents,
    validate_transition, LineComposition, RequestDependents, WorkflowError,
};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::access::AccessControl;
use crate::error::{AppError, AppResult};
use crate::services::store::{
    fetch_item, fetch_lines, lock_request, next_request_code, open_request_exists, parse_status,
    record_status_change, LineRow, RequestRow, LINE_COLUMNS, REQUEST_COLUMNS, SYSTEM_ROLE,
};

/// Input for a manual request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRequestInput {
    pub needed_by: NaiveDate,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub reason: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<CreateLineInput>,
}

fn default_priority() -> Priority {
    Priority::Normal
}

#[derive(Debug, Deserialize, serde::Serialize, Validate)]
pub struct CreateLineInput {
    pub item: ItemRef,
    pub requested_quantity: Decimal,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// Field changes on one line; `None` leaves a field alone
#[derive(Debug, Default, Deserialize)]
pub struct LineEdit {
    pub requested_quantity: Option<Decimal>,
    pub note: Option<String>,
    pub approved_quantity: Option<Decimal>,
    pub supplier_id: Option<Uuid>,
    pub unit_price: Option<Decimal>,
}

impl LineEdit {
    /// Fields this edit touches
    pub fn fields(&self) -> Vec<LineField> {
        let mut fields = Vec::new();
        if self.requested_quantity.is_some() {
            fields.push(LineField::RequestedQuantity);
        }
        if self.note.is_some() {
            fields.push(LineField::Note);
        }
        if self.approved_quantity.is_some() {
            fields.push(LineField::ApprovedQuantity);
        }
        if self.supplier_id.is_some() {
            fields.push(LineField::Supplier);
        }
        if self.unit_price.is_some() {
            fields.push(LineField::UnitPrice);
        }
        fields
    }
}

/// Filters for listing requests
#[derive(Debug, Default, Deserialize)]
pub struct RequestFilter {
    pub status: Option<ProcurementStatus>,
    pub kind: Option<ProcurementKind>,
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: Uuid,
    request_id: Uuid,
    from_status: Option<String>,
    to_status: String,
    role: String,
    actor_id: Option<Uuid>,
    note: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

/// Procurement service for the request lifecycle
#[derive(Clone)]
pub struct ProcurementService {
    db: PgPool,
    access: Arc<AccessControl>,
}

impl ProcurementService {
    pub fn new(db: PgPool, access: Arc<AccessControl>) -> Self {
        Self { db, access }
    }

    /// Create a manual request in `draft`
    pub async fn create_request(&self, actor: &Actor, input: CreateRequestInput) -> AppResult<ProcurementRequest> {
        self.access.require(actor, Resource::Procurement, Action::Create)?;
        input.validate()?;

        let kinds: Vec<ItemKind> = input.lines.iter().map(|line| line.item.kind).collect();
        validate_line_kinds(&kinds).map_err(|m| AppError::invalid("lines", m))?;

        if let Some(reason) = &input.reason {
            validate_reason(reason).map_err(|m| AppError::invalid("reason", m))?;
        }
        let mut items = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            line.validate()?;
            validate_quantity(line.requested_quantity)
                .map_err(|m| AppError::invalid("requested_quantity", m))?;

            let item = fetch_item(&self.db, line.item).await?;
            if !item.is_active {
                return Err(AppError::validation(
                    "lines",
                    format!("{} is inactive", item.code),
                    format!("{} tidak aktif", item.code),
                ));
            }
            items.push(item);
        }
        if input.needed_by < Utc::now().date_naive() {
            return Err(AppError::validation(
                "needed_by",
                "Needed-by date cannot be in the past",
                "Tanggal dibutuhkan tidak boleh di masa lalu",
            ));
        }

        let mut tx = self.db.begin().await?;
        let code = next_request_code(&mut tx, Utc::now().year()).await?;

        let request_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO procurement_requests (code, kind, needed_by, priority, reason, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&code)
        .bind(ProcurementKind::Manual.as_str())
        .bind(input.needed_by)
        .bind(input.priority.as_str())
        .bind(&input.reason)
        .bind(ProcurementStatus::Draft.as_str())
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut total = Decimal::ZERO;
        for (line, item) in input.lines.iter().zip(&items) {
            let unit_price = Some(item.unit_price).filter(|p| *p > Decimal::ZERO);
            let line_total = calculate_line_total(line.requested_quantity, None, unit_price);
            total += line_total;

            sqlx::query(
                r#"
                INSERT INTO procurement_lines (
                    request_id, item_kind, item_id, item_name, unit, requested_quantity,
                    unit_price, line_total, note
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(request_id)
            .bind(line.item.kind.as_str())
            .bind(line.item.id)
            .bind(&item.name)
            .bind(&item.unit)
            .bind(line.requested_quantity)
            .bind(unit_price)
            .bind(line_total)
            .bind(&line.note)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE procurement_requests SET total_cost = $2 WHERE id = $1")
            .bind(request_id)
            .bind(total)
            .execute(&mut *tx)
            .await?;

        record_status_change(
            &mut tx,
            request_id,
            None,
            ProcurementStatus::Draft,
            actor.role.as_str(),
            Some(actor.user_id),
            input.reason.as_deref(),
        )
        .await?;

        let request = lock_request(&mut tx, request_id).await?;
        tx.commit().await?;

        info!("Created procurement {} by {}", request.code, actor.user_id);
        Ok(request)
    }

    /// Get a request with its lines
    pub async fn get_request(&self, request_id: Uuid) -> AppResult<ProcurementRequest> {
        let sql = format!("SELECT {} FROM procurement_requests WHERE id = $1", REQUEST_COLUMNS);
        let row = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(request_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Procurement request".to_string()))?;

        let mut conn = self.db.acquire().await?;
        let lines = fetch_lines(&mut conn, request_id).await?;
        row.into_request(lines)
    }

    /// List requests, newest first
    pub async fn list_requests(
        &self,
        filter: &RequestFilter,
        pagination: &Pagination,
    ) -> AppResult<Vec<ProcurementRequest>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM procurement_requests
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR kind = $2)
            ORDER BY requested_at DESC
            LIMIT $3 OFFSET $4
            "#,
            REQUEST_COLUMNS
        );
        let rows = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.kind.map(|k| k.as_str()))
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let line_sql = format!(
            "SELECT {} FROM procurement_lines WHERE request_id = ANY($1) ORDER BY item_name, id",
            LINE_COLUMNS
        );
        let mut lines_by_request: HashMap<Uuid, Vec<ProcurementLine>> = HashMap::new();
        for row in sqlx::query_as::<_, LineRow>(&line_sql)
            .bind(&ids)
            .fetch_all(&self.db)
            .await?
        {
            let line = row.into_line()?;
            lines_by_request.entry(line.request_id).or_default().push(line);
        }

        rows.into_iter()
            .map(|row| {
                let lines = lines_by_request.remove(&row.id).unwrap_or_default();
                row.into_request(lines)
            })
            .collect()
    }

    /// Audit trail of a request, oldest first
    pub async fn status_history(&self, request_id: Uuid) -> AppResult<Vec<StatusHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, request_id, from_status, to_status, role, actor_id, note, created_at
            FROM procurement_status_history
            WHERE request_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StatusHistoryEntry {
                    id: row.id,
                    request_id: row.request_id,
                    from_status: row.from_status.as_deref().map(parse_status).transpose()?,
                    to_status: parse_status(&row.to_status)?,
                    role: row.role,
                    actor_id: row.actor_id,
                    note: row.note,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    /// Send a draft to warehouse approval
    pub async fn submit(&self, actor: &Actor, request_id: Uuid) -> AppResult<ProcurementRequest> {
        self.transition(actor, request_id, ProcurementStatus::PendingWarehouseApproval, None)
            .await
    }

    /// Approve the request at its current stage. After warehouse approval the
    /// request routes to production when it holds a product line.
    pub async fn approve(&self, actor: &Actor, request_id: Uuid, note: Option<&str>) -> AppResult<ProcurementRequest> {
        let mut tx = self.db.begin().await?;
        let request = lock_request(&mut tx, request_id).await?;

        let composition = LineComposition::of(&request.lines);
        let target = approval_target(request.status, &composition).ok_or_else(|| {
            AppError::InvalidStateTransition(format!("Request {} has nothing to approve", request.status))
        })?;

        let updated = self.transition_locked(&mut tx, actor, request, target, note).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Cancel an open request
    pub async fn cancel(&self, actor: &Actor, request_id: Uuid, note: Option<&str>) -> AppResult<ProcurementRequest> {
        self.transition(actor, request_id, ProcurementStatus::Cancelled, note)
            .await
    }

    /// Move a request to `to` if the workflow allows it for the actor
    pub async fn transition(
        &self,
        actor: &Actor,
        request_id: Uuid,
        to: ProcurementStatus,
        note: Option<&str>,
    ) -> AppResult<ProcurementRequest> {
        let mut tx = self.db.begin().await?;
        let request = lock_request(&mut tx, request_id).await?;
        let updated = self.transition_locked(&mut tx, actor, request, to, note).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn transition_locked(
        &self,
        conn: &mut PgConnection,
        actor: &Actor,
        request: ProcurementRequest,
        to: ProcurementStatus,
        note: Option<&str>,
    ) -> AppResult<ProcurementRequest> {
        if let Err(e) = validate_transition(actor.role, request.status, to, &request.lines) {
            log_denied(actor, &request, &e);
            return Err(e.into());
        }

        write_transition(conn, &request, to, actor.role.as_str(), Some(actor.user_id), note).await?;
        info!(
            "Procurement {} moved {} -> {} by {} ({})",
            request.code,
            request.status,
            to,
            actor.user_id,
            actor.role.as_str()
        );
        lock_request(conn, request.id).await
    }

    /// Edit fields of one line. Each touched field is checked against the
    /// role and status window that owns it.
    pub async fn edit_line(
        &self,
        actor: &Actor,
        request_id: Uuid,
        line_id: Uuid,
        edit: LineEdit,
    ) -> AppResult<ProcurementRequest> {
        let fields = edit.fields();
        if fields.is_empty() {
            return Err(AppError::validation(
                "line",
                "Nothing to change",
                "Tidak ada perubahan",
            ));
        }

        let mut tx = self.db.begin().await?;
        let request = lock_request(&mut tx, request_id).await?;

        for field in &fields {
            if let Err(e) = authorize_line_edit(actor.role, request.status, *field) {
                log_denied(actor, &request, &e);
                return Err(e.into());
            }
        }

        let mut line = request
            .lines
            .iter()
            .find(|line| line.id == line_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Procurement line".to_string()))?;

        if let Some(quantity) = edit.requested_quantity {
            validate_quantity(quantity).map_err(|m| AppError::invalid("requested_quantity", m))?;
            line.requested_quantity = quantity;
        }
        if let Some(approved) = edit.approved_quantity {
            validate_approved_quantity(line.requested_quantity, approved)
                .map_err(|m| AppError::invalid("approved_quantity", m))?;
            line.approved_quantity = Some(approved);
        }
        if let Some(approved) = line.approved_quantity {
            // A lowered request must not leave a larger approval behind
            validate_approved_quantity(line.requested_quantity, approved)
                .map_err(|m| AppError::invalid("approved_quantity", m))?;
        }
        if let Some(price) = edit.unit_price {
            validate_unit_price(price).map_err(|m| AppError::invalid("unit_price", m))?;
            line.unit_price = Some(price);
        }
        if let Some(supplier_id) = edit.supplier_id {
            let active = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM suppliers WHERE id = $1 AND is_active)",
            )
            .bind(supplier_id)
            .fetch_one(&mut *tx)
            .await?;
            if !active {
                return Err(AppError::validation(
                    "supplier_id",
                    "Supplier not found or inactive",
                    "Pemasok tidak ditemukan atau tidak aktif",
                ));
            }
            line.supplier_id = Some(supplier_id);
        }
        if let Some(note) = edit.note {
            line.note = Some(note).filter(|n| !n.trim().is_empty());
        }

        line.line_total = calculate_line_total(line.requested_quantity, line.approved_quantity, line.unit_price);

        sqlx::query(
            r#"
            UPDATE procurement_lines
            SET requested_quantity = $2, approved_quantity = $3, unit_price = $4,
                supplier_id = $5, note = $6, line_total = $7
            WHERE id = $1
            "#,
        )
        .bind(line.id)
        .bind(line.requested_quantity)
        .bind(line.approved_quantity)
        .bind(line.unit_price)
        .bind(line.supplier_id)
        .bind(&line.note)
        .bind(line.line_total)
        .execute(&mut *tx)
        .await?;

        refresh_total(&mut tx, request_id).await?;
        let updated = lock_request(&mut tx, request_id).await?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Delete a request in an early or cancelled state; lines cascade.
    /// Requests with receipts or production assignments are kept.
    pub async fn delete_request(&self, actor: &Actor, request_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let request = lock_request(&mut tx, request_id).await?;

        if let Err(e) = authorize_delete(actor.role, request.status) {
            log_denied(actor, &request, &e);
            return Err(e.into());
        }
        check_no_dependents(request_dependents(&mut tx, request_id).await?)?;

        sqlx::query("DELETE FROM procurement_requests WHERE id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Deleted procurement {} by {}", request.code, actor.user_id);
        Ok(())
    }

    /// Whether an open request references the item
    pub async fn has_open_request(&self, item: ItemRef) -> AppResult<bool> {
        let mut conn = self.db.acquire().await?;
        open_request_exists(&mut conn, item).await
    }
}

fn log_denied(actor: &Actor, request: &ProcurementRequest, err: &WorkflowError) {
    warn!(
        "Denied on procurement {} for user {} ({}): {}",
        request.code,
        actor.user_id,
        actor.role.as_str(),
        err
    );
}

async fn request_dependents(conn: &mut PgConnection, request_id: Uuid) -> AppResult<RequestDependents> {
    let (receipts, assignments) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM goods_receipts WHERE request_id = $1),
            (SELECT COUNT(*) FROM production_assignments WHERE request_id = $1)
        "#,
    )
    .bind(request_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(RequestDependents {
        receipts,
        assignments,
    })
}

/// Recompute the request total from its lines
pub(crate) async fn refresh_total(conn: &mut PgConnection, request_id: Uuid) -> AppResult<Decimal> {
    let lines = fetch_lines(conn, request_id).await?;
    let total = calculate_request_total(&lines);
    sqlx::query("UPDATE procurement_requests SET total_cost = $2, updated_at = NOW() WHERE id = $1")
        .bind(request_id)
        .bind(total)
        .execute(&mut *conn)
        .await?;
    Ok(total)
}

/// The supplier every line shares, if there is exactly one
fn common_supplier(lines: &[ProcurementLine]) -> Option<Uuid> {
    let first = lines.first()?.supplier_id?;
    lines
        .iter()
        .all(|line| line.supplier_id == Some(first))
        .then_some(first)
}

/// Write an already validated status change plus its audit row
pub(crate) async fn write_transition(
    conn: &mut PgConnection,
    request: &ProcurementRequest,
    to: ProcurementStatus,
    role: &str,
    actor_id: Option<Uuid>,
    note: Option<&str>,
) -> AppResult<()> {
    let header_supplier = if to == ProcurementStatus::PendingProcurementApproval {
        common_supplier(&request.lines)
    } else {
        None
    };

    sqlx::query(
        r#"
        UPDATE procurement_requests
        SET status = $2, supplier_id = COALESCE($3, supplier_id), updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(request.id)
    .bind(to.as_str())
    .bind(header_supplier)
    .execute(&mut *conn)
    .await?;

    record_status_change(conn, request.id, Some(request.status), to, role, actor_id, note).await
}

/// System-driven transition with no acting role; only structural rules apply
pub(crate) async fn system_transition(
    conn: &mut PgConnection,
    request: &ProcurementRequest,
    to: ProcurementStatus,
    note: &str,
) -> AppResult<()> {
    if request.status.is_terminal() {
        return Err(WorkflowError::Immutable(request.status).into());
    }
    check_guard(request.status, to, &LineComposition::of(&request.lines))?;
    write_transition(conn, request, to, SYSTEM_ROLE, None, Some(note)).await?;
    info!("Procurement {} moved {} -> {} by system", request.code, request.status, to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(supplier: Option<Uuid>) -> ProcurementLine {
        ProcurementLine {
            id: Uuid::new_v4(),
            request_id: Uuid::nil(),
            item_kind: ItemKind::RawMaterial,
            item_id: Uuid::new_v4(),
            item_name: "Mentega".to_string(),
            unit: "kg".to_string(),
            requested_quantity: Decimal::from(10),
            approved_quantity: None,
            unit_price: Some(Decimal::from(45000)),
            line_total: Decimal::ZERO,
            supplier_id: supplier,
            note: None,
        }
    }

    #[test]
    fn test_common_supplier() {
        let supplier = Uuid::new_v4();
        assert_eq!(common_supplier(&[line(Some(supplier)), line(Some(supplier))]), Some(supplier));
        assert_eq!(common_supplier(&[line(Some(supplier)), line(Some(Uuid::new_v4()))]), None);
        assert_eq!(common_supplier(&[line(None)]), None);
        assert_eq!(common_supplier(&[]), None);
    }

    #[test]
    fn test_line_edit_fields() {
        let edit = LineEdit {
            supplier_id: Some(Uuid::new_v4()),
            unit_price: Some(Decimal::from(100)),
            ..LineEdit::default()
        };
        assert_eq!(edit.fields(), vec![LineField::Supplier, LineField::UnitPrice]);
        assert!(LineEdit::default().fields().is_empty());
    }
}
