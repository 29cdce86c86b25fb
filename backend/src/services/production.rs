//! Production assignments (penugasan produksi) for requests routed to production

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::{
    check_transition, completion_increment, ensure_mutable, production_finished, Action, Actor,
    AssignmentProgress, ProductionAssignment, ProductionStatus, ProcurementStatus, Resource, RoleId,
    StockReason,
};
use shared::types::{ItemKind, ItemRef};
use shared::validation::{validate_produced_quantity, validate_quantity};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::access::AccessControl;
use crate::error::{AppError, AppResult};
use crate::services::inventory::{write_stock, InventoryService, StockWrite};
use crate::services::procurement::system_transition;
use crate::services::store::lock_request;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssignmentInput {
    pub request_id: Uuid,
    pub line_id: Uuid,
    pub worker_id: Uuid,
    pub requested_quantity: Decimal,
    pub deadline: NaiveDate,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: Uuid,
    request_id: Uuid,
    line_id: Uuid,
    product_id: Uuid,
    worker_id: Uuid,
    requested_quantity: Decimal,
    produced_quantity: Decimal,
    deadline: NaiveDate,
    status: String,
    note: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const ASSIGNMENT_COLUMNS: &str = "id, request_id, line_id, product_id, worker_id, requested_quantity, \
    produced_quantity, deadline, status, note, completed_at, created_at, updated_at";

impl AssignmentRow {
    fn into_assignment(self) -> AppResult<ProductionAssignment> {
        Ok(ProductionAssignment {
            id: self.id,
            request_id: self.request_id,
            line_id: self.line_id,
            product_id: self.product_id,
            worker_id: self.worker_id,
            requested_quantity: self.requested_quantity,
            produced_quantity: self.produced_quantity,
            deadline: self.deadline,
            status: ProductionStatus::parse(&self.status)
                .ok_or_else(|| AppError::Internal(format!("Unknown production status: {}", self.status)))?,
            note: self.note,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Production assignment service
#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    inventory: InventoryService,
    access: Arc<AccessControl>,
}

impl ProductionService {
    pub fn new(db: PgPool, inventory: InventoryService, access: Arc<AccessControl>) -> Self {
        Self { db, inventory, access }
    }

    /// Assign a product line of an `in_production` request to a worker
    pub async fn create_assignment(&self, actor: &Actor, input: CreateAssignmentInput) -> AppResult<ProductionAssignment> {
        self.access.require(actor, Resource::Production, Action::Create)?;
        input.validate()?;
        validate_quantity(input.requested_quantity)
            .map_err(|m| AppError::invalid("requested_quantity", m))?;

        let mut tx = self.db.begin().await?;
        let request = lock_request(&mut tx, input.request_id).await?;

        if request.status != ProcurementStatus::InProduction {
            return Err(AppError::InvalidStateTransition(format!(
                "Production can only be assigned while in production, request is {}",
                request.status
            )));
        }

        let line = request
            .lines
            .iter()
            .find(|line| line.id == input.line_id)
            .ok_or_else(|| AppError::NotFound("Procurement line".to_string()))?;
        if line.item_kind != ItemKind::Product {
            return Err(AppError::validation(
                "line_id",
                "Only product lines can be assigned to production",
                "Hanya baris produk yang dapat ditugaskan ke produksi",
            ));
        }

        let sql = format!(
            r#"
            INSERT INTO production_assignments (
                request_id, line_id, product_id, worker_id, requested_quantity, deadline, note
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(request.id)
            .bind(line.id)
            .bind(line.item_id)
            .bind(input.worker_id)
            .bind(input.requested_quantity)
            .bind(input.deadline)
            .bind(&input.note)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Assigned {} {} of {} to worker {} on procurement {}",
            input.requested_quantity, line.unit, line.item_name, input.worker_id, request.code
        );
        row.into_assignment()
    }

    /// Get a single assignment
    pub async fn get_assignment(&self, assignment_id: Uuid) -> AppResult<ProductionAssignment> {
        let sql = format!("SELECT {} FROM production_assignments WHERE id = $1", ASSIGNMENT_COLUMNS);
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(assignment_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Production assignment".to_string()))?
            .into_assignment()
    }

    /// Assignments of a request
    pub async fn list_for_request(&self, request_id: Uuid) -> AppResult<Vec<ProductionAssignment>> {
        let sql = format!(
            "SELECT {} FROM production_assignments WHERE request_id = $1 ORDER BY deadline, created_at",
            ASSIGNMENT_COLUMNS
        );
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(request_id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(AssignmentRow::into_assignment)
            .collect()
    }

    /// Open work for one worker
    pub async fn list_for_worker(&self, worker_id: Uuid) -> AppResult<Vec<ProductionAssignment>> {
        let sql = format!(
            r#"
            SELECT {} FROM production_assignments
            WHERE worker_id = $1 AND status IN ('assigned', 'in_progress')
            ORDER BY deadline, created_at
            "#,
            ASSIGNMENT_COLUMNS
        );
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(worker_id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(AssignmentRow::into_assignment)
            .collect()
    }

    /// Record progress on an open assignment
    pub async fn update_progress(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        produced_quantity: Option<Decimal>,
        note: Option<String>,
    ) -> AppResult<ProductionAssignment> {
        self.access.require(actor, Resource::Production, Action::Edit)?;
        if let Some(produced) = produced_quantity {
            validate_produced_quantity(produced).map_err(|m| AppError::invalid("produced_quantity", m))?;
        }

        let mut tx = self.db.begin().await?;
        let current = lock_assignment(&mut tx, assignment_id).await?;
        ensure_own_assignment(actor, &current)?;
        ensure_mutable(current.status)?;

        let sql = format!(
            r#"
            UPDATE production_assignments
            SET produced_quantity = COALESCE($2, produced_quantity),
                note = COALESCE($3, note),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(assignment_id)
            .bind(produced_quantity)
            .bind(note)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        row.into_assignment()
    }

    /// Move an assignment to `to`. Completion adds the produced quantity to
    /// the product exactly once, without a reorder check. When the last
    /// assignment of a request finishes the request completes.
    pub async fn transition(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        to: ProductionStatus,
        produced_quantity: Option<Decimal>,
    ) -> AppResult<ProductionAssignment> {
        self.access.require(actor, Resource::Production, Action::Edit)?;
        if let Some(produced) = produced_quantity {
            validate_produced_quantity(produced).map_err(|m| AppError::invalid("produced_quantity", m))?;
        }

        let mut tx = self.db.begin().await?;
        let current = lock_assignment(&mut tx, assignment_id).await?;
        ensure_own_assignment(actor, &current)?;
        check_transition(current.status, to)?;

        let produced = produced_quantity.unwrap_or(current.produced_quantity);

        // Guarded so a concurrent or repeated completion cannot apply twice
        let sql = format!(
            r#"
            UPDATE production_assignments
            SET status = $2,
                produced_quantity = $3,
                completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'cancelled')
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(assignment_id)
            .bind(to.as_str())
            .bind(produced)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::InvalidStateTransition("Assignment is already finished".to_string()))?;

        let mut changes = Vec::new();
        if let Some(quantity) = completion_increment(current.status, to, produced) {
            let write = StockWrite::new(quantity, StockReason::ProductionCompletion)
                .reference(assignment_id)
                .suppress_side_effects();
            changes.push(write_stock(&mut tx, ItemRef::product(current.product_id), write, Some(actor.user_id)).await?);
        }

        if to.is_terminal() {
            complete_request_if_finished(&mut tx, current.request_id).await?;
        }

        tx.commit().await?;
        self.inventory.publish(&changes).await;

        info!(
            "Production assignment {} moved {} -> {} (produced {})",
            assignment_id,
            current.status.as_str(),
            to.as_str(),
            produced
        );
        row.into_assignment()
    }
}

async fn lock_assignment(conn: &mut PgConnection, assignment_id: Uuid) -> AppResult<ProductionAssignment> {
    let sql = format!(
        "SELECT {} FROM production_assignments WHERE id = $1 FOR UPDATE",
        ASSIGNMENT_COLUMNS
    );
    sqlx::query_as::<_, AssignmentRow>(&sql)
        .bind(assignment_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Production assignment".to_string()))?
        .into_assignment()
}

/// Production staff may only touch their own work
fn ensure_own_assignment(actor: &Actor, assignment: &ProductionAssignment) -> AppResult<()> {
    if actor.role == RoleId::RndStaff && assignment.worker_id != actor.user_id {
        return Err(AppError::Forbidden {
            message: "Assignment belongs to another worker".to_string(),
            message_id: "Penugasan milik pekerja lain".to_string(),
        });
    }
    Ok(())
}

#[derive(FromRow)]
struct ProgressRow {
    line_id: Uuid,
    status: String,
    produced_quantity: Decimal,
}

async fn complete_request_if_finished(conn: &mut PgConnection, request_id: Uuid) -> AppResult<()> {
    let request = lock_request(conn, request_id).await?;
    if request.status != ProcurementStatus::InProduction {
        return Ok(());
    }

    let progress = sqlx::query_as::<_, ProgressRow>(
        "SELECT line_id, status, produced_quantity FROM production_assignments WHERE request_id = $1",
    )
    .bind(request_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| -> AppResult<AssignmentProgress> {
        let status = ProductionStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown production status: {}", row.status)))?;
        Ok(AssignmentProgress {
            line_id: row.line_id,
            status,
            produced: row.produced_quantity,
        })
    })
    .collect::<AppResult<Vec<_>>>()?;

    if !production_finished(&request.lines, &progress) {
        return Ok(());
    }
    system_transition(conn, &request, ProcurementStatus::Completed, "All product lines produced").await
}
