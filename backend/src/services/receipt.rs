//! Goods receipt (penerimaan) against requests in `processing`

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::{
    outstanding_quantity, Action, Actor, GoodsReceipt, GoodsReceiptLine, ProcurementStatus,
    Resource, StockReason,
};
use shared::types::ItemRef;
use shared::validation::{validate_receipt_quantity, validate_unit_price};
use shared::workflow::{authorize_receipt, check_guard, LineComposition};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::access::AccessControl;
use crate::error::{AppError, AppResult};
use crate::services::cost_feedback::CostFeedbackService;
use crate::services::inventory::{write_stock, InventoryService, StockWrite};
use crate::services::procurement::write_transition;
use crate::services::store::{lock_request, parse_kind};

#[derive(Debug, Deserialize, Validate)]
pub struct RecordReceiptInput {
    /// Cost of placing this order (freight, admin), feeds the learned ordering cost
    #[serde(default)]
    pub ordering_cost: Decimal,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<ReceiptLineInput>,
}

#[derive(Debug, Deserialize, serde::Serialize)]
pub struct ReceiptLineInput {
    pub line_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, FromRow)]
struct ReceiptRow {
    id: Uuid,
    request_id: Uuid,
    ordering_cost: Decimal,
    received_by: Option<Uuid>,
    note: Option<String>,
    received_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ReceiptLineRow {
    id: Uuid,
    receipt_id: Uuid,
    line_id: Uuid,
    item_kind: String,
    item_id: Uuid,
    quantity: Decimal,
    unit_price: Option<Decimal>,
}

impl ReceiptLineRow {
    fn into_line(self) -> AppResult<GoodsReceiptLine> {
        Ok(GoodsReceiptLine {
            id: self.id,
            receipt_id: self.receipt_id,
            line_id: self.line_id,
            item_kind: parse_kind(&self.item_kind)?,
            item_id: self.item_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
        })
    }
}

/// Goods receipt service
#[derive(Clone)]
pub struct ReceiptService {
    db: PgPool,
    inventory: InventoryService,
    cost_feedback: CostFeedbackService,
    access: Arc<AccessControl>,
}

impl ReceiptService {
    pub fn new(
        db: PgPool,
        inventory: InventoryService,
        cost_feedback: CostFeedbackService,
        access: Arc<AccessControl>,
    ) -> Self {
        Self {
            db,
            inventory,
            cost_feedback,
            access,
        }
    }

    /// Record received goods. Stock rises per line; the request completes
    /// once every line is fully received; cost feedback runs afterwards.
    pub async fn record_receipt(
        &self,
        actor: &Actor,
        request_id: Uuid,
        input: RecordReceiptInput,
    ) -> AppResult<GoodsReceipt> {
        self.access.require(actor, Resource::Inventory, Action::Adjust)?;
        input.validate()?;
        validate_unit_price(input.ordering_cost).map_err(|m| AppError::invalid("ordering_cost", m))?;

        let mut tx = self.db.begin().await?;
        let request = lock_request(&mut tx, request_id).await?;
        authorize_receipt(actor.role, request.status)?;

        if request.status != ProcurementStatus::Processing {
            return Err(AppError::InvalidStateTransition(format!(
                "Goods can only be received while processing, request is {}",
                request.status
            )));
        }

        let mut received = received_per_line(&mut tx, request_id).await?;

        let receipt_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO goods_receipts (request_id, ordering_cost, received_by, note)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(request_id)
        .bind(input.ordering_cost)
        .bind(actor.user_id)
        .bind(&input.note)
        .fetch_one(&mut *tx)
        .await?;

        let mut receipt_lines = Vec::with_capacity(input.lines.len());
        let mut changes = Vec::with_capacity(input.lines.len());

        for incoming in &input.lines {
            let line = request
                .lines
                .iter()
                .find(|line| line.id == incoming.line_id)
                .ok_or_else(|| AppError::NotFound("Procurement line".to_string()))?;

            let already = received.get(&line.id).copied().unwrap_or(Decimal::ZERO);
            validate_receipt_quantity(line.effective_quantity(), already, incoming.quantity)
                .map_err(|m| AppError::invalid("quantity", m))?;
            if let Some(price) = incoming.unit_price {
                validate_unit_price(price).map_err(|m| AppError::invalid("unit_price", m))?;
            }

            let line_id = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO goods_receipt_lines (receipt_id, line_id, item_kind, item_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(receipt_id)
            .bind(line.id)
            .bind(line.item_kind.as_str())
            .bind(line.item_id)
            .bind(incoming.quantity)
            .bind(incoming.unit_price)
            .fetch_one(&mut *tx)
            .await?;

            let write = StockWrite::new(incoming.quantity, StockReason::GoodsReceipt).reference(receipt_id);
            changes.push(write_stock(&mut tx, line.item_ref(), write, Some(actor.user_id)).await?);

            *received.entry(line.id).or_insert(Decimal::ZERO) += incoming.quantity;
            receipt_lines.push(GoodsReceiptLine {
                id: line_id,
                receipt_id,
                line_id: line.id,
                item_kind: line.item_kind,
                item_id: line.item_id,
                quantity: incoming.quantity,
                unit_price: incoming.unit_price,
            });
        }

        let fully_received = request.lines.iter().all(|line| {
            let got = received.get(&line.id).copied().unwrap_or(Decimal::ZERO);
            outstanding_quantity(line.effective_quantity(), got).is_zero()
        });

        if fully_received {
            check_guard(
                request.status,
                ProcurementStatus::Completed,
                &LineComposition::of(&request.lines),
            )?;
            write_transition(
                &mut tx,
                &request,
                ProcurementStatus::Completed,
                actor.role.as_str(),
                Some(actor.user_id),
                Some("All goods received"),
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            "Received {} line(s) on procurement {}{}",
            receipt_lines.len(),
            request.code,
            if fully_received { ", request completed" } else { "" }
        );

        self.inventory.publish(&changes).await;

        let receipt = GoodsReceipt {
            id: receipt_id,
            request_id,
            ordering_cost: input.ordering_cost,
            received_by: Some(actor.user_id),
            note: input.note,
            lines: receipt_lines,
            received_at: Utc::now(),
        };

        self.cost_feedback.after_receipt(&receipt).await;
        Ok(receipt)
    }

    /// Receipts recorded against a request, oldest first
    pub async fn list_receipts(&self, request_id: Uuid) -> AppResult<Vec<GoodsReceipt>> {
        let rows = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT id, request_id, ordering_cost, received_by, note, received_at
            FROM goods_receipts
            WHERE request_id = $1
            ORDER BY received_at, id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.db)
        .await?;

        let line_rows = sqlx::query_as::<_, ReceiptLineRow>(
            r#"
            SELECT gl.id, gl.receipt_id, gl.line_id, gl.item_kind, gl.item_id, gl.quantity, gl.unit_price
            FROM goods_receipt_lines gl
            JOIN goods_receipts g ON g.id = gl.receipt_id
            WHERE g.request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.db)
        .await?;

        let mut lines_by_receipt: HashMap<Uuid, Vec<GoodsReceiptLine>> = HashMap::new();
        for row in line_rows {
            let line = row.into_line()?;
            lines_by_receipt.entry(line.receipt_id).or_default().push(line);
        }

        Ok(rows
            .into_iter()
            .map(|row| GoodsReceipt {
                lines: lines_by_receipt.remove(&row.id).unwrap_or_default(),
                id: row.id,
                request_id: row.request_id,
                ordering_cost: row.ordering_cost,
                received_by: row.received_by,
                note: row.note,
                received_at: row.received_at,
            })
            .collect())
    }

    /// Quantity still to be received on each line
    pub async fn outstanding(&self, request_id: Uuid) -> AppResult<Vec<(ItemRef, Decimal)>> {
        let mut tx = self.db.begin().await?;
        let request = lock_request(&mut tx, request_id).await?;
        let received = received_per_line(&mut tx, request_id).await?;
        tx.commit().await?;

        Ok(request
            .lines
            .iter()
            .map(|line| {
                let got = received.get(&line.id).copied().unwrap_or(Decimal::ZERO);
                (line.item_ref(), outstanding_quantity(line.effective_quantity(), got))
            })
            .collect())
    }
}

async fn received_per_line(conn: &mut PgConnection, request_id: Uuid) -> AppResult<HashMap<Uuid, Decimal>> {
    let rows = sqlx::query_as::<_, (Uuid, Decimal)>(
        r#"
        SELECT gl.line_id, SUM(gl.quantity)
        FROM goods_receipt_lines gl
        JOIN goods_receipts g ON g.id = gl.receipt_id
        WHERE g.request_id = $1
        GROUP BY gl.line_id
        "#,
    )
    .bind(request_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}
