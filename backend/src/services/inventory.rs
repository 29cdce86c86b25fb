//! Inventory service: items and every stock mutation
//!
//! All stock writes go through [`write_stock`], which clamps at zero and
//! records a ledger row. Callers publish the resulting [`StockChange`] only
//! after their transaction commits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{apply_stock_delta, generate_item_code, Action, Actor, Item, Resource, StockReason};
use shared::types::{ItemKind, ItemRef, Pagination};
use shared::validation::{validate_lead_time_days, validate_unit_price};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::access::AccessControl;
use crate::error::{AppError, AppResult};
use crate::events::{DomainEvent, EventBus};
use crate::services::store::{fetch_item, ItemRow, ITEM_COLUMNS};

/// A stock mutation request
#[derive(Debug, Clone, Copy)]
pub struct StockWrite {
    pub delta: Decimal,
    pub reason: StockReason,
    pub reference_id: Option<Uuid>,
    /// Skip the post-commit `StockChanged` event (and so the reorder check)
    pub suppress_side_effects: bool,
}

impl StockWrite {
    pub fn new(delta: Decimal, reason: StockReason) -> Self {
        Self {
            delta,
            reason,
            reference_id: None,
            suppress_side_effects: false,
        }
    }

    pub fn reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn suppress_side_effects(mut self) -> Self {
        self.suppress_side_effects = true;
        self
    }
}

/// Committed outcome of a stock write
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockChange {
    pub item: ItemRef,
    pub old_stock: Decimal,
    pub new_stock: Decimal,
    pub suppress_side_effects: bool,
}

impl StockChange {
    /// Event to publish after commit, if any
    pub fn event(&self) -> Option<DomainEvent> {
        if self.suppress_side_effects || self.old_stock == self.new_stock {
            return None;
        }
        Some(DomainEvent::stock_changed(self.item, self.old_stock, self.new_stock))
    }
}

/// Stock ledger row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub item_kind: String,
    pub item_id: Uuid,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub delta: Decimal,
    pub reason: String,
    pub reference_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an item
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    pub kind: ItemKind,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    pub unit_price: Decimal,
    pub ordering_cost: Option<Decimal>,
    pub holding_cost_percent: Option<Decimal>,
    pub lead_time_days: Option<i32>,
}

/// Inventory service for items and stock levels
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    events: EventBus,
    access: Arc<AccessControl>,
}

impl InventoryService {
    pub fn new(db: PgPool, events: EventBus, access: Arc<AccessControl>) -> Self {
        Self { db, events, access }
    }

    /// Get a single item
    pub async fn get_item(&self, item: ItemRef) -> AppResult<Item> {
        fetch_item(&self.db, item).await
    }

    /// List items of one kind, by name
    pub async fn list_items(&self, kind: ItemKind, pagination: &Pagination) -> AppResult<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY name LIMIT $1 OFFSET $2",
            ITEM_COLUMNS,
            kind.table_name()
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(|row| row.into_item(kind)).collect())
    }

    /// Active items at or below their reorder point
    pub async fn low_stock_items(&self, kind: ItemKind) -> AppResult<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE is_active AND rop > 0 AND stock <= rop ORDER BY stock / rop, name",
            ITEM_COLUMNS,
            kind.table_name()
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql).fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(|row| row.into_item(kind)).collect())
    }

    /// Create an item with zero stock and a generated code
    pub async fn create_item(&self, actor: &Actor, input: CreateItemInput) -> AppResult<Item> {
        self.access.require(actor, Resource::Inventory, Action::Create)?;
        input.validate()?;

        validate_unit_price(input.unit_price).map_err(|m| AppError::invalid("unit_price", m))?;
        if let Some(cost) = input.ordering_cost {
            validate_unit_price(cost).map_err(|m| AppError::invalid("ordering_cost", m))?;
        }
        if let Some(days) = input.lead_time_days {
            validate_lead_time_days(days).map_err(|m| AppError::invalid("lead_time_days", m))?;
        }

        let table = input.kind.table_name();
        let sequence = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COALESCE(MAX(CAST(SUBSTRING(code FROM '[0-9]+$') AS BIGINT)), 0) + 1 FROM {}",
            table
        ))
        .fetch_one(&self.db)
        .await?;

        let sql = format!(
            r#"
            INSERT INTO {} (code, name, unit, unit_price, ordering_cost, holding_cost_percent, lead_time_days)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            table, ITEM_COLUMNS
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(generate_item_code(input.kind, sequence))
            .bind(input.name.trim())
            .bind(input.unit.trim())
            .bind(input.unit_price)
            .bind(input.ordering_cost.unwrap_or(Decimal::ZERO))
            .bind(input.holding_cost_percent.unwrap_or(Decimal::ZERO))
            .bind(input.lead_time_days)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict {
                    resource: "code".to_string(),
                    message: "Item code already taken, retry".to_string(),
                    message_id: "Kode barang sudah dipakai, coba lagi".to_string(),
                },
                other => other.into(),
            })?;

        tracing::info!("Created {} {} by {}", input.kind, row.code, actor.user_id);
        Ok(row.into_item(input.kind))
    }

    /// Manual stock adjustment by a signed delta
    pub async fn adjust_stock(&self, actor: &Actor, item: ItemRef, delta: Decimal) -> AppResult<StockChange> {
        self.access.require(actor, Resource::Inventory, Action::Adjust)?;
        self.apply(Some(actor.user_id), item, StockWrite::new(delta, StockReason::ManualAdjustment))
            .await
    }

    /// Stock take: set the stock to a counted value
    pub async fn set_stock(&self, actor: &Actor, item: ItemRef, counted: Decimal) -> AppResult<StockChange> {
        self.access.require(actor, Resource::Inventory, Action::Adjust)?;
        if counted < Decimal::ZERO {
            return Err(AppError::validation(
                "stock",
                "Counted stock cannot be negative",
                "Stok hasil hitung tidak boleh negatif",
            ));
        }

        let mut tx = self.db.begin().await?;
        let current = lock_stock(&mut tx, item).await?;
        let write = StockWrite::new(counted - current, StockReason::ManualAdjustment);
        let change = write_stock(&mut tx, item, write, Some(actor.user_id)).await?;
        tx.commit().await?;

        self.publish(&[change]).await;
        Ok(change)
    }

    /// Apply one stock write in its own transaction, then publish
    pub async fn apply(&self, actor_id: Option<Uuid>, item: ItemRef, write: StockWrite) -> AppResult<StockChange> {
        let mut tx = self.db.begin().await?;
        let change = write_stock(&mut tx, item, write, actor_id).await?;
        tx.commit().await?;

        self.publish(&[change]).await;
        Ok(change)
    }

    /// Publish committed changes; suppressed and no-op changes are skipped
    pub async fn publish(&self, changes: &[StockChange]) {
        for change in changes {
            if let Some(event) = change.event() {
                self.events.publish(event).await;
            }
        }
    }

    /// Ledger for one item, newest first
    pub async fn movements(&self, item: ItemRef, pagination: &Pagination) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, item_kind, item_id, stock_before, stock_after, delta, reason,
                   reference_id, created_by, created_at
            FROM stock_movements
            WHERE item_kind = $1 AND item_id = $2
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(item.kind.as_str())
        .bind(item.id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}

async fn lock_stock(conn: &mut PgConnection, item: ItemRef) -> AppResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>(&format!(
        "SELECT stock FROM {} WHERE id = $1 FOR UPDATE",
        item.kind.table_name()
    ))
    .bind(item.id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(item.kind.to_string()))
}

/// Lock the item row, apply the clamped delta and write the ledger row.
/// Runs inside the caller's transaction and publishes nothing.
pub(crate) async fn write_stock(
    conn: &mut PgConnection,
    item: ItemRef,
    write: StockWrite,
    actor_id: Option<Uuid>,
) -> AppResult<StockChange> {
    let old_stock = lock_stock(conn, item).await?;
    let new_stock = apply_stock_delta(old_stock, write.delta);

    if new_stock != old_stock {
        sqlx::query(&format!(
            "UPDATE {} SET stock = $2, updated_at = NOW() WHERE id = $1",
            item.kind.table_name()
        ))
        .bind(item.id)
        .bind(new_stock)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                item_kind, item_id, stock_before, stock_after, delta, reason, reference_id, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.kind.as_str())
        .bind(item.id)
        .bind(old_stock)
        .bind(new_stock)
        .bind(new_stock - old_stock)
        .bind(write.reason.as_str())
        .bind(write.reference_id)
        .bind(actor_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(StockChange {
        item,
        old_stock,
        new_stock,
        suppress_side_effects: write.suppress_side_effects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(old: i64, new: i64, suppress: bool) -> StockChange {
        StockChange {
            item: ItemRef::raw_material(Uuid::new_v4()),
            old_stock: Decimal::from(old),
            new_stock: Decimal::from(new),
            suppress_side_effects: suppress,
        }
    }

    #[test]
    fn test_change_publishes_event() {
        let event = change(50, 45, false).event().unwrap();
        match event {
            DomainEvent::StockChanged { old_stock, new_stock, .. } => {
                assert_eq!(old_stock, Decimal::from(50));
                assert_eq!(new_stock, Decimal::from(45));
            }
        }
    }

    #[test]
    fn test_suppressed_or_unchanged_publishes_nothing() {
        assert!(change(50, 45, true).event().is_none());
        assert!(change(0, 0, false).event().is_none());
    }
}
