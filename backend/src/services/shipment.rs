//! Shipments (pengiriman) of finished products

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::models::{Action, Actor, Resource, Shipment, ShipmentStatus, StockReason};
use shared::types::{ItemRef, Pagination};
use shared::validation::validate_quantity;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::access::AccessControl;
use crate::error::{AppError, AppResult};
use crate::services::inventory::{write_stock, InventoryService, StockWrite};

#[derive(Debug, FromRow)]
struct ShipmentRow {
    id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    destination: String,
    status: String,
    created_by: Option<Uuid>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

const SHIPMENT_COLUMNS: &str = "id, product_id, quantity, destination, status, created_by, delivered_at, created_at";

impl ShipmentRow {
    fn into_shipment(self) -> AppResult<Shipment> {
        Ok(Shipment {
            id: self.id,
            product_id: self.product_id,
            quantity: self.quantity,
            destination: self.destination,
            status: ShipmentStatus::parse(&self.status)
                .ok_or_else(|| AppError::Internal(format!("Unknown shipment status: {}", self.status)))?,
            created_by: self.created_by,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
        })
    }
}

/// Shipment service
#[derive(Clone)]
pub struct ShipmentService {
    db: PgPool,
    inventory: InventoryService,
    access: Arc<AccessControl>,
}

impl ShipmentService {
    pub fn new(db: PgPool, inventory: InventoryService, access: Arc<AccessControl>) -> Self {
        Self { db, inventory, access }
    }

    /// Create a pending shipment
    pub async fn create_shipment(
        &self,
        actor: &Actor,
        product_id: Uuid,
        quantity: Decimal,
        destination: &str,
    ) -> AppResult<Shipment> {
        self.access.require(actor, Resource::Shipment, Action::Create)?;
        validate_quantity(quantity).map_err(|m| AppError::invalid("quantity", m))?;
        if destination.trim().is_empty() {
            return Err(AppError::validation(
                "destination",
                "Destination is required",
                "Tujuan pengiriman wajib diisi",
            ));
        }

        // Existence check
        self.inventory.get_item(ItemRef::product(product_id)).await?;

        let sql = format!(
            r#"
            INSERT INTO shipments (product_id, quantity, destination, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, ShipmentRow>(&sql)
            .bind(product_id)
            .bind(quantity)
            .bind(destination.trim())
            .bind(actor.user_id)
            .fetch_one(&self.db)
            .await?;

        info!("Created shipment {} of {} for {}", row.id, quantity, product_id);
        row.into_shipment()
    }

    /// Deliver a pending shipment: product stock drops (clamped at zero) and
    /// the reorder trigger sees the change
    pub async fn mark_delivered(&self, actor: &Actor, shipment_id: Uuid) -> AppResult<Shipment> {
        self.finish(actor, shipment_id, ShipmentStatus::Delivered).await
    }

    pub async fn cancel_shipment(&self, actor: &Actor, shipment_id: Uuid) -> AppResult<Shipment> {
        self.finish(actor, shipment_id, ShipmentStatus::Cancelled).await
    }

    async fn finish(&self, actor: &Actor, shipment_id: Uuid, to: ShipmentStatus) -> AppResult<Shipment> {
        self.access.require(actor, Resource::Shipment, Action::Edit)?;

        let mut tx = self.db.begin().await?;
        let sql = format!(
            r#"
            UPDATE shipments
            SET status = $2,
                delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            SHIPMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, ShipmentRow>(&sql)
            .bind(shipment_id)
            .bind(to.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM shipments WHERE id = $1)")
                .bind(shipment_id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                AppError::InvalidStateTransition("Shipment is already delivered or cancelled".to_string())
            } else {
                AppError::NotFound("Shipment".to_string())
            });
        };

        let shipment = row.into_shipment()?;
        let mut changes = Vec::new();
        if to == ShipmentStatus::Delivered {
            let write = StockWrite::new(-shipment.quantity, StockReason::ShipmentDelivery).reference(shipment.id);
            changes.push(
                write_stock(&mut tx, ItemRef::product(shipment.product_id), write, Some(actor.user_id)).await?,
            );
        }
        tx.commit().await?;

        self.inventory.publish(&changes).await;
        info!("Shipment {} {}", shipment.id, to.as_str());
        Ok(shipment)
    }

    /// List shipments, newest first
    pub async fn list_shipments(&self, status: Option<ShipmentStatus>, pagination: &Pagination) -> AppResult<Vec<Shipment>> {
        let sql = format!(
            r#"
            SELECT {} FROM shipments
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            SHIPMENT_COLUMNS
        );
        sqlx::query_as::<_, ShipmentRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(ShipmentRow::into_shipment)
            .collect()
    }
}
