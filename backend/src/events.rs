//! Post-commit domain events
//!
//! Stock writes publish a `StockChanged` event only after their transaction
//! commits. A background dispatcher hands each event to every registered
//! handler; handler failures are logged and never reach the writer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::ItemRef;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    StockChanged {
        item: ItemRef,
        old_stock: Decimal,
        new_stock: Decimal,
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn stock_changed(item: ItemRef, old_stock: Decimal, new_stock: Decimal) -> Self {
        DomainEvent::StockChanged {
            item,
            old_stock,
            new_stock,
            occurred_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::StockChanged { .. } => "stock_changed",
        }
    }
}

/// Handlers run on the dispatcher task, one event at a time
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle_event(&self, event: &DomainEvent) -> AppResult<()>;
}

/// Sending half of the event channel
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: mpsc::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DomainEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// True once the receiving side has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Publish an event. A closed dispatcher is logged, never returned, so
    /// the already committed write stays successful.
    pub async fn publish(&self, event: DomainEvent) {
        let name = event.name();
        if let Err(e) = self.sender.send(event).await {
            error!("Failed to publish {} event: {}", name, e);
        }
    }
}

/// Dispatch loop, returns when every `EventBus` clone is dropped
pub async fn process_events(mut rx: mpsc::Receiver<DomainEvent>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!("Starting event processing loop with {} handler(s)", handlers.len());

    while let Some(event) = rx.recv().await {
        debug!("Received event: {:?}", event);

        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                error!(
                    "Event handler {} failed on {}: {}",
                    handler.name(),
                    event.name(),
                    e
                );
            }
        }
    }

    info!("Event processing loop stopped");
}
