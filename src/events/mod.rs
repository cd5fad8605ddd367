use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events published after a unit of work commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockMoved {
        movement_id: Uuid,
        product_id: Uuid,
        warehouse_id: Uuid,
        movement_type: String,
        direction: String,
        quantity: Decimal,
        balance: Decimal,
    },
    PurchaseOrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    SalesOrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    AssemblyStatusChanged {
        assembly_id: Uuid,
        old_status: String,
        new_status: String,
    },
    AssemblyCompleted {
        assembly_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
    },
    ProductRequestStatusChanged {
        request_id: Uuid,
        old_status: String,
        new_status: String,
    },
    TransferApproved {
        request_id: Uuid,
        source_warehouse_id: Uuid,
        destination_warehouse_id: Uuid,
        lines: usize,
    },
    SummariesRegenerated {
        from: NaiveDate,
        to: NaiveDate,
        rows: usize,
        generated_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::StockMoved { .. } => "stock_moved",
            Event::PurchaseOrderStatusChanged { .. } => "purchase_order_status_changed",
            Event::SalesOrderStatusChanged { .. } => "sales_order_status_changed",
            Event::AssemblyStatusChanged { .. } => "assembly_status_changed",
            Event::AssemblyCompleted { .. } => "assembly_completed",
            Event::ProductRequestStatusChanged { .. } => "product_request_status_changed",
            Event::TransferApproved { .. } => "transfer_approved",
            Event::SummariesRegenerated { .. } => "summaries_regenerated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes events of an already committed operation. A closed channel
    /// is logged and otherwise ignored.
    pub async fn publish_all(&self, events: Vec<Event>) {
        for event in events {
            let name = event.name();
            if let Err(e) = self.send(event).await {
                warn!(event = name, error = %e, "event not published");
            }
        }
    }
}

/// Drains the event channel, logging each event, until all senders are gone.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("stockflow_events_total", 1, "event" => event.name());
        match &event {
            Event::StockMoved {
                product_id,
                warehouse_id,
                direction,
                quantity,
                balance,
                ..
            } => info!(
                %product_id,
                %warehouse_id,
                direction = %direction,
                %quantity,
                %balance,
                "stock moved"
            ),
            Event::TransferApproved {
                request_id,
                source_warehouse_id,
                destination_warehouse_id,
                lines,
            } => info!(
                %request_id,
                %source_warehouse_id,
                %destination_warehouse_id,
                lines,
                "transfer approved"
            ),
            other => info!(event = other.name(), payload = ?other, "domain event"),
        }
    }

    info!("Event processing loop stopped");
}
