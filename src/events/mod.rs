use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Events emitted by the availability services. Consumers subscribe through
/// an mpsc channel; services treat delivery as best-effort and never fail an
/// operation because nobody is listening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Products were flagged for recomputation.
    ProductsMarkedDirty { count: u64 },

    /// A sync run finished recomputing every requested dirty product.
    SyncCompleted {
        run_id: Uuid,
        products_synced: u64,
        batches: u64,
    },

    /// Superseded availability log entries were purged.
    LogVacuumed { entries_purged: u64 },
}

/// Wrapper for sending events to interested parties
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
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
}

/// Drains the event channel, logging each event. Spawn this when no richer
/// consumer is wired up; it keeps senders from backing up against a full
/// channel.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ProductsMarkedDirty { count } => {
                info!(count, "event: products marked dirty");
            }
            Event::SyncCompleted {
                run_id,
                products_synced,
                batches,
            } => {
                info!(%run_id, products_synced, batches, "event: sync completed");
            }
            Event::LogVacuumed { entries_purged } => {
                info!(entries_purged, "event: availability log vacuumed");
            }
        }
    }

    info!("Event processing loop stopped");
}
