use aerobook_core::{CoreResult, EventPublisher};
use aerobook_shared::models::events::DomainEvent;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Feeds domain events to SSE subscribers.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastPublisher {
    pub fn new(tx: broadcast::Sender<DomainEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}
