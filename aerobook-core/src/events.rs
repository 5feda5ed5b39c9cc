use aerobook_shared::models::events::DomainEvent;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::CoreResult;

/// Outbound channel for domain events.
///
/// Publishing happens after state changes are committed; a failed publish is
/// logged by callers and never rolls anything back.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()>;
}

/// Keeps published events in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event.clone());
        Ok(())
    }
}

/// Sends each event to every sink; one failing sink does not starve the others.
#[derive(Default, Clone)]
pub struct FanoutPublisher {
    sinks: Vec<Arc<dyn EventPublisher>>,
}

impl FanoutPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventPublisher>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl EventPublisher for FanoutPublisher {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event).await {
                warn!("Event sink failed for {}: {}", event.topic(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
