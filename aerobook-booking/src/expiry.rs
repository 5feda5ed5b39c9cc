use crate::coordinator::ReservationCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Periodically frees lapsed holds so seat maps and subscribers see them
/// without waiting for the next request to touch the seat.
pub struct HoldSweeper {
    coordinator: Arc<ReservationCoordinator>,
    interval: Duration,
}

impl HoldSweeper {
    pub fn new(coordinator: Arc<ReservationCoordinator>, interval: Duration) -> Self {
        Self { coordinator, interval }
    }

    /// One pass. Returns how many holds were freed.
    pub async fn run_once(&self) -> usize {
        match self.coordinator.sweep().await {
            Ok(expired) => {
                if expired.is_empty() {
                    debug!("Hold sweep: nothing expired");
                } else {
                    info!("Hold sweep released {} expired holds", expired.len());
                }
                expired.len()
            }
            Err(e) => {
                error!("Hold sweep failed: {}", e);
                0
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Hold sweeper started, every {:?}", self.interval);
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}
