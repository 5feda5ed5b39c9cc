use aerobook_booking::HoldSweeper;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::state::AppState;

/// Background expiry of lapsed holds.
pub fn start_hold_sweeper(state: &AppState) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.business_rules.hold_sweep_interval_seconds.max(1));
    HoldSweeper::new(state.coordinator.clone(), interval).spawn()
}
