use aerobook_core::{Cabin, Clock, CoreError, CoreResult, EventPublisher, Hold, Seat, SeatInventory, SeatRef};
use aerobook_shared::models::events::{DomainEvent, SeatHeldEvent, SeatReleasedEvent};
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// How long holds live.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldPolicy {
    pub default_ttl: Duration,
    pub max_ttl: Duration,
}

impl HoldPolicy {
    /// Builds a policy from configured seconds. Values chrono cannot represent
    /// are rejected instead of wrapping.
    pub fn from_seconds(default_seconds: u64, max_seconds: u64) -> CoreResult<Self> {
        let default_ttl = seconds(default_seconds)?;
        let max_ttl = seconds(max_seconds.max(default_seconds))?;
        if default_ttl <= Duration::zero() {
            return Err(CoreError::validation("seat_hold_seconds must be positive"));
        }
        Ok(Self { default_ttl, max_ttl })
    }

    /// Requested TTL clamped to the policy. Non-positive requests are rejected.
    pub fn effective_ttl(&self, requested: Option<Duration>) -> CoreResult<Duration> {
        match requested {
            None => Ok(self.default_ttl),
            Some(ttl) if ttl <= Duration::zero() => Err(CoreError::validation("hold ttl must be positive")),
            Some(ttl) => Ok(ttl.min(self.max_ttl)),
        }
    }

    /// Same as `effective_ttl` for a raw client-supplied number of seconds.
    pub fn ttl_from_seconds(&self, requested: Option<i64>) -> CoreResult<Duration> {
        match requested {
            None => Ok(self.default_ttl),
            Some(secs) if secs <= 0 => Err(CoreError::validation("hold ttl must be positive")),
            Some(secs) => Ok(Duration::try_seconds(secs).map_or(self.max_ttl, |ttl| ttl.min(self.max_ttl))),
        }
    }
}

fn seconds(value: u64) -> CoreResult<Duration> {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| CoreError::validation(format!("{} seconds is out of range for a hold", value)))
}

/// Grants and releases seat holds. First caller to reach a free seat wins;
/// everyone after that is told `SeatUnavailable` straight away.
pub struct ReservationCoordinator {
    inventory: Arc<dyn SeatInventory>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    policy: HoldPolicy,
}

impl ReservationCoordinator {
    pub fn new(
        inventory: Arc<dyn SeatInventory>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        policy: HoldPolicy,
    ) -> Self {
        Self { inventory, events, clock, policy }
    }

    pub fn policy(&self) -> &HoldPolicy {
        &self.policy
    }

    pub async fn hold(
        &self,
        flight_id: Uuid,
        cabin: Cabin,
        seat_number: &str,
        owner: &str,
        ttl: Option<Duration>,
    ) -> CoreResult<Hold> {
        if owner.trim().is_empty() {
            return Err(CoreError::validation("owner token is required"));
        }
        let ttl = self.policy.effective_ttl(ttl)?;
        let seat = SeatRef::new(flight_id, cabin, seat_number);
        let now = self.clock.now();

        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| CoreError::validation("hold ttl is out of range"))?;

        let hold = match self.inventory.try_hold(&seat, owner, expires_at, now).await {
            Ok(hold) => hold,
            Err(e) => {
                warn!("Hold denied on {}: {}", seat, e);
                return Err(e);
            }
        };
        info!("Seat {} held until {}", seat, hold.expires_at);

        self.publish(DomainEvent::SeatHeld(SeatHeldEvent {
            flight_id,
            cabin,
            seat_number: seat.seat_number.clone(),
            expires_at: hold.expires_at.timestamp(),
            held_at: now.timestamp(),
        }))
        .await;

        Ok(hold)
    }

    pub async fn release(&self, flight_id: Uuid, cabin: Cabin, seat_number: &str, owner: &str) -> CoreResult<()> {
        let seat = SeatRef::new(flight_id, cabin, seat_number);
        self.inventory.release_hold(&seat, owner, self.clock.now()).await?;
        info!("Seat {} released by its holder", seat);
        self.announce_release(&seat, "RELEASED").await;
        Ok(())
    }

    /// Abandon a whole selection.
    pub async fn release_all(&self, owner: &str) -> CoreResult<Vec<SeatRef>> {
        let released = self.inventory.release_owner_holds(owner).await?;
        for seat in &released {
            self.announce_release(seat, "RELEASED").await;
        }
        if !released.is_empty() {
            info!("Released {} holds", released.len());
        }
        Ok(released)
    }

    pub async fn seat_map(&self, flight_id: Uuid, cabin: Cabin) -> CoreResult<Vec<Seat>> {
        self.inventory.get_seats(flight_id, cabin, self.clock.now()).await
    }

    /// Free every lapsed hold and tell subscribers about it.
    pub async fn sweep(&self) -> CoreResult<Vec<SeatRef>> {
        let expired = self.inventory.sweep_expired(self.clock.now()).await?;
        for seat in &expired {
            self.announce_release(seat, "EXPIRED").await;
        }
        Ok(expired)
    }

    async fn announce_release(&self, seat: &SeatRef, reason: &str) {
        self.publish(DomainEvent::SeatReleased(SeatReleasedEvent {
            flight_id: seat.flight_id,
            cabin: seat.cabin,
            seat_number: seat.seat_number.clone(),
            reason: reason.to_string(),
            released_at: self.clock.now().timestamp(),
        }))
        .await;
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.events.publish(&event).await {
            warn!("Failed to publish {}: {}", event.topic(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerobook_catalog::InMemorySeatInventory;
    use aerobook_core::{CabinConfig, ManualClock, MemoryPublisher, NewFlight, SeatState};
    use chrono::Utc;

    struct Harness {
        coordinator: Arc<ReservationCoordinator>,
        clock: Arc<ManualClock>,
        events: Arc<MemoryPublisher>,
        flight_id: Uuid,
    }

    async fn harness(seats: u32) -> Harness {
        let inventory = Arc::new(InMemorySeatInventory::new());
        let flight = inventory
            .register_flight(&NewFlight {
                flight_number: "AB1".to_string(),
                origin: "SFO".to_string(),
                destination: "SEA".to_string(),
                departure_at: Utc::now(),
                currency: "USD".to_string(),
                cabins: vec![CabinConfig { cabin: Cabin::Economy, capacity: seats, base_price_cents: 9_900 }],
            })
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::default());
        let events = Arc::new(MemoryPublisher::new());
        let coordinator = Arc::new(ReservationCoordinator::new(
            inventory,
            events.clone(),
            clock.clone(),
            HoldPolicy::from_seconds(60, 120).unwrap(),
        ));
        Harness { coordinator, clock, events, flight_id: flight.id }
    }

    #[test]
    fn test_ttl_policy() {
        let policy = HoldPolicy::from_seconds(60, 120).unwrap();
        assert_eq!(policy.effective_ttl(None).unwrap(), Duration::seconds(60));
        assert_eq!(policy.effective_ttl(Some(Duration::seconds(500))).unwrap(), Duration::seconds(120));
        assert!(policy.effective_ttl(Some(Duration::zero())).is_err());

        assert_eq!(policy.ttl_from_seconds(None).unwrap(), Duration::seconds(60));
        assert_eq!(policy.ttl_from_seconds(Some(90)).unwrap(), Duration::seconds(90));
        assert_eq!(policy.ttl_from_seconds(Some(i64::MAX)).unwrap(), Duration::seconds(120));
        assert!(policy.ttl_from_seconds(Some(-5)).is_err());
    }

    #[tokio::test]
    async fn test_hold_past_the_end_of_time_is_rejected() {
        let h = harness(1).await;
        // Representable as a span, but not once added to a timestamp.
        let huge = i64::MAX as u64 / 1000;
        let coordinator = ReservationCoordinator::new(
            Arc::new(InMemorySeatInventory::new()),
            h.events.clone(),
            h.clock.clone(),
            HoldPolicy::from_seconds(huge, huge).unwrap(),
        );
        let result = coordinator.hold(h.flight_id, Cabin::Economy, "E1", "alice", None).await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_policy_rejects_unrepresentable_seconds() {
        assert!(HoldPolicy::from_seconds(u64::MAX, u64::MAX).is_err());
        assert!(HoldPolicy::from_seconds(60, u64::MAX).is_err());
        assert!(HoldPolicy::from_seconds(0, 60).is_err());
    }

    #[tokio::test]
    async fn test_second_requester_fails_fast() {
        let h = harness(2).await;
        h.coordinator.hold(h.flight_id, Cabin::Economy, "E1", "alice", None).await.unwrap();

        let denied = h.coordinator.hold(h.flight_id, Cabin::Economy, "E1", "carol", None).await;
        assert!(matches!(denied, Err(CoreError::SeatUnavailable(_))));

        h.coordinator.hold(h.flight_id, Cabin::Economy, "E2", "bob", None).await.unwrap();
        assert_eq!(h.events.events().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_owner_is_rejected() {
        let h = harness(1).await;
        let result = h.coordinator.hold(h.flight_id, Cabin::Economy, "E1", "  ", None).await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_expired_hold_goes_to_next_requester() {
        let h = harness(1).await;
        h.coordinator.hold(h.flight_id, Cabin::Economy, "E1", "alice", None).await.unwrap();

        h.clock.advance(Duration::seconds(59));
        assert!(h.coordinator.hold(h.flight_id, Cabin::Economy, "E1", "bob", None).await.is_err());

        h.clock.advance(Duration::seconds(1));
        let hold = h.coordinator.hold(h.flight_id, Cabin::Economy, "E1", "bob", None).await.unwrap();
        assert_eq!(hold.owner, "bob");
    }

    #[tokio::test]
    async fn test_release_and_sweep_publish_events() {
        let h = harness(3).await;
        h.coordinator.hold(h.flight_id, Cabin::Economy, "E1", "alice", None).await.unwrap();
        h.coordinator.hold(h.flight_id, Cabin::Economy, "E2", "alice", None).await.unwrap();
        h.coordinator.hold(h.flight_id, Cabin::Economy, "E3", "bob", None).await.unwrap();

        h.coordinator.release(h.flight_id, Cabin::Economy, "E1", "alice").await.unwrap();
        assert!(h.coordinator.release(h.flight_id, Cabin::Economy, "E3", "alice").await.is_err());

        h.clock.advance(Duration::seconds(61));
        let swept = h.coordinator.sweep().await.unwrap();
        assert_eq!(swept.len(), 2);

        let seats = h.coordinator.seat_map(h.flight_id, Cabin::Economy).await.unwrap();
        assert!(seats.iter().all(|s| s.state == SeatState::Free));

        let expired = h
            .events
            .events()
            .into_iter()
            .filter(|e| matches!(e, DomainEvent::SeatReleased(r) if r.reason == "EXPIRED"))
            .count();
        assert_eq!(expired, 2);
    }
}
