use aerobook_core::{
    seat_numbers, Cabin, CabinFare, CoreError, CoreResult, Flight, Hold, NewFlight, Seat, SeatInventory, SeatRef,
    SeatState,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Mutable state of one seat, guarded by its own lock.
#[derive(Debug, Default)]
struct SeatSlot {
    state: Option<SlotState>,
}

#[derive(Debug, Clone)]
enum SlotState {
    Held { owner: String, expires_at: DateTime<Utc> },
    Occupied { booking_id: Uuid },
}

impl SeatSlot {
    /// Lazily applies TTL expiry. Returns true if a lapsed hold was dropped.
    fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if let Some(SlotState::Held { expires_at, .. }) = &self.state {
            if *expires_at <= now {
                self.state = None;
                return true;
            }
        }
        false
    }

    fn public_state(&self) -> SeatState {
        match self.state {
            None => SeatState::Free,
            Some(SlotState::Held { .. }) => SeatState::Held,
            Some(SlotState::Occupied { .. }) => SeatState::Occupied,
        }
    }
}

struct CabinInventory {
    cabin: Cabin,
    numbers: Vec<String>,
    index: HashMap<String, usize>,
    seats: Vec<Mutex<SeatSlot>>,
    occupied: AtomicU32,
    base_price_cents: i64,
    current_price_cents: AtomicI64,
}

impl CabinInventory {
    fn new(cabin: Cabin, capacity: u32, base_price_cents: i64) -> Self {
        let numbers = seat_numbers(cabin, capacity);
        let index = numbers
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        let seats = numbers.iter().map(|_| Mutex::new(SeatSlot::default())).collect();

        Self {
            cabin,
            numbers,
            index,
            seats,
            occupied: AtomicU32::new(0),
            base_price_cents,
            current_price_cents: AtomicI64::new(base_price_cents),
        }
    }

    fn capacity(&self) -> u32 {
        self.seats.len() as u32
    }

    fn fare(&self) -> CabinFare {
        CabinFare {
            cabin: self.cabin,
            capacity: self.capacity(),
            occupied: self.occupied.load(Ordering::SeqCst),
            base_price_cents: self.base_price_cents,
            current_price_cents: self.current_price_cents.load(Ordering::SeqCst),
        }
    }
}

struct FlightInventory {
    id: Uuid,
    flight_number: String,
    origin: String,
    destination: String,
    departure_at: DateTime<Utc>,
    currency: String,
    /// Sorted by cabin; the position doubles as the lock-ordering key.
    cabins: Vec<CabinInventory>,
}

impl FlightInventory {
    fn cabin(&self, cabin: Cabin) -> Option<(usize, &CabinInventory)> {
        self.cabins.iter().enumerate().find(|(_, c)| c.cabin == cabin)
    }

    fn snapshot(&self) -> Flight {
        Flight {
            id: self.id,
            flight_number: self.flight_number.clone(),
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            departure_at: self.departure_at,
            currency: self.currency.clone(),
            cabins: self.cabins.iter().map(CabinInventory::fare).collect(),
        }
    }
}

/// A seat resolved to its storage location, ordered for deadlock-free locking.
struct Located {
    flight: Arc<FlightInventory>,
    cabin_idx: usize,
    seat_idx: usize,
    seat: SeatRef,
}

impl Located {
    fn cabin(&self) -> &CabinInventory {
        &self.flight.cabins[self.cabin_idx]
    }

    fn slot(&self) -> &Mutex<SeatSlot> {
        &self.cabin().seats[self.seat_idx]
    }

    fn order_key(&self) -> (Uuid, usize, usize) {
        (self.flight.id, self.cabin_idx, self.seat_idx)
    }
}

/// In-memory seat inventory with one lock per seat.
///
/// Multi-seat operations take the seat locks in (flight, cabin, seat) order
/// and hold all of them while applying, so batches never interleave and cabin
/// snapshots see a batch entirely or not at all.
#[derive(Default)]
pub struct InMemorySeatInventory {
    flights: RwLock<HashMap<Uuid, Arc<FlightInventory>>>,
}

impl InMemorySeatInventory {
    pub fn new() -> Self {
        Self::default()
    }

    async fn flight_entry(&self, flight_id: Uuid) -> CoreResult<Arc<FlightInventory>> {
        self.flights
            .read()
            .await
            .get(&flight_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("flight {}", flight_id)))
    }

    async fn locate(&self, seat: &SeatRef) -> CoreResult<Located> {
        let flight = self.flight_entry(seat.flight_id).await?;
        let (cabin_idx, cabin) = flight
            .cabin(seat.cabin)
            .ok_or_else(|| CoreError::NotFound(format!("seat {}", seat)))?;
        let seat_idx = *cabin
            .index
            .get(&seat.seat_number)
            .ok_or_else(|| CoreError::NotFound(format!("seat {}", seat)))?;

        Ok(Located {
            flight: flight.clone(),
            cabin_idx,
            seat_idx,
            seat: seat.clone(),
        })
    }

    /// Resolves a batch and sorts it into lock order. Duplicates are rejected.
    async fn locate_batch(&self, seats: &[SeatRef]) -> CoreResult<Vec<Located>> {
        let mut located = Vec::with_capacity(seats.len());
        for seat in seats {
            located.push(self.locate(seat).await?);
        }
        located.sort_by_key(Located::order_key);

        if located.windows(2).any(|w| w[0].order_key() == w[1].order_key()) {
            return Err(CoreError::validation("the same seat appears twice in one batch"));
        }
        Ok(located)
    }

    async fn lock_all(located: &[Located]) -> Vec<MutexGuard<'_, SeatSlot>> {
        let mut guards = Vec::with_capacity(located.len());
        for entry in located {
            guards.push(entry.slot().lock().await);
        }
        guards
    }

    async fn all_flights(&self) -> Vec<Arc<FlightInventory>> {
        self.flights.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl SeatInventory for InMemorySeatInventory {
    async fn register_flight(&self, flight: &NewFlight) -> CoreResult<Flight> {
        flight.validate()?;

        let mut cabins: Vec<CabinInventory> = flight
            .cabins
            .iter()
            .map(|c| CabinInventory::new(c.cabin, c.capacity, c.base_price_cents))
            .collect();
        cabins.sort_by_key(|c| c.cabin);

        let entry = Arc::new(FlightInventory {
            id: Uuid::new_v4(),
            flight_number: flight.flight_number.trim().to_string(),
            origin: flight.origin.trim().to_uppercase(),
            destination: flight.destination.trim().to_uppercase(),
            departure_at: flight.departure_at,
            currency: flight.currency.trim().to_uppercase(),
            cabins,
        });

        let snapshot = entry.snapshot();
        self.flights.write().await.insert(entry.id, entry);
        info!("Registered flight {} ({})", snapshot.flight_number, snapshot.id);
        Ok(snapshot)
    }

    async fn flight(&self, flight_id: Uuid) -> CoreResult<Flight> {
        Ok(self.flight_entry(flight_id).await?.snapshot())
    }

    async fn list_flights(&self) -> CoreResult<Vec<Flight>> {
        let mut flights: Vec<Flight> = self.all_flights().await.iter().map(|f| f.snapshot()).collect();
        flights.sort_by(|a, b| a.departure_at.cmp(&b.departure_at).then(a.flight_number.cmp(&b.flight_number)));
        Ok(flights)
    }

    async fn get_seats(&self, flight_id: Uuid, cabin: Cabin, now: DateTime<Utc>) -> CoreResult<Vec<Seat>> {
        let flight = self.flight_entry(flight_id).await?;
        let Some((_, inventory)) = flight.cabin(cabin) else {
            return Ok(Vec::new());
        };

        let mut guards = Vec::with_capacity(inventory.seats.len());
        for slot in &inventory.seats {
            guards.push(slot.lock().await);
        }

        let seats = guards
            .iter_mut()
            .zip(&inventory.numbers)
            .map(|(slot, number)| {
                slot.expire(now);
                let (hold_owner, hold_expires_at, booking_id) = match &slot.state {
                    Some(SlotState::Held { owner, expires_at }) => (Some(owner.clone()), Some(*expires_at), None),
                    Some(SlotState::Occupied { booking_id }) => (None, None, Some(*booking_id)),
                    None => (None, None, None),
                };
                Seat {
                    flight_id,
                    cabin,
                    seat_number: number.clone(),
                    state: slot.public_state(),
                    hold_owner,
                    hold_expires_at,
                    booking_id,
                }
            })
            .collect();
        Ok(seats)
    }

    async fn try_hold(
        &self,
        seat: &SeatRef,
        owner: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CoreResult<Hold> {
        let located = self.locate(seat).await?;
        let mut slot = located.slot().lock().await;
        slot.expire(now);

        match &slot.state {
            None => {}
            Some(SlotState::Held { owner: holder, .. }) if holder == owner => {
                debug!("Refreshing hold on {} for {}", seat, owner);
            }
            Some(_) => return Err(CoreError::SeatUnavailable(seat.clone())),
        }

        slot.state = Some(SlotState::Held {
            owner: owner.to_string(),
            expires_at,
        });
        Ok(Hold {
            seat: seat.clone(),
            owner: owner.to_string(),
            expires_at,
        })
    }

    async fn release_hold(&self, seat: &SeatRef, owner: &str, now: DateTime<Utc>) -> CoreResult<()> {
        let located = self.locate(seat).await?;
        let mut slot = located.slot().lock().await;
        slot.expire(now);

        if !matches!(&slot.state, Some(SlotState::Held { owner: holder, .. }) if holder == owner) {
            return Err(CoreError::NotFound(format!("active hold on {}", seat)));
        }
        slot.state = None;
        Ok(())
    }

    async fn release_owner_holds(&self, owner: &str) -> CoreResult<Vec<SeatRef>> {
        let mut released = Vec::new();
        for flight in self.all_flights().await {
            for cabin in &flight.cabins {
                for (slot, number) in cabin.seats.iter().zip(&cabin.numbers) {
                    let mut slot = slot.lock().await;
                    if matches!(&slot.state, Some(SlotState::Held { owner: holder, .. }) if holder == owner) {
                        slot.state = None;
                        released.push(SeatRef::new(flight.id, cabin.cabin, number.clone()));
                    }
                }
            }
        }
        Ok(released)
    }

    async fn mark_occupied(
        &self,
        seats: &[SeatRef],
        owner: &str,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<Hold>> {
        let located = self.locate_batch(seats).await?;
        let mut guards = Self::lock_all(&located).await;

        // Verify the whole batch before touching anything.
        let mut consumed = Vec::with_capacity(located.len());
        for (entry, slot) in located.iter().zip(guards.iter()) {
            match &slot.state {
                Some(SlotState::Held { owner: holder, expires_at }) if holder == owner => {
                    if *expires_at <= now {
                        return Err(CoreError::HoldExpired(entry.seat.clone()));
                    }
                    consumed.push(Hold {
                        seat: entry.seat.clone(),
                        owner: owner.to_string(),
                        expires_at: *expires_at,
                    });
                }
                None => return Err(CoreError::HoldExpired(entry.seat.clone())),
                Some(SlotState::Held { expires_at, .. }) if *expires_at <= now => {
                    return Err(CoreError::HoldExpired(entry.seat.clone()));
                }
                Some(_) => {
                    return Err(CoreError::Conflict(format!("seat {} is no longer held by the caller", entry.seat)));
                }
            }
        }

        for (entry, slot) in located.iter().zip(guards.iter_mut()) {
            slot.state = Some(SlotState::Occupied { booking_id });
            entry.cabin().occupied.fetch_add(1, Ordering::SeqCst);
        }
        Ok(consumed)
    }

    async fn mark_free(&self, seats: &[SeatRef]) -> CoreResult<()> {
        let located = self.locate_batch(seats).await?;
        let mut guards = Self::lock_all(&located).await;

        for (entry, slot) in located.iter().zip(guards.iter_mut()) {
            if matches!(slot.state, Some(SlotState::Occupied { .. })) {
                slot.state = None;
                entry.cabin().occupied.fetch_sub(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    async fn reinstate_holds(&self, holds: &[Hold]) -> CoreResult<()> {
        let seats: Vec<SeatRef> = holds.iter().map(|h| h.seat.clone()).collect();
        let located = self.locate_batch(&seats).await?;
        let by_seat: HashMap<&SeatRef, &Hold> = holds.iter().map(|h| (&h.seat, h)).collect();
        let mut guards = Self::lock_all(&located).await;

        for (entry, slot) in located.iter().zip(guards.iter_mut()) {
            let Some(hold) = by_seat.get(&entry.seat) else { continue };
            if matches!(slot.state, Some(SlotState::Occupied { .. })) {
                entry.cabin().occupied.fetch_sub(1, Ordering::SeqCst);
            }
            slot.state = Some(SlotState::Held {
                owner: hold.owner.clone(),
                expires_at: hold.expires_at,
            });
        }
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<SeatRef>> {
        let mut expired = Vec::new();
        for flight in self.all_flights().await {
            for cabin in &flight.cabins {
                for (slot, number) in cabin.seats.iter().zip(&cabin.numbers) {
                    if slot.lock().await.expire(now) {
                        expired.push(SeatRef::new(flight.id, cabin.cabin, number.clone()));
                    }
                }
            }
        }
        Ok(expired)
    }

    async fn set_current_prices(&self, flight_id: Uuid, fares: &[CabinFare]) -> CoreResult<()> {
        let flight = self.flight_entry(flight_id).await?;
        for fare in fares {
            if let Some((_, cabin)) = flight.cabin(fare.cabin) {
                cabin.current_price_cents.store(fare.current_price_cents, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerobook_core::CabinConfig;
    use chrono::Duration;

    fn new_flight(economy: u32, business: u32) -> NewFlight {
        NewFlight {
            flight_number: "AB100".to_string(),
            origin: "lhr".to_string(),
            destination: "jfk".to_string(),
            departure_at: Utc::now() + Duration::days(10),
            currency: "usd".to_string(),
            cabins: vec![
                CabinConfig { cabin: Cabin::Economy, capacity: economy, base_price_cents: 10_000 },
                CabinConfig { cabin: Cabin::Business, capacity: business, base_price_cents: 40_000 },
            ],
        }
    }

    async fn setup(economy: u32) -> (InMemorySeatInventory, Flight) {
        let inventory = InMemorySeatInventory::new();
        let flight = inventory.register_flight(&new_flight(economy, 1)).await.unwrap();
        (inventory, flight)
    }

    fn seat(flight: &Flight, number: &str) -> SeatRef {
        SeatRef::new(flight.id, Cabin::Economy, number)
    }

    #[tokio::test]
    async fn test_register_creates_free_seats() {
        let (inventory, flight) = setup(3).await;
        assert_eq!(flight.origin, "LHR");
        assert_eq!(flight.currency, "USD");

        let seats = inventory.get_seats(flight.id, Cabin::Economy, Utc::now()).await.unwrap();
        let numbers: Vec<_> = seats.iter().map(|s| s.seat_number.as_str()).collect();
        assert_eq!(numbers, vec!["E1", "E2", "E3"]);
        assert!(seats.iter().all(|s| s.state == SeatState::Free));

        let economy = flight.cabin(Cabin::Economy).unwrap();
        assert_eq!(economy.capacity, 3);
        assert_eq!(economy.occupied, 0);
        assert_eq!(economy.current_price_cents, 10_000);
    }

    #[tokio::test]
    async fn test_hold_is_exclusive_until_expiry() {
        let (inventory, flight) = setup(2).await;
        let now = Utc::now();
        let e1 = seat(&flight, "E1");

        inventory.try_hold(&e1, "alice", now + Duration::minutes(15), now).await.unwrap();
        let denied = inventory.try_hold(&e1, "bob", now + Duration::minutes(15), now).await;
        assert_eq!(denied.unwrap_err(), CoreError::SeatUnavailable(e1.clone()));

        // Past the TTL the seat is up for grabs again.
        let later = now + Duration::minutes(16);
        let seats = inventory.get_seats(flight.id, Cabin::Economy, later).await.unwrap();
        assert_eq!(seats[0].state, SeatState::Free);
        inventory.try_hold(&e1, "bob", later + Duration::minutes(15), later).await.unwrap();
    }

    #[tokio::test]
    async fn test_same_owner_refreshes_hold() {
        let (inventory, flight) = setup(1).await;
        let now = Utc::now();
        let e1 = seat(&flight, "E1");

        inventory.try_hold(&e1, "alice", now + Duration::minutes(1), now).await.unwrap();
        let hold = inventory.try_hold(&e1, "alice", now + Duration::minutes(10), now).await.unwrap();
        assert_eq!(hold.expires_at, now + Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_unknown_seat_is_not_found() {
        let (inventory, flight) = setup(1).await;
        let now = Utc::now();
        let result = inventory.try_hold(&seat(&flight, "E9"), "alice", now, now).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_occupied_is_all_or_nothing() {
        let (inventory, flight) = setup(3).await;
        let now = Utc::now();
        let ttl = now + Duration::minutes(15);
        let (e1, e2, e3) = (seat(&flight, "E1"), seat(&flight, "E2"), seat(&flight, "E3"));

        inventory.try_hold(&e1, "alice", ttl, now).await.unwrap();
        inventory.try_hold(&e2, "alice", ttl, now).await.unwrap();
        inventory.try_hold(&e3, "bob", ttl, now).await.unwrap();

        let result = inventory
            .mark_occupied(&[e1.clone(), e2.clone(), e3.clone()], "alice", Uuid::new_v4(), now)
            .await;
        assert!(matches!(result, Err(CoreError::Conflict(_))));

        let seats = inventory.get_seats(flight.id, Cabin::Economy, now).await.unwrap();
        assert!(seats.iter().all(|s| s.state == SeatState::Held));
        assert_eq!(inventory.flight(flight.id).await.unwrap().cabin(Cabin::Economy).unwrap().occupied, 0);

        let booking_id = Uuid::new_v4();
        let consumed = inventory.mark_occupied(&[e2.clone(), e1.clone()], "alice", booking_id, now).await.unwrap();
        assert_eq!(consumed.len(), 2);

        let seats = inventory.get_seats(flight.id, Cabin::Economy, now).await.unwrap();
        assert_eq!(seats[0].state, SeatState::Occupied);
        assert_eq!(seats[0].booking_id, Some(booking_id));
        assert_eq!(seats[1].state, SeatState::Occupied);
        assert_eq!(seats[2].state, SeatState::Held);
        assert_eq!(inventory.flight(flight.id).await.unwrap().cabin(Cabin::Economy).unwrap().occupied, 2);
    }

    #[tokio::test]
    async fn test_mark_occupied_reports_expired_hold() {
        let (inventory, flight) = setup(1).await;
        let now = Utc::now();
        let e1 = seat(&flight, "E1");

        inventory.try_hold(&e1, "alice", now + Duration::seconds(5), now).await.unwrap();
        let later = now + Duration::seconds(6);
        let result = inventory.mark_occupied(&[e1.clone()], "alice", Uuid::new_v4(), later).await;
        assert_eq!(result.unwrap_err(), CoreError::HoldExpired(e1));
    }

    #[tokio::test]
    async fn test_duplicate_seat_in_batch_is_rejected() {
        let (inventory, flight) = setup(1).await;
        let now = Utc::now();
        let e1 = seat(&flight, "E1");
        inventory.try_hold(&e1, "alice", now + Duration::minutes(1), now).await.unwrap();

        let result = inventory.mark_occupied(&[e1.clone(), e1], "alice", Uuid::new_v4(), now).await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_mark_free_and_reinstate() {
        let (inventory, flight) = setup(2).await;
        let now = Utc::now();
        let e1 = seat(&flight, "E1");

        inventory.try_hold(&e1, "alice", now + Duration::minutes(5), now).await.unwrap();
        let holds = inventory.mark_occupied(&[e1.clone()], "alice", Uuid::new_v4(), now).await.unwrap();

        inventory.reinstate_holds(&holds).await.unwrap();
        let seats = inventory.get_seats(flight.id, Cabin::Economy, now).await.unwrap();
        assert_eq!(seats[0].state, SeatState::Held);
        assert_eq!(seats[0].hold_owner.as_deref(), Some("alice"));
        assert_eq!(inventory.flight(flight.id).await.unwrap().cabin(Cabin::Economy).unwrap().occupied, 0);

        inventory.mark_occupied(&[e1.clone()], "alice", Uuid::new_v4(), now).await.unwrap();
        inventory.mark_free(&[e1.clone()]).await.unwrap();
        inventory.mark_free(&[e1.clone()]).await.unwrap();
        assert_eq!(inventory.flight(flight.id).await.unwrap().cabin(Cabin::Economy).unwrap().occupied, 0);
        inventory.try_hold(&e1, "bob", now + Duration::minutes(5), now).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_and_sweep() {
        let (inventory, flight) = setup(3).await;
        let now = Utc::now();
        let (e1, e2, e3) = (seat(&flight, "E1"), seat(&flight, "E2"), seat(&flight, "E3"));

        inventory.try_hold(&e1, "alice", now + Duration::minutes(5), now).await.unwrap();
        inventory.try_hold(&e2, "alice", now + Duration::minutes(5), now).await.unwrap();
        inventory.try_hold(&e3, "bob", now + Duration::seconds(10), now).await.unwrap();

        assert!(inventory.release_hold(&e1, "bob", now).await.is_err());
        inventory.release_hold(&e1, "alice", now).await.unwrap();

        let released = inventory.release_owner_holds("alice").await.unwrap();
        assert_eq!(released, vec![e2]);

        assert!(inventory.sweep_expired(now).await.unwrap().is_empty());
        let swept = inventory.sweep_expired(now + Duration::seconds(11)).await.unwrap();
        assert_eq!(swept, vec![e3]);
    }

    #[tokio::test]
    async fn test_concurrent_holds_have_single_winner() {
        let inventory = Arc::new(InMemorySeatInventory::new());
        let flight = inventory.register_flight(&new_flight(1, 0)).await.unwrap();
        let now = Utc::now();
        let e1 = seat(&flight, "E1");

        let mut handles = Vec::new();
        for i in 0..64 {
            let inventory = inventory.clone();
            let e1 = e1.clone();
            handles.push(tokio::spawn(async move {
                inventory
                    .try_hold(&e1, &format!("owner-{}", i), now + Duration::minutes(5), now)
                    .await
                    .is_ok()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }

    #[tokio::test]
    async fn test_concurrent_batches_never_exceed_capacity() {
        let inventory = Arc::new(InMemorySeatInventory::new());
        let flight = inventory.register_flight(&new_flight(4, 0)).await.unwrap();
        let now = Utc::now();
        let numbers = ["E1", "E2", "E3", "E4"];

        // Each owner grabs what it can, then tries to commit overlapping pairs.
        let mut handles = Vec::new();
        for i in 0..8 {
            let inventory = inventory.clone();
            let pair = vec![seat(&flight, numbers[i % 4]), seat(&flight, numbers[(i + 1) % 4])];
            handles.push(tokio::spawn(async move {
                let owner = format!("owner-{}", i);
                for s in &pair {
                    let _ = inventory.try_hold(s, &owner, now + Duration::minutes(5), now).await;
                }
                inventory.mark_occupied(&pair, &owner, Uuid::new_v4(), now).await.is_ok()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let seats = inventory.get_seats(flight.id, Cabin::Economy, now).await.unwrap();
        let occupied = seats.iter().filter(|s| s.state == SeatState::Occupied).count() as u32;
        let economy = inventory.flight(flight.id).await.unwrap();
        let economy = economy.cabin(Cabin::Economy).unwrap();
        assert!(occupied <= economy.capacity);
        assert_eq!(occupied, economy.occupied);
    }
}
