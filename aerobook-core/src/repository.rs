use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Booking, CabinFare, Flight, Hold, NewFlight, Seat, SeatRef};
use crate::{Cabin, CoreResult};

/// Authoritative per-flight, per-cabin seat state.
///
/// Implementations serialize access per seat, never per flight: two callers
/// racing for different seats of one flight must not block each other.
#[async_trait]
pub trait SeatInventory: Send + Sync {
    /// Create the flight and one Free seat per capacity slot of every cabin.
    async fn register_flight(&self, flight: &NewFlight) -> CoreResult<Flight>;

    async fn flight(&self, flight_id: Uuid) -> CoreResult<Flight>;

    async fn list_flights(&self) -> CoreResult<Vec<Flight>>;

    /// Consistent snapshot of a cabin. Lapsed holds are reported as Free.
    async fn get_seats(&self, flight_id: Uuid, cabin: Cabin, now: DateTime<Utc>) -> CoreResult<Vec<Seat>>;

    /// Claim a Free seat (or refresh the caller's own hold).
    ///
    /// Fails with `SeatUnavailable` when another owner holds the seat with an
    /// unexpired hold, or when it is Occupied.
    async fn try_hold(
        &self,
        seat: &SeatRef,
        owner: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CoreResult<Hold>;

    /// Drop the caller's unexpired hold. `NotFound` if there is none.
    async fn release_hold(&self, seat: &SeatRef, owner: &str, now: DateTime<Utc>) -> CoreResult<()>;

    /// Drop every hold of `owner`, returning the seats that went back to Free.
    async fn release_owner_holds(&self, owner: &str) -> CoreResult<Vec<SeatRef>>;

    /// All-or-nothing Held -> Occupied for a batch owned by `owner`.
    ///
    /// Returns the consumed holds so a failed booking can put them back.
    /// `HoldExpired` when one of the caller's holds lapsed or vanished,
    /// `Conflict` when another owner got the seat in the meantime.
    async fn mark_occupied(
        &self,
        seats: &[SeatRef],
        owner: &str,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<Hold>>;

    /// Occupied -> Free for every seat in the batch. Already Free seats are skipped.
    async fn mark_free(&self, seats: &[SeatRef]) -> CoreResult<()>;

    /// Undo a `mark_occupied` whose booking could not be persisted.
    async fn reinstate_holds(&self, holds: &[Hold]) -> CoreResult<()>;

    /// Free every hold that lapsed at `now`.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<SeatRef>>;

    async fn set_current_prices(&self, flight_id: Uuid, fares: &[CabinFare]) -> CoreResult<()>;
}

/// Durable booking and ticket records.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist a booking with all its tickets in one unit.
    async fn insert(&self, booking: &Booking) -> CoreResult<()>;

    async fn get(&self, booking_id: Uuid) -> CoreResult<Option<Booking>>;

    async fn list_for_owner(&self, owner: &str) -> CoreResult<Vec<Booking>>;

    /// Confirmed -> Cancelled. Exactly one concurrent caller succeeds; the
    /// others get `AlreadyCancelled`.
    async fn mark_cancelled(&self, booking_id: Uuid, at: DateTime<Utc>) -> CoreResult<Booking>;

    /// Cancelled -> Confirmed, undoing a cancellation whose seats could not be
    /// freed. `NotFound` unless the booking is currently Cancelled.
    async fn reinstate(&self, booking_id: Uuid, at: DateTime<Utc>) -> CoreResult<()>;
}
