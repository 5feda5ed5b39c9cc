use uuid::Uuid;

use super::cabin::Cabin;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SeatHeldEvent {
    pub flight_id: Uuid,
    pub cabin: Cabin,
    pub seat_number: String,
    pub expires_at: i64,
    pub held_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SeatReleasedEvent {
    pub flight_id: Uuid,
    pub cabin: Cabin,
    pub seat_number: String,
    /// `EXPIRED` when a lapsed hold was swept, `RELEASED` on explicit release.
    pub reason: String,
    pub released_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub flight_ids: Vec<Uuid>,
    pub ticket_count: usize,
    pub total_cents: i64,
    pub currency: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub flight_ids: Vec<Uuid>,
    pub seats_released: usize,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct CabinFare {
    pub cabin: Cabin,
    pub capacity: u32,
    pub occupied: u32,
    pub base_price_cents: i64,
    pub current_price_cents: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct PriceUpdatedEvent {
    pub flight_id: Uuid,
    pub fares: Vec<CabinFare>,
    pub timestamp: i64,
}

/// Everything the booking core announces to the outside world.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    SeatHeld(SeatHeldEvent),
    SeatReleased(SeatReleasedEvent),
    BookingConfirmed(BookingConfirmedEvent),
    BookingCancelled(BookingCancelledEvent),
    PriceUpdated(PriceUpdatedEvent),
}

impl DomainEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::SeatHeld(_) => "holds.created",
            DomainEvent::SeatReleased(_) => "holds.released",
            DomainEvent::BookingConfirmed(_) => "booking.confirmed",
            DomainEvent::BookingCancelled(_) => "booking.cancelled",
            DomainEvent::PriceUpdated(_) => "pricing.updated",
        }
    }

    /// Partition key: the flight for seat and price events, the booking otherwise.
    pub fn key(&self) -> String {
        match self {
            DomainEvent::SeatHeld(e) => e.flight_id.to_string(),
            DomainEvent::SeatReleased(e) => e.flight_id.to_string(),
            DomainEvent::BookingConfirmed(e) => e.booking_id.to_string(),
            DomainEvent::BookingCancelled(e) => e.booking_id.to_string(),
            DomainEvent::PriceUpdated(e) => e.flight_id.to_string(),
        }
    }

    /// Whether a subscriber watching `flight_id` should see this event.
    pub fn concerns_flight(&self, flight_id: Uuid) -> bool {
        match self {
            DomainEvent::SeatHeld(e) => e.flight_id == flight_id,
            DomainEvent::SeatReleased(e) => e.flight_id == flight_id,
            DomainEvent::BookingConfirmed(e) => e.flight_ids.contains(&flight_id),
            DomainEvent::BookingCancelled(e) => e.flight_ids.contains(&flight_id),
            DomainEvent::PriceUpdated(e) => e.flight_id == flight_id,
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::SeatHeld(_) => "seat_held",
            DomainEvent::SeatReleased(_) => "seat_released",
            DomainEvent::BookingConfirmed(_) => "booking_confirmed",
            DomainEvent::BookingCancelled(_) => "booking_cancelled",
            DomainEvent::PriceUpdated(_) => "price_updated",
        }
    }
}
