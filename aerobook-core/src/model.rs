use aerobook_shared::{Cabin, Masked};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

pub use aerobook_shared::models::events::CabinFare;

use crate::{CoreError, CoreResult};

// ============================================================================
// Flights
// ============================================================================

/// Cabin layout requested when an airline registers a flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CabinConfig {
    pub cabin: Cabin,
    pub capacity: u32,
    pub base_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFlight {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub currency: String,
    pub cabins: Vec<CabinConfig>,
}

/// Largest cabin a single flight may declare.
pub const MAX_CABIN_CAPACITY: u32 = 1_000;

impl NewFlight {
    pub fn validate(&self) -> CoreResult<()> {
        if self.flight_number.trim().is_empty() {
            return Err(CoreError::validation("flight number is required"));
        }
        if self.origin.trim().is_empty() || self.destination.trim().is_empty() {
            return Err(CoreError::validation("origin and destination are required"));
        }
        if self.origin.eq_ignore_ascii_case(&self.destination) {
            return Err(CoreError::validation("origin and destination must differ"));
        }
        if self.currency.trim().is_empty() {
            return Err(CoreError::validation("currency is required"));
        }
        if self.cabins.is_empty() {
            return Err(CoreError::validation("at least one cabin is required"));
        }

        let mut seen = HashSet::new();
        for config in &self.cabins {
            if !seen.insert(config.cabin) {
                return Err(CoreError::validation(format!("cabin {} declared twice", config.cabin)));
            }
            if config.capacity > MAX_CABIN_CAPACITY {
                return Err(CoreError::validation(format!(
                    "cabin {} exceeds {} seats",
                    config.cabin, MAX_CABIN_CAPACITY
                )));
            }
            if config.base_price_cents <= 0 {
                return Err(CoreError::validation(format!("cabin {} needs a positive base price", config.cabin)));
            }
        }

        if self.cabins.iter().all(|c| c.capacity == 0) {
            return Err(CoreError::validation("flight has no seats"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub currency: String,
    pub cabins: Vec<CabinFare>,
}

impl Flight {
    pub fn cabin(&self, cabin: Cabin) -> Option<&CabinFare> {
        self.cabins.iter().find(|c| c.cabin == cabin)
    }

    /// Current price of one seat in `cabin`, if the flight sells that cabin.
    pub fn current_price(&self, cabin: Cabin) -> Option<i64> {
        self.cabin(cabin).map(|c| c.current_price_cents)
    }
}

// ============================================================================
// Seats and holds
// ============================================================================

/// Identity of one seat: unique within (flight, cabin).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatRef {
    pub flight_id: Uuid,
    pub cabin: Cabin,
    pub seat_number: String,
}

impl SeatRef {
    pub fn new(flight_id: Uuid, cabin: Cabin, seat_number: impl Into<String>) -> Self {
        Self {
            flight_id,
            cabin,
            seat_number: seat_number.into(),
        }
    }
}

impl fmt::Display for SeatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.flight_id, self.cabin, self.seat_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Free,
    Held,
    Occupied,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub flight_id: Uuid,
    pub cabin: Cabin,
    pub seat_number: String,
    pub state: SeatState,
    pub hold_owner: Option<String>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub booking_id: Option<Uuid>,
}

impl Seat {
    pub fn seat_ref(&self) -> SeatRef {
        SeatRef::new(self.flight_id, self.cabin, self.seat_number.clone())
    }
}

/// A time-limited exclusive claim on a seat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hold {
    pub seat: SeatRef,
    pub owner: String,
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Seat numbers generated for a cabin of `capacity` seats.
pub fn seat_numbers(cabin: Cabin, capacity: u32) -> Vec<String> {
    (1..=capacity)
        .map(|n| format!("{}{}", cabin.seat_prefix(), n))
        .collect()
}

// ============================================================================
// Passengers, tickets and bookings
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passenger {
    pub first_name: Masked<String>,
    pub last_name: Masked<String>,
    pub age: u8,
}

impl Passenger {
    pub fn new(first_name: &str, last_name: &str, age: u8) -> Self {
        Self {
            first_name: Masked(first_name.to_string()),
            last_name: Masked(last_name.to_string()),
            age,
        }
    }

    pub fn is_adult(&self, adult_age: u8) -> bool {
        self.age >= adult_age
    }
}

/// One passenger's requested seats inside a `createBooking` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSpec {
    pub passenger: Passenger,
    pub departure: SeatRef,
    #[serde(default)]
    pub return_seat: Option<SeatRef>,
    /// Opaque URL from the document upload service.
    #[serde(default)]
    pub document_url: Option<String>,
}

impl TicketSpec {
    pub fn seats(&self) -> impl Iterator<Item = &SeatRef> {
        std::iter::once(&self.departure).chain(self.return_seat.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub passenger: Passenger,
    pub departure: SeatRef,
    pub return_seat: Option<SeatRef>,
    pub fare_cents: i64,
    pub document_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(CoreError::Storage(format!("unknown booking status {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub owner: String,
    pub status: BookingStatus,
    pub tickets: Vec<Ticket>,
    pub total_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Every seat referenced by the booking's tickets, departure seats first.
    pub fn seats(&self) -> Vec<SeatRef> {
        let mut seats: Vec<SeatRef> = self.tickets.iter().map(|t| t.departure.clone()).collect();
        seats.extend(self.tickets.iter().filter_map(|t| t.return_seat.clone()));
        seats
    }

    /// Distinct flights touched by the booking, in first-seen order.
    pub fn flight_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for seat in self.seats() {
            if !ids.contains(&seat.flight_id) {
                ids.push(seat.flight_id);
            }
        }
        ids
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_flight() -> NewFlight {
        NewFlight {
            flight_number: "AB100".to_string(),
            origin: "LHR".to_string(),
            destination: "JFK".to_string(),
            departure_at: Utc::now(),
            currency: "USD".to_string(),
            cabins: vec![
                CabinConfig { cabin: Cabin::Economy, capacity: 2, base_price_cents: 10_000 },
                CabinConfig { cabin: Cabin::Business, capacity: 1, base_price_cents: 40_000 },
            ],
        }
    }

    #[test]
    fn test_seat_numbers_follow_cabin_prefix() {
        assert_eq!(seat_numbers(Cabin::Economy, 3), vec!["E1", "E2", "E3"]);
        assert_eq!(seat_numbers(Cabin::Business, 1), vec!["B1"]);
        assert!(seat_numbers(Cabin::Business, 0).is_empty());
    }

    #[test]
    fn test_new_flight_validation() {
        assert!(sample_flight().validate().is_ok());

        let mut duplicate = sample_flight();
        duplicate.cabins.push(CabinConfig { cabin: Cabin::Economy, capacity: 1, base_price_cents: 1 });
        assert!(matches!(duplicate.validate(), Err(CoreError::ValidationError(_))));

        let mut same_airport = sample_flight();
        same_airport.destination = "lhr".to_string();
        assert!(same_airport.validate().is_err());

        let mut free_ride = sample_flight();
        free_ride.cabins[0].base_price_cents = 0;
        assert!(free_ride.validate().is_err());
    }

    #[test]
    fn test_booking_flight_ids_are_distinct() {
        let outbound = Uuid::new_v4();
        let inbound = Uuid::new_v4();
        let booking_id = Uuid::new_v4();
        let ticket = |seat: &str, ret: &str| Ticket {
            id: Uuid::new_v4(),
            booking_id,
            passenger: Passenger::new("Ada", "Lovelace", 36),
            departure: SeatRef::new(outbound, Cabin::Economy, seat),
            return_seat: Some(SeatRef::new(inbound, Cabin::Economy, ret)),
            fare_cents: 100,
            document_url: None,
        };
        let booking = Booking {
            id: booking_id,
            owner: "user-1".to_string(),
            status: BookingStatus::Confirmed,
            tickets: vec![ticket("E1", "E5"), ticket("E2", "E6")],
            total_cents: 200,
            currency: "USD".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            cancelled_at: None,
        };

        assert_eq!(booking.flight_ids(), vec![outbound, inbound]);
        assert_eq!(booking.seats().len(), 4);
        assert_eq!(booking.seats()[0].seat_number, "E1");
    }
}
