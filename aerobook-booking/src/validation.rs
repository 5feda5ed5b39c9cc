use aerobook_core::{CoreError, CoreResult, TicketSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MAX_PASSENGER_AGE: u8 = 130;

/// Domain rules applied to every booking request before inventory is touched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRules {
    #[serde(default = "default_adult_age")]
    pub adult_age: u8,
    #[serde(default = "default_max_tickets")]
    pub max_tickets_per_booking: usize,
}

fn default_adult_age() -> u8 { 18 }
fn default_max_tickets() -> usize { 9 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            adult_age: default_adult_age(),
            max_tickets_per_booking: default_max_tickets(),
        }
    }
}

/// Checks a `createBooking` request for everything that does not depend on
/// seat state.
pub fn validate_ticket_specs(specs: &[TicketSpec], rules: &BookingRules) -> CoreResult<()> {
    let first = specs
        .first()
        .ok_or_else(|| CoreError::validation("a booking needs at least one ticket"))?;

    if specs.len() > rules.max_tickets_per_booking {
        return Err(CoreError::validation(format!(
            "at most {} tickets per booking",
            rules.max_tickets_per_booking
        )));
    }

    let mut seen = HashSet::new();
    for (i, spec) in specs.iter().enumerate() {
        let passenger = &spec.passenger;
        if passenger.first_name.expose().trim().is_empty() || passenger.last_name.expose().trim().is_empty() {
            return Err(CoreError::validation(format!("ticket {}: passenger name is required", i + 1)));
        }
        if passenger.age > MAX_PASSENGER_AGE {
            return Err(CoreError::validation(format!("ticket {}: implausible passenger age", i + 1)));
        }
        if spec.departure.seat_number.trim().is_empty() {
            return Err(CoreError::validation(format!("ticket {}: departure seat is required", i + 1)));
        }

        // One itinerary per booking.
        if spec.departure.flight_id != first.departure.flight_id {
            return Err(CoreError::validation("all tickets must depart on the same flight"));
        }
        let return_flight = spec.return_seat.as_ref().map(|s| s.flight_id);
        if return_flight != first.return_seat.as_ref().map(|s| s.flight_id) {
            return Err(CoreError::validation("all tickets must share the same return flight"));
        }

        if let Some(ret) = &spec.return_seat {
            if ret.flight_id == spec.departure.flight_id {
                return Err(CoreError::validation(format!(
                    "ticket {}: return seat must be on a different flight",
                    i + 1
                )));
            }
            if ret.cabin != spec.departure.cabin {
                return Err(CoreError::validation(format!(
                    "ticket {}: mismatched cabin between departure and return",
                    i + 1
                )));
            }
        }

        for seat in spec.seats() {
            if !seen.insert(seat) {
                return Err(CoreError::validation(format!("seat {} requested twice", seat)));
            }
        }
    }

    if !specs.iter().any(|s| s.passenger.is_adult(rules.adult_age)) {
        return Err(CoreError::validation(format!(
            "at least one passenger must be {} or older",
            rules.adult_age
        )));
    }

    Ok(())
}
