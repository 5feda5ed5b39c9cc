use crate::validation::{validate_ticket_specs, BookingRules};
use aerobook_catalog::PriceRecalculator;
use aerobook_core::{
    Booking, BookingRepository, BookingStatus, Clock, CoreError, CoreResult, EventPublisher, Flight, SeatInventory,
    SeatRef, Ticket, TicketSpec,
};
use aerobook_shared::models::events::{BookingCancelledEvent, BookingConfirmedEvent, DomainEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Turns held seats into confirmed bookings and back.
///
/// A booking either takes every seat it names or none of them. Seat state is
/// flipped in one batch first; if the booking record then fails to persist,
/// the consumed holds are put back exactly as they were.
pub struct BookingManager {
    inventory: Arc<dyn SeatInventory>,
    bookings: Arc<dyn BookingRepository>,
    pricing: Arc<PriceRecalculator>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    rules: BookingRules,
}

impl BookingManager {
    pub fn new(
        inventory: Arc<dyn SeatInventory>,
        bookings: Arc<dyn BookingRepository>,
        pricing: Arc<PriceRecalculator>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        rules: BookingRules,
    ) -> Self {
        Self { inventory, bookings, pricing, events, clock, rules }
    }

    /// Confirm a booking for seats the caller currently holds.
    pub async fn create_booking(&self, owner: &str, specs: Vec<TicketSpec>) -> CoreResult<Booking> {
        if owner.trim().is_empty() {
            return Err(CoreError::validation("owner token is required"));
        }
        validate_ticket_specs(&specs, &self.rules)?;

        let flights = self.load_flights(&specs).await?;
        let currency = Self::common_currency(&flights)?;

        let booking_id = Uuid::new_v4();
        let mut tickets = Vec::with_capacity(specs.len());
        for spec in specs {
            let fare_cents = spec
                .seats()
                .map(|seat| Self::fare_for(&flights, seat))
                .sum::<CoreResult<i64>>()?;
            tickets.push(Ticket {
                id: Uuid::new_v4(),
                booking_id,
                passenger: spec.passenger,
                departure: spec.departure,
                return_seat: spec.return_seat,
                fare_cents,
                document_url: spec.document_url,
            });
        }
        let total_cents = tickets.iter().map(|t| t.fare_cents).sum();

        let now = self.clock.now();
        let booking = Booking {
            id: booking_id,
            owner: owner.to_string(),
            status: BookingStatus::Confirmed,
            tickets,
            total_cents,
            currency,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };

        let seats = booking.seats();
        let consumed = match self.inventory.mark_occupied(&seats, owner, booking_id, now).await {
            Ok(consumed) => consumed,
            Err(e) => {
                warn!("Booking {} rejected: {}", booking_id, e);
                return Err(e);
            }
        };

        if let Err(e) = self.bookings.insert(&booking).await {
            error!("Failed to persist booking {}: {}", booking_id, e);
            if let Err(rollback) = self.inventory.reinstate_holds(&consumed).await {
                error!("Failed to restore holds for booking {}: {}", booking_id, rollback);
            }
            return Err(e);
        }

        info!(
            "Booking {} confirmed: {} tickets, {} seats, total {} {}",
            booking.id,
            booking.tickets.len(),
            seats.len(),
            booking.total_cents,
            booking.currency
        );

        let flight_ids = booking.flight_ids();
        self.reprice(&flight_ids).await;
        self.publish(DomainEvent::BookingConfirmed(BookingConfirmedEvent {
            booking_id: booking.id,
            flight_ids,
            ticket_count: booking.tickets.len(),
            total_cents: booking.total_cents,
            currency: booking.currency.clone(),
            timestamp: now.timestamp(),
        }))
        .await;

        Ok(booking)
    }

    /// Cancel a confirmed booking and hand its seats back to inventory.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> CoreResult<Booking> {
        let now = self.clock.now();
        let booking = self.bookings.mark_cancelled(booking_id, now).await?;

        let seats = booking.seats();
        if let Err(e) = self.inventory.mark_free(&seats).await {
            error!("Failed to free seats of booking {}, reverting cancellation: {}", booking_id, e);
            if let Err(revert) = self.bookings.reinstate(booking_id, now).await {
                error!("Booking {} stays cancelled with occupied seats: {}", booking_id, revert);
            }
            return Err(e);
        }
        info!("Booking {} cancelled, {} seats released", booking_id, seats.len());

        let flight_ids = booking.flight_ids();
        self.reprice(&flight_ids).await;
        self.publish(DomainEvent::BookingCancelled(BookingCancelledEvent {
            booking_id,
            flight_ids,
            seats_released: seats.len(),
            timestamp: now.timestamp(),
        }))
        .await;

        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))
    }

    pub async fn list_bookings(&self, owner: &str) -> CoreResult<Vec<Booking>> {
        self.bookings.list_for_owner(owner).await
    }

    async fn load_flights(&self, specs: &[TicketSpec]) -> CoreResult<HashMap<Uuid, Flight>> {
        let mut flights = HashMap::new();
        for seat in specs.iter().flat_map(|s| s.seats()) {
            if flights.contains_key(&seat.flight_id) {
                continue;
            }
            let flight = match self.inventory.flight(seat.flight_id).await {
                Ok(flight) => flight,
                Err(CoreError::NotFound(_)) => {
                    return Err(CoreError::validation(format!("unknown flight {}", seat.flight_id)));
                }
                Err(e) => return Err(e),
            };
            flights.insert(flight.id, flight);
        }
        Ok(flights)
    }

    fn common_currency(flights: &HashMap<Uuid, Flight>) -> CoreResult<String> {
        let mut currencies = flights.values().map(|f| f.currency.as_str());
        let first = currencies.next().unwrap_or_default().to_string();
        if currencies.any(|c| c != first) {
            return Err(CoreError::validation("flights in one booking must share a currency"));
        }
        Ok(first)
    }

    fn fare_for(flights: &HashMap<Uuid, Flight>, seat: &SeatRef) -> CoreResult<i64> {
        flights
            .get(&seat.flight_id)
            .and_then(|f| f.current_price(seat.cabin))
            .ok_or_else(|| CoreError::validation(format!("flight {} has no {} cabin", seat.flight_id, seat.cabin)))
    }

    async fn reprice(&self, flight_ids: &[Uuid]) {
        for flight_id in flight_ids {
            if let Err(e) = self.pricing.recalculate(*flight_id).await {
                warn!("Price recalculation failed for flight {}: {}", flight_id, e);
            }
        }
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.events.publish(&event).await {
            warn!("Failed to publish {}: {}", event.topic(), e);
        }
    }
}
