use aerobook_core::{Booking, BookingRepository, BookingStatus, CoreError, CoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Booking records kept in process memory.
#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> CoreResult<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(CoreError::Conflict(format!("booking {} already exists", booking.id)));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, booking_id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&booking_id).cloned())
    }

    async fn list_for_owner(&self, owner: &str) -> CoreResult<Vec<Booking>> {
        let mut owned: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn mark_cancelled(&self, booking_id: Uuid, at: DateTime<Utc>) -> CoreResult<Booking> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(&booking_id)
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))?;

        if booking.status == BookingStatus::Cancelled {
            return Err(CoreError::AlreadyCancelled(booking_id));
        }

        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(at);
        booking.updated_at = at;
        Ok(booking.clone())
    }

    async fn reinstate(&self, booking_id: Uuid, at: DateTime<Utc>) -> CoreResult<()> {
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(&booking_id) {
            Some(booking) if booking.status == BookingStatus::Cancelled => {
                booking.status = BookingStatus::Confirmed;
                booking.cancelled_at = None;
                booking.updated_at = at;
                Ok(())
            }
            _ => Err(CoreError::NotFound(format!("cancelled booking {}", booking_id))),
        }
    }
}
