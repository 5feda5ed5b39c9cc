use crate::database::storage;
use aerobook_core::{Booking, BookingRepository, Cabin, CoreError, CoreResult, Passenger, SeatRef, Ticket};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

pub struct PgBookingRepository {
    pub pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn tickets_for(&self, booking_ids: &[Uuid]) -> CoreResult<HashMap<Uuid, Vec<Ticket>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, booking_id, first_name, last_name, age,
                   departure_flight_id, departure_cabin, departure_seat,
                   return_flight_id, return_cabin, return_seat,
                   fare_cents, document_url
            FROM tickets
            WHERE booking_id = ANY($1)
            ORDER BY booking_id, position
            "#,
        )
        .bind(booking_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut tickets: HashMap<Uuid, Vec<Ticket>> = HashMap::new();
        for row in &rows {
            let ticket = ticket_from_row(row)?;
            tickets.entry(ticket.booking_id).or_default().push(ticket);
        }
        Ok(tickets)
    }

    async fn hydrate(&self, rows: Vec<PgRow>) -> CoreResult<Vec<Booking>> {
        let ids = rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("id").map_err(storage))
            .collect::<CoreResult<Vec<_>>>()?;
        let mut tickets = self.tickets_for(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| booking_from_row(row, tickets.remove(&id).unwrap_or_default()))
            .collect()
    }
}

fn cabin(raw: String) -> CoreResult<Cabin> {
    raw.parse().map_err(|e| CoreError::Storage(format!("{}", e)))
}

fn ticket_from_row(row: &PgRow) -> CoreResult<Ticket> {
    let first_name: String = row.try_get("first_name").map_err(storage)?;
    let last_name: String = row.try_get("last_name").map_err(storage)?;
    let age: i16 = row.try_get("age").map_err(storage)?;

    let departure = SeatRef {
        flight_id: row.try_get("departure_flight_id").map_err(storage)?,
        cabin: cabin(row.try_get("departure_cabin").map_err(storage)?)?,
        seat_number: row.try_get("departure_seat").map_err(storage)?,
    };

    let return_flight: Option<Uuid> = row.try_get("return_flight_id").map_err(storage)?;
    let return_cabin: Option<String> = row.try_get("return_cabin").map_err(storage)?;
    let return_number: Option<String> = row.try_get("return_seat").map_err(storage)?;
    let return_seat = match (return_flight, return_cabin, return_number) {
        (Some(flight_id), Some(c), Some(seat_number)) => Some(SeatRef { flight_id, cabin: cabin(c)?, seat_number }),
        _ => None,
    };

    Ok(Ticket {
        id: row.try_get("id").map_err(storage)?,
        booking_id: row.try_get("booking_id").map_err(storage)?,
        passenger: Passenger::new(&first_name, &last_name, age.clamp(0, u8::MAX as i16) as u8),
        departure,
        return_seat,
        fare_cents: row.try_get("fare_cents").map_err(storage)?,
        document_url: row.try_get("document_url").map_err(storage)?,
    })
}

fn booking_from_row(row: &PgRow, tickets: Vec<Ticket>) -> CoreResult<Booking> {
    let status: String = row.try_get("status").map_err(storage)?;
    Ok(Booking {
        id: row.try_get("id").map_err(storage)?,
        owner: row.try_get("owner").map_err(storage)?,
        status: status.parse()?,
        tickets,
        total_cents: row.try_get("total_cents").map_err(storage)?,
        currency: row.try_get("currency").map_err(storage)?,
        created_at: row.try_get("created_at").map_err(storage)?,
        updated_at: row.try_get("updated_at").map_err(storage)?,
        cancelled_at: row.try_get("cancelled_at").map_err(storage)?,
    })
}

const BOOKING_COLUMNS: &str = "id, owner, status, total_cents, currency, created_at, updated_at, cancelled_at";

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert(&self, booking: &Booking) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO bookings (id, owner, status, total_cents, currency, created_at, updated_at, cancelled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.owner)
        .bind(booking.status.as_str())
        .bind(booking.total_cents)
        .bind(&booking.currency)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(booking.cancelled_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return Err(CoreError::Conflict(format!("booking {} already exists", booking.id)));
                }
            }
            return Err(storage(e));
        }

        for (position, ticket) in booking.tickets.iter().enumerate() {
            let ret = ticket.return_seat.as_ref();
            sqlx::query(
                r#"
                INSERT INTO tickets (id, booking_id, position, first_name, last_name, age,
                                     departure_flight_id, departure_cabin, departure_seat,
                                     return_flight_id, return_cabin, return_seat,
                                     fare_cents, document_url)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(ticket.id)
            .bind(booking.id)
            .bind(position as i32)
            .bind(ticket.passenger.first_name.expose())
            .bind(ticket.passenger.last_name.expose())
            .bind(ticket.passenger.age as i16)
            .bind(ticket.departure.flight_id)
            .bind(ticket.departure.cabin.as_str())
            .bind(&ticket.departure.seat_number)
            .bind(ret.map(|s| s.flight_id))
            .bind(ret.map(|s| s.cabin.as_str()))
            .bind(ret.map(|s| s.seat_number.as_str()))
            .bind(ticket.fare_cents)
            .bind(ticket.document_url.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)
    }

    async fn get(&self, booking_id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_for_owner(&self, owner: &str) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM bookings WHERE owner = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        self.hydrate(rows).await
    }

    async fn mark_cancelled(&self, booking_id: Uuid, at: DateTime<Utc>) -> CoreResult<Booking> {
        // Conditional on the current status so exactly one concurrent caller wins.
        let row = sqlx::query(&format!(
            r#"
            UPDATE bookings
            SET status = 'CANCELLED', cancelled_at = $2, updated_at = $2
            WHERE id = $1 AND status = 'CONFIRMED'
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        match row {
            Some(row) => self
                .hydrate(vec![row])
                .await?
                .pop()
                .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id))),
            None => match self.get(booking_id).await? {
                Some(_) => Err(CoreError::AlreadyCancelled(booking_id)),
                None => Err(CoreError::NotFound(format!("booking {}", booking_id))),
            },
        }
    }

    async fn reinstate(&self, booking_id: Uuid, at: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'CONFIRMED', cancelled_at = NULL, updated_at = $2
            WHERE id = $1 AND status = 'CANCELLED'
            "#,
        )
        .bind(booking_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("cancelled booking {}", booking_id)));
        }
        Ok(())
    }
}
