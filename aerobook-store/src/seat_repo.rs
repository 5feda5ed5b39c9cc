use crate::database::storage;
use aerobook_core::{
    seat_numbers, Cabin, CabinFare, CoreError, CoreResult, Flight, Hold, NewFlight, Seat, SeatInventory, SeatRef,
    SeatState,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

/// Seat inventory backed by the `flights`, `flight_cabins` and `seats` tables.
///
/// Each single-seat transition is one conditional `UPDATE`; row locks stand in
/// for the per-seat mutexes of the in-memory store. Batches lock their rows
/// with `SELECT ... FOR UPDATE` in (flight, cabin, seat index) order.
pub struct PgSeatInventory {
    pub pool: PgPool,
}

impl PgSeatInventory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_cabins(&self, flight_ids: &[Uuid]) -> CoreResult<HashMap<Uuid, Vec<CabinFare>>> {
        let rows = sqlx::query(
            r#"
            SELECT c.flight_id, c.cabin, c.capacity, c.base_price_cents, c.current_price_cents,
                   (SELECT COUNT(*) FROM seats s
                     WHERE s.flight_id = c.flight_id AND s.cabin = c.cabin AND s.state = 'OCCUPIED') AS occupied
            FROM flight_cabins c
            WHERE c.flight_id = ANY($1)
            "#,
        )
        .bind(flight_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut cabins: HashMap<Uuid, Vec<CabinFare>> = HashMap::new();
        for row in rows {
            let flight_id: Uuid = row.try_get("flight_id").map_err(storage)?;
            let capacity: i32 = row.try_get("capacity").map_err(storage)?;
            let occupied: i64 = row.try_get("occupied").map_err(storage)?;
            cabins.entry(flight_id).or_default().push(CabinFare {
                cabin: parse_cabin(&row)?,
                capacity: capacity as u32,
                occupied: occupied as u32,
                base_price_cents: row.try_get("base_price_cents").map_err(storage)?,
                current_price_cents: row.try_get("current_price_cents").map_err(storage)?,
            });
        }
        for fares in cabins.values_mut() {
            fares.sort_by_key(|f| f.cabin);
        }
        Ok(cabins)
    }

    async fn seat_exists(&self, seat: &SeatRef) -> CoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM seats WHERE flight_id = $1 AND cabin = $2 AND seat_number = $3")
            .bind(seat.flight_id)
            .bind(seat.cabin.as_str())
            .bind(&seat.seat_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.is_some())
    }

    async fn flight_exists(&self, flight_id: Uuid) -> CoreResult<()> {
        let row = sqlx::query("SELECT 1 FROM flights WHERE id = $1")
            .bind(flight_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound(format!("flight {}", flight_id))),
        }
    }
}

fn parse_cabin(row: &PgRow) -> CoreResult<Cabin> {
    let raw: String = row.try_get("cabin").map_err(storage)?;
    raw.parse().map_err(|e| CoreError::Storage(format!("{}", e)))
}

fn parse_state(raw: &str) -> CoreResult<SeatState> {
    match raw {
        "FREE" => Ok(SeatState::Free),
        "HELD" => Ok(SeatState::Held),
        "OCCUPIED" => Ok(SeatState::Occupied),
        other => Err(CoreError::Storage(format!("unknown seat state {}", other))),
    }
}

fn seat_ref(row: &PgRow) -> CoreResult<SeatRef> {
    Ok(SeatRef {
        flight_id: row.try_get("flight_id").map_err(storage)?,
        cabin: parse_cabin(row)?,
        seat_number: row.try_get("seat_number").map_err(storage)?,
    })
}

fn flight_from_row(row: &PgRow, cabins: Vec<CabinFare>) -> CoreResult<Flight> {
    Ok(Flight {
        id: row.try_get("id").map_err(storage)?,
        flight_number: row.try_get("flight_number").map_err(storage)?,
        origin: row.try_get("origin").map_err(storage)?,
        destination: row.try_get("destination").map_err(storage)?,
        departure_at: row.try_get("departure_at").map_err(storage)?,
        currency: row.try_get("currency").map_err(storage)?,
        cabins,
    })
}

/// Column-wise arrays for `UNNEST` batch predicates.
fn batch_columns(seats: &[SeatRef]) -> (Vec<Uuid>, Vec<String>, Vec<String>) {
    let flight_ids = seats.iter().map(|s| s.flight_id).collect();
    let cabins = seats.iter().map(|s| s.cabin.as_str().to_string()).collect();
    let numbers = seats.iter().map(|s| s.seat_number.clone()).collect();
    (flight_ids, cabins, numbers)
}

fn reject_duplicates(seats: &[SeatRef]) -> CoreResult<()> {
    let mut seen = HashSet::new();
    if seats.iter().all(|s| seen.insert(s)) {
        Ok(())
    } else {
        Err(CoreError::validation("the same seat appears twice in one batch"))
    }
}

const BATCH_PREDICATE: &str =
    "(flight_id, cabin, seat_number) IN (SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[]))";

#[async_trait]
impl SeatInventory for PgSeatInventory {
    async fn register_flight(&self, flight: &NewFlight) -> CoreResult<Flight> {
        flight.validate()?;
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            "INSERT INTO flights (id, flight_number, origin, destination, departure_at, currency) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(flight.flight_number.trim())
        .bind(flight.origin.trim().to_uppercase())
        .bind(flight.destination.trim().to_uppercase())
        .bind(flight.departure_at)
        .bind(flight.currency.trim().to_uppercase())
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        for cabin in &flight.cabins {
            sqlx::query(
                "INSERT INTO flight_cabins (flight_id, cabin, capacity, base_price_cents, current_price_cents) VALUES ($1, $2, $3, $4, $4)",
            )
            .bind(id)
            .bind(cabin.cabin.as_str())
            .bind(cabin.capacity as i32)
            .bind(cabin.base_price_cents)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

            let numbers = seat_numbers(cabin.cabin, cabin.capacity);
            let indexes: Vec<i32> = (0..numbers.len() as i32).collect();
            sqlx::query(
                r#"
                INSERT INTO seats (flight_id, cabin, seat_number, seat_index)
                SELECT $1, $2, n, i FROM UNNEST($3::text[], $4::int[]) AS t(n, i)
                "#,
            )
            .bind(id)
            .bind(cabin.cabin.as_str())
            .bind(&numbers)
            .bind(&indexes)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        info!("Registered flight {} ({})", flight.flight_number, id);
        self.flight(id).await
    }

    async fn flight(&self, flight_id: Uuid) -> CoreResult<Flight> {
        let row = sqlx::query("SELECT id, flight_number, origin, destination, departure_at, currency FROM flights WHERE id = $1")
            .bind(flight_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| CoreError::NotFound(format!("flight {}", flight_id)))?;

        let mut cabins = self.load_cabins(&[flight_id]).await?;
        flight_from_row(&row, cabins.remove(&flight_id).unwrap_or_default())
    }

    async fn list_flights(&self) -> CoreResult<Vec<Flight>> {
        let rows = sqlx::query(
            "SELECT id, flight_number, origin, destination, departure_at, currency FROM flights ORDER BY departure_at, flight_number",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let ids = rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("id").map_err(storage))
            .collect::<CoreResult<Vec<_>>>()?;
        let mut cabins = self.load_cabins(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| flight_from_row(row, cabins.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn get_seats(&self, flight_id: Uuid, cabin: Cabin, now: DateTime<Utc>) -> CoreResult<Vec<Seat>> {
        self.flight_exists(flight_id).await?;

        // One statement, one snapshot. Lapsed holds read as free.
        let rows = sqlx::query(
            r#"
            SELECT seat_number,
                   CASE WHEN state = 'HELD' AND hold_expires_at <= $3 THEN 'FREE' ELSE state END AS state,
                   CASE WHEN state = 'HELD' AND hold_expires_at > $3 THEN hold_owner END AS hold_owner,
                   CASE WHEN state = 'HELD' AND hold_expires_at > $3 THEN hold_expires_at END AS hold_expires_at,
                   booking_id
            FROM seats
            WHERE flight_id = $1 AND cabin = $2
            ORDER BY seat_index
            "#,
        )
        .bind(flight_id)
        .bind(cabin.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| {
                let state: String = row.try_get("state").map_err(storage)?;
                Ok(Seat {
                    flight_id,
                    cabin,
                    seat_number: row.try_get("seat_number").map_err(storage)?,
                    state: parse_state(&state)?,
                    hold_owner: row.try_get("hold_owner").map_err(storage)?,
                    hold_expires_at: row.try_get("hold_expires_at").map_err(storage)?,
                    booking_id: row.try_get("booking_id").map_err(storage)?,
                })
            })
            .collect()
    }

    async fn try_hold(
        &self,
        seat: &SeatRef,
        owner: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CoreResult<Hold> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET state = 'HELD', hold_owner = $4, hold_expires_at = $5, booking_id = NULL
            WHERE flight_id = $1 AND cabin = $2 AND seat_number = $3
              AND (state = 'FREE'
                   OR (state = 'HELD' AND (hold_expires_at <= $6 OR hold_owner = $4)))
            "#,
        )
        .bind(seat.flight_id)
        .bind(seat.cabin.as_str())
        .bind(&seat.seat_number)
        .bind(owner)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            if self.seat_exists(seat).await? {
                return Err(CoreError::SeatUnavailable(seat.clone()));
            }
            return Err(CoreError::NotFound(format!("seat {}", seat)));
        }

        Ok(Hold {
            seat: seat.clone(),
            owner: owner.to_string(),
            expires_at,
        })
    }

    async fn release_hold(&self, seat: &SeatRef, owner: &str, now: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET state = 'FREE', hold_owner = NULL, hold_expires_at = NULL
            WHERE flight_id = $1 AND cabin = $2 AND seat_number = $3
              AND state = 'HELD' AND hold_owner = $4 AND hold_expires_at > $5
            "#,
        )
        .bind(seat.flight_id)
        .bind(seat.cabin.as_str())
        .bind(&seat.seat_number)
        .bind(owner)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("active hold on {}", seat)));
        }
        Ok(())
    }

    async fn release_owner_holds(&self, owner: &str) -> CoreResult<Vec<SeatRef>> {
        let rows = sqlx::query(
            r#"
            UPDATE seats
            SET state = 'FREE', hold_owner = NULL, hold_expires_at = NULL
            WHERE state = 'HELD' AND hold_owner = $1
            RETURNING flight_id, cabin, seat_number
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(seat_ref).collect()
    }

    async fn mark_occupied(
        &self,
        seats: &[SeatRef],
        owner: &str,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<Hold>> {
        reject_duplicates(seats)?;
        let (flight_ids, cabins, numbers) = batch_columns(seats);
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT flight_id, cabin, seat_number, state, hold_owner, hold_expires_at
            FROM seats
            WHERE {}
            ORDER BY flight_id, cabin, seat_index
            FOR UPDATE
            "#,
            BATCH_PREDICATE
        ))
        .bind(&flight_ids)
        .bind(&cabins)
        .bind(&numbers)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage)?;

        let mut found = HashSet::new();
        let mut consumed = Vec::with_capacity(rows.len());
        for row in &rows {
            let seat = seat_ref(row)?;
            let state: String = row.try_get("state").map_err(storage)?;
            let holder: Option<String> = row.try_get("hold_owner").map_err(storage)?;
            let expires_at: Option<DateTime<Utc>> = row.try_get("hold_expires_at").map_err(storage)?;

            match (parse_state(&state)?, holder, expires_at) {
                (SeatState::Held, Some(holder), Some(expires_at)) if holder == owner => {
                    if expires_at <= now {
                        return Err(CoreError::HoldExpired(seat));
                    }
                    consumed.push(Hold { seat: seat.clone(), owner: holder, expires_at });
                }
                (SeatState::Free, _, _) => return Err(CoreError::HoldExpired(seat)),
                (SeatState::Held, _, Some(expires_at)) if expires_at <= now => {
                    return Err(CoreError::HoldExpired(seat));
                }
                _ => {
                    return Err(CoreError::Conflict(format!("seat {} is no longer held by the caller", seat)));
                }
            }
            found.insert(seat);
        }

        if let Some(missing) = seats.iter().find(|s| !found.contains(*s)) {
            return Err(CoreError::NotFound(format!("seat {}", missing)));
        }

        sqlx::query(&format!(
            "UPDATE seats SET state = 'OCCUPIED', booking_id = $4, hold_owner = NULL, hold_expires_at = NULL WHERE {}",
            BATCH_PREDICATE
        ))
        .bind(&flight_ids)
        .bind(&cabins)
        .bind(&numbers)
        .bind(booking_id)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        debug!("Marked {} seats occupied for booking {}", consumed.len(), booking_id);
        Ok(consumed)
    }

    async fn mark_free(&self, seats: &[SeatRef]) -> CoreResult<()> {
        reject_duplicates(seats)?;
        let (flight_ids, cabins, numbers) = batch_columns(seats);

        sqlx::query(&format!(
            "UPDATE seats SET state = 'FREE', booking_id = NULL WHERE {} AND state = 'OCCUPIED'",
            BATCH_PREDICATE
        ))
        .bind(&flight_ids)
        .bind(&cabins)
        .bind(&numbers)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn reinstate_holds(&self, holds: &[Hold]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        for hold in holds {
            sqlx::query(
                r#"
                UPDATE seats
                SET state = 'HELD', hold_owner = $4, hold_expires_at = $5, booking_id = NULL
                WHERE flight_id = $1 AND cabin = $2 AND seat_number = $3
                "#,
            )
            .bind(hold.seat.flight_id)
            .bind(hold.seat.cabin.as_str())
            .bind(&hold.seat.seat_number)
            .bind(&hold.owner)
            .bind(hold.expires_at)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }
        tx.commit().await.map_err(storage)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<SeatRef>> {
        let rows = sqlx::query(
            r#"
            UPDATE seats
            SET state = 'FREE', hold_owner = NULL, hold_expires_at = NULL
            WHERE state = 'HELD' AND hold_expires_at <= $1
            RETURNING flight_id, cabin, seat_number
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(seat_ref).collect()
    }

    async fn set_current_prices(&self, flight_id: Uuid, fares: &[CabinFare]) -> CoreResult<()> {
        self.flight_exists(flight_id).await?;
        for fare in fares {
            sqlx::query("UPDATE flight_cabins SET current_price_cents = $3 WHERE flight_id = $1 AND cabin = $2")
                .bind(flight_id)
                .bind(fare.cabin.as_str())
                .bind(fare.current_price_cents)
                .execute(&self.pool)
                .await
                .map_err(storage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_helpers() {
        let flight = Uuid::new_v4();
        let seats = vec![
            SeatRef::new(flight, Cabin::Economy, "E1"),
            SeatRef::new(flight, Cabin::Business, "B2"),
        ];
        let (ids, cabins, numbers) = batch_columns(&seats);
        assert_eq!(ids, vec![flight, flight]);
        assert_eq!(cabins, vec!["economy", "business"]);
        assert_eq!(numbers, vec!["E1", "B2"]);

        assert!(reject_duplicates(&seats).is_ok());
        let doubled = vec![seats[0].clone(), seats[0].clone()];
        assert!(matches!(reject_duplicates(&doubled), Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_parse_state() {
        assert_eq!(parse_state("HELD").unwrap(), SeatState::Held);
        assert!(parse_state("LOST").is_err());
    }
}
