pub mod clock;
pub mod events;
pub mod model;
pub mod repository;

pub use aerobook_shared::Cabin;
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventPublisher, FanoutPublisher, MemoryPublisher};
pub use model::*;
pub use repository::{BookingRepository, SeatInventory};

use uuid::Uuid;

/// Failure taxonomy shared by every layer of the booking core.
///
/// Every variant is recoverable by the caller; none of them leaves a booking
/// partially applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Seat unavailable: {0}")]
    SeatUnavailable(SeatRef),
    #[error("Hold expired: {0}")]
    HoldExpired(SeatRef),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Conflicting update: {0}")]
    Conflict(String),
    #[error("Booking already cancelled: {0}")]
    AlreadyCancelled(Uuid),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Stable machine-readable kind surfaced to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::SeatUnavailable(_) => "SEAT_UNAVAILABLE",
            CoreError::HoldExpired(_) => "HOLD_EXPIRED",
            CoreError::ValidationError(_) => "VALIDATION_ERROR",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Storage(_) => "INTERNAL",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::ValidationError(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
