pub mod coordinator;
pub mod expiry;
pub mod manager;
pub mod repo;
pub mod validation;

pub use coordinator::{HoldPolicy, ReservationCoordinator};
pub use expiry::HoldSweeper;
pub use manager::BookingManager;
pub use repo::InMemoryBookingRepository;
pub use validation::{validate_ticket_specs, BookingRules};
