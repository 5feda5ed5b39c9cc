pub mod models;
pub mod pii;

pub use models::cabin::Cabin;
pub use pii::Masked;
