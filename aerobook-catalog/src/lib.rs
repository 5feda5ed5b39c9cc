pub mod inventory;
pub mod pricing;

pub use inventory::InMemorySeatInventory;
pub use pricing::{PriceRecalculator, PricingConfig, PricingEngine};
