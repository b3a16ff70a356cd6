/// Smart object subsystem - registry, reservation and search, split by concern
mod claims;
mod core;
mod lifecycle;
mod queries;
mod state;
mod stats;
mod tests;

pub use self::core::SmartObjectSubsystem;
pub use queries::{RequestFilter, SlotPredicate, SmartObjectRequest};
pub use stats::SubsystemStats;
