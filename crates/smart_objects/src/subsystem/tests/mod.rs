//! Scenario tests for the smart object subsystem
//!
//! - Claim, occupy and release flows including priority overrides
//! - Enable reasons, tags and slot state events
//! - Object lifecycle, component registration and collections
//! - Spatial and list searches with filters and conditions
//! - Claims, tags and transforms mutated from worker threads

#[cfg(test)]
mod support;

#[cfg(test)]
pub mod claim_test;


#[cfg(test)]
pub mod lifecycle_test;


#[cfg(test)]
pub mod concurrency_test;
