//! Domain model and shared contracts for the cadence recurring-event engine.
//!
//! ## Summary
//! This crate carries no persistence or transport dependencies. It defines the
//! three-entity event aggregate, the calendar arithmetic the engine relies on,
//! the reference clock, the aggregate store contract, and configuration.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
