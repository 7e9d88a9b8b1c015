//! `PostgreSQL` persistence for the cadence event aggregate.
//!
//! ## Summary
//! Diesel schema and migrations for the `event_detail`, `event` and `event_repetition`
//! tables, row models with conversions to the domain model, query functions, and
//! [`store::PgAggregateStore`], the transactional implementation of
//! [`cadence_core::store::AggregateStore`].

pub mod db;
pub mod error;
pub mod model;
pub mod store;
