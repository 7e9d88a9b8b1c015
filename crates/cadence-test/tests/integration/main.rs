//! Postgres-backed integration tests.

mod aggregate_store;
mod helpers;
