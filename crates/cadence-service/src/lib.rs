//! Scheduling engine for recurring events.
//!
//! ## Summary
//! Validation, occurrence generation and update propagation live here, behind the
//! [`engine::EventEngine`] entry points. Persistence is reached only through the
//! `AggregateStore` contract from `cadence-core`.

pub mod draft;
pub mod engine;
pub mod error;
pub mod generator;
pub mod memory;
pub mod propagation;
pub mod publish;
pub mod validator;

pub use engine::EventEngine;
pub use error::{ServiceError, ServiceResult};
