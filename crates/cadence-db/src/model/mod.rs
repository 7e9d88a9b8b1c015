//! Row models for the three event tables and their conversions to domain types.

pub mod detail;
pub mod event;
pub mod repetition;
