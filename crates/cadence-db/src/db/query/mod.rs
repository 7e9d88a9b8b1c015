//! Query functions over the event tables.
//!
//! Every function takes a bare connection so it can run on a pooled connection or
//! inside a transaction.

pub mod detail;
pub mod event;
pub mod repetition;
