//! Event-sourced aggregate persistence: an append-only event log with
//! optimistic concurrency, replay through stateless rehydrators, periodic
//! snapshots and projection dispatch to read models.
//!
//! `event_sourcing` is the generic engine; `domain::account` is a complete
//! aggregate built on it.

pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
pub mod utils;
