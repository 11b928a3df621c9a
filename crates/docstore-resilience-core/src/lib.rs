//! Core infrastructure for docstore-resilience.
//!
//! This crate provides functionality shared by the write executors and by
//! transport adapters:
//! - Event system for observability
//! - Transport failure taxonomy and duplicate key message parsing
//! - Replaceable blocking pauses between attempts

pub mod events;
pub mod failure;
pub mod sleep;

pub use events::{DocstoreEvent, EventListener, EventListeners, FnListener};
pub use failure::{parse_duplicate_key_index, DriverFailure, FailureKind, TransportFailure};
pub use sleep::{NoopSleeper, Sleeper, ThreadSleeper};
