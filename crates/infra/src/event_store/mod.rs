//! Append-only event store boundary.
//!
//! Storage-agnostic: the dispatcher and projections only see the
//! [`EventStore`] trait, and the in-memory implementation backs tests and
//! single-process deployments.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
