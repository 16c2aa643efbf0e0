//! Disposable read model storage.
//!
//! Read models are derived data: every record here can be thrown away and
//! rebuilt from the event store.

pub mod store;

pub use store::{InMemoryReadStore, ReadStore};
