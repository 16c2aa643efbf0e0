//! Event contracts and event distribution mechanics.
//!
//! Domain crates implement [`Event`] for their event enums; infrastructure
//! wraps committed events in an [`EventEnvelope`] and fans them out over an
//! [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
