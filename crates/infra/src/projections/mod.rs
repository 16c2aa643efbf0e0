//! Projections: query-side read models fed by committed events.
//!
//! Every projection keeps a per-stream cursor. Envelopes at or below the
//! cursor are duplicates and are skipped; an envelope that skips ahead is a
//! gap and is reported, since applying it would silently lose state. Read
//! models are disposable and can always be rebuilt from the event store.

use serde_json::Value as JsonValue;
use thiserror::Error;

use storefront_events::EventEnvelope;

pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod cursor;
pub mod orders;

pub use addresses::{AddressReadModel, AddressesProjection};
pub use carts::{CartReadModel, CartsProjection};
pub use catalog::{CategoriesProjection, CategoryReadModel, ProductReadModel, ProductsProjection};
pub use orders::{OrderReadModel, OrdersProjection};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize {
        aggregate_type: String,
        message: String,
    },

    #[error("event does not belong to its envelope stream: {0}")]
    StreamMismatch(String),

    #[error("sequence gap (last={last}, found={found})")]
    SequenceGap { last: u64, found: u64 },

    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

/// A read model builder driven by event envelopes.
pub trait Projection: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Apply one envelope. Envelopes for other aggregate types are ignored.
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop every read model record and cursor.
    fn reset(&self) -> Result<(), ProjectionError>;

    /// Reset, then replay `envelopes` in stream order.
    fn rebuild_from_scratch(
        &self,
        envelopes: &[EventEnvelope<JsonValue>],
    ) -> Result<(), ProjectionError> {
        self.reset()?;

        let mut ordered: Vec<&EventEnvelope<JsonValue>> = envelopes.iter().collect();
        ordered.sort_by_key(|e| (e.aggregate_id(), e.sequence_number()));

        for env in ordered {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
