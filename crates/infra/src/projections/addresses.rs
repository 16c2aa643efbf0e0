use serde_json::Value as JsonValue;

use storefront_core::UserId;
use storefront_events::EventEnvelope;
use storefront_orders::{Address, AddressDetails, AddressEvent, AddressId};

use super::cursor::{StreamCursors, decode, ensure_same_stream};
use super::{Projection, ProjectionError};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressReadModel {
    pub address_id: AddressId,
    pub owner: UserId,
    pub details: AddressDetails,
}

#[derive(Debug)]
pub struct AddressesProjection<S = InMemoryReadStore<AddressId, AddressReadModel>>
where
    S: ReadStore<AddressId, AddressReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl AddressesProjection {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> AddressesProjection<S>
where
    S: ReadStore<AddressId, AddressReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, address_id: &AddressId) -> Option<AddressReadModel> {
        self.store.get(address_id)
    }

    pub fn by_owner(&self, owner: UserId) -> Vec<AddressReadModel> {
        let mut found: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|a| a.owner == owner)
            .collect();
        found.sort_by_key(|a| a.address_id.0);
        found
    }
}

impl<S> Projection for AddressesProjection<S>
where
    S: ReadStore<AddressId, AddressReadModel>,
{
    fn name(&self) -> &'static str {
        "orders.addresses"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Address::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let ev: AddressEvent = decode(envelope)?;
        ensure_same_stream(envelope, ev.address_id().0)?;

        match ev {
            AddressEvent::AddressCreated(e) => {
                self.store.upsert(
                    e.address_id,
                    AddressReadModel {
                        address_id: e.address_id,
                        owner: e.owner,
                        details: e.details,
                    },
                );
            }
            AddressEvent::AddressUpdated(e) => {
                if let Some(mut rm) = self.store.get(&e.address_id) {
                    rm.details = e.details;
                    self.store.upsert(e.address_id, rm);
                }
            }
            AddressEvent::AddressDeleted(e) => {
                self.store.remove(&e.address_id);
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())?;
        Ok(())
    }

    fn reset(&self) -> Result<(), ProjectionError> {
        self.store.clear();
        self.cursors.clear()
    }
}
