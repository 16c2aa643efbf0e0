use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storefront_core::{Money, UserId};
use storefront_events::EventEnvelope;
use storefront_orders::{AddressId, Order, OrderEvent, OrderId, OrderLine, OrderStatus, Payment};

use super::cursor::{StreamCursors, decode, ensure_same_stream};
use super::{Projection, ProjectionError};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub owner: UserId,
    pub address_id: AddressId,
    pub lines: Vec<OrderLine>,
    pub payment: Payment,
    pub status: OrderStatus,
    pub total: Money,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct OrdersProjection<S = InMemoryReadStore<OrderId, OrderReadModel>>
where
    S: ReadStore<OrderId, OrderReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl OrdersProjection {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    /// Orders placed by `owner`, oldest first.
    pub fn by_owner(&self, owner: UserId) -> Vec<OrderReadModel> {
        let mut orders: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|o| o.owner == owner)
            .collect();
        orders.sort_by_key(|o| o.placed_at);
        orders
    }
}

impl<S> Projection for OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderReadModel>,
{
    fn name(&self) -> &'static str {
        "orders"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Order::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        match decode::<OrderEvent>(envelope)? {
            OrderEvent::OrderPlaced(e) => {
                ensure_same_stream(envelope, e.order_id.0)?;
                self.store.upsert(
                    e.order_id,
                    OrderReadModel {
                        order_id: e.order_id,
                        owner: e.owner,
                        address_id: e.address_id,
                        lines: e.lines,
                        payment: e.payment,
                        status: OrderStatus::Accepted,
                        total: e.total,
                        placed_at: e.occurred_at,
                    },
                );
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
