use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use storefront_cart::{Cart, CartEvent, CartId, CartLine};
use storefront_catalog::ProductId;
use storefront_core::{Money, UserId};
use storefront_events::EventEnvelope;

use super::cursor::{StreamCursors, decode, ensure_same_stream};
use super::{Projection, ProjectionError};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartReadModel {
    pub cart_id: CartId,
    pub owner: UserId,
    pub lines: Vec<CartLine>,
}

impl CartReadModel {
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.lines.iter().any(|l| l.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }
}

/// Carts by id, with an owner index (one cart per user).
#[derive(Debug)]
pub struct CartsProjection<S = InMemoryReadStore<CartId, CartReadModel>>
where
    S: ReadStore<CartId, CartReadModel>,
{
    store: S,
    by_owner: RwLock<HashMap<UserId, CartId>>,
    cursors: StreamCursors,
}

impl CartsProjection {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> CartsProjection<S>
where
    S: ReadStore<CartId, CartReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            by_owner: RwLock::new(HashMap::new()),
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, cart_id: &CartId) -> Option<CartReadModel> {
        self.store.get(cart_id)
    }

    pub fn cart_id_of(&self, owner: UserId) -> Option<CartId> {
        self.by_owner.read().ok()?.get(&owner).copied()
    }

    pub fn find_by_owner(&self, owner: UserId) -> Option<CartReadModel> {
        self.cart_id_of(owner).and_then(|id| self.store.get(&id))
    }

    pub fn list(&self) -> Vec<CartReadModel> {
        self.store.list()
    }

    /// Ids of every cart holding a line for `product_id`.
    pub fn carts_containing(&self, product_id: ProductId) -> Vec<CartId> {
        self.store
            .list()
            .into_iter()
            .filter(|c| c.contains(product_id))
            .map(|c| c.cart_id)
            .collect()
    }

    fn update(&self, cart_id: CartId, f: impl FnOnce(&mut CartReadModel)) {
        if let Some(mut rm) = self.store.get(&cart_id) {
            f(&mut rm);
            self.store.upsert(cart_id, rm);
        }
    }
}

impl<S> Projection for CartsProjection<S>
where
    S: ReadStore<CartId, CartReadModel>,
{
    fn name(&self) -> &'static str {
        "carts"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Cart::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let ev: CartEvent = decode(envelope)?;
        ensure_same_stream(envelope, ev.cart_id().0)?;

        match ev {
            CartEvent::CartCreated(e) => {
                self.store.upsert(
                    e.cart_id,
                    CartReadModel {
                        cart_id: e.cart_id,
                        owner: e.owner,
                        lines: Vec::new(),
                    },
                );
                self.by_owner
                    .write()
                    .map_err(|_| ProjectionError::Poisoned("cart owner index"))?
                    .insert(e.owner, e.cart_id);
            }
            CartEvent::ItemAdded(e) => self.update(e.cart_id, |rm| {
                rm.lines.push(CartLine {
                    product_id: e.product_id,
                    product_name: e.product_name,
                    quantity: e.quantity,
                    unit_price: e.unit_price,
                    discount: e.discount,
                });
            }),
            CartEvent::QuantityChanged(e) => self.update(e.cart_id, |rm| {
                if let Some(line) = rm.line_mut(e.product_id) {
                    line.quantity = e.quantity;
                    line.unit_price = e.unit_price;
                    line.discount = e.discount;
                }
            }),
            CartEvent::PricingRefreshed(e) => self.update(e.cart_id, |rm| {
                if let Some(line) = rm.line_mut(e.product_id) {
                    line.unit_price = e.unit_price;
                    line.discount = e.discount;
                }
            }),
            CartEvent::ItemRemoved(e) => self.update(e.cart_id, |rm| {
                rm.lines.retain(|l| l.product_id != e.product_id);
            }),
            CartEvent::CartCheckedOut(e) => self.update(e.cart_id, |rm| rm.lines.clear()),
            CartEvent::LinesRestored(e) => self.update(e.cart_id, |rm| rm.lines.extend(e.lines)),
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())?;
        Ok(())
    }

    fn reset(&self) -> Result<(), ProjectionError> {
        self.store.clear();
        self.by_owner
            .write()
            .map_err(|_| ProjectionError::Poisoned("cart owner index"))?
            .clear();
        self.cursors.clear()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use storefront_cart::CartCreated;
    use storefront_core::AggregateId;
    use uuid::Uuid;

    use super::*;

    fn created(cart_id: CartId, owner: UserId) -> EventEnvelope<JsonValue> {
        let event = CartEvent::CartCreated(CartCreated {
            cart_id,
            owner,
            occurred_at: Utc::now(),
        });
        EventEnvelope::new(
            Uuid::now_v7(),
            cart_id.0,
            Cart::AGGREGATE_TYPE,
            1,
            "cart.created",
            Utc::now(),
            serde_json::to_value(&event).unwrap(),
        )
    }

    #[test]
    fn created_carts_are_indexed_by_owner() {
        let projection = CartsProjection::in_memory();
        let owner = UserId::new();
        let cart_id = CartId::new(AggregateId::new());

        projection.apply_envelope(&created(cart_id, owner)).unwrap();

        assert_eq!(projection.cart_id_of(owner), Some(cart_id));
        assert!(projection.find_by_owner(owner).unwrap().lines.is_empty());
    }

    #[test]
    fn poisoned_owner_index_fails_the_event() {
        let projection = Arc::new(CartsProjection::in_memory());
        let poisoner = Arc::clone(&projection);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.by_owner.write().unwrap();
            panic!("poison the owner index");
        })
        .join();

        let envelope = created(CartId::new(AggregateId::new()), UserId::new());
        assert_eq!(
            projection.apply_envelope(&envelope).unwrap_err(),
            ProjectionError::Poisoned("cart owner index")
        );
        assert!(projection.reset().is_err());
    }
}
