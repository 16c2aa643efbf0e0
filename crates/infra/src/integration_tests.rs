//! Pipeline tests: Command → EventStore → EventBus → Projection → ReadModel.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::Value as JsonValue;
    use uuid::Uuid;

    use storefront_cart::{AddItem, Cart, CartCommand, CartId, CreateCart, RefreshPricing};
    use storefront_catalog::{
        CategoryId, CreateProduct, Product, ProductCommand, ProductId, UpdateProduct,
    };
    use storefront_core::{Aggregate, AggregateId, AggregateRoot, Discount, ExpectedVersion, Money, UserId};
    use storefront_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};

    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
    use crate::projections::{CartsProjection, Projection, ProductsProjection};

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    struct Harness {
        dispatcher: CommandDispatcher<Arc<InMemoryEventStore>, Bus>,
        subscription: Subscription<EventEnvelope<JsonValue>>,
        products: ProductsProjection,
        carts: CartsProjection,
    }

    impl Harness {
        fn new() -> Self {
            let bus: Bus = Arc::new(InMemoryEventBus::new());
            let subscription = bus.subscribe();
            Self {
                dispatcher: CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), bus),
                subscription,
                products: ProductsProjection::in_memory(),
                carts: CartsProjection::in_memory(),
            }
        }

        fn pump(&self) {
            for env in self.subscription.drain() {
                self.products.apply_envelope(&env).unwrap();
                self.carts.apply_envelope(&env).unwrap();
            }
        }

        fn create_product(&self, price: u64, percent: u16, stock: u32) -> ProductId {
            let product_id = ProductId::new(AggregateId::new());
            self.dispatcher
                .dispatch(
                    product_id.0,
                    Product::AGGREGATE_TYPE,
                    ProductCommand::CreateProduct(CreateProduct {
                        product_id,
                        category_id: CategoryId::new(AggregateId::new()),
                        name: "Desk Lamp".to_string(),
                        description: "Warm white desk lamp".to_string(),
                        image: None,
                        price: Money::from_minor(price),
                        discount: Discount::from_percent(percent).unwrap(),
                        stock,
                        seller: None,
                        occurred_at: Utc::now(),
                    }),
                    |id| Product::empty(ProductId::new(id)),
                )
                .unwrap();
            self.pump();
            product_id
        }

        fn product(&self, product_id: ProductId) -> Product {
            self.dispatcher
                .load(product_id.0, |id| Product::empty(ProductId::new(id)))
                .unwrap()
        }

        fn create_cart(&self) -> CartId {
            let cart_id = CartId::new(AggregateId::new());
            self.dispatcher
                .dispatch(
                    cart_id.0,
                    Cart::AGGREGATE_TYPE,
                    CartCommand::CreateCart(CreateCart {
                        cart_id,
                        owner: UserId::new(),
                        occurred_at: Utc::now(),
                    }),
                    make_cart,
                )
                .unwrap();
            self.pump();
            cart_id
        }

        fn add(&self, cart_id: CartId, product_id: ProductId, quantity: u32) -> Result<Cart, DispatchError> {
            let out = self.dispatcher.dispatch(
                cart_id.0,
                Cart::AGGREGATE_TYPE,
                CartCommand::AddItem(AddItem {
                    cart_id,
                    product: self.product(product_id).snapshot(),
                    quantity,
                    occurred_at: Utc::now(),
                }),
                make_cart,
            )?;
            self.pump();
            Ok(out.aggregate)
        }
    }

    fn make_cart(id: AggregateId) -> Cart {
        Cart::empty(CartId::new(id))
    }

    #[test]
    fn add_item_updates_cart_read_model_total() {
        let h = Harness::new();
        let product_id = h.create_product(10_000, 10, 5);
        let cart_id = h.create_cart();

        let cart = h.add(cart_id, product_id, 2).unwrap();

        let rm = h.carts.get(&cart_id).unwrap();
        assert_eq!(rm.total(), Money::from_minor(18_000));
        assert_eq!(rm.total(), cart.total());
        assert_eq!(h.carts.carts_containing(product_id), vec![cart_id]);
    }

    #[test]
    fn rejected_command_leaves_read_models_untouched() {
        let h = Harness::new();
        let product_id = h.create_product(10_000, 0, 5);
        let cart_id = h.create_cart();

        let err = h.add(cart_id, product_id, 10).unwrap_err();

        assert!(matches!(err, DispatchError::InvalidState(_)));
        assert!(h.carts.get(&cart_id).unwrap().lines.is_empty());
    }

    #[test]
    fn price_update_then_refresh_reprices_the_line() {
        let h = Harness::new();
        let product_id = h.create_product(10_000, 0, 5);
        let cart_id = h.create_cart();
        h.add(cart_id, product_id, 3).unwrap();

        h.dispatcher
            .dispatch(
                product_id.0,
                Product::AGGREGATE_TYPE,
                ProductCommand::UpdateProduct(UpdateProduct {
                    product_id,
                    name: "Desk Lamp".to_string(),
                    description: "Warm white desk lamp".to_string(),
                    price: Money::from_minor(12_000),
                    discount: Discount::NONE,
                    stock: 5,
                    occurred_at: Utc::now(),
                }),
                |id| Product::empty(ProductId::new(id)),
            )
            .unwrap();
        h.dispatcher
            .dispatch(
                cart_id.0,
                Cart::AGGREGATE_TYPE,
                CartCommand::RefreshPricing(RefreshPricing {
                    cart_id,
                    product: h.product(product_id).snapshot(),
                    occurred_at: Utc::now(),
                }),
                make_cart,
            )
            .unwrap();
        h.pump();

        assert_eq!(h.products.get(&product_id).unwrap().special_price, Money::from_minor(12_000));
        assert_eq!(h.carts.get(&cart_id).unwrap().total(), Money::from_minor(36_000));
    }

    #[test]
    fn stale_append_is_a_concurrency_error() {
        let h = Harness::new();
        let product_id = h.create_product(10_000, 0, 5);
        let cart_id = h.create_cart();

        // A writer that loaded the cart at version 1 decides to add the item...
        let stale = h.dispatcher.load(cart_id.0, make_cart).unwrap();
        let decided = stale
            .handle(&CartCommand::AddItem(AddItem {
                cart_id,
                product: h.product(product_id).snapshot(),
                quantity: 1,
                occurred_at: Utc::now(),
            }))
            .unwrap();

        // ...but another writer commits first.
        h.add(cart_id, product_id, 1).unwrap();

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(cart_id.0, Cart::AGGREGATE_TYPE, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let err = h
            .dispatcher
            .store()
            .append(uncommitted, ExpectedVersion::Exact(stale.version()))
            .unwrap_err();

        assert!(matches!(DispatchError::from(err), DispatchError::Concurrency(_)));
        assert_eq!(h.carts.get(&cart_id).unwrap().lines[0].quantity, 1);
    }

    #[test]
    fn rebuild_from_store_matches_live_projection() {
        let h = Harness::new();
        let product_id = h.create_product(2_500, 20, 9);
        let cart_id = h.create_cart();
        h.add(cart_id, product_id, 4).unwrap();

        let envelopes: Vec<_> = h
            .dispatcher
            .store()
            .load_all()
            .unwrap()
            .iter()
            .map(|e| e.to_envelope())
            .collect();

        let rebuilt = CartsProjection::in_memory();
        rebuilt.rebuild_from_scratch(&envelopes).unwrap();
        assert_eq!(rebuilt.get(&cart_id), h.carts.get(&cart_id));

        // Replaying the same envelopes again is a no-op.
        for env in &envelopes {
            rebuilt.apply_envelope(env).unwrap();
        }
        assert_eq!(rebuilt.get(&cart_id).unwrap().lines.len(), 1);
    }
}
