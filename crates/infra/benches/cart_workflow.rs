use std::sync::Arc;

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::Value as JsonValue;

use storefront_cart::{AddItem, Cart, CartCommand, CartId, ChangeQuantity, CreateCart};
use storefront_catalog::{CategoryId, CreateProduct, Product, ProductCommand, ProductId};
use storefront_core::{AggregateId, Discount, Money, UserId};
use storefront_events::{EventEnvelope, InMemoryEventBus};
use storefront_infra::command_dispatcher::CommandDispatcher;
use storefront_infra::event_store::{EventStore, InMemoryEventStore};
use storefront_infra::projections::{CartsProjection, Projection};

type Dispatcher =
    CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

fn make_cart(id: AggregateId) -> Cart {
    Cart::empty(CartId::new(id))
}

fn make_product(id: AggregateId) -> Product {
    Product::empty(ProductId::new(id))
}

/// A cart holding one line of a well-stocked product.
fn setup() -> (Dispatcher, CartId, Product) {
    let dispatcher = CommandDispatcher::new(
        Arc::new(InMemoryEventStore::new()),
        Arc::new(InMemoryEventBus::new()),
    );

    let product_id = ProductId::new(AggregateId::new());
    let product = dispatcher
        .dispatch(
            product_id.0,
            Product::AGGREGATE_TYPE,
            ProductCommand::CreateProduct(CreateProduct {
                product_id,
                category_id: CategoryId::new(AggregateId::new()),
                name: "Desk Lamp".to_string(),
                description: "Warm white desk lamp".to_string(),
                image: None,
                price: Money::from_minor(10_000),
                discount: Discount::NONE,
                stock: u32::MAX,
                seller: None,
                occurred_at: Utc::now(),
            }),
            make_product,
        )
        .expect("create product")
        .aggregate;

    let cart_id = CartId::new(AggregateId::new());
    dispatcher
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
        .expect("create cart");
    dispatcher
        .dispatch(
            cart_id.0,
            Cart::AGGREGATE_TYPE,
            CartCommand::AddItem(AddItem {
                cart_id,
                product: product.snapshot(),
                quantity: 1,
                occurred_at: Utc::now(),
            }),
            make_cart,
        )
        .expect("add item");

    (dispatcher, cart_id, product)
}

fn bump(dispatcher: &Dispatcher, cart_id: CartId, product: &Product) {
    dispatcher
        .dispatch(
            cart_id.0,
            Cart::AGGREGATE_TYPE,
            CartCommand::ChangeQuantity(ChangeQuantity {
                cart_id,
                product: product.snapshot(),
                delta: 1,
                occurred_at: Utc::now(),
            }),
            make_cart,
        )
        .expect("change quantity");
}

/// Dispatch latency as the cart stream grows (rehydration dominates).
fn bench_change_quantity_by_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("change_quantity_by_history");

    for history in [10usize, 100, 1_000] {
        let (dispatcher, cart_id, product) = setup();
        for _ in 0..history {
            bump(&dispatcher, cart_id, &product);
        }

        group.bench_with_input(BenchmarkId::from_parameter(history), &history, |b, _| {
            b.iter(|| bump(black_box(&dispatcher), cart_id, &product));
        });
    }
    group.finish();
}

fn bench_projection_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("carts_projection_rebuild");

    for events in [100usize, 1_000] {
        let (dispatcher, cart_id, product) = setup();
        for _ in 0..events {
            bump(&dispatcher, cart_id, &product);
        }
        let envelopes: Vec<_> = dispatcher
            .store()
            .load_all()
            .expect("load all")
            .iter()
            .map(|e| e.to_envelope())
            .collect();

        group.throughput(Throughput::Elements(envelopes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(events), &envelopes, |b, envs| {
            let projection = CartsProjection::in_memory();
            b.iter(|| projection.rebuild_from_scratch(black_box(envs)).expect("rebuild"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_change_quantity_by_history, bench_projection_rebuild);
criterion_main!(benches);
