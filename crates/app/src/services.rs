use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use storefront_auth::RoleRegistry;
use storefront_cart::{Cart, CartId};
use storefront_catalog::{Category, CategoryId, Product, ProductId};
use storefront_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, Money};
use storefront_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use storefront_infra::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use storefront_infra::config::StorefrontConfig;
use storefront_infra::event_store::{EventStore, InMemoryEventStore};
use storefront_infra::projections::{
    AddressesProjection, CartsProjection, CategoriesProjection, OrdersProjection, Projection,
    ProjectionError, ProductsProjection,
};
use storefront_orders::{Address, AddressId, Order, OrderId};

use crate::errors::AppError;

type Envelope = EventEnvelope<JsonValue>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<Envelope>>>;

/// An aggregate the application can load and dispatch to by id.
pub trait EventSourced: Aggregate<Error = DomainError> + Sized
where
    Self::Event: storefront_events::Event + Serialize + DeserializeOwned,
{
    /// Stream type stored with every event.
    const STREAM: &'static str;

    fn empty_at(id: AggregateId) -> Self;
}

impl EventSourced for Category {
    const STREAM: &'static str = Category::AGGREGATE_TYPE;

    fn empty_at(id: AggregateId) -> Self {
        Category::empty(CategoryId::new(id))
    }
}

impl EventSourced for Product {
    const STREAM: &'static str = Product::AGGREGATE_TYPE;

    fn empty_at(id: AggregateId) -> Self {
        Product::empty(ProductId::new(id))
    }
}

impl EventSourced for Cart {
    const STREAM: &'static str = Cart::AGGREGATE_TYPE;

    fn empty_at(id: AggregateId) -> Self {
        Cart::empty(CartId::new(id))
    }
}

impl EventSourced for Address {
    const STREAM: &'static str = Address::AGGREGATE_TYPE;

    fn empty_at(id: AggregateId) -> Self {
        Address::empty(AddressId::new(id))
    }
}

impl EventSourced for Order {
    const STREAM: &'static str = Order::AGGREGATE_TYPE;

    fn empty_at(id: AggregateId) -> Self {
        Order::empty(OrderId::new(id))
    }
}

/// The storefront application: write side, read models and role registry.
///
/// Read models are brought up to date before every command returns, so a
/// query issued after a command always observes it.
pub struct Storefront {
    config: StorefrontConfig,
    dispatcher: Dispatcher,
    subscription: Mutex<Subscription<Envelope>>,
    pub(crate) roles: RwLock<RoleRegistry>,

    pub(crate) categories: CategoriesProjection,
    pub(crate) products: ProductsProjection,
    pub(crate) carts: CartsProjection,
    pub(crate) orders: OrdersProjection,
    pub(crate) addresses: AddressesProjection,
}

impl Storefront {
    /// Wire an in-memory storefront. Call [`Storefront::bootstrap`] before use.
    pub fn new(config: StorefrontConfig) -> Self {
        let bus: Arc<InMemoryEventBus<Envelope>> = Arc::new(InMemoryEventBus::new());
        // Subscribe before anything can be published.
        let subscription = bus.subscribe();

        Self {
            config,
            dispatcher: CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), bus),
            subscription: Mutex::new(subscription),
            roles: RwLock::new(RoleRegistry::new()),
            categories: CategoriesProjection::in_memory(),
            products: ProductsProjection::in_memory(),
            carts: CartsProjection::in_memory(),
            orders: OrdersProjection::in_memory(),
            addresses: AddressesProjection::in_memory(),
        }
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    /// `180.00 USD`
    pub fn format_amount(&self, amount: Money) -> String {
        format!("{amount} {}", self.config.currency)
    }

    fn projections(&self) -> [&dyn Projection; 5] {
        [
            &self.categories,
            &self.products,
            &self.carts,
            &self.orders,
            &self.addresses,
        ]
    }

    /// Dispatch `command` to the aggregate `id` and return its new state.
    pub(crate) fn execute<A>(&self, id: AggregateId, command: A::Command) -> Result<A, AppError>
    where
        A: EventSourced,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        let result = self
            .dispatcher
            .dispatch(id, A::STREAM, command, A::empty_at);
        self.settle(result)
    }

    /// Like [`execute`](Self::execute), but fails with a concurrency error
    /// unless the aggregate is still at `version`.
    pub(crate) fn execute_at<A>(&self, id: AggregateId, version: u64, command: A::Command) -> Result<A, AppError>
    where
        A: EventSourced,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        let result = self.dispatcher.dispatch_at(
            id,
            A::STREAM,
            ExpectedVersion::Exact(version),
            command,
            A::empty_at,
        );
        self.settle(result)
    }

    /// Catch the read side up after a dispatch. The dispatch outcome wins
    /// over a projection failure when the command itself was rejected.
    fn settle<A>(&self, result: Result<Dispatched<A>, DispatchError>) -> Result<A, AppError> {
        match result {
            Ok(dispatched) => {
                self.sync_projections()?;
                Ok(dispatched.aggregate)
            }
            Err(e) => {
                // Publish failures happen after the commit.
                if let Err(sync_error) = self.sync_projections() {
                    tracing::warn!(
                        error = %sync_error,
                        dispatch_error = %e,
                        "projection sync failed after a rejected command"
                    );
                }
                Err(e.into())
            }
        }
    }

    pub(crate) fn load<A>(&self, id: AggregateId) -> Result<A, AppError>
    where
        A: EventSourced,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        Ok(self.dispatcher.load(id, A::empty_at)?)
    }

    /// Apply every envelope published since the last call.
    ///
    /// A sequence gap means envelopes from racing writers arrived out of
    /// order; the affected projection is rebuilt from the event store.
    pub fn sync_projections(&self) -> Result<(), AppError> {
        let subscription = self
            .subscription
            .lock()
            .map_err(|_| AppError::Internal("projection subscription lock poisoned".into()))?;

        for envelope in subscription.drain() {
            for projection in self.projections() {
                match projection.apply_envelope(&envelope) {
                    Ok(()) => {}
                    Err(ProjectionError::SequenceGap { last, found }) => {
                        tracing::warn!(
                            projection = projection.name(),
                            aggregate_id = %envelope.aggregate_id(),
                            last,
                            found,
                            "sequence gap; rebuilding projection"
                        );
                        self.rebuild(projection)?;
                    }
                    Err(e) => {
                        tracing::warn!(
                            projection = projection.name(),
                            event_type = envelope.event_type(),
                            error = %e,
                            "projection failed to apply event"
                        );
                        return Err(e.into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Throw every read model away and replay the full event log.
    pub fn rebuild_projections(&self) -> Result<(), AppError> {
        // Hold the subscription so no envelope is applied twice mid-rebuild.
        let subscription = self
            .subscription
            .lock()
            .map_err(|_| AppError::Internal("projection subscription lock poisoned".into()))?;
        subscription.drain();

        for projection in self.projections() {
            self.rebuild(projection)?;
        }
        Ok(())
    }

    fn rebuild(&self, projection: &dyn Projection) -> Result<(), AppError> {
        let envelopes: Vec<Envelope> = self
            .dispatcher
            .store()
            .load_all()?
            .iter()
            .map(|e| e.to_envelope())
            .collect();
        projection.rebuild_from_scratch(&envelopes)?;
        tracing::info!(
            projection = projection.name(),
            events = envelopes.len(),
            "projection rebuilt"
        );
        Ok(())
    }
}

impl Default for Storefront {
    fn default() -> Self {
        Self::new(StorefrontConfig::default())
    }
}

impl core::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Storefront")
            .field("config", &self.config)
            .field("subscribers", &self.dispatcher.bus().subscriber_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use storefront_cart::{CartCommand, CreateCart};
    use storefront_core::{AggregateRoot, UserId};

    use super::*;
    use crate::errors::ErrorKind;

    fn create(cart_id: CartId) -> CartCommand {
        CartCommand::CreateCart(CreateCart {
            cart_id,
            owner: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn rejected_commands_report_their_own_error_when_sync_fails() {
        let app = Storefront::default();
        let cart_id = CartId::new(AggregateId::new());
        app.execute::<Cart>(cart_id.0, create(cart_id)).unwrap();

        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = app.subscription.lock().unwrap();
                    panic!("poison the subscription");
                })
                .join();
        });

        let err = app.execute::<Cart>(cart_id.0, create(cart_id)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // A committed command still surfaces the read side failure.
        let other = CartId::new(AggregateId::new());
        let err = app.execute::<Cart>(other.0, create(other)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn stale_versions_are_rejected_before_anything_is_written() {
        let app = Storefront::default();
        let cart_id = CartId::new(AggregateId::new());
        let cart = app.execute::<Cart>(cart_id.0, create(cart_id)).unwrap();

        let err = app
            .execute_at::<Cart>(cart_id.0, cart.version() - 1, create(cart_id))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Concurrency);
        assert_eq!(app.load::<Cart>(cart_id.0).unwrap().version(), 1);
    }
}
