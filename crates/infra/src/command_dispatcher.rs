//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate stream from the store
//!   ↓
//! 2. Rehydrate (apply history in sequence order)
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Publish committed events on the bus
//! ```
//!
//! Two writers racing on the same aggregate both load version `n`; the
//! second append fails with [`DispatchError::Concurrency`] and nothing is
//! published for it.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use storefront_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use storefront_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The stream moved between load and append.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    /// A stored payload no longer matches the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    /// The store returned a stream that breaks its own ordering guarantees.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    #[error(transparent)]
    Store(EventStoreError),

    /// Events are committed but at least one subscriber missed them.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                DispatchError::Validation(msg)
            }
            DomainError::InvalidState(msg) => DispatchError::InvalidState(msg),
            DomainError::NotFound(what) => DispatchError::NotFound(what),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
        }
    }
}

/// Outcome of a successful dispatch.
#[derive(Debug)]
pub struct Dispatched<A> {
    /// The aggregate with the newly committed events applied.
    pub aggregate: A,
    /// Committed events, empty when the command was a no-op.
    pub committed: Vec<StoredEvent>,
}

/// Reusable command execution engine, generic over store and bus.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `command` against the aggregate stored under `aggregate_id`.
    ///
    /// `make_aggregate` builds the empty instance that history is replayed into.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        self.dispatch_at(
            aggregate_id,
            aggregate_type,
            ExpectedVersion::Any,
            command,
            make_aggregate,
        )
    }

    /// Like [`dispatch`](Self::dispatch), but only if the stream is still at
    /// `required`, the version the caller decided on.
    ///
    /// The append always checks the loaded version; `required` additionally
    /// pins that version to an earlier read.
    pub fn dispatch_at<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        required: ExpectedVersion,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let loaded = stream_version(&history);
        if !required.matches(loaded) {
            return Err(DispatchError::Concurrency(format!(
                "expected {required:?}, found {loaded}"
            )));
        }
        let expected = ExpectedVersion::Exact(loaded);

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            tracing::debug!(%aggregate_id, aggregate_type, "command produced no events");
            return Ok(Dispatched {
                aggregate,
                committed: vec![],
            });
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        aggregate.replay(&decided);

        tracing::debug!(
            %aggregate_id,
            aggregate_type,
            events = committed.len(),
            version = stream_version(&committed),
            "events committed"
        );

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(Dispatched {
            aggregate,
            committed,
        })
    }

    /// Rehydrate an aggregate without running a command.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::CorruptStream(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::CorruptStream(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use storefront_cart::{Cart, CartCommand, CartId, CreateCart};
    use storefront_core::{AggregateRoot, UserId};
    use storefront_events::InMemoryEventBus;

    use super::*;
    use crate::event_store::InMemoryEventStore;

    type Dispatcher =
        CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> Dispatcher {
        CommandDispatcher::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
        )
    }

    fn create_cart(cart_id: CartId) -> CartCommand {
        CartCommand::CreateCart(CreateCart {
            cart_id,
            owner: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn make_cart(id: AggregateId) -> Cart {
        Cart::empty(CartId::new(id))
    }

    #[test]
    fn dispatch_commits_publishes_and_returns_the_new_state() {
        let dispatcher = dispatcher();
        let sub = dispatcher.bus().subscribe();
        let id = AggregateId::new();

        let out = dispatcher
            .dispatch(id, Cart::AGGREGATE_TYPE, create_cart(CartId::new(id)), make_cart)
            .unwrap();

        assert_eq!(out.committed.len(), 1);
        assert_eq!(out.aggregate.version(), 1);
        assert!(out.aggregate.is_created());

        let published = sub.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_type(), "cart.created");
        assert_eq!(published[0].sequence_number(), 1);
    }

    #[test]
    fn rejected_command_publishes_nothing() {
        let dispatcher = dispatcher();
        let id = AggregateId::new();
        dispatcher
            .dispatch(id, Cart::AGGREGATE_TYPE, create_cart(CartId::new(id)), make_cart)
            .unwrap();
        let sub = dispatcher.bus().subscribe();

        let err = dispatcher
            .dispatch(id, Cart::AGGREGATE_TYPE, create_cart(CartId::new(id)), make_cart)
            .unwrap_err();

        assert!(matches!(err, DispatchError::Conflict(_)));
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn load_rehydrates_from_the_stream() {
        let dispatcher = dispatcher();
        let id = AggregateId::new();
        dispatcher
            .dispatch(id, Cart::AGGREGATE_TYPE, create_cart(CartId::new(id)), make_cart)
            .unwrap();

        let cart = dispatcher.load(id, make_cart).unwrap();
        assert!(cart.is_created());
        assert_eq!(cart.version(), 1);
    }

    #[test]
    fn dispatch_at_rejects_a_stream_that_moved() {
        let dispatcher = dispatcher();
        let id = AggregateId::new();
        dispatcher
            .dispatch(id, Cart::AGGREGATE_TYPE, create_cart(CartId::new(id)), make_cart)
            .unwrap();
        let sub = dispatcher.bus().subscribe();

        let err = dispatcher
            .dispatch_at(
                id,
                Cart::AGGREGATE_TYPE,
                ExpectedVersion::Exact(0),
                create_cart(CartId::new(id)),
                make_cart,
            )
            .unwrap_err();

        assert!(matches!(err, DispatchError::Concurrency(_)));
        assert!(sub.drain().is_empty());
        assert_eq!(dispatcher.load(id, make_cart).unwrap().version(), 1);
    }

    #[test]
    fn store_concurrency_error_maps_to_dispatch_concurrency() {
        let err = DispatchError::from(EventStoreError::Concurrency("expected 1".into()));
        assert!(matches!(err, DispatchError::Concurrency(_)));
    }
}
