use std::collections::HashMap;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use storefront_core::AggregateId;
use storefront_events::EventEnvelope;

use super::ProjectionError;

/// Last applied sequence number per aggregate stream.
#[derive(Debug, Default)]
pub struct StreamCursors {
    last: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, aggregate_id: AggregateId) -> Result<u64, ProjectionError> {
        let cursors = self
            .last
            .read()
            .map_err(|_| ProjectionError::Poisoned("stream cursors"))?;
        Ok(cursors.get(&aggregate_id).copied().unwrap_or(0))
    }

    /// `Ok(true)` if the envelope is the next one in its stream, `Ok(false)`
    /// if it was already applied.
    pub fn admit<E>(&self, envelope: &EventEnvelope<E>) -> Result<bool, ProjectionError> {
        let last = self.last(envelope.aggregate_id())?;
        let found = envelope.sequence_number();
        if found != 0 && found <= last {
            return Ok(false);
        }
        if found != last + 1 {
            return Err(ProjectionError::SequenceGap { last, found });
        }
        Ok(true)
    }

    pub fn advance(&self, aggregate_id: AggregateId, sequence_number: u64) -> Result<(), ProjectionError> {
        self.last
            .write()
            .map_err(|_| ProjectionError::Poisoned("stream cursors"))?
            .insert(aggregate_id, sequence_number);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ProjectionError> {
        self.last
            .write()
            .map_err(|_| ProjectionError::Poisoned("stream cursors"))?
            .clear();
        Ok(())
    }
}

pub fn decode<E: DeserializeOwned>(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize {
        aggregate_type: envelope.aggregate_type().to_string(),
        message: e.to_string(),
    })
}

pub fn ensure_same_stream(
    envelope: &EventEnvelope<JsonValue>,
    event_aggregate: AggregateId,
) -> Result<(), ProjectionError> {
    if envelope.aggregate_id() != event_aggregate {
        return Err(ProjectionError::StreamMismatch(format!(
            "{} event for {event_aggregate} arrived on stream {}",
            envelope.aggregate_type(),
            envelope.aggregate_id()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn envelope(aggregate_id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            aggregate_id,
            "cart",
            seq,
            "cart.created",
            Utc::now(),
            JsonValue::Null,
        )
    }

    #[test]
    fn duplicates_are_skipped_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.admit(&envelope(id, 1)).unwrap());
        cursors.advance(id, 1).unwrap();

        assert!(!cursors.admit(&envelope(id, 1)).unwrap());
        assert_eq!(
            cursors.admit(&envelope(id, 3)).unwrap_err(),
            ProjectionError::SequenceGap { last: 1, found: 3 }
        );
    }

    #[test]
    fn poisoned_cursors_are_reported() {
        let cursors = std::sync::Arc::new(StreamCursors::new());
        let poisoner = std::sync::Arc::clone(&cursors);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.last.write().unwrap();
            panic!("poison the cursor lock");
        })
        .join();

        let id = AggregateId::new();
        assert_eq!(
            cursors.advance(id, 1).unwrap_err(),
            ProjectionError::Poisoned("stream cursors")
        );
        assert!(cursors.admit(&envelope(id, 1)).is_err());
        assert!(cursors.clear().is_err());
    }

    #[test]
    fn sequence_zero_is_never_admitted() {
        let cursors = StreamCursors::new();
        assert!(cursors.admit(&envelope(AggregateId::new(), 0)).is_err());
    }
}
