//! In-process event bus keyed by event name.
//!
//! # Guarantees
//!
//! - **Ordered**: handlers run one at a time, in registration order
//! - **Short-circuit**: the first handler error stops delivery and is returned
//!   to the publisher
//! - **Snapshot delivery**: handlers subscribed while a publish is in flight
//!   only see later events
//! - **In-memory only**: no retry, no persistence, no cross-process fan-out

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use futures::future::BoxFuture;

/// A named, immutable domain event.
pub trait Event: Any + Clone + Debug + Send + Sync + 'static {
    /// Stable name handlers subscribe to.
    const NAME: &'static str;
}

/// Type-erased event as delivered to handlers.
#[derive(Clone)]
pub struct EventEnvelope {
    pub name: &'static str,
    pub payload: Arc<dyn Any + Send + Sync>,
}

impl EventEnvelope {
    pub fn new<E: Event>(event: E) -> Self {
        Self {
            name: E::NAME,
            payload: Arc::new(event),
        }
    }

    /// Downcast the payload to a concrete event type.
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref()
    }
}

impl Debug for EventEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEnvelope")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

type Handler = Arc<dyn Fn(EventEnvelope) -> BoxFuture<'static, Result<()>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<Handler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw handler for `name`.
    pub fn subscribe<F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |envelope| -> BoxFuture<'static, Result<()>> { Box::pin(handler(envelope)) });
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .push(handler);
    }

    /// Append a typed handler for `E`.
    ///
    /// Envelopes published under `E::NAME` with a different payload type are
    /// skipped rather than treated as errors.
    pub fn on<E, F, Fut>(&self, handler: F)
    where
        E: Event,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.subscribe(E::NAME, move |envelope| {
            let handler = handler.clone();
            let event = envelope.downcast_ref::<E>().cloned();
            async move {
                match event {
                    Some(event) => handler(event).await,
                    None => {
                        tracing::warn!(event = E::NAME, "Event payload type mismatch, skipping");
                        Ok(())
                    }
                }
            }
        });
    }

    /// Deliver `event` to every handler registered for its name.
    pub async fn publish<E: Event>(&self, event: E) -> Result<()> {
        self.publish_envelope(EventEnvelope::new(event)).await
    }

    pub async fn publish_envelope(&self, envelope: EventEnvelope) -> Result<()> {
        let snapshot: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(envelope.name)
            .cloned()
            .unwrap_or_default();

        tracing::debug!(
            event = envelope.name,
            handlers = snapshot.len(),
            "Publishing event"
        );

        for handler in snapshot {
            handler(envelope.clone()).await?;
        }
        Ok(())
    }

    /// Number of handlers registered for `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map_or(0, Vec::len)
    }
}

impl Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("EventBus").field("events", &names).finish()
    }
}
