//! Event system for write resilience.
//!
//! Executors report what they decided (retry, give up, presume success) as
//! typed events. Anything that wants to observe those decisions, such as a
//! logger, a test probe, or a dashboard feed, registers an [`EventListener`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by a resilient writer.
pub trait DocstoreEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g., "Retry", "PresumedApplied").
    fn event_type(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;

    /// Returns the name of the writer instance that emitted this event.
    fn writer_name(&self) -> &str;
}

/// Trait for listening to writer events.
pub trait EventListener<E: DocstoreEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

impl<E, L> EventListener<E> for Arc<L>
where
    E: DocstoreEvent,
    L: EventListener<E> + ?Sized,
{
    fn on_event(&self, event: &E) {
        (**self).on_event(event)
    }
}

/// Type alias for boxed event listeners.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners.
#[derive(Clone)]
pub struct EventListeners<E: DocstoreEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: DocstoreEvent> EventListeners<E> {
    /// Creates a new empty event listener collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Adds a listener to the collection.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to all registered listeners.
    ///
    /// A panicking listener is contained; the remaining listeners still
    /// receive the event and the write itself is unaffected.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            #[cfg(feature = "tracing")]
            if outcome.is_err() {
                tracing::warn!(
                    writer = event.writer_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
            #[cfg(not(feature = "tracing"))]
            let _ = outcome;
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: DocstoreEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DocstoreEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// A simple function-based event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: DocstoreEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
