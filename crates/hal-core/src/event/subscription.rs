//! Subscriptions: a `(filter, subscriber)` pair owned by the event bus.

use std::sync::Weak;
use std::time::{SystemTime, UNIX_EPOCH};

use super::filter::Filter;
use super::Event;

/// Receives events matched by a [`Subscription`]'s filter.
///
/// Stored weakly by the bus; once every strong reference to a subscriber
/// is dropped, the subscription is pruned on the next dispatch pass.
pub trait EventSubscriber: Send + Sync {
    /// Invoked once per matching event.
    fn on_event(&self, event: &Event);
}

/// A `(filter, subscriber)` registration returned by
/// [`crate::event::EventBus::subscribe`].
pub struct Subscription {
    /// Unique, monotonically increasing identifier.
    pub id: u64,
    /// The match predicate.
    pub filter: Filter,
    /// Weak reference to the subscriber; pruned once it expires.
    pub subscriber: Weak<dyn EventSubscriber>,
    /// Whether matching events are delivered off the dispatch thread.
    pub wants_async: bool,
    /// Milliseconds since the Unix epoch when this subscription was
    /// created.
    pub created_at_ms: u64,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        filter: Filter,
        subscriber: Weak<dyn EventSubscriber>,
        wants_async: bool,
    ) -> Self {
        Self {
            id,
            filter,
            subscriber,
            wants_async,
            created_at_ms: now_ms(),
        }
    }

    /// Whether the referenced subscriber is still alive.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.subscriber.strong_count() > 0
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
