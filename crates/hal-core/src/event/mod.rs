//! Categorized, severity-tagged events with filter-based subscriptions,
//! a bounded queue, and synchronous/asynchronous dispatch.

mod filter;
mod queue;
mod subscription;
pub mod wire;

pub use filter::Filter;
pub use queue::{EventQueue, DEFAULT_CAPACITY};
pub use subscription::{EventSubscriber, Subscription};

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::sync::{self, Condvar, Mutex};

/// Broad origin classification for an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum EventCategory {
    /// Hardware state change (device attach/detach, fault).
    Hardware = 0,
    /// General system/lifecycle event.
    System = 1,
    /// Driver registration or state-transition event.
    Driver = 2,
    /// Resource budget/pressure event.
    Resource = 3,
    /// Networked collaborator event.
    Network = 4,
}

/// Severity tag, ordered `Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum EventSeverity {
    /// Informational; no action required.
    #[default]
    Info = 0,
    /// Noteworthy but not yet a problem.
    Warning = 1,
    /// An operation failed.
    Error = 2,
    /// The failure threatens the affected subsystem's availability.
    Critical = 3,
}

/// Payload carried by a [`EventCategory::Hardware`] event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareEventPayload {
    /// Device or peripheral identifier.
    pub device: &'static str,
    /// Free-form detail.
    pub detail: &'static str,
}

/// Payload carried by a general [`EventCategory::System`]-class event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemEventPayload {
    /// Subsystem name, e.g. `"resource_manager"`.
    pub subsystem: &'static str,
    /// Free-form detail.
    pub detail: &'static str,
}

/// Payload carried by a [`EventCategory::Driver`] event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverEventPayload {
    /// The interface the driver belongs to.
    pub interface: &'static str,
    /// The driver's own name.
    pub driver_name: &'static str,
    /// Free-form detail, e.g. `"unregistered"`.
    pub detail: &'static str,
}

/// Tagged union of structured event payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// Hardware-originated payload.
    Hardware(HardwareEventPayload),
    /// General system payload; also used for resource-pressure events.
    System(SystemEventPayload),
    /// Driver lifecycle payload.
    Driver(DriverEventPayload),
}

/// A single published event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Monotonically increasing identifier, unique per process.
    pub id: u64,
    /// Broad category, used by filters.
    pub category: EventCategory,
    /// Severity, used by filters.
    pub severity: EventSeverity,
    /// Producer identifier.
    pub source_id: &'static str,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Human-readable summary.
    pub description: String,
    /// Free-form key/value attributes, consulted by [`Filter`].
    pub attributes: HashMap<String, String>,
    /// Structured payload.
    pub payload: EventPayload,
}

/// Builder for a to-be-published event; `id` and `timestamp_ms` are
/// assigned by [`EventBus::publish`].
#[derive(Debug, Clone)]
pub struct EventDraft {
    /// Broad category, used by filters.
    pub category: EventCategory,
    /// Severity, used by filters.
    pub severity: EventSeverity,
    /// Producer identifier.
    pub source_id: &'static str,
    /// Human-readable summary.
    pub description: String,
    /// Free-form key/value attributes, consulted by [`Filter`].
    pub attributes: HashMap<String, String>,
    /// Structured payload.
    pub payload: EventPayload,
}

/// Point-in-time counters exposed by [`EventBus::stats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EventBusStats {
    /// Events successfully delivered to at least one matching subscriber.
    pub events_dispatched: u64,
    /// Events visited by dispatch but delivered to no subscriber.
    pub events_filtered: u64,
    /// Events dropped by the bounded queue on overflow.
    pub events_dropped: u64,
    /// Highest single synchronous dispatch duration observed, in
    /// milliseconds.
    pub peak_dispatch_time_ms: u64,
}

struct BusInner {
    queue: Mutex<EventQueue>,
    not_empty: Condvar,
    subscriptions: Mutex<Vec<Subscription>>,
    next_event_id: AtomicU64,
    next_subscription_id: AtomicU64,
    stats: Mutex<EventBusStats>,
    shutdown_requested: AtomicBool,
}

/// Categorized event bus: producers call [`EventBus::publish`], a single
/// dispatch thread routes matching events to subscribers.
pub struct EventBus {
    inner: Arc<BusInner>,
    dispatch_thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Starts a bus with the given bounded capacity and spawns its
    /// dispatch thread.
    #[must_use]
    pub fn start(capacity: usize) -> Self {
        let inner = Arc::new(BusInner {
            queue: Mutex::new(EventQueue::new(capacity)),
            not_empty: Condvar::new(),
            subscriptions: Mutex::new(Vec::new()),
            next_event_id: AtomicU64::new(1),
            next_subscription_id: AtomicU64::new(1),
            stats: Mutex::new(EventBusStats::default()),
            shutdown_requested: AtomicBool::new(false),
        });
        let thread_inner = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("hal-event-dispatch".to_owned())
            .spawn(move || dispatch_loop(&thread_inner))
            .expect("failed to spawn event dispatch thread");
        Self {
            inner,
            dispatch_thread: Mutex::new(Some(handle)),
        }
    }

    /// Starts a bus with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::start(DEFAULT_CAPACITY)
    }

    /// Enqueues `draft` for dispatch, assigning it a monotonic id and
    /// current timestamp. Returns the assigned event id. Does nothing
    /// (and returns `None`) once [`EventBus::shutdown`] has been called.
    pub fn publish(&self, draft: EventDraft) -> Option<u64> {
        if self.inner.shutdown_requested.load(Ordering::Acquire) {
            return None;
        }
        let id = self.inner.next_event_id.fetch_add(1, Ordering::AcqRel);
        let event = Event {
            id,
            category: draft.category,
            severity: draft.severity,
            source_id: draft.source_id,
            timestamp_ms: subscription::now_ms(),
            description: draft.description,
            attributes: draft.attributes,
            payload: draft.payload,
        };
        {
            let mut queue = sync::lock(&self.inner.queue);
            let dropped_before = queue.events_dropped;
            queue.push(event);
            if queue.events_dropped != dropped_before {
                let mut stats = sync::lock(&self.inner.stats);
                stats.events_dropped = queue.events_dropped;
            }
        }
        self.inner.not_empty.notify_one();
        Some(id)
    }

    /// Registers a weakly-held subscriber behind `filter`. Returns the
    /// subscription id, later passed to [`EventBus::unsubscribe`].
    pub fn subscribe(
        &self,
        filter: Filter,
        subscriber: Weak<dyn EventSubscriber>,
        wants_async: bool,
    ) -> u64 {
        let id = self
            .inner
            .next_subscription_id
            .fetch_add(1, Ordering::AcqRel);
        let subscription = Subscription::new(id, filter, subscriber, wants_async);
        sync::lock(&self.inner.subscriptions).push(subscription);
        id
    }

    /// Removes a previously registered subscription. A no-op if `id` is
    /// unknown or already removed.
    pub fn unsubscribe(&self, id: u64) {
        sync::lock(&self.inner.subscriptions).retain(|sub| sub.id != id);
    }

    /// Snapshot of the bus's dispatch counters.
    #[must_use]
    pub fn stats(&self) -> EventBusStats {
        *sync::lock(&self.inner.stats)
    }

    /// Number of live subscriptions (weak references not yet expired are
    /// not pruned until the next dispatch pass, so this may briefly
    /// overcount).
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        sync::lock(&self.inner.subscriptions).len()
    }

    /// Requests shutdown, wakes the dispatch thread, drains residual
    /// events in a single pass, then joins. No new events are accepted
    /// after this returns.
    pub fn shutdown(&self) {
        self.inner.shutdown_requested.store(true, Ordering::Release);
        self.inner.not_empty.notify_all();
        if let Some(handle) = sync::lock(&self.dispatch_thread).take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch_loop(inner: &Arc<BusInner>) {
    loop {
        let event = {
            let mut queue = sync::lock(&inner.queue);
            loop {
                if let Some(event) = queue.pop() {
                    break Some(event);
                }
                if inner.shutdown_requested.load(Ordering::Acquire) {
                    break None;
                }
                let (guard, _timed_out) =
                    sync::wait_timeout(&inner.not_empty, queue, Duration::from_millis(200));
                queue = guard;
            }
        };
        let Some(event) = event else {
            // Shutdown requested and queue observed empty: drain once
            // more in case a publish raced the flag, then stop.
            let mut queue = sync::lock(&inner.queue);
            if let Some(event) = queue.pop() {
                drop(queue);
                dispatch_event(inner, &event);
            }
            return;
        };
        dispatch_event(inner, &event);
    }
}

fn dispatch_event(inner: &Arc<BusInner>, event: &Event) {
    let started = std::time::Instant::now();
    let mut delivered = false;
    let mut dead_ids = Vec::new();

    let snapshot: Vec<(u64, Filter, Weak<dyn EventSubscriber>, bool)> = {
        let subs = sync::lock(&inner.subscriptions);
        subs.iter()
            .map(|sub| (sub.id, sub.filter.clone(), Weak::clone(&sub.subscriber), sub.wants_async))
            .collect()
    };

    for (id, filter, subscriber, wants_async) in snapshot {
        let Some(subscriber) = subscriber.upgrade() else {
            dead_ids.push(id);
            continue;
        };
        if !filter.matches(event) {
            continue;
        }
        delivered = true;
        if wants_async {
            let event = event.clone();
            let _ = std::thread::Builder::new().spawn(move || {
                let _ = catch_unwind(AssertUnwindSafe(|| subscriber.on_event(&event)));
            });
        } else {
            let _ = catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event)));
        }
    }

    if !dead_ids.is_empty() {
        sync::lock(&inner.subscriptions).retain(|sub| !dead_ids.contains(&sub.id));
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let mut stats = sync::lock(&inner.stats);
    if delivered {
        stats.events_dispatched += 1;
    } else {
        stats.events_filtered += 1;
    }
    stats.peak_dispatch_time_ms = stats.peak_dispatch_time_ms.max(elapsed_ms);
}

#[cfg(test)]
mod tests {
    use super::{Event, EventBus, EventCategory, EventDraft, EventPayload, EventSeverity, EventSubscriber, Filter, SystemEventPayload};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingSubscriber {
        count: AtomicUsize,
    }

    impl EventSubscriber for CountingSubscriber {
        fn on_event(&self, _event: &Event) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn draft(category: EventCategory, severity: EventSeverity) -> EventDraft {
        EventDraft {
            category,
            severity,
            source_id: "test",
            description: "desc".to_owned(),
            attributes: std::collections::HashMap::new(),
            payload: EventPayload::System(SystemEventPayload {
                subsystem: "test",
                detail: "",
            }),
        }
    }

    #[test]
    fn event_ids_are_monotonic_for_one_producer() {
        let bus = EventBus::with_defaults();
        let first = bus.publish(draft(EventCategory::System, EventSeverity::Info)).unwrap();
        let second = bus.publish(draft(EventCategory::System, EventSeverity::Info)).unwrap();
        assert!(second > first);
        bus.shutdown();
    }

    #[test]
    fn subscription_filters_by_category_and_severity() {
        let bus = EventBus::with_defaults();
        let subscriber = Arc::new(CountingSubscriber {
            count: AtomicUsize::new(0),
        });
        let mut filter = Filter::everything();
        filter.categories.insert(EventCategory::Hardware);
        filter.min_severity = EventSeverity::Warning;
        bus.subscribe(filter, Arc::downgrade(&(subscriber.clone() as Arc<dyn EventSubscriber>)), false);

        bus.publish(draft(EventCategory::Hardware, EventSeverity::Info));
        bus.publish(draft(EventCategory::Hardware, EventSeverity::Warning));
        bus.publish(draft(EventCategory::System, EventSeverity::Error));
        bus.publish(draft(EventCategory::Hardware, EventSeverity::Critical));

        std::thread::sleep(Duration::from_millis(100));
        bus.shutdown();

        assert_eq!(subscriber.count.load(Ordering::SeqCst), 2);
        let stats = bus.stats();
        assert_eq!(stats.events_dispatched, 2);
        assert_eq!(stats.events_filtered, 2);
    }

    #[test]
    fn dead_subscribers_are_pruned() {
        let bus = EventBus::with_defaults();
        {
            let subscriber: Arc<dyn EventSubscriber> = Arc::new(CountingSubscriber {
                count: AtomicUsize::new(0),
            });
            bus.subscribe(Filter::everything(), Arc::downgrade(&subscriber), false);
        }
        bus.publish(draft(EventCategory::System, EventSeverity::Info));
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(bus.subscription_count(), 0);
        bus.shutdown();
    }
}
