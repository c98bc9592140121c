//! Subscription filters.

use std::collections::{HashMap, HashSet};

use super::{Event, EventCategory, EventSeverity};

/// Predicate describing which events a subscription wants to receive.
///
/// An empty filter (all sets empty, `min_severity = Info`) matches every
/// event.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Accepted categories; empty means "any category".
    pub categories: HashSet<EventCategory>,
    /// Minimum severity, inclusive.
    pub min_severity: EventSeverity,
    /// Accepted source ids; empty means "any source".
    pub sources: HashSet<&'static str>,
    /// Required attribute key/value pairs; an event must carry all of
    /// them (with matching values) to pass. Empty means no constraint.
    pub attributes: HashMap<String, String>,
}

impl Filter {
    /// A filter that matches every event.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Returns `true` if `event` satisfies this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&event.category) {
            return false;
        }
        if event.severity < self.min_severity {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.contains(event.source_id) {
            return false;
        }
        self.attributes
            .iter()
            .all(|(key, value)| event.attributes.get(key) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::Filter;
    use crate::event::{Event, EventCategory, EventPayload, EventSeverity, SystemEventPayload};

    fn sample(category: EventCategory, severity: EventSeverity) -> Event {
        Event {
            id: 1,
            category,
            severity,
            source_id: "test",
            timestamp_ms: 0,
            description: "desc".to_owned(),
            attributes: std::collections::HashMap::new(),
            payload: EventPayload::System(SystemEventPayload {
                subsystem: "test",
                detail: "detail",
            }),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = Filter::everything();
        assert!(filter.matches(&sample(EventCategory::Hardware, EventSeverity::Info)));
        assert!(filter.matches(&sample(EventCategory::Driver, EventSeverity::Critical)));
    }

    #[test]
    fn category_and_severity_constraints_apply() {
        let mut filter = Filter::everything();
        filter.categories.insert(EventCategory::Hardware);
        filter.min_severity = EventSeverity::Warning;

        assert!(!filter.matches(&sample(EventCategory::Hardware, EventSeverity::Info)));
        assert!(filter.matches(&sample(EventCategory::Hardware, EventSeverity::Warning)));
        assert!(!filter.matches(&sample(EventCategory::System, EventSeverity::Critical)));
        assert!(filter.matches(&sample(EventCategory::Hardware, EventSeverity::Critical)));
    }
}
