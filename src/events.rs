//! Events emitted by rate limiters and registries.
//!
//! Every acquisition outcome and registry mutation is described by an
//! immutable, ephemeral event. Events flow through [`crate::sinks::EventSink`]
//! implementations which can log, buffer, or forward them to external systems.
//! Delivery is best-effort observability: permit accounting never depends on
//! an event reaching a sink.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::limiter::FixedWindowLimiter;

/// The kind of an event, used for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A permit request was granted.
    Acquired,
    /// A permit request timed out.
    Rejected,
    /// A limiter was added to a registry.
    Added,
    /// A limiter was removed from a registry.
    Removed,
    /// A registry entry was swapped for another limiter.
    Replaced,
}

/// Outcome of a permit acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    /// The requested permits were debited.
    Acquired,
    /// The request timed out without a debit.
    Rejected,
}

/// Event describing one acquisition attempt against a limiter.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionEvent {
    /// Whether the permits were granted.
    pub outcome: AcquisitionOutcome,
    /// Name of the limiter the attempt ran against.
    pub limiter_name: String,
    /// Wall-clock time the event was created.
    pub created_at: SystemTime,
    /// Number of permits requested.
    pub permits: u32,
}

/// Event describing a registry mutation.
///
/// Entries are shared handles to the affected limiters; equality compares
/// handle identity, not limiter state.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A limiter was registered under a new name.
    Added {
        /// The limiter that was added.
        entry: Arc<FixedWindowLimiter>,
    },
    /// A limiter was removed.
    Removed {
        /// The limiter that was removed.
        entry: Arc<FixedWindowLimiter>,
    },
    /// A registered limiter was swapped for another.
    Replaced {
        /// The limiter previously registered under the key.
        old_entry: Arc<FixedWindowLimiter>,
        /// The limiter now registered under the key.
        new_entry: Arc<FixedWindowLimiter>,
    },
}

impl PartialEq for RegistryEvent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Added { entry: a }, Self::Added { entry: b }) => Arc::ptr_eq(a, b),
            (Self::Removed { entry: a }, Self::Removed { entry: b }) => Arc::ptr_eq(a, b),
            (
                Self::Replaced { old_entry: a_old, new_entry: a_new },
                Self::Replaced { old_entry: b_old, new_entry: b_new },
            ) => Arc::ptr_eq(a_old, b_old) && Arc::ptr_eq(a_new, b_new),
            _ => false,
        }
    }
}

/// Any event a limiter or registry can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimiterEvent {
    /// Acquisition outcome on a limiter.
    Acquisition(AcquisitionEvent),
    /// Registry mutation.
    Registry(RegistryEvent),
}

impl RateLimiterEvent {
    /// The kind of this event, for filtering.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Acquisition(event) => match event.outcome {
                AcquisitionOutcome::Acquired => EventKind::Acquired,
                AcquisitionOutcome::Rejected => EventKind::Rejected,
            },
            Self::Registry(RegistryEvent::Added { .. }) => EventKind::Added,
            Self::Registry(RegistryEvent::Removed { .. }) => EventKind::Removed,
            Self::Registry(RegistryEvent::Replaced { .. }) => EventKind::Replaced,
        }
    }
}

impl fmt::Display for RateLimiterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acquisition(event) => write!(f, "Acquisition::{}", event),
            Self::Registry(event) => write!(f, "Registry::{}", event),
        }
    }
}

impl fmt::Display for AcquisitionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.outcome {
            AcquisitionOutcome::Acquired => "Acquired",
            AcquisitionOutcome::Rejected => "Rejected",
        };
        write!(f, "{}(limiter={}, permits={})", outcome, self.limiter_name, self.permits)
    }
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { entry } => write!(f, "Added(name={})", entry.name()),
            Self::Removed { entry } => write!(f, "Removed(name={})", entry.name()),
            Self::Replaced { old_entry, new_entry } => {
                write!(f, "Replaced(old={}, new={})", old_entry.name(), new_entry.name())
            }
        }
    }
}

/// Subscription filter over [`EventKind`]s.
///
/// An empty filter matches everything. When an inclusion set is present it
/// wins: the exclusion set is ignored.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    only: HashSet<EventKind>,
    exclude: HashSet<EventKind>,
}

impl EventFilter {
    /// Match every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match only the given kinds.
    pub fn only(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self { only: kinds.into_iter().collect(), exclude: HashSet::new() }
    }

    /// Match everything except the given kinds.
    pub fn excluding(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self { only: HashSet::new(), exclude: kinds.into_iter().collect() }
    }

    /// Whether an event of `kind` passes this filter.
    pub fn matches(&self, kind: EventKind) -> bool {
        if !self.only.is_empty() {
            return self.only.contains(&kind);
        }
        !self.exclude.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimiterConfig;

    fn limiter(name: &str) -> Arc<FixedWindowLimiter> {
        Arc::new(FixedWindowLimiter::new(name, RateLimiterConfig::default()))
    }

    #[test]
    fn acquisition_event_display() {
        let event = AcquisitionEvent {
            outcome: AcquisitionOutcome::Acquired,
            limiter_name: "api".into(),
            created_at: SystemTime::now(),
            permits: 3,
        };
        let rendered = event.to_string();
        assert!(rendered.contains("Acquired"));
        assert!(rendered.contains("api"));
        assert!(rendered.contains("3"));
    }

    #[test]
    fn registry_event_display_names_entries() {
        let old = limiter("old");
        let new = limiter("new");
        let event = RegistryEvent::Replaced { old_entry: old, new_entry: new };
        let rendered = event.to_string();
        assert!(rendered.contains("old"));
        assert!(rendered.contains("new"));
    }

    #[test]
    fn event_kinds_cover_all_variants() {
        let entry = limiter("x");
        let added = RateLimiterEvent::Registry(RegistryEvent::Added { entry: entry.clone() });
        let removed = RateLimiterEvent::Registry(RegistryEvent::Removed { entry: entry.clone() });
        let replaced = RateLimiterEvent::Registry(RegistryEvent::Replaced {
            old_entry: entry.clone(),
            new_entry: entry,
        });
        assert_eq!(added.kind(), EventKind::Added);
        assert_eq!(removed.kind(), EventKind::Removed);
        assert_eq!(replaced.kind(), EventKind::Replaced);
    }

    #[test]
    fn registry_event_equality_is_by_handle() {
        let a = limiter("same-name");
        let b = limiter("same-name");
        let on_a = RegistryEvent::Added { entry: a.clone() };
        let also_a = RegistryEvent::Added { entry: a };
        let on_b = RegistryEvent::Added { entry: b };
        assert_eq!(on_a, also_a);
        assert_ne!(on_a, on_b);
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = EventFilter::all();
        assert!(filter.matches(EventKind::Acquired));
        assert!(filter.matches(EventKind::Replaced));
    }

    #[test]
    fn only_filter_matches_listed_kinds() {
        let filter = EventFilter::only([EventKind::Added]);
        assert!(filter.matches(EventKind::Added));
        assert!(!filter.matches(EventKind::Removed));
        assert!(!filter.matches(EventKind::Acquired));
    }

    #[test]
    fn excluding_filter_matches_everything_else() {
        let filter = EventFilter::excluding([EventKind::Added]);
        assert!(!filter.matches(EventKind::Added));
        assert!(filter.matches(EventKind::Removed));
        assert!(filter.matches(EventKind::Rejected));
    }

    #[test]
    fn inclusion_wins_when_both_sets_are_given() {
        let filter = EventFilter {
            only: [EventKind::Added].into_iter().collect(),
            exclude: [EventKind::Added, EventKind::Removed].into_iter().collect(),
        };
        assert!(filter.matches(EventKind::Added));
        assert!(!filter.matches(EventKind::Removed));
    }
}
