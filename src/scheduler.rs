//! At-most-once reminder scheduling over the lead-time thresholds.
//!
//! A tick is split in two: [`NotificationScheduler::pending`] lists reminders
//! that are due and not yet delivered, and [`NotificationScheduler::mark_fired`]
//! records a reminder only after the sink has accepted it. A failed hand-off
//! therefore leaves the key pending for the next tick inside the same window.
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::model::{Assignment, NotificationEvent, Threshold};
use crate::registry::AssignmentRegistry;

/// Identity of one reminder. The due time is part of the key so that an
/// upstream due-date change re-arms both thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationKey {
    pub assignment_id: String,
    pub threshold: Threshold,
    pub due_at: DateTime<Utc>,
}

impl NotificationKey {
    pub fn new(assignment: &Assignment, threshold: Threshold) -> Self {
        Self {
            assignment_id: assignment.id.clone(),
            threshold,
            due_at: assignment.due_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub key: NotificationKey,
    pub event: NotificationEvent,
}

#[derive(Debug, Default)]
pub struct NotificationScheduler {
    fired: HashSet<NotificationKey>,
    include_dismissed: bool,
}

/// Whole minutes until `due_at`, truncated toward zero.
pub fn minutes_until_due(now: DateTime<Utc>, due_at: DateTime<Utc>) -> i64 {
    (due_at - now).num_minutes()
}

impl NotificationScheduler {
    pub fn new(include_dismissed: bool) -> Self {
        Self {
            fired: HashSet::new(),
            include_dismissed,
        }
    }

    pub fn include_dismissed(&self) -> bool {
        self.include_dismissed
    }

    /// Reminders whose window contains `now` and that have not fired yet.
    pub fn pending(
        &self,
        now: DateTime<Utc>,
        registry: &AssignmentRegistry,
    ) -> Vec<PendingNotification> {
        let candidates = if self.include_dismissed {
            registry.all()
        } else {
            registry.active_view()
        };

        let mut out = Vec::new();
        for assignment in candidates {
            let minutes = minutes_until_due(now, assignment.due_at);
            for threshold in Threshold::ALL {
                if !threshold.contains(minutes) {
                    continue;
                }
                let key = NotificationKey::new(assignment, threshold);
                if self.fired.contains(&key) {
                    continue;
                }
                out.push(PendingNotification {
                    key,
                    event: NotificationEvent {
                        title: threshold.title().to_string(),
                        body: registry.display_name(assignment),
                        url: assignment.url.clone(),
                    },
                });
            }
        }
        out
    }

    /// Record a delivered reminder. Returns false if it had already fired.
    pub fn mark_fired(&mut self, key: NotificationKey) -> bool {
        self.fired.insert(key)
    }

    pub fn is_fired(&self, key: &NotificationKey) -> bool {
        self.fired.contains(key)
    }

    pub fn fired_count(&self) -> usize {
        self.fired.len()
    }
}
