use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Course label used when upstream omits one.
pub const UNKNOWN_COURSE: &str = "Unknown Course";

/// A normalized upstream assignment. Only records with both an id and a due
/// time make it this far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    pub name: String,
    pub course_name: String,
    pub due_at: DateTime<Utc>,
    pub url: String,
}

impl Assignment {
    /// `"{course_name}: {name}"`, shown when no custom name is set.
    pub fn default_display_name(&self) -> String {
        format!("{}: {}", self.course_name, self.name)
    }
}

/// Ascending by due time, ties broken by id.
pub fn by_due_then_id(a: &Assignment, b: &Assignment) -> Ordering {
    a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id))
}

/// Lead-time windows that trigger a reminder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Threshold {
    OneHour,
    HalfHour,
}

impl Threshold {
    pub const ALL: [Threshold; 2] = [Threshold::OneHour, Threshold::HalfHour];

    pub fn as_str(&self) -> &'static str {
        match self {
            Threshold::OneHour => "60",
            Threshold::HalfHour => "30",
        }
    }

    /// Inclusive range of whole minutes-until-due in which this threshold fires.
    pub fn window(&self) -> (i64, i64) {
        match self {
            Threshold::OneHour => (55, 65),
            Threshold::HalfHour => (25, 35),
        }
    }

    pub fn contains(&self, minutes_until_due: i64) -> bool {
        let (lo, hi) = self.window();
        (lo..=hi).contains(&minutes_until_due)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Threshold::OneHour => "Assignment Due in 1 Hour",
            Threshold::HalfHour => "Assignment Due in 30 Minutes",
        }
    }
}

/// Reminder handed to a notifier sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationEvent {
    pub title: String,
    pub body: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn assignment(id: &str, due_min: i64) -> Assignment {
        Assignment {
            id: id.into(),
            name: "Essay".into(),
            course_name: "HIST 101".into(),
            due_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(due_min),
            url: "https://canvas.example.edu/a".into(),
        }
    }

    #[test]
    fn default_display_name_joins_course_and_name() {
        assert_eq!(assignment("1", 0).default_display_name(), "HIST 101: Essay");
    }

    #[test]
    fn ordering_breaks_ties_by_id() {
        let mut list = vec![assignment("b", 5), assignment("a", 5), assignment("c", 1)];
        list.sort_by(by_due_then_id);
        let ids: Vec<_> = list.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn threshold_windows_are_inclusive() {
        assert!(Threshold::OneHour.contains(55));
        assert!(Threshold::OneHour.contains(65));
        assert!(!Threshold::OneHour.contains(66));
        assert!(!Threshold::OneHour.contains(54));
        assert!(Threshold::HalfHour.contains(25));
        assert!(Threshold::HalfHour.contains(35));
        assert!(!Threshold::HalfHour.contains(36));
    }
}
