use crate::model::Assignment;

/// Cycles the "currently shown" assignment over the active view.
///
/// The controller keeps only an index; every read projects it onto the live
/// view it is handed, so a dismissed assignment is never served from a cache.
#[derive(Debug, Default, Clone)]
pub struct RotationController {
    index: usize,
}

impl RotationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Advance to the next assignment. No-op with fewer than two entries.
    pub fn tick(&mut self, active: &[Assignment]) {
        if active.len() <= 1 {
            return;
        }
        self.index = (self.index + 1) % active.len();
    }

    /// Assignment to show now; resets a stale index to the first entry.
    pub fn current<'a>(&mut self, active: &'a [Assignment]) -> Option<&'a Assignment> {
        self.clamp(active.len());
        active.get(self.index)
    }

    fn clamp(&mut self, len: usize) {
        if self.index >= len {
            self.index = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn list(n: usize) -> Vec<Assignment> {
        (0..n)
            .map(|i| Assignment {
                id: i.to_string(),
                name: format!("A{}", i),
                course_name: "PHYS 1".into(),
                due_at: Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap()
                    + Duration::hours(i as i64),
                url: String::new(),
            })
            .collect()
    }

    fn current_id(rot: &mut RotationController, active: &[Assignment]) -> Option<String> {
        rot.current(active).map(|a| a.id.clone())
    }

    #[test]
    fn n_ticks_return_to_start() {
        let active = list(4);
        let mut rot = RotationController::new();
        let start = current_id(&mut rot, &active);
        assert_eq!(start.as_deref(), Some("0"));
        for step in 1..4 {
            rot.tick(&active);
            assert_eq!(current_id(&mut rot, &active), Some(step.to_string()));
        }
        rot.tick(&active);
        assert_eq!(current_id(&mut rot, &active), start);
    }

    #[test]
    fn tick_is_noop_for_small_views() {
        let mut rot = RotationController::new();
        rot.tick(&[]);
        assert_eq!(current_id(&mut rot, &[]), None);

        let one = list(1);
        rot.tick(&one);
        rot.tick(&one);
        assert_eq!(current_id(&mut rot, &one).as_deref(), Some("0"));
    }

    #[test]
    fn shrinking_view_clamps_on_read() {
        let active = list(5);
        let mut rot = RotationController::new();
        for _ in 0..4 {
            rot.tick(&active);
        }
        assert_eq!(rot.index(), 4);

        let shrunk = list(2);
        assert_eq!(current_id(&mut rot, &shrunk).as_deref(), Some("0"));
        assert_eq!(rot.index(), 0);
    }

    #[test]
    fn tick_over_shrunk_view_wraps_stale_index() {
        let mut rot = RotationController::new();
        let active = list(4);
        for _ in 0..3 {
            rot.tick(&active);
        }
        assert_eq!(rot.index(), 3);

        // (3 + 1) % 3 without resetting first.
        let shrunk = list(3);
        rot.tick(&shrunk);
        assert_eq!(rot.index(), 1);
        assert_eq!(current_id(&mut rot, &shrunk).as_deref(), Some("1"));
    }
}
