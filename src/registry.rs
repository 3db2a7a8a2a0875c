use std::collections::HashMap;

use crate::model::{by_due_then_id, Assignment};
use crate::store::OverrideMap;

/// Authoritative set of assignments from the last successful fetch, split into
/// active and dismissed views. Both views are recomputed eagerly on every
/// mutation so readers never see a stale partition.
#[derive(Debug, Default, Clone)]
pub struct AssignmentRegistry {
    all: Vec<Assignment>,
    overrides: OverrideMap,
    active: Vec<Assignment>,
    dismissed: Vec<Assignment>,
}

impl AssignmentRegistry {
    pub fn new(overrides: OverrideMap) -> Self {
        Self {
            overrides,
            ..Default::default()
        }
    }

    /// Replace the canonical set wholesale with a fresh fetch result.
    pub fn replace(&mut self, mut assignments: Vec<Assignment>) {
        assignments.sort_by(by_due_then_id);
        self.all = assignments;
        self.repartition();
    }

    pub fn apply_overrides(&mut self, overrides: &OverrideMap) {
        self.overrides = overrides.clone();
        self.repartition();
    }

    fn repartition(&mut self) {
        let (dismissed, active): (Vec<_>, Vec<_>) = self
            .all
            .iter()
            .cloned()
            .partition(|a| self.overrides.is_dismissed(&a.id));
        self.active = active;
        self.dismissed = dismissed;
    }

    /// Every canonical assignment, dismissed or not, by due time.
    pub fn all(&self) -> &[Assignment] {
        &self.all
    }

    pub fn active_view(&self) -> &[Assignment] {
        &self.active
    }

    pub fn dismissed_view(&self) -> &[Assignment] {
        &self.dismissed
    }

    pub fn get(&self, id: &str) -> Option<&Assignment> {
        self.all.iter().find(|a| a.id == id)
    }

    pub fn display_name(&self, assignment: &Assignment) -> String {
        self.overrides
            .custom_name(&assignment.id)
            .map(str::to_string)
            .unwrap_or_else(|| assignment.default_display_name())
    }

    /// Display names for every canonical assignment, keyed by id.
    pub fn display_names(&self) -> HashMap<String, String> {
        self.all
            .iter()
            .map(|a| (a.id.clone(), self.display_name(a)))
            .collect()
    }
}
