use std::collections::BTreeSet;

use crate::types::Participant;

/// Assignee changes needed to make a pull request's assignees match its
/// responsible set. Both lists are sorted by login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssigneeDelta {
    pub to_add: Vec<Participant>,
    pub to_remove: Vec<Participant>,
}

impl AssigneeDelta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes the minimal add/remove delta from `current` to `resolved`.
pub fn reconcile(
    current: &BTreeSet<Participant>,
    resolved: &BTreeSet<Participant>,
) -> AssigneeDelta {
    AssigneeDelta {
        to_add: resolved.difference(current).cloned().collect(),
        to_remove: current.difference(resolved).cloned().collect(),
    }
}
