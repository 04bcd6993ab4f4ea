//! # State Memory
//!
//! The runtime belief about what is on screen: the set of active states and,
//! per hider, the stack of states it currently occludes.
//!
//! ## Invariant
//!
//! A state is either active, or in exactly one hider's stack, or neither.
//! Every mutating operation preserves this; `check_invariants` verifies it.

use crate::StateId;
use std::collections::{BTreeMap, BTreeSet};

/// Per-state runtime counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Visits {
    /// Number of activations.
    pub count: u64,
    /// Logical time of the last activation (a monotonic tick).
    pub last_accessed: u64,
}

/// Active and hidden states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMemory {
    active: BTreeSet<StateId>,
    /// hider -> hidden states, most recently hidden last.
    hidden: BTreeMap<StateId, Vec<StateId>>,
    visits: BTreeMap<StateId, Visits>,
    tick: u64,
}

impl StateMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory with the given states active.
    #[must_use]
    pub fn with_active(states: impl IntoIterator<Item = StateId>) -> Self {
        let mut memory = Self::new();
        for state in states {
            memory.activate(state);
        }
        memory
    }

    /// Mark `id` active, removing it from any hidden stack.
    pub fn activate(&mut self, id: StateId) {
        self.unhide(id);
        self.active.insert(id);
        self.tick = self.tick.saturating_add(1);
        let visits = self.visits.entry(id).or_default();
        visits.count = visits.count.saturating_add(1);
        visits.last_accessed = self.tick;
    }

    /// Mark `id` inactive. Its own hidden stack is released and returned.
    pub fn deactivate(&mut self, id: StateId) -> Vec<StateId> {
        self.active.remove(&id);
        let released = self.hidden.remove(&id).unwrap_or_default();
        if !released.is_empty() {
            tracing::warn!(
                state = %id,
                released = released.len(),
                "hider left the screen; hidden states dropped"
            );
        }
        released
    }

    /// Move `hidden` from the active set onto `hider`'s stack.
    ///
    /// A state is never pushed onto its own stack. If `hidden` sat in another
    /// stack it is moved, so it is never in two stacks.
    pub fn push_hidden(&mut self, hider: StateId, hidden: StateId) {
        if hider == hidden {
            return;
        }
        self.active.remove(&hidden);
        self.unhide(hidden);
        self.hidden.entry(hider).or_default().push(hidden);
    }

    /// The state `hider` would return to, without changing anything.
    #[must_use]
    pub fn resolve_previous(&self, hider: StateId) -> Option<StateId> {
        self.hidden.get(&hider).and_then(|stack| stack.last().copied())
    }

    /// Pop the top of `hider`'s stack and reactivate it.
    pub fn pop_hidden(&mut self, hider: StateId) -> Option<StateId> {
        let stack = self.hidden.get_mut(&hider)?;
        let top = stack.pop();
        if stack.is_empty() {
            self.hidden.remove(&hider);
        }
        if let Some(state) = top {
            self.activate(state);
        }
        top
    }

    /// Reactivate everything `hider` still hides, bottom first, and return it.
    pub fn restore_hidden(&mut self, hider: StateId) -> Vec<StateId> {
        let restored = self.hidden.remove(&hider).unwrap_or_default();
        for state in &restored {
            self.activate(*state);
        }
        restored
    }

    fn unhide(&mut self, id: StateId) {
        self.hidden.retain(|_, stack| {
            stack.retain(|s| *s != id);
            !stack.is_empty()
        });
    }

    #[must_use]
    pub fn is_active(&self, id: StateId) -> bool {
        self.active.contains(&id)
    }

    /// Active states in id order.
    pub fn active_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.active.iter().copied()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// The stack hidden under `hider`, bottom first.
    #[must_use]
    pub fn hidden_under(&self, hider: StateId) -> &[StateId] {
        self.hidden.get(&hider).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of hidden entries over all stacks.
    #[must_use]
    pub fn hidden_count(&self) -> usize {
        self.hidden.values().map(Vec::len).sum()
    }

    /// The hider whose stack holds `id`, if any.
    #[must_use]
    pub fn hider_of(&self, id: StateId) -> Option<StateId> {
        self.hidden
            .iter()
            .find(|(_, stack)| stack.contains(&id))
            .map(|(hider, _)| *hider)
    }

    #[must_use]
    pub fn visits(&self, id: StateId) -> Visits {
        self.visits.get(&id).copied().unwrap_or_default()
    }

    /// Verify the active-XOR-hidden invariant.
    #[must_use]
    pub fn check_invariants(&self) -> bool {
        let mut seen = BTreeSet::new();
        for stack in self.hidden.values() {
            for id in stack {
                if self.active.contains(id) || !seen.insert(*id) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: StateId = StateId(0);
    const MODAL: StateId = StateId(1);
    const TOAST: StateId = StateId(2);

    #[test]
    fn push_hidden_moves_out_of_active() {
        let mut memory = StateMemory::with_active([MAIN]);
        memory.activate(MODAL);
        memory.push_hidden(MODAL, MAIN);

        assert!(!memory.is_active(MAIN));
        assert_eq!(memory.hidden_under(MODAL), &[MAIN]);
        assert_eq!(memory.resolve_previous(MODAL), Some(MAIN));
        assert!(memory.check_invariants());
    }

    #[test]
    fn resolve_previous_does_not_pop() {
        let mut memory = StateMemory::with_active([MODAL]);
        memory.push_hidden(MODAL, MAIN);
        let _ = memory.resolve_previous(MODAL);
        assert_eq!(memory.hidden_count(), 1);
    }

    #[test]
    fn pop_hidden_reactivates_top() {
        let mut memory = StateMemory::with_active([MODAL]);
        memory.push_hidden(MODAL, MAIN);
        memory.push_hidden(MODAL, TOAST);

        assert_eq!(memory.pop_hidden(MODAL), Some(TOAST));
        assert!(memory.is_active(TOAST));
        assert_eq!(memory.hidden_under(MODAL), &[MAIN]);
        assert!(memory.check_invariants());
    }

    #[test]
    fn activate_removes_from_stacks() {
        let mut memory = StateMemory::with_active([MODAL]);
        memory.push_hidden(MODAL, MAIN);
        memory.activate(MAIN);

        assert_eq!(memory.hidden_count(), 0);
        assert_eq!(memory.hider_of(MAIN), None);
        assert!(memory.check_invariants());
    }

    #[test]
    fn pushing_twice_moves_between_stacks() {
        let mut memory = StateMemory::with_active([MODAL, TOAST]);
        memory.push_hidden(MODAL, MAIN);
        memory.push_hidden(TOAST, MAIN);

        assert_eq!(memory.hider_of(MAIN), Some(TOAST));
        assert!(memory.hidden_under(MODAL).is_empty());
        assert!(memory.check_invariants());
    }

    #[test]
    fn deactivate_releases_stack() {
        let mut memory = StateMemory::with_active([MODAL]);
        memory.push_hidden(MODAL, MAIN);
        let released = memory.deactivate(MODAL);

        assert_eq!(released, vec![MAIN]);
        assert_eq!(memory.active_count(), 0);
        assert_eq!(memory.hidden_count(), 0);
    }

    #[test]
    fn self_hiding_is_ignored() {
        let mut memory = StateMemory::with_active([MAIN]);
        memory.push_hidden(MAIN, MAIN);
        assert!(memory.is_active(MAIN));
        assert_eq!(memory.hidden_count(), 0);
    }

    #[test]
    fn visits_are_counted() {
        let mut memory = StateMemory::new();
        memory.activate(MAIN);
        memory.activate(MODAL);
        memory.activate(MAIN);

        assert_eq!(memory.visits(MAIN).count, 2);
        assert!(memory.visits(MAIN).last_accessed > memory.visits(MODAL).last_accessed);
        assert_eq!(memory.visits(TOAST), Visits::default());
    }

    #[test]
    fn restore_hidden_reactivates_whole_stack() {
        let mut memory = StateMemory::with_active([MODAL, MAIN, TOAST]);
        memory.push_hidden(MODAL, MAIN);
        memory.push_hidden(MODAL, TOAST);

        assert_eq!(memory.restore_hidden(MODAL), vec![MAIN, TOAST]);
        assert!(memory.is_active(MAIN) && memory.is_active(TOAST));
        assert_eq!(memory.hidden_count(), 0);
        assert!(memory.deactivate(MODAL).is_empty());
        assert!(memory.check_invariants());
    }
}
