//! # State Graph
//!
//! The static topology: states, the verification chain that proves each one
//! is on screen, and the costed transitions between them.
//!
//! All data structures use `BTreeMap` for deterministic ordering. The graph
//! is filled once at startup through `register_state` / `register_transition`;
//! every configuration error surfaces there, never during navigation.

use crate::action::{ActionChain, ActionConfig, ChainingStrategy, FindStrategy};
use crate::primitives::{MAX_CHAIN_STEPS, MAX_NAME_LENGTH, MAX_STATES};
use crate::{ObjectCollection, Pattern, StateId, TransitionId, WaypointError};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// STATES
// =============================================================================

/// A recognizable configuration of the target UI.
#[derive(Debug, Clone)]
pub struct State {
    id: StateId,
    name: String,
    anchors: Vec<Pattern>,
    blocking: bool,
    can_hide: BTreeSet<String>,
    verification: ActionChain,
}

impl State {
    #[must_use]
    pub fn id(&self) -> StateId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Visual anchors identifying this state.
    #[must_use]
    pub fn anchors(&self) -> &[Pattern] {
        &self.anchors
    }

    /// A blocking state hides every other active state when it appears.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Whether activating this state hides `other`.
    #[must_use]
    pub fn hides(&self, other: &str) -> bool {
        other != self.name && (self.blocking || self.can_hide.contains(other))
    }

    #[must_use]
    pub fn can_hide(&self) -> &BTreeSet<String> {
        &self.can_hide
    }

    /// The chain run after any transition into this state.
    #[must_use]
    pub fn verification(&self) -> &ActionChain {
        &self.verification
    }
}

/// Declarative definition of a state, consumed by [`StateGraph::register_state`].
#[derive(Debug, Clone)]
pub struct StateDefinition {
    name: String,
    anchors: Vec<Pattern>,
    blocking: bool,
    can_hide: BTreeSet<String>,
    verification: Option<ActionChain>,
}

impl StateDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            anchors: Vec::new(),
            blocking: false,
            can_hide: BTreeSet::new(),
            verification: None,
        }
    }

    #[must_use]
    pub fn anchor(mut self, pattern: Pattern) -> Self {
        self.anchors.push(pattern);
        self
    }

    #[must_use]
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    #[must_use]
    pub fn hides(mut self, state: impl Into<String>) -> Self {
        self.can_hide.insert(state.into());
        self
    }

    #[must_use]
    pub fn verified_by(mut self, chain: ActionChain) -> Self {
        self.verification = Some(chain);
        self
    }

    /// Verify the state by finding any of its anchors.
    #[must_use]
    pub fn verified_by_anchors(mut self) -> Self {
        let collection = self
            .anchors
            .iter()
            .cloned()
            .fold(ObjectCollection::new(), ObjectCollection::with_pattern);
        let find = ActionConfig::find().strategy(FindStrategy::Each).build();
        self.verification = Some(
            ActionChain::builder(ChainingStrategy::Sequential)
                .step_on(find, vec![collection])
                .build(),
        );
        self
    }

    /// Verification that always succeeds.
    #[must_use]
    pub fn always_verified(self) -> Self {
        self.verified_by(ActionChain::unconditional())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Where a transition leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransitionTarget {
    State(StateId),
    /// Whatever state the source is currently hiding.
    Previous,
    /// The source itself (refresh).
    Current,
}

/// A directed, costed edge.
#[derive(Debug, Clone)]
pub struct Transition {
    id: TransitionId,
    from: StateId,
    target: TransitionTarget,
    action: ActionChain,
    cost: u32,
    stays_visible: bool,
}

impl Transition {
    #[must_use]
    pub fn id(&self) -> TransitionId {
        self.id
    }

    #[must_use]
    pub fn from(&self) -> StateId {
        self.from
    }

    #[must_use]
    pub fn target(&self) -> TransitionTarget {
        self.target
    }

    /// The outgoing chain executed to trigger this transition.
    #[must_use]
    pub fn action(&self) -> &ActionChain {
        &self.action
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Whether the source remains visible (hidden under the destination).
    #[must_use]
    pub fn stays_visible(&self) -> bool {
        self.stays_visible
    }
}

/// A transition destination given by state name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Named(String),
    Previous,
    Current,
}

/// Declarative definition of a transition, consumed by
/// [`StateGraph::register_transition`].
#[derive(Debug, Clone)]
pub struct TransitionDefinition {
    from: String,
    target: TargetRef,
    action: ActionChain,
    cost: u32,
    stays_visible: bool,
}

impl TransitionDefinition {
    #[must_use]
    pub fn new(from: impl Into<String>, target: TargetRef) -> Self {
        Self {
            from: from.into(),
            target,
            action: ActionChain::unconditional(),
            cost: 1,
            stays_visible: false,
        }
    }

    #[must_use]
    pub fn to(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, TargetRef::Named(to.into()))
    }

    #[must_use]
    pub fn back(from: impl Into<String>) -> Self {
        Self::new(from, TargetRef::Previous)
    }

    #[must_use]
    pub fn refresh(from: impl Into<String>) -> Self {
        Self::new(from, TargetRef::Current)
    }

    #[must_use]
    pub fn action(mut self, chain: ActionChain) -> Self {
        self.action = chain;
        self
    }

    #[must_use]
    pub fn cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    #[must_use]
    pub fn stays_visible(mut self, stays: bool) -> Self {
        self.stays_visible = stays;
        self
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// The registered states and transitions.
#[derive(Debug, Clone, Default)]
pub struct StateGraph {
    states: BTreeMap<StateId, State>,
    name_index: BTreeMap<String, StateId>,
    /// Outgoing transitions per source, in registration order.
    outgoing: BTreeMap<StateId, Vec<Transition>>,
    next_state_id: u64,
    next_transition_id: u64,
}

impl StateGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a state. Fails on duplicates and missing verification.
    pub fn register_state(&mut self, definition: StateDefinition) -> Result<StateId, WaypointError> {
        let StateDefinition {
            name,
            anchors,
            blocking,
            can_hide,
            verification,
        } = definition;

        validate_name(&name)?;
        if self.name_index.contains_key(&name) {
            return Err(WaypointError::DuplicateState(name));
        }
        if self.states.len() >= MAX_STATES {
            return Err(WaypointError::InvalidConfig(format!(
                "more than {MAX_STATES} states"
            )));
        }
        let Some(verification) = verification else {
            return Err(WaypointError::MissingVerification(name));
        };
        validate_chain(&verification, &name)?;

        let id = StateId(self.next_state_id);
        self.next_state_id = self.next_state_id.saturating_add(1);
        self.name_index.insert(name.clone(), id);
        self.states.insert(
            id,
            State {
                id,
                name,
                anchors,
                blocking,
                can_hide,
                verification,
            },
        );
        Ok(id)
    }

    /// Register a transition between already registered states.
    pub fn register_transition(
        &mut self,
        definition: TransitionDefinition,
    ) -> Result<TransitionId, WaypointError> {
        let from = self.require(&definition.from)?;
        let target = match &definition.target {
            TargetRef::Named(name) => TransitionTarget::State(self.require(name)?),
            TargetRef::Previous => TransitionTarget::Previous,
            TargetRef::Current => TransitionTarget::Current,
        };
        if target == TransitionTarget::State(from) {
            return Err(WaypointError::InvalidTransition(format!(
                "'{}' targets itself by name; use a refresh transition",
                definition.from
            )));
        }
        if target == TransitionTarget::Current && definition.stays_visible {
            return Err(WaypointError::InvalidTransition(format!(
                "refresh transition of '{}' cannot keep its source visible",
                definition.from
            )));
        }
        validate_chain(&definition.action, &definition.from)?;

        let id = TransitionId(self.next_transition_id);
        self.next_transition_id = self.next_transition_id.saturating_add(1);
        self.outgoing.entry(from).or_default().push(Transition {
            id,
            from,
            target,
            action: definition.action,
            cost: definition.cost,
            stays_visible: definition.stays_visible,
        });
        Ok(id)
    }

    /// Check cross-references that can only be resolved once every state is
    /// registered.
    pub fn validate(&self) -> Result<(), WaypointError> {
        for state in self.states.values() {
            for hidden in &state.can_hide {
                if !self.name_index.contains_key(hidden) {
                    return Err(WaypointError::UnknownState(format!(
                        "{hidden} (hidden by {})",
                        state.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn require(&self, name: &str) -> Result<StateId, WaypointError> {
        self.state_id(name)
            .ok_or_else(|| WaypointError::UnknownState(name.to_string()))
    }

    #[must_use]
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.name_index.get(name).copied()
    }

    #[must_use]
    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(&id)
    }

    /// Name of a state, or its id when unknown.
    #[must_use]
    pub fn state_name(&self, id: StateId) -> String {
        self.state(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    /// Outgoing transitions of `id`, cheapest first; ties keep registration order.
    #[must_use]
    pub fn transitions_from(&self, id: StateId) -> Vec<&Transition> {
        let mut transitions: Vec<&Transition> = self
            .outgoing
            .get(&id)
            .map(|t| t.iter().collect())
            .unwrap_or_default();
        transitions.sort_by_key(|t| (t.cost, t.id));
        transitions
    }

    #[must_use]
    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.outgoing.values().flatten().find(|t| t.id == id)
    }

    /// The verification chain of `id`.
    #[must_use]
    pub fn incoming_verification(&self, id: StateId) -> Option<&ActionChain> {
        self.state(id).map(State::verification)
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn transition_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }
}

fn validate_name(name: &str) -> Result<(), WaypointError> {
    if name.trim().is_empty() {
        return Err(WaypointError::InvalidConfig("empty state name".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(WaypointError::InvalidConfig(format!(
            "state name longer than {MAX_NAME_LENGTH} bytes"
        )));
    }
    Ok(())
}

fn validate_chain(chain: &ActionChain, owner: &str) -> Result<(), WaypointError> {
    if chain.len() > MAX_CHAIN_STEPS {
        return Err(WaypointError::InvalidConfig(format!(
            "chain of '{owner}' has {} steps (max {MAX_CHAIN_STEPS})",
            chain.len()
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(names: &[&str]) -> StateGraph {
        let mut graph = StateGraph::new();
        for name in names {
            graph
                .register_state(StateDefinition::new(*name).always_verified())
                .expect("register");
        }
        graph
    }

    #[test]
    fn ids_are_sequential() {
        let graph = graph_with(&["A", "B"]);
        assert_eq!(graph.state_id("A"), Some(StateId(0)));
        assert_eq!(graph.state_id("B"), Some(StateId(1)));
        assert_eq!(graph.state_name(StateId(1)), "B");
        assert_eq!(graph.state_name(StateId(9)), "#9");
    }

    #[test]
    fn missing_verification_is_rejected() {
        let mut graph = StateGraph::new();
        let err = graph
            .register_state(StateDefinition::new("Orphan"))
            .expect_err("must fail");
        assert!(matches!(err, WaypointError::MissingVerification(name) if name == "Orphan"));
        assert_eq!(graph.state_count(), 0);
    }

    #[test]
    fn duplicate_state_is_rejected() {
        let mut graph = graph_with(&["A"]);
        let err = graph
            .register_state(StateDefinition::new("A").always_verified())
            .expect_err("must fail");
        assert!(matches!(err, WaypointError::DuplicateState(_)));
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut graph = StateGraph::new();
        let err = graph
            .register_state(StateDefinition::new("  ").always_verified())
            .expect_err("must fail");
        assert!(matches!(err, WaypointError::InvalidConfig(_)));
    }

    #[test]
    fn unknown_state_in_transition_is_rejected() {
        let mut graph = graph_with(&["A"]);
        let err = graph
            .register_transition(TransitionDefinition::to("A", "Nowhere"))
            .expect_err("must fail");
        assert!(matches!(err, WaypointError::UnknownState(name) if name == "Nowhere"));
    }

    #[test]
    fn named_self_loop_is_rejected() {
        let mut graph = graph_with(&["A"]);
        let err = graph
            .register_transition(TransitionDefinition::to("A", "A"))
            .expect_err("must fail");
        assert!(matches!(err, WaypointError::InvalidTransition(_)));
    }

    #[test]
    fn transitions_sorted_by_cost_then_insertion() {
        let mut graph = graph_with(&["A", "B", "C"]);
        let slow = graph
            .register_transition(TransitionDefinition::to("A", "B").cost(5))
            .expect("t");
        let first = graph
            .register_transition(TransitionDefinition::to("A", "C").cost(2))
            .expect("t");
        let second = graph
            .register_transition(TransitionDefinition::to("A", "B").cost(2))
            .expect("t");

        let a = graph.state_id("A").expect("A");
        let order: Vec<_> = graph.transitions_from(a).iter().map(|t| t.id()).collect();
        assert_eq!(order, vec![first, second, slow]);
        assert_eq!(graph.transition_count(), 3);
        assert_eq!(graph.transition(second).map(|t| t.cost()), Some(2));
    }

    #[test]
    fn can_hide_references_are_validated() {
        let mut graph = StateGraph::new();
        graph
            .register_state(StateDefinition::new("Popup").hides("Ghost").always_verified())
            .expect("register");
        assert!(matches!(graph.validate(), Err(WaypointError::UnknownState(_))));
    }

    #[test]
    fn blocking_state_hides_others_but_not_itself() {
        let mut graph = StateGraph::new();
        let id = graph
            .register_state(StateDefinition::new("Modal").blocking(true).always_verified())
            .expect("register");
        let modal = graph.state(id).expect("state");
        assert!(modal.hides("Main"));
        assert!(!modal.hides("Modal"));
    }

    #[test]
    fn anchor_verification_searches_every_anchor() {
        let definition = StateDefinition::new("Home")
            .anchor(Pattern::new("logo"))
            .anchor(Pattern::new("menu"))
            .verified_by_anchors();
        let mut graph = StateGraph::new();
        let id = graph.register_state(definition).expect("register");
        let chain = graph.incoming_verification(id).expect("verification");
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.steps()[0].targets[0].patterns.len(), 2);
    }
}
