//! # Engine
//!
//! The engine combines the static `StateGraph`, the runtime `StateMemory`
//! and the injected adapters behind one handle.
//!
//! Providers are passed in at construction, never switched globally, so a
//! live engine and a replay engine can coexist in one process. The engine
//! has no internal locking: one engine (and its memory) is driven by one
//! caller at a time.

use crate::action::{ActionChain, ActionExecutor, ActionResult, ChainComposer, ConditionalChain};
use crate::adapters::{Actuator, PerceptionProvider};
use crate::events::{EngineEvent, EventSink, TracingSink};
use crate::graph::{StateGraph, TransitionTarget};
use crate::memory::StateMemory;
use crate::navigator::{NavigationFailure, NavigationOutcome, Navigator, Path, PathFinder};
use crate::replay::HistoryStore;
use crate::{ObjectCollection, StateId, WaypointError};
use std::sync::Arc;
use std::time::Instant;

/// Builder for [`Engine`].
pub struct EngineBuilder {
    graph: StateGraph,
    perception: Option<Box<dyn PerceptionProvider>>,
    actuator: Option<Box<dyn Actuator>>,
    sink: Arc<dyn EventSink>,
    record: bool,
    initial: Vec<String>,
}

impl EngineBuilder {
    #[must_use]
    pub fn new(graph: StateGraph) -> Self {
        Self {
            graph,
            perception: None,
            actuator: None,
            sink: Arc::new(TracingSink),
            record: false,
            initial: Vec::new(),
        }
    }

    #[must_use]
    pub fn perception(mut self, provider: impl PerceptionProvider + 'static) -> Self {
        self.perception = Some(Box::new(provider));
        self
    }

    #[must_use]
    pub fn actuator(mut self, actuator: impl Actuator + 'static) -> Self {
        self.actuator = Some(Box::new(actuator));
        self
    }

    /// Where events go. Defaults to [`TracingSink`].
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Record every perception outcome into a [`HistoryStore`].
    #[must_use]
    pub fn record_history(mut self, record: bool) -> Self {
        self.record = record;
        self
    }

    /// A state that is active when the engine starts.
    #[must_use]
    pub fn initial_state(mut self, name: impl Into<String>) -> Self {
        self.initial.push(name.into());
        self
    }

    pub fn build(self) -> Result<Engine, WaypointError> {
        self.graph.validate()?;
        let perception = self.perception.ok_or_else(|| {
            WaypointError::InvalidConfig("no perception provider configured".to_string())
        })?;
        let actuator = self
            .actuator
            .ok_or_else(|| WaypointError::InvalidConfig("no actuator configured".to_string()))?;

        let mut memory = StateMemory::new();
        for name in &self.initial {
            let id = self
                .graph
                .state_id(name)
                .ok_or_else(|| WaypointError::UnknownState(name.clone()))?;
            memory.activate(id);
        }

        Ok(Engine {
            graph: self.graph,
            memory,
            perception,
            actuator,
            sink: self.sink,
            recorder: self.record.then(HistoryStore::new),
        })
    }
}

/// The automation engine.
pub struct Engine {
    graph: StateGraph,
    memory: StateMemory,
    perception: Box<dyn PerceptionProvider>,
    actuator: Box<dyn Actuator>,
    sink: Arc<dyn EventSink>,
    recorder: Option<HistoryStore>,
}

impl Engine {
    #[must_use]
    pub fn builder(graph: StateGraph) -> EngineBuilder {
        EngineBuilder::new(graph)
    }

    #[must_use]
    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    #[must_use]
    pub fn memory(&self) -> &StateMemory {
        &self.memory
    }

    /// Names of the active states, in id order.
    #[must_use]
    pub fn active_state_names(&self) -> Vec<String> {
        self.memory
            .active_states()
            .map(|id| self.graph.state_name(id))
            .collect()
    }

    /// Resolve a state name.
    pub fn state(&self, name: &str) -> Result<StateId, WaypointError> {
        self.graph
            .state_id(name)
            .ok_or_else(|| WaypointError::UnknownState(name.to_string()))
    }

    /// Mark a state active without running anything.
    pub fn activate(&mut self, name: &str) -> Result<StateId, WaypointError> {
        let id = self.state(name)?;
        self.memory.activate(id);
        Ok(id)
    }

    /// Mark a state inactive without running anything.
    pub fn deactivate(&mut self, name: &str) -> Result<(), WaypointError> {
        let id = self.state(name)?;
        self.memory.deactivate(id);
        Ok(())
    }

    /// Outcomes recorded so far, when recording is enabled.
    #[must_use]
    pub fn recorded_history(&self) -> Option<&HistoryStore> {
        self.recorder.as_ref()
    }

    /// Take the recorded outcomes, leaving an empty store behind.
    pub fn take_recorded_history(&mut self) -> Option<HistoryStore> {
        self.recorder.as_mut().map(std::mem::take)
    }

    /// Borrow the graph and memory next to an executor over the adapters.
    fn split(&mut self) -> (&StateGraph, &mut StateMemory, ActionExecutor<'_>) {
        let Engine {
            graph,
            memory,
            perception,
            actuator,
            sink,
            recorder,
        } = self;
        let mut executor = ActionExecutor::new(&mut **perception, &mut **actuator, &**sink);
        if let Some(store) = recorder.as_mut() {
            executor = executor.with_recorder(store);
        }
        executor.set_active_states(
            memory
                .active_states()
                .map(|id| graph.state_name(id))
                .collect(),
        );
        (graph, memory, executor)
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Execute an action chain.
    pub fn perform(
        &mut self,
        chain: &ActionChain,
        collections: &[ObjectCollection],
    ) -> Result<ActionResult, WaypointError> {
        let (_, _, mut executor) = self.split();
        ChainComposer::execute(&mut executor, chain, collections)
    }

    /// Execute a conditional chain.
    pub fn perform_conditional(
        &mut self,
        chain: &ConditionalChain,
        collections: &[ObjectCollection],
    ) -> Result<ActionResult, WaypointError> {
        let (_, _, mut executor) = self.split();
        chain.execute(&mut executor, collections)
    }

    /// Run a state's verification chain without touching memory.
    pub fn is_evidenced(&mut self, name: &str) -> Result<bool, WaypointError> {
        let id = self.state(name)?;
        let (graph, _, mut executor) = self.split();
        let chain = graph
            .incoming_verification(id)
            .ok_or_else(|| WaypointError::UnknownState(name.to_string()))?;
        Ok(ChainComposer::execute(&mut executor, chain, &[])?.success)
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// Plan without executing.
    pub fn plan(&self, target: &str) -> Result<Option<Path>, WaypointError> {
        let id = self.state(target)?;
        Ok(PathFinder::plan(&self.graph, &self.memory, id))
    }

    /// Navigate to the named state.
    pub fn navigate(&mut self, target: &str) -> Result<NavigationOutcome, WaypointError> {
        let id = self.state(target)?;
        self.navigate_to(id)
    }

    pub fn navigate_to(&mut self, target: StateId) -> Result<NavigationOutcome, WaypointError> {
        let (graph, memory, mut executor) = self.split();
        Navigator::navigate(graph, memory, &mut executor, target)
    }

    /// Re-run the cheapest refresh transition of an active state.
    pub fn refresh(&mut self, state: &str) -> Result<NavigationOutcome, WaypointError> {
        self.pseudo(state, TransitionTarget::Current)
    }

    /// Leave an active state through its cheapest back transition.
    pub fn return_to_previous(&mut self, state: &str) -> Result<NavigationOutcome, WaypointError> {
        self.pseudo(state, TransitionTarget::Previous)
    }

    fn pseudo(
        &mut self,
        state: &str,
        target: TransitionTarget,
    ) -> Result<NavigationOutcome, WaypointError> {
        let id = self.state(state)?;
        let started = Instant::now();
        let (graph, memory, mut executor) = self.split();

        let outcome = match PathFinder::pseudo_hop(graph, memory, id, target) {
            Some(path) => Navigator::execute_path(graph, memory, &mut executor, &path)?,
            None => NavigationOutcome::Failed(NavigationFailure::NoPath),
        };
        executor.emit(&EngineEvent::Navigation {
            target: state.to_string(),
            success: outcome.is_success(),
            hops: outcome.completed_hops(),
            duration_ms: crate::action::millis(started.elapsed()),
        });
        Ok(outcome)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("states", &self.graph.state_count())
            .field("transitions", &self.graph.transition_count())
            .field("active", &self.active_state_names())
            .field("recording", &self.recorder.is_some())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionConfig, ActionKind, ChainingStrategy};
    use crate::adapters::RecordingActuator;
    use crate::events::EventLog;
    use crate::graph::{StateDefinition, TransitionDefinition};
    use crate::replay::{ActionRecord, HistoryReplay, SnapshotSelector};
    use crate::{Match, Pattern, Region, Similarity};

    fn seen(name: &str) -> Pattern {
        let mut pattern = Pattern::new(name);
        pattern.record(ActionRecord::new(
            ActionKind::Find,
            vec![Match::new(Region::new(0, 0, 10, 10), Similarity::EXACT)],
        ));
        pattern
    }

    fn list_graph() -> StateGraph {
        let mut graph = StateGraph::new();
        graph
            .register_state(
                StateDefinition::new("List")
                    .anchor(seen("list_header"))
                    .verified_by_anchors(),
            )
            .expect("state");
        graph
            .register_state(
                StateDefinition::new("Gone")
                    .anchor(Pattern::new("never_seen"))
                    .verified_by_anchors(),
            )
            .expect("state");
        graph
            .register_transition(TransitionDefinition::refresh("List"))
            .expect("refresh");
        graph
    }

    fn engine(graph: StateGraph, log: Arc<EventLog>) -> Engine {
        Engine::builder(graph)
            .perception(HistoryReplay::new(SnapshotSelector::fixed(0)))
            .actuator(RecordingActuator::new())
            .sink(log)
            .initial_state("List")
            .build()
            .expect("engine")
    }

    #[test]
    fn build_requires_adapters() {
        let err = Engine::builder(StateGraph::new()).build().expect_err("must fail");
        assert!(matches!(err, WaypointError::InvalidConfig(_)));
    }

    #[test]
    fn unknown_initial_state_is_rejected() {
        let err = Engine::builder(StateGraph::new())
            .perception(HistoryReplay::new(SnapshotSelector::fixed(0)))
            .actuator(RecordingActuator::new())
            .initial_state("Nowhere")
            .build()
            .expect_err("must fail");
        assert!(matches!(err, WaypointError::UnknownState(_)));
    }

    #[test]
    fn evidence_runs_verification() {
        let mut engine = engine(list_graph(), Arc::new(EventLog::new()));
        assert!(engine.is_evidenced("List").expect("evidence"));
        assert!(!engine.is_evidenced("Gone").expect("evidence"));
        assert!(engine.is_evidenced("Nope").is_err());
    }

    #[test]
    fn refresh_keeps_active_set() {
        let log = Arc::new(EventLog::new());
        let mut engine = engine(list_graph(), log.clone());
        let outcome = engine.refresh("List").expect("refresh");

        assert_eq!(outcome, NavigationOutcome::Succeeded { hops: 1 });
        assert_eq!(engine.active_state_names(), vec!["List".to_string()]);
        assert!(matches!(
            log.events().last(),
            Some(EngineEvent::Navigation { success: true, .. })
        ));
    }

    #[test]
    fn refresh_of_inactive_state_has_no_path() {
        let mut engine = engine(list_graph(), Arc::new(EventLog::new()));
        let outcome = engine.refresh("Gone").expect("refresh");
        assert_eq!(outcome, NavigationOutcome::Failed(NavigationFailure::NoPath));
    }

    #[test]
    fn return_without_hidden_state_fails_the_hop() {
        let mut graph = list_graph();
        graph
            .register_transition(TransitionDefinition::back("List"))
            .expect("back");
        let mut engine = engine(graph, Arc::new(EventLog::new()));

        let outcome = engine.return_to_previous("List").expect("back");
        assert!(matches!(
            outcome,
            NavigationOutcome::Failed(NavigationFailure::HopFailed { hop: 0, .. })
        ));
        assert_eq!(engine.active_state_names(), vec!["List".to_string()]);
    }

    #[test]
    fn recording_captures_live_outcomes() {
        let mut engine = Engine::builder(list_graph())
            .perception(HistoryReplay::new(SnapshotSelector::fixed(0)))
            .actuator(RecordingActuator::new())
            .record_history(true)
            .initial_state("List")
            .build()
            .expect("engine");

        let chain = ActionChain::builder(ChainingStrategy::Sequential)
            .step_on(
                ActionConfig::find().build(),
                vec![ObjectCollection::new().with_pattern(seen("list_header"))],
            )
            .build();
        let result = engine.perform(&chain, &[]).expect("perform");
        assert!(result.success);

        let store = engine.take_recorded_history().expect("recording on");
        let history = store.get("list_header").expect("history");
        assert_eq!(history.times_found(), 1);
        assert_eq!(history.records()[0].state.as_deref(), Some("List"));
        assert_eq!(engine.recorded_history().map(HistoryStore::len), Some(0));
    }
}
