//! # State Navigator
//!
//! Plans the cheapest path from the active states to a target and executes
//! it hop by hop.
//!
//! ## Planning
//!
//! Dijkstra over non-negative transition costs, seeded with every active
//! state at distance zero. The frontier is a `BTreeSet` ordered by
//! `(distance, discovery sequence, state)`, and a node's distance is only
//! replaced by a strictly smaller one. Equal-cost alternatives therefore keep
//! the path discovered first under the `transitions_from` ordering.
//! PreviousState edges are resolved from `StateMemory` and are only usable
//! from states that are active when planning starts.
//!
//! ## Execution
//!
//! Per hop: resolve the destination, run the outgoing chain, run the
//! destination's verification chain, then commit to `StateMemory`. The first
//! failure aborts the remaining path. Completed hops are never rolled back.

use crate::action::{ActionExecutor, ChainComposer};
use crate::events::EngineEvent;
use crate::graph::{StateGraph, TransitionTarget};
use crate::memory::StateMemory;
use crate::primitives::MAX_PATH_LENGTH;
use crate::{StateId, TransitionId, WaypointError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

// =============================================================================
// PATHS
// =============================================================================

/// One planned transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub transition: TransitionId,
    pub from: StateId,
    pub target: TransitionTarget,
    /// Destination as known at planning time.
    pub to: Option<StateId>,
    pub cost: u32,
}

/// An ordered list of hops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    hops: Vec<Hop>,
}

impl Path {
    #[must_use]
    pub fn new(hops: Vec<Hop>) -> Self {
        Self { hops }
    }

    #[must_use]
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Sum of hop costs.
    #[must_use]
    pub fn cost(&self) -> u64 {
        self.hops.iter().map(|h| u64::from(h.cost)).sum()
    }

    /// The states visited, starting with the first hop's source.
    #[must_use]
    pub fn states(&self) -> Vec<StateId> {
        let mut states: Vec<StateId> = self.hops.first().map(|h| h.from).into_iter().collect();
        states.extend(self.hops.iter().map(|h| h.to.unwrap_or(h.from)));
        states
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Why a hop failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HopFailure {
    /// The outgoing action chain failed.
    OutgoingFailed,
    /// The destination's verification chain failed.
    VerificationFailed,
    /// A PreviousState hop had nothing to return to.
    NoHiddenState,
}

impl fmt::Display for HopFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HopFailure::OutgoingFailed => "outgoing chain failed",
            HopFailure::VerificationFailed => "verification failed",
            HopFailure::NoHiddenState => "no hidden state to return to",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum NavigationFailure {
    /// The target is unreachable from the active states. Nothing ran.
    NoPath,
    /// Hop `hop` (zero-based) failed; all earlier hops were committed.
    HopFailed { hop: usize, reason: HopFailure },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    Succeeded { hops: usize },
    Failed(NavigationFailure),
}

impl NavigationOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, NavigationOutcome::Succeeded { .. })
    }

    /// Number of hops committed before the outcome was reached.
    #[must_use]
    pub fn completed_hops(&self) -> usize {
        match self {
            NavigationOutcome::Succeeded { hops } => *hops,
            NavigationOutcome::Failed(NavigationFailure::NoPath) => 0,
            NavigationOutcome::Failed(NavigationFailure::HopFailed { hop, .. }) => *hop,
        }
    }
}

impl fmt::Display for NavigationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationOutcome::Succeeded { hops } => write!(f, "succeeded after {hops} hop(s)"),
            NavigationOutcome::Failed(NavigationFailure::NoPath) => f.write_str("no path"),
            NavigationOutcome::Failed(NavigationFailure::HopFailed { hop, reason }) => {
                write!(f, "hop {hop} failed: {reason}")
            }
        }
    }
}

// =============================================================================
// PATH FINDER
// =============================================================================

/// Cheapest-path planner.
pub struct PathFinder;

impl PathFinder {
    /// Plan the cheapest path from the active states to `target`.
    ///
    /// Returns an empty path when `target` is already active and `None` when
    /// it is unreachable within `MAX_PATH_LENGTH` hops.
    #[must_use]
    pub fn plan(graph: &StateGraph, memory: &StateMemory, target: StateId) -> Option<Path> {
        if graph.state(target).is_none() {
            return None;
        }
        if memory.is_active(target) {
            return Some(Path::default());
        }

        let mut dist: BTreeMap<StateId, (u64, u64)> = BTreeMap::new();
        let mut depth: BTreeMap<StateId, usize> = BTreeMap::new();
        let mut via: BTreeMap<StateId, Hop> = BTreeMap::new();
        let mut frontier: BTreeSet<(u64, u64, StateId)> = BTreeSet::new();
        let mut settled: BTreeSet<StateId> = BTreeSet::new();
        let mut seq: u64 = 0;

        for source in memory.active_states() {
            dist.insert(source, (0, seq));
            depth.insert(source, 0);
            frontier.insert((0, seq, source));
            seq = seq.saturating_add(1);
        }

        while let Some(entry) = frontier.pop_first() {
            let (current_dist, _, current) = entry;
            if !settled.insert(current) {
                continue;
            }
            if current == target {
                break;
            }
            let current_depth = depth.get(&current).copied().unwrap_or(0);
            if current_depth >= MAX_PATH_LENGTH {
                continue;
            }

            for transition in graph.transitions_from(current) {
                let next = match transition.target() {
                    TransitionTarget::State(id) => id,
                    TransitionTarget::Current => continue,
                    TransitionTarget::Previous => {
                        if !memory.is_active(current) {
                            continue;
                        }
                        match memory.resolve_previous(current) {
                            Some(id) => id,
                            None => continue,
                        }
                    }
                };
                if settled.contains(&next) {
                    continue;
                }

                let candidate = current_dist.saturating_add(u64::from(transition.cost()));
                let improves = dist.get(&next).is_none_or(|(known, _)| candidate < *known);
                if !improves {
                    continue;
                }
                if let Some((old_dist, old_seq)) = dist.get(&next) {
                    frontier.remove(&(*old_dist, *old_seq, next));
                }
                dist.insert(next, (candidate, seq));
                depth.insert(next, current_depth.saturating_add(1));
                frontier.insert((candidate, seq, next));
                seq = seq.saturating_add(1);
                via.insert(
                    next,
                    Hop {
                        transition: transition.id(),
                        from: current,
                        target: transition.target(),
                        to: Some(next),
                        cost: transition.cost(),
                    },
                );
            }
        }

        if !settled.contains(&target) {
            return None;
        }

        let mut hops = Vec::new();
        let mut cursor = target;
        while let Some(hop) = via.get(&cursor) {
            hops.push(*hop);
            cursor = hop.from;
            if hops.len() > MAX_PATH_LENGTH {
                return None;
            }
        }
        hops.reverse();
        Some(Path::new(hops))
    }

    /// A single-hop path over the cheapest transition of `from` with the
    /// given pseudo-target (`Current` or `Previous`).
    #[must_use]
    pub fn pseudo_hop(
        graph: &StateGraph,
        memory: &StateMemory,
        from: StateId,
        target: TransitionTarget,
    ) -> Option<Path> {
        if !memory.is_active(from) {
            return None;
        }
        let transition = graph
            .transitions_from(from)
            .into_iter()
            .find(|t| t.target() == target)?;
        let to = match target {
            TransitionTarget::Current => Some(from),
            TransitionTarget::Previous => memory.resolve_previous(from),
            TransitionTarget::State(id) => Some(id),
        };
        Some(Path::new(vec![Hop {
            transition: transition.id(),
            from,
            target,
            to,
            cost: transition.cost(),
        }]))
    }
}

// =============================================================================
// NAVIGATOR
// =============================================================================

/// Executes planned paths.
pub struct Navigator;

impl Navigator {
    /// Plan and execute navigation to `target`.
    pub fn navigate(
        graph: &StateGraph,
        memory: &mut StateMemory,
        executor: &mut ActionExecutor<'_>,
        target: StateId,
    ) -> Result<NavigationOutcome, WaypointError> {
        let started = Instant::now();
        let outcome = match PathFinder::plan(graph, memory, target) {
            Some(path) => {
                tracing::debug!(
                    target_state = %graph.state_name(target),
                    hops = path.len(),
                    cost = path.cost(),
                    "path planned"
                );
                Self::execute_path(graph, memory, executor, &path)?
            }
            None => {
                tracing::info!(target_state = %graph.state_name(target), "no path");
                NavigationOutcome::Failed(NavigationFailure::NoPath)
            }
        };

        emit_navigation(executor, graph, target, &outcome, started);
        Ok(outcome)
    }

    /// Execute `path` hop by hop, stopping at the first failure.
    pub fn execute_path(
        graph: &StateGraph,
        memory: &mut StateMemory,
        executor: &mut ActionExecutor<'_>,
        path: &Path,
    ) -> Result<NavigationOutcome, WaypointError> {
        for (index, hop) in path.hops().iter().enumerate() {
            executor.set_active_states(active_names(graph, memory));
            let started = Instant::now();
            let result = Self::execute_hop(graph, memory, executor, hop)?;

            let to = match (result, hop.to) {
                (Ok(dest), _) => graph.state_name(dest),
                (Err(_), Some(planned)) => graph.state_name(planned),
                (Err(_), None) => "<previous>".to_string(),
            };
            executor.emit(&EngineEvent::NavigationHop {
                hop: index,
                from: graph.state_name(hop.from),
                to,
                success: result.is_ok(),
                duration_ms: crate::action::millis(started.elapsed()),
            });

            if let Err(reason) = result {
                tracing::warn!(hop = index, %reason, "navigation aborted");
                return Ok(NavigationOutcome::Failed(NavigationFailure::HopFailed {
                    hop: index,
                    reason,
                }));
            }
        }
        executor.set_active_states(active_names(graph, memory));
        Ok(NavigationOutcome::Succeeded { hops: path.len() })
    }

    /// Run one hop. The inner `Err` is an expected failure, the outer one an
    /// adapter or configuration error.
    fn execute_hop(
        graph: &StateGraph,
        memory: &mut StateMemory,
        executor: &mut ActionExecutor<'_>,
        hop: &Hop,
    ) -> Result<Result<StateId, HopFailure>, WaypointError> {
        let transition = graph.transition(hop.transition).ok_or_else(|| {
            WaypointError::InvalidTransition(format!("unknown transition {:?}", hop.transition))
        })?;

        let destination = match transition.target() {
            TransitionTarget::State(id) => id,
            TransitionTarget::Current => hop.from,
            TransitionTarget::Previous => match memory.resolve_previous(hop.from) {
                Some(id) => id,
                None => return Ok(Err(HopFailure::NoHiddenState)),
            },
        };

        let outgoing = ChainComposer::execute(executor, transition.action(), &[])?;
        if !outgoing.success {
            return Ok(Err(HopFailure::OutgoingFailed));
        }

        let verification = graph.incoming_verification(destination).ok_or_else(|| {
            WaypointError::UnknownState(graph.state_name(destination))
        })?;
        let verified = ChainComposer::execute(executor, verification, &[])?;
        if !verified.success {
            return Ok(Err(HopFailure::VerificationFailed));
        }

        commit(graph, memory, hop.from, transition.target(), transition.stays_visible(), destination);
        Ok(Ok(destination))
    }
}

/// Apply a verified hop to `memory`.
fn commit(
    graph: &StateGraph,
    memory: &mut StateMemory,
    source: StateId,
    target: TransitionTarget,
    stays_visible: bool,
    destination: StateId,
) {
    match target {
        TransitionTarget::Current => {
            memory.activate(source);
        }
        TransitionTarget::Previous => {
            memory.pop_hidden(source);
            memory.restore_hidden(source);
            memory.deactivate(source);
        }
        TransitionTarget::State(dest) => {
            // An exiting hider uncovers what it hid; the destination may hide it again.
            if !stays_visible {
                memory.restore_hidden(source);
            }
            let others: Vec<StateId> = memory
                .active_states()
                .filter(|s| *s != source && *s != dest)
                .collect();
            if let Some(state) = graph.state(dest) {
                for other in others {
                    if state.hides(&graph.state_name(other)) {
                        memory.push_hidden(dest, other);
                    }
                }
            }
            memory.activate(dest);
            if stays_visible {
                memory.push_hidden(dest, source);
            } else {
                memory.deactivate(source);
            }
        }
    }
    tracing::debug!(
        from = %graph.state_name(source),
        to = %graph.state_name(destination),
        active = memory.active_count(),
        hidden = memory.hidden_count(),
        "hop committed"
    );
}

fn active_names(graph: &StateGraph, memory: &StateMemory) -> Vec<String> {
    memory
        .active_states()
        .map(|id| graph.state_name(id))
        .collect()
}

fn emit_navigation(
    executor: &ActionExecutor<'_>,
    graph: &StateGraph,
    target: StateId,
    outcome: &NavigationOutcome,
    started: Instant,
) {
    executor.emit(&EngineEvent::Navigation {
        target: graph.state_name(target),
        success: outcome.is_success(),
        hops: outcome.completed_hops(),
        duration_ms: crate::action::millis(started.elapsed()),
    });
}

// =============================================================================
// TESTS
// =============================================================================
