//! # Property-Based Tests
//!
//! Invariants of fusion, chain composition, state memory, path finding and
//! replay, checked with proptest.

use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeMap;
use waypoint_core::action::ActionExecutor;
use waypoint_core::{
    ActionChain, ActionConfig, ActionHistory, ActionKind, ActionRecord, ChainComposer,
    ChainingStrategy, FindStrategy, HistoryReplay, Match, MatchFusion, NullSink, ObjectCollection,
    PathFinder, Pattern, RecordingActuator, Region, Similarity, SnapshotSelector, StateDefinition,
    StateGraph, StateId, StateMemory, TransitionDefinition,
};

// =============================================================================
// GENERATORS
// =============================================================================

fn arb_match() -> impl Strategy<Value = Match> {
    (0i32..300, 0i32..300, 1i32..40, 1i32..40, 0u16..=10_000).prop_map(|(x, y, w, h, bp)| {
        Match::new(Region::new(x, y, w, h), Similarity::from_basis_points(bp))
    })
}

fn region_set(matches: &[Match]) -> Vec<Region> {
    let mut regions: Vec<Region> = matches.iter().map(|m| m.region).collect();
    regions.sort_by(|a, b| a.reading_order(b));
    regions
}

fn recorded(name: &str, matches: Vec<Match>) -> ObjectCollection {
    let mut pattern = Pattern::new(name);
    pattern.record(ActionRecord::new(ActionKind::Find, matches));
    ObjectCollection::new().with_pattern(pattern)
}

fn find_everything() -> ActionConfig {
    ActionConfig::find()
        .strategy(FindStrategy::All)
        .min_similarity(Similarity::from_basis_points(0))
        .build()
}

fn run_chain(chain: &ActionChain) -> waypoint_core::ActionResult {
    let mut replay = HistoryReplay::new(SnapshotSelector::fixed(0));
    let mut actuator = RecordingActuator::new();
    let mut executor = ActionExecutor::new(&mut replay, &mut actuator, &NullSink);
    ChainComposer::execute(&mut executor, chain, &[]).expect("execute")
}

#[derive(Debug, Clone)]
enum MemoryOp {
    Activate(u64),
    Deactivate(u64),
    Push(u64, u64),
    Restore(u64),
    Pop(u64),
}

fn arb_memory_op() -> impl Strategy<Value = MemoryOp> {
    prop_oneof![
        (0u64..6).prop_map(MemoryOp::Activate),
        (0u64..6).prop_map(MemoryOp::Deactivate),
        (0u64..6, 0u64..6).prop_map(|(h, x)| MemoryOp::Push(h, x)),
        (0u64..6).prop_map(MemoryOp::Pop),
        (0u64..6).prop_map(MemoryOp::Restore),
    ]
}

/// Floyd-Warshall reference distances.
fn reference_distance(n: usize, edges: &[(usize, usize, u32)], from: usize, to: usize) -> Option<u64> {
    let mut dist = vec![vec![None::<u64>; n]; n];
    for (i, row) in dist.iter_mut().enumerate() {
        row[i] = Some(0);
    }
    for &(a, b, c) in edges {
        let cost = u64::from(c);
        if dist[a][b].is_none_or(|d| cost < d) {
            dist[a][b] = Some(cost);
        }
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if let (Some(ik), Some(kj)) = (dist[i][k], dist[k][j]) {
                    if dist[i][j].is_none_or(|d| ik + kj < d) {
                        dist[i][j] = Some(ik + kj);
                    }
                }
            }
        }
    }
    dist[from][to]
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Fusing an already fused list changes nothing.
    #[test]
    fn fusion_is_idempotent(
        matches in vec(arb_match(), 0..16),
        gap_x in 0i32..20,
        gap_y in 0i32..20,
    ) {
        let fusion = MatchFusion::absolute(gap_x, gap_y);
        let once = fusion.fuse(&matches);
        let twice = fusion.fuse(&once);
        prop_assert_eq!(once, twice);
    }

    /// Fusion output does not depend on input order.
    #[test]
    fn fusion_is_order_independent(
        (original, shuffled) in vec(arb_match(), 0..16)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle())),
        gap in 0i32..20,
    ) {
        let fusion = MatchFusion::absolute(gap, gap);
        prop_assert_eq!(
            region_set(&fusion.fuse(&original)),
            region_set(&fusion.fuse(&shuffled))
        );
    }

    /// Fusion never loses covered area: every input lies inside some output.
    #[test]
    fn fusion_covers_inputs(matches in vec(arb_match(), 1..16), gap in 0i32..20) {
        let fused = MatchFusion::absolute(gap, gap).fuse(&matches);
        prop_assert!(fused.len() <= matches.len());
        for m in &matches {
            prop_assert!(fused.iter().any(|f| f.region.contains(&m.region)));
        }
    }

    /// CONFIRM output is a subset of the first step's matches.
    #[test]
    fn confirm_preserves_originals(
        originals in vec(arb_match(), 1..10),
        confirming in vec(arb_match(), 1..10),
    ) {
        let chain = ActionChain::builder(ChainingStrategy::Confirm)
            .step_on(find_everything(), vec![recorded("original", originals.clone())])
            .step_on(find_everything(), vec![recorded("confirming", confirming)])
            .build();
        let result = run_chain(&chain);

        for m in &result.matches {
            prop_assert!(originals.iter().any(|o| o.region == m.region));
        }
        prop_assert_eq!(result.success, !result.matches.is_empty());
    }

    /// NESTED second-stage matches lie inside a first-stage match.
    #[test]
    fn nested_restricts_search_space(
        outer in vec(arb_match(), 1..6),
        inner in vec(arb_match(), 1..20),
    ) {
        let chain = ActionChain::builder(ChainingStrategy::Nested)
            .step_on(find_everything(), vec![recorded("outer", outer.clone())])
            .step_on(find_everything(), vec![recorded("inner", inner)])
            .build();
        let result = run_chain(&chain);

        if result.success {
            prop_assert_eq!(result.steps.len(), 2);
            for m in &result.matches {
                prop_assert!(outer.iter().any(|o| o.region.contains(&m.region)));
            }
        }
    }

    /// No state is ever both active and hidden, or hidden twice.
    #[test]
    fn memory_stack_invariant(ops in vec(arb_memory_op(), 0..60)) {
        let mut memory = StateMemory::new();
        for op in ops {
            match op {
                MemoryOp::Activate(id) => memory.activate(StateId(id)),
                MemoryOp::Deactivate(id) => {
                    memory.deactivate(StateId(id));
                }
                MemoryOp::Push(hider, hidden) => memory.push_hidden(StateId(hider), StateId(hidden)),
                MemoryOp::Pop(hider) => {
                    memory.pop_hidden(StateId(hider));
                }
                MemoryOp::Restore(hider) => {
                    memory.restore_hidden(StateId(hider));
                    prop_assert!(memory.hidden_under(StateId(hider)).is_empty());
                }
            }
            prop_assert!(memory.check_invariants());
        }
    }

    /// Planned paths are as cheap as the reference shortest path.
    #[test]
    fn planned_path_is_optimal(
        edges in vec((0usize..6, 0usize..6, 0u32..20), 0..20),
        start in 0usize..6,
        goal in 0usize..6,
    ) {
        let names: Vec<String> = (0..6).map(|i| format!("S{i}")).collect();
        let mut graph = StateGraph::new();
        for name in &names {
            graph
                .register_state(StateDefinition::new(name.clone()).always_verified())
                .expect("state");
        }
        let edges: Vec<(usize, usize, u32)> = edges.into_iter().filter(|(a, b, _)| a != b).collect();
        for &(a, b, cost) in &edges {
            graph
                .register_transition(TransitionDefinition::to(names[a].clone(), names[b].clone()).cost(cost))
                .expect("transition");
        }

        let id = |i: usize| graph.state_id(&names[i]).expect("id");
        let memory = StateMemory::with_active([id(start)]);
        let planned = PathFinder::plan(&graph, &memory, id(goal));
        let expected = reference_distance(names.len(), &edges, start, goal);

        prop_assert_eq!(planned.as_ref().map(|p| p.cost()), expected);
        if let Some(path) = planned {
            let states = path.states();
            if !path.is_empty() {
                prop_assert_eq!(states.first().copied(), Some(id(start)));
                prop_assert_eq!(states.last().copied(), Some(id(goal)));
            }
            // planning is a pure function of graph and memory
            prop_assert_eq!(Some(path), PathFinder::plan(&graph, &memory, id(goal)));
        }
    }

    /// Equal seeds replay identical snapshots.
    #[test]
    fn seeded_replay_is_reproducible(count in 1usize..20, seed in any::<u64>()) {
        let mut history = ActionHistory::new();
        for i in 0..count {
            let x = i32::try_from(i).expect("small") * 50;
            history.push(ActionRecord::new(
                ActionKind::Find,
                vec![Match::new(Region::new(x, 0, 10, 10), Similarity::EXACT)],
            ));
        }
        let mut a = SnapshotSelector::seeded(seed);
        let mut b = SnapshotSelector::seeded(seed);
        let run_a: Vec<_> = (0..10).map(|_| history.sample(ActionKind::Find, &mut a)).collect();
        let run_b: Vec<_> = (0..10).map(|_| history.sample(ActionKind::Find, &mut b)).collect();
        prop_assert_eq!(run_a, run_b);
    }

    /// Similarity never exceeds the scale.
    #[test]
    fn similarity_is_clamped(bp in any::<u16>()) {
        prop_assert!(Similarity::from_basis_points(bp) <= Similarity::EXACT);
    }
}

#[test]
fn reference_distance_sanity() {
    let edges = [(0, 1, 1), (1, 2, 2), (0, 2, 5)];
    assert_eq!(reference_distance(3, &edges, 0, 2), Some(3));
    assert_eq!(reference_distance(3, &edges, 2, 0), None);

    let mut seen: BTreeMap<usize, u64> = BTreeMap::new();
    for target in 0..3 {
        if let Some(d) = reference_distance(3, &edges, 0, target) {
            seen.insert(target, d);
        }
    }
    assert_eq!(seen.len(), 3);
}
