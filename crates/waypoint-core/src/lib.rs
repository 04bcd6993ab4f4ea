//! # waypoint-core
//!
//! The model-based GUI automation engine for Waypoint - THE LOGIC.
//!
//! The target application is modelled as a graph of recognizable States
//! connected by costed Transitions. The engine keeps a runtime belief of
//! which states are on screen, plans the cheapest path to a requested state,
//! and executes it through composed action chains whose success is judged by
//! per-kind criteria.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is synchronous: every chain step and navigation hop observes the
//!   completed result of the previous one
//! - Never touches a screen or an input device; perception and actuation are
//!   injected adapters (`PerceptionProvider`, `Actuator`)
//! - Is deterministic by default: `BTreeMap`/`BTreeSet` only, integer
//!   arithmetic only, randomness only through an explicit `SnapshotSelector`
//! - Has NO async, NO network dependencies (pure Rust)
//! - Reports expected failures as values, raising errors only for
//!   configuration problems and broken environments

// =============================================================================
// MODULES
// =============================================================================

pub mod action;
pub mod adapters;
pub mod engine;
pub mod events;
pub mod formats;
pub mod fusion;
pub mod graph;
pub mod memory;
pub mod navigator;
pub mod primitives;
pub mod replay;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AdapterError, Location, Match, ObjectCollection, Pattern, Region, Similarity, StateId,
    TransitionId, WaypointError,
};

// =============================================================================
// RE-EXPORTS: Actions
// =============================================================================

pub use action::{
    ActionChain, ActionConfig, ActionKind, ActionOptions, ActionResult, ChainComposer,
    ChainingStrategy, ConditionalChain, DefineAs, FindStrategy, MouseButton, OverlapThreshold,
    SuccessCriteria,
};

// =============================================================================
// RE-EXPORTS: State Model and Navigation
// =============================================================================

pub use engine::{Engine, EngineBuilder};
pub use graph::{
    State, StateDefinition, StateGraph, TargetRef, Transition, TransitionDefinition,
    TransitionTarget,
};
pub use memory::StateMemory;
pub use navigator::{
    HopFailure, NavigationFailure, NavigationOutcome, Navigator, Path, PathFinder,
};

// =============================================================================
// RE-EXPORTS: Adapters, Replay, Observability, Formats
// =============================================================================

pub use adapters::{Actuator, FindOptions, PerceptionProvider, Primitive, RecordingActuator};
pub use events::{EngineEvent, EventLog, EventSink, NullSink, TracingSink};
pub use formats::{history_from_bytes, history_to_bytes};
pub use fusion::{FusionMethod, MatchFusion};
pub use replay::{ActionHistory, ActionRecord, HistoryReplay, HistoryStore, SnapshotSelector};
