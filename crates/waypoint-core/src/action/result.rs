//! Outcome of a single action invocation or a whole chain.

use super::ActionKind;
use crate::{Match, ObjectCollection, Region};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-step summary kept for diagnostics when results are combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSummary {
    pub kind: ActionKind,
    pub success: bool,
    pub match_count: usize,
    pub duration: Duration,
}

/// The outcome of an action.
///
/// `success` is decided by [`SuccessCriteria`](super::SuccessCriteria) once
/// the step is complete. A miss is an unsuccessful result, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Kind of the last executed step, if any step ran.
    pub kind: Option<ActionKind>,
    pub matches: Vec<Match>,
    pub success: bool,
    pub duration: Duration,
    /// Region produced by Define steps.
    pub defined_region: Option<Region>,
    /// Text typed or read during the action.
    pub text: Vec<String>,
    /// The collections the action operated on.
    pub collections: Vec<ObjectCollection>,
    /// Actuator primitives that reported failure.
    pub primitive_failures: usize,
    pub steps: Vec<StepSummary>,
}

impl ActionResult {
    /// An empty, unsuccessful result for a step of the given kind.
    #[must_use]
    pub fn new(kind: Option<ActionKind>) -> Self {
        Self {
            kind,
            matches: Vec::new(),
            success: false,
            duration: Duration::ZERO,
            defined_region: None,
            text: Vec::new(),
            collections: Vec::new(),
            primitive_failures: 0,
            steps: Vec::new(),
        }
    }

    /// Whether at least one match was produced.
    #[must_use]
    pub fn found(&self) -> bool {
        !self.matches.is_empty()
    }

    /// The highest-scoring match; earlier matches win ties.
    #[must_use]
    pub fn best_match(&self) -> Option<&Match> {
        self.matches
            .iter()
            .reduce(|best, m| if m.score > best.score { m } else { best })
    }

    #[must_use]
    pub fn regions(&self) -> Vec<Region> {
        self.matches.iter().map(|m| m.region).collect()
    }

    /// Wrap the matches as a collection for the next step.
    #[must_use]
    pub fn as_collection(&self) -> ObjectCollection {
        ObjectCollection::from_matches(self.matches.clone())
    }

    /// Fold another step's result into this one.
    ///
    /// Matches, text and step summaries are appended; durations add up. The
    /// success flag is left to the caller.
    pub fn absorb(&mut self, other: ActionResult) {
        self.kind = other.kind.or(self.kind);
        self.matches.extend(other.matches);
        self.duration = self.duration.saturating_add(other.duration);
        if other.defined_region.is_some() {
            self.defined_region = other.defined_region;
        }
        self.text.extend(other.text);
        self.collections.extend(other.collections);
        self.primitive_failures = self.primitive_failures.saturating_add(other.primitive_failures);
        self.steps.extend(other.steps);
    }

    /// Like [`absorb`](Self::absorb), but keeps this result's matches.
    pub fn absorb_without_matches(&mut self, mut other: ActionResult) {
        other.matches.clear();
        self.absorb(other);
    }
}
