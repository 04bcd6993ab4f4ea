//! # Action Module
//!
//! Action configurations and everything that executes them:
//! - `ActionConfig`: immutable, builder-constructed step configuration
//! - `ActionResult`: the outcome of one invocation
//! - `SuccessCriteria`: per-kind success predicates
//! - `ActionExecutor`: runs one step against the adapters
//! - `ChainComposer`: runs multi-step chains (SEQUENTIAL / NESTED / CONFIRM)
//! - `ConditionalChain`: if-found / if-not-found branching over chains
//!
//! Every step is synchronous: pauses block the calling thread, and each step
//! observes the completed result of the previous one.

mod chain;
mod conditional;
mod criteria;
mod executor;
mod result;

pub use chain::{ActionChain, ActionChainBuilder, ChainComposer, ChainStep};
pub use conditional::{Condition, ConditionalChain, ConditionalStep};
pub use criteria::SuccessCriteria;
pub use executor::ActionExecutor;
pub(crate) use executor::millis;
pub use result::{ActionResult, StepSummary};

use crate::fusion::MatchFusion;
use crate::primitives::{DEFAULT_MIN_SIMILARITY, SIMILARITY_SCALE};
use crate::{Region, Similarity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// ACTION KIND
// =============================================================================

/// The kind of an action step. Read once from the options at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Find,
    Click,
    Type,
    Drag,
    Move,
    Vanish,
    Highlight,
    Define,
    KeyDown,
    KeyUp,
}

impl ActionKind {
    /// Get the kind name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Find => "find",
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Drag => "drag",
            ActionKind::Move => "move",
            ActionKind::Vanish => "vanish",
            ActionKind::Highlight => "highlight",
            ActionKind::Define => "define",
            ActionKind::KeyDown => "key_down",
            ActionKind::KeyUp => "key_up",
        }
    }

    /// Whether this kind locates targets on screen before acting.
    #[must_use]
    pub fn searches(&self) -> bool {
        !matches!(self, ActionKind::Type | ActionKind::KeyDown | ActionKind::KeyUp)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// KIND-SPECIFIC OPTIONS
// =============================================================================

/// Which candidates a search keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FindStrategy {
    /// The first candidate of each pattern.
    #[default]
    First,
    /// The single highest-scoring candidate across all patterns.
    Best,
    /// The highest-scoring candidate of each pattern.
    Each,
    /// Every candidate.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// How a Define step turns matches into a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DefineAs {
    /// Bounding box of every match.
    #[default]
    MatchUnion,
    /// Region of the first match.
    FirstMatch,
}

/// Kind-tagged parameters. One variant per action kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOptions {
    Find,
    Click { clicks: u32, button: MouseButton },
    Type { modifiers: Vec<String> },
    Drag,
    Move,
    Vanish,
    Highlight { duration: Duration },
    Define { define_as: DefineAs },
    KeyDown { modifiers: Vec<String> },
    KeyUp,
}

impl ActionOptions {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionOptions::Find => ActionKind::Find,
            ActionOptions::Click { .. } => ActionKind::Click,
            ActionOptions::Type { .. } => ActionKind::Type,
            ActionOptions::Drag => ActionKind::Drag,
            ActionOptions::Move => ActionKind::Move,
            ActionOptions::Vanish => ActionKind::Vanish,
            ActionOptions::Highlight { .. } => ActionKind::Highlight,
            ActionOptions::Define { .. } => ActionKind::Define,
            ActionOptions::KeyDown { .. } => ActionKind::KeyDown,
            ActionOptions::KeyUp => ActionKind::KeyUp,
        }
    }
}

// =============================================================================
// CHAINING
// =============================================================================

/// How the steps of a chain relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChainingStrategy {
    /// Every step runs against the original targets; results concatenate.
    #[default]
    Sequential,
    /// Every step searches inside the previous step's matches.
    Nested,
    /// Later steps filter the first step's matches by overlap.
    Confirm,
}

/// Minimum overlap required for a CONFIRM step to keep an original match.
///
/// Expressed in basis points of the original match's area. Zero means any
/// intersecting area is enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct OverlapThreshold(u16);

impl OverlapThreshold {
    pub const ANY: Self = Self(0);

    #[must_use]
    pub const fn from_basis_points(bp: u16) -> Self {
        if bp > SIMILARITY_SCALE {
            Self(SIMILARITY_SCALE)
        } else {
            Self(bp)
        }
    }

    #[must_use]
    pub const fn basis_points(self) -> u16 {
        self.0
    }

    /// Whether `confirming` covers enough of `original`.
    #[must_use]
    pub fn is_satisfied(&self, original: &Region, confirming: &Region) -> bool {
        let Some(shared) = original.intersection(confirming) else {
            return false;
        };
        let required = original.area().saturating_mul(i64::from(self.0));
        shared.area().saturating_mul(i64::from(SIMILARITY_SCALE)) >= required
    }
}

// =============================================================================
// SUCCESS PREDICATE
// =============================================================================

/// A caller-supplied success predicate. Always overrides the kind default.
#[derive(Clone)]
pub struct SuccessPredicate(Arc<dyn Fn(&ActionResult) -> bool + Send + Sync>);

impl SuccessPredicate {
    pub fn new(predicate: impl Fn(&ActionResult) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    #[must_use]
    pub fn test(&self, result: &ActionResult) -> bool {
        (self.0)(result)
    }
}

impl fmt::Debug for SuccessPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SuccessPredicate(..)")
    }
}

// =============================================================================
// ACTION CONFIG
// =============================================================================

/// Immutable configuration of one action step, plus the steps that follow it.
///
/// Constructed through [`ActionConfigBuilder`]. A built config never changes;
/// later modifications of the builder produce new configs.
#[derive(Debug, Clone)]
pub struct ActionConfig {
    options: ActionOptions,
    kind: ActionKind,
    strategy: FindStrategy,
    min_similarity: Similarity,
    fusion: Option<MatchFusion>,
    pause_before_begin: Duration,
    pause_after_end: Duration,
    pause_between_collections: Duration,
    max_wait: Duration,
    success: Option<SuccessPredicate>,
    subsequent: Vec<ActionConfig>,
    chaining: ChainingStrategy,
    overlap: OverlapThreshold,
}

impl ActionConfig {
    pub fn builder(options: ActionOptions) -> ActionConfigBuilder {
        ActionConfigBuilder::new(options)
    }

    pub fn find() -> ActionConfigBuilder {
        Self::builder(ActionOptions::Find)
    }

    pub fn click() -> ActionConfigBuilder {
        Self::builder(ActionOptions::Click {
            clicks: 1,
            button: MouseButton::Left,
        })
    }

    pub fn type_text() -> ActionConfigBuilder {
        Self::builder(ActionOptions::Type {
            modifiers: Vec::new(),
        })
    }

    pub fn drag() -> ActionConfigBuilder {
        Self::builder(ActionOptions::Drag)
    }

    pub fn move_to() -> ActionConfigBuilder {
        Self::builder(ActionOptions::Move)
    }

    pub fn vanish() -> ActionConfigBuilder {
        Self::builder(ActionOptions::Vanish)
    }

    pub fn highlight() -> ActionConfigBuilder {
        Self::builder(ActionOptions::Highlight {
            duration: Duration::from_millis(500),
        })
    }

    pub fn define() -> ActionConfigBuilder {
        Self::builder(ActionOptions::Define {
            define_as: DefineAs::MatchUnion,
        })
    }

    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    #[must_use]
    pub fn options(&self) -> &ActionOptions {
        &self.options
    }

    #[must_use]
    pub fn strategy(&self) -> FindStrategy {
        self.strategy
    }

    #[must_use]
    pub fn min_similarity(&self) -> Similarity {
        self.min_similarity
    }

    #[must_use]
    pub fn fusion(&self) -> Option<&MatchFusion> {
        self.fusion.as_ref()
    }

    #[must_use]
    pub fn pause_before_begin(&self) -> Duration {
        self.pause_before_begin
    }

    #[must_use]
    pub fn pause_after_end(&self) -> Duration {
        self.pause_after_end
    }

    #[must_use]
    pub fn pause_between_collections(&self) -> Duration {
        self.pause_between_collections
    }

    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    #[must_use]
    pub fn success_predicate(&self) -> Option<&SuccessPredicate> {
        self.success.as_ref()
    }

    /// Steps that follow this one, in order.
    #[must_use]
    pub fn subsequent(&self) -> &[ActionConfig] {
        &self.subsequent
    }

    #[must_use]
    pub fn chaining(&self) -> ChainingStrategy {
        self.chaining
    }

    #[must_use]
    pub fn overlap(&self) -> OverlapThreshold {
        self.overlap
    }
}

/// Fluent builder for [`ActionConfig`].
#[derive(Debug, Clone)]
pub struct ActionConfigBuilder {
    config: ActionConfig,
}

impl ActionConfigBuilder {
    #[must_use]
    pub fn new(options: ActionOptions) -> Self {
        let kind = options.kind();
        Self {
            config: ActionConfig {
                options,
                kind,
                strategy: FindStrategy::default(),
                min_similarity: Similarity::from_basis_points(DEFAULT_MIN_SIMILARITY),
                fusion: None,
                pause_before_begin: Duration::ZERO,
                pause_after_end: Duration::ZERO,
                pause_between_collections: Duration::ZERO,
                max_wait: Duration::ZERO,
                success: None,
                subsequent: Vec::new(),
                chaining: ChainingStrategy::default(),
                overlap: OverlapThreshold::ANY,
            },
        }
    }

    #[must_use]
    pub fn strategy(mut self, strategy: FindStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    #[must_use]
    pub fn min_similarity(mut self, similarity: Similarity) -> Self {
        self.config.min_similarity = similarity;
        self
    }

    #[must_use]
    pub fn fusion(mut self, fusion: MatchFusion) -> Self {
        self.config.fusion = Some(fusion);
        self
    }

    #[must_use]
    pub fn pause_before_begin(mut self, pause: Duration) -> Self {
        self.config.pause_before_begin = pause;
        self
    }

    #[must_use]
    pub fn pause_after_end(mut self, pause: Duration) -> Self {
        self.config.pause_after_end = pause;
        self
    }

    #[must_use]
    pub fn pause_between_collections(mut self, pause: Duration) -> Self {
        self.config.pause_between_collections = pause;
        self
    }

    #[must_use]
    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.config.max_wait = wait;
        self
    }

    /// Number of clicks; ignored by kinds other than Click.
    #[must_use]
    pub fn clicks(mut self, count: u32) -> Self {
        if let ActionOptions::Click { clicks, .. } = &mut self.config.options {
            *clicks = count;
        }
        self
    }

    /// Mouse button; ignored by kinds other than Click.
    #[must_use]
    pub fn button(mut self, which: MouseButton) -> Self {
        if let ActionOptions::Click { button, .. } = &mut self.config.options {
            *button = which;
        }
        self
    }

    /// Held modifier keys; ignored by kinds other than Type and KeyDown.
    #[must_use]
    pub fn modifier(mut self, key: impl Into<String>) -> Self {
        match &mut self.config.options {
            ActionOptions::Type { modifiers } | ActionOptions::KeyDown { modifiers } => {
                modifiers.push(key.into());
            }
            _ => {}
        }
        self
    }

    /// Define mode; ignored by kinds other than Define.
    #[must_use]
    pub fn define_as(mut self, mode: DefineAs) -> Self {
        if let ActionOptions::Define { define_as } = &mut self.config.options {
            *define_as = mode;
        }
        self
    }

    /// Override the kind's default success predicate.
    #[must_use]
    pub fn success_when(
        mut self,
        predicate: impl Fn(&ActionResult) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.config.success = Some(SuccessPredicate::new(predicate));
        self
    }

    /// Append a step that runs after this one.
    #[must_use]
    pub fn then(mut self, next: ActionConfig) -> Self {
        self.config.subsequent.push(next);
        self
    }

    /// The strategy applied when advancing to subsequent steps.
    #[must_use]
    pub fn chaining(mut self, strategy: ChainingStrategy) -> Self {
        self.config.chaining = strategy;
        self
    }

    /// Overlap required by CONFIRM chains.
    #[must_use]
    pub fn overlap(mut self, threshold: OverlapThreshold) -> Self {
        self.config.overlap = threshold;
        self
    }

    /// Build an independent config. The builder stays usable.
    #[must_use]
    pub fn build(&self) -> ActionConfig {
        self.config.clone()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_derived_from_options() {
        assert_eq!(ActionConfig::click().build().kind(), ActionKind::Click);
        assert_eq!(ActionConfig::vanish().build().kind(), ActionKind::Vanish);
        assert_eq!(
            ActionConfig::builder(ActionOptions::KeyUp).build().kind(),
            ActionKind::KeyUp
        );
    }

    #[test]
    fn builder_changes_do_not_leak_into_built_config() {
        let builder = ActionConfig::click().clicks(1);
        let single = builder.build();
        let double = builder.clicks(2).build();

        assert_eq!(
            single.options(),
            &ActionOptions::Click {
                clicks: 1,
                button: MouseButton::Left
            }
        );
        assert_eq!(
            double.options(),
            &ActionOptions::Click {
                clicks: 2,
                button: MouseButton::Left
            }
        );
    }

    #[test]
    fn kind_specific_setters_ignore_other_kinds() {
        let config = ActionConfig::find().clicks(3).modifier("ctrl").build();
        assert_eq!(config.options(), &ActionOptions::Find);

        let typed = ActionConfig::type_text().modifier("shift").build();
        assert_eq!(
            typed.options(),
            &ActionOptions::Type {
                modifiers: vec!["shift".to_string()]
            }
        );
    }

    #[test]
    fn then_collects_subsequent_steps() {
        let config = ActionConfig::find()
            .then(ActionConfig::click().build())
            .then(ActionConfig::type_text().build())
            .chaining(ChainingStrategy::Nested)
            .build();

        let kinds: Vec<_> = config.subsequent().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec![ActionKind::Click, ActionKind::Type]);
        assert_eq!(config.chaining(), ChainingStrategy::Nested);
    }

    #[test]
    fn overlap_threshold_any_requires_intersection() {
        let original = Region::new(0, 0, 10, 10);
        assert!(OverlapThreshold::ANY.is_satisfied(&original, &Region::new(9, 9, 5, 5)));
        assert!(!OverlapThreshold::ANY.is_satisfied(&original, &Region::new(10, 0, 5, 5)));
    }

    #[test]
    fn overlap_threshold_fraction() {
        let original = Region::new(0, 0, 10, 10);
        let half = Region::new(0, 0, 5, 10);
        assert!(OverlapThreshold::from_basis_points(5_000).is_satisfied(&original, &half));
        assert!(!OverlapThreshold::from_basis_points(5_001).is_satisfied(&original, &half));
    }
}
