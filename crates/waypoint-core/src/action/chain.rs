//! # Action Chains
//!
//! An `ActionChain` is an immutable, ordered list of steps plus the strategy
//! that relates them. `ChainComposer` executes chains:
//!
//! - SEQUENTIAL: every step runs against its own targets (or the caller's);
//!   matches are concatenated.
//! - NESTED: every step after the first searches only inside the previous
//!   step's matches; the output is the last stage's matches.
//! - CONFIRM: later steps run independently and only filter the first step's
//!   matches by overlap; the output is a subset of the first step's matches.
//!
//! Every strategy stops at the first step that fails its success criteria.
//! The returned result is then unsuccessful but carries what was accumulated.

use super::{ActionConfig, ActionExecutor, ActionResult, ChainingStrategy, OverlapThreshold};
use crate::{Match, ObjectCollection, Region, WaypointError};

/// One step of a chain and the targets it is bound to.
///
/// Steps without bound targets operate on the collections handed to the
/// composer at execution time.
#[derive(Debug, Clone)]
pub struct ChainStep {
    pub config: ActionConfig,
    pub targets: Vec<ObjectCollection>,
}

/// An immutable, ordered chain of action steps.
#[derive(Debug, Clone)]
pub struct ActionChain {
    steps: Vec<ChainStep>,
    strategy: ChainingStrategy,
    overlap: OverlapThreshold,
}

impl ActionChain {
    /// Flatten a config and its subsequent steps into a chain.
    ///
    /// The strategy and overlap threshold are taken from the root config.
    #[must_use]
    pub fn from_config(config: &ActionConfig) -> Self {
        let mut steps = Vec::new();
        flatten(config, &mut steps);
        Self {
            steps,
            strategy: config.chaining(),
            overlap: config.overlap(),
        }
    }

    /// A chain with no steps. Always succeeds.
    #[must_use]
    pub fn unconditional() -> Self {
        Self {
            steps: Vec::new(),
            strategy: ChainingStrategy::Sequential,
            overlap: OverlapThreshold::ANY,
        }
    }

    pub fn builder(strategy: ChainingStrategy) -> ActionChainBuilder {
        ActionChainBuilder {
            chain: Self {
                steps: Vec::new(),
                strategy,
                overlap: OverlapThreshold::ANY,
            },
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    #[must_use]
    pub fn strategy(&self) -> ChainingStrategy {
        self.strategy
    }

    #[must_use]
    pub fn overlap(&self) -> OverlapThreshold {
        self.overlap
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Short description, e.g. `nested[find, click]`.
    #[must_use]
    pub fn describe(&self) -> String {
        if self.steps.is_empty() {
            return "always".to_string();
        }
        let strategy = match self.strategy {
            ChainingStrategy::Sequential => "sequential",
            ChainingStrategy::Nested => "nested",
            ChainingStrategy::Confirm => "confirm",
        };
        let kinds: Vec<&str> = self.steps.iter().map(|s| s.config.kind().name()).collect();
        format!("{strategy}[{}]", kinds.join(", "))
    }
}

fn flatten(config: &ActionConfig, out: &mut Vec<ChainStep>) {
    out.push(ChainStep {
        config: config.clone(),
        targets: Vec::new(),
    });
    for next in config.subsequent() {
        flatten(next, out);
    }
}

/// Fluent builder for [`ActionChain`].
#[derive(Debug, Clone)]
pub struct ActionChainBuilder {
    chain: ActionChain,
}

impl ActionChainBuilder {
    /// Append a step operating on the caller's collections.
    #[must_use]
    pub fn step(mut self, config: ActionConfig) -> Self {
        self.chain.steps.push(ChainStep {
            config,
            targets: Vec::new(),
        });
        self
    }

    /// Append a step bound to its own targets.
    #[must_use]
    pub fn step_on(mut self, config: ActionConfig, targets: Vec<ObjectCollection>) -> Self {
        self.chain.steps.push(ChainStep { config, targets });
        self
    }

    #[must_use]
    pub fn overlap(mut self, threshold: OverlapThreshold) -> Self {
        self.chain.overlap = threshold;
        self
    }

    /// Build an independent chain. The builder stays usable.
    #[must_use]
    pub fn build(&self) -> ActionChain {
        self.chain.clone()
    }
}

// =============================================================================
// COMPOSER
// =============================================================================

/// Executes action chains.
pub struct ChainComposer;

impl ChainComposer {
    /// Run `chain`. `collections` feed every step without bound targets.
    pub fn execute(
        executor: &mut ActionExecutor<'_>,
        chain: &ActionChain,
        collections: &[ObjectCollection],
    ) -> Result<ActionResult, WaypointError> {
        if chain.is_empty() {
            let mut result = ActionResult::new(None);
            result.success = true;
            return Ok(result);
        }
        let result = match chain.strategy {
            ChainingStrategy::Sequential => Self::sequential(executor, chain, collections)?,
            ChainingStrategy::Nested => Self::nested(executor, chain, collections)?,
            ChainingStrategy::Confirm => Self::confirm(executor, chain, collections)?,
        };
        tracing::trace!(
            chain = %chain.describe(),
            success = result.success,
            matches = result.matches.len(),
            "chain finished"
        );
        Ok(result)
    }

    fn sequential(
        executor: &mut ActionExecutor<'_>,
        chain: &ActionChain,
        collections: &[ObjectCollection],
    ) -> Result<ActionResult, WaypointError> {
        let mut total = ActionResult::new(None);
        for step in &chain.steps {
            let result = executor.perform(&step.config, targets(step, collections), &[])?;
            let ok = result.success;
            total.absorb(result);
            if !ok {
                total.success = false;
                return Ok(total);
            }
        }
        total.success = true;
        Ok(total)
    }

    fn nested(
        executor: &mut ActionExecutor<'_>,
        chain: &ActionChain,
        collections: &[ObjectCollection],
    ) -> Result<ActionResult, WaypointError> {
        let mut total = ActionResult::new(None);
        let mut previous: Option<Vec<Match>> = None;

        for step in &chain.steps {
            let result = match &previous {
                None => executor.perform(&step.config, targets(step, collections), &[])?,
                Some(prior) => {
                    let scope: Vec<Region> = prior.iter().map(|m| m.region).collect();
                    let own = targets(step, collections);
                    if own.iter().any(|c| !c.patterns.is_empty()) {
                        executor.perform(&step.config, own, &scope)?
                    } else {
                        let carried = [ObjectCollection::from_matches(prior.clone())];
                        executor.perform(&step.config, &carried, &scope)?
                    }
                }
            };

            if !result.success || !result.found() {
                total.absorb_without_matches(result);
                total.success = false;
                return Ok(total);
            }
            total.matches.clone_from(&result.matches);
            previous = Some(result.matches.clone());
            total.absorb_without_matches(result);
        }
        total.success = true;
        Ok(total)
    }

    fn confirm(
        executor: &mut ActionExecutor<'_>,
        chain: &ActionChain,
        collections: &[ObjectCollection],
    ) -> Result<ActionResult, WaypointError> {
        let mut total = ActionResult::new(None);
        let mut survivors: Option<Vec<Match>> = None;

        for step in &chain.steps {
            let result = executor.perform(&step.config, targets(step, collections), &[])?;
            let ok = result.success;
            let confirming = result.matches.clone();
            total.absorb_without_matches(result);

            survivors = Some(match survivors {
                None => confirming,
                Some(originals) => originals
                    .into_iter()
                    .filter(|o| {
                        confirming
                            .iter()
                            .any(|c| chain.overlap.is_satisfied(&o.region, &c.region))
                    })
                    .collect(),
            });
            total.matches = survivors.clone().unwrap_or_default();

            if !ok || total.matches.is_empty() {
                total.success = false;
                return Ok(total);
            }
        }
        total.success = true;
        Ok(total)
    }
}

fn targets<'c>(step: &'c ChainStep, fallback: &'c [ObjectCollection]) -> &'c [ObjectCollection] {
    if step.targets.is_empty() {
        fallback
    } else {
        &step.targets
    }
}

// =============================================================================
// TESTS
// =============================================================================
