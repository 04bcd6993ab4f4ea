//! Conditional chains: branch on whether the previous chain succeeded.
//!
//! This is how callers compose fallbacks ("if the button is not found, open
//! the menu first") without the engine retrying anything on its own.

use super::{ActionChain, ActionExecutor, ActionResult, ChainComposer};
use crate::{ObjectCollection, WaypointError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// Only after a successful step.
    IfFound,
    /// Only after an unsuccessful step.
    IfNotFound,
}

impl Condition {
    /// Whether a step guarded by this condition runs, given the outcome of
    /// the last executed chain (`None` before any chain ran).
    #[must_use]
    pub fn admits(&self, previous: Option<bool>) -> bool {
        match self {
            Condition::Always => true,
            Condition::IfFound => previous == Some(true),
            Condition::IfNotFound => previous == Some(false),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConditionalStep {
    Perform(ActionChain),
    Log(String),
    Stop,
}

/// An ordered list of guarded steps.
#[derive(Debug, Clone)]
pub struct ConditionalChain {
    steps: Vec<(Condition, ConditionalStep)>,
}

impl ConditionalChain {
    /// Start with a chain that always runs.
    #[must_use]
    pub fn start(chain: ActionChain) -> Self {
        Self {
            steps: vec![(Condition::Always, ConditionalStep::Perform(chain))],
        }
    }

    #[must_use]
    pub fn then(self, chain: ActionChain) -> Self {
        self.push(Condition::Always, ConditionalStep::Perform(chain))
    }

    #[must_use]
    pub fn if_found(self, chain: ActionChain) -> Self {
        self.push(Condition::IfFound, ConditionalStep::Perform(chain))
    }

    #[must_use]
    pub fn if_not_found(self, chain: ActionChain) -> Self {
        self.push(Condition::IfNotFound, ConditionalStep::Perform(chain))
    }

    #[must_use]
    pub fn if_found_log(self, message: impl Into<String>) -> Self {
        self.push(Condition::IfFound, ConditionalStep::Log(message.into()))
    }

    #[must_use]
    pub fn if_not_found_log(self, message: impl Into<String>) -> Self {
        self.push(Condition::IfNotFound, ConditionalStep::Log(message.into()))
    }

    #[must_use]
    pub fn stop_if_found(self) -> Self {
        self.push(Condition::IfFound, ConditionalStep::Stop)
    }

    #[must_use]
    pub fn stop_if_not_found(self) -> Self {
        self.push(Condition::IfNotFound, ConditionalStep::Stop)
    }

    #[must_use]
    pub fn push(mut self, condition: Condition, step: ConditionalStep) -> Self {
        self.steps.push((condition, step));
        self
    }

    #[must_use]
    pub fn steps(&self) -> &[(Condition, ConditionalStep)] {
        &self.steps
    }

    /// Run the guarded steps in order and return the last executed chain's
    /// result. Log steps do not change the outcome that later guards see.
    pub fn execute(
        &self,
        executor: &mut ActionExecutor<'_>,
        collections: &[ObjectCollection],
    ) -> Result<ActionResult, WaypointError> {
        let mut last: Option<ActionResult> = None;

        for (condition, step) in &self.steps {
            if !condition.admits(last.as_ref().map(|r| r.success)) {
                continue;
            }
            match step {
                ConditionalStep::Perform(chain) => {
                    last = Some(ChainComposer::execute(executor, chain, collections)?);
                }
                ConditionalStep::Log(message) => tracing::info!("{message}"),
                ConditionalStep::Stop => break,
            }
        }

        Ok(last.unwrap_or_else(|| ActionResult::new(None)))
    }
}
