//! Success criteria.
//!
//! Every action kind has a default predicate over its completed result. A
//! predicate supplied in the config always takes precedence.

use super::{ActionConfig, ActionKind, ActionResult};

impl ActionKind {
    /// The default success predicate of this kind.
    #[must_use]
    pub fn default_success(&self, result: &ActionResult) -> bool {
        match self {
            ActionKind::Find | ActionKind::Click | ActionKind::Move | ActionKind::Drag => {
                result.found()
            }
            ActionKind::Vanish => !result.found(),
            ActionKind::Type | ActionKind::Highlight | ActionKind::KeyDown | ActionKind::KeyUp => {
                true
            }
            ActionKind::Define => result.defined_region.is_some_and(|r| r.is_defined()),
        }
    }
}

/// Evaluates and applies success predicates.
pub struct SuccessCriteria;

impl SuccessCriteria {
    /// Evaluate the config's predicate against a completed result.
    #[must_use]
    pub fn evaluate(config: &ActionConfig, result: &ActionResult) -> bool {
        match config.success_predicate() {
            Some(predicate) => predicate.test(result),
            None => config.kind().default_success(result),
        }
    }

    /// Evaluate and store the outcome in `result.success`.
    pub fn apply(config: &ActionConfig, result: &mut ActionResult) {
        result.success = Self::evaluate(config, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Match, Region, Similarity};

    fn result_with(matches: usize) -> ActionResult {
        let mut result = ActionResult::new(None);
        for i in 0..matches {
            let x = i32::try_from(i).unwrap_or(0) * 20;
            result
                .matches
                .push(Match::new(Region::new(x, 0, 10, 10), Similarity::EXACT));
        }
        result
    }

    #[test]
    fn find_family_needs_matches() {
        for kind in [ActionKind::Find, ActionKind::Click, ActionKind::Move, ActionKind::Drag] {
            assert!(!kind.default_success(&result_with(0)), "{kind}");
            assert!(kind.default_success(&result_with(1)), "{kind}");
        }
    }

    #[test]
    fn vanish_needs_no_matches() {
        assert!(ActionKind::Vanish.default_success(&result_with(0)));
        assert!(!ActionKind::Vanish.default_success(&result_with(2)));
    }

    #[test]
    fn typing_always_succeeds() {
        for kind in [ActionKind::Type, ActionKind::Highlight, ActionKind::KeyDown, ActionKind::KeyUp] {
            assert!(kind.default_success(&result_with(0)), "{kind}");
        }
    }

    #[test]
    fn define_needs_positive_area() {
        let mut result = result_with(0);
        assert!(!ActionKind::Define.default_success(&result));
        result.defined_region = Some(Region::new(0, 0, 0, 5));
        assert!(!ActionKind::Define.default_success(&result));
        result.defined_region = Some(Region::new(0, 0, 4, 5));
        assert!(ActionKind::Define.default_success(&result));
    }

    #[test]
    fn custom_predicate_overrides_default() {
        let config = ActionConfig::find().success_when(|r| r.matches.len() >= 2).build();
        assert!(!SuccessCriteria::evaluate(&config, &result_with(1)));
        assert!(SuccessCriteria::evaluate(&config, &result_with(2)));

        let lenient = ActionConfig::vanish().success_when(|_| true).build();
        let mut result = result_with(3);
        SuccessCriteria::apply(&lenient, &mut result);
        assert!(result.success);
    }
}
