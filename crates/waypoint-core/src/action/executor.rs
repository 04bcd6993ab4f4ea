//! Single-step execution.
//!
//! `ActionExecutor` borrows the injected adapters for the duration of one
//! engine call and runs individual action steps: pausing, locating targets,
//! actuating, deciding success and emitting the step event.

use super::{
    ActionConfig, ActionKind, ActionOptions, ActionResult, DefineAs, FindStrategy, StepSummary,
    SuccessCriteria,
};
use crate::adapters::{Actuator, FindOptions, PerceptionProvider};
use crate::events::{EngineEvent, EventSink};
use crate::primitives::POLL_INTERVAL_MS;
use crate::replay::{ActionRecord, HistoryStore};
use crate::{Match, ObjectCollection, Region, Similarity, WaypointError};
use std::thread;
use std::time::{Duration, Instant};

/// What a polling search is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitFor {
    Appear,
    Vanish,
}

/// Runs action steps against borrowed adapters.
pub struct ActionExecutor<'a> {
    perception: &'a mut dyn PerceptionProvider,
    actuator: &'a mut dyn Actuator,
    sink: &'a dyn EventSink,
    recorder: Option<&'a mut HistoryStore>,
    active_states: Vec<String>,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        perception: &'a mut dyn PerceptionProvider,
        actuator: &'a mut dyn Actuator,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            perception,
            actuator,
            sink,
            recorder: None,
            active_states: Vec::new(),
        }
    }

    /// Record every pattern search into `store`.
    #[must_use]
    pub fn with_recorder(mut self, store: &'a mut HistoryStore) -> Self {
        self.recorder = Some(store);
        self
    }

    /// Names of the currently active states, forwarded to the provider and
    /// stamped on recorded outcomes.
    pub fn set_active_states(&mut self, names: Vec<String>) {
        self.active_states = names;
    }

    #[must_use]
    pub fn active_states(&self) -> &[String] {
        &self.active_states
    }

    /// Forward an event to the sink this executor reports to.
    pub fn emit(&self, event: &EngineEvent) {
        self.sink.emit(event);
    }

    /// Run one step over `collections`.
    ///
    /// A non-empty `scope` restricts every search to those regions and drops
    /// any located target that is not inside one of them.
    pub fn perform(
        &mut self,
        config: &ActionConfig,
        collections: &[ObjectCollection],
        scope: &[Region],
    ) -> Result<ActionResult, WaypointError> {
        let started = Instant::now();
        let kind = config.kind();
        let mut result = ActionResult::new(Some(kind));

        pause(config.pause_before_begin());

        if kind == ActionKind::Drag {
            self.drag(config, collections, scope, &mut result)?;
        } else {
            for (index, collection) in collections.iter().enumerate() {
                if index > 0 {
                    pause(config.pause_between_collections());
                }
                self.apply(config, collection, scope, &mut result)?;
            }
        }
        result.collections = collections.to_vec();

        if kind == ActionKind::Define {
            result.defined_region = define(&result.matches, config.options());
        }

        pause(config.pause_after_end());

        result.duration = started.elapsed();
        SuccessCriteria::apply(config, &mut result);
        result.steps.push(StepSummary {
            kind,
            success: result.success,
            match_count: result.matches.len(),
            duration: result.duration,
        });

        self.sink.emit(&EngineEvent::ActionStep {
            kind,
            target: describe(collections),
            success: result.success,
            matches: result.matches.len(),
            duration_ms: millis(result.duration),
        });
        Ok(result)
    }

    fn apply(
        &mut self,
        config: &ActionConfig,
        collection: &ObjectCollection,
        scope: &[Region],
        result: &mut ActionResult,
    ) -> Result<(), WaypointError> {
        match config.options() {
            ActionOptions::Find | ActionOptions::Define { .. } => {
                let found = self.locate_with_wait(config, collection, scope, WaitFor::Appear)?;
                result.matches.extend(found);
            }
            ActionOptions::Vanish => {
                let remaining = self.locate_with_wait(config, collection, scope, WaitFor::Vanish)?;
                result.matches.extend(remaining);
            }
            ActionOptions::Click { clicks, button } => {
                let found = self.locate_with_wait(config, collection, scope, WaitFor::Appear)?;
                for target in &found {
                    let ok = self.actuator.click(target.target(), *clicks, *button)?;
                    tally(result, ok);
                }
                result.matches.extend(found);
            }
            ActionOptions::Move => {
                let found = self.locate_with_wait(config, collection, scope, WaitFor::Appear)?;
                for target in &found {
                    let ok = self.actuator.move_to(target.target())?;
                    tally(result, ok);
                }
                result.matches.extend(found);
            }
            ActionOptions::Highlight { duration } => {
                let found = self.locate_with_wait(config, collection, scope, WaitFor::Appear)?;
                for target in &found {
                    let ok = self.actuator.highlight(target.region, *duration)?;
                    tally(result, ok);
                }
                result.matches.extend(found);
            }
            ActionOptions::Type { modifiers } => {
                for text in &collection.strings {
                    let ok = self.actuator.type_text(text, modifiers)?;
                    tally(result, ok);
                    result.text.push(text.clone());
                }
            }
            ActionOptions::KeyDown { modifiers } => {
                for key in &collection.strings {
                    let ok = self.actuator.key_down(key, modifiers)?;
                    tally(result, ok);
                    result.text.push(key.clone());
                }
            }
            ActionOptions::KeyUp => {
                for key in &collection.strings {
                    let ok = self.actuator.key_up(key)?;
                    tally(result, ok);
                    result.text.push(key.clone());
                }
            }
            ActionOptions::Drag => {}
        }
        Ok(())
    }

    /// Drag from the first target to the second.
    ///
    /// With several collections the first target of each of the first two is
    /// used; with one collection its first two targets are used.
    fn drag(
        &mut self,
        config: &ActionConfig,
        collections: &[ObjectCollection],
        scope: &[Region],
        result: &mut ActionResult,
    ) -> Result<(), WaypointError> {
        let mut ends: Vec<Match> = Vec::new();
        match collections {
            [] => {}
            [only] => {
                let found = self.locate_with_wait(config, only, scope, WaitFor::Appear)?;
                ends.extend(found.into_iter().take(2));
            }
            [from, to, ..] => {
                let start = self.locate_with_wait(config, from, scope, WaitFor::Appear)?;
                pause(config.pause_between_collections());
                let end = self.locate_with_wait(config, to, scope, WaitFor::Appear)?;
                ends.extend(start.into_iter().take(1));
                ends.extend(end.into_iter().take(1));
            }
        }

        if let [from, to] = ends.as_slice() {
            let ok = self.actuator.drag(from.target(), to.target())?;
            tally(result, ok);
            result.matches = ends;
        } else {
            tracing::debug!(found = ends.len(), "drag needs two targets");
        }
        Ok(())
    }

    fn locate_with_wait(
        &mut self,
        config: &ActionConfig,
        collection: &ObjectCollection,
        scope: &[Region],
        until: WaitFor,
    ) -> Result<Vec<Match>, WaypointError> {
        let deadline = Instant::now()
            .checked_add(config.max_wait())
            .unwrap_or_else(Instant::now);
        loop {
            let found = self.locate(config, collection, scope)?;
            let settled = match until {
                WaitFor::Appear => !found.is_empty(),
                WaitFor::Vanish => found.is_empty(),
            };
            let now = Instant::now();
            if settled || now >= deadline {
                return Ok(found);
            }
            thread::sleep(Duration::from_millis(POLL_INTERVAL_MS).min(deadline - now));
        }
    }

    /// Locate every target of one collection.
    fn locate(
        &mut self,
        config: &ActionConfig,
        collection: &ObjectCollection,
        scope: &[Region],
    ) -> Result<Vec<Match>, WaypointError> {
        let options = FindOptions {
            kind: config.kind(),
            strategy: config.strategy(),
            min_similarity: config.min_similarity(),
            active_states: self.active_states.clone(),
        };

        let mut per_pattern: Vec<Vec<Match>> = Vec::with_capacity(collection.patterns.len());
        for pattern in &collection.patterns {
            let searched = Instant::now();
            let mut candidates = Vec::new();
            if let Some(area) = search_area(pattern.search_region(), scope) {
                let raw = self.perception.find(pattern, area, &options)?;
                candidates.extend(raw.into_iter().filter(|m| {
                    m.score >= options.min_similarity
                        && area.is_none_or(|a| a.contains(&m.region))
                        && in_scope(&m.region, scope)
                }));
            }
            if let Some(fusion) = config.fusion() {
                candidates = fusion.fuse(&candidates);
            }

            if let Some(store) = self.recorder.as_deref_mut() {
                let mut record = ActionRecord::new(options.kind, candidates.clone());
                record.strategy = Some(options.strategy);
                record.duration_ms = millis(searched.elapsed());
                record.state = self.active_states.first().cloned();
                store.record(pattern.name(), record);
            }
            per_pattern.push(candidates);
        }

        let mut found = select(per_pattern, config.strategy());

        let known = collection
            .regions
            .iter()
            .map(|r| Match::new(*r, Similarity::EXACT))
            .chain(
                collection
                    .locations
                    .iter()
                    .map(|l| Match::new(Region::new(l.x, l.y, 1, 1), Similarity::EXACT)),
            )
            .chain(collection.matches.iter().cloned())
            .filter(|m| in_scope(&m.region, scope));
        found.extend(known);
        Ok(found)
    }
}

/// The area one pattern is searched in: its own search region narrowed to
/// the bounds of the scope. `Some(None)` means the whole screen, `None` that
/// the pattern's region lies outside the scope.
///
/// One search per pattern keeps a target inside overlapping scope regions
/// from being reported twice.
fn search_area(own: Option<Region>, scope: &[Region]) -> Option<Option<Region>> {
    let Some(bounds) = scope.iter().copied().reduce(|acc, r| acc.union(&r)) else {
        return Some(own);
    };
    match own {
        Some(r) => r.intersection(&bounds).map(Some),
        None => Some(Some(bounds)),
    }
}

fn in_scope(region: &Region, scope: &[Region]) -> bool {
    scope.is_empty() || scope.iter().any(|s| s.contains(region))
}

/// Apply a find strategy to per-pattern candidate lists.
fn select(per_pattern: Vec<Vec<Match>>, strategy: FindStrategy) -> Vec<Match> {
    match strategy {
        FindStrategy::All => per_pattern.into_iter().flatten().collect(),
        FindStrategy::First => per_pattern
            .into_iter()
            .filter_map(|c| c.into_iter().next())
            .collect(),
        FindStrategy::Each => per_pattern.into_iter().filter_map(best).collect(),
        FindStrategy::Best => best(per_pattern.into_iter().flatten().collect())
            .into_iter()
            .collect(),
    }
}

/// Highest score; the earliest candidate wins ties.
fn best(candidates: Vec<Match>) -> Option<Match> {
    candidates
        .into_iter()
        .reduce(|best, m| if m.score > best.score { m } else { best })
}

fn define(matches: &[Match], options: &ActionOptions) -> Option<Region> {
    let ActionOptions::Define { define_as } = options else {
        return None;
    };
    match define_as {
        DefineAs::FirstMatch => matches.first().map(|m| m.region),
        DefineAs::MatchUnion => matches
            .iter()
            .map(|m| m.region)
            .reduce(|acc, r| acc.union(&r)),
    }
}

fn tally(result: &mut ActionResult, ok: bool) {
    if !ok {
        result.primitive_failures = result.primitive_failures.saturating_add(1);
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

fn describe(collections: &[ObjectCollection]) -> String {
    if collections.is_empty() {
        return "<none>".to_string();
    }
    collections
        .iter()
        .map(ObjectCollection::describe)
        .collect::<Vec<_>>()
        .join(" | ")
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// TESTS
// =============================================================================
