//! # History Replay
//!
//! Recorded perception outcomes and the mock provider that replays them.
//!
//! - `ActionRecord`: one past outcome of an action on a pattern
//! - `ActionHistory`: the append-only, time-ordered records of one pattern
//! - `HistoryStore`: histories keyed by pattern name (loaded from / saved to
//!   history files, filled by live recording)
//! - `SnapshotSelector`: how one record is chosen among several candidates
//! - `HistoryReplay`: a `PerceptionProvider` backed by pattern histories
//!
//! Randomness is opt-in. A seeded or fixed-index selector makes replay fully
//! reproducible across runs.

use crate::action::{ActionConfig, ActionKind, ActionResult, FindStrategy};
use crate::adapters::{FindOptions, PerceptionProvider};
use crate::{AdapterError, Match, Pattern, Region};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// ACTION RECORD
// =============================================================================

/// One stored past outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub kind: ActionKind,
    #[serde(default)]
    pub strategy: Option<FindStrategy>,
    #[serde(default)]
    pub matches: Vec<Match>,
    /// Text read or typed during the action.
    #[serde(default)]
    pub text: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub duration_ms: u64,
    /// Name of the state that was active when the record was captured.
    #[serde(default)]
    pub state: Option<String>,
}

impl ActionRecord {
    #[must_use]
    pub fn new(kind: ActionKind, matches: Vec<Match>) -> Self {
        let success = !matches.is_empty();
        Self {
            kind,
            strategy: None,
            matches,
            text: None,
            success,
            duration_ms: 0,
            state: None,
        }
    }

    #[must_use]
    pub fn in_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Capture a completed action result.
    #[must_use]
    pub fn from_result(config: &ActionConfig, result: &ActionResult) -> Self {
        Self {
            kind: config.kind(),
            strategy: config.kind().searches().then(|| config.strategy()),
            matches: result.matches.clone(),
            text: (!result.text.is_empty()).then(|| result.text.join(" ")),
            success: result.success,
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            state: None,
        }
    }
}

// =============================================================================
// ACTION HISTORY
// =============================================================================

/// Append-only history of one pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionHistory {
    times_searched: u64,
    times_found: u64,
    records: Vec<ActionRecord>,
}

impl ActionHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and update the counters.
    pub fn push(&mut self, record: ActionRecord) {
        self.times_searched = self.times_searched.saturating_add(1);
        if !record.matches.is_empty() {
            self.times_found = self.times_found.saturating_add(1);
        }
        self.records.push(record);
    }

    /// Append every record of `other`, preserving its order.
    pub fn merge(&mut self, other: &ActionHistory) {
        self.times_searched = self.times_searched.saturating_add(other.times_searched);
        self.times_found = self.times_found.saturating_add(other.times_found);
        self.records.extend(other.records.iter().cloned());
    }

    #[must_use]
    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn times_searched(&self) -> u64 {
        self.times_searched
    }

    #[must_use]
    pub fn times_found(&self) -> u64 {
        self.times_found
    }

    /// Records of the given kind, oldest first.
    pub fn of_kind(&self, kind: ActionKind) -> impl Iterator<Item = &ActionRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    /// Pick one record of `kind`. The returned record is an owned copy.
    pub fn sample(&self, kind: ActionKind, selector: &mut SnapshotSelector) -> Option<ActionRecord> {
        let candidates: Vec<&ActionRecord> = self.of_kind(kind).collect();
        selector.select(&candidates).cloned()
    }

    /// Pick one record of `kind`, preferring records captured in one of
    /// `states`. Falls back to [`sample`](Self::sample) when none qualify.
    pub fn sample_in_states(
        &self,
        kind: ActionKind,
        states: &[String],
        selector: &mut SnapshotSelector,
    ) -> Option<ActionRecord> {
        let scoped: Vec<&ActionRecord> = self
            .of_kind(kind)
            .filter(|r| r.state.as_ref().is_some_and(|s| states.contains(s)))
            .collect();
        if scoped.is_empty() {
            return self.sample(kind, selector);
        }
        selector.select(&scoped).cloned()
    }
}

// =============================================================================
// SNAPSHOT SELECTOR
// =============================================================================

/// How replay picks one record among several candidates.
#[derive(Debug, Clone)]
pub enum SnapshotSelector {
    /// Uniform choice from an entropy-seeded source.
    Random(StdRng),
    /// Uniform choice from a seeded, reproducible source.
    Seeded(StdRng),
    /// Always the candidate at this index (wrapping around).
    FixedIndex(usize),
}

impl SnapshotSelector {
    #[must_use]
    pub fn random() -> Self {
        Self::Random(StdRng::from_entropy())
    }

    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::Seeded(StdRng::seed_from_u64(seed))
    }

    #[must_use]
    pub fn fixed(index: usize) -> Self {
        Self::FixedIndex(index)
    }

    /// Whether repeated runs make identical choices.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        !matches!(self, Self::Random(_))
    }

    pub fn select<'a, T>(&mut self, candidates: &[&'a T]) -> Option<&'a T> {
        if candidates.is_empty() {
            return None;
        }
        let index = match self {
            Self::Random(rng) | Self::Seeded(rng) => rng.gen_range(0..candidates.len()),
            Self::FixedIndex(i) => *i % candidates.len(),
        };
        candidates.get(index).copied()
    }
}

// =============================================================================
// HISTORY STORE
// =============================================================================

/// Histories keyed by pattern name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStore {
    histories: BTreeMap<String, ActionHistory>,
}

impl HistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the named pattern's history.
    pub fn record(&mut self, pattern: &str, record: ActionRecord) {
        self.histories
            .entry(pattern.to_string())
            .or_default()
            .push(record);
    }

    #[must_use]
    pub fn get(&self, pattern: &str) -> Option<&ActionHistory> {
        self.histories.get(pattern)
    }

    /// Merge the stored history of `pattern` into it.
    pub fn attach(&self, pattern: &mut Pattern) {
        if let Some(history) = self.histories.get(pattern.name()) {
            for record in history.records() {
                pattern.record(record.clone());
            }
        }
    }

    /// Merge another store, pattern by pattern.
    pub fn merge(&mut self, other: &HistoryStore) {
        for (name, history) in &other.histories {
            self.histories.entry(name.clone()).or_default().merge(history);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionHistory)> {
        self.histories.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of patterns with a history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Total number of records over all patterns.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.histories.values().map(ActionHistory::len).sum()
    }
}

/// Append the outcome of `result` to the pattern's own history.
pub fn record(pattern: &mut Pattern, config: &ActionConfig, result: &ActionResult) {
    pattern.record(ActionRecord::from_result(config, result));
}

// =============================================================================
// REPLAY PROVIDER
// =============================================================================

/// Perception provider that answers from each pattern's recorded history.
///
/// A pattern with no record of the requested kind is reported as not found.
#[derive(Debug, Clone)]
pub struct HistoryReplay {
    selector: SnapshotSelector,
}

impl HistoryReplay {
    #[must_use]
    pub fn new(selector: SnapshotSelector) -> Self {
        Self { selector }
    }

    #[must_use]
    pub fn selector(&self) -> &SnapshotSelector {
        &self.selector
    }
}

impl PerceptionProvider for HistoryReplay {
    fn find(
        &mut self,
        pattern: &Pattern,
        search_region: Option<Region>,
        options: &FindOptions,
    ) -> Result<Vec<Match>, AdapterError> {
        let Some(record) = pattern.history().sample_in_states(
            options.kind,
            &options.active_states,
            &mut self.selector,
        ) else {
            tracing::trace!(pattern = pattern.name(), kind = %options.kind, "no recorded snapshot");
            return Ok(Vec::new());
        };

        let matches = record
            .matches
            .into_iter()
            .filter(|m| search_region.is_none_or(|area| area.contains(&m.region)))
            .map(|mut m| {
                if m.pattern.is_none() {
                    m.pattern = Some(pattern.name().to_string());
                }
                if m.text.is_none() {
                    m.text.clone_from(&record.text);
                }
                m
            })
            .collect();
        Ok(matches)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Similarity;

    fn hit(x: i32) -> Match {
        Match::new(Region::new(x, 10, 20, 20), Similarity::from_percent(95))
    }

    fn options(kind: ActionKind) -> FindOptions {
        FindOptions {
            kind,
            strategy: FindStrategy::First,
            min_similarity: Similarity::from_percent(70),
            active_states: Vec::new(),
        }
    }

    #[test]
    fn push_updates_counters() {
        let mut history = ActionHistory::new();
        history.push(ActionRecord::new(ActionKind::Find, vec![hit(0)]));
        history.push(ActionRecord::new(ActionKind::Find, Vec::new()));

        assert_eq!(history.times_searched(), 2);
        assert_eq!(history.times_found(), 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn merge_appends_and_sums() {
        let mut a = ActionHistory::new();
        a.push(ActionRecord::new(ActionKind::Find, vec![hit(0)]));
        let mut b = ActionHistory::new();
        b.push(ActionRecord::new(ActionKind::Click, vec![hit(5)]));

        a.merge(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.times_found(), 2);
        assert_eq!(a.records()[1].kind, ActionKind::Click);
    }

    #[test]
    fn sample_filters_by_kind() {
        let mut history = ActionHistory::new();
        history.push(ActionRecord::new(ActionKind::Click, vec![hit(0)]));
        let mut selector = SnapshotSelector::fixed(0);

        assert!(history.sample(ActionKind::Find, &mut selector).is_none());
        assert!(history.sample(ActionKind::Click, &mut selector).is_some());
    }

    #[test]
    fn sample_in_states_prefers_scoped_records() {
        let mut history = ActionHistory::new();
        history.push(ActionRecord::new(ActionKind::Find, vec![hit(0)]).in_state("Login"));
        history.push(ActionRecord::new(ActionKind::Find, vec![hit(100)]).in_state("Dashboard"));
        let mut selector = SnapshotSelector::fixed(0);

        let scoped = history
            .sample_in_states(ActionKind::Find, &["Dashboard".to_string()], &mut selector)
            .expect("scoped record");
        assert_eq!(scoped.matches[0].region.x, 100);

        let fallback = history
            .sample_in_states(ActionKind::Find, &["Settings".to_string()], &mut selector)
            .expect("fallback record");
        assert_eq!(fallback.matches[0].region.x, 0);
    }

    #[test]
    fn seeded_selectors_agree() {
        let mut history = ActionHistory::new();
        for x in 0..10 {
            history.push(ActionRecord::new(ActionKind::Find, vec![hit(x * 30)]));
        }
        let mut a = SnapshotSelector::seeded(42);
        let mut b = SnapshotSelector::seeded(42);
        for _ in 0..20 {
            assert_eq!(
                history.sample(ActionKind::Find, &mut a),
                history.sample(ActionKind::Find, &mut b)
            );
        }
        assert!(a.is_deterministic());
        assert!(!SnapshotSelector::random().is_deterministic());
    }

    #[test]
    fn fixed_index_wraps() {
        let items = [1, 2, 3];
        let refs: Vec<&i32> = items.iter().collect();
        let mut selector = SnapshotSelector::fixed(4);
        assert_eq!(selector.select(&refs), Some(&2));
    }

    #[test]
    fn replay_filters_by_search_region_and_names_pattern() {
        let mut pattern = Pattern::new("save");
        pattern.record(ActionRecord::new(ActionKind::Find, vec![hit(0), hit(200)]).with_text("Save"));
        let mut replay = HistoryReplay::new(SnapshotSelector::fixed(0));

        let all = replay
            .find(&pattern, None, &options(ActionKind::Find))
            .expect("find");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].pattern.as_deref(), Some("save"));
        assert_eq!(all[0].text.as_deref(), Some("Save"));

        let left = replay
            .find(&pattern, Some(Region::new(0, 0, 100, 100)), &options(ActionKind::Find))
            .expect("find");
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn replay_returns_copies() {
        let mut pattern = Pattern::new("icon");
        pattern.record(ActionRecord::new(ActionKind::Find, vec![hit(0)]));
        let mut replay = HistoryReplay::new(SnapshotSelector::fixed(0));

        let mut first = replay
            .find(&pattern, None, &options(ActionKind::Find))
            .expect("find");
        first[0].region.x = 999;
        let second = replay
            .find(&pattern, None, &options(ActionKind::Find))
            .expect("find");

        assert_eq!(second[0].region.x, 0);
        assert_eq!(pattern.history().records()[0].matches[0].region.x, 0);
    }

    #[test]
    fn store_attaches_histories_by_name() {
        let mut store = HistoryStore::new();
        store.record("ok", ActionRecord::new(ActionKind::Find, vec![hit(0)]));
        store.record("ok", ActionRecord::new(ActionKind::Vanish, Vec::new()));

        let mut pattern = Pattern::new("ok");
        store.attach(&mut pattern);
        assert_eq!(pattern.history().len(), 2);
        assert_eq!(store.record_count(), 2);

        let mut unknown = Pattern::new("other");
        store.attach(&mut unknown);
        assert!(unknown.history().is_empty());
    }

    #[test]
    fn record_captures_result() {
        let config = ActionConfig::find().build();
        let mut result = ActionResult::new(Some(ActionKind::Find));
        result.matches.push(hit(0));
        result.success = true;

        let mut pattern = Pattern::new("p");
        record(&mut pattern, &config, &result);
        let stored = &pattern.history().records()[0];
        assert_eq!(stored.kind, ActionKind::Find);
        assert_eq!(stored.strategy, Some(FindStrategy::First));
        assert!(stored.success);
    }
}
