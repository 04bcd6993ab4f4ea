//! Perception targets (`Pattern`, `ObjectCollection`) and outcomes (`Match`).

use super::{Location, Region, Similarity};
use crate::replay::{ActionHistory, ActionRecord};
use serde::{Deserialize, Serialize};

// =============================================================================
// PATTERN
// =============================================================================

/// A named visual template with its recorded outcome history.
///
/// The name and search region are fixed at construction. The history is
/// append-only and only consulted in replay mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    name: String,
    search_region: Option<Region>,
    #[serde(default)]
    history: ActionHistory,
}

impl Pattern {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            search_region: None,
            history: ActionHistory::default(),
        }
    }

    /// Restrict every search for this pattern to a fixed screen area.
    #[must_use]
    pub fn with_search_region(mut self, region: Region) -> Self {
        self.search_region = Some(region);
        self
    }

    /// Attach a recorded history, replacing an empty one.
    #[must_use]
    pub fn with_history(mut self, history: ActionHistory) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn search_region(&self) -> Option<Region> {
        self.search_region
    }

    #[must_use]
    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    /// Append an outcome to this pattern's history.
    pub fn record(&mut self, record: ActionRecord) {
        self.history.push(record);
    }
}

// =============================================================================
// MATCH
// =============================================================================

/// One located candidate. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Match {
    pub region: Region,
    pub score: Similarity,
    /// Name of the pattern that produced this match, if any.
    pub pattern: Option<String>,
    /// Text read from the match area, if any.
    #[serde(default)]
    pub text: Option<String>,
}

impl Match {
    #[must_use]
    pub fn new(region: Region, score: Similarity) -> Self {
        Self {
            region,
            score,
            pattern: None,
            text: None,
        }
    }

    #[must_use]
    pub fn of_pattern(region: Region, score: Similarity, pattern: impl Into<String>) -> Self {
        Self {
            region,
            score,
            pattern: Some(pattern.into()),
            text: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// The click/move target of this match.
    #[must_use]
    pub fn target(&self) -> Location {
        self.region.center()
    }
}

// =============================================================================
// OBJECT COLLECTION
// =============================================================================

/// The set of entities an action operates on.
///
/// Patterns are searched; regions, locations and prior matches are taken
/// as already located; strings feed typing actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCollection {
    pub patterns: Vec<Pattern>,
    pub regions: Vec<Region>,
    pub locations: Vec<Location>,
    pub strings: Vec<String>,
    pub matches: Vec<Match>,
}

impl ObjectCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection holding the matches of a previous step.
    #[must_use]
    pub fn from_matches(matches: Vec<Match>) -> Self {
        Self {
            matches,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: Region) -> Self {
        self.regions.push(region);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    #[must_use]
    pub fn with_string(mut self, s: impl Into<String>) -> Self {
        self.strings.push(s.into());
        self
    }

    #[must_use]
    pub fn with_matches(mut self, matches: impl IntoIterator<Item = Match>) -> Self {
        self.matches.extend(matches);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
            && self.regions.is_empty()
            && self.locations.is_empty()
            && self.strings.is_empty()
            && self.matches.is_empty()
    }

    /// Whether the collection contains anything that can be located on screen.
    #[must_use]
    pub fn has_spatial_targets(&self) -> bool {
        !self.patterns.is_empty()
            || !self.regions.is_empty()
            || !self.locations.is_empty()
            || !self.matches.is_empty()
    }

    /// Short human-readable description for events and logs.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self.patterns.iter().map(|p| p.name().to_string()).collect();
        if !self.regions.is_empty() {
            parts.push(format!("{} region(s)", self.regions.len()));
        }
        if !self.locations.is_empty() {
            parts.push(format!("{} location(s)", self.locations.len()));
        }
        if !self.matches.is_empty() {
            parts.push(format!("{} match(es)", self.matches.len()));
        }
        if !self.strings.is_empty() {
            parts.push(format!("{} string(s)", self.strings.len()));
        }
        if parts.is_empty() {
            "<empty>".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_description_lists_targets() {
        let collection = ObjectCollection::new()
            .with_pattern(Pattern::new("ok_button"))
            .with_region(Region::new(0, 0, 10, 10))
            .with_string("hello");
        assert_eq!(collection.describe(), "ok_button, 1 region(s), 1 string(s)");
        assert!(collection.has_spatial_targets());
        assert_eq!(ObjectCollection::new().describe(), "<empty>");
    }

    #[test]
    fn strings_only_collection_is_not_spatial() {
        let collection = ObjectCollection::new().with_string("text");
        assert!(!collection.is_empty());
        assert!(!collection.has_spatial_targets());
    }

    #[test]
    fn match_target_is_center() {
        let m = Match::of_pattern(Region::new(10, 10, 20, 10), Similarity::EXACT, "icon");
        assert_eq!(m.target(), Location::new(20, 15));
        assert_eq!(m.pattern.as_deref(), Some("icon"));
    }
}
