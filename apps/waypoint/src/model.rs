//! # Model Loader
//!
//! Declarative TOML description of the application under automation.
//!
//! ```toml
//! [settings]
//! seed = 7
//! similarity = 70
//! initial = ["Login"]
//!
//! [[pattern]]
//! name = "login_button"
//! search_region = [0, 0, 800, 600]
//!
//! [[state]]
//! name = "Login"
//! anchors = ["login_logo"]
//!
//! [[transition]]
//! from = "Login"
//! to = "Dashboard"
//! steps = [{ action = "click", targets = ["login_button"] }]
//! ```
//!
//! A transition `to = "PREVIOUS"` returns to the state hidden under its
//! source; `to = "CURRENT"` refreshes the source in place.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use waypoint_core::action::ActionConfigBuilder;
use waypoint_core::{
    ActionChain, ActionConfig, ActionKind, ActionOptions, ChainingStrategy, DefineAs, FindStrategy,
    HistoryStore, MatchFusion, MouseButton, ObjectCollection, OverlapThreshold, Pattern, Region,
    Similarity, StateDefinition, StateGraph, TargetRef, TransitionDefinition, WaypointError,
};

/// Maximum model file size (4 MB).
const MAX_MODEL_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// Reserved `to` value for back transitions.
pub const PREVIOUS: &str = "PREVIOUS";

/// Reserved `to` value for refresh transitions.
pub const CURRENT: &str = "CURRENT";

// =============================================================================
// FILE SCHEMA
// =============================================================================

/// The raw model file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<PatternSpec>,
    #[serde(default, rename = "state")]
    pub states: Vec<StateSpec>,
    #[serde(default, rename = "transition")]
    pub transitions: Vec<TransitionSpec>,
}

/// `[settings]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Replay seed. Without one, snapshots are picked from entropy.
    pub seed: Option<u64>,
    /// Default minimum similarity, in percent.
    pub similarity: u8,
    /// Pause before every step, in milliseconds.
    pub pause_ms: u64,
    /// States active at startup.
    pub initial: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: None,
            similarity: 70,
            pause_ms: 0,
            initial: Vec::new(),
        }
    }
}

/// `[[pattern]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternSpec {
    pub name: String,
    /// `[x, y, w, h]`
    #[serde(default)]
    pub search_region: Option<[i32; 4]>,
}

/// How a state proves it is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verify {
    /// Find any of the state's anchors.
    #[default]
    Anchors,
    /// Trust the transition.
    Always,
}

/// `[[state]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateSpec {
    pub name: String,
    #[serde(default)]
    pub anchors: Vec<String>,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default)]
    pub hides: Vec<String>,
    #[serde(default)]
    pub verify: Verify,
    /// Explicit verification chain; takes precedence over `verify`.
    #[serde(default)]
    pub steps: Vec<StepSpec>,
    #[serde(default)]
    pub chaining: ChainingStrategy,
}

/// `[[transition]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionSpec {
    pub from: String,
    pub to: String,
    #[serde(default = "default_cost")]
    pub cost: u32,
    #[serde(default)]
    pub stays_visible: bool,
    #[serde(default)]
    pub chaining: ChainingStrategy,
    /// CONFIRM overlap in basis points of the original match.
    #[serde(default)]
    pub overlap: u16,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

fn default_cost() -> u32 {
    1
}

/// One action step.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub action: ActionKind,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub text: Vec<String>,
    #[serde(default)]
    pub find: Option<FindStrategy>,
    /// Minimum similarity in percent; defaults to the settings value.
    #[serde(default)]
    pub similarity: Option<u8>,
    #[serde(default)]
    pub max_wait_ms: u64,
    #[serde(default)]
    pub clicks: Option<u32>,
    #[serde(default)]
    pub button: Option<MouseButton>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub define_as: Option<DefineAs>,
    /// Fuse matches closer than `[gap_x, gap_y]` pixels.
    #[serde(default)]
    pub fuse: Option<[i32; 2]>,
}

// =============================================================================
// LOADED MODEL
// =============================================================================

/// A model converted into engine types.
#[derive(Debug, Clone)]
pub struct Model {
    pub settings: Settings,
    pub graph: StateGraph,
    pub patterns: BTreeMap<String, Pattern>,
}

impl ModelFile {
    pub fn parse(text: &str) -> Result<Self, WaypointError> {
        toml::from_str(text).map_err(|e| WaypointError::InvalidConfig(format!("model: {e}")))
    }

    /// Convert into a registered graph. `history` is attached to every
    /// pattern so the replay provider can answer for it.
    pub fn build(&self, history: Option<&HistoryStore>) -> Result<Model, WaypointError> {
        let mut patterns = BTreeMap::new();
        for spec in &self.patterns {
            let mut pattern = Pattern::new(spec.name.clone());
            if let Some([x, y, w, h]) = spec.search_region {
                pattern = pattern.with_search_region(Region::new(x, y, w, h));
            }
            if let Some(store) = history {
                store.attach(&mut pattern);
            }
            if patterns.insert(spec.name.clone(), pattern).is_some() {
                return Err(WaypointError::InvalidConfig(format!(
                    "duplicate pattern '{}'",
                    spec.name
                )));
            }
        }

        let loader = Loader {
            settings: &self.settings,
            patterns: &patterns,
        };
        let mut graph = StateGraph::new();
        for spec in &self.states {
            graph.register_state(loader.state(spec)?)?;
        }
        for spec in &self.transitions {
            graph.register_transition(loader.transition(spec)?)?;
        }
        graph.validate()?;

        for name in &self.settings.initial {
            if graph.state_id(name).is_none() {
                return Err(WaypointError::UnknownState(name.clone()));
            }
        }

        tracing::debug!(
            states = graph.state_count(),
            transitions = graph.transition_count(),
            patterns = patterns.len(),
            "model loaded"
        );
        Ok(Model {
            settings: self.settings.clone(),
            graph,
            patterns,
        })
    }
}

/// Read and convert a model file.
pub fn load_model(path: &Path, history: Option<&HistoryStore>) -> Result<Model, WaypointError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| WaypointError::IoError(format!("{}: {e}", path.display())))?;
    if metadata.len() > MAX_MODEL_FILE_SIZE {
        return Err(WaypointError::InvalidConfig(format!(
            "model file {} exceeds {MAX_MODEL_FILE_SIZE} bytes",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| WaypointError::IoError(format!("{}: {e}", path.display())))?;
    ModelFile::parse(&text)?.build(history)
}

// =============================================================================
// CONVERSION
// =============================================================================

struct Loader<'a> {
    settings: &'a Settings,
    patterns: &'a BTreeMap<String, Pattern>,
}

impl Loader<'_> {
    fn pattern(&self, name: &str) -> Result<Pattern, WaypointError> {
        self.patterns
            .get(name)
            .cloned()
            .ok_or_else(|| WaypointError::InvalidConfig(format!("unknown pattern '{name}'")))
    }

    fn state(&self, spec: &StateSpec) -> Result<StateDefinition, WaypointError> {
        let mut definition = StateDefinition::new(spec.name.clone()).blocking(spec.blocking);
        for anchor in &spec.anchors {
            definition = definition.anchor(self.pattern(anchor)?);
        }
        for hidden in &spec.hides {
            definition = definition.hides(hidden.clone());
        }

        if !spec.steps.is_empty() {
            return Ok(definition.verified_by(self.chain(spec.chaining, 0, &spec.steps)?));
        }
        match spec.verify {
            Verify::Always => Ok(definition.always_verified()),
            Verify::Anchors if spec.anchors.is_empty() => Err(WaypointError::MissingVerification(
                spec.name.clone(),
            )),
            Verify::Anchors => Ok(definition.verified_by_anchors()),
        }
    }

    fn transition(&self, spec: &TransitionSpec) -> Result<TransitionDefinition, WaypointError> {
        let target = match spec.to.as_str() {
            PREVIOUS => TargetRef::Previous,
            CURRENT => TargetRef::Current,
            name => TargetRef::Named(name.to_string()),
        };
        Ok(TransitionDefinition::new(spec.from.clone(), target)
            .cost(spec.cost)
            .stays_visible(spec.stays_visible)
            .action(self.chain(spec.chaining, spec.overlap, &spec.steps)?))
    }

    fn chain(
        &self,
        strategy: ChainingStrategy,
        overlap: u16,
        steps: &[StepSpec],
    ) -> Result<ActionChain, WaypointError> {
        let mut builder = ActionChain::builder(strategy)
            .overlap(OverlapThreshold::from_basis_points(overlap));
        for step in steps {
            builder = builder.step_on(self.config(step), self.targets(step)?);
        }
        Ok(builder.build())
    }

    /// Drag gets one collection per target; every other kind gets one
    /// collection holding all targets and strings.
    fn targets(&self, step: &StepSpec) -> Result<Vec<ObjectCollection>, WaypointError> {
        if step.action == ActionKind::Drag {
            return step
                .targets
                .iter()
                .map(|t| {
                    self.pattern(t)
                        .map(|p| ObjectCollection::new().with_pattern(p))
                })
                .collect();
        }
        let mut collection = ObjectCollection::new();
        for target in &step.targets {
            collection = collection.with_pattern(self.pattern(target)?);
        }
        for text in &step.text {
            collection = collection.with_string(text.clone());
        }
        Ok(vec![collection])
    }

    fn config(&self, step: &StepSpec) -> ActionConfig {
        let similarity = step.similarity.unwrap_or(self.settings.similarity);
        let mut builder = base_builder(step.action)
            .min_similarity(Similarity::from_percent(similarity))
            .pause_before_begin(Duration::from_millis(self.settings.pause_ms))
            .max_wait(Duration::from_millis(step.max_wait_ms));

        if let Some(strategy) = step.find {
            builder = builder.strategy(strategy);
        }
        if let Some(clicks) = step.clicks {
            builder = builder.clicks(clicks);
        }
        if let Some(button) = step.button {
            builder = builder.button(button);
        }
        if let Some(mode) = step.define_as {
            builder = builder.define_as(mode);
        }
        if let Some([gap_x, gap_y]) = step.fuse {
            builder = builder.fusion(MatchFusion::absolute(gap_x, gap_y));
        }
        for modifier in &step.modifiers {
            builder = builder.modifier(modifier.clone());
        }
        builder.build()
    }
}

fn base_builder(kind: ActionKind) -> ActionConfigBuilder {
    match kind {
        ActionKind::Find => ActionConfig::find(),
        ActionKind::Click => ActionConfig::click(),
        ActionKind::Type => ActionConfig::type_text(),
        ActionKind::Drag => ActionConfig::drag(),
        ActionKind::Move => ActionConfig::move_to(),
        ActionKind::Vanish => ActionConfig::vanish(),
        ActionKind::Highlight => ActionConfig::highlight(),
        ActionKind::Define => ActionConfig::define(),
        ActionKind::KeyDown => ActionConfig::builder(ActionOptions::KeyDown {
            modifiers: Vec::new(),
        }),
        ActionKind::KeyUp => ActionConfig::builder(ActionOptions::KeyUp),
    }
}

// =============================================================================
// TESTS
// =============================================================================
