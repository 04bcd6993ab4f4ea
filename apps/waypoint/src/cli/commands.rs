//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//! Every command runs the engine in replay mode: perception answers come
//! from the recorded history and actuation is only recorded.

use crate::history::{HistoryFormat, load_history, save_history};
use crate::model::{Model, Settings, load_model};
use crate::monitor::{MonitorConfig, StateMonitor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use waypoint_core::{
    ActionKind, Engine, EventLog, EventSink, HistoryReplay, HistoryStore, RecordingActuator,
    SnapshotSelector, TransitionTarget, WaypointError,
};

// =============================================================================
// CONTEXT
// =============================================================================

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub model: PathBuf,
    pub history: Option<PathBuf>,
    pub seed: Option<u64>,
    pub json_mode: bool,
}

impl Context {
    fn load_history(&self) -> Result<Option<HistoryStore>, WaypointError> {
        self.history.as_deref().map(load_history).transpose()
    }

    fn require_history(&self) -> Result<HistoryStore, WaypointError> {
        self.load_history()?.ok_or_else(|| {
            WaypointError::InvalidConfig("this command needs --history".to_string())
        })
    }

    fn load_model(&self) -> Result<Model, WaypointError> {
        let history = self.load_history()?;
        load_model(&self.model, history.as_ref())
    }

    /// `--seed` wins over the model's seed; without either, draws are random.
    fn selector(&self, settings: &Settings) -> SnapshotSelector {
        match self.seed.or(settings.seed) {
            Some(seed) => SnapshotSelector::seeded(seed),
            None => SnapshotSelector::random(),
        }
    }

    /// A replay engine over `model`, starting from `from` or the model's
    /// initial states.
    pub fn replay_engine(
        &self,
        model: &Model,
        from: &[String],
        sink: Arc<dyn EventSink>,
        record: bool,
    ) -> Result<Engine, WaypointError> {
        let initial: &[String] = if from.is_empty() {
            &model.settings.initial
        } else {
            from
        };
        let mut builder = Engine::builder(model.graph.clone())
            .perception(HistoryReplay::new(self.selector(&model.settings)))
            .actuator(RecordingActuator::new())
            .sink(sink)
            .record_history(record);
        for name in initial {
            builder = builder.initial_state(name.clone());
        }
        builder.build()
    }
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn parse_kind(name: &str) -> Result<ActionKind, WaypointError> {
    serde_json::from_value(serde_json::Value::String(name.to_string()))
        .map_err(|_| WaypointError::InvalidConfig(format!("unknown action kind '{name}'")))
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Load the model and report what it contains.
pub fn cmd_check(ctx: &Context) -> Result<(), WaypointError> {
    let model = ctx.load_model()?;
    let graph = &model.graph;
    let silent: Vec<&str> = model
        .patterns
        .values()
        .filter(|p| p.history().is_empty())
        .map(|p| p.name())
        .collect();

    if ctx.json_mode {
        let states: Vec<serde_json::Value> = graph
            .states()
            .map(|s| {
                serde_json::json!({
                    "name": s.name(),
                    "anchors": s.anchors().len(),
                    "blocking": s.is_blocking(),
                    "hides": s.can_hide(),
                    "transitions": graph.transitions_from(s.id()).len(),
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "model": model_path(ctx),
            "states": states,
            "transition_count": graph.transition_count(),
            "pattern_count": model.patterns.len(),
            "patterns_without_history": silent,
            "initial": model.settings.initial,
        }));
        return Ok(());
    }

    println!("Waypoint Model");
    println!("==============");
    println!("Model:       {}", model_path(ctx));
    println!("States:      {}", graph.state_count());
    println!("Transitions: {}", graph.transition_count());
    println!("Patterns:    {}", model.patterns.len());
    println!("Initial:     {}", model.settings.initial.join(", "));
    println!();
    for state in graph.states() {
        let marker = if state.is_blocking() { " (blocking)" } else { "" };
        println!(
            "  {}{} - {} anchor(s), {} outgoing",
            state.name(),
            marker,
            state.anchors().len(),
            graph.transitions_from(state.id()).len()
        );
    }
    if !silent.is_empty() {
        println!();
        println!("Patterns without recorded history: {}", silent.join(", "));
    }
    Ok(())
}

fn model_path(ctx: &Context) -> String {
    ctx.model.to_string_lossy().into_owned()
}

// =============================================================================
// PLAN COMMAND
// =============================================================================

/// Show the cheapest path without executing it.
pub fn cmd_plan(ctx: &Context, to: &str, from: &[String]) -> Result<(), WaypointError> {
    let model = ctx.load_model()?;
    let engine = ctx.replay_engine(&model, from, Arc::new(EventLog::new()), false)?;
    let graph = engine.graph();
    let path = engine.plan(to)?;

    let describe_to = |hop: &waypoint_core::navigator::Hop| match (hop.to, hop.target) {
        (Some(id), _) => graph.state_name(id),
        (None, TransitionTarget::Previous) => "<previous>".to_string(),
        (None, _) => graph.state_name(hop.from),
    };

    if ctx.json_mode {
        let output = match &path {
            Some(path) => serde_json::json!({
                "target": to,
                "reachable": true,
                "cost": path.cost(),
                "hops": path.hops().iter().map(|hop| serde_json::json!({
                    "from": graph.state_name(hop.from),
                    "to": describe_to(hop),
                    "cost": hop.cost,
                })).collect::<Vec<_>>(),
            }),
            None => serde_json::json!({ "target": to, "reachable": false }),
        };
        print_json(&output);
        return Ok(());
    }

    match path {
        Some(path) if path.is_empty() => println!("{to} is already active"),
        Some(path) => {
            println!("Path to {to} ({} hop(s), cost {}):", path.len(), path.cost());
            for (index, hop) in path.hops().iter().enumerate() {
                println!(
                    "  {index}: {} -> {} (cost {})",
                    graph.state_name(hop.from),
                    describe_to(hop),
                    hop.cost
                );
            }
        }
        None => println!(
            "No path to {to} from [{}]",
            engine.active_state_names().join(", ")
        ),
    }
    Ok(())
}

// =============================================================================
// NAVIGATE COMMAND
// =============================================================================

/// Navigate against the recorded history.
pub fn cmd_navigate(
    ctx: &Context,
    to: &str,
    from: &[String],
    show_events: bool,
    record: Option<&Path>,
) -> Result<(), WaypointError> {
    let model = ctx.load_model()?;
    let log = Arc::new(EventLog::new());
    let mut engine = ctx.replay_engine(&model, from, log.clone(), record.is_some())?;

    let outcome = engine.navigate(to)?;
    tracing::info!(target_state = to, %outcome, "navigation finished");

    if let Some(path) = record {
        let store = engine.take_recorded_history().unwrap_or_default();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => HistoryFormat::Json,
            _ => HistoryFormat::Binary,
        };
        save_history(path, &store, format)?;
    }

    let events = log.events();
    if ctx.json_mode {
        let mut output = serde_json::json!({
            "target": to,
            "success": outcome.is_success(),
            "outcome": outcome.to_string(),
            "completed_hops": outcome.completed_hops(),
            "active": engine.active_state_names(),
        });
        if show_events {
            output["events"] = serde_json::to_value(&events)
                .map_err(|e| WaypointError::SerializationError(e.to_string()))?;
        }
        print_json(&output);
        return Ok(());
    }

    println!("Navigation to {to}: {outcome}");
    println!("Active: [{}]", engine.active_state_names().join(", "));
    if show_events {
        println!();
        for event in &events {
            let line = serde_json::to_string(event)
                .map_err(|e| WaypointError::SerializationError(e.to_string()))?;
            println!("  {line}");
        }
    }
    if let Some(path) = record {
        println!("Recorded history written to {}", path.display());
    }
    Ok(())
}

// =============================================================================
// SAMPLE COMMAND
// =============================================================================

/// Draw snapshots the replay provider would return for a pattern.
pub fn cmd_sample(
    ctx: &Context,
    pattern: &str,
    kind: &str,
    count: usize,
    states: &[String],
) -> Result<(), WaypointError> {
    let store = ctx.require_history()?;
    let kind = parse_kind(kind)?;
    let Some(history) = store.get(pattern) else {
        println!("No history recorded for pattern '{pattern}'");
        return Ok(());
    };

    let mut selector = match ctx.seed {
        Some(seed) => SnapshotSelector::seeded(seed),
        None => SnapshotSelector::random(),
    };
    let draws: Vec<_> = (0..count)
        .filter_map(|_| history.sample_in_states(kind, states, &mut selector))
        .collect();

    if ctx.json_mode {
        let value = serde_json::to_value(&draws)
            .map_err(|e| WaypointError::SerializationError(e.to_string()))?;
        print_json(&value);
        return Ok(());
    }

    if draws.is_empty() {
        println!("No {kind} records for pattern '{pattern}'");
        return Ok(());
    }
    for (index, record) in draws.iter().enumerate() {
        let regions: Vec<String> = record.matches.iter().map(|m| m.region.to_string()).collect();
        println!(
            "  {index}: success={} state={} matches=[{}]",
            record.success,
            record.state.as_deref().unwrap_or("-"),
            regions.join(", ")
        );
    }
    Ok(())
}

// =============================================================================
// HISTORY COMMANDS
// =============================================================================

/// Summarize a history file.
pub fn cmd_history_inspect(ctx: &Context, input: &Path) -> Result<(), WaypointError> {
    let store = load_history(input)?;

    if ctx.json_mode {
        let patterns: Vec<serde_json::Value> = store
            .iter()
            .map(|(name, history)| {
                serde_json::json!({
                    "pattern": name,
                    "records": history.len(),
                    "times_searched": history.times_searched(),
                    "times_found": history.times_found(),
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "patterns": patterns,
            "record_count": store.record_count(),
        }));
        return Ok(());
    }

    println!("History: {}", input.display());
    println!("Patterns: {}  Records: {}", store.len(), store.record_count());
    for (name, history) in store.iter() {
        println!(
            "  {name}: {} record(s), found {}/{}",
            history.len(),
            history.times_found(),
            history.times_searched()
        );
    }
    Ok(())
}

/// Re-encode a history file.
pub fn cmd_history_convert(input: &Path, output: &Path, format: &str) -> Result<(), WaypointError> {
    let format = HistoryFormat::parse(format)?;
    let store = load_history(input)?;
    save_history(output, &store, format)?;
    println!(
        "Converted {} record(s) to {}",
        store.record_count(),
        output.display()
    );
    Ok(())
}

// =============================================================================
// MONITOR COMMAND
// =============================================================================

/// Watch a state until Ctrl+C or `max_checks`.
pub async fn cmd_monitor(
    ctx: &Context,
    watch: &str,
    fallback: &str,
    interval_ms: u64,
    max_checks: Option<u64>,
) -> Result<(), WaypointError> {
    if interval_ms == 0 {
        return Err(WaypointError::InvalidConfig(
            "monitor interval must be positive".to_string(),
        ));
    }
    let model = ctx.load_model()?;
    let engine = ctx.replay_engine(&model, &[], Arc::new(waypoint_core::TracingSink), false)?;
    let monitor = StateMonitor::new(
        engine,
        MonitorConfig {
            watch: watch.to_string(),
            fallback: fallback.to_string(),
            interval: Duration::from_millis(interval_ms),
            max_checks,
        },
    );

    let report = monitor
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "checks": report.checks,
            "evidenced": report.evidenced,
            "lost": report.lost,
            "recovered": report.recovered,
            "skipped": report.skipped,
        }));
    } else {
        println!(
            "Monitor stopped: {} check(s), {} lost, {} recovered, {} skipped",
            report.checks, report.lost, report.recovered, report.skipped
        );
    }
    Ok(())
}
