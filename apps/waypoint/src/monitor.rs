//! # State Monitor
//!
//! A fixed-delay poller that checks whether a watched state is still
//! evidenced and, when it is not, navigates to a fallback state.
//!
//! Each check runs on a blocking worker because verification and navigation
//! are synchronous. At most one check is in flight; ticks that arrive while
//! one is running are skipped.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use waypoint_core::{Engine, NavigationOutcome, WaypointError};

/// What to watch and where to go when it disappears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub watch: String,
    pub fallback: String,
    pub interval: Duration,
    /// Stop after this many started checks.
    pub max_checks: Option<u64>,
}

/// Counters reported when the monitor stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorReport {
    pub checks: u64,
    pub evidenced: u64,
    pub lost: u64,
    pub recovered: u64,
    pub skipped: u64,
}

/// Result of one blocking check.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Check {
    Evidenced,
    Lost(NavigationOutcome),
}

pub struct StateMonitor {
    engine: Arc<Mutex<Engine>>,
    config: MonitorConfig,
}

impl StateMonitor {
    #[must_use]
    pub fn new(engine: Engine, config: MonitorConfig) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            config,
        }
    }

    /// Shared handle to the monitored engine.
    #[must_use]
    pub fn engine(&self) -> Arc<Mutex<Engine>> {
        Arc::clone(&self.engine)
    }

    /// Poll until `shutdown` resolves or `max_checks` checks have completed.
    pub async fn run(
        &self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<MonitorReport, WaypointError> {
        // Both names must resolve before polling starts.
        {
            let engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
            engine.state(&self.config.watch)?;
            engine.state(&self.config.fallback)?;
        }

        let mut report = MonitorReport::default();
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<JoinHandle<Result<Check, WaypointError>>> = None;
        tokio::pin!(shutdown);

        tracing::info!(
            watch = %self.config.watch,
            fallback = %self.config.fallback,
            interval_ms = self.config.interval.as_millis() as u64,
            "monitor started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("monitor shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    if let Some(handle) = in_flight.take() {
                        if !handle.is_finished() {
                            report.skipped = report.skipped.saturating_add(1);
                            tracing::debug!("check still running; tick skipped");
                            in_flight = Some(handle);
                            continue;
                        }
                        Self::settle(handle, &mut report).await?;
                    }
                    if self.config.max_checks.is_some_and(|max| report.checks >= max) {
                        break;
                    }
                    report.checks = report.checks.saturating_add(1);
                    in_flight = Some(self.spawn_check());
                }
            }
        }

        if let Some(handle) = in_flight {
            Self::settle(handle, &mut report).await?;
        }
        tracing::info!(
            checks = report.checks,
            lost = report.lost,
            recovered = report.recovered,
            skipped = report.skipped,
            "monitor stopped"
        );
        Ok(report)
    }

    fn spawn_check(&self) -> JoinHandle<Result<Check, WaypointError>> {
        let engine = Arc::clone(&self.engine);
        let watch = self.config.watch.clone();
        let fallback = self.config.fallback.clone();
        tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
            if engine.is_evidenced(&watch)? {
                return Ok(Check::Evidenced);
            }
            tracing::warn!(state = %watch, "evidence lost; navigating to fallback");
            Ok(Check::Lost(engine.navigate(&fallback)?))
        })
    }

    async fn settle(
        handle: JoinHandle<Result<Check, WaypointError>>,
        report: &mut MonitorReport,
    ) -> Result<(), WaypointError> {
        let check = handle
            .await
            .map_err(|e| WaypointError::IoError(format!("monitor worker failed: {e}")))??;
        match check {
            Check::Evidenced => report.evidenced = report.evidenced.saturating_add(1),
            Check::Lost(outcome) => {
                report.lost = report.lost.saturating_add(1);
                if outcome.is_success() {
                    report.recovered = report.recovered.saturating_add(1);
                } else {
                    tracing::warn!(%outcome, "fallback navigation failed");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::{
        ActionKind, ActionRecord, HistoryReplay, Match, NullSink, Pattern, RecordingActuator,
        Region, Similarity, SnapshotSelector, StateDefinition, StateGraph, TransitionDefinition,
    };

    fn seen(name: &str) -> Pattern {
        let mut pattern = Pattern::new(name);
        pattern.record(ActionRecord::new(
            ActionKind::Find,
            vec![Match::new(Region::new(0, 0, 5, 5), Similarity::EXACT)],
        ));
        pattern
    }

    fn engine(watch_visible: bool) -> Engine {
        let mut graph = StateGraph::new();
        let anchor = if watch_visible {
            seen("editor_tab")
        } else {
            Pattern::new("editor_tab")
        };
        graph
            .register_state(StateDefinition::new("Editor").anchor(anchor).verified_by_anchors())
            .expect("editor");
        graph
            .register_state(StateDefinition::new("Home").anchor(seen("home_logo")).verified_by_anchors())
            .expect("home");
        graph
            .register_transition(TransitionDefinition::to("Editor", "Home"))
            .expect("transition");

        Engine::builder(graph)
            .perception(HistoryReplay::new(SnapshotSelector::fixed(0)))
            .actuator(RecordingActuator::new())
            .sink(Arc::new(NullSink))
            .initial_state("Editor")
            .build()
            .expect("engine")
    }

    fn config(max_checks: u64) -> MonitorConfig {
        MonitorConfig {
            watch: "Editor".to_string(),
            fallback: "Home".to_string(),
            interval: Duration::from_millis(5),
            max_checks: Some(max_checks),
        }
    }

    #[tokio::test]
    async fn evidenced_state_is_left_alone() {
        let monitor = StateMonitor::new(engine(true), config(3));
        let report = monitor.run(std::future::pending()).await.expect("run");

        assert_eq!(report.checks, 3);
        assert_eq!(report.evidenced, 3);
        assert_eq!(report.lost, 0);
    }

    #[tokio::test]
    async fn lost_evidence_triggers_fallback() {
        let monitor = StateMonitor::new(engine(false), config(1));
        let report = monitor.run(std::future::pending()).await.expect("run");

        assert_eq!(report.lost, 1);
        assert_eq!(report.recovered, 1);
        let engine = monitor.engine();
        let engine = engine.lock().expect("lock");
        assert_eq!(engine.active_state_names(), vec!["Home".to_string()]);
    }

    #[tokio::test]
    async fn unknown_watch_state_fails_fast() {
        let mut bad = config(1);
        bad.watch = "Nowhere".to_string();
        let monitor = StateMonitor::new(engine(true), bad);
        assert!(monitor.run(std::future::pending()).await.is_err());
    }
}
