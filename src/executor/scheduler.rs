//! Task scheduling
//!
//! Classifies tasks into two lanes, enforces the pool cap and the
//! exclusive-lane rule, and drives the control loop until every task is
//! accounted for. All lane/running/done state is touched only from this
//! loop; concurrency is expressed as overlapping spawned runs, never as
//! parallel orchestration logic.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::executor::{BailoutFlag, SuiteRunner};
use crate::harness::Harness;
use crate::models::{Lane, ProgressEvent, SuiteResult, Task, TaskStatus};
use crate::ports::PortAllocator;
use crate::report::{AggregateReport, Aggregator};

/// One occupied pool slot.
struct RunningEntry {
    launcher: String,
    lane: Lane,
}

/// A completed run arriving back at the control loop.
struct Outcome {
    launcher: String,
    result: SuiteResult,
}

/// Two-lane scheduler with a bounded pool.
///
/// Dispatch is driven by a completion channel: slots are refilled each time
/// a run reports back, so there is no timed re-polling.
pub struct Scheduler<H: Harness> {
    pool_size: usize,
    runner: SuiteRunner<H>,
    progress: mpsc::UnboundedSender<ProgressEvent>,
}

impl<H: Harness> Scheduler<H> {
    pub fn new(
        pool_size: usize,
        runner: SuiteRunner<H>,
        progress: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Self {
        Self {
            pool_size,
            runner,
            progress,
        }
    }

    /// Execute every task exactly once (or record it skipped), feeding the
    /// aggregator in completion order. Returns once `done == total`.
    pub async fn run(&self, tasks: Vec<Task>, aggregator: &mut Aggregator) {
        let total = tasks.len();
        let mut default_lane: VecDeque<Task> = VecDeque::new();
        let mut exclusive_lane: VecDeque<Task> = VecDeque::new();

        for task in tasks {
            match task.lane {
                Lane::Default => default_lane.push_back(task),
                Lane::Exclusive => exclusive_lane.push_back(task),
            }
        }

        info!(
            "{} default-lane and {} exclusive-lane tasks to run (pool size {})",
            default_lane.len(),
            exclusive_lane.len(),
            self.pool_size
        );

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Outcome>();
        let mut running: Vec<RunningEntry> = Vec::new();

        while aggregator.len() < total {
            // Fill free slots. The exclusive lane has priority whenever its
            // single slot is free, so default tasks cannot starve it.
            while running.len() < self.pool_size {
                let exclusive_running = running.iter().any(|e| e.lane == Lane::Exclusive);
                let next = if !exclusive_lane.is_empty() && !exclusive_running {
                    exclusive_lane.pop_front()
                } else {
                    default_lane.pop_front()
                };

                let Some(mut task) = next else { break };
                task.status = TaskStatus::Running;
                running.push(RunningEntry {
                    launcher: task.launcher.clone(),
                    lane: task.lane,
                });

                let runner = self.runner.clone();
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    let result = runner.run(&task).await;
                    let _ = done_tx.send(Outcome {
                        launcher: task.launcher,
                        result,
                    });
                });
            }

            // The scheduler keeps a sender alive, so recv only yields None
            // if the runtime is tearing down.
            let Some(outcome) = done_rx.recv().await else {
                break;
            };

            // Free the slot by launcher match. A miss is an accounting
            // error, logged and survived.
            match running
                .iter()
                .position(|e| e.launcher == outcome.launcher)
            {
                Some(index) => {
                    running.remove(index);
                }
                None => {
                    warn!(
                        "no running entry found for launcher {}",
                        outcome.launcher
                    );
                    let _ = self.progress.send(ProgressEvent::AccountingError {
                        launcher: outcome.launcher.clone(),
                    });
                }
            }

            if !outcome.result.skipped {
                let _ = self.progress.send(ProgressEvent::TaskFinished {
                    suite: outcome.result.suite.clone(),
                    running: running.len(),
                    pending: default_lane.len() + exclusive_lane.len(),
                });
            }
            aggregator.push(outcome.result);
        }

        info!("all {} tasks accounted for", total);
    }
}

/// Output of a full orchestration: the structured report plus the rendered
/// TAP document.
pub struct OrchestrationOutput {
    pub report: AggregateReport,
    pub tap: String,
}

/// Wires config, harness, scheduler, and aggregator together.
pub struct Orchestrator<H: Harness> {
    config: Arc<RunnerConfig>,
    harness: Arc<H>,
    progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    progress_rx: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
}

impl<H: Harness> Orchestrator<H> {
    pub fn new(config: RunnerConfig, harness: H) -> Self {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        Self {
            config: Arc::new(config),
            harness: Arc::new(harness),
            progress_tx,
            progress_rx: Some(progress_rx),
        }
    }

    /// Take the progress event stream. Each event renders as one
    /// human-readable line.
    pub fn take_progress(&mut self) -> Option<mpsc::UnboundedReceiver<ProgressEvent>> {
        self.progress_rx.take()
    }

    /// Run every configured suite and produce the merged report.
    pub async fn run(self) -> anyhow::Result<OrchestrationOutput> {
        self.config.validate()?;

        let tasks = self.config.tasks();
        let runner = SuiteRunner::new(
            self.config.clone(),
            self.harness.clone(),
            PortAllocator::new(),
            BailoutFlag::new(),
            self.progress_tx.clone(),
        );
        let scheduler = Scheduler::new(self.config.pool_size, runner, self.progress_tx.clone());

        let mut aggregator = Aggregator::new(self.config.output.clone());
        scheduler.run(tasks, &mut aggregator).await;

        let report = aggregator.finalize();
        let tap = report.render_tap();
        Ok(OrchestrationOutput { report, tap })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{HarnessError, HarnessEvent};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Harness that tracks concurrency while pretending to run suites.
    struct CountingHarness {
        running: AtomicUsize,
        exclusive_running: AtomicUsize,
        max_running: AtomicUsize,
        max_exclusive: AtomicUsize,
        /// Launcher treated as the exclusive browser.
        browser: &'static str,
        /// Suites whose single case fails.
        failing: Vec<&'static str>,
        order: Mutex<Vec<String>>,
    }

    impl CountingHarness {
        fn new(browser: &'static str) -> Self {
            Self {
                running: AtomicUsize::new(0),
                exclusive_running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
                max_exclusive: AtomicUsize::new(0),
                browser,
                failing: Vec::new(),
                order: Mutex::new(Vec::new()),
            }
        }

        fn enter(&self, exclusive: bool) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            if exclusive {
                let now = self.exclusive_running.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_exclusive.fetch_max(now, Ordering::SeqCst);
            }
        }

        fn leave(&self, exclusive: bool) {
            self.running.fetch_sub(1, Ordering::SeqCst);
            if exclusive {
                self.exclusive_running.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    impl Harness for CountingHarness {
        fn version(&self) -> String {
            "1.0.0-test".to_string()
        }

        async fn run(
            &self,
            config_path: &Path,
            _port: u16,
            events: tokio::sync::mpsc::UnboundedSender<HarnessEvent>,
        ) -> Result<(), HarnessError> {
            // The per-run artifact names which suite and launcher this is.
            let content = std::fs::read_to_string(config_path).unwrap_or_default();
            let options: serde_json::Value = serde_json::from_str(&content).unwrap_or_default();
            let suite = options["test_page"]
                .as_str()
                .unwrap_or("")
                .split('#')
                .next()
                .unwrap_or("")
                .to_string();
            let exclusive = options["launch_in_ci"][0].as_str() == Some(self.browser);

            self.enter(exclusive);
            self.order.lock().unwrap().push(suite.clone());
            tokio::time::sleep(Duration::from_millis(20)).await;

            let ok = !self.failing.contains(&suite.as_str());
            let _ = events.send(HarnessEvent::Case {
                name: "case".to_string(),
                ok,
            });
            let _ = events.send(HarnessEvent::SuiteFinished {
                tests: 1,
                pass: usize::from(ok),
                fail: usize::from(!ok),
            });
            self.leave(exclusive);
            Ok(())
        }
    }

    fn config_three_suites(pool_size: usize, bail_out: bool) -> RunnerConfig {
        let mut config = RunnerConfig {
            pool_size,
            files: vec!["a.js".into(), "b.js".into(), "c.js".into()],
            browser_files: vec!["b.js".into()],
            browser: Some("chrome".into()),
            ..Default::default()
        };
        config.output.bail_out = bail_out;
        config
    }

    #[tokio::test]
    async fn test_all_tasks_accounted_for() {
        let orchestrator =
            Orchestrator::new(config_three_suites(2, false), CountingHarness::new("chrome"));
        let output = orchestrator.run().await.unwrap();

        assert_eq!(output.report.results.len(), 3);
        assert!(output
            .report
            .results
            .iter()
            .all(|r| r.status() == TaskStatus::Done));
        assert_eq!(output.report.tests, 3);
        assert_eq!(output.report.pass, 3);
    }

    #[tokio::test]
    async fn test_pool_cap_and_exclusive_cap_hold() {
        let mut config = config_three_suites(2, false);
        config.files.push("d.js".into());
        config.files.push("e.js".into());
        config.browser_files.push("d.js".into());

        let harness = CountingHarness::new("chrome");
        let mut orchestrator = Orchestrator::new(config, harness);
        let _ = orchestrator.take_progress();
        // Reach through to the shared harness for the counters.
        let harness = orchestrator.harness.clone();
        orchestrator.run().await.unwrap();

        assert!(harness.max_running.load(Ordering::SeqCst) <= 2);
        assert_eq!(harness.max_exclusive.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exclusive_lane_has_priority() {
        // Pool of one forces strictly sequential dispatch, so the first
        // started suite must be the exclusive one despite file order.
        let config = config_three_suites(1, false);
        let mut orchestrator = Orchestrator::new(config, CountingHarness::new("chrome"));
        let harness = orchestrator.harness.clone();
        let _ = orchestrator.take_progress();
        orchestrator.run().await.unwrap();

        let order = harness.order.lock().unwrap().clone();
        assert_eq!(order[0], "b.js");
        // Default lane stays FIFO.
        assert_eq!(&order[1..], ["a.js", "c.js"]);
    }

    #[tokio::test]
    async fn test_bailout_skips_not_yet_started() {
        let mut harness = CountingHarness::new("chrome");
        harness.failing.push("a.js");
        let mut config = config_three_suites(1, true);
        config.browser_files.clear();
        config.browser = None;

        let orchestrator = Orchestrator::new(config, harness);
        let output = orchestrator.run().await.unwrap();

        assert_eq!(output.report.results.len(), 3);
        assert!(output.report.fail >= 1);

        let skipped: Vec<_> = output
            .report
            .results
            .iter()
            .filter(|r| r.skipped)
            .collect();
        assert_eq!(skipped.len(), 2);
        assert!(skipped.iter().all(|r| r.tests == 0));
        assert!(output.tap.contains("# BAILED OUT: Skipping b.js"));
    }

    #[tokio::test]
    async fn test_progress_events_flow() {
        let mut orchestrator =
            Orchestrator::new(config_three_suites(2, false), CountingHarness::new("chrome"));
        let mut progress = orchestrator.take_progress().unwrap();

        let output = orchestrator.run().await.unwrap();
        assert_eq!(output.report.results.len(), 3);

        let mut started = 0;
        let mut finished = 0;
        while let Ok(event) = progress.try_recv() {
            match event {
                ProgressEvent::TaskStarted { .. } => started += 1,
                ProgressEvent::TaskFinished { .. } => finished += 1,
                _ => {}
            }
        }
        assert_eq!(started, 3);
        assert_eq!(finished, 3);
    }
}
