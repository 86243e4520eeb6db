//! Suite run execution
//!
//! Drives one suite through the harness collaborator: skip check, port
//! allocation, per-run configuration artifact, dual completion barrier,
//! and guaranteed artifact cleanup on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::config::RunnerConfig;
use crate::executor::BailoutFlag;
use crate::harness::{Harness, HarnessEvent};
use crate::models::{CaseResult, ProgressEvent, SuiteResult, Task};
use crate::ports::PortAllocator;

/// Executes single suite runs and reports exactly one `SuiteResult` each.
///
/// Failures inside one run never propagate to the scheduler; they are
/// logged and folded into the result.
pub struct SuiteRunner<H: Harness> {
    config: Arc<RunnerConfig>,
    harness: Arc<H>,
    ports: PortAllocator,
    bailout: BailoutFlag,
    progress: mpsc::UnboundedSender<ProgressEvent>,
}

// Manual impl: `H` itself does not need to be `Clone` behind the `Arc`.
impl<H: Harness> Clone for SuiteRunner<H> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            harness: self.harness.clone(),
            ports: self.ports.clone(),
            bailout: self.bailout.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<H: Harness> SuiteRunner<H> {
    pub fn new(
        config: Arc<RunnerConfig>,
        harness: Arc<H>,
        ports: PortAllocator,
        bailout: BailoutFlag,
        progress: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Self {
        Self {
            config,
            harness,
            ports,
            bailout,
            progress,
        }
    }

    /// Run one task to a `SuiteResult`.
    pub async fn run(&self, task: &Task) -> SuiteResult {
        let suite = task.display_name().to_string();

        if self.bailout.should_skip(task) {
            let _ = self.progress.send(ProgressEvent::Skipped {
                suite: suite.clone(),
            });
            return SuiteResult::bailed_out(suite, &task.launcher);
        }

        let port = self.ports.allocate().await;

        let options = match self.config.run_config(&task.suite, port, &task.launcher) {
            Ok(options) => options,
            Err(e) => {
                error!("failed to build run config for {}: {:#}", suite, e);
                return SuiteResult::errored(suite, &task.launcher, Vec::new(), e.to_string());
            }
        };

        // Dropped at the end of this scope, removing the file on every exit
        // path, including harness errors.
        let artifact = match ConfigArtifact::persist(&options) {
            Ok(artifact) => artifact,
            Err(e) => {
                error!("failed to persist run config for {}: {:#}", suite, e);
                return SuiteResult::errored(suite, &task.launcher, Vec::new(), e.to_string());
            }
        };

        let _ = self.progress.send(ProgressEvent::TaskStarted {
            suite: suite.clone(),
        });

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // 2-of-2 completion barrier: the harness invocation resolving and
        // the suite-finished event are independent signals; neither alone
        // finishes the run.
        let (run_result, listened) = tokio::join!(
            self.harness.run(artifact.path(), port, events_tx),
            self.listen(&suite, events_rx),
        );

        let result = match run_result {
            Ok(()) => {
                let (tests, pass, fail) = listened.counts.unwrap_or_else(|| {
                    // Suite-finished never arrived; fall back to tallying
                    // the observed cases.
                    let pass = listened.cases.iter().filter(|c| c.ok).count();
                    let fail = listened.cases.len() - pass;
                    (listened.cases.len(), pass, fail)
                });
                SuiteResult::completed(
                    suite,
                    &task.launcher,
                    listened.cases,
                    tests,
                    pass,
                    fail,
                    self.harness.version(),
                )
            }
            Err(e) => {
                error!("harness invocation for {} failed: {}", suite, e);
                SuiteResult::errored(suite, &task.launcher, listened.cases, e.to_string())
            }
        };

        if result.has_failure() && self.config.output.bail_out {
            self.bailout.trigger();
        }

        result
    }

    /// Consume harness events until the suite-finished signal (or channel
    /// close, when the harness died before reporting one). Case names are
    /// prefixed with the suite path here, before the aggregator sees them.
    async fn listen(&self, suite: &str, mut events: mpsc::UnboundedReceiver<HarnessEvent>) -> Listened {
        let mut cases = Vec::new();
        let mut counts = None;

        while let Some(event) = events.recv().await {
            match event {
                HarnessEvent::Case { name, ok } => {
                    let prefixed = format!("{suite} - {name}");
                    let line = if ok {
                        format!("ok {prefixed}")
                    } else {
                        format!("not ok {prefixed}")
                    };
                    let _ = self.progress.send(ProgressEvent::Case { line });
                    cases.push(CaseResult { name: prefixed, ok });
                }
                HarnessEvent::SuiteFinished { tests, pass, fail } => {
                    counts = Some((tests, pass, fail));
                    break;
                }
            }
        }

        if counts.is_none() {
            warn!("suite {} ended without a suite-finished event", suite);
        }

        Listened { cases, counts }
    }
}

struct Listened {
    cases: Vec<CaseResult>,
    counts: Option<(usize, usize, usize)>,
}

/// Transient per-run configuration file with a collision-resistant name.
/// Removal happens in `Drop`, so cleanup covers error paths too.
struct ConfigArtifact {
    path: PathBuf,
}

impl ConfigArtifact {
    fn persist(options: &serde_json::Value) -> anyhow::Result<Self> {
        let name = format!(
            "testem.{}.{:08x}.json",
            chrono::Utc::now().timestamp_millis(),
            rand::random::<u32>()
        );
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, serde_json::to_vec_pretty(options)?)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("failed to remove {}: {}", self.path.display(), e);
        }
    }
}
