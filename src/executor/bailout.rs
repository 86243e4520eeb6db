//! Bail-out policy
//!
//! A process-wide flag that, once set, skips every task not yet started.
//! Tasks already running are never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::models::Task;

/// Monotonic bail-out flag: false to true at most once, never reset during
/// one orchestration run.
#[derive(Clone, Debug, Default)]
pub struct BailoutFlag {
    triggered: Arc<AtomicBool>,
}

impl BailoutFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            info!("bail-out triggered; tasks not yet started will be skipped");
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Whether a pending task should be skipped instead of executed.
    pub fn should_skip(&self, _task: &Task) -> bool {
        self.is_triggered()
    }
}
