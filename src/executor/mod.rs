//! Orchestration engine
//!
//! Two-lane task scheduling, per-suite run execution, and the bail-out
//! policy.

mod bailout;
mod runner;
mod scheduler;

pub use bailout::BailoutFlag;
pub use runner::SuiteRunner;
pub use scheduler::{OrchestrationOutput, Orchestrator, Scheduler};
