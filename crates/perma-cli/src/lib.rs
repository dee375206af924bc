//! Perma command-line tooling
//!
//! - [`demo`]: scripted editing session and describe output
//! - [`simulate`]: seeded multi-writer convergence simulator
//! - [`logging`]: tracing subscriber setup

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod demo;
pub mod logging;
pub mod simulate;

pub use demo::{describe_json, run_demo, DemoRun};
pub use logging::init_logging;
pub use simulate::{run_simulator, SimulatorConfig, SimulatorReport, SimulatorStats, Violation};
