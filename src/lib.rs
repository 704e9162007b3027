//! RuneBattle end-to-end harness
//!
//! Drives the browser game through scenario plans, classifies its log output
//! and judges each run. Exposes modules for integration testing.

pub mod cli;
pub mod config;
pub mod report;
pub mod scenario;
pub mod session;

pub use config::{load_config, HarnessConfig, LoadedConfig, RunPolicy, Timings};
pub use report::{HarnessReport, Report, ResultAggregator, ScenarioVerdict, VerdictOutcome};
pub use scenario::{ScenarioPlan, ScenarioRun, ScenarioRunner};
pub use session::{run_parallel, run_session, ChromiumLauncher, SessionLauncher};
