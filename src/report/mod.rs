//! Run summaries, verdicts and their rendering.

pub mod aggregator;
pub mod render;
pub mod verdict;

use chrono::{DateTime, Utc};
use runebattle_core_types::RunId;
use serde::Serialize;

use crate::scenario::ScenarioRun;

pub use aggregator::{EnemySummary, Report, ResultAggregator, COMBAT_EXCERPT_LIMIT};
pub use verdict::{
    overall_exit_code, Check, ScenarioVerdict, Severity, VerdictOutcome, EXIT_ESCALATED,
    EXIT_FAILED, EXIT_PASSED, EXIT_SETUP,
};

/// One session's run with its summary and verdict.
#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    pub run: ScenarioRun,
    pub summary: Report,
    pub verdict: ScenarioVerdict,
}

/// Everything one harness invocation produced. Written as the JSON artifact.
#[derive(Clone, Debug, Serialize)]
pub struct HarnessReport {
    pub run_id: RunId,
    pub vocabulary_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub scenarios: Vec<ScenarioReport>,
    /// Summary across every session.
    pub combined: Report,
    pub exit_code: i32,
}

impl HarnessReport {
    pub fn build(run_id: RunId, runs: Vec<ScenarioRun>) -> anyhow::Result<Self> {
        let aggregator = ResultAggregator::new()?;
        let scenarios: Vec<ScenarioReport> = runs
            .into_iter()
            .map(|run| {
                let summary = aggregator.summarize(&run.results);
                let verdict = ScenarioVerdict::evaluate(&run, &summary);
                ScenarioReport {
                    run,
                    summary,
                    verdict,
                }
            })
            .collect();
        let all_results: Vec<_> = scenarios
            .iter()
            .flat_map(|scenario| scenario.run.results.iter().cloned())
            .collect();
        let verdicts: Vec<ScenarioVerdict> = scenarios
            .iter()
            .map(|scenario| scenario.verdict.clone())
            .collect();

        Ok(Self {
            run_id,
            vocabulary_version: perceiver_events::Vocabulary::VERSION,
            generated_at: Utc::now(),
            combined: aggregator.summarize(&all_results),
            exit_code: overall_exit_code(&verdicts),
            scenarios,
        })
    }
}
