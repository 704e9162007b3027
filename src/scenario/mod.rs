//! Scenario execution.

pub mod camp;
pub mod log;
pub mod plan;
pub mod runner;

use cdp_adapter::TeardownReport;
use chrono::{DateTime, Utc};
use runebattle_core_types::{EnemyKind, ScenarioResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use camp::CampReport;
pub use plan::{CampWait, CastMode, EnemySelection, ScenarioKind, ScenarioPlan};
pub use runner::{BattlePhase, ScenarioRunner};

/// Outcome of trying one spell button.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellAttempt {
    pub attempt: u32,
    pub index: usize,
    /// The button existed and was visible, so a click went out.
    pub dispatched: bool,
    /// A cast-started line showed up before the settle bound.
    pub cast_started: bool,
}

/// Everything one scenario produced in one session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioRun {
    pub plan: ScenarioPlan,
    pub session: usize,
    pub results: Vec<ScenarioResult>,
    pub spell_attempts: Vec<SpellAttempt>,
    pub camp_report: Option<CampReport>,
    /// A second consecutive scene timeout stopped the scenario.
    pub escalated: bool,
    /// The sweep ran out of attempts before every kind was seen.
    pub attempts_exhausted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub teardown: Option<TeardownReport>,
}

impl ScenarioRun {
    /// Distinct known kinds classified across all results.
    pub fn seen_kinds(&self) -> BTreeSet<EnemyKind> {
        self.results
            .iter()
            .map(|result| result.enemy)
            .filter(EnemyKind::is_known)
            .collect()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}
