//! Pass/fail judgement per scenario run.

use runebattle_core_types::{BattleOutcome, EnemyKind, GameEvent};
use serde::Serialize;

use crate::report::aggregator::Report;
use crate::scenario::{CampWait, CastMode, EnemySelection, ScenarioKind, ScenarioRun};

/// Slack allowed on the percentage sum.
const PERCENT_TOLERANCE: f64 = 0.01;

pub const EXIT_PASSED: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ESCALATED: i32 = 2;
pub const EXIT_SETUP: i32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Failing fails the scenario.
    Required,
    /// Reported only.
    Advisory,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub severity: Severity,
    pub passed: bool,
    pub detail: String,
}

impl Check {
    fn required(name: &'static str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            severity: Severity::Required,
            passed,
            detail: detail.into(),
        }
    }

    fn advisory(name: &'static str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            severity: Severity::Advisory,
            passed,
            detail: detail.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictOutcome {
    Passed,
    Failed,
    Escalated,
}

impl VerdictOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            VerdictOutcome::Passed => EXIT_PASSED,
            VerdictOutcome::Failed => EXIT_FAILED,
            VerdictOutcome::Escalated => EXIT_ESCALATED,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioVerdict {
    pub scenario: &'static str,
    pub session: usize,
    pub checks: Vec<Check>,
    pub outcome: VerdictOutcome,
}

impl ScenarioVerdict {
    pub fn evaluate(run: &ScenarioRun, report: &Report) -> Self {
        let mut checks = vec![
            Check::required(
                "no_escalation",
                !run.escalated,
                if run.escalated {
                    "stopped after a second consecutive scene timeout"
                } else {
                    "no repeated scene timeouts"
                },
            ),
            battle_entered(run),
            enemy_identity(run),
            distribution(run, report),
        ];

        checks.push(coverage(run, report));

        if run.plan.casts_enabled() {
            match run.plan.cast_mode {
                CastMode::FirstVisible => checks.push(cast_started(run)),
                CastMode::EachIndex(_) => checks.push(spell_buttons(run)),
            }
        }

        if run.plan.kind == ScenarioKind::DevSweep {
            checks.push(dev_selection(run));
        }

        if run.plan.camp_wait != CampWait::Skip {
            let rewarded = run
                .results
                .iter()
                .any(|result| result.has_event(GameEvent::is_reward));
            checks.push(Check::advisory(
                "rewards_observed",
                rewarded,
                if rewarded {
                    "reward events logged"
                } else {
                    "no battle logged a reward"
                },
            ));
        }

        if let Some(camp) = &run.camp_report {
            checks.push(Check::advisory(
                "rest_available",
                camp.rested,
                format!("{} rest events", camp.rest_events.len()),
            ));
            checks.push(Check::advisory(
                "shop_opened",
                camp.shop_opened,
                format!("{} shop items", camp.shop_items),
            ));
            checks.push(Check::advisory(
                "purchase_logged",
                camp.purchase_logged,
                if camp.purchased {
                    "buy button pressed"
                } else {
                    "nothing bought"
                },
            ));
        }

        let outcome = if run.escalated {
            VerdictOutcome::Escalated
        } else if checks
            .iter()
            .any(|check| check.severity == Severity::Required && !check.passed)
        {
            VerdictOutcome::Failed
        } else {
            VerdictOutcome::Passed
        };

        Self {
            scenario: run.plan.name(),
            session: run.session,
            checks,
            outcome,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

/// Worst exit code across verdicts; escalation outranks failure.
pub fn overall_exit_code(verdicts: &[ScenarioVerdict]) -> i32 {
    verdicts
        .iter()
        .map(ScenarioVerdict::exit_code)
        .max()
        .unwrap_or(EXIT_PASSED)
}

fn battle_entered(run: &ScenarioRun) -> Check {
    let entered = run
        .results
        .iter()
        .filter(|result| {
            matches!(
                result.outcome,
                BattleOutcome::Completed | BattleOutcome::ForceEnded
            )
        })
        .count();
    Check::required(
        "battle_entered",
        entered > 0,
        format!("{entered} of {} attempts reached the battle scene", run.results.len()),
    )
}

fn enemy_identity(run: &ScenarioRun) -> Check {
    let drifted: Vec<u32> = run
        .results
        .iter()
        .filter(|result| result.enemy.is_known())
        .filter(|result| {
            result.has_event(|event| {
                matches!(event, GameEvent::EnemyEncountered { kind } if *kind != result.enemy)
            })
        })
        .map(|result| result.attempt)
        .collect();
    let detail = if drifted.is_empty() {
        "one enemy per battle".to_string()
    } else {
        format!("attempts {drifted:?} logged a second enemy kind")
    };
    Check::required("enemy_identity_stable", drifted.is_empty(), detail)
}

fn distribution(run: &ScenarioRun, report: &Report) -> Check {
    let counted: u32 = report.encounters.values().sum();
    let in_range = report
        .percentages
        .values()
        .all(|pct| (0.0..=100.0).contains(pct));
    let sum = report.percentage_sum();
    let sums_to_whole = report.total == 0 || (sum - 100.0).abs() <= PERCENT_TOLERANCE;
    let passed = counted as usize == run.results.len() && in_range && sums_to_whole;
    Check::required(
        "distribution_sanity",
        passed,
        format!("{counted} encounters over {} battles, percentages sum to {sum:.1}", run.results.len()),
    )
}

fn coverage(run: &ScenarioRun, report: &Report) -> Check {
    let detail = if report.all_enemies_observed {
        "all enemy kinds observed".to_string()
    } else {
        let missing: Vec<&str> = EnemyKind::KNOWN
            .iter()
            .filter(|kind| report.count(**kind) == 0)
            .map(|kind| kind.as_str())
            .collect();
        let mut detail = format!("missing {}", missing.join(", "));
        if run.attempts_exhausted {
            detail.push_str(&format!(" after {} attempts", run.plan.max_attempts));
        }
        detail
    };
    let requests_every_kind = match &run.plan.enemy_selection {
        EnemySelection::Sequence(kinds) => EnemyKind::KNOWN.iter().all(|kind| kinds.contains(kind)),
        EnemySelection::Random => false,
    };
    let required = run.plan.stop_when_all_seen || requests_every_kind;
    if required {
        Check::required("enemy_coverage", report.all_enemies_observed, detail)
    } else {
        Check::advisory("enemy_coverage", report.all_enemies_observed, detail)
    }
}

fn cast_started(run: &ScenarioRun) -> Check {
    let casting: Vec<_> = run.results.iter().filter(|result| result.casts > 0).collect();
    let started = casting
        .iter()
        .filter(|result| result.has_event(GameEvent::is_cast_started))
        .count();
    Check::required(
        "cast_started",
        started > 0,
        format!("{started} of {} casting battles logged a cast start", casting.len()),
    )
}

fn spell_buttons(run: &ScenarioRun) -> Check {
    let dispatched = run.spell_attempts.iter().filter(|spell| spell.dispatched).count();
    let started = run.spell_attempts.iter().filter(|spell| spell.cast_started).count();
    Check::required(
        "spell_buttons_cast",
        started > 0,
        format!(
            "{dispatched} of {} spell buttons clicked, {started} started a cast",
            run.spell_attempts.len()
        ),
    )
}

fn dev_selection(run: &ScenarioRun) -> Check {
    let mismatched: Vec<String> = run
        .results
        .iter()
        .filter(|result| result.outcome != BattleOutcome::EntryTimedOut)
        .filter_map(|result| {
            let requested = result.requested_enemy?;
            (requested != result.enemy)
                .then(|| format!("#{} asked {} got {}", result.attempt, requested, result.enemy))
        })
        .collect();
    let detail = if mismatched.is_empty() {
        "every selected enemy appeared".to_string()
    } else {
        mismatched.join("; ")
    };
    Check::required("dev_selection_matches", mismatched.is_empty(), detail)
}
