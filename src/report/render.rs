use anyhow::Result;
use runebattle_core_types::{EnemyKind, LogCategory};
use std::fmt::Write as _;

use crate::cli::output::OutputFormat;
use crate::report::{HarnessReport, Report, Severity};

pub fn render(report: &HarnessReport, format: &OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Human => render_human(report),
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
    })
}

pub fn render_human(report: &HarnessReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "RuneBattle E2E Report");
    let _ = writeln!(out, "=====================");
    let _ = writeln!(out, "Run: {}", report.run_id);
    let _ = writeln!(out, "Vocabulary: {}", report.vocabulary_version);

    for scenario in &report.scenarios {
        let run = &scenario.run;
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Scenario {} (session {}) - {:?}",
            run.plan.name(),
            run.session,
            scenario.verdict.outcome
        );
        let _ = writeln!(
            out,
            "- Battles: {}  Elapsed: {}",
            run.results.len(),
            humantime::format_duration(truncate_millis(run.elapsed()))
        );
        if run.attempts_exhausted {
            let _ = writeln!(
                out,
                "- Attempt budget of {} exhausted before every enemy was seen",
                run.plan.max_attempts
            );
        }
        for result in &run.results {
            let _ = writeln!(
                out,
                "  #{:<2} {:<8} {:<14} casts={} events={}",
                result.attempt,
                result.enemy.as_str(),
                format!("{:?}", result.outcome),
                result.casts,
                result.events.len()
            );
        }
        for spell in &run.spell_attempts {
            let _ = writeln!(
                out,
                "  spell[{}] dispatched={} cast_started={}",
                spell.index, spell.dispatched, spell.cast_started
            );
        }
        if let Some(camp) = &run.camp_report {
            let _ = writeln!(
                out,
                "- Camp: rested={} shop_items={} purchased={} slots={}",
                camp.rested, camp.shop_items, camp.purchase_logged, camp.spell_slots
            );
            if let Some(resources) = &camp.resources {
                let _ = writeln!(out, "  resources: {}", resources.replace('\n', " | "));
            }
        }
        write_distribution(&mut out, &scenario.summary);
        write_excerpts(&mut out, &scenario.summary);

        let _ = writeln!(out, "- Checks:");
        for check in &scenario.verdict.checks {
            let mark = match (check.passed, check.severity) {
                (true, _) => "ok  ",
                (false, Severity::Required) => "FAIL",
                (false, Severity::Advisory) => "warn",
            };
            let _ = writeln!(out, "  [{mark}] {}: {}", check.name, check.detail);
        }
    }

    if report.scenarios.len() > 1 {
        let _ = writeln!(out);
        let _ = writeln!(out, "Combined");
        write_distribution(&mut out, &report.combined);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Exit code: {}", report.exit_code);
    out
}

fn write_distribution(out: &mut String, summary: &Report) {
    let _ = writeln!(out, "- Encounters ({} total):", summary.total);
    for (kind, count) in &summary.encounters {
        let _ = writeln!(
            out,
            "  {:<8} {:>3}  {:>5.1}%",
            kind.as_str(),
            count,
            summary.percentage(*kind)
        );
    }
    let _ = writeln!(
        out,
        "  all enemy types observed: {}",
        if summary.all_enemies_observed { "yes" } else { "no" }
    );
}

fn write_excerpts(out: &mut String, summary: &Report) {
    for (kind, enemy) in &summary.enemies {
        if enemy.excerpts.is_empty() {
            continue;
        }
        let _ = writeln!(out, "- {} ({}):", kind.display_name(), kind.as_str());
        for category in LogCategory::ALL {
            let Some(lines) = enemy.excerpts.get(&category) else {
                continue;
            };
            let _ = writeln!(out, "  {:?}:", category);
            for line in lines {
                let _ = writeln!(out, "    {line}");
            }
        }
    }
}

fn truncate_millis(elapsed: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(elapsed.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunPolicy;
    use crate::scenario::{ScenarioPlan, ScenarioRun};
    use chrono::Utc;
    use runebattle_core_types::{BattleOutcome, GameEvent, RunId, ScenarioResult};

    fn sample() -> HarnessReport {
        let results = EnemyKind::KNOWN
            .iter()
            .enumerate()
            .map(|(i, kind)| ScenarioResult {
                attempt: i as u32 + 1,
                enemy: *kind,
                requested_enemy: None,
                events: vec![GameEvent::EnemyEncountered { kind: *kind }],
                log_lines: vec![format!("[BATTLE] {} 攻击 玩家，造成 3 点伤害", kind.display_name())],
                casts: 0,
                outcome: BattleOutcome::Completed,
            })
            .collect();
        let run = ScenarioRun {
            plan: ScenarioPlan::repeated_battles(3, &RunPolicy::default()),
            session: 0,
            results,
            spell_attempts: Vec::new(),
            camp_report: None,
            escalated: false,
            attempts_exhausted: false,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            teardown: None,
        };
        HarnessReport::build(RunId("run-1".into()), vec![run]).unwrap()
    }

    #[test]
    fn human_output_lists_distribution_and_checks() {
        let text = render_human(&sample());
        assert!(text.contains("Scenario repeated_battles (session 0) - Passed"));
        assert!(text.contains("all enemy types observed: yes"));
        assert!(text.contains("[ok  ] distribution_sanity"));
        assert!(text.contains("恶狼 攻击 玩家"));
        assert!(text.ends_with("Exit code: 0\n"));
    }

    #[test]
    fn json_output_is_machine_readable() {
        let text = render(&sample(), &OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["run_id"], "run-1");
        assert_eq!(value["vocabulary_version"], "zh-CN/1");
        assert_eq!(value["scenarios"][0]["summary"]["encounters"]["wolf"], 1);
        assert_eq!(value["scenarios"][0]["verdict"]["outcome"], "passed");
        assert_eq!(value["exit_code"], 0);
    }
}
