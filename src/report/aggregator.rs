use anyhow::{Context, Result};
use perceiver_events::EventClassifier;
use runebattle_core_types::{EnemyKind, GameEvent, LogCategory, ScenarioResult};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Combat lines kept per enemy; other categories are kept whole.
pub const COMBAT_EXCERPT_LIMIT: usize = 3;

/// Read-only summary of an ordered run of battle results.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub total: u32,
    /// Every known kind is present, zero-filled. `Unknown` appears only when
    /// it was recorded.
    pub encounters: BTreeMap<EnemyKind, u32>,
    pub percentages: BTreeMap<EnemyKind, f64>,
    pub distinct_known: usize,
    pub all_enemies_observed: bool,
    pub unknown_count: u32,
    pub enemies: BTreeMap<EnemyKind, EnemySummary>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EnemySummary {
    pub battles: u32,
    pub excerpts: BTreeMap<LogCategory, Vec<String>>,
    /// Number of this enemy's battles in which each event label appeared.
    pub event_tallies: BTreeMap<String, u32>,
}

impl Report {
    pub fn count(&self, kind: EnemyKind) -> u32 {
        self.encounters.get(&kind).copied().unwrap_or(0)
    }

    pub fn percentage(&self, kind: EnemyKind) -> f64 {
        self.percentages.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn percentage_sum(&self) -> f64 {
        self.percentages.values().sum()
    }
}

pub struct ResultAggregator {
    classifier: EventClassifier,
}

impl ResultAggregator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            classifier: EventClassifier::new().context("failed to build event classifier")?,
        })
    }

    pub fn summarize(&self, results: &[ScenarioResult]) -> Report {
        let mut encounters: BTreeMap<EnemyKind, u32> =
            EnemyKind::KNOWN.iter().map(|kind| (*kind, 0)).collect();
        let mut enemies: BTreeMap<EnemyKind, EnemySummary> = BTreeMap::new();

        for result in results {
            *encounters.entry(result.enemy).or_insert(0) += 1;

            let summary = enemies.entry(result.enemy).or_default();
            summary.battles += 1;
            let labels: BTreeSet<&str> = result.events.iter().map(GameEvent::label).collect();
            for label in labels {
                *summary.event_tallies.entry(label.to_string()).or_insert(0) += 1;
            }
            for line in &result.log_lines {
                for category in self.classifier.categorize(line) {
                    let lines = summary.excerpts.entry(category).or_default();
                    if category == LogCategory::Combat && lines.len() >= COMBAT_EXCERPT_LIMIT {
                        continue;
                    }
                    if !lines.iter().any(|existing| existing == line) {
                        lines.push(line.clone());
                    }
                }
            }
        }

        let total = results.len() as u32;
        let percentages = encounters
            .iter()
            .map(|(kind, count)| (*kind, percent(*count, total)))
            .collect();
        let distinct_known = EnemyKind::KNOWN
            .iter()
            .filter(|kind| encounters.get(kind).is_some_and(|count| *count > 0))
            .count();
        let unknown_count = encounters.get(&EnemyKind::Unknown).copied().unwrap_or(0);

        Report {
            total,
            encounters,
            percentages,
            distinct_known,
            all_enemies_observed: distinct_known == EnemyKind::KNOWN.len(),
            unknown_count,
            enemies,
        }
    }
}

fn percent(count: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(count) * 100.0 / f64::from(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use runebattle_core_types::{BattleOutcome, ResourceKind};

    fn battle(attempt: u32, enemy: EnemyKind, lines: &[&str]) -> ScenarioResult {
        ScenarioResult {
            attempt,
            enemy,
            requested_enemy: None,
            events: vec![GameEvent::EnemyEncountered { kind: enemy }],
            log_lines: lines.iter().map(|line| line.to_string()).collect(),
            casts: 0,
            outcome: BattleOutcome::Completed,
        }
    }

    #[test]
    fn ten_battles_give_exact_percentages() {
        let kinds = [
            EnemyKind::Wolf,
            EnemyKind::Goblin,
            EnemyKind::Ogre,
            EnemyKind::Goblin,
            EnemyKind::Wolf,
            EnemyKind::Goblin,
            EnemyKind::Ogre,
            EnemyKind::Wolf,
            EnemyKind::Goblin,
            EnemyKind::Ogre,
        ];
        let results: Vec<_> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| battle(i as u32 + 1, *kind, &[]))
            .collect();

        let report = ResultAggregator::new().unwrap().summarize(&results);
        assert_eq!(report.total, 10);
        assert_eq!(report.count(EnemyKind::Wolf), 3);
        assert_eq!(report.count(EnemyKind::Goblin), 4);
        assert_eq!(report.count(EnemyKind::Ogre), 3);
        assert_eq!(report.percentage(EnemyKind::Wolf), 30.0);
        assert_eq!(report.percentage(EnemyKind::Goblin), 40.0);
        assert_eq!(report.percentage(EnemyKind::Ogre), 30.0);
        assert!(report.all_enemies_observed);
        assert_eq!(report.unknown_count, 0);
        assert!(!report.encounters.contains_key(&EnemyKind::Unknown));
    }

    #[test]
    fn empty_run_is_all_zero() {
        let report = ResultAggregator::new().unwrap().summarize(&[]);
        assert_eq!(report.total, 0);
        assert_eq!(report.encounters.len(), 3);
        assert!(report.percentages.values().all(|pct| *pct == 0.0));
        assert_eq!(report.distinct_known, 0);
        assert!(!report.all_enemies_observed);
    }

    #[test]
    fn unknown_is_tallied_but_not_distinct() {
        let results = vec![
            battle(1, EnemyKind::Wolf, &[]),
            battle(2, EnemyKind::Unknown, &[]),
        ];
        let report = ResultAggregator::new().unwrap().summarize(&results);
        assert_eq!(report.unknown_count, 1);
        assert_eq!(report.distinct_known, 1);
        assert_eq!(report.percentage(EnemyKind::Unknown), 50.0);
        assert!((report.percentage_sum() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn excerpts_group_lines_and_cap_combat() {
        let lines = [
            "[BATTLE] 恶狼 攻击 玩家，造成 5 点伤害",
            "[BATTLE] 玩家 使用 火球术 造成 12 点伤害",
            "[BATTLE] 恶狼 攻击 玩家，造成 4 点伤害",
            "[BATTLE] 玩家 使用 冰锥 造成 9 点伤害",
            "[REWARD] 获得 20 金币",
            "[LEVEL] 升级！当前等级 2",
        ];
        let results = vec![battle(1, EnemyKind::Wolf, &lines)];
        let report = ResultAggregator::new().unwrap().summarize(&results);

        let wolf = &report.enemies[&EnemyKind::Wolf];
        assert_eq!(wolf.battles, 1);
        assert_eq!(wolf.excerpts[&LogCategory::Combat].len(), COMBAT_EXCERPT_LIMIT);
        assert_eq!(wolf.excerpts[&LogCategory::Reward], vec!["[REWARD] 获得 20 金币"]);
        assert_eq!(
            wolf.excerpts[&LogCategory::Progression],
            vec!["[LEVEL] 升级！当前等级 2"]
        );
        assert_eq!(wolf.event_tallies["enemy_encountered"], 1);
    }

    #[test]
    fn tallies_count_battles_per_label() {
        let rewarded = |attempt| {
            let mut result = battle(attempt, EnemyKind::Goblin, &[]);
            result.events.extend([
                GameEvent::RewardGranted {
                    resource: ResourceKind::Gold,
                },
                GameEvent::RewardGranted {
                    resource: ResourceKind::Experience,
                },
            ]);
            result
        };
        let results = vec![rewarded(1), rewarded(2), battle(3, EnemyKind::Goblin, &[])];

        let report = ResultAggregator::new().unwrap().summarize(&results);

        let goblin = &report.enemies[&EnemyKind::Goblin];
        assert_eq!(goblin.battles, 3);
        assert_eq!(goblin.event_tallies["reward_granted"], 2);
        assert_eq!(goblin.event_tallies["enemy_encountered"], 3);
    }

    #[test]
    fn summarize_leaves_input_untouched() {
        let results = vec![battle(1, EnemyKind::Ogre, &["食人魔 出现了"])];
        let before = results.clone();
        let aggregator = ResultAggregator::new().unwrap();
        let first = aggregator.summarize(&results);
        let second = aggregator.summarize(&results);
        assert_eq!(results, before);
        assert_eq!(first, second);
    }
}
