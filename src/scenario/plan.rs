//! Scenario plans.
//!
//! Every scenario is the same battle loop with different knobs; the presets
//! below cover the flows the harness ships.

use runebattle_core_types::EnemyKind;
use serde::{Deserialize, Serialize};

use crate::config::RunPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    SingleBattle,
    EnemySweep,
    RepeatedBattles,
    DevSweep,
    FullFlow,
    SpellButtons,
}

impl ScenarioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::SingleBattle => "single_battle",
            ScenarioKind::EnemySweep => "enemy_sweep",
            ScenarioKind::RepeatedBattles => "repeated_battles",
            ScenarioKind::DevSweep => "dev_sweep",
            ScenarioKind::FullFlow => "full_flow",
            ScenarioKind::SpellButtons => "spell_buttons",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastMode {
    /// Cast the first visible spell, up to the cast budget.
    FirstVisible,
    /// Try each spell index `0..n` once.
    EachIndex(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemySelection {
    /// Let the game pick.
    Random,
    /// Request each kind in turn through developer mode.
    Sequence(Vec<EnemyKind>),
}

impl EnemySelection {
    /// Enemy to request for the 1-based `attempt`.
    pub fn pick(&self, attempt: u32) -> Option<EnemyKind> {
        match self {
            EnemySelection::Random => None,
            EnemySelection::Sequence(kinds) => {
                let index = attempt.checked_sub(1)? as usize;
                kinds.get(index).copied()
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampWait {
    /// `timings.camp_timeout`
    Standard,
    /// `timings.quick_camp_timeout`
    Quick,
    /// Do not wait for the battle to end.
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioPlan {
    pub kind: ScenarioKind,
    /// Battles to run when not sweeping.
    pub battles: u32,
    /// Hard cap on battle attempts.
    pub max_attempts: u32,
    pub cast_budget: u32,
    pub cast_mode: CastMode,
    pub enemy_selection: EnemySelection,
    /// Stop once every known enemy kind has been seen.
    pub stop_when_all_seen: bool,
    /// Only cast against kinds not seen earlier in the run.
    pub cast_unseen_only: bool,
    pub camp_wait: CampWait,
    pub rest_after_battle: bool,
    /// Exercise rest and shop around the battles.
    pub camp_checks: bool,
}

impl ScenarioPlan {
    fn base(kind: ScenarioKind, policy: &RunPolicy) -> Self {
        Self {
            kind,
            battles: 1,
            max_attempts: policy.max_attempts,
            cast_budget: policy.cast_budget,
            cast_mode: CastMode::FirstVisible,
            enemy_selection: EnemySelection::Random,
            stop_when_all_seen: false,
            cast_unseen_only: false,
            camp_wait: CampWait::Standard,
            rest_after_battle: true,
            camp_checks: false,
        }
    }

    pub fn single_battle(policy: &RunPolicy) -> Self {
        Self::base(ScenarioKind::SingleBattle, policy)
    }

    /// Battle until all three enemy kinds were met or attempts run out.
    pub fn enemy_sweep(policy: &RunPolicy) -> Self {
        Self {
            battles: policy.max_attempts,
            cast_budget: 1,
            stop_when_all_seen: true,
            cast_unseen_only: true,
            ..Self::base(ScenarioKind::EnemySweep, policy)
        }
    }

    /// `battles` quick battles without casting, for the encounter distribution.
    pub fn repeated_battles(battles: u32, policy: &RunPolicy) -> Self {
        Self {
            battles,
            max_attempts: battles.max(policy.max_attempts),
            cast_budget: 0,
            camp_wait: CampWait::Quick,
            rest_after_battle: false,
            ..Self::base(ScenarioKind::RepeatedBattles, policy)
        }
    }

    /// One battle per requested kind, selected through developer mode.
    pub fn dev_sweep(enemies: &[EnemyKind], policy: &RunPolicy) -> Self {
        let enemies: Vec<EnemyKind> = if enemies.is_empty() {
            EnemyKind::KNOWN.to_vec()
        } else {
            enemies.to_vec()
        };
        Self {
            battles: enemies.len() as u32,
            enemy_selection: EnemySelection::Sequence(enemies),
            ..Self::base(ScenarioKind::DevSweep, policy)
        }
    }

    /// Camp, shop and a battle trying every spell button.
    pub fn full_flow(policy: &RunPolicy) -> Self {
        Self {
            cast_mode: CastMode::EachIndex(3),
            camp_checks: true,
            ..Self::base(ScenarioKind::FullFlow, policy)
        }
    }

    /// Enter a battle and try each spell button once.
    pub fn spell_buttons(policy: &RunPolicy) -> Self {
        Self {
            cast_mode: CastMode::EachIndex(3),
            camp_wait: CampWait::Skip,
            rest_after_battle: false,
            ..Self::base(ScenarioKind::SpellButtons, policy)
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Upper bound on battle attempts for this plan.
    pub fn attempt_limit(&self) -> u32 {
        if self.stop_when_all_seen {
            self.max_attempts
        } else {
            self.battles
        }
    }

    pub fn casts_enabled(&self) -> bool {
        match self.cast_mode {
            CastMode::FirstVisible => self.cast_budget > 0,
            CastMode::EachIndex(count) => count > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_is_bounded_by_max_attempts() {
        let plan = ScenarioPlan::enemy_sweep(&RunPolicy::default());
        assert_eq!(plan.attempt_limit(), 15);
        assert!(plan.stop_when_all_seen);
        assert!(plan.cast_unseen_only);
    }

    #[test]
    fn repeated_battles_do_not_cast() {
        let plan = ScenarioPlan::repeated_battles(10, &RunPolicy::default());
        assert_eq!(plan.attempt_limit(), 10);
        assert!(!plan.casts_enabled());
        assert_eq!(plan.camp_wait, CampWait::Quick);
    }

    #[test]
    fn dev_sweep_requests_each_kind_in_order() {
        let plan = ScenarioPlan::dev_sweep(&[], &RunPolicy::default());
        assert_eq!(plan.battles, 3);
        assert_eq!(plan.enemy_selection.pick(1), Some(EnemyKind::Wolf));
        assert_eq!(plan.enemy_selection.pick(3), Some(EnemyKind::Ogre));
        assert_eq!(plan.enemy_selection.pick(4), None);
        assert_eq!(plan.enemy_selection.pick(0), None);

        let only_ogre = ScenarioPlan::dev_sweep(&[EnemyKind::Ogre], &RunPolicy::default());
        assert_eq!(only_ogre.attempt_limit(), 1);
    }

    #[test]
    fn spell_button_plan_skips_camp() {
        let plan = ScenarioPlan::spell_buttons(&RunPolicy::default());
        assert_eq!(plan.cast_mode, CastMode::EachIndex(3));
        assert_eq!(plan.camp_wait, CampWait::Skip);
        assert_eq!(plan.name(), "spell_buttons");
    }
}
