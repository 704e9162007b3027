//! Keyword vocabulary of the game's log copy.
//!
//! The game prints Simplified Chinese prose. Every keyword the classifier keys
//! on lives here so a copy change in the game shows up as one diff and a
//! version bump.

use runebattle_core_types::{EnemyKind, LogCategory, ResourceKind};

pub struct Vocabulary;

impl Vocabulary {
    /// Bumped whenever a keyword below changes meaning.
    pub const VERSION: &'static str = "zh-CN/1";

    pub const CAST_STARTED: &'static str = "开始吟唱";
    pub const CAST_RESOLVED: &'static str = "使用";
    pub const DAMAGE: &'static str = "造成";
    pub const HEAL: &'static str = "恢复";
    pub const GAIN: &'static str = "获得";
    pub const LEVEL_UP: &'static str = "升级";
    /// Level-up bookkeeping lines that mention 升级 without one happening.
    pub const LEVEL_CHECK: [&'static str; 3] = ["升级检查", "检查升级", "未升级"];
    pub const UNLOCKED: &'static str = "解锁";
    pub const PURCHASE: [&'static str; 2] = ["购买", "花费"];
    pub const REST: &'static str = "休息";
    /// Marks a refused shop action (e.g. 金币不足，无法购买).
    pub const REFUSED: &'static str = "无法";

    pub const RESOURCES: [(ResourceKind, &'static str); 3] = [
        (ResourceKind::Gold, "金币"),
        (ResourceKind::Experience, "经验"),
        (ResourceKind::Material, "素材"),
    ];

    /// Enemy names in classification priority order.
    pub fn enemies() -> impl Iterator<Item = (EnemyKind, &'static str)> {
        EnemyKind::KNOWN
            .into_iter()
            .map(|kind| (kind, kind.display_name()))
    }

    /// Keywords that put a raw log line into an excerpt group.
    pub fn category_keywords(category: LogCategory) -> &'static [&'static str] {
        match category {
            LogCategory::Combat => &["战斗", "攻击", "伤害", "造成"],
            LogCategory::Reward => &["获得", "金币", "经验", "素材"],
            LogCategory::Progression => &["升级", "解锁"],
            LogCategory::Purchase => &["购买", "花费"],
            LogCategory::Rest => &["休息", "HP", "MP"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enemy_priority_matches_known_order() {
        let names: Vec<_> = Vocabulary::enemies().map(|(_, name)| name).collect();
        assert_eq!(names, vec!["恶狼", "哥布林", "食人魔"]);
    }

    #[test]
    fn every_category_has_keywords() {
        for category in LogCategory::ALL {
            assert!(!Vocabulary::category_keywords(category).is_empty());
        }
    }
}
