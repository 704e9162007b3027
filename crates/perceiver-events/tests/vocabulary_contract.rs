//! Contract between the harness and the game's log copy.

use perceiver_events::{EventClassifier, Vocabulary};
use runebattle_core_types::{EnemyKind, GameEvent};
use std::collections::BTreeSet;

#[test]
fn vocabulary_version_is_pinned() {
    // Changing a keyword means bumping this and updating the game fixtures.
    assert_eq!(Vocabulary::VERSION, "zh-CN/1");
    assert_eq!(
        EventClassifier::new().unwrap().vocabulary_version(),
        Vocabulary::VERSION
    );
}

#[test]
fn goblin_battle_after_one_cast() {
    let classifier = EventClassifier::new().unwrap();
    let entry_log = "战斗开始！\n一只 哥布林 出现了";
    assert_eq!(classifier.classify_enemy(entry_log), EnemyKind::Goblin);

    let after_cast = "[BATTLE] 玩家 开始吟唱 火球术\n[BATTLE] 火球术 命中，造成 14 点伤害";
    let events = classifier.classify(after_cast);
    let expected: BTreeSet<GameEvent> = [
        GameEvent::SpellCast {
            name: Some("火球术".to_string()),
            started: true,
        },
        GameEvent::DamageDealt,
    ]
    .into_iter()
    .collect();
    assert_eq!(events, expected);
}

#[test]
fn classification_is_idempotent() {
    let classifier = EventClassifier::new().unwrap();
    let samples = [
        "",
        "[REWARD] 获得 30 金币 和 5 经验",
        "使用 火球术 造成 12 点伤害\n恶狼 发起攻击",
        "[SHOP] 购买成功\n[DEV] ogre\n[SCENE] camp",
        "获得 素材 x2\n升级！解锁 冰霜符文\n休息中",
    ];
    for text in samples {
        let first = classifier.classify(text);
        let second = classifier.classify(text);
        assert_eq!(first, second, "{text}");
        assert_eq!(classifier.classify_enemy(text), classifier.classify_enemy(text));
    }
}

#[test]
fn events_serialize_with_type_tag() {
    let event = GameEvent::EnemyEncountered {
        kind: EnemyKind::Ogre,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "enemy_encountered");
    assert_eq!(json["kind"], "ogre");
}
