//! Shared primitives for the runebattle harness crates.
//!
//! Everything here is plain data: scenes the game can be in, the closed set of
//! enemy kinds, the typed events the classifier produces and the immutable
//! per-battle record the runner hands to the aggregator.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseKindError {
    #[error("unknown enemy id '{0}' (expected wolf, goblin or ogre)")]
    UnknownEnemy(String),
    #[error("unknown scene '{0}'")]
    UnknownScene(String),
}

/// Identifier for one harness invocation; stamped on reports and artifacts.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Top-level UI mode of the driven game.
///
/// Never cached: the game flips these asynchronously, so callers re-query the
/// marker elements every time they need to know.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SceneState {
    Camp,
    Battle,
    ShopOpen,
    Unknown,
}

impl SceneState {
    /// Scenes that have a marker element, in the order they are checked.
    pub const MARKED: [SceneState; 3] = [SceneState::Battle, SceneState::ShopOpen, SceneState::Camp];

    /// Element id of the scene marker.
    pub fn marker_id(&self) -> Option<&'static str> {
        match self {
            SceneState::Camp => Some("camp-scene"),
            SceneState::Battle => Some("battle-scene"),
            SceneState::ShopOpen => Some("shop-interface"),
            SceneState::Unknown => None,
        }
    }

    /// Selector matching the marker only while it carries the `active` class.
    pub fn active_selector(&self) -> Option<String> {
        self.marker_id().map(|id| format!("#{id}.active"))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SceneState::Camp => "camp",
            SceneState::Battle => "battle",
            SceneState::ShopOpen => "shop",
            SceneState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SceneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SceneState {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "camp" => Ok(SceneState::Camp),
            "battle" => Ok(SceneState::Battle),
            "shop" | "shop_open" => Ok(SceneState::ShopOpen),
            "unknown" => Ok(SceneState::Unknown),
            other => Err(ParseKindError::UnknownScene(other.to_string())),
        }
    }
}

/// Closed set of opponents. Identity is inferred from battle-log prose.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum EnemyKind {
    Wolf,
    Goblin,
    Ogre,
    Unknown,
}

impl EnemyKind {
    /// Known kinds in classification priority order.
    pub const KNOWN: [EnemyKind; 3] = [EnemyKind::Wolf, EnemyKind::Goblin, EnemyKind::Ogre];

    /// Value accepted by the developer-mode enemy selector.
    pub fn dev_id(&self) -> Option<&'static str> {
        match self {
            EnemyKind::Wolf => Some("wolf"),
            EnemyKind::Goblin => Some("goblin"),
            EnemyKind::Ogre => Some("ogre"),
            EnemyKind::Unknown => None,
        }
    }

    /// Name the game prints for this enemy.
    pub fn display_name(&self) -> &'static str {
        match self {
            EnemyKind::Wolf => "恶狼",
            EnemyKind::Goblin => "哥布林",
            EnemyKind::Ogre => "食人魔",
            EnemyKind::Unknown => "未知",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, EnemyKind::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnemyKind::Wolf => "wolf",
            EnemyKind::Goblin => "goblin",
            EnemyKind::Ogre => "ogre",
            EnemyKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EnemyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnemyKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        EnemyKind::KNOWN
            .into_iter()
            .find(|kind| {
                kind.dev_id()
                    .is_some_and(|id| id.eq_ignore_ascii_case(trimmed))
                    || kind.display_name() == trimmed
            })
            .ok_or_else(|| ParseKindError::UnknownEnemy(trimmed.to_string()))
    }
}

/// Resource named in a reward line.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ResourceKind {
    Gold,
    Experience,
    Material,
    Unspecified,
}

/// Typed domain event recovered from raw page text.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(tag = "type", rename_all = "snake_case"))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum GameEvent {
    EnemyEncountered { kind: EnemyKind },
    /// `started` is true when a cast began and false when it resolved.
    SpellCast { name: Option<String>, started: bool },
    DamageDealt,
    Healed,
    RewardGranted { resource: ResourceKind },
    LevelUp,
    Unlocked,
    Purchase,
    Rested,
}

impl GameEvent {
    pub fn is_cast_started(&self) -> bool {
        matches!(self, GameEvent::SpellCast { started: true, .. })
    }

    pub fn is_reward(&self) -> bool {
        matches!(self, GameEvent::RewardGranted { .. })
    }

    pub fn is_progression(&self) -> bool {
        matches!(self, GameEvent::LevelUp | GameEvent::Unlocked)
    }

    /// Short label used in tallies and human output.
    pub fn label(&self) -> &'static str {
        match self {
            GameEvent::EnemyEncountered { .. } => "enemy_encountered",
            GameEvent::SpellCast { started: true, .. } => "cast_started",
            GameEvent::SpellCast { started: false, .. } => "cast_resolved",
            GameEvent::DamageDealt => "damage_dealt",
            GameEvent::Healed => "healed",
            GameEvent::RewardGranted { .. } => "reward_granted",
            GameEvent::LevelUp => "level_up",
            GameEvent::Unlocked => "unlocked",
            GameEvent::Purchase => "purchase",
            GameEvent::Rested => "rested",
        }
    }
}

/// Keyword groups used to excerpt raw log lines.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum LogCategory {
    Combat,
    Reward,
    Progression,
    Purchase,
    Rest,
}

impl LogCategory {
    pub const ALL: [LogCategory; 5] = [
        LogCategory::Combat,
        LogCategory::Reward,
        LogCategory::Progression,
        LogCategory::Purchase,
        LogCategory::Rest,
    ];
}

/// Who wrote a battle-log entry. The panel marks each entry with one of these
/// as a CSS class next to `log-entry`.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LogAuthor {
    Player,
    Enemy,
    System,
}

impl LogAuthor {
    pub const ALL: [LogAuthor; 3] = [LogAuthor::Player, LogAuthor::Enemy, LogAuthor::System];

    pub fn css_class(&self) -> &'static str {
        match self {
            LogAuthor::Player => "player",
            LogAuthor::Enemy => "enemy",
            LogAuthor::System => "system",
        }
    }

    /// Author named by a `class` attribute such as `log-entry enemy`.
    pub fn from_class_list(classes: &str) -> Option<Self> {
        classes.split_whitespace().find_map(|class| {
            LogAuthor::ALL
                .into_iter()
                .find(|author| author.css_class() == class)
        })
    }
}

/// One battle-log line. `author` is `None` when the panel gave no attribution.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct LogEntry {
    pub author: Option<LogAuthor>,
    pub text: String,
}

impl LogEntry {
    pub fn new(author: Option<LogAuthor>, text: impl Into<String>) -> Self {
        Self {
            author,
            text: text.into(),
        }
    }
}

/// How a single battle attempt ended.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BattleOutcome {
    /// Camp scene came back on its own.
    Completed,
    /// Camp wait timed out; the page was reloaded.
    ForceEnded,
    /// Battle scene never became active; the page was reloaded.
    EntryTimedOut,
    /// The start control was unavailable.
    Skipped,
}

impl BattleOutcome {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BattleOutcome::ForceEnded | BattleOutcome::EntryTimedOut)
    }
}

/// Immutable record of one battle attempt.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioResult {
    /// 1-based attempt index within the scenario.
    pub attempt: u32,
    /// Enemy classified at battle entry.
    pub enemy: EnemyKind,
    /// Enemy requested through developer mode, if any.
    pub requested_enemy: Option<EnemyKind>,
    pub events: Vec<GameEvent>,
    pub log_lines: Vec<String>,
    pub casts: u32,
    pub outcome: BattleOutcome,
}

impl ScenarioResult {
    pub fn has_event(&self, predicate: impl Fn(&GameEvent) -> bool) -> bool {
        self.events.iter().any(predicate)
    }

    pub fn count_events(&self, predicate: impl Fn(&GameEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }
}
