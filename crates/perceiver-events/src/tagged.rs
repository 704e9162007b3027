//! Tagged console channel.
//!
//! The game prefixes its console output with a bracketed channel tag, e.g.
//! `[REWARD] 获得 30 金币`. When a line carries a known tag only the rules that
//! make sense for that channel run against its body. Untagged lines (and the
//! battle-log panel, which is plain prose) go through every rule.

use runebattle_core_types::LogAuthor;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogTag {
    Battle,
    Enemy,
    Reward,
    Level,
    Rune,
    Shop,
    Rest,
    Event,
    Spell,
    Scene,
    Dev,
}

/// Keyword rule families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    Enemy,
    Cast,
    Damage,
    Heal,
    Reward,
    Level,
    Unlock,
    Purchase,
    Rest,
}

impl Rule {
    pub const ALL: [Rule; 9] = [
        Rule::Enemy,
        Rule::Cast,
        Rule::Damage,
        Rule::Heal,
        Rule::Reward,
        Rule::Level,
        Rule::Unlock,
        Rule::Purchase,
        Rule::Rest,
    ];
}

impl LogTag {
    pub fn from_label(label: &str) -> Option<Self> {
        let tag = match label {
            "BATTLE" => LogTag::Battle,
            "ENEMY" => LogTag::Enemy,
            "REWARD" => LogTag::Reward,
            "LEVEL" => LogTag::Level,
            "RUNE" => LogTag::Rune,
            "SHOP" => LogTag::Shop,
            "REST" => LogTag::Rest,
            "EVENT" => LogTag::Event,
            "SPELL" => LogTag::Spell,
            "SCENE" => LogTag::Scene,
            "DEV" => LogTag::Dev,
            _ => return None,
        };
        Some(tag)
    }

    /// Rules allowed to fire on a body carrying this tag.
    pub fn rules(&self) -> &'static [Rule] {
        match self {
            LogTag::Battle => &[Rule::Enemy, Rule::Cast, Rule::Damage, Rule::Heal],
            LogTag::Enemy => &[Rule::Enemy],
            LogTag::Reward => &[Rule::Reward],
            LogTag::Level | LogTag::Rune => &[Rule::Level, Rule::Unlock],
            LogTag::Shop => &[Rule::Purchase],
            LogTag::Rest => &[Rule::Rest, Rule::Heal],
            LogTag::Event => &Rule::ALL,
            // spell tables, scene switches and dev tooling chatter
            LogTag::Spell | LogTag::Scene | LogTag::Dev => &[],
        }
    }
}

/// Rules allowed on a battle-log entry written by `author`.
///
/// The panel reports enemy casts and hits in the same words as the player's,
/// so only player entries may yield casts and damage. Unattributed text keeps
/// every rule.
pub fn author_rules(author: Option<LogAuthor>) -> &'static [Rule] {
    match author {
        Some(LogAuthor::Player) => &[Rule::Cast, Rule::Damage, Rule::Heal],
        Some(LogAuthor::Enemy) => &[Rule::Enemy],
        Some(LogAuthor::System) => &[
            Rule::Enemy,
            Rule::Heal,
            Rule::Reward,
            Rule::Level,
            Rule::Unlock,
            Rule::Purchase,
            Rule::Rest,
        ],
        None => &Rule::ALL,
    }
}

/// A console line split into its channel tag and body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaggedLine<'a> {
    pub tag: Option<LogTag>,
    pub body: &'a str,
}

impl<'a> TaggedLine<'a> {
    pub fn rules(&self) -> &'static [Rule] {
        match self.tag {
            Some(tag) => tag.rules(),
            None => &Rule::ALL,
        }
    }
}

/// Split `[TAG] body`. Unrecognised tags leave the line untouched.
pub fn split_tag(line: &str) -> TaggedLine<'_> {
    let trimmed = line.trim_start();
    let untagged = TaggedLine {
        tag: None,
        body: line,
    };
    let Some(rest) = trimmed.strip_prefix('[') else {
        return untagged;
    };
    let Some(end) = rest.find(']') else {
        return untagged;
    };
    match LogTag::from_label(&rest[..end]) {
        Some(tag) => TaggedLine {
            tag: Some(tag),
            body: rest[end + 1..].trim_start(),
        },
        None => untagged,
    }
}
