//! Keyword classification of battle-log and console text.

use regex::Regex;
use runebattle_core_types::{EnemyKind, GameEvent, LogAuthor, LogCategory, LogEntry, ResourceKind};
use std::collections::BTreeSet;
use tracing::trace;

use crate::errors::Result;
use crate::tagged::{author_rules, split_tag, LogTag, Rule};
use crate::vocabulary::Vocabulary;

/// Pure text-to-event classifier. Classifying the same text twice yields the
/// same set.
#[derive(Clone, Debug)]
pub struct EventClassifier {
    cast_started: Regex,
    cast_resolved: Regex,
}

impl EventClassifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            cast_started: Regex::new(&format!(
                r"{}[\s:：「『\[]*(?P<name>[^\s,，。.!！」』\]]+)?",
                Vocabulary::CAST_STARTED
            ))?,
            cast_resolved: Regex::new(&format!(
                r"{}\s*(?P<name>[^\s,，。]+?)\s*(?:{}|{})",
                Vocabulary::CAST_RESOLVED,
                Vocabulary::DAMAGE,
                Vocabulary::HEAL
            ))?,
        })
    }

    pub fn vocabulary_version(&self) -> &'static str {
        Vocabulary::VERSION
    }

    /// Classify every line of `text`.
    pub fn classify(&self, text: &str) -> BTreeSet<GameEvent> {
        let mut events = BTreeSet::new();
        for line in text.lines() {
            self.classify_line_into(line, &mut events);
        }
        events
    }

    /// Classify a batch of drained console lines.
    pub fn classify_lines<S: AsRef<str>>(&self, lines: &[S]) -> BTreeSet<GameEvent> {
        let mut events = BTreeSet::new();
        for line in lines {
            for part in line.as_ref().lines() {
                self.classify_line_into(part, &mut events);
            }
        }
        events
    }

    /// Classify battle-log entries, each under the rules its author allows.
    pub fn classify_entries(&self, entries: &[LogEntry]) -> BTreeSet<GameEvent> {
        let mut events = BTreeSet::new();
        for entry in entries {
            self.classify_entry_into(entry, &mut events);
        }
        events
    }

    pub fn classify_entry(&self, entry: &LogEntry) -> BTreeSet<GameEvent> {
        let mut events = BTreeSet::new();
        self.classify_entry_into(entry, &mut events);
        events
    }

    /// Attribute a plain-prose panel line. Lines opening with an enemy's
    /// name are the enemy's turn; anything else stays unattributed.
    pub fn entry_from_prose(&self, line: &str) -> LogEntry {
        let body = split_tag(line).body.trim_start();
        let author = Vocabulary::enemies()
            .any(|(_, name)| body.starts_with(name))
            .then_some(LogAuthor::Enemy);
        LogEntry::new(author, line)
    }

    /// First known enemy named in `text`, in priority order.
    ///
    /// Lines on channels that never name an opponent are skipped so a dev
    /// selection echo cannot masquerade as the encountered enemy.
    pub fn classify_enemy(&self, text: &str) -> EnemyKind {
        let entries: Vec<LogEntry> = text.lines().map(|line| LogEntry::new(None, line)).collect();
        self.classify_enemy_in(&entries)
    }

    /// [`Self::classify_enemy`] over attributed entries.
    pub fn classify_enemy_in(&self, entries: &[LogEntry]) -> EnemyKind {
        let relevant: Vec<&str> = entries
            .iter()
            .filter(|entry| author_rules(entry.author).contains(&Rule::Enemy))
            .map(|entry| split_tag(&entry.text))
            .filter(|line| line.rules().contains(&Rule::Enemy))
            .map(|line| line.body)
            .collect();
        Vocabulary::enemies()
            .find(|(_, name)| relevant.iter().any(|body| body.contains(name)))
            .map(|(kind, _)| kind)
            .unwrap_or(EnemyKind::Unknown)
    }

    /// Excerpt groups a raw log line belongs to.
    pub fn categorize(&self, line: &str) -> Vec<LogCategory> {
        LogCategory::ALL
            .into_iter()
            .filter(|category| {
                Vocabulary::category_keywords(*category)
                    .iter()
                    .any(|keyword| line.contains(keyword))
            })
            .collect()
    }

    fn classify_line_into(&self, line: &str, events: &mut BTreeSet<GameEvent>) {
        self.apply_rules(line, &Rule::ALL, events);
    }

    fn classify_entry_into(&self, entry: &LogEntry, events: &mut BTreeSet<GameEvent>) {
        let allowed = author_rules(entry.author);
        for part in entry.text.lines() {
            self.apply_rules(part, allowed, events);
        }
    }

    /// Run the rules the line's channel allows, restricted to `allowed`.
    fn apply_rules(&self, line: &str, allowed: &[Rule], events: &mut BTreeSet<GameEvent>) {
        let tagged = split_tag(line);
        let body = tagged.body;
        for rule in tagged.rules().iter().filter(|rule| allowed.contains(rule)) {
            match rule {
                Rule::Enemy => {
                    if let Some((kind, _)) = Vocabulary::enemies().find(|(_, name)| body.contains(name)) {
                        events.insert(GameEvent::EnemyEncountered { kind });
                    }
                }
                Rule::Cast => {
                    for caps in self.cast_started.captures_iter(body) {
                        events.insert(GameEvent::SpellCast {
                            name: caps.name("name").map(|m| m.as_str().to_string()),
                            started: true,
                        });
                    }
                    for caps in self.cast_resolved.captures_iter(body) {
                        events.insert(GameEvent::SpellCast {
                            name: caps.name("name").map(|m| m.as_str().to_string()),
                            started: false,
                        });
                    }
                }
                Rule::Damage => {
                    if body.contains(Vocabulary::DAMAGE) {
                        events.insert(GameEvent::DamageDealt);
                    }
                }
                Rule::Heal => {
                    if body.contains(Vocabulary::HEAL) {
                        events.insert(GameEvent::Healed);
                    }
                }
                Rule::Reward => {
                    // the channel itself vouches for a reward; untagged prose needs 获得
                    let granted = tagged.tag == Some(LogTag::Reward) || body.contains(Vocabulary::GAIN);
                    if granted {
                        let mut named = false;
                        for (resource, keyword) in Vocabulary::RESOURCES {
                            if body.contains(keyword) {
                                named = true;
                                events.insert(GameEvent::RewardGranted { resource });
                            }
                        }
                        if !named && body.contains(Vocabulary::GAIN) {
                            events.insert(GameEvent::RewardGranted {
                                resource: ResourceKind::Unspecified,
                            });
                        }
                    }
                }
                Rule::Level => {
                    let bookkeeping = Vocabulary::LEVEL_CHECK
                        .iter()
                        .any(|marker| body.contains(marker));
                    if body.contains(Vocabulary::LEVEL_UP) && !bookkeeping {
                        events.insert(GameEvent::LevelUp);
                    }
                }
                Rule::Unlock => {
                    if body.contains(Vocabulary::UNLOCKED) {
                        events.insert(GameEvent::Unlocked);
                    }
                }
                Rule::Purchase => {
                    if Vocabulary::PURCHASE.iter().any(|keyword| body.contains(keyword))
                        && !body.contains(Vocabulary::REFUSED)
                    {
                        events.insert(GameEvent::Purchase);
                    }
                }
                Rule::Rest => {
                    if body.contains(Vocabulary::REST) {
                        events.insert(GameEvent::Rested);
                    }
                }
            }
        }
        trace!(tag = ?tagged.tag, total = events.len(), "classified line");
    }
}
