//! Checkpoint reads of the console and the battle-log panel.
//!
//! The panel keeps a bounded window of entries and drops the oldest once it
//! is full, so its length says nothing about what is new. Fresh entries are
//! whatever follows the longest overlap with the previous snapshot.

use runebattle_core_types::{GameEvent, LogEntry};
use std::collections::BTreeSet;

/// Last panel snapshot seen by the runner.
#[derive(Debug, Default)]
pub struct PanelCursor {
    snapshot: Vec<LogEntry>,
}

impl PanelCursor {
    /// Store `current` and return the entries not in the previous snapshot.
    pub fn advance(&mut self, current: Vec<LogEntry>) -> Vec<LogEntry> {
        let fresh = unseen(&self.snapshot, &current).to_vec();
        self.snapshot = current;
        fresh
    }

    pub fn reset(&mut self) {
        self.snapshot.clear();
    }
}

/// Tail of `current` after the longest suffix of `previous` it starts with.
fn unseen<'a, T: PartialEq>(previous: &[T], current: &'a [T]) -> &'a [T] {
    let longest = previous.len().min(current.len());
    let overlap = (0..=longest)
        .rev()
        .find(|&len| previous[previous.len() - len..] == current[..len])
        .unwrap_or(0);
    &current[overlap..]
}

/// Output read at one checkpoint.
#[derive(Debug, Default)]
pub struct Checkpoint {
    /// Console lines then fresh panel entries, as raw text.
    pub lines: Vec<String>,
    /// The same lines with their author; console lines carry none.
    pub entries: Vec<LogEntry>,
    pub events: BTreeSet<GameEvent>,
}

impl Checkpoint {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.events.is_empty()
    }

    pub fn merge(&mut self, other: Checkpoint) {
        self.lines.extend(other.lines);
        self.entries.extend(other.entries);
        self.events.extend(other.events);
    }
}
