//! Append-only action log.
//!
//! Every accepted move produces a batch of actions. Each action is wrapped in
//! a [`HistoryEntry`] carrying a monotonic sequence number, the batch it
//! belongs to, and the server time it was recorded at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::{Card, GameSettings, PlayerId, RosterEntry};

pub mod replay;

pub use replay::{ReplayError, replay};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Action {
    /// Game dealt. Enough to re-deal the exact same game.
    Start {
        seed: u64,
        settings: GameSettings,
        roster: Vec<RosterEntry>,
    },
    Place {
        player: PlayerId,
        card: Card,
    },
    Cover {
        player: PlayerId,
        card: Card,
        target: usize,
    },
    Transfer {
        player: PlayerId,
        card: Card,
        to: PlayerId,
    },
    Pass {
        player: PlayerId,
    },
    Forfeit {
        player: PlayerId,
    },
    Pickup {
        player: PlayerId,
        count: usize,
    },
    Exit {
        player: PlayerId,
    },
    /// Game over. `durak` is `None` when nobody was left holding cards.
    Victory {
        durak: Option<PlayerId>,
    },
    NewRound {
        round: u32,
        attacker: PlayerId,
        defender: PlayerId,
        /// Player whose pass closed the previous round.
        closed_by: Option<PlayerId>,
    },
}

impl Action {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Place { .. } => "place",
            Self::Cover { .. } => "cover",
            Self::Transfer { .. } => "transfer",
            Self::Pass { .. } => "pass",
            Self::Forfeit { .. } => "forfeit",
            Self::Pickup { .. } => "pickup",
            Self::Exit { .. } => "exit",
            Self::Victory { .. } => "victory",
            Self::NewRound { .. } => "new_round",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Start { seed, roster, .. } => {
                write!(f, "game started with {} players (seed {seed})", roster.len())
            }
            Self::Place { player, card } => write!(f, "{player} attacks with {card}"),
            Self::Cover {
                player,
                card,
                target,
            } => write!(f, "{player} covers attack {target} with {card}"),
            Self::Transfer { player, card, to } => {
                write!(f, "{player} transfers to {to} with {card}")
            }
            Self::Pass { player } => write!(f, "{player} passes"),
            Self::Forfeit { player } => write!(f, "{player} gives up the defence"),
            Self::Pickup { player, count } => write!(f, "{player} picks up {count} cards"),
            Self::Exit { player } => write!(f, "{player} is out"),
            Self::Victory { durak: Some(durak) } => write!(f, "{durak} is the durak"),
            Self::Victory { durak: None } => write!(f, "the game is a draw"),
            Self::NewRound {
                round,
                attacker,
                defender,
                ..
            } => write!(f, "round {round}: {attacker} attacks {defender}"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub seq: u64,
    pub batch: u64,
    #[serde(flatten)]
    pub action: Action,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence number of the most recent entry.
    #[must_use]
    pub fn last_seq(&self) -> Option<u64> {
        self.entries.last().map(|entry| entry.seq)
    }

    /// Wrap `actions` as the next batch without recording them.
    #[must_use]
    pub fn stamp(&self, actions: Vec<Action>, now: DateTime<Utc>) -> Vec<HistoryEntry> {
        let next_seq = self.last_seq().map_or(0, |seq| seq + 1);
        let batch = self.entries.last().map_or(0, |entry| entry.batch + 1);
        actions
            .into_iter()
            .zip(next_seq..)
            .map(|(action, seq)| HistoryEntry {
                seq,
                batch,
                action,
                occurred_at: now,
            })
            .collect()
    }

    /// Record entries produced by [`History::stamp`].
    pub fn extend(&mut self, entries: impl IntoIterator<Item = HistoryEntry>) {
        self.entries.extend(entries);
    }

    /// Stamp and record `actions` as one batch, returning the new entries.
    pub fn append(&mut self, actions: Vec<Action>, now: DateTime<Utc>) -> Vec<HistoryEntry> {
        let entries = self.stamp(actions, now);
        self.entries.extend(entries.iter().cloned());
        entries
    }

    /// Entries recorded after `seq`, or every entry when `seq` is `None`.
    #[must_use]
    pub fn since(&self, seq: Option<u64>) -> &[HistoryEntry] {
        match seq {
            None => &self.entries,
            Some(seq) => {
                let start = self.entries.partition_point(|entry| entry.seq <= seq);
                &self.entries[start..]
            }
        }
    }
}
