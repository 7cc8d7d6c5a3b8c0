//! Rebuild a game from its action log.

use thiserror::Error;

use super::{Action, HistoryEntry};
use crate::game::{Game, InvariantViolation, Move, MoveError, PlayerId, SettingsError};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("history does not begin with a start action")]
    MissingStart,

    #[error("start action cannot be dealt: {0}")]
    Settings(#[from] SettingsError),

    #[error("batch {batch} has no player move to re-apply")]
    NoMove { batch: u64 },

    #[error("move in batch {batch} was rejected on replay: {source}")]
    Rejected {
        batch: u64,
        #[source]
        source: MoveError,
    },

    #[error("batch {batch} regenerated different actions than were logged")]
    Diverged { batch: u64 },

    #[error("replayed state is broken after batch {batch}: {source}")]
    Invariant {
        batch: u64,
        #[source]
        source: InvariantViolation,
    },
}

/// The player move that produced a batch.
///
/// Usually this is the batch's first action. A pass that closed a round is
/// only recorded on the `new_round` it opened.
fn batch_move(batch: &[HistoryEntry]) -> Option<(PlayerId, Move)> {
    let head = match &batch.first()?.action {
        Action::Place { player, card } => Some((*player, Move::Place { card: *card })),
        Action::Cover {
            player,
            card,
            target,
        } => Some((
            *player,
            Move::Cover {
                card: *card,
                target_index: *target,
            },
        )),
        Action::Transfer { player, card, .. } => {
            Some((*player, Move::Transfer { card: *card }))
        }
        Action::Pass { player } => Some((*player, Move::Pass)),
        Action::Forfeit { player } => Some((*player, Move::Forfeit)),
        _ => None,
    };
    head.or_else(|| {
        batch.iter().find_map(|entry| match entry.action {
            Action::NewRound {
                closed_by: Some(player),
                ..
            } => Some((player, Move::Pass)),
            _ => None,
        })
    })
}

/// Re-deal the game from its `start` entry and re-apply every logged move,
/// checking each one regenerates exactly the actions that were recorded.
pub fn replay(entries: &[HistoryEntry]) -> Result<Game, ReplayError> {
    let Some((start, rest)) = entries.split_first() else {
        return Err(ReplayError::MissingStart);
    };
    let Action::Start {
        seed,
        settings,
        roster,
    } = &start.action
    else {
        return Err(ReplayError::MissingStart);
    };

    let mut game = Game::deal_seeded(settings.clone(), roster, *seed)?;

    for batch in rest.chunk_by(|a, b| a.batch == b.batch) {
        let number = batch[0].batch;
        let (player, mv) = batch_move(batch).ok_or(ReplayError::NoMove { batch: number })?;
        let produced = game
            .apply(player, &mv)
            .map_err(|source| ReplayError::Rejected {
                batch: number,
                source,
            })?;
        if !produced.iter().eq(batch.iter().map(|entry| &entry.action)) {
            return Err(ReplayError::Diverged { batch: number });
        }
        game.check_invariants()
            .map_err(|source| ReplayError::Invariant {
                batch: number,
                source,
            })?;
    }

    Ok(game)
}
