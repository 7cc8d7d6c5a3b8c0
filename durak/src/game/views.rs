//! Per-recipient projections of a game.
//!
//! Hands of other players are always reduced to a count; only the viewer's
//! own hand is sent in full.

use serde::{Deserialize, Serialize};

use super::{
    entities::{Card, PlayerId, Role, Suit, TableTop},
    state_machine::Game,
};

/// A player's hand as seen by a particular viewer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HandView {
    Cards(Vec<Card>),
    CardCount(usize),
}

impl HandView {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Cards(cards) => cards.len(),
            Self::CardCount(count) => *count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    #[serde(flatten)]
    pub hand: HandView,
    pub role: Role,
    pub turned: bool,
    pub began_round: bool,
    pub out: Option<u32>,
}

/// Game state with hidden information removed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpaqueState {
    pub players: Vec<PlayerView>,
    pub table_top: TableTop,
    pub deck_size: usize,
    pub trump: Card,
    pub trump_suit: Suit,
    pub round: u32,
    pub victory: bool,
    pub durak: Option<PlayerId>,
}

fn project(game: &Game, viewer: Option<PlayerId>) -> OpaqueState {
    let players = game
        .players()
        .iter()
        .map(|player| PlayerView {
            id: player.id,
            name: player.name.clone(),
            hand: if viewer == Some(player.id) {
                HandView::Cards(player.hand.iter().copied().collect())
            } else {
                HandView::CardCount(player.hand.len())
            },
            role: player.role,
            turned: player.has_turned,
            began_round: player.began_round,
            out: player.is_out,
        })
        .collect();

    OpaqueState {
        players,
        table_top: game.table_top().clone(),
        deck_size: game.draw_pile().len(),
        trump: game.trump_card(),
        trump_suit: game.trump_suit(),
        round: game.round(),
        victory: game.is_over(),
        durak: game.durak(),
    }
}

/// View for a seated player: their own hand in full, everyone else's as a
/// count.
#[must_use]
pub fn project_for_player(game: &Game, viewer: PlayerId) -> OpaqueState {
    project(game, Some(viewer))
}

#[must_use]
pub fn project_for_spectator(game: &Game) -> OpaqueState {
    project(game, None)
}
