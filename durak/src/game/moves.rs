//! Move validation and application.
//!
//! Every handler checks all of its preconditions before touching state, so a
//! rejected move always leaves the game exactly as it was.

use serde::{Deserialize, Serialize};

use super::{
    entities::{Card, PlayerId, Role},
    errors::MoveError,
    state_machine::Game,
};
use crate::history::Action;

/// A player-submitted move.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Move {
    Place { card: Card },
    Cover { card: Card, target_index: usize },
    Transfer { card: Card },
    Pass,
    Forfeit,
}

impl Move {
    /// Short name used for logging and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Place { .. } => "place",
            Self::Cover { .. } => "cover",
            Self::Transfer { .. } => "transfer",
            Self::Pass => "pass",
            Self::Forfeit => "forfeit",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Outcome {
    Defended,
    Forfeited,
}

/// The two players every move is judged against.
#[derive(Clone, Copy)]
struct Turn {
    attacker: PlayerId,
    defender: PlayerId,
}

impl Game {
    /// Validate `mv` for `player` and apply it, returning the actions it
    /// produced in order.
    pub fn apply(&mut self, player: PlayerId, mv: &Move) -> Result<Vec<Action>, MoveError> {
        if self.victory {
            return Err(MoveError::GameOver);
        }
        if !self.is_active(player) {
            return Err(MoveError::UnknownPlayer { player });
        }
        let (Some(attacker), Some(defender)) = (self.attacker(), self.defender()) else {
            return Err(MoveError::NotYourTurn);
        };
        let turn = Turn { attacker, defender };

        match *mv {
            Move::Place { card } => self.place(turn, player, card),
            Move::Cover { card, target_index } => self.cover(turn, player, card, target_index),
            Move::Transfer { card } => self.transfer(turn, player, card),
            Move::Pass => self.pass(turn, player),
            Move::Forfeit => self.forfeit(turn, player),
        }
    }

    fn role_of(&self, player: PlayerId) -> Role {
        self.player(player).map_or(Role::Bystander, |p| p.role)
    }

    fn holds(&self, player: PlayerId, card: &Card) -> bool {
        self.player(player).is_some_and(|p| p.hand.contains(card))
    }

    /// The attacker, or any non-defender when free-for-all is on.
    fn may_attack(&self, player: PlayerId) -> bool {
        match self.role_of(player) {
            Role::Attacker => true,
            Role::Bystander => self.settings.free_for_all,
            Role::Defender => false,
        }
    }

    fn clear_turned(&mut self) {
        for player in &mut self.players {
            player.has_turned = false;
        }
    }

    fn take_card(&mut self, player: PlayerId, card: &Card) {
        if let Some(p) = self.player_mut(player) {
            p.hand.remove(card);
        }
    }

    fn place(&mut self, turn: Turn, player: PlayerId, card: Card) -> Result<Vec<Action>, MoveError> {
        let opening = self.table_top.is_empty();
        if !(self.role_of(player) == Role::Attacker || (!opening && self.may_attack(player))) {
            return Err(MoveError::NotYourTurn);
        }
        if self.table_top.is_full() {
            return Err(MoveError::TableFull);
        }
        if !self.holds(player, &card) {
            return Err(MoveError::CardNotOwned { card });
        }
        if !opening && !self.table_top.has_rank(card.rank) {
            return Err(MoveError::RankMismatch { card });
        }
        if self.hand_len(turn.defender) < self.table_top.uncovered() + 1 {
            return Err(MoveError::InsufficientDefenderCards);
        }

        self.take_card(player, &card);
        self.table_top.attack(card);
        self.clear_turned();
        Ok(vec![Action::Place { player, card }])
    }

    fn cover(
        &mut self,
        turn: Turn,
        player: PlayerId,
        card: Card,
        target: usize,
    ) -> Result<Vec<Action>, MoveError> {
        if player != turn.defender {
            return Err(MoveError::NotYourTurn);
        }
        let pair = *self
            .table_top
            .get(target)
            .ok_or_else(|| MoveError::invalid_card(format!("no attack at position {target}")))?;
        if pair.is_covered() {
            return Err(MoveError::invalid_card(format!(
                "{} is already covered",
                pair.attack
            )));
        }
        if !self.holds(player, &card) {
            return Err(MoveError::CardNotOwned { card });
        }
        if !card.beats(&pair.attack, self.trump_suit) {
            return Err(MoveError::invalid_card(format!(
                "{card} does not beat {}",
                pair.attack
            )));
        }

        self.take_card(player, &card);
        self.table_top.cover(target, card);
        self.defender_covered = true;

        let mut actions = vec![Action::Cover {
            player,
            card,
            target,
        }];
        if self.round_can_close(turn) {
            actions.extend(self.resolve(turn, Outcome::Defended, None));
        }
        Ok(actions)
    }

    fn transfer(&mut self, turn: Turn, player: PlayerId, card: Card) -> Result<Vec<Action>, MoveError> {
        if player != turn.defender {
            return Err(MoveError::NotYourTurn);
        }
        if !self.holds(player, &card) {
            return Err(MoveError::CardNotOwned { card });
        }
        let Some(first) = self.table_top.get(0) else {
            return Err(MoveError::invalid_transfer("there is nothing to transfer"));
        };
        let rank = first.attack.rank;
        if self.defender_covered || self.table_top.uncovered() != self.table_top.len() {
            return Err(MoveError::invalid_transfer("an attack has already been covered"));
        }
        if self.table_top.pairs().any(|pair| pair.attack.rank != rank) {
            return Err(MoveError::invalid_transfer("the table holds more than one rank"));
        }
        if card.rank != rank {
            return Err(MoveError::invalid_transfer(format!(
                "{card} does not match the rank on the table"
            )));
        }
        if self.table_top.is_full() {
            return Err(MoveError::invalid_transfer("the table is full"));
        }
        let Some(next) = self.next_in_rotation(player) else {
            return Err(MoveError::invalid_transfer("there is no one to transfer to"));
        };
        if next == turn.attacker {
            return Err(MoveError::invalid_transfer("the next player is the attacker"));
        }
        if self.hand_len(next) < self.table_top.len() + 1 {
            return Err(MoveError::invalid_transfer(
                "the next player cannot answer every attack",
            ));
        }

        self.take_card(player, &card);
        self.table_top.attack(card);
        if let Some(p) = self.player_mut(player) {
            p.role = Role::Bystander;
        }
        if let Some(p) = self.player_mut(next) {
            p.role = Role::Defender;
        }
        self.clear_turned();
        Ok(vec![Action::Transfer {
            player,
            card,
            to: next,
        }])
    }

    fn pass(&mut self, turn: Turn, player: PlayerId) -> Result<Vec<Action>, MoveError> {
        if !self.may_attack(player) || self.table_top.is_empty() {
            return Err(MoveError::NotYourTurn);
        }
        if let Some(p) = self.player_mut(player) {
            p.has_turned = true;
        }
        if !self.round_can_close(turn) {
            return Ok(vec![Action::Pass { player }]);
        }

        // A closing pass is recorded on the new round it opens, or on its
        // own when the game ends instead.
        let closing = self.resolve(turn, Outcome::Defended, Some(player));
        if matches!(closing.last(), Some(Action::NewRound { .. })) {
            Ok(closing)
        } else {
            let mut actions = vec![Action::Pass { player }];
            actions.extend(closing);
            Ok(actions)
        }
    }

    fn forfeit(&mut self, turn: Turn, player: PlayerId) -> Result<Vec<Action>, MoveError> {
        if player != turn.defender {
            return Err(MoveError::NotYourTurn);
        }
        if self.table_top.is_empty() {
            return Err(MoveError::invalid_card("there is nothing to pick up"));
        }

        let cards = self.table_top.clear();
        let count = cards.len();
        if let Some(p) = self.player_mut(player) {
            p.hand.extend(cards);
        }

        let mut actions = vec![
            Action::Forfeit { player },
            Action::Pickup { player, count },
        ];
        actions.extend(self.resolve(turn, Outcome::Forfeited, None));
        Ok(actions)
    }

    /// The round ends once every attack is covered and nobody can or will
    /// add another.
    fn round_can_close(&self, turn: Turn) -> bool {
        if self.table_top.is_empty() || !self.table_top.all_covered() {
            return false;
        }
        if self.table_top.is_full() || self.hand_len(turn.defender) == 0 {
            return true;
        }
        self.rotation
            .iter()
            .filter(|id| self.may_attack(**id))
            .filter_map(|id| self.player(*id))
            .all(|p| p.has_turned || p.hand.is_empty())
    }

    fn resolve(&mut self, turn: Turn, outcome: Outcome, closed_by: Option<PlayerId>) -> Vec<Action> {
        if outcome == Outcome::Defended {
            let cleared = self.table_top.clear();
            self.discard_pile.extend(cleared);
        }
        self.replenish(turn.attacker);

        let previous = self.rotation.clone();
        let mut actions = self.remove_finished_players();
        match self.rotation.as_slice() {
            [] => {
                self.victory = true;
                self.durak = None;
                actions.push(Action::Victory { durak: None });
                return actions;
            }
            [loser] => {
                self.victory = true;
                self.durak = Some(*loser);
                actions.push(Action::Victory {
                    durak: Some(*loser),
                });
                return actions;
            }
            _ => {}
        }

        // After a successful defence the defender leads; after a forfeit the
        // defender is skipped.
        let start = previous
            .iter()
            .position(|id| *id == turn.defender)
            .unwrap_or(0);
        let attacker = (0..previous.len())
            .map(|offset| previous[(start + offset) % previous.len()])
            .filter(|id| self.is_active(*id))
            .find(|id| outcome == Outcome::Defended || *id != turn.defender)
            .unwrap_or(self.rotation[0]);

        let defender = self.begin_round(attacker);
        self.round += 1;
        actions.push(Action::NewRound {
            round: self.round,
            attacker,
            defender,
            closed_by,
        });
        actions
    }

    /// Top every hand back up, in turn order starting from `attacker`.
    fn replenish(&mut self, attacker: PlayerId) {
        let start = self
            .rotation
            .iter()
            .position(|id| *id == attacker)
            .unwrap_or(0);
        let order: Vec<PlayerId> = self
            .rotation
            .iter()
            .cycle()
            .skip(start)
            .take(self.rotation.len())
            .copied()
            .collect();
        for id in order {
            let Some(index) = self.players.iter().position(|p| p.id == id) else {
                continue;
            };
            while self.players[index].needs_cards() > 0 {
                let Some(card) = self.draw_pile.pop_front() else {
                    return;
                };
                self.players[index].hand.insert(card);
            }
        }
    }

    /// Once the draw pile is gone, anyone holding no cards is out.
    fn remove_finished_players(&mut self) -> Vec<Action> {
        if !self.draw_pile.is_empty() {
            return Vec::new();
        }
        let round = self.round;
        let mut actions = Vec::new();
        for player in &mut self.players {
            if player.is_out.is_none() && player.hand.is_empty() {
                player.is_out = Some(round);
                player.role = Role::Bystander;
                actions.push(Action::Exit { player: player.id });
            }
        }
        let players = &self.players;
        self.rotation.retain(|id| {
            players
                .iter()
                .any(|p| p.id == *id && p.is_out.is_none())
        });
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        entities::Suit,
        state_machine::{GameSettings, RosterEntry},
    };

    fn card(s: &str) -> Card {
        s.parse().unwrap()
    }

    fn cards(list: &[&str]) -> Vec<Card> {
        list.iter().map(|s| card(s)).collect()
    }

    fn two_player(a: &[&str], b: &[&str]) -> Game {
        Game::arranged(
            GameSettings::default(),
            vec![
                (RosterEntry::new(1, "alice"), cards(a)),
                (RosterEntry::new(2, "bob"), cards(b)),
            ],
            card("Ace of Hearts"),
        )
        .unwrap()
    }

    fn three_player(settings: GameSettings, a: &[&str], b: &[&str], c: &[&str]) -> Game {
        Game::arranged(
            settings,
            vec![
                (RosterEntry::new(1, "alice"), cards(a)),
                (RosterEntry::new(2, "bob"), cards(b)),
                (RosterEntry::new(3, "carol"), cards(c)),
            ],
            card("Ace of Hearts"),
        )
        .unwrap()
    }

    fn place(card_name: &str) -> Move {
        Move::Place {
            card: card(card_name),
        }
    }

    fn cover(card_name: &str, target_index: usize) -> Move {
        Move::Cover {
            card: card(card_name),
            target_index,
        }
    }

    const A: &[&str] = &[
        "6 of Spades",
        "6 of Clubs",
        "8 of Diamonds",
        "9 of Clubs",
        "10 of Spades",
        "Jack of Clubs",
    ];
    const B: &[&str] = &[
        "7 of Spades",
        "7 of Clubs",
        "6 of Diamonds",
        "9 of Diamonds",
        "Queen of Spades",
        "King of Clubs",
    ];

    #[test]
    fn test_move_json_shape() {
        let mv: Move =
            serde_json::from_str(r#"{"type":"cover","card":"7 of Spades","targetIndex":0}"#)
                .unwrap();
        assert_eq!(mv, cover("7 of Spades", 0));
        let mv: Move = serde_json::from_str(r#"{"type":"forfeit"}"#).unwrap();
        assert_eq!(mv, Move::Forfeit);
        assert_eq!(mv.kind(), "forfeit");
    }

    #[test]
    fn test_place_opens_round() {
        let mut game = two_player(A, B);
        let actions = game.apply(1, &place("6 of Spades")).unwrap();
        assert_eq!(
            actions,
            vec![Action::Place {
                player: 1,
                card: card("6 of Spades")
            }]
        );
        assert_eq!(game.table_top().len(), 1);
        assert_eq!(game.hand_len(1), 5);
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_defender_cannot_place() {
        let mut game = two_player(A, B);
        assert_eq!(
            game.apply(2, &place("7 of Spades")),
            Err(MoveError::NotYourTurn)
        );
    }

    #[test]
    fn test_place_requires_owned_card() {
        let mut game = two_player(A, B);
        assert_eq!(
            game.apply(1, &place("Ace of Spades")),
            Err(MoveError::CardNotOwned {
                card: card("Ace of Spades")
            })
        );
    }

    #[test]
    fn test_place_requires_matching_rank() {
        let mut game = two_player(A, B);
        game.apply(1, &place("6 of Spades")).unwrap();
        assert_eq!(
            game.apply(1, &place("8 of Diamonds")),
            Err(MoveError::RankMismatch {
                card: card("8 of Diamonds")
            })
        );
        game.apply(1, &place("6 of Clubs")).unwrap();
        assert_eq!(game.table_top().len(), 2);
    }

    #[test]
    fn test_place_limited_by_defender_hand() {
        let mut game = two_player(&["6 of Spades", "6 of Clubs"], &["7 of Spades"]);
        game.apply(1, &place("6 of Spades")).unwrap();
        let before = game.clone();
        assert_eq!(
            game.apply(1, &place("6 of Clubs")),
            Err(MoveError::InsufficientDefenderCards)
        );
        assert_eq!(game, before);
    }

    #[test]
    fn test_cover_and_pass_close_round() {
        let mut game = two_player(A, B);
        game.apply(1, &place("6 of Spades")).unwrap();
        let covered = game.apply(2, &cover("7 of Spades", 0)).unwrap();
        assert_eq!(
            covered,
            vec![Action::Cover {
                player: 2,
                card: card("7 of Spades"),
                target: 0
            }]
        );

        let closed = game.apply(1, &Move::Pass).unwrap();
        assert_eq!(
            closed,
            vec![Action::NewRound {
                round: 2,
                attacker: 2,
                defender: 1,
                closed_by: Some(1)
            }]
        );
        assert!(game.table_top().is_empty());
        assert_eq!(game.discard_pile().len(), 2);
        assert_eq!(game.hand_len(1), 6);
        assert_eq!(game.hand_len(2), 6);
        assert_eq!(game.attacker(), Some(2));
        assert!(game.player(2).unwrap().began_round);
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_cover_rejects_weaker_card() {
        let mut game = two_player(A, B);
        game.apply(1, &place("6 of Clubs")).unwrap();
        let before = game.clone();
        assert!(matches!(
            game.apply(2, &cover("6 of Diamonds", 0)),
            Err(MoveError::InvalidCard { .. })
        ));
        assert!(matches!(
            game.apply(2, &cover("7 of Clubs", 3)),
            Err(MoveError::InvalidCard { .. })
        ));
        assert_eq!(game, before);
    }

    #[test]
    fn test_cover_with_trump() {
        let mut game = Game::arranged(
            GameSettings {
                short_deck: false,
                ..Default::default()
            },
            vec![
                (RosterEntry::new(1, "alice"), cards(A)),
                (RosterEntry::new(2, "bob"), cards(&["2 of Hearts"])),
            ],
            card("Ace of Hearts"),
        )
        .unwrap();
        assert_eq!(game.trump_suit(), Suit::Hearts);
        game.apply(1, &place("Jack of Clubs")).unwrap();
        let actions = game.apply(2, &cover("2 of Hearts", 0)).unwrap();
        // Bob's hand is now empty, so nothing more can be thrown in.
        assert!(matches!(actions.last(), Some(Action::NewRound { .. })));
        assert_eq!(game.hand_len(2), 6);
    }

    #[test]
    fn test_table_full_after_six_attacks() {
        let settings = GameSettings {
            short_deck: false,
            ..Default::default()
        };
        let attacker = [
            "6 of Spades",
            "7 of Clubs",
            "8 of Diamonds",
            "9 of Spades",
            "10 of Clubs",
            "Jack of Diamonds",
            "6 of Diamonds",
        ];
        let defender = [
            "7 of Spades",
            "8 of Clubs",
            "9 of Diamonds",
            "10 of Spades",
            "Jack of Clubs",
            "Queen of Diamonds",
            "King of Spades",
        ];
        let mut game = Game::arranged(
            settings,
            vec![
                (RosterEntry::new(1, "alice"), cards(&attacker)),
                (RosterEntry::new(2, "bob"), cards(&defender)),
            ],
            card("Ace of Hearts"),
        )
        .unwrap();

        for index in 0..5 {
            game.apply(1, &place(attacker[index])).unwrap();
            game.apply(2, &cover(defender[index], index)).unwrap();
        }
        game.apply(1, &place("Jack of Diamonds")).unwrap();
        assert_eq!(game.table_top().len(), 6);
        assert_eq!(
            game.apply(1, &place("6 of Diamonds")),
            Err(MoveError::TableFull)
        );

        // Covering the sixth attack closes the round without a pass.
        let actions = game.apply(2, &cover("Queen of Diamonds", 5)).unwrap();
        assert!(matches!(actions.last(), Some(Action::NewRound { .. })));
        assert_eq!(game.discard_pile().len(), 12);
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_forfeit_picks_up_table() {
        let mut game = three_player(GameSettings::default(), A, B, &["Ace of Spades"]);
        game.apply(1, &place("6 of Spades")).unwrap();
        game.apply(2, &cover("7 of Spades", 0)).unwrap();
        game.apply(1, &place("6 of Clubs")).unwrap();

        let actions = game.apply(2, &Move::Forfeit).unwrap();
        assert_eq!(actions[0], Action::Forfeit { player: 2 });
        assert_eq!(actions[1], Action::Pickup { player: 2, count: 3 });
        assert_eq!(
            actions[2],
            Action::NewRound {
                round: 2,
                attacker: 3,
                defender: 1,
                closed_by: None
            }
        );
        assert_eq!(game.hand_len(2), 5 + 3);
        assert!(game.table_top().is_empty());
        assert!(game.discard_pile().is_empty());
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_forfeit_needs_cards_on_table() {
        let mut game = two_player(A, B);
        assert!(matches!(
            game.apply(2, &Move::Forfeit),
            Err(MoveError::InvalidCard { .. })
        ));
        assert_eq!(game.apply(1, &Move::Forfeit), Err(MoveError::NotYourTurn));
    }

    #[test]
    fn test_transfer_moves_defence_along() {
        let mut game = three_player(
            GameSettings::default(),
            A,
            B,
            &["Ace of Spades", "King of Spades", "Queen of Clubs"],
        );
        game.apply(1, &place("6 of Clubs")).unwrap();

        let actions = game
            .apply(
                2,
                &Move::Transfer {
                    card: card("6 of Diamonds"),
                },
            )
            .unwrap();
        assert_eq!(
            actions,
            vec![Action::Transfer {
                player: 2,
                card: card("6 of Diamonds"),
                to: 3
            }]
        );
        assert_eq!(game.defender(), Some(3));
        assert_eq!(game.attacker(), Some(1));
        assert_eq!(game.table_top().len(), 2);
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_transfer_refused_towards_attacker() {
        let mut game = two_player(A, B);
        game.apply(1, &place("6 of Clubs")).unwrap();
        assert!(matches!(
            game.apply(
                2,
                &Move::Transfer {
                    card: card("6 of Diamonds")
                }
            ),
            Err(MoveError::InvalidTransfer { .. })
        ));
    }

    #[test]
    fn test_transfer_refused_after_cover() {
        let mut game = three_player(GameSettings::default(), A, B, &[]);
        game.apply(1, &place("6 of Spades")).unwrap();
        game.apply(2, &cover("7 of Spades", 0)).unwrap();
        game.apply(1, &place("6 of Clubs")).unwrap();
        assert!(matches!(
            game.apply(
                2,
                &Move::Transfer {
                    card: card("6 of Diamonds")
                }
            ),
            Err(MoveError::InvalidTransfer { .. })
        ));
    }

    #[test]
    fn test_transfer_refused_when_next_hand_too_small() {
        let mut game = three_player(GameSettings::default(), A, B, &["Ace of Spades"]);
        game.apply(1, &place("6 of Clubs")).unwrap();
        assert!(matches!(
            game.apply(
                2,
                &Move::Transfer {
                    card: card("6 of Diamonds")
                }
            ),
            Err(MoveError::InvalidTransfer { .. })
        ));
    }

    #[test]
    fn test_free_for_all_lets_bystanders_join() {
        let settings = GameSettings {
            free_for_all: true,
            ..Default::default()
        };
        let mut game = three_player(settings, A, B, &["6 of Hearts", "King of Spades"]);
        assert_eq!(
            game.apply(3, &place("6 of Hearts")),
            Err(MoveError::NotYourTurn)
        );
        game.apply(1, &place("6 of Spades")).unwrap();
        game.apply(3, &place("6 of Hearts")).unwrap();
        assert_eq!(game.table_top().len(), 2);

        game.apply(2, &cover("7 of Spades", 0)).unwrap();
        game.apply(1, &Move::Pass).unwrap();
        // Carol has not passed yet, so the round stays open.
        assert_eq!(game.round(), 1);
    }

    #[test]
    fn test_bystander_cannot_attack_without_free_for_all() {
        let mut game = three_player(GameSettings::default(), A, B, &["King of Spades"]);
        game.apply(1, &place("6 of Spades")).unwrap();
        assert_eq!(game.apply(3, &Move::Pass), Err(MoveError::NotYourTurn));
    }

    #[test]
    fn test_pass_requires_open_round() {
        let mut game = two_player(A, B);
        assert_eq!(game.apply(1, &Move::Pass), Err(MoveError::NotYourTurn));
    }

    #[test]
    fn test_unknown_player_and_game_over() {
        let mut game = two_player(A, B);
        assert_eq!(
            game.apply(9, &Move::Pass),
            Err(MoveError::UnknownPlayer { player: 9 })
        );
        game.victory = true;
        assert_eq!(game.apply(1, &Move::Pass), Err(MoveError::GameOver));
    }

    #[test]
    fn test_last_cards_end_the_game() {
        // Nearly the whole short deck is already discarded.
        let mut game = two_player(&["6 of Spades", "8 of Clubs"], &["7 of Spades"]);
        let pile: Vec<Card> = game.draw_pile.drain(..).collect();
        game.discard_pile.extend(pile);
        game.check_invariants().unwrap();

        game.apply(1, &place("6 of Spades")).unwrap();
        let actions = game.apply(2, &cover("7 of Spades", 0)).unwrap();
        assert_eq!(
            actions,
            vec![
                Action::Cover {
                    player: 2,
                    card: card("7 of Spades"),
                    target: 0
                },
                Action::Exit { player: 2 },
                Action::Victory { durak: Some(1) },
            ]
        );
        assert!(game.is_over());
        assert_eq!(game.durak(), Some(1));
        assert_eq!(game.player(2).unwrap().is_out, Some(1));
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_everyone_out_is_a_draw() {
        let mut game = two_player(&["6 of Spades"], &["7 of Spades"]);
        let pile: Vec<Card> = game.draw_pile.drain(..).collect();
        game.discard_pile.extend(pile);

        game.apply(1, &place("6 of Spades")).unwrap();
        let actions = game.apply(2, &cover("7 of Spades", 0)).unwrap();
        assert_eq!(
            &actions[1..],
            &[
                Action::Exit { player: 1 },
                Action::Exit { player: 2 },
                Action::Victory { durak: None },
            ]
        );
        assert!(game.is_over());
        assert_eq!(game.durak(), None);
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_rejected_moves_leave_state_untouched() {
        let mut game = two_player(A, B);
        game.apply(1, &place("6 of Spades")).unwrap();
        let before = game.clone();
        let attempts = [
            (2, place("7 of Clubs")),
            (1, place("Jack of Clubs")),
            (2, cover("King of Clubs", 0)),
            (1, cover("10 of Spades", 0)),
            (1, Move::Forfeit),
            (
                2,
                Move::Transfer {
                    card: card("Queen of Spades"),
                },
            ),
        ];
        for (player, mv) in attempts {
            assert!(game.apply(player, &mv).is_err(), "{mv:?} should fail");
            assert_eq!(game, before);
        }
    }
}
