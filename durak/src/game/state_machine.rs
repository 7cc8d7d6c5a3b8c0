use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};

use super::{
    constants::{
        DEFAULT_ROUND_TIMEOUT_SECS, HAND_SIZE, MAX_PLAYERS, MAX_ROUND_TIMEOUT_SECS,
        MAX_SHORT_DECK_PLAYERS, MAX_TABLE_CARDS, MIN_PLAYERS, MIN_ROUND_TIMEOUT_SECS,
    },
    entities::{Card, Player, PlayerId, Role, Suit, TableTop, generate_deck, shuffle},
    errors::{InvariantViolation, SettingsError},
};

/// Rule used to pick the attacker of the first round.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstAttacker {
    /// Whoever holds the lowest trump; the first seat if nobody holds one.
    #[default]
    LowestTrump,
    FirstSeat,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameSettings {
    pub max_players: usize,
    pub short_deck: bool,
    /// Any non-defending player may add attack cards once the round is open.
    pub free_for_all: bool,
    pub round_timeout_secs: u64,
    pub random_player_order: bool,
    pub first_attacker: FirstAttacker,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_players: MAX_SHORT_DECK_PLAYERS,
            short_deck: true,
            free_for_all: false,
            round_timeout_secs: DEFAULT_ROUND_TIMEOUT_SECS,
            random_player_order: false,
            first_attacker: FirstAttacker::default(),
        }
    }
}

impl GameSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.max_players) {
            return Err(SettingsError::MaxPlayers {
                got: self.max_players,
                min: MIN_PLAYERS,
                max: MAX_PLAYERS,
            });
        }
        if self.short_deck && self.max_players > MAX_SHORT_DECK_PLAYERS {
            return Err(SettingsError::ShortDeckTooManyPlayers {
                got: self.max_players,
                max: MAX_SHORT_DECK_PLAYERS,
            });
        }
        if !(MIN_ROUND_TIMEOUT_SECS..=MAX_ROUND_TIMEOUT_SECS).contains(&self.round_timeout_secs) {
            return Err(SettingsError::RoundTimeout {
                got: self.round_timeout_secs,
                min: MIN_ROUND_TIMEOUT_SECS,
                max: MAX_ROUND_TIMEOUT_SECS,
            });
        }
        Ok(())
    }

    fn validate_roster(&self, roster: &[RosterEntry]) -> Result<(), SettingsError> {
        self.validate()?;
        if !(MIN_PLAYERS..=self.max_players).contains(&roster.len()) {
            return Err(SettingsError::RosterSize {
                got: roster.len(),
                min: MIN_PLAYERS,
                max: self.max_players,
            });
        }
        let mut seen = HashSet::with_capacity(roster.len());
        for entry in roster {
            if !seen.insert(entry.id) {
                return Err(SettingsError::DuplicatePlayer(entry.id));
            }
        }
        Ok(())
    }
}

/// A seat requested by the lobby when the game starts.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub name: String,
}

impl RosterEntry {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Authoritative state of a single Durak game.
///
/// Players live in an arena in seating order. `rotation` holds the ids of
/// players still in play, in turn order. The draw pile is drawn from the
/// front; the trump indicator sits at the back and is drawn last.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub(crate) players: Vec<Player>,
    pub(crate) rotation: Vec<PlayerId>,
    pub(crate) table_top: TableTop,
    pub(crate) draw_pile: VecDeque<Card>,
    pub(crate) discard_pile: Vec<Card>,
    pub(crate) trump_suit: Suit,
    pub(crate) trump_card: Card,
    pub(crate) victory: bool,
    pub(crate) durak: Option<PlayerId>,
    pub(crate) round: u32,
    pub(crate) settings: GameSettings,
    pub(crate) seed: Option<u64>,
    /// The current defender has covered at least one attack, which rules
    /// out transferring.
    pub(crate) defender_covered: bool,
}

impl Game {
    /// Shuffle, deal and seat a new game.
    pub fn deal<R: Rng + ?Sized>(
        settings: GameSettings,
        roster: &[RosterEntry],
        rng: &mut R,
    ) -> Result<Self, SettingsError> {
        settings.validate_roster(roster)?;

        let mut seating = roster.to_vec();
        if settings.random_player_order {
            seating.shuffle(rng);
        }

        let mut deck = generate_deck(settings.short_deck);
        shuffle(&mut deck, rng);
        let mut deck = VecDeque::from(deck);

        let mut players: Vec<Player> = seating
            .into_iter()
            .map(|entry| Player::new(entry.id, entry.name))
            .collect();
        let mut last_dealt = None;
        for _ in 0..HAND_SIZE {
            for player in &mut players {
                if let Some(card) = deck.pop_front() {
                    player.hand.insert(card);
                    last_dealt = Some(card);
                }
            }
        }

        // With a fully dealt deck the last card dealt names trump and stays
        // in its holder's hand.
        let trump_card = match (deck.pop_front(), last_dealt) {
            (Some(card), _) => {
                deck.push_back(card);
                card
            }
            (None, Some(card)) => card,
            (None, None) => unreachable!("a validated roster is always dealt cards"),
        };

        let first_attacker = match settings.first_attacker {
            FirstAttacker::LowestTrump => players
                .iter()
                .filter_map(|player| {
                    player
                        .lowest_trump(trump_card.suit)
                        .map(|card| (card.rank, player.id))
                })
                .min()
                .map(|(_, id)| id),
            FirstAttacker::FirstSeat => None,
        }
        .unwrap_or(players[0].id);

        let mut game = Self::seated(players, deck, trump_card, settings);
        game.begin_round(first_attacker);
        Ok(game)
    }

    /// Deal a game from a seeded ChaCha stream so it can be replayed later.
    pub fn deal_seeded(
        settings: GameSettings,
        roster: &[RosterEntry],
        seed: u64,
    ) -> Result<Self, SettingsError> {
        use rand::SeedableRng;

        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        let mut game = Self::deal(settings, roster, &mut rng)?;
        game.seed = Some(seed);
        Ok(game)
    }

    /// Seat a game with predetermined hands.
    ///
    /// Cards not dealt to any hand form the draw pile in deck order, with
    /// `trump_card` at the bottom. The first seat attacks and the second
    /// defends.
    pub fn arranged(
        settings: GameSettings,
        seats: Vec<(RosterEntry, Vec<Card>)>,
        trump_card: Card,
    ) -> Result<Self, SettingsError> {
        let roster: Vec<RosterEntry> = seats.iter().map(|(entry, _)| entry.clone()).collect();
        settings.validate_roster(&roster)?;

        let deck = generate_deck(settings.short_deck);
        let mut undealt: BTreeSet<Card> = deck.iter().copied().collect();
        let mut players = Vec::with_capacity(seats.len());
        for (entry, hand) in seats {
            let mut player = Player::new(entry.id, entry.name);
            for card in hand {
                if !undealt.remove(&card) {
                    return Err(SettingsError::ArrangedCard(card));
                }
                player.hand.insert(card);
            }
            players.push(player);
        }
        if !undealt.remove(&trump_card) {
            return Err(SettingsError::ArrangedCard(trump_card));
        }

        let mut draw_pile: VecDeque<Card> = deck
            .into_iter()
            .filter(|card| undealt.contains(card))
            .collect();
        draw_pile.push_back(trump_card);

        let first_attacker = players[0].id;
        let mut game = Self::seated(players, draw_pile, trump_card, settings);
        game.begin_round(first_attacker);
        Ok(game)
    }

    fn seated(
        players: Vec<Player>,
        draw_pile: VecDeque<Card>,
        trump_card: Card,
        settings: GameSettings,
    ) -> Self {
        Self {
            rotation: players.iter().map(|player| player.id).collect(),
            players,
            table_top: TableTop::new(),
            draw_pile,
            discard_pile: Vec::new(),
            trump_suit: trump_card.suit,
            trump_card,
            victory: false,
            durak: None,
            round: 1,
            settings,
            seed: None,
            defender_covered: false,
        }
    }

    /// Hand out roles for a fresh round led by `attacker`. Returns the
    /// defender.
    pub(crate) fn begin_round(&mut self, attacker: PlayerId) -> PlayerId {
        let defender = self.next_in_rotation(attacker).unwrap_or(attacker);
        for player in &mut self.players {
            player.role = if player.id == attacker {
                Role::Attacker
            } else if player.id == defender {
                Role::Defender
            } else {
                Role::Bystander
            };
            player.has_turned = false;
            player.began_round = player.id == attacker;
        }
        self.defender_covered = false;
        defender
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    /// Ids of players still in play, in turn order.
    pub fn rotation(&self) -> &[PlayerId] {
        &self.rotation
    }

    pub fn is_active(&self, id: PlayerId) -> bool {
        self.rotation.contains(&id)
    }

    /// Player seated after `id` among those still in play.
    pub fn next_in_rotation(&self, id: PlayerId) -> Option<PlayerId> {
        let index = self.rotation.iter().position(|other| *other == id)?;
        Some(self.rotation[(index + 1) % self.rotation.len()])
    }

    fn holder_of(&self, role: Role) -> Option<PlayerId> {
        self.rotation
            .iter()
            .copied()
            .find(|id| self.player(*id).is_some_and(|player| player.role == role))
    }

    pub fn attacker(&self) -> Option<PlayerId> {
        self.holder_of(Role::Attacker)
    }

    pub fn defender(&self) -> Option<PlayerId> {
        self.holder_of(Role::Defender)
    }

    pub fn hand_len(&self, id: PlayerId) -> usize {
        self.player(id).map_or(0, |player| player.hand.len())
    }

    pub fn table_top(&self) -> &TableTop {
        &self.table_top
    }

    pub fn draw_pile(&self) -> &VecDeque<Card> {
        &self.draw_pile
    }

    pub fn discard_pile(&self) -> &[Card] {
        &self.discard_pile
    }

    pub fn trump_suit(&self) -> Suit {
        self.trump_suit
    }

    pub fn trump_card(&self) -> Card {
        self.trump_card
    }

    /// Whether the game has ended, with a loser or as a draw.
    pub fn is_over(&self) -> bool {
        self.victory
    }

    /// The loser, once the game is over. `None` after a draw.
    pub fn durak(&self) -> Option<PlayerId> {
        self.durak
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Verify the structural guarantees every reachable state holds.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let deck = generate_deck(self.settings.short_deck);
        let deck_cards: HashSet<Card> = deck.iter().copied().collect();
        let mut seen = HashSet::with_capacity(deck.len());
        let every_card = self
            .players
            .iter()
            .flat_map(|player| player.hand.iter().copied())
            .chain(self.draw_pile.iter().copied())
            .chain(self.table_top.cards())
            .chain(self.discard_pile.iter().copied());
        for card in every_card {
            if !deck_cards.contains(&card) {
                return Err(InvariantViolation::ForeignCard(card));
            }
            if !seen.insert(card) {
                return Err(InvariantViolation::DuplicateCard(card));
            }
        }
        if seen.len() != deck.len() {
            return Err(InvariantViolation::CardCount {
                expected: deck.len(),
                found: seen.len(),
            });
        }

        if self.table_top.len() > MAX_TABLE_CARDS {
            return Err(InvariantViolation::TableOverflow(self.table_top.len()));
        }

        for id in &self.rotation {
            match self.player(*id) {
                Some(player) if player.is_out.is_none() => {}
                Some(_) => {
                    return Err(InvariantViolation::Rotation(format!(
                        "player {id} is out but still in rotation"
                    )));
                }
                None => {
                    return Err(InvariantViolation::Rotation(format!(
                        "player {id} is not seated"
                    )));
                }
            }
        }
        if let Some(player) = self
            .players
            .iter()
            .find(|player| player.is_out.is_none() && !self.rotation.contains(&player.id))
        {
            return Err(InvariantViolation::Rotation(format!(
                "player {} left the rotation without going out",
                player.id
            )));
        }

        if self.victory {
            return Ok(());
        }
        if self.rotation.len() < MIN_PLAYERS {
            return Err(InvariantViolation::Rotation(format!(
                "{} players left in an unfinished game",
                self.rotation.len()
            )));
        }
        let count = |role: Role| {
            self.rotation
                .iter()
                .filter_map(|id| self.player(*id))
                .filter(|player| player.role == role)
                .count()
        };
        let (attackers, defenders) = (count(Role::Attacker), count(Role::Defender));
        if attackers != 1 || defenders != 1 {
            return Err(InvariantViolation::Roles(format!(
                "{attackers} attackers and {defenders} defenders"
            )));
        }
        Ok(())
    }
}
