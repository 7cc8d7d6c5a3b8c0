use rand::{Rng, seq::SliceRandom};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
};
use std::{cmp::Ordering, collections::BTreeSet, fmt, str::FromStr};
use thiserror::Error;

use super::constants::{HAND_SIZE, MAX_TABLE_CARDS};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Self::Hearts, Self::Diamonds, Self::Clubs, Self::Spades];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Hearts => "Hearts",
            Self::Diamonds => "Diamonds",
            Self::Clubs => "Clubs",
            Self::Spades => "Spades",
        };
        write!(f, "{repr}")
    }
}

impl FromStr for Suit {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|suit| suit.to_string() == s)
            .ok_or_else(|| ParseCardError::Suit(s.to_string()))
    }
}

/// Card ranks in ascending strength. Aces are always high.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Eight,
        Self::Nine,
        Self::Ten,
        Self::Jack,
        Self::Queen,
        Self::King,
        Self::Ace,
    ];

    /// Ranks used by the 36-card short deck.
    pub fn short_deck() -> impl Iterator<Item = Rank> {
        Self::ALL.into_iter().filter(|rank| *rank >= Self::Six)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Jack => write!(f, "Jack"),
            Self::Queen => write!(f, "Queen"),
            Self::King => write!(f, "King"),
            Self::Ace => write!(f, "Ace"),
            numeric => write!(f, "{}", *numeric as u8),
        }
    }
}

impl FromStr for Rank {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rank| rank.to_string() == s)
            .ok_or_else(|| ParseCardError::Rank(s.to_string()))
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParseCardError {
    #[error("expected \"<rank> of <suit>\", got {0:?}")]
    Format(String),
    #[error("unknown rank {0:?}")]
    Rank(String),
    #[error("unknown suit {0:?}")]
    Suit(String),
}

/// A playing card. Serialized on the wire and in storage as
/// `"<rank> of <suit>"`, e.g. `"10 of Clubs"`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    #[must_use]
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// Whether this card legally covers `target` with `trump` as the trump suit.
    #[must_use]
    pub fn beats(&self, target: &Card, trump: Suit) -> bool {
        compare(self, target, trump) == Some(Ordering::Greater)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} of {}", self.rank, self.suit)
    }
}

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rank, suit) = s
            .split_once(" of ")
            .ok_or_else(|| ParseCardError::Format(s.to_string()))?;
        Ok(Self::new(rank.parse()?, suit.parse()?))
    }
}

impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Compare two cards under a trump suit.
///
/// Same-suit cards compare by rank and a trump beats any non-trump. Two
/// non-trump cards of different suits are incomparable and yield `None`.
#[must_use]
pub fn compare(a: &Card, b: &Card, trump: Suit) -> Option<Ordering> {
    match (a.suit == trump, b.suit == trump) {
        _ if a.suit == b.suit => Some(a.rank.cmp(&b.rank)),
        (true, false) => Some(Ordering::Greater),
        (false, true) => Some(Ordering::Less),
        _ => None,
    }
}

/// Build an ordered deck: 52 cards, or 36 (sixes and up) for a short deck.
#[must_use]
pub fn generate_deck(short: bool) -> Vec<Card> {
    let ranks: Vec<Rank> = if short {
        Rank::short_deck().collect()
    } else {
        Rank::ALL.to_vec()
    };
    Suit::ALL
        .into_iter()
        .flat_map(|suit| ranks.iter().map(move |rank| Card::new(*rank, suit)))
        .collect()
}

/// Uniform Fisher–Yates shuffle driven by the caller's random source.
pub fn shuffle<R: Rng + ?Sized>(deck: &mut [Card], rng: &mut R) {
    deck.shuffle(rng);
}

/// Player identifier, stable and unique within a room.
pub type PlayerId = i64;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Attacker,
    Defender,
    Bystander,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Attacker => "attacker",
            Self::Defender => "defender",
            Self::Bystander => "bystander",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub hand: BTreeSet<Card>,
    pub role: Role,
    /// Declined to add more attack cards this round.
    pub has_turned: bool,
    pub began_round: bool,
    /// Round in which the player went out, if they have.
    pub is_out: Option<u32>,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hand: BTreeSet::new(),
            role: Role::Bystander,
            has_turned: false,
            began_round: false,
            is_out: None,
        }
    }

    #[must_use]
    pub fn needs_cards(&self) -> usize {
        HAND_SIZE.saturating_sub(self.hand.len())
    }

    /// Lowest trump in hand, used to pick the first attacker.
    #[must_use]
    pub fn lowest_trump(&self, trump: Suit) -> Option<Card> {
        self.hand.iter().find(|card| card.suit == trump).copied()
    }
}

/// One attack on the table and its covering card, if any.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TablePair {
    pub attack: Card,
    pub defense: Option<Card>,
}

impl TablePair {
    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.defense.is_some()
    }
}

/// Attack/defense pairs in placement order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableTop {
    pairs: Vec<TablePair>,
}

impl TableTop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.pairs.len() >= MAX_TABLE_CARDS
    }

    #[must_use]
    pub fn uncovered(&self) -> usize {
        self.pairs.iter().filter(|pair| !pair.is_covered()).count()
    }

    #[must_use]
    pub fn all_covered(&self) -> bool {
        self.pairs.iter().all(TablePair::is_covered)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TablePair> {
        self.pairs.get(index)
    }

    pub fn pairs(&self) -> impl Iterator<Item = &TablePair> {
        self.pairs.iter()
    }

    /// Every card on the table, attacks and defenses.
    pub fn cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.pairs
            .iter()
            .flat_map(|pair| std::iter::once(pair.attack).chain(pair.defense))
    }

    #[must_use]
    pub fn contains(&self, card: &Card) -> bool {
        self.cards().any(|c| c == *card)
    }

    #[must_use]
    pub fn has_rank(&self, rank: Rank) -> bool {
        self.cards().any(|card| card.rank == rank)
    }

    /// Position of `card` as an attack card.
    #[must_use]
    pub fn position(&self, card: &Card) -> Option<usize> {
        self.pairs.iter().position(|pair| pair.attack == *card)
    }

    /// Add an uncovered attack. The card must not already be on the table.
    pub fn attack(&mut self, card: Card) {
        assert!(!self.contains(&card), "{card} is already on the table");
        self.pairs.push(TablePair {
            attack: card,
            defense: None,
        });
    }

    /// Cover the attack at `index`. The slot must exist and be uncovered.
    pub fn cover(&mut self, index: usize, card: Card) {
        assert!(!self.contains(&card), "{card} is already on the table");
        let pair = &mut self.pairs[index];
        assert!(pair.defense.is_none(), "{} is already covered", pair.attack);
        pair.defense = Some(card);
    }

    /// Remove and return every card on the table.
    pub fn clear(&mut self) -> Vec<Card> {
        let cards = self.cards().collect();
        self.pairs.clear();
        cards
    }
}

impl Serialize for TableTop {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for pair in &self.pairs {
            map.serialize_entry(&pair.attack, &pair.defense)?;
        }
        map.end()
    }
}

struct TableTopVisitor;

impl<'de> Visitor<'de> for TableTopVisitor {
    type Value = TableTop;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map of attack cards to covering cards or null")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut table = TableTop::new();
        while let Some((attack, defense)) = access.next_entry::<Card, Option<Card>>()? {
            if table.contains(&attack) || defense.is_some_and(|card| table.contains(&card)) {
                return Err(de::Error::custom(format!("duplicate card on table: {attack}")));
            }
            table.pairs.push(TablePair { attack, defense });
        }
        Ok(table)
    }
}

impl<'de> Deserialize<'de> for TableTop {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(TableTopVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn card(s: &str) -> Card {
        s.parse().unwrap()
    }

    #[test]
    fn test_card_display_and_parse() {
        let cases = [
            (Card::new(Rank::Six, Suit::Spades), "6 of Spades"),
            (Card::new(Rank::Ten, Suit::Clubs), "10 of Clubs"),
            (Card::new(Rank::Queen, Suit::Hearts), "Queen of Hearts"),
            (Card::new(Rank::Ace, Suit::Diamonds), "Ace of Diamonds"),
        ];
        for (card, repr) in cases {
            assert_eq!(card.to_string(), repr);
            assert_eq!(repr.parse::<Card>().unwrap(), card);
        }
    }

    #[test]
    fn test_card_parse_errors() {
        assert!(matches!("6 Spades".parse::<Card>(), Err(ParseCardError::Format(_))));
        assert!(matches!("1 of Spades".parse::<Card>(), Err(ParseCardError::Rank(_))));
        assert!(matches!("6 of Stars".parse::<Card>(), Err(ParseCardError::Suit(_))));
    }

    #[test]
    fn test_card_serializes_as_string() {
        let json = serde_json::to_string(&card("Jack of Diamonds")).unwrap();
        assert_eq!(json, "\"Jack of Diamonds\"");
        assert!(serde_json::from_str::<Card>("\"Joker\"").is_err());
    }

    #[test]
    fn test_full_deck_is_unique() {
        let deck = generate_deck(false);
        assert_eq!(deck.len(), 52);
        assert_eq!(deck.iter().collect::<HashSet<_>>().len(), 52);
    }

    #[test]
    fn test_short_deck_starts_at_six() {
        let deck = generate_deck(true);
        assert_eq!(deck.len(), 36);
        assert!(deck.iter().all(|card| card.rank >= Rank::Six));
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let mut a = generate_deck(true);
        let mut b = generate_deck(true);
        shuffle(&mut a, &mut ChaCha8Rng::seed_from_u64(7));
        shuffle(&mut b, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_ne!(a, generate_deck(true));
    }

    #[test]
    fn test_compare_same_suit_by_rank() {
        let trump = Suit::Hearts;
        assert_eq!(
            compare(&card("7 of Spades"), &card("6 of Spades"), trump),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare(&card("2 of Clubs"), &card("King of Clubs"), trump),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_compare_trump_beats_non_trump() {
        let trump = Suit::Hearts;
        assert_eq!(
            compare(&card("2 of Hearts"), &card("Ace of Spades"), trump),
            Some(Ordering::Greater)
        );
        assert_eq!(
            compare(&card("Ace of Spades"), &card("2 of Hearts"), trump),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_compare_off_suits_are_incomparable() {
        assert_eq!(
            compare(&card("5 of Clubs"), &card("6 of Spades"), Suit::Hearts),
            None
        );
        assert!(!card("Ace of Clubs").beats(&card("6 of Spades"), Suit::Hearts));
    }

    #[test]
    fn test_trump_needs_higher_trump() {
        let trump = Suit::Diamonds;
        assert!(card("9 of Diamonds").beats(&card("8 of Diamonds"), trump));
        assert!(!card("7 of Diamonds").beats(&card("8 of Diamonds"), trump));
        assert!(!card("Ace of Spades").beats(&card("6 of Diamonds"), trump));
    }

    #[test]
    fn test_lowest_trump() {
        let mut player = Player::new(1, "alice");
        player.hand.extend([
            card("King of Hearts"),
            card("7 of Hearts"),
            card("2 of Spades"),
        ]);
        assert_eq!(player.lowest_trump(Suit::Hearts), Some(card("7 of Hearts")));
        assert_eq!(player.lowest_trump(Suit::Clubs), None);
        assert_eq!(player.needs_cards(), 3);
    }

    #[test]
    fn test_table_top_bookkeeping() {
        let mut table = TableTop::new();
        table.attack(card("6 of Spades"));
        table.attack(card("6 of Clubs"));
        assert_eq!(table.uncovered(), 2);
        assert!(table.has_rank(Rank::Six));

        table.cover(0, card("7 of Spades"));
        assert_eq!(table.uncovered(), 1);
        assert!(!table.all_covered());
        assert!(table.has_rank(Rank::Seven));
        assert_eq!(table.position(&card("6 of Clubs")), Some(1));

        let cleared = table.clear();
        assert_eq!(cleared.len(), 3);
        assert!(table.is_empty());
    }

    #[test]
    #[should_panic(expected = "already on the table")]
    fn test_table_top_rejects_duplicate_card() {
        let mut table = TableTop::new();
        table.attack(card("6 of Spades"));
        table.attack(card("6 of Spades"));
    }

    #[test]
    fn test_table_top_serializes_as_ordered_map() {
        let mut table = TableTop::new();
        table.attack(card("9 of Clubs"));
        table.attack(card("9 of Hearts"));
        table.cover(0, card("10 of Clubs"));

        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(
            json,
            r#"{"9 of Clubs":"10 of Clubs","9 of Hearts":null}"#
        );
        let back: TableTop = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
