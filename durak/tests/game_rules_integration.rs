//! Integration tests for full rounds played through the public game API.
//!
//! Games are seated with `Game::arranged` so every hand is known, then driven
//! move by move the way a room actor would drive them.

use durak::{
    Action, Card, Game, GameSettings, Move, MoveError, RosterEntry,
    game::{HandView, Role, project_for_player, project_for_spectator},
};

fn card(s: &str) -> Card {
    s.parse().unwrap()
}

fn cards(list: &[&str]) -> Vec<Card> {
    list.iter().map(|s| card(s)).collect()
}

fn seat(settings: GameSettings, hands: &[&[&str]]) -> Game {
    let names = ["alice", "bob", "carol", "dave"];
    let seats = hands
        .iter()
        .zip(1..)
        .map(|(hand, id)| (RosterEntry::new(id, names[id as usize - 1]), cards(hand)))
        .collect();
    Game::arranged(settings, seats, card("Ace of Hearts")).unwrap()
}

fn place(name: &str) -> Move {
    Move::Place { card: card(name) }
}

fn cover(name: &str, target_index: usize) -> Move {
    Move::Cover {
        card: card(name),
        target_index,
    }
}

const ALICE: &[&str] = &[
    "6 of Spades",
    "8 of Clubs",
    "9 of Diamonds",
    "10 of Clubs",
    "Jack of Spades",
    "Queen of Diamonds",
];

const BOB: &[&str] = &[
    "7 of Spades",
    "6 of Clubs",
    "7 of Diamonds",
    "King of Clubs",
    "King of Spades",
    "Queen of Clubs",
];

#[test]
fn test_place_cover_pass_closes_round() {
    let mut game = seat(GameSettings::default(), &[ALICE, BOB]);
    assert_eq!(game.trump_suit().to_string(), "Hearts");
    assert_eq!(game.draw_pile().len(), 36 - 12);

    let mut emitted = Vec::new();
    emitted.extend(game.apply(1, &place("6 of Spades")).unwrap());
    emitted.extend(game.apply(2, &cover("7 of Spades", 0)).unwrap());
    emitted.extend(game.apply(1, &Move::Pass).unwrap());

    let names: Vec<&str> = emitted.iter().map(Action::name).collect();
    assert_eq!(names, ["place", "cover", "new_round"]);

    let view = project_for_player(&game, 2);
    assert!(view.table_top.is_empty());
    assert_eq!(serde_json::to_value(&view.table_top).unwrap(), serde_json::json!({}));
    assert!(view.players.iter().all(|p| p.hand.len() == 6));
    assert_eq!(game.attacker(), Some(2));
    assert_eq!(game.defender(), Some(1));
    assert_eq!(game.draw_pile().len(), 36 - 14);
    game.check_invariants().unwrap();
}

#[test]
fn test_off_suit_lower_cover_is_rejected() {
    let settings = GameSettings {
        short_deck: false,
        ..GameSettings::default()
    };
    let bob = &["5 of Clubs", "7 of Spades", "2 of Diamonds", "3 of Clubs", "4 of Spades", "King of Clubs"];
    let mut game = seat(settings, &[ALICE, bob]);

    game.apply(1, &place("6 of Spades")).unwrap();
    let before = game.clone();
    let bob_hand = game.player(2).unwrap().hand.clone();

    let err = game.apply(2, &cover("5 of Clubs", 0)).unwrap_err();
    assert!(matches!(err, MoveError::InvalidCard { .. }));
    assert_eq!(err.kind(), "invalid_card");
    assert_eq!(game, before);
    assert_eq!(game.player(2).unwrap().hand, bob_hand);
    assert_eq!(game.table_top().uncovered(), 1);
}

#[test]
fn test_table_full_rejects_seventh_attack() {
    let alice = &[
        "6 of Spades",
        "7 of Clubs",
        "8 of Diamonds",
        "9 of Spades",
        "10 of Clubs",
        "Jack of Diamonds",
    ];
    let bob = &[
        "7 of Spades",
        "8 of Clubs",
        "9 of Diamonds",
        "10 of Spades",
        "Jack of Clubs",
        "Queen of Diamonds",
    ];
    let mut game = seat(GameSettings::default(), &[alice, bob]);

    // Each cover brings a new rank onto the table for the next attack.
    let attacks = alice.iter().zip(bob.iter());
    for (index, (attack, defence)) in attacks.take(5).enumerate() {
        game.apply(1, &place(attack)).unwrap();
        game.apply(2, &cover(defence, index)).unwrap();
    }
    assert_eq!(game.table_top().len(), 5);

    game.apply(1, &place("Jack of Diamonds")).unwrap();
    assert_eq!(game.table_top().len(), 6);
    assert_eq!(
        game.apply(1, &place("Jack of Spades")),
        Err(MoveError::TableFull)
    );

    // Covering the sixth attack closes the round without a pass.
    let actions = game.apply(2, &cover("Queen of Diamonds", 5)).unwrap();
    assert!(matches!(actions.last(), Some(Action::NewRound { closed_by: None, .. })));
    assert_eq!(game.discard_pile().len(), 12);
    game.check_invariants().unwrap();
}

#[test]
fn test_forfeit_keeps_attacker_leading() {
    let mut game = seat(GameSettings::default(), &[ALICE, BOB]);
    game.apply(1, &place("6 of Spades")).unwrap();

    let actions = game.apply(2, &Move::Forfeit).unwrap();
    assert_eq!(actions[0], Action::Forfeit { player: 2 });
    assert_eq!(actions[1], Action::Pickup { player: 2, count: 1 });
    assert!(matches!(
        actions[2],
        Action::NewRound {
            round: 2,
            attacker: 1,
            defender: 2,
            ..
        }
    ));
    assert_eq!(game.hand_len(2), 7);
    assert_eq!(game.hand_len(1), 6);
    assert!(game.table_top().is_empty());
    game.check_invariants().unwrap();
}

#[test]
fn test_transfer_passes_defence_to_next_player() {
    let carol = &[
        "8 of Spades",
        "9 of Spades",
        "10 of Spades",
        "10 of Diamonds",
        "Jack of Clubs",
        "Jack of Diamonds",
    ];
    let mut game = seat(GameSettings::default(), &[ALICE, BOB, carol]);
    game.apply(1, &place("6 of Spades")).unwrap();

    let actions = game.apply(2, &Move::Transfer { card: card("6 of Clubs") }).unwrap();
    assert_eq!(
        actions,
        vec![Action::Transfer {
            player: 2,
            card: card("6 of Clubs"),
            to: 3
        }]
    );
    assert_eq!(game.defender(), Some(3));
    assert_eq!(game.attacker(), Some(1));
    assert_eq!(game.player(2).unwrap().role, Role::Bystander);
    assert_eq!(game.table_top().uncovered(), 2);

    // Bob is no longer defending.
    assert_eq!(
        game.apply(2, &cover("7 of Spades", 0)),
        Err(MoveError::NotYourTurn)
    );
    game.check_invariants().unwrap();
}

#[test]
fn test_spectator_view_hides_every_hand() {
    let game = seat(GameSettings::default(), &[ALICE, BOB]);
    let view = project_for_spectator(&game);
    assert!(
        view.players
            .iter()
            .all(|p| matches!(p.hand, HandView::CardCount(6)))
    );

    let view = project_for_player(&game, 1);
    assert!(matches!(&view.players[0].hand, HandView::Cards(cards) if cards.len() == 6));
    assert!(matches!(view.players[1].hand, HandView::CardCount(6)));
    assert_eq!(view.deck_size, 24);
    assert_eq!(view.trump, card("Ace of Hearts"));
}
