//! Room actor: the single owner of a room's game state.
//!
//! Messages are handled one at a time, so each room's mutations are
//! serialized without any lock. Independent rooms run as independent tasks.

use chrono::Utc;
use std::{
    any::Any,
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use tokio::{
    sync::mpsc::{self, error::SendTimeoutError, error::TrySendError},
    time::{Duration, Instant},
};

use super::{
    config::RoomConfig,
    errors::RoomError,
    messages::{MoveOutcome, RoomMessage, SubscriberId},
};
use crate::{
    db::{RoomPin, RoomStatus, RoomStore, StoreError, timeouts::with_store_timeout},
    game::{
        Game, InvariantViolation, MoveError, OpaqueState, PlayerId, moves::Move,
        project_for_player, project_for_spectator,
    },
    history::{History, HistoryEntry},
    net::{ActionBroadcast, ErrorPayload, ServerMessage},
};

/// A loaded room.
#[derive(Debug, Clone)]
pub struct Room {
    pin: RoomPin,
    game: Game,
    history: History,
    status: RoomStatus,
}

impl Room {
    pub fn new(pin: RoomPin, game: Game, history: History, status: RoomStatus) -> Self {
        Self {
            pin,
            game,
            history,
            status,
        }
    }

    pub fn pin(&self) -> &RoomPin {
        &self.pin
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn status(&self) -> &RoomStatus {
        &self.status
    }

    /// Player view for seated viewers, spectator view otherwise.
    pub fn view_for(&self, viewer: Option<PlayerId>) -> OpaqueState {
        match viewer {
            Some(id) => project_for_player(&self.game, id),
            None => project_for_spectator(&self.game),
        }
    }
}

/// Room actor handle for sending messages
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    pin: RoomPin,
    lock_timeout: Duration,
}

impl RoomHandle {
    pub fn pin(&self) -> &RoomPin {
        &self.pin
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Latest time the actor may start on a request sent now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.lock_timeout
    }

    /// Queue a message, waiting at most the lock timeout for inbox space.
    pub async fn send(&self, message: RoomMessage) -> Result<(), RoomError> {
        self.sender
            .send_timeout(message, self.lock_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => RoomError::Busy(self.pin.clone()),
                SendTimeoutError::Closed(_) => RoomError::Closed(self.pin.clone()),
            })
    }
}

struct Subscriber {
    viewer: Option<PlayerId>,
    sender: mpsc::Sender<ServerMessage>,
}

pub struct RoomActor {
    room: Room,
    config: RoomConfig,
    store: Arc<dyn RoomStore>,
    inbox: mpsc::Receiver<RoomMessage>,
    subscribers: HashMap<SubscriberId, Subscriber>,
    next_subscriber: SubscriberId,
    /// Set when memory may no longer match the store.
    stale: bool,
}

/// Where a commit that reported failure actually ended up.
#[derive(Debug, PartialEq, Eq)]
enum CommitOutcome {
    Landed,
    NotLanded,
    Unknown,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl RoomActor {
    pub fn new(room: Room, config: RoomConfig, store: Arc<dyn RoomStore>) -> (Self, RoomHandle) {
        let (sender, inbox) = mpsc::channel(config.inbox_capacity);
        let handle = RoomHandle {
            sender,
            pin: room.pin.clone(),
            lock_timeout: config.lock_timeout,
        };
        let actor = Self {
            room,
            config,
            store,
            inbox,
            subscribers: HashMap::new(),
            next_subscriber: 0,
            stale: false,
        };
        (actor, handle)
    }

    /// Run the room actor event loop until the room is closed, its state
    /// goes stale, or every handle is dropped.
    pub async fn run(mut self) {
        log::info!("Room {} starting ({})", self.room.pin, self.room.status);

        while let Some(message) = self.inbox.recv().await {
            if !self.handle_message(message).await {
                break;
            }
        }

        // Requests already queued are refused rather than dropped.
        self.inbox.close();
        while let Ok(message) = self.inbox.try_recv() {
            self.refuse(message);
        }

        log::info!("Room {} stopped", self.room.pin);
    }

    /// Answer a request that arrived after the actor stopped taking work.
    /// A closed room says so; a stale one says `Busy` so the caller retries
    /// against the room reloaded from the store.
    fn refuse(&self, message: RoomMessage) {
        let pin = self.room.pin.clone();
        let error = || match self.room.status {
            RoomStatus::Closed => RoomError::Closed(pin.clone()),
            _ => RoomError::Busy(pin.clone()),
        };
        match message {
            RoomMessage::Submit { response, .. } => {
                let _ = response.send(Err(error()));
            }
            RoomMessage::Inspect { inspect, .. } => inspect(Err(error())),
            RoomMessage::Close { response } => {
                let _ = response.send(Err(error()));
            }
            RoomMessage::Subscribe { .. } | RoomMessage::Unsubscribe { .. } => {}
        }
    }

    /// Returns `false` once the actor should stop.
    async fn handle_message(&mut self, message: RoomMessage) -> bool {
        match message {
            RoomMessage::Submit {
                player,
                mv,
                deadline,
                response,
            } => {
                let result = if Instant::now() > deadline {
                    log::debug!("Room {}: {} from {player} expired in queue", self.room.pin, mv.kind());
                    Err(RoomError::Busy(self.room.pin.clone()))
                } else {
                    self.submit(player, mv).await
                };
                let _ = response.send(result);
                return !self.stale;
            }

            RoomMessage::Inspect { deadline, inspect } => {
                if Instant::now() > deadline {
                    inspect(Err(RoomError::Busy(self.room.pin.clone())));
                } else {
                    inspect(Ok(&self.room));
                }
            }

            RoomMessage::Subscribe {
                viewer,
                sender,
                response,
            } => {
                let id = self.next_subscriber;
                self.next_subscriber += 1;
                let _ = sender.try_send(ServerMessage::State(self.room.view_for(viewer)));
                self.subscribers.insert(id, Subscriber { viewer, sender });
                log::debug!("Room {}: subscriber {id} joined", self.room.pin);
                let _ = response.send(id);
            }

            RoomMessage::Unsubscribe { id } => {
                self.subscribers.remove(&id);
            }

            RoomMessage::Close { response } => {
                let result = self.close().await;
                let stop = result.is_ok();
                let _ = response.send(result);
                return !stop;
            }
        }
        true
    }

    /// Validate, apply, check, persist, then publish a move. Any failure
    /// leaves the in-memory room exactly as it was.
    async fn submit(&mut self, player: PlayerId, mv: Move) -> Result<MoveOutcome, RoomError> {
        let pin = self.room.pin.clone();
        match &self.room.status {
            RoomStatus::Active => {}
            RoomStatus::Unusable { reason } => {
                return Err(RoomError::Unusable {
                    pin,
                    reason: reason.clone(),
                });
            }
            RoomStatus::Finished => return Err(RoomError::Rejected(MoveError::GameOver)),
            RoomStatus::Closed => return Err(RoomError::Closed(pin)),
        }

        let mut next = self.room.game.clone();
        let applied = panic::catch_unwind(AssertUnwindSafe(|| next.apply(player, &mv)));
        let actions = match applied {
            Ok(Ok(actions)) => actions,
            Ok(Err(e)) => {
                log::debug!("Room {pin}: rejected {} from {player}: {e}", mv.kind());
                return Err(RoomError::Rejected(e));
            }
            Err(payload) => {
                let violation = InvariantViolation::Panicked(panic_message(payload.as_ref()));
                return Err(self.suspend(violation).await);
            }
        };

        if let Err(violation) = next.check_invariants() {
            return Err(self.suspend(violation).await);
        }

        let entries = self.room.history.stamp(actions, Utc::now());
        let expected_seq = self.room.history.last_seq().unwrap_or_default();
        if let Err(e) = with_store_timeout(
            self.config.store_timeout,
            self.store.commit(&pin, expected_seq, &next, &entries),
        )
        .await
        {
            self.commit_failed(player, &next, &entries, e).await?;
        }

        self.room.game = next;
        self.room.history.extend(entries.iter().cloned());
        log::debug!(
            "Room {pin}: applied {} from {player} ({} actions)",
            mv.kind(),
            entries.len()
        );
        if self.room.game.is_over() {
            match self.room.game.durak() {
                Some(durak) => log::info!("Room {pin}: game over, {durak} is the durak"),
                None => log::info!("Room {pin}: game over in a draw"),
            }
            self.finish().await;
        }

        self.broadcast(&entries);
        Ok(MoveOutcome {
            entries,
            state: project_for_player(&self.room.game, player),
        })
    }

    /// Decide what a failed commit means for the room. `Ok` when the write
    /// landed after all and the move should be adopted.
    async fn commit_failed(
        &mut self,
        player: PlayerId,
        next: &Game,
        entries: &[HistoryEntry],
        error: StoreError,
    ) -> Result<(), RoomError> {
        let pin = self.room.pin.clone();
        if !error.is_ambiguous() {
            log::warn!("Room {pin}: commit failed, move from {player} rolled back: {error}");
            return Err(RoomError::Persistence(error));
        }

        match self.reconcile(next, entries).await {
            CommitOutcome::Landed => {
                log::warn!("Room {pin}: commit reported {error} but was stored, keeping move from {player}");
                Ok(())
            }
            CommitOutcome::NotLanded => {
                log::warn!("Room {pin}: commit failed, move from {player} rolled back: {error}");
                Err(RoomError::Persistence(error))
            }
            CommitOutcome::Unknown => {
                log::error!("Room {pin}: outcome of commit unknown ({error}), reloading room from store");
                self.stale = true;
                let error = RoomError::Persistence(error);
                self.publish(|_| ServerMessage::Error(ErrorPayload::from(&error)));
                Err(error)
            }
        }
    }

    /// Read the stored room back and compare it with the states on either
    /// side of the commit.
    async fn reconcile(&self, next: &Game, entries: &[HistoryEntry]) -> CommitOutcome {
        let pin = &self.room.pin;
        let record =
            match with_store_timeout(self.config.store_timeout, self.store.load_room(pin)).await {
                Ok(record) => record,
                Err(e) => {
                    log::error!("Room {pin}: cannot read back stored state: {e}");
                    return CommitOutcome::Unknown;
                }
            };

        let stored_last = record.history.last().map(|entry| entry.seq);
        if record.game == *next && record.history.ends_with(entries) {
            CommitOutcome::Landed
        } else if record.game == self.room.game && stored_last == self.room.history.last_seq() {
            CommitOutcome::NotLanded
        } else {
            CommitOutcome::Unknown
        }
    }

    /// Archive a room whose game has ended.
    async fn finish(&mut self) {
        let pin = self.room.pin.clone();
        self.room.status = RoomStatus::Finished;
        // A room left active here is finished again when it is next resumed.
        if let Err(e) = with_store_timeout(
            self.config.store_timeout,
            self.store.set_status(&pin, &self.room.status),
        )
        .await
        {
            log::warn!("Room {pin}: failed to persist finished status: {e}");
        }
    }

    /// Take the room out of play after a broken state was detected.
    async fn suspend(&mut self, violation: InvariantViolation) -> RoomError {
        let pin = self.room.pin.clone();
        log::error!("Room {pin}: invariant violated, suspending room: {violation}");

        self.room.status = RoomStatus::Unusable {
            reason: violation.to_string(),
        };
        if let Err(e) = with_store_timeout(
            self.config.store_timeout,
            self.store.set_status(&pin, &self.room.status),
        )
        .await
        {
            log::error!("Room {pin}: failed to persist unusable status: {e}");
        }

        let error = RoomError::Invariant {
            pin,
            source: violation,
        };
        self.publish(|_| ServerMessage::Error(ErrorPayload::from(&error)));
        error
    }

    async fn close(&mut self) -> Result<(), RoomError> {
        let pin = self.room.pin.clone();
        with_store_timeout(
            self.config.store_timeout,
            self.store.set_status(&pin, &RoomStatus::Closed),
        )
        .await?;
        self.room.status = RoomStatus::Closed;
        self.subscribers.clear();
        log::info!("Room {pin} closed");
        Ok(())
    }

    fn broadcast(&mut self, entries: &[HistoryEntry]) {
        let game = &self.room.game;
        let mut subscribers = std::mem::take(&mut self.subscribers);
        Self::deliver(&self.room.pin, &mut subscribers, |viewer| {
            ServerMessage::Broadcast(ActionBroadcast {
                actions: entries.to_vec(),
                update: match viewer {
                    Some(id) => project_for_player(game, id),
                    None => project_for_spectator(game),
                },
            })
        });
        self.subscribers = subscribers;
    }

    fn publish(&mut self, message: impl Fn(Option<PlayerId>) -> ServerMessage) {
        let mut subscribers = std::mem::take(&mut self.subscribers);
        Self::deliver(&self.room.pin, &mut subscribers, message);
        self.subscribers = subscribers;
    }

    /// A full subscriber misses this message; a closed one is dropped.
    fn deliver(
        pin: &RoomPin,
        subscribers: &mut HashMap<SubscriberId, Subscriber>,
        message: impl Fn(Option<PlayerId>) -> ServerMessage,
    ) {
        subscribers.retain(|id, subscriber| {
            match subscriber.sender.try_send(message(subscriber.viewer)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    log::warn!("Room {pin}: subscriber {id} channel full, dropping broadcast");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    log::debug!("Room {pin}: subscriber {id} disconnected, removing");
                    false
                }
            }
        });
    }
}
