//! Room manager for starting, resuming and addressing room actors.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, mpsc, oneshot};

use super::{
    actor::{Room, RoomActor, RoomHandle},
    config::RoomConfig,
    errors::{RoomError, RoomResult},
    messages::{MoveOutcome, RoomMessage, SubscriberId},
};
use crate::{
    db::{RoomPin, RoomRecord, RoomStatus, RoomStore, StoreError, timeouts::with_store_timeout},
    game::{Game, GameSettings, MoveError, OpaqueState, PlayerId, RosterEntry, moves::Move},
    history::{Action, History, HistoryEntry, replay},
    net::{MoveRequest, ServerMessage},
};

/// Attempts at drawing an unused pin before giving up.
const PIN_ATTEMPTS: usize = 16;

/// Request to deal a new game into a room.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRoom {
    /// Lobby pin. A random free pin is drawn when absent.
    #[serde(default)]
    pub pin: Option<RoomPin>,
    #[serde(default)]
    pub settings: GameSettings,
    pub roster: Vec<RosterEntry>,
    /// Shuffle seed. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Room manager for managing multiple room actors
#[derive(Clone)]
pub struct RoomManager {
    store: Arc<dyn RoomStore>,
    config: RoomConfig,

    /// Handles of loaded rooms
    rooms: Arc<RwLock<HashMap<RoomPin, RoomHandle>>>,
}

fn not_found(pin: &RoomPin, error: StoreError) -> RoomError {
    match error {
        StoreError::NotFound(_) => RoomError::NotFound(pin.clone()),
        other => RoomError::Persistence(other),
    }
}

impl RoomManager {
    pub fn new(store: Arc<dyn RoomStore>, config: RoomConfig) -> Self {
        Self {
            store,
            config,
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Deal a new game, persist it and spawn its actor.
    pub async fn start_room(&self, request: StartRoom) -> RoomResult<RoomPin> {
        let StartRoom {
            pin,
            settings,
            roster,
            seed,
        } = request;
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        let game = Game::deal_seeded(settings.clone(), &roster, seed)?;

        let mut history = History::new();
        history.append(
            vec![Action::Start {
                seed,
                settings: settings.clone(),
                roster: roster.clone(),
            }],
            Utc::now(),
        );

        let attempts = if pin.is_some() { 1 } else { PIN_ATTEMPTS };
        let mut last_error = None;
        for _ in 0..attempts {
            let candidate = pin.clone().unwrap_or_else(|| RoomPin::random(&mut rand::rng()));
            let record = RoomRecord {
                pin: candidate.clone(),
                settings: settings.clone(),
                roster: roster.clone(),
                game: game.clone(),
                history: history.entries().to_vec(),
                status: RoomStatus::Active,
            };

            match with_store_timeout(self.config.store_timeout, self.store.create_room(&record))
                .await
            {
                Ok(()) => {
                    let room = Room::new(candidate.clone(), game, history, RoomStatus::Active);
                    self.spawn(room).await;
                    log::info!(
                        "Room {candidate} started with {} players (seed {seed})",
                        roster.len()
                    );
                    return Ok(candidate);
                }
                Err(e @ StoreError::AlreadyExists(_)) => last_error = Some(e),
                Err(e) => return Err(RoomError::Persistence(e)),
            }
        }

        Err(RoomError::Persistence(last_error.unwrap_or_else(|| {
            StoreError::Unavailable("no free room pin".to_string())
        })))
    }

    /// Load a stored room and spawn its actor.
    ///
    /// The history is replayed and must reproduce the stored game exactly;
    /// otherwise the room is loaded unusable. A room whose game ended but
    /// was still stored active is marked finished.
    pub async fn resume_room(&self, pin: &RoomPin) -> RoomResult<RoomHandle> {
        let record = with_store_timeout(self.config.store_timeout, self.store.load_room(pin))
            .await
            .map_err(|e| not_found(pin, e))?;

        let mut status = record.status.clone();
        if status == RoomStatus::Closed {
            return Err(RoomError::Closed(pin.clone()));
        }

        if status.is_active() && record.game.is_over() {
            log::info!("Room {pin}: game already over, marking finished");
            status = RoomStatus::Finished;
            if let Err(e) =
                with_store_timeout(self.config.store_timeout, self.store.set_status(pin, &status))
                    .await
            {
                log::warn!("Room {pin}: failed to persist finished status: {e}");
            }
        }

        if matches!(status, RoomStatus::Active | RoomStatus::Finished) {
            let reason = match replay(&record.history) {
                Ok(game) if game == record.game => None,
                Ok(_) => Some("replayed history does not match stored state".to_string()),
                Err(e) => Some(format!("history cannot be replayed: {e}")),
            };
            if let Some(reason) = reason {
                log::error!("Room {pin} loaded unusable: {reason}");
                status = RoomStatus::Unusable { reason };
                if let Err(e) =
                    with_store_timeout(self.config.store_timeout, self.store.set_status(pin, &status))
                        .await
                {
                    log::error!("Room {pin}: failed to persist unusable status: {e}");
                }
            }
        }

        let room = Room::new(
            pin.clone(),
            record.game,
            History::from_entries(record.history),
            status,
        );
        Ok(self.spawn(room).await)
    }

    /// Resume every active room in the store. Returns how many were loaded.
    pub async fn resume_all(&self) -> RoomResult<usize> {
        let pins = with_store_timeout(self.config.store_timeout, self.store.list_active()).await?;
        let mut loaded = 0;
        for pin in pins {
            match self.resume_room(&pin).await {
                Ok(_) => loaded += 1,
                Err(e) => log::warn!("Room {pin} could not be resumed: {e}"),
            }
        }
        log::info!("Resumed {loaded} rooms");
        Ok(loaded)
    }

    /// Spawn an actor for `room`, unless another task already loaded it.
    async fn spawn(&self, room: Room) -> RoomHandle {
        let mut rooms = self.rooms.write().await;
        if let Some(existing) = rooms.get(room.pin()).filter(|handle| !handle.is_closed()) {
            return existing.clone();
        }

        let pin = room.pin().clone();
        let (actor, handle) = RoomActor::new(room, self.config.clone(), self.store.clone());
        rooms.insert(pin, handle.clone());
        drop(rooms);

        tokio::spawn(async move {
            actor.run().await;
        });
        handle
    }

    /// Handle of a loaded room, resuming it from the store if needed.
    pub async fn handle(&self, pin: &RoomPin) -> RoomResult<RoomHandle> {
        {
            let rooms = self.rooms.read().await;
            if let Some(handle) = rooms.get(pin).filter(|handle| !handle.is_closed()) {
                return Ok(handle.clone());
            }
        }
        self.resume_room(pin).await
    }

    /// Apply `mv` for `player` in room `pin`.
    pub async fn submit_move(
        &self,
        pin: &RoomPin,
        player: PlayerId,
        mv: Move,
    ) -> RoomResult<MoveOutcome> {
        let handle = self.handle(pin).await?;
        let (response, rx) = oneshot::channel();
        handle
            .send(RoomMessage::Submit {
                player,
                mv,
                deadline: handle.deadline(),
                response,
            })
            .await?;
        rx.await.map_err(|_| RoomError::Closed(pin.clone()))?
    }

    pub async fn handle_request(&self, request: MoveRequest) -> RoomResult<MoveOutcome> {
        self.submit_move(&request.room_pin, request.player_id, request.mv)
            .await
    }

    /// Run `f` on the room inside its actor, excluded from all mutations.
    pub async fn with_room<F, T>(&self, pin: &RoomPin, f: F) -> RoomResult<T>
    where
        F: FnOnce(&Room) -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.handle(pin).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::Inspect {
                deadline: handle.deadline(),
                inspect: Box::new(move |room: Result<&Room, RoomError>| {
                    let _ = tx.send(room.map(f));
                }),
            })
            .await?;
        rx.await.map_err(|_| RoomError::Closed(pin.clone()))?
    }

    /// State as seen by a seated player.
    pub async fn player_view(&self, pin: &RoomPin, player: PlayerId) -> RoomResult<OpaqueState> {
        self.with_room(pin, move |room| {
            room.game()
                .player(player)
                .map(|_| room.view_for(Some(player)))
        })
        .await?
        .ok_or(RoomError::Rejected(MoveError::UnknownPlayer { player }))
    }

    pub async fn spectator_view(&self, pin: &RoomPin) -> RoomResult<OpaqueState> {
        self.with_room(pin, |room| room.view_for(None)).await
    }

    /// History entries after `since`, or all of them.
    pub async fn history_since(
        &self,
        pin: &RoomPin,
        since: Option<u64>,
    ) -> RoomResult<Vec<HistoryEntry>> {
        self.with_room(pin, move |room| room.history().since(since).to_vec())
            .await
    }

    pub async fn status(&self, pin: &RoomPin) -> RoomResult<RoomStatus> {
        self.with_room(pin, |room| room.status().clone()).await
    }

    /// Receive the current state, then every broadcast of room `pin`.
    pub async fn subscribe(
        &self,
        pin: &RoomPin,
        viewer: Option<PlayerId>,
    ) -> RoomResult<(SubscriberId, mpsc::Receiver<ServerMessage>)> {
        let handle = self.handle(pin).await?;
        let (sender, receiver) = mpsc::channel(self.config.subscriber_capacity);
        let (response, rx) = oneshot::channel();
        handle
            .send(RoomMessage::Subscribe {
                viewer,
                sender,
                response,
            })
            .await?;
        let id = rx.await.map_err(|_| RoomError::Closed(pin.clone()))?;
        Ok((id, receiver))
    }

    pub async fn unsubscribe(&self, pin: &RoomPin, id: SubscriberId) {
        let handle = self.rooms.read().await.get(pin).cloned();
        if let Some(handle) = handle {
            // A stopped room has no subscribers left to remove.
            let _ = handle.send(RoomMessage::Unsubscribe { id }).await;
        }
    }

    /// Mark a room closed and stop its actor.
    pub async fn close_room(&self, pin: &RoomPin) -> RoomResult<()> {
        let handle = self.handle(pin).await?;
        let (response, rx) = oneshot::channel();
        handle.send(RoomMessage::Close { response }).await?;
        rx.await.map_err(|_| RoomError::Closed(pin.clone()))??;

        self.rooms.write().await.remove(pin);
        Ok(())
    }

    /// Loaded rooms whose actors are still running.
    pub async fn active_room_count(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, handle| !handle.is_closed());
        rooms.len()
    }
}
