//! In-process [`RoomStore`] for tests and database-less deployments.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::RwLock;

use super::{
    errors::{StoreError, StoreResult},
    models::{RoomPin, RoomRecord, RoomStatus},
    repository::RoomStore,
};
use crate::{game::Game, history::HistoryEntry};

/// Rooms kept in a map behind an async lock.
///
/// Commits can be made to fail or stall on demand to exercise the room
/// actors' rollback and timeout paths. A stall can happen before the write
/// or after it; the latter reports a timeout for a commit that landed.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    rooms: Arc<RwLock<HashMap<RoomPin, RoomRecord>>>,
    fail_commits: Arc<AtomicBool>,
    commit_delay_ms: Arc<AtomicU64>,
    commit_stall_ms: Arc<AtomicU64>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following commit fail until switched off again.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Delay every following commit by `delay`.
    pub fn delay_commits(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.commit_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Write every following commit, then hold the caller for `stall` before
    /// answering.
    pub fn stall_after_commits(&self, stall: Duration) {
        let millis = u64::try_from(stall.as_millis()).unwrap_or(u64::MAX);
        self.commit_stall_ms.store(millis, Ordering::SeqCst);
    }

    /// Snapshot of a stored record, bypassing the trait.
    pub async fn record(&self, pin: &RoomPin) -> Option<RoomRecord> {
        self.rooms.read().await.get(pin).cloned()
    }

    /// Overwrite a stored record directly.
    pub async fn put(&self, record: RoomRecord) {
        self.rooms.write().await.insert(record.pin.clone(), record);
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn create_room(&self, record: &RoomRecord) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&record.pin) {
            return Err(StoreError::AlreadyExists(record.pin.clone()));
        }
        rooms.insert(record.pin.clone(), record.clone());
        Ok(())
    }

    async fn load_room(&self, pin: &RoomPin) -> StoreResult<RoomRecord> {
        self.rooms
            .read()
            .await
            .get(pin)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(pin.clone()))
    }

    async fn commit(
        &self,
        pin: &RoomPin,
        expected_seq: u64,
        game: &Game,
        entries: &[HistoryEntry],
    ) -> StoreResult<()> {
        let delay = self.commit_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit failure injected".to_string()));
        }

        {
            let mut rooms = self.rooms.write().await;
            let record = rooms
                .get_mut(pin)
                .ok_or_else(|| StoreError::NotFound(pin.clone()))?;
            if record.history.last().map(|entry| entry.seq) != Some(expected_seq) {
                return Err(StoreError::Conflict {
                    pin: pin.clone(),
                    expected: expected_seq,
                });
            }
            record.game = game.clone();
            record.history.extend_from_slice(entries);
        }

        let stall = self.commit_stall_ms.load(Ordering::SeqCst);
        if stall > 0 {
            tokio::time::sleep(Duration::from_millis(stall)).await;
        }
        Ok(())
    }

    async fn set_status(&self, pin: &RoomPin, status: &RoomStatus) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        let record = rooms
            .get_mut(pin)
            .ok_or_else(|| StoreError::NotFound(pin.clone()))?;
        record.status = status.clone();
        Ok(())
    }

    async fn list_active(&self) -> StoreResult<Vec<RoomPin>> {
        let rooms = self.rooms.read().await;
        let mut pins: Vec<RoomPin> = rooms
            .values()
            .filter(|record| record.status.is_active())
            .map(|record| record.pin.clone())
            .collect();
        pins.sort();
        Ok(pins)
    }
}
