//! Room persistence behind a trait, so room actors can run against
//! PostgreSQL in production and an in-memory store in tests.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, types::Json};

use super::{
    errors::{StoreError, StoreResult},
    models::{RoomPin, RoomRecord, RoomStatus},
    timeouts::{
        DEFAULT_QUERY_TIMEOUT, DEFAULT_TRANSACTION_TIMEOUT, LONG_OPERATION_TIMEOUT, with_timeout,
    },
};
use crate::{
    game::{Game, GameSettings, RosterEntry},
    history::HistoryEntry,
};

const SCHEMA: &str = include_str!("../../migrations/0001_rooms.sql");

#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Store a freshly started room. Fails if the pin is taken.
    async fn create_room(&self, record: &RoomRecord) -> StoreResult<()>;

    async fn load_room(&self, pin: &RoomPin) -> StoreResult<RoomRecord>;

    /// Atomically replace the room's game state and append `entries` to its
    /// history.
    ///
    /// `expected_seq` is the seq of the last entry the caller knows to be
    /// stored. If the stored history ends anywhere else nothing is written
    /// and [`StoreError::Conflict`] is returned.
    async fn commit(
        &self,
        pin: &RoomPin,
        expected_seq: u64,
        game: &Game,
        entries: &[HistoryEntry],
    ) -> StoreResult<()>;

    async fn set_status(&self, pin: &RoomPin, status: &RoomStatus) -> StoreResult<()>;

    /// Pins of every room still marked active.
    async fn list_active(&self) -> StoreResult<Vec<RoomPin>>;
}

/// PostgreSQL implementation of [`RoomStore`]. State, settings and history
/// entries are stored as JSONB.
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the room tables if they don't exist yet.
    pub async fn migrate(&self) -> StoreResult<()> {
        with_timeout(
            LONG_OPERATION_TIMEOUT,
            sqlx::raw_sql(SCHEMA).execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn insert_entries(
        tx: &mut Transaction<'_, Postgres>,
        pin: &RoomPin,
        entries: &[HistoryEntry],
    ) -> Result<(), sqlx::Error> {
        for entry in entries {
            sqlx::query(
                "INSERT INTO room_history (pin, seq, batch, entry, occurred_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(pin.as_str())
            .bind(entry.seq as i64)
            .bind(entry.batch as i64)
            .bind(Json(entry))
            .bind(entry.occurred_at)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn create_room(&self, record: &RoomRecord) -> StoreResult<()> {
        let exists = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query("SELECT 1 FROM rooms WHERE pin = $1")
                .bind(record.pin.as_str())
                .fetch_optional(&self.pool),
        )
        .await?;
        if exists.is_some() {
            return Err(StoreError::AlreadyExists(record.pin.clone()));
        }

        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                "INSERT INTO rooms (pin, settings, roster, game, status, last_seq)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(record.pin.as_str())
            .bind(Json(&record.settings))
            .bind(Json(&record.roster))
            .bind(Json(&record.game))
            .bind(Json(&record.status))
            .bind(record.history.last().map_or(0, |entry| entry.seq as i64))
            .execute(&mut *tx)
            .await?;
            Self::insert_entries(&mut tx, &record.pin, &record.history).await?;
            tx.commit().await
        })
        .await?;
        Ok(())
    }

    async fn load_room(&self, pin: &RoomPin) -> StoreResult<RoomRecord> {
        let row = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query("SELECT settings, roster, game, status FROM rooms WHERE pin = $1")
                .bind(pin.as_str())
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| StoreError::NotFound(pin.clone()))?;

        let history = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query("SELECT entry FROM room_history WHERE pin = $1 ORDER BY seq")
                .bind(pin.as_str())
                .fetch_all(&self.pool),
        )
        .await?
        .into_iter()
        .map(|row| row.try_get::<Json<HistoryEntry>, _>("entry").map(|json| json.0))
        .collect::<Result<Vec<_>, _>>()?;

        Ok(RoomRecord {
            pin: pin.clone(),
            settings: row.try_get::<Json<GameSettings>, _>("settings")?.0,
            roster: row.try_get::<Json<Vec<RosterEntry>>, _>("roster")?.0,
            game: row.try_get::<Json<Game>, _>("game")?.0,
            history,
            status: row.try_get::<Json<RoomStatus>, _>("status")?.0,
        })
    }

    async fn commit(
        &self,
        pin: &RoomPin,
        expected_seq: u64,
        game: &Game,
        entries: &[HistoryEntry],
    ) -> StoreResult<()> {
        let last_seq = entries.last().map_or(expected_seq, |entry| entry.seq);
        // None when written, otherwise whether the room exists at all.
        let missed = with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.pool.begin().await?;
            let result = sqlx::query(
                "UPDATE rooms SET game = $2, last_seq = $3, updated_at = NOW()
                 WHERE pin = $1 AND last_seq = $4",
            )
            .bind(pin.as_str())
            .bind(Json(game))
            .bind(last_seq as i64)
            .bind(expected_seq as i64)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                let exists = sqlx::query("SELECT 1 FROM rooms WHERE pin = $1")
                    .bind(pin.as_str())
                    .fetch_optional(&mut *tx)
                    .await?
                    .is_some();
                tx.rollback().await?;
                return Ok(Some(exists));
            }
            Self::insert_entries(&mut tx, pin, entries).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(None)
        })
        .await?;

        match missed {
            None => Ok(()),
            Some(true) => Err(StoreError::Conflict {
                pin: pin.clone(),
                expected: expected_seq,
            }),
            Some(false) => Err(StoreError::NotFound(pin.clone())),
        }
    }

    async fn set_status(&self, pin: &RoomPin, status: &RoomStatus) -> StoreResult<()> {
        let result = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query("UPDATE rooms SET status = $2, updated_at = NOW() WHERE pin = $1")
                .bind(pin.as_str())
                .bind(Json(status))
                .execute(&self.pool),
        )
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(pin.clone()));
        }
        Ok(())
    }

    async fn list_active(&self) -> StoreResult<Vec<RoomPin>> {
        let rows = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query("SELECT pin FROM rooms WHERE status->>'status' = 'active' ORDER BY pin")
                .fetch_all(&self.pool),
        )
        .await?;

        let mut pins = Vec::with_capacity(rows.len());
        for row in rows {
            let pin: String = row.try_get("pin")?;
            match RoomPin::parse(&pin) {
                Ok(pin) => pins.push(pin),
                Err(e) => log::warn!("Skipping stored room with bad pin: {e}"),
            }
        }
        Ok(pins)
    }
}
