use std::collections::BTreeSet;
use std::time::Duration;

use rusqlite::Connection;

use platerank_core::{
    clock::Timestamp,
    ids::*,
    value::{Rank, RankingValue, TasteStatus},
};

use crate::error::StorageError;
use crate::traits::{DishStatRecord, HistoryRecord, RankingRecord, RankingStore};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

/// Map SQLITE_BUSY/SQLITE_LOCKED to the dedicated `Busy` variant so the
/// engine can distinguish a bounded lock-wait timeout from a real failure.
pub fn map_busy(e: rusqlite::Error) -> StorageError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::DatabaseBusy
                || err.code == rusqlite::ErrorCode::DatabaseLocked =>
        {
            StorageError::Busy(e.to_string())
        }
        _ => StorageError::Sqlite(e),
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Bound how long a writer waits for the database lock before the
    /// call fails with `Busy`.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), StorageError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Take the write lock up front so the whole check-then-act sequence
    /// of a submission is serialized against other writers.
    pub fn begin_immediate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(map_busy)
    }

    pub fn commit(&self) -> Result<(), StorageError> {
        self.conn.execute_batch("COMMIT").map_err(map_busy)
    }

    pub fn rollback(&self) -> Result<(), StorageError> {
        self.conn.execute_batch("ROLLBACK").map_err(map_busy)
    }
}

fn encode_photo_refs(photo_refs: &[String]) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(photo_refs).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_photo_refs(bytes: &[u8]) -> Result<Vec<String>, StorageError> {
    rmp_serde::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_value(
    rank: Option<i64>,
    taste_status: Option<String>,
) -> Result<RankingValue, StorageError> {
    match (rank, taste_status) {
        (Some(rank), None) => {
            let rank = Rank::new(rank as u8)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            Ok(RankingValue::Numeric(rank))
        }
        (None, Some(status)) => Ok(RankingValue::Status(TasteStatus::parse(&status)?)),
        (rank, status) => Err(StorageError::Serialization(format!(
            "ranking value must be exactly one of rank/taste_status, got ({rank:?}, {status:?})"
        ))),
    }
}

fn rank_column(value: &RankingValue) -> Option<i64> {
    value.rank().map(|r| i64::from(r.get()))
}

fn taste_column(value: &RankingValue) -> Option<&'static str> {
    value.taste_status().map(|s| s.as_str())
}

const RANKING_COLUMNS: &str = "ranking_id, user_id, dish_id, restaurant_id, dish_type, \
     rank, taste_status, notes, photo_refs, created_ms, created_seq, updated_ms, updated_seq";

fn read_ranking(row: &rusqlite::Row) -> Result<RankingRecord, StorageError> {
    let ranking_id_bytes: Vec<u8> = row.get(0)?;
    let user_id_bytes: Vec<u8> = row.get(1)?;
    let dish_id_bytes: Vec<u8> = row.get(2)?;
    let restaurant_id_bytes: Vec<u8> = row.get(3)?;
    let dish_type: String = row.get(4)?;
    let rank: Option<i64> = row.get(5)?;
    let taste_status: Option<String> = row.get(6)?;
    let notes: String = row.get(7)?;
    let photo_refs_bytes: Vec<u8> = row.get(8)?;
    let created_ms: i64 = row.get(9)?;
    let created_seq: i64 = row.get(10)?;
    let updated_ms: i64 = row.get(11)?;
    let updated_seq: i64 = row.get(12)?;

    Ok(RankingRecord {
        ranking_id: RankingId::from_bytes(to_array::<16>(ranking_id_bytes, "ranking_id")?),
        user_id: UserId::from_bytes(to_array::<16>(user_id_bytes, "user_id")?),
        dish_id: DishId::from_bytes(to_array::<16>(dish_id_bytes, "dish_id")?),
        restaurant_id: RestaurantId::from_bytes(to_array::<16>(
            restaurant_id_bytes,
            "restaurant_id",
        )?),
        dish_type,
        value: decode_value(rank, taste_status)?,
        notes,
        photo_refs: decode_photo_refs(&photo_refs_bytes)?,
        created_at: Timestamp::new(created_ms as u64, created_seq as u32),
        updated_at: Timestamp::new(updated_ms as u64, updated_seq as u32),
    })
}

const HISTORY_COLUMNS: &str = "entry_id, ranking_id, user_id, dish_id, restaurant_id, \
     dish_type, previous_rank, previous_taste_status, new_rank, new_taste_status, \
     notes, photo_refs, created_ms, created_seq";

fn read_history(row: &rusqlite::Row) -> Result<HistoryRecord, StorageError> {
    let entry_id_bytes: Vec<u8> = row.get(0)?;
    let ranking_id_bytes: Vec<u8> = row.get(1)?;
    let user_id_bytes: Vec<u8> = row.get(2)?;
    let dish_id_bytes: Vec<u8> = row.get(3)?;
    let restaurant_id_bytes: Vec<u8> = row.get(4)?;
    let dish_type: String = row.get(5)?;
    let previous_rank: Option<i64> = row.get(6)?;
    let previous_taste_status: Option<String> = row.get(7)?;
    let new_rank: Option<i64> = row.get(8)?;
    let new_taste_status: Option<String> = row.get(9)?;
    let notes: String = row.get(10)?;
    let photo_refs_bytes: Vec<u8> = row.get(11)?;
    let created_ms: i64 = row.get(12)?;
    let created_seq: i64 = row.get(13)?;

    let previous = match (previous_rank, previous_taste_status) {
        (None, None) => None,
        (rank, status) => Some(decode_value(rank, status)?),
    };

    Ok(HistoryRecord {
        entry_id: HistoryEntryId::from_bytes(to_array::<16>(entry_id_bytes, "entry_id")?),
        ranking_id: RankingId::from_bytes(to_array::<16>(ranking_id_bytes, "ranking_id")?),
        user_id: UserId::from_bytes(to_array::<16>(user_id_bytes, "user_id")?),
        dish_id: DishId::from_bytes(to_array::<16>(dish_id_bytes, "dish_id")?),
        restaurant_id: RestaurantId::from_bytes(to_array::<16>(
            restaurant_id_bytes,
            "restaurant_id",
        )?),
        dish_type,
        previous,
        new: decode_value(new_rank, new_taste_status)?,
        notes,
        photo_refs: decode_photo_refs(&photo_refs_bytes)?,
        created_at: Timestamp::new(created_ms as u64, created_seq as u32),
    })
}

/// Tunnel a StorageError through rusqlite's error system inside query_map
/// closures that must return rusqlite::Error.
fn tunnel(e: StorageError) -> rusqlite::Error {
    match e {
        StorageError::Sqlite(sq) => sq,
        other => rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Blob,
            Box::new(OpaqueStorageError(other.to_string())),
        ),
    }
}

impl SqliteStore {
    fn identity_exists(&self, kind: &str, ref_id: &[u8]) -> Result<bool, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM identity_refs WHERE ref_id = ?1 AND kind = ?2",
            rusqlite::params![ref_id, kind],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn register_identity(&mut self, kind: &str, ref_id: &[u8]) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO identity_refs (ref_id, kind) VALUES (?1, ?2)",
            rusqlite::params![ref_id, kind],
        )?;
        Ok(())
    }
}

impl RankingStore for SqliteStore {
    fn register_user(&mut self, user_id: UserId) -> Result<(), StorageError> {
        self.register_identity("user", user_id.as_bytes().as_slice())
    }

    fn register_dish(&mut self, dish_id: DishId) -> Result<(), StorageError> {
        self.register_identity("dish", dish_id.as_bytes().as_slice())
    }

    fn register_restaurant(&mut self, restaurant_id: RestaurantId) -> Result<(), StorageError> {
        self.register_identity("restaurant", restaurant_id.as_bytes().as_slice())
    }

    fn user_exists(&self, user_id: UserId) -> Result<bool, StorageError> {
        self.identity_exists("user", user_id.as_bytes().as_slice())
    }

    fn dish_exists(&self, dish_id: DishId) -> Result<bool, StorageError> {
        self.identity_exists("dish", dish_id.as_bytes().as_slice())
    }

    fn restaurant_exists(&self, restaurant_id: RestaurantId) -> Result<bool, StorageError> {
        self.identity_exists("restaurant", restaurant_id.as_bytes().as_slice())
    }

    fn get_ranking(
        &self,
        user_id: UserId,
        dish_id: DishId,
        restaurant_id: RestaurantId,
    ) -> Result<Option<RankingRecord>, StorageError> {
        let sql = format!(
            "SELECT {RANKING_COLUMNS} FROM rankings \
             WHERE user_id = ?1 AND dish_id = ?2 AND restaurant_id = ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(
            rusqlite::params![
                user_id.as_bytes().as_slice(),
                dish_id.as_bytes().as_slice(),
                restaurant_id.as_bytes().as_slice(),
            ],
            |row| read_ranking(row).map_err(tunnel),
        )?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(StorageError::Sqlite(e)),
            None => Ok(None),
        }
    }

    fn get_ranking_by_id(
        &self,
        ranking_id: RankingId,
    ) -> Result<Option<RankingRecord>, StorageError> {
        let sql = format!("SELECT {RANKING_COLUMNS} FROM rankings WHERE ranking_id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(
            rusqlite::params![ranking_id.as_bytes().as_slice()],
            |row| read_ranking(row).map_err(tunnel),
        )?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(StorageError::Sqlite(e)),
            None => Ok(None),
        }
    }

    fn find_best_in_bucket(
        &self,
        user_id: UserId,
        restaurant_id: RestaurantId,
        dish_type: &str,
        exclude: Option<RankingId>,
    ) -> Result<Option<RankingRecord>, StorageError> {
        let sql = format!(
            "SELECT {RANKING_COLUMNS} FROM rankings \
             WHERE user_id = ?1 AND restaurant_id = ?2 AND dish_type = ?3 AND rank = 1 \
             AND (?4 IS NULL OR ranking_id != ?4)"
        );
        let exclude_bytes = exclude.map(|id| id.as_bytes().to_vec());
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(
            rusqlite::params![
                user_id.as_bytes().as_slice(),
                restaurant_id.as_bytes().as_slice(),
                dish_type,
                exclude_bytes,
            ],
            |row| read_ranking(row).map_err(tunnel),
        )?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(StorageError::Sqlite(e)),
            None => Ok(None),
        }
    }

    fn count_best_in_bucket(
        &self,
        user_id: UserId,
        restaurant_id: RestaurantId,
        dish_type: &str,
    ) -> Result<u64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM rankings \
             WHERE user_id = ?1 AND restaurant_id = ?2 AND dish_type = ?3 AND rank = 1",
            rusqlite::params![
                user_id.as_bytes().as_slice(),
                restaurant_id.as_bytes().as_slice(),
                dish_type,
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn insert_ranking(&mut self, record: &RankingRecord) -> Result<(), StorageError> {
        let result = self.conn.execute(
            "INSERT INTO rankings (ranking_id, user_id, dish_id, restaurant_id, dish_type, \
             rank, taste_status, notes, photo_refs, created_ms, created_seq, updated_ms, updated_seq) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                record.ranking_id.as_bytes().as_slice(),
                record.user_id.as_bytes().as_slice(),
                record.dish_id.as_bytes().as_slice(),
                record.restaurant_id.as_bytes().as_slice(),
                record.dish_type,
                rank_column(&record.value),
                taste_column(&record.value),
                record.notes,
                encode_photo_refs(&record.photo_refs)?,
                record.created_at.wall_ms() as i64,
                i64::from(record.created_at.seq()),
                record.updated_at.wall_ms() as i64,
                i64::from(record.updated_at.seq()),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(
                    msg.unwrap_or_else(|| "rankings insert".into()),
                ))
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    fn update_ranking(&mut self, record: &RankingRecord) -> Result<(), StorageError> {
        let result = self.conn.execute(
            "UPDATE rankings SET dish_type = ?2, rank = ?3, taste_status = ?4, notes = ?5, \
             photo_refs = ?6, updated_ms = ?7, updated_seq = ?8 WHERE ranking_id = ?1",
            rusqlite::params![
                record.ranking_id.as_bytes().as_slice(),
                record.dish_type,
                rank_column(&record.value),
                taste_column(&record.value),
                record.notes,
                encode_photo_refs(&record.photo_refs)?,
                record.updated_at.wall_ms() as i64,
                i64::from(record.updated_at.seq()),
            ],
        );
        match result {
            Ok(0) => Err(StorageError::NotFound(record.ranking_id.to_string())),
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(
                    msg.unwrap_or_else(|| "rankings update".into()),
                ))
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    fn demote_ranking(
        &mut self,
        ranking_id: RankingId,
        to: Rank,
        updated_at: Timestamp,
    ) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE rankings SET rank = ?2, taste_status = NULL, updated_ms = ?3, updated_seq = ?4 \
             WHERE ranking_id = ?1",
            rusqlite::params![
                ranking_id.as_bytes().as_slice(),
                i64::from(to.get()),
                updated_at.wall_ms() as i64,
                i64::from(updated_at.seq()),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(ranking_id.to_string()));
        }
        Ok(())
    }

    fn ranking_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM rankings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn append_history(&mut self, entry: &HistoryRecord) -> Result<(), StorageError> {
        let previous_rank = entry.previous.as_ref().and_then(rank_column);
        let previous_taste = entry.previous.as_ref().and_then(taste_column);
        self.conn.execute(
            "INSERT INTO ranking_history (entry_id, ranking_id, user_id, dish_id, restaurant_id, \
             dish_type, previous_rank, previous_taste_status, new_rank, new_taste_status, \
             notes, photo_refs, created_ms, created_seq) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            rusqlite::params![
                entry.entry_id.as_bytes().as_slice(),
                entry.ranking_id.as_bytes().as_slice(),
                entry.user_id.as_bytes().as_slice(),
                entry.dish_id.as_bytes().as_slice(),
                entry.restaurant_id.as_bytes().as_slice(),
                entry.dish_type,
                previous_rank,
                previous_taste,
                rank_column(&entry.new),
                taste_column(&entry.new),
                entry.notes,
                encode_photo_refs(&entry.photo_refs)?,
                entry.created_at.wall_ms() as i64,
                i64::from(entry.created_at.seq()),
            ],
        )?;
        Ok(())
    }

    fn get_history(&self, ranking_id: RankingId) -> Result<Vec<HistoryRecord>, StorageError> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM ranking_history WHERE ranking_id = ?1 \
             ORDER BY created_ms, created_seq, rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(rusqlite::params![ranking_id.as_bytes().as_slice()], |row| {
                read_history(row).map_err(tunnel)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn history_count(&self) -> Result<u64, StorageError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM ranking_history", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn get_rankings_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RankingRecord>, StorageError> {
        let sql = format!(
            "SELECT {RANKING_COLUMNS} FROM rankings WHERE user_id = ?1 \
             ORDER BY updated_ms DESC, updated_seq DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rankings = stmt
            .query_map(rusqlite::params![user_id.as_bytes().as_slice()], |row| {
                read_ranking(row).map_err(tunnel)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rankings)
    }

    fn get_rankings_for_dish(
        &self,
        dish_id: DishId,
    ) -> Result<Vec<RankingRecord>, StorageError> {
        let sql = format!(
            "SELECT {RANKING_COLUMNS} FROM rankings WHERE dish_id = ?1 \
             ORDER BY updated_ms DESC, updated_seq DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rankings = stmt
            .query_map(rusqlite::params![dish_id.as_bytes().as_slice()], |row| {
                read_ranking(row).map_err(tunnel)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rankings)
    }

    fn get_dish_stat(
        &self,
        user_id: UserId,
        dish_id: DishId,
    ) -> Result<DishStatRecord, StorageError> {
        let sql = format!(
            "SELECT {RANKING_COLUMNS} FROM rankings WHERE user_id = ?1 AND dish_id = ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rankings = stmt
            .query_map(
                rusqlite::params![user_id.as_bytes().as_slice(), dish_id.as_bytes().as_slice()],
                |row| read_ranking(row).map_err(tunnel),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut restaurants = BTreeSet::new();
        let mut stat = DishStatRecord::default();
        for ranking in &rankings {
            restaurants.insert(ranking.restaurant_id);
            stat.first_ranked_at = match stat.first_ranked_at {
                Some(first) if first <= ranking.created_at => Some(first),
                _ => Some(ranking.created_at),
            };
            stat.last_ranked_at = match stat.last_ranked_at {
                Some(last) if last >= ranking.updated_at => Some(last),
                _ => Some(ranking.updated_at),
            };
        }
        stat.total_rankings = rankings.len() as u64;
        stat.total_restaurants_ranked = restaurants.len() as u64;
        Ok(stat)
    }
}

/// Wrapper error type used to tunnel StorageError through rusqlite's error
/// system in query_map closures that must return rusqlite::Error.
#[derive(Debug)]
struct OpaqueStorageError(String);

impl std::fmt::Display for OpaqueStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for OpaqueStorageError {}
