use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

// Invariant enforcement beyond column CHECKs lives in the engine, not in
// triggers; the one-best partial index is a backstop for the demotion
// algorithm, not a substitute for it.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS identity_refs (
    ref_id BLOB NOT NULL CHECK (length(ref_id) = 16),
    kind TEXT NOT NULL CHECK (kind IN ('user', 'dish', 'restaurant')),
    registered_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER)),
    PRIMARY KEY (ref_id, kind)
);

CREATE TABLE IF NOT EXISTS rankings (
    ranking_id BLOB PRIMARY KEY CHECK (length(ranking_id) = 16),
    user_id BLOB NOT NULL CHECK (length(user_id) = 16),
    dish_id BLOB NOT NULL CHECK (length(dish_id) = 16),
    restaurant_id BLOB NOT NULL CHECK (length(restaurant_id) = 16),
    dish_type TEXT NOT NULL CHECK (length(trim(dish_type)) > 0),
    rank INTEGER CHECK (rank BETWEEN 1 AND 5),
    taste_status TEXT CHECK (taste_status IN ('acceptable', 'second_chance', 'dissatisfied')),
    notes TEXT NOT NULL CHECK (length(trim(notes)) > 0),
    photo_refs BLOB NOT NULL,
    created_ms INTEGER NOT NULL,
    created_seq INTEGER NOT NULL,
    updated_ms INTEGER NOT NULL,
    updated_seq INTEGER NOT NULL,
    CHECK ((rank IS NULL) != (taste_status IS NULL)),
    UNIQUE (user_id, dish_id, restaurant_id)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_rankings_one_best
    ON rankings (user_id, restaurant_id, dish_type) WHERE rank = 1;
CREATE INDEX IF NOT EXISTS idx_rankings_user ON rankings (user_id, updated_ms, updated_seq);
CREATE INDEX IF NOT EXISTS idx_rankings_dish ON rankings (dish_id);

CREATE TABLE IF NOT EXISTS ranking_history (
    rowid INTEGER PRIMARY KEY,
    entry_id BLOB NOT NULL UNIQUE CHECK (length(entry_id) = 16),
    ranking_id BLOB NOT NULL CHECK (length(ranking_id) = 16),
    user_id BLOB NOT NULL CHECK (length(user_id) = 16),
    dish_id BLOB NOT NULL CHECK (length(dish_id) = 16),
    restaurant_id BLOB NOT NULL CHECK (length(restaurant_id) = 16),
    dish_type TEXT NOT NULL,
    previous_rank INTEGER CHECK (previous_rank BETWEEN 1 AND 5),
    previous_taste_status TEXT,
    new_rank INTEGER CHECK (new_rank BETWEEN 1 AND 5),
    new_taste_status TEXT,
    notes TEXT NOT NULL,
    photo_refs BLOB NOT NULL,
    created_ms INTEGER NOT NULL,
    created_seq INTEGER NOT NULL,
    CHECK ((new_rank IS NULL) != (new_taste_status IS NULL)),
    CHECK (previous_rank IS NULL OR previous_taste_status IS NULL)
);
CREATE INDEX IF NOT EXISTS idx_history_ranking
    ON ranking_history (ranking_id, created_ms, created_seq);
";
