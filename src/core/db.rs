use crate::core::tags::TagRead;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A stored tag row from the `tags` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub tag_id: String,
    pub first_seen: String,
    pub last_seen: String,
    pub rssi: u8,
    pub rssi_percent: f32,
    pub antenna: u8,
    pub reader_id: String,
}

/// A stored row from the `readings` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub tag_id: String,
    pub seen_at: String,
    pub rssi: u8,
    pub rssi_percent: f32,
    pub antenna: u8,
}

/// Whether a recorded read created a new tag row or refreshed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    New,
    Updated,
}

const TAG_SELECT_SQL: &str = "SELECT tag_id, first_seen, last_seen, rssi, rssi_percent, \
                              antenna, reader_id FROM tags";

/// SQLite-backed storage for tag identity and reading history
pub struct TagDatabase {
    conn: Connection,
}

impl TagDatabase {
    /// Open (or create) the tag database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).with_context(|| {
            format!("Failed to open tag database: {}", path.as_ref().display())
        })?;
        let db = Self { conn };
        db.setup_schema()?;
        log::info!("Tag database opened at {}", path.as_ref().display());
        Ok(db)
    }

    /// Open an in-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let db = Self { conn };
        db.setup_schema()?;
        Ok(db)
    }

    fn setup_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "PRAGMA foreign_keys = ON;
                 CREATE TABLE IF NOT EXISTS tags (
                     tag_id       TEXT PRIMARY KEY,
                     first_seen   TEXT NOT NULL,
                     last_seen    TEXT NOT NULL,
                     rssi         INTEGER NOT NULL,
                     rssi_percent REAL NOT NULL,
                     antenna      INTEGER NOT NULL,
                     reader_id    TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS readings (
                     id           INTEGER PRIMARY KEY AUTOINCREMENT,
                     tag_id       TEXT NOT NULL REFERENCES tags(tag_id) ON DELETE CASCADE,
                     seen_at      TEXT NOT NULL,
                     rssi         INTEGER NOT NULL,
                     rssi_percent REAL NOT NULL,
                     antenna      INTEGER NOT NULL
                 );",
            )
            .context("Failed to create database tables")
    }

    /// Record a tag reading.
    ///
    /// A tag id is unique within the `tags` table: the first sighting inserts
    /// a row, repeated sightings update `last_seen` and the signal fields.
    /// Every sighting appends a row to `readings`.
    pub fn record_read(&mut self, read: &TagRead) -> Result<RecordOutcome> {
        let timestamp = read.timestamp_string();
        let tx = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM tags WHERE tag_id = ?1",
                params![read.tag_id],
                |_| Ok(()),
            )
            .is_ok();

        let outcome = if exists {
            tx.execute(
                "UPDATE tags SET last_seen = ?1, rssi = ?2, rssi_percent = ?3, antenna = ?4
                 WHERE tag_id = ?5",
                params![
                    timestamp,
                    read.rssi,
                    read.rssi_percent,
                    read.antenna,
                    read.tag_id
                ],
            )
            .context("Failed to update tag")?;
            RecordOutcome::Updated
        } else {
            tx.execute(
                "INSERT INTO tags (tag_id, first_seen, last_seen, rssi, rssi_percent, \
                 antenna, reader_id) VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6)",
                params![
                    read.tag_id,
                    timestamp,
                    read.rssi,
                    read.rssi_percent,
                    read.antenna,
                    read.reader_id
                ],
            )
            .context("Failed to insert tag")?;
            RecordOutcome::New
        };

        tx.execute(
            "INSERT INTO readings (tag_id, seen_at, rssi, rssi_percent, antenna)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                read.tag_id,
                timestamp,
                read.rssi,
                read.rssi_percent,
                read.antenna
            ],
        )
        .context("Failed to insert reading")?;

        tx.commit().context("Failed to commit tag reading")?;
        Ok(outcome)
    }

    /// All stored tags, most recently seen first
    pub fn all_tags(&self) -> Result<Vec<TagRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TAG_SELECT_SQL} ORDER BY last_seen DESC"))
            .context("Failed to prepare tag query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TagRecord {
                    tag_id: row.get(0)?,
                    first_seen: row.get(1)?,
                    last_seen: row.get(2)?,
                    rssi: row.get(3)?,
                    rssi_percent: row.get(4)?,
                    antenna: row.get(5)?,
                    reader_id: row.get(6)?,
                })
            })
            .context("Failed to query tags")?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row.context("Failed to read tag row")?);
        }
        Ok(tags)
    }

    /// Number of unique tags stored
    pub fn tag_count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
            .context("Failed to count tags")
    }

    /// Recent readings for one tag, newest first
    pub fn readings_for(&self, tag_id: &str, limit: usize) -> Result<Vec<Reading>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT tag_id, seen_at, rssi, rssi_percent, antenna FROM readings
                 WHERE tag_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .context("Failed to prepare readings query")?;
        let rows = stmt
            .query_map(params![tag_id, limit as i64], |row| {
                Ok(Reading {
                    tag_id: row.get(0)?,
                    seen_at: row.get(1)?,
                    rssi: row.get(2)?,
                    rssi_percent: row.get(3)?,
                    antenna: row.get(4)?,
                })
            })
            .context("Failed to query readings")?;

        let mut readings = Vec::new();
        for row in rows {
            readings.push(row.context("Failed to read reading row")?);
        }
        Ok(readings)
    }

    /// Remove all tags and readings
    pub fn clear(&mut self) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;
        tx.execute("DELETE FROM readings", [])
            .context("Failed to clear readings")?;
        tx.execute("DELETE FROM tags", [])
            .context("Failed to clear tags")?;
        tx.commit().context("Failed to commit clear")?;
        log::info!("Tag database cleared");
        Ok(())
    }

    /// Export all stored tags as pretty-printed JSON
    pub fn export_json(&self) -> Result<String> {
        let tags = self.all_tags()?;
        serde_json::to_string_pretty(&tags).context("Failed to serialize tags")
    }
}
