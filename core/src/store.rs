//! SQLite persistence layer: a durable key-value store of save records.
//!
//! RULE: Only store.rs talks to the database.
//! The engine hands over finished SaveRecords; it never runs SQL and
//! never waits on storage in the middle of a command.

use crate::{error::EngineResult, snapshot::SaveRecord, types::SlotKey};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

pub struct SaveStore {
    conn: Connection,
}

/// One row of the slot listing, without the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSummary {
    pub slot_key:    SlotKey,
    pub captured_at: String,
    pub saved_at:    String,
}

impl SaveStore {
    /// Open (or create) the save database at `path`.
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_saves.sql"))?;
        Ok(())
    }

    /// Insert or overwrite the record stored under `key`.
    pub fn save(&self, key: &str, record: &SaveRecord) -> EngineResult<()> {
        let payload = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO save_slot (slot_key, payload, captured_at, saved_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(slot_key) DO UPDATE SET
                payload     = excluded.payload,
                captured_at = excluded.captured_at,
                saved_at    = excluded.saved_at",
            params![
                key,
                payload,
                record.captured_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        log::debug!("store: wrote slot '{key}' ({} bytes)", payload.len());
        Ok(())
    }

    /// The record under `key`, if any. The stored version tag is checked
    /// against `expected_version` before the body is parsed; a payload that
    /// no longer parses is `MalformedRecord`, never silently dropped.
    pub fn load(&self, key: &str, expected_version: &str) -> EngineResult<Option<SaveRecord>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM save_slot WHERE slot_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|json| SaveRecord::from_json(&json, expected_version))
            .transpose()
    }

    /// Remove the slot. Returns whether anything was deleted.
    pub fn delete(&self, key: &str) -> EngineResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM save_slot WHERE slot_key = ?1", params![key])?;
        Ok(removed > 0)
    }

    pub fn list_slots(&self) -> EngineResult<Vec<SlotSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT slot_key, captured_at, saved_at
             FROM save_slot ORDER BY slot_key ASC",
        )?;
        let slots = stmt
            .query_map([], |row| {
                Ok(SlotSummary {
                    slot_key:    row.get(0)?,
                    captured_at: row.get(1)?,
                    saved_at:    row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(slots)
    }
}
