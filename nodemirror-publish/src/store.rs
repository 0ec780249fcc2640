//! Unit store seen by the enumerator, with a SQLite implementation.
//!
//! The store is the persistent inventory of units and their repository
//! associations. The enumerator only reads it, one page at a time.

use crate::error::{PublishError, PublishResult};
use chrono::{DateTime, Utc};
use nodemirror_types::{Association, ContentUnit};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// A unit body together with its store id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUnit {
    pub id: String,
    pub unit: ContentUnit,
}

/// Read access to units and repository associations.
pub trait UnitStore {
    /// Ids of every unit associated with `repo_id`, grouped by type id.
    fn associated_unit_ids(&self, repo_id: &str) -> PublishResult<BTreeMap<String, Vec<String>>>;

    /// The associations of `repo_id` for the given units of one type.
    fn associations(
        &self,
        repo_id: &str,
        type_id: &str,
        unit_ids: &[String],
    ) -> PublishResult<Vec<Association>>;

    /// Full bodies of the given units of one type.
    fn units(&self, type_id: &str, unit_ids: &[String]) -> PublishResult<Vec<StoredUnit>>;
}

/// Unit store backed by SQLite.
pub struct SqliteUnitStore {
    conn: Mutex<Connection>,
}

impl SqliteUnitStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> PublishResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| PublishError::Storage(format!("failed to open unit store: {e}")))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> PublishResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            PublishError::Storage(format!("failed to open in-memory unit store: {e}"))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> PublishResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS units (
                id TEXT PRIMARY KEY,
                type_id TEXT NOT NULL,
                unit_key TEXT NOT NULL,
                metadata TEXT NOT NULL,
                storage_path TEXT
            );

            CREATE INDEX IF NOT EXISTS units_type_id ON units (type_id);

            CREATE TABLE IF NOT EXISTS repo_content_units (
                repo_id TEXT NOT NULL,
                unit_id TEXT NOT NULL,
                unit_type_id TEXT NOT NULL,
                owner_type TEXT,
                owner_id TEXT,
                created TEXT,
                updated TEXT,
                UNIQUE(repo_id, unit_id)
            );
            ",
        )
        .map_err(|e| PublishError::Storage(format!("failed to init unit store schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> PublishResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PublishError::Storage("unit store lock poisoned".into()))
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Inserts a unit and returns its new id.
    pub fn add_unit(&self, unit: &ContentUnit) -> PublishResult<String> {
        let id = Uuid::now_v7().to_string();
        let unit_key = serde_json::to_string(&unit.unit_key)?;
        let metadata = serde_json::to_string(&unit.metadata)?;
        self.conn()?
            .execute(
                "INSERT INTO units (id, type_id, unit_key, metadata, storage_path) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, unit.type_id, unit_key, metadata, unit.storage_path],
            )
            .map_err(|e| PublishError::Storage(format!("failed to add unit: {e}")))?;
        Ok(id)
    }

    /// Associates an existing unit with a repository.
    pub fn associate(
        &self,
        repo_id: &str,
        unit_id: &str,
        owner_type: Option<&str>,
        owner_id: Option<&str>,
    ) -> PublishResult<Association> {
        let conn = self.conn()?;
        let type_id: String = conn
            .query_row("SELECT type_id FROM units WHERE id = ?1", params![unit_id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| PublishError::Storage(format!("failed to look up unit: {e}")))?
            .ok_or_else(|| PublishError::Storage(format!("unit not found: {unit_id}")))?;

        let now = Utc::now();
        conn.execute(
            "INSERT OR REPLACE INTO repo_content_units
                (repo_id, unit_id, unit_type_id, owner_type, owner_id, created, updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![repo_id, unit_id, type_id, owner_type, owner_id, now.to_rfc3339()],
        )
        .map_err(|e| PublishError::Storage(format!("failed to associate unit: {e}")))?;

        Ok(Association {
            repo_id: repo_id.to_string(),
            unit_id: unit_id.to_string(),
            unit_type_id: type_id,
            owner_type: owner_type.map(str::to_string),
            owner_id: owner_id.map(str::to_string),
            created: Some(now),
            updated: Some(now),
        })
    }

    /// Inserts a unit and associates it with `repo_id` in one call.
    pub fn add_associated(&self, repo_id: &str, unit: &ContentUnit) -> PublishResult<String> {
        let id = self.add_unit(unit)?;
        self.associate(repo_id, &id, None, None)?;
        Ok(id)
    }
}

/// Ids bound per `IN (...)` query, below SQLite's bound parameter limit.
const MAX_BOUND_IDS: usize = 10_000;

fn placeholders(from: usize, count: usize) -> String {
    (from..from + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_time(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl UnitStore for SqliteUnitStore {
    fn associated_unit_ids(&self, repo_id: &str) -> PublishResult<BTreeMap<String, Vec<String>>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT unit_type_id, unit_id FROM repo_content_units WHERE repo_id = ?1 ORDER BY rowid",
            )
            .map_err(|e| PublishError::Storage(format!("failed to prepare id query: {e}")))?;
        let rows = stmt
            .query_map(params![repo_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| PublishError::Storage(format!("failed to query unit ids: {e}")))?;

        let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let (type_id, unit_id) =
                row.map_err(|e| PublishError::Storage(format!("failed to read unit id: {e}")))?;
            index.entry(type_id).or_default().push(unit_id);
        }
        Ok(index)
    }

    fn associations(
        &self,
        repo_id: &str,
        type_id: &str,
        unit_ids: &[String],
    ) -> PublishResult<Vec<Association>> {
        if unit_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let mut associations = Vec::with_capacity(unit_ids.len());
        for batch in unit_ids.chunks(MAX_BOUND_IDS) {
            associations.extend(query_associations(&conn, repo_id, type_id, batch)?);
        }
        Ok(associations)
    }

    fn units(&self, type_id: &str, unit_ids: &[String]) -> PublishResult<Vec<StoredUnit>> {
        if unit_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let mut units = Vec::with_capacity(unit_ids.len());
        for batch in unit_ids.chunks(MAX_BOUND_IDS) {
            units.extend(query_units(&conn, type_id, batch)?);
        }
        Ok(units)
    }
}

fn query_associations(
    conn: &Connection,
    repo_id: &str,
    type_id: &str,
    unit_ids: &[String],
) -> PublishResult<Vec<Association>> {
    let sql = format!(
        "SELECT repo_id, unit_id, unit_type_id, owner_type, owner_id, created, updated
         FROM repo_content_units
         WHERE repo_id = ?1 AND unit_type_id = ?2 AND unit_id IN ({})",
        placeholders(3, unit_ids.len())
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| PublishError::Storage(format!("failed to prepare association query: {e}")))?;
    let args = [repo_id, type_id]
        .into_iter()
        .chain(unit_ids.iter().map(String::as_str));
    let rows = stmt
        .query_map(params_from_iter(args), |row| {
            Ok(Association {
                repo_id: row.get(0)?,
                unit_id: row.get(1)?,
                unit_type_id: row.get(2)?,
                owner_type: row.get(3)?,
                owner_id: row.get(4)?,
                created: parse_time(row.get(5)?),
                updated: parse_time(row.get(6)?),
            })
        })
        .map_err(|e| PublishError::Storage(format!("failed to query associations: {e}")))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| PublishError::Storage(format!("failed to read association: {e}")))
}

fn query_units(
    conn: &Connection,
    type_id: &str,
    unit_ids: &[String],
) -> PublishResult<Vec<StoredUnit>> {
    let sql = format!(
        "SELECT id, unit_key, metadata, storage_path FROM units
         WHERE type_id = ?1 AND id IN ({})",
        placeholders(2, unit_ids.len())
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| PublishError::Storage(format!("failed to prepare unit query: {e}")))?;
    let args = std::iter::once(type_id).chain(unit_ids.iter().map(String::as_str));
    let rows = stmt
        .query_map(params_from_iter(args), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .map_err(|e| PublishError::Storage(format!("failed to query units: {e}")))?;

    let mut units = Vec::with_capacity(unit_ids.len());
    for row in rows {
        let (id, unit_key, metadata, storage_path) =
            row.map_err(|e| PublishError::Storage(format!("failed to read unit: {e}")))?;
        units.push(StoredUnit {
            id,
            unit: ContentUnit {
                type_id: type_id.to_string(),
                unit_key: serde_json::from_str(&unit_key)?,
                metadata: serde_json::from_str(&metadata)?,
                storage_path,
            },
        });
    }
    Ok(units)
}
