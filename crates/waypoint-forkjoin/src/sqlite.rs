use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use waypoint_core::error::{Result, WaypointError};

use crate::store::GroupStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS fork_groups (
        group_id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS fork_pending (
        group_id TEXT NOT NULL,
        agent_id TEXT NOT NULL,
        PRIMARY KEY (group_id, agent_id)
    );

    CREATE TABLE IF NOT EXISTS fork_sequence (
        group_id TEXT NOT NULL,
        agent_id TEXT NOT NULL,
        next_agent_id TEXT NOT NULL,
        PRIMARY KEY (group_id, agent_id)
    );";

/// How long a writer waits for another process's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn db_err(e: impl std::fmt::Display) -> WaypointError {
    WaypointError::Database(e.to_string())
}

/// Group store in a SQLite file that several processes may open at once.
pub struct SqliteGroupStore {
    conn: Mutex<Connection>,
}

impl SqliteGroupStore {
    /// Open or create the group database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WaypointError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Fork group store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl GroupStore for SqliteGroupStore {
    fn add_members(&self, group_id: &str, members: &[String]) -> BoxFuture<'_, Result<()>> {
        let group_id = group_id.to_string();
        let members = members.to_vec();
        Box::pin(async move {
            let mut conn = self.conn.lock().map_err(db_err)?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;
            tx.execute(
                "INSERT OR IGNORE INTO fork_groups (group_id, created_at) VALUES (?1, ?2)",
                params![group_id, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
            for member in &members {
                tx.execute(
                    "INSERT OR IGNORE INTO fork_pending (group_id, agent_id) VALUES (?1, ?2)",
                    params![group_id, member],
                )
                .map_err(db_err)?;
            }
            tx.commit().map_err(db_err)?;
            Ok(())
        })
    }

    fn remove_member(&self, group_id: &str, member: &str) -> BoxFuture<'_, Result<bool>> {
        let group_id = group_id.to_string();
        let member = member.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let removed = conn
                .execute(
                    "DELETE FROM fork_pending WHERE group_id = ?1 AND agent_id = ?2",
                    params![group_id, member],
                )
                .map_err(db_err)?;
            Ok(removed > 0)
        })
    }

    fn members(&self, group_id: &str) -> BoxFuture<'_, Result<Option<BTreeSet<String>>>> {
        let group_id = group_id.to_string();
        Box::pin(async move {
            let mut conn = self.conn.lock().map_err(db_err)?;
            // Both reads must see one snapshot, or a concurrent delete can
            // look like an empty pending set.
            let tx = conn.transaction().map_err(db_err)?;
            let exists = tx
                .query_row(
                    "SELECT 1 FROM fork_groups WHERE group_id = ?1",
                    params![group_id],
                    |_| Ok(()),
                )
                .optional()
                .map_err(db_err)?
                .is_some();
            if !exists {
                return Ok(None);
            }

            let mut pending = BTreeSet::new();
            {
                let mut stmt = tx
                    .prepare("SELECT agent_id FROM fork_pending WHERE group_id = ?1")
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map(params![group_id], |row| row.get::<_, String>(0))
                    .map_err(db_err)?;
                for row in rows {
                    pending.insert(row.map_err(db_err)?);
                }
            }
            tx.commit().map_err(db_err)?;
            Ok(Some(pending))
        })
    }

    fn delete_group(&self, group_id: &str) -> BoxFuture<'_, Result<()>> {
        let group_id = group_id.to_string();
        Box::pin(async move {
            let mut conn = self.conn.lock().map_err(db_err)?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;
            tx.execute("DELETE FROM fork_groups WHERE group_id = ?1", params![group_id])
                .map_err(db_err)?;
            tx.execute("DELETE FROM fork_pending WHERE group_id = ?1", params![group_id])
                .map_err(db_err)?;
            tx.execute("DELETE FROM fork_sequence WHERE group_id = ?1", params![group_id])
                .map_err(db_err)?;
            tx.commit().map_err(db_err)?;
            Ok(())
        })
    }

    fn set_successors(&self, group_id: &str, pairs: Vec<(String, String)>) -> BoxFuture<'_, Result<()>> {
        let group_id = group_id.to_string();
        Box::pin(async move {
            let mut conn = self.conn.lock().map_err(db_err)?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;
            for (agent_id, next) in &pairs {
                tx.execute(
                    "INSERT OR REPLACE INTO fork_sequence (group_id, agent_id, next_agent_id)
                     VALUES (?1, ?2, ?3)",
                    params![group_id, agent_id, next],
                )
                .map_err(db_err)?;
            }
            tx.commit().map_err(db_err)?;
            Ok(())
        })
    }

    fn successor(&self, group_id: &str, agent_id: &str) -> BoxFuture<'_, Result<Option<String>>> {
        let group_id = group_id.to_string();
        let agent_id = agent_id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            conn.query_row(
                "SELECT next_agent_id FROM fork_sequence WHERE group_id = ?1 AND agent_id = ?2",
                params![group_id, agent_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
        })
    }

    fn created_at(&self, group_id: &str) -> BoxFuture<'_, Result<Option<DateTime<Utc>>>> {
        let group_id = group_id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let ts: Option<String> = conn
                .query_row(
                    "SELECT created_at FROM fork_groups WHERE group_id = ?1",
                    params![group_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            ts.map(|ts| {
                DateTime::parse_from_rfc3339(&ts)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(db_err)
            })
            .transpose()
        })
    }
}
