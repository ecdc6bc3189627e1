// src/store.rs
//
// =============================================================================
// DRBOT: REVIEW WORKSPACE TABLES
// =============================================================================
//
// SQLite access to the review-enabled workspace.
//
// The workspace directory contains a review database with two tables the
// engine and drbot share:
// - GDB_REVSESSIONTABLE: session name -> engine-assigned numeric id.
// - REVTABLEMAIN: one row per finding, scoped by SESSIONID.
//
// Ownership: the engine writes findings, drbot reads them. The only writes
// made here are review enablement (schema creation) and session creation.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

/// Review database file inside the workspace directory.
pub const REVIEW_DB: &str = "reviewer.db";

#[derive(Debug, Error)]
pub enum StoreError {
    /// The session named as template does not exist in this workspace.
    #[error("Template session '{0}' not present in workspace")]
    TemplateMissing(String),

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

/// One row of the findings table. Immutable once written by the engine.
#[derive(Debug, Clone)]
pub struct Finding {
    pub check_title: String,
    pub origin_table: String,
    pub subtype: String,
    pub object_id: i64,
    pub notes: String,
}

// -----------------------------------------------------------------------------
// Session id formatting
// -----------------------------------------------------------------------------

/// Build the session id string the engine expects. Must keep exactly one
/// space before and after the colon; any deviation makes the engine fail to
/// resolve the session.
pub fn format_session_id(id: i64, name: &str) -> String {
    format!("Session {} : {}", id, name)
}

/// Parse a "Session <id> : <name>" string back into its parts.
pub fn parse_session_id(s: &str) -> Option<(i64, String)> {
    let rest = s.strip_prefix("Session ")?;
    let (id, name) = rest.split_once(" : ")?;
    Some((id.parse().ok()?, name.to_string()))
}

// -----------------------------------------------------------------------------
// ReviewStore
// -----------------------------------------------------------------------------

pub struct ReviewStore {
    path: PathBuf,
}

impl ReviewStore {
    /// Handle on the review database of `workspace`. Does not touch the
    /// filesystem until an operation runs.
    pub fn open(workspace: &Path) -> Self {
        Self {
            path: workspace.join(REVIEW_DB),
        }
    }

    fn conn(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        // Busy timeout covers the engine process touching the same tables.
        conn.execute_batch("PRAGMA busy_timeout=10000;")?;
        Ok(conn)
    }

    /// Whether review capability has been enabled on this workspace.
    pub fn is_enabled(&self) -> bool {
        self.path.is_file()
    }

    /// Enable review capability: create the session/findings schema and
    /// record the spatial reference. Idempotent; a no-op on an already
    /// enabled workspace.
    pub fn enable(&self, srid: i32) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE TABLE IF NOT EXISTS GDB_REVSESSIONTABLE (
                SESSIONID INTEGER PRIMARY KEY AUTOINCREMENT,
                SESSIONNAME TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS REVTABLEMAIN (
                OBJECTID INTEGER PRIMARY KEY AUTOINCREMENT,
                SESSIONID INTEGER NOT NULL,
                CHECKTITLE TEXT,
                ORIGINTABLE TEXT,
                SUBTYPE TEXT,
                NOTES TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_rev_session ON REVTABLEMAIN(SESSIONID);
            COMMIT;",
        )?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('srid', ?1)
             ON CONFLICT(key) DO NOTHING",
            params![srid.to_string()],
        )?;
        Ok(())
    }

    /// Create a session, optionally based on a template session given in
    /// "Session <id> : <name>" form. The engine assigns the numeric id; it
    /// is discovered afterwards via `find_session_id`.
    pub fn create_session(&self, name: &str, template: Option<&str>) -> Result<(), StoreError> {
        let conn = self.conn()?;

        if let Some(template) = template {
            let Some((tpl_id, tpl_name)) = parse_session_id(template) else {
                return Err(StoreError::TemplateMissing(template.to_string()));
            };
            let found: Option<i64> = conn
                .query_row(
                    "SELECT SESSIONID FROM GDB_REVSESSIONTABLE
                     WHERE SESSIONID = ?1 AND SESSIONNAME = ?2",
                    params![tpl_id, tpl_name],
                    |r| r.get(0),
                )
                .optional()?;
            if found.is_none() {
                return Err(StoreError::TemplateMissing(template.to_string()));
            }
        }

        conn.execute(
            "INSERT INTO GDB_REVSESSIONTABLE (SESSIONNAME) VALUES (?1)",
            params![name],
        )?;
        Ok(())
    }

    /// Look up the engine-assigned id of the most recently created session
    /// with this name.
    pub fn find_session_id(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT SESSIONID FROM GDB_REVSESSIONTABLE
                 WHERE SESSIONNAME = ?1
                 ORDER BY SESSIONID DESC LIMIT 1",
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// All findings for a session, ordered by (check title, record id).
    /// The Summarizer's grouping depends on this ordering.
    pub fn findings_for_session(&self, session_id: i64) -> Result<Vec<Finding>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT CHECKTITLE, ORIGINTABLE, SUBTYPE, OBJECTID, NOTES
             FROM REVTABLEMAIN
             WHERE SESSIONID = ?1
             ORDER BY CHECKTITLE, OBJECTID",
        )?;

        let rows = stmt.query_map(params![session_id], |row| {
            Ok(Finding {
                check_title: normalize_text(row.get_ref(0)?),
                origin_table: normalize_text(row.get_ref(1)?),
                subtype: normalize_text(row.get_ref(2)?),
                object_id: row.get(3)?,
                notes: normalize_text(row.get_ref(4)?),
            })
        })?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

/// Normalize an engine-supplied value to plain text. The engine may store
/// legacy-encoded blobs; those are decoded lossily rather than rejected.
fn normalize_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
