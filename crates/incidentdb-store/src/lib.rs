//! SQLite-backed incident store.
//!
//! One table holds the full incident records; `solution` is a JSON array
//! so step order survives the round trip. Rows that fail to decode (an
//! unknown stack tag, broken solution JSON) are dropped at this boundary
//! with a warning instead of leaking malformed data into ranking logic.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use incidentdb_core::error::{Result, RetrievalError};
use incidentdb_core::traits::IncidentStore;
use incidentdb_core::types::{Incident, IncidentFilter, TechStack};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS incidents (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    tech_stack TEXT NOT NULL,
    error_type TEXT NOT NULL,
    root_cause TEXT NOT NULL,
    solution TEXT NOT NULL,
    service TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_incidents_tech_stack ON incidents(tech_stack);
CREATE INDEX IF NOT EXISTS idx_incidents_error_type ON incidents(error_type);
";

pub struct SqliteIncidentStore {
    conn: Mutex<Connection>,
}

impl SqliteIncidentStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| RetrievalError::Unavailable(format!("sqlite open: {e}")))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RetrievalError::Unavailable(format!("sqlite open: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| RetrievalError::Unavailable(format!("sqlite schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RetrievalError::Unavailable("incident store lock poisoned".to_string()))
    }

    fn decode_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, RawIncident)> {
        let id: String = row.get(0)?;
        let raw = RawIncident {
            title: row.get(1)?,
            description: row.get(2)?,
            tech_stack: row.get(3)?,
            error_type: row.get(4)?,
            root_cause: row.get(5)?,
            solution_json: row.get(6)?,
            service: row.get(7)?,
        };
        Ok((id, raw))
    }
}

/// Untyped row as stored; conversion into `Incident` is where malformed
/// data gets rejected.
struct RawIncident {
    title: String,
    description: String,
    tech_stack: String,
    error_type: String,
    root_cause: String,
    solution_json: String,
    service: String,
}

impl RawIncident {
    fn into_incident(self, id: String) -> Option<Incident> {
        let tech_stack: TechStack = match self.tech_stack.parse() {
            Ok(s) => s,
            Err(_) => {
                tracing::warn!(%id, tag = %self.tech_stack, "dropping row with unknown tech stack");
                return None;
            }
        };
        let solution: Vec<String> = match serde_json::from_str(&self.solution_json) {
            Ok(steps) => steps,
            Err(e) => {
                tracing::warn!(%id, error = %e, "dropping row with undecodable solution");
                return None;
            }
        };
        Some(Incident {
            id,
            title: self.title,
            description: self.description,
            tech_stack,
            error_type: self.error_type,
            root_cause: self.root_cause,
            solution,
            service: self.service,
        })
    }
}

#[async_trait::async_trait]
impl IncidentStore for SqliteIncidentStore {
    async fn insert_batch(&self, incidents: &[Incident]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RetrievalError::Unavailable(format!("sqlite tx: {e}")))?;
        for inc in incidents {
            let solution_json = serde_json::to_string(&inc.solution)
                .map_err(|e| RetrievalError::Unavailable(format!("encode solution: {e}")))?;
            tx.execute(
                "INSERT OR REPLACE INTO incidents
                 (id, title, description, tech_stack, error_type, root_cause, solution, service)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    inc.id,
                    inc.title,
                    inc.description,
                    inc.tech_stack.as_str(),
                    inc.error_type,
                    inc.root_cause,
                    solution_json,
                    inc.service,
                ],
            )
            .map_err(|e| RetrievalError::Unavailable(format!("sqlite insert: {e}")))?;
        }
        tx.commit()
            .map_err(|e| RetrievalError::Unavailable(format!("sqlite commit: {e}")))?;
        Ok(())
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Incident>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let placeholders = std::iter::repeat("?")
            .take(ids.len())
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT id, title, description, tech_stack, error_type, root_cause, solution, service
             FROM incidents WHERE id IN ({placeholders})"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| RetrievalError::Unavailable(format!("sqlite prepare: {e}")))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), Self::decode_row)
            .map_err(|e| RetrievalError::Unavailable(format!("sqlite query: {e}")))?;

        // Ids with no row are silently absent: the index and the store
        // drift independently and the caller re-associates by id anyway.
        let mut incidents = Vec::new();
        for row in rows {
            let (id, raw) =
                row.map_err(|e| RetrievalError::Unavailable(format!("sqlite row: {e}")))?;
            if let Some(inc) = raw.into_incident(id) {
                incidents.push(inc);
            }
        }
        Ok(incidents)
    }

    async fn fetch_all(&self, filter: &IncidentFilter) -> Result<Vec<Incident>> {
        let conn = self.lock()?;
        let mut sql = String::from(
            "SELECT id, title, description, tech_stack, error_type, root_cause, solution, service
             FROM incidents",
        );
        let mut clauses = Vec::new();
        let mut params: Vec<String> = Vec::new();
        if let Some(stack) = filter.tech_stack {
            clauses.push("tech_stack = ?");
            params.push(stack.as_str().to_string());
        }
        if let Some(error_type) = &filter.error_type {
            clauses.push("error_type = ?");
            params.push(error_type.clone());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| RetrievalError::Unavailable(format!("sqlite prepare: {e}")))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), Self::decode_row)
            .map_err(|e| RetrievalError::Unavailable(format!("sqlite query: {e}")))?;

        let mut incidents = Vec::new();
        for row in rows {
            let (id, raw) =
                row.map_err(|e| RetrievalError::Unavailable(format!("sqlite row: {e}")))?;
            if let Some(inc) = raw.into_incident(id) {
                incidents.push(inc);
            }
        }
        Ok(incidents)
    }
}
