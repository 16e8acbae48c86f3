//! SQLite-backed multi-tenant store.
//!
//! One system table holds user accounts; every tenant owns a dedicated pair
//! of vertex/edge tables created at registration. Tenant names are
//! restricted to `[A-Za-z0-9_]{1,32}` so interpolated table names are safe;
//! every value predicate is bound as a parameter.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeFilter, Eid, Vertex, VertexFilter, Vid};
use crate::source::GraphSource;

const MAX_TENANT_NAME_LEN: usize = 32;

/// A row of the system `users` table.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Auto-assigned id.
    pub user_id: i64,
    /// Login and tenant name.
    pub username: String,
    /// SHA-256 hex digest of the password.
    pub password_hash: String,
    /// Registration timestamp (unix seconds).
    pub created_at: i64,
    /// Last successful login, if any.
    pub last_login: Option<i64>,
}

/// Richer vertex lookup used by the CRUD query path.
#[derive(Debug, Clone, Default)]
pub struct VertexQuery {
    /// Exact id.
    pub vid: Option<Vid>,
    /// Type set.
    pub v_types: Option<Vec<String>>,
    /// Creation time window, inclusive.
    pub min_create_time: Option<i64>,
    /// Creation time window, inclusive.
    pub max_create_time: Option<i64>,
    /// Balance window, inclusive.
    pub min_balance: Option<i64>,
    /// Balance window, inclusive.
    pub max_balance: Option<i64>,
}

/// Richer edge lookup used by the CRUD query path.
#[derive(Debug, Clone, Default)]
pub struct EdgeQuery {
    /// Exact id.
    pub eid: Option<Eid>,
    /// Source endpoint.
    pub src_vid: Option<Vid>,
    /// Destination endpoint.
    pub dst_vid: Option<Vid>,
    /// Type set.
    pub e_types: Option<Vec<String>>,
    /// Amount window, inclusive.
    pub min_amount: Option<i64>,
    /// Amount window, inclusive.
    pub max_amount: Option<i64>,
    /// Occurrence time window, inclusive.
    pub min_occur_time: Option<i64>,
    /// Occurrence time window, inclusive.
    pub max_occur_time: Option<i64>,
}

/// Multi-tenant SQLite store behind a connection mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store file and ensures the system schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        init_system_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory store; used by tests and `exec` runs
    /// without a store file.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_system_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates the tenant's vertex/edge tables if they do not exist yet.
    pub fn provision_tenant(&self, tenant: &str) -> Result<()> {
        validate_tenant(tenant)?;
        let conn = self.conn.lock();
        let vertices = vertex_table(tenant);
        let edges = edge_table(tenant);
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {vertices} (
                vid INTEGER PRIMARY KEY,
                v_type TEXT NOT NULL,
                create_time INTEGER NOT NULL,
                balance INTEGER NOT NULL CHECK (balance >= 0)
            );
            CREATE TABLE IF NOT EXISTS {edges} (
                eid INTEGER PRIMARY KEY,
                src_vid INTEGER NOT NULL,
                dst_vid INTEGER NOT NULL,
                amount INTEGER NOT NULL CHECK (amount >= 0),
                occur_time INTEGER NOT NULL CHECK (occur_time > 0),
                e_type TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{edges}_src ON {edges} (src_vid);
            CREATE INDEX IF NOT EXISTS idx_{edges}_dst ON {edges} (dst_vid);
            CREATE INDEX IF NOT EXISTS idx_{edges}_time ON {edges} (occur_time);"
        ))?;
        debug!(tenant, "tenant tables provisioned");
        Ok(())
    }

    /// True when both tenant tables exist.
    pub fn tenant_exists(&self, tenant: &str) -> Result<bool> {
        validate_tenant(tenant)?;
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (?1, ?2)",
            params![vertex_table(tenant), edge_table(tenant)],
            |row| row.get(0),
        )?;
        Ok(count == 2)
    }

    // ---- user accounts ----

    /// Looks a user up by name.
    pub fn find_user(&self, username: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT user_id, username, password_hash, created_at, last_login
                 FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(UserRecord {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                        created_at: row.get(3)?,
                        last_login: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Inserts a new user row.
    pub fn create_user(&self, username: &str, password_hash: &str, created_at: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, created_at],
        )?;
        Ok(())
    }

    /// Records a successful login: timestamp plus the fresh session token.
    pub fn record_login(&self, user_id: i64, last_login: i64, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET last_login = ?1, token = ?2 WHERE user_id = ?3",
            params![last_login, token, user_id],
        )?;
        Ok(())
    }

    /// Resolves a session token to its username.
    pub fn username_for_token(&self, token: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let username = conn
            .query_row(
                "SELECT username FROM users WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;
        Ok(username)
    }

    /// Revokes a session token.
    pub fn clear_token(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET token = NULL WHERE token = ?1",
            params![token],
        )?;
        Ok(())
    }

    // ---- CRUD ----

    /// Inserts a vertex, allocating the next free vid when none is given.
    pub fn insert_vertex(
        &self,
        tenant: &str,
        v_type: &str,
        vid: Option<Vid>,
        create_time: Option<i64>,
        balance: i64,
    ) -> Result<Vertex> {
        validate_tenant(tenant)?;
        if balance < 0 {
            return Err(GraphError::InvalidArgument(format!(
                "balance must be non-negative, got {balance}"
            )));
        }
        if let Some(vid) = vid {
            if vid <= 0 {
                return Err(GraphError::InvalidArgument(format!(
                    "vid must be positive, got {vid}"
                )));
            }
        }

        let table = vertex_table(tenant);
        let conn = self.conn.lock();
        let vid = match vid {
            Some(vid) => vid,
            None => {
                let next: i64 = conn.query_row(
                    &format!("SELECT COALESCE(MAX(vid), 0) + 1 FROM {table}"),
                    [],
                    |row| row.get(0),
                )?;
                next
            }
        };
        let create_time = create_time.unwrap_or_else(unix_now);

        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {table} (vid, v_type, create_time, balance)
                 VALUES (?1, ?2, ?3, ?4)"
            ),
            params![vid, v_type, create_time, balance],
        )?;
        if inserted == 0 {
            return Err(GraphError::InvalidArgument(format!(
                "vertex {vid} already exists"
            )));
        }

        Ok(Vertex::new(vid, v_type, create_time, balance))
    }

    /// Inserts an edge; endpoints must exist unless `create_vertices`.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_edge(
        &self,
        tenant: &str,
        eid: Eid,
        src_vid: Vid,
        dst_vid: Vid,
        amount: i64,
        occur_time: Option<i64>,
        e_type: &str,
        create_vertices: bool,
    ) -> Result<Edge> {
        validate_tenant(tenant)?;
        if eid <= 0 {
            return Err(GraphError::InvalidArgument(format!(
                "eid must be positive, got {eid}"
            )));
        }
        if amount < 0 {
            return Err(GraphError::InvalidArgument(format!(
                "amount must be non-negative, got {amount}"
            )));
        }
        let occur_time = occur_time.unwrap_or_else(unix_now);
        if occur_time <= 0 {
            return Err(GraphError::InvalidArgument(format!(
                "occur_time must be positive, got {occur_time}"
            )));
        }

        let vertices = vertex_table(tenant);
        let edges = edge_table(tenant);
        let conn = self.conn.lock();

        for endpoint in [src_vid, dst_vid] {
            let exists: Option<i64> = conn
                .query_row(
                    &format!("SELECT vid FROM {vertices} WHERE vid = ?1"),
                    params![endpoint],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                if !create_vertices {
                    return Err(GraphError::NotFound(format!("vertex {endpoint}")));
                }
                conn.execute(
                    &format!(
                        "INSERT INTO {vertices} (vid, v_type, create_time, balance)
                         VALUES (?1, '+', ?2, 0)"
                    ),
                    params![endpoint, occur_time],
                )?;
            }
        }

        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {edges} (eid, src_vid, dst_vid, amount, occur_time, e_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![eid, src_vid, dst_vid, amount, occur_time, e_type],
        )?;
        if inserted == 0 {
            return Err(GraphError::InvalidArgument(format!(
                "edge {eid} already exists"
            )));
        }

        Ok(Edge::new(eid, src_vid, dst_vid, amount, occur_time, e_type))
    }

    /// Deletes a vertex and every edge incident to it.
    pub fn delete_vertex(&self, tenant: &str, vid: Vid) -> Result<()> {
        validate_tenant(tenant)?;
        let vertices = vertex_table(tenant);
        let edges = edge_table(tenant);
        let conn = self.conn.lock();
        conn.execute(
            &format!("DELETE FROM {edges} WHERE src_vid = ?1 OR dst_vid = ?1"),
            params![vid],
        )?;
        let deleted = conn.execute(
            &format!("DELETE FROM {vertices} WHERE vid = ?1"),
            params![vid],
        )?;
        if deleted == 0 {
            return Err(GraphError::NotFound(format!("vertex {vid}")));
        }
        Ok(())
    }

    /// Deletes an edge.
    pub fn delete_edge(&self, tenant: &str, eid: Eid) -> Result<()> {
        validate_tenant(tenant)?;
        let edges = edge_table(tenant);
        let conn = self.conn.lock();
        let deleted = conn.execute(&format!("DELETE FROM {edges} WHERE eid = ?1"), params![eid])?;
        if deleted == 0 {
            return Err(GraphError::NotFound(format!("edge {eid}")));
        }
        Ok(())
    }

    /// Fetches vertices matching the CRUD lookup.
    pub fn query_vertices(&self, tenant: &str, query: &VertexQuery) -> Result<Vec<Vertex>> {
        validate_tenant(tenant)?;
        let mut sql = format!(
            "SELECT vid, v_type, create_time, balance FROM {}",
            vertex_table(tenant)
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(vid) = query.vid {
            clauses.push("vid = ?".to_string());
            values.push(Value::Integer(vid));
        }
        if let Some(types) = &query.v_types {
            if types.is_empty() {
                return Ok(Vec::new());
            }
            clauses.push(format!("v_type IN ({})", placeholders(types.len())));
            values.extend(types.iter().cloned().map(Value::Text));
        }
        push_range(&mut clauses, &mut values, "create_time", query.min_create_time, query.max_create_time);
        push_range(&mut clauses, &mut values, "balance", query.min_balance, query.max_balance);

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY vid");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values), vertex_from_row)?;
        let mut vertices = Vec::new();
        for vertex in rows {
            vertices.push(vertex?);
        }
        Ok(vertices)
    }

    /// Fetches edges matching the CRUD lookup.
    pub fn query_edges(&self, tenant: &str, query: &EdgeQuery) -> Result<Vec<Edge>> {
        validate_tenant(tenant)?;
        let mut sql = format!(
            "SELECT eid, src_vid, dst_vid, amount, occur_time, e_type FROM {}",
            edge_table(tenant)
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(eid) = query.eid {
            clauses.push("eid = ?".to_string());
            values.push(Value::Integer(eid));
        }
        if let Some(src) = query.src_vid {
            clauses.push("src_vid = ?".to_string());
            values.push(Value::Integer(src));
        }
        if let Some(dst) = query.dst_vid {
            clauses.push("dst_vid = ?".to_string());
            values.push(Value::Integer(dst));
        }
        if let Some(types) = &query.e_types {
            if types.is_empty() {
                return Ok(Vec::new());
            }
            clauses.push(format!("e_type IN ({})", placeholders(types.len())));
            values.extend(types.iter().cloned().map(Value::Text));
        }
        push_range(&mut clauses, &mut values, "amount", query.min_amount, query.max_amount);
        push_range(&mut clauses, &mut values, "occur_time", query.min_occur_time, query.max_occur_time);

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY eid");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values), edge_from_row)?;
        let mut edges = Vec::new();
        for edge in rows {
            edges.push(edge?);
        }
        Ok(edges)
    }
}

impl GraphSource for SqliteStore {
    fn load_vertex(&self, tenant: &str, vid: Vid) -> Result<Option<Vertex>> {
        validate_tenant(tenant)?;
        let conn = self.conn.lock();
        let vertex = conn
            .query_row(
                &format!(
                    "SELECT vid, v_type, create_time, balance FROM {} WHERE vid = ?1",
                    vertex_table(tenant)
                ),
                params![vid],
                vertex_from_row,
            )
            .optional()?;
        Ok(vertex)
    }

    fn load_vertices(&self, tenant: &str, filter: &VertexFilter) -> Result<Vec<Vertex>> {
        self.query_vertices(
            tenant,
            &VertexQuery {
                v_types: filter.v_types.clone(),
                min_balance: filter.min_balance,
                ..VertexQuery::default()
            },
        )
    }

    fn load_edges(&self, tenant: &str, filter: &EdgeFilter) -> Result<Vec<Edge>> {
        self.query_edges(
            tenant,
            &EdgeQuery {
                e_types: filter.e_types.clone(),
                min_amount: filter.min_amount,
                max_amount: filter.max_amount,
                ..EdgeQuery::default()
            },
        )
    }
}

fn init_system_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            last_login INTEGER,
            token TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_users_token ON users (token);",
    )?;
    Ok(())
}

/// Rejects tenant names that could not be safely interpolated into a table
/// name.
pub fn validate_tenant(tenant: &str) -> Result<()> {
    let ok = !tenant.is_empty()
        && tenant.len() <= MAX_TENANT_NAME_LEN
        && tenant
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(GraphError::InvalidArgument(format!(
            "tenant name {tenant:?} must match [A-Za-z0-9_]{{1,{MAX_TENANT_NAME_LEN}}}"
        )))
    }
}

fn vertex_table(tenant: &str) -> String {
    format!("vertices_{tenant}")
}

fn edge_table(tenant: &str) -> String {
    format!("edges_{tenant}")
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn push_range(
    clauses: &mut Vec<String>,
    values: &mut Vec<Value>,
    column: &str,
    min: Option<i64>,
    max: Option<i64>,
) {
    if let Some(min) = min {
        clauses.push(format!("{column} >= ?"));
        values.push(Value::Integer(min));
    }
    if let Some(max) = max {
        clauses.push(format!("{column} <= ?"));
        values.push(Value::Integer(max));
    }
}

fn vertex_from_row(row: &Row<'_>) -> rusqlite::Result<Vertex> {
    Ok(Vertex {
        vid: row.get(0)?,
        v_type: row.get(1)?,
        create_time: row.get(2)?,
        balance: row.get(3)?,
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    Ok(Edge {
        eid: row.get(0)?,
        src_vid: row.get(1)?,
        dst_vid: row.get(2)?,
        amount: row.get(3)?,
        occur_time: row.get(4)?,
        e_type: row.get(5)?,
    })
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
