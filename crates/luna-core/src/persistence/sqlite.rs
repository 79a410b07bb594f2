//! SQLite-backed persistence.

use super::{ColumnType, Persistence, Row, TableSpec, UpsertOutcome, EXTRA_COLUMN, ID_COLUMN};
use crate::config::DatabaseConfig;
use crate::error::{LunaError, Result};
use parking_lot::{Mutex, ReentrantMutex};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Connection plus the number of savepoints currently open on it.
struct Session {
    conn: Connection,
    depth: Cell<usize>,
}

/// SQLite store holding one table per persisted entity type.
///
/// Every operation runs inside a savepoint under a reentrant connection
/// lock, so store calls made from inside [`Persistence::transaction`]
/// nest into it.
pub struct SqliteStore {
    session: Arc<ReentrantMutex<Session>>,
    tables: Mutex<BTreeMap<&'static str, TableSpec>>,
}

impl SqliteStore {
    /// Open (or create) the database file at `db_path`.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| LunaError::Io {
                    message: format!("Failed to create database directory: {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| LunaError::Database {
            message: format!("Failed to open database {}: {}", db_path.display(), e),
            source: Some(e),
        })?;
        Self::configure_connection(&conn)?;
        debug!("Opened SQLite store at {}", db_path.display());
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            session: Arc::new(ReentrantMutex::new(Session {
                conn,
                depth: Cell::new(0),
            })),
            tables: Mutex::new(BTreeMap::new()),
        }
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;\n\
             PRAGMA busy_timeout={};\n\
             PRAGMA synchronous=NORMAL;",
            DatabaseConfig::BUSY_TIMEOUT_MS,
        ))?;
        Ok(())
    }

    fn table(&self, name: &str) -> Result<TableSpec> {
        self.tables
            .lock()
            .get(name)
            .copied()
            .ok_or_else(|| LunaError::Database {
                message: format!("Unknown table: {}", name),
                source: None,
            })
    }

    /// Run `work` inside a savepoint on the shared connection.
    ///
    /// The outermost call begins the transaction and nested calls on the
    /// same thread open inner savepoints. `Ok` releases the savepoint; an
    /// error rolls back to it.
    pub fn scoped<T>(&self, work: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let session = self.session.lock();
        let depth = session.depth.get();
        let savepoint = format!("luna_sp_{}", depth);

        session.conn.execute_batch(&format!("SAVEPOINT {}", savepoint))?;
        session.depth.set(depth + 1);
        let result = work(&session.conn);
        session.depth.set(depth);

        match result {
            Ok(value) => {
                session.conn.execute_batch(&format!("RELEASE {}", savepoint))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = session
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", savepoint))
                {
                    warn!("Failed to roll back {}: {}", savepoint, rollback);
                }
                Err(e)
            }
        }
    }
}

fn to_sql(kind: ColumnType, value: Option<&Value>) -> Result<SqlValue> {
    let value = match value {
        None | Some(Value::Null) => return Ok(SqlValue::Null),
        Some(value) => value,
    };
    Ok(match kind {
        ColumnType::Id => match value.as_i64() {
            Some(id) => SqlValue::Integer(id),
            None => {
                return Err(LunaError::Validation {
                    field: ID_COLUMN.to_string(),
                    message: format!("expected an integer, got {}", value),
                })
            }
        },
        ColumnType::Text => match value {
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        },
        ColumnType::Json => SqlValue::Text(serde_json::to_string(value)?),
    })
}

fn from_sql(kind: ColumnType, value: SqlValue) -> Option<Value> {
    match (kind, value) {
        (_, SqlValue::Null) => None,
        (_, SqlValue::Integer(i)) => Some(Value::from(i)),
        (_, SqlValue::Real(f)) => serde_json::Number::from_f64(f).map(Value::Number),
        (ColumnType::Json, SqlValue::Text(s)) => {
            Some(serde_json::from_str(&s).unwrap_or(Value::String(s)))
        }
        (_, SqlValue::Text(s)) => Some(Value::String(s)),
        (_, SqlValue::Blob(_)) => None,
    }
}

/// Fields of `row` that have no column in `spec`, packed for the extra column.
fn extra_fields(spec: &TableSpec, row: &Row) -> Map<String, Value> {
    row.iter()
        .filter(|(key, value)| {
            !value.is_null() && (key.as_str() == EXTRA_COLUMN || spec.column(key).is_none())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

impl Persistence for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn ensure_tables(&self, tables: &[TableSpec]) -> Result<()> {
        self.scoped(|conn| {
            for table in tables {
                let columns: Vec<String> = table
                    .columns
                    .iter()
                    .map(|c| match c.kind {
                        ColumnType::Id => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", c.name),
                        ColumnType::Text | ColumnType::Json => format!("{} TEXT", c.name),
                    })
                    .collect();
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {} ({});",
                    table.name,
                    columns.join(", ")
                ))?;

                // Tables created by older builds may lack newer columns.
                let existing: HashSet<String> = {
                    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table.name))?;
                    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
                    names.collect::<std::result::Result<_, _>>()?
                };
                for column in table
                    .columns
                    .iter()
                    .filter(|c| c.kind != ColumnType::Id && !existing.contains(c.name))
                {
                    conn.execute_batch(&format!(
                        "ALTER TABLE {} ADD COLUMN {} TEXT;",
                        table.name, column.name
                    ))?;
                    debug!("Added column {}.{}", table.name, column.name);
                }
            }
            Ok(())
        })?;

        let mut known = self.tables.lock();
        for table in tables {
            known.insert(table.name, *table);
        }
        debug!("Ensured {} tables", tables.len());
        Ok(())
    }

    fn upsert(&self, table: &str, row: &Row) -> Result<UpsertOutcome> {
        let spec = self.table(table)?;
        let extra = extra_fields(&spec, row);
        let columns: Vec<_> = spec
            .columns
            .iter()
            .filter(|c| c.kind != ColumnType::Id)
            .collect();
        let mut values = columns
            .iter()
            .map(|c| {
                if c.name != EXTRA_COLUMN {
                    to_sql(c.kind, row.get(c.name))
                } else if extra.is_empty() {
                    Ok(SqlValue::Null)
                } else {
                    to_sql(c.kind, Some(&Value::Object(extra.clone())))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
        let existing_id = match to_sql(ColumnType::Id, row.get(ID_COLUMN))? {
            SqlValue::Integer(id) => Some(id),
            _ => None,
        };

        self.scoped(|conn| {
            if let Some(id) = existing_id {
                let assignments: Vec<String> = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| format!("{} = ?{}", name, i + 1))
                    .collect();
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = ?{}",
                    spec.name,
                    assignments.join(", "),
                    ID_COLUMN,
                    names.len() + 1
                );
                let mut params = values.clone();
                params.push(SqlValue::Integer(id));
                if conn.execute(&sql, params_from_iter(params))? > 0 {
                    return Ok(UpsertOutcome::Updated);
                }
                // Row vanished underneath us; reinsert it under the same id.
                let mut all_names = names.clone();
                all_names.push(ID_COLUMN);
                values.push(SqlValue::Integer(id));
                insert(conn, spec.name, &all_names, values)?;
                return Ok(UpsertOutcome::Inserted(id));
            }

            let id = insert(conn, spec.name, &names, values)?;
            Ok(UpsertOutcome::Inserted(id))
        })
    }

    fn delete(&self, table: &str, id: i64) -> Result<()> {
        let spec = self.table(table)?;
        self.scoped(|conn| {
            conn.execute(
                &format!("DELETE FROM {} WHERE {} = ?1", spec.name, ID_COLUMN),
                [id],
            )?;
            Ok(())
        })
    }

    fn select_all(&self, table: &str) -> Result<Vec<Row>> {
        let spec = self.table(table)?;
        let names: Vec<&str> = spec.columns.iter().map(|c| c.name).collect();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            names.join(", "),
            spec.name,
            ID_COLUMN
        );

        let session = self.session.lock();
        let mut stmt = session.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |sql_row| {
            let mut row = Row::new();
            for (i, column) in spec.columns.iter().enumerate() {
                let value: SqlValue = sql_row.get(i)?;
                if let Some(value) = from_sql(column.kind, value) {
                    row.insert(column.name.to_string(), value);
                }
            }
            if let Some(Value::Object(extra)) = row.remove(EXTRA_COLUMN) {
                for (key, value) in extra {
                    row.entry(key).or_insert(value);
                }
            }
            Ok(row)
        })?;

        let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn clear(&self) -> Result<()> {
        let tables: Vec<&'static str> = self.tables.lock().keys().copied().collect();

        self.scoped(|conn| {
            for table in &tables {
                conn.execute(&format!("DELETE FROM {}", table), [])?;
            }
            Ok(())
        })?;
        debug!("Cleared {} tables", tables.len());
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        let session = self.session.lock();
        session
            .conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn transaction(&self, work: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        self.scoped(|_| work())
    }
}

fn insert(conn: &Connection, table: &str, names: &[&str], values: Vec<SqlValue>) -> Result<i64> {
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, params_from_iter(values))?;
    Ok(conn.last_insert_rowid())
}
