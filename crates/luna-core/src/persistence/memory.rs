//! In-process persistence with no backing file.

use super::{Persistence, Row, TableSpec, UpsertOutcome, ID_COLUMN};
use crate::error::{LunaError, Result};
use parking_lot::ReentrantMutex;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

#[derive(Default, Clone)]
struct Tables {
    rows: HashMap<String, BTreeMap<i64, Row>>,
    next_id: i64,
}

/// Store that keeps rows in memory for the life of the process.
///
/// Transactions snapshot the tables and put the snapshot back on failure.
pub struct MemoryStore {
    inner: ReentrantMutex<RefCell<Tables>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Tables::default())),
        }
    }

    fn with_tables<T>(&self, work: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let guard = self.inner.lock();
        let mut tables = guard.try_borrow_mut().map_err(|_| LunaError::Database {
            message: "Memory store is already in use on this thread".to_string(),
            source: None,
        })?;
        work(&mut tables)
    }
}

fn unknown_table(table: &str) -> LunaError {
    LunaError::Database {
        message: format!("Unknown table: {}", table),
        source: None,
    }
}

impl Persistence for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn ensure_tables(&self, tables: &[TableSpec]) -> Result<()> {
        self.with_tables(|inner| {
            for table in tables {
                inner.rows.entry(table.name.to_string()).or_default();
            }
            Ok(())
        })
    }

    fn upsert(&self, table: &str, row: &Row) -> Result<UpsertOutcome> {
        self.with_tables(|inner| {
            let present = match (inner.rows.get(table), row.get(ID_COLUMN).and_then(Value::as_i64)) {
                (None, _) => return Err(unknown_table(table)),
                (Some(rows), Some(id)) => Some((id, rows.contains_key(&id))),
                (Some(_), None) => None,
            };
            let (id, outcome) = match present {
                Some((id, present)) => {
                    let outcome = if present {
                        UpsertOutcome::Updated
                    } else {
                        UpsertOutcome::Inserted(id)
                    };
                    inner.next_id = inner.next_id.max(id);
                    (id, outcome)
                }
                None => {
                    inner.next_id += 1;
                    (inner.next_id, UpsertOutcome::Inserted(inner.next_id))
                }
            };

            let mut stored = row.clone();
            stored.insert(ID_COLUMN.to_string(), Value::from(id));
            inner
                .rows
                .get_mut(table)
                .ok_or_else(|| unknown_table(table))?
                .insert(id, stored);
            Ok(outcome)
        })
    }

    fn delete(&self, table: &str, id: i64) -> Result<()> {
        self.with_tables(|inner| {
            inner
                .rows
                .get_mut(table)
                .ok_or_else(|| unknown_table(table))?
                .remove(&id);
            Ok(())
        })
    }

    fn select_all(&self, table: &str) -> Result<Vec<Row>> {
        self.with_tables(|inner| {
            let rows = inner.rows.get(table).ok_or_else(|| unknown_table(table))?;
            Ok(rows.values().cloned().collect())
        })
    }

    fn clear(&self) -> Result<()> {
        self.with_tables(|inner| {
            for rows in inner.rows.values_mut() {
                rows.clear();
            }
            Ok(())
        })
    }

    fn ping(&self) -> Result<()> {
        self.with_tables(|_| Ok(()))
    }

    fn transaction(&self, work: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        // Held across `work` so other threads wait for the whole unit.
        let _guard = self.inner.lock();
        let snapshot = self.with_tables(|inner| Ok(inner.clone()))?;
        let result = work();
        if result.is_err() {
            self.with_tables(|inner| {
                *inner = snapshot;
                Ok(())
            })?;
        }
        result
    }
}
