//! Engine-agnostic persistence collaborator.
//!
//! Registries composed with database support receive a [`Persistence`]
//! handle from the registry manager and use it to store one row per entity.
//! Rows are field bags keyed by column name.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::EntityType;
use serde_json::Value;
use std::collections::BTreeMap;

/// A persisted row: column name -> value.
pub type Row = BTreeMap<String, Value>;

/// Column holding the store-assigned integer row id.
pub const ID_COLUMN: &str = "id";

/// JSON column holding row fields that have no column of their own.
pub const EXTRA_COLUMN: &str = "extra";

/// Result of a successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// An existing row was updated in place.
    Updated,
    /// A new row was inserted with this id.
    Inserted(i64),
}

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Store-assigned integer primary key.
    Id,
    Text,
    /// Arbitrary JSON value, stored as text.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
}

const fn col(name: &'static str, kind: ColumnType) -> Column {
    Column { name, kind }
}

/// Schema of one persisted entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub const PROJECT_TABLE: TableSpec = TableSpec {
    name: "project",
    columns: &[
        col("id", ColumnType::Id),
        col("uuid", ColumnType::Text),
        col("name", ColumnType::Text),
        col("date_created", ColumnType::Text),
        col("title", ColumnType::Text),
        col("emoji", ColumnType::Text),
        col("config", ColumnType::Json),
        col("extra", ColumnType::Json),
    ],
};

pub const INTEGRATION_TABLE: TableSpec = TableSpec {
    name: "integration",
    columns: &[
        col("id", ColumnType::Id),
        col("uuid", ColumnType::Text),
        col("name", ColumnType::Text),
        col("date_created", ColumnType::Text),
        col("config", ColumnType::Json),
        col("submodule", ColumnType::Text),
        col("title", ColumnType::Text),
        col("emoji", ColumnType::Text),
        col("extra", ColumnType::Json),
    ],
};

pub const PROJECT_INTEGRATION_TABLE: TableSpec = TableSpec {
    name: "project_integration",
    columns: &[
        col("id", ColumnType::Id),
        col("uuid", ColumnType::Text),
        col("name", ColumnType::Text),
        col("config", ColumnType::Json),
        col("date_created", ColumnType::Text),
        col("project_uuid", ColumnType::Text),
        col("integration_uuid", ColumnType::Text),
        col("extra", ColumnType::Json),
    ],
};

/// Every persisted table.
pub static TABLES: [TableSpec; 3] = [PROJECT_TABLE, INTEGRATION_TABLE, PROJECT_INTEGRATION_TABLE];

/// Table for `entity_type`, if that type is persisted.
pub fn table_for(entity_type: EntityType) -> Option<&'static TableSpec> {
    let name = entity_type.table_name()?;
    TABLES.iter().find(|table| table.name == name)
}

/// Storage backend for entity rows.
///
/// Implementations must make every write atomic: a failed call leaves the
/// store as it was. Row fields without a column of their own must survive
/// a round trip through `upsert` and `select_all`.
pub trait Persistence: Send + Sync {
    /// Implementation name (`sqlite`, `memory`).
    fn name(&self) -> &str;

    /// Create any missing tables.
    fn ensure_tables(&self, tables: &[TableSpec]) -> Result<()>;

    /// Insert `row`, or update it in place when it carries an existing id.
    fn upsert(&self, table: &str, row: &Row) -> Result<UpsertOutcome>;

    /// Delete the row with store id `id`.
    fn delete(&self, table: &str, id: i64) -> Result<()>;

    /// All rows of `table`, ordered by id.
    fn select_all(&self, table: &str) -> Result<Vec<Row>>;

    /// Remove every row from every table.
    fn clear(&self) -> Result<()>;

    /// Check the store is reachable.
    fn ping(&self) -> Result<()>;

    /// Run `work` as one atomic unit.
    ///
    /// Store calls made from inside `work` on the same thread join the open
    /// transaction instead of waiting for it. Everything `work` wrote is
    /// rolled back when it returns an error.
    fn transaction(&self, work: &mut dyn FnMut() -> Result<()>) -> Result<()>;
}
