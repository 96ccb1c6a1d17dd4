/// Schema Introspection Module
///
/// This module discovers table and column metadata from the live database.
/// Nothing is cached: every record operation re-introspects, since the
/// schema may change between invocations.

use crate::core::{RecadminError, Result};
use crate::value::{coerce, ColumnKind, Value};
use rusqlite::{Connection, Row};

/// Represents a database column with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared SQLite type name (e.g., "INTEGER", "VARCHAR(255)")
    pub type_name: String,
    /// Semantic kind derived from the declared type
    pub kind: ColumnKind,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Whether a DEFAULT expression is declared
    pub has_default: bool,
    /// 1-based position within the primary key, 0 when not a key column
    pub pk_position: u32,
    /// Whether the database assigns the value (rowid alias)
    pub autoincrement: bool,
}

impl Column {
    /// Creates a Column from a `pragma_table_info` row
    fn from_pragma_row(row: &Row) -> rusqlite::Result<Self> {
        let type_name: String = row.get(2)?;
        let notnull: bool = row.get(3)?;
        let dflt_value: Option<String> = row.get(4)?;
        let pk_position: u32 = row.get(5)?;
        Ok(Column {
            name: row.get(1)?,
            kind: ColumnKind::from_declared_type(&type_name),
            type_name,
            nullable: !notnull,
            has_default: dflt_value.is_some(),
            pk_position,
            autoincrement: false,
        })
    }

    pub fn is_primary_key(&self) -> bool {
        self.pk_position > 0
    }

    /// Whether an insert must supply a value for this column.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.has_default && !self.autoincrement
    }

    /// Coerces raw text to this column's kind, naming the column on failure.
    pub fn coerce(&self, raw: &str) -> Result<Value> {
        coerce(raw, self.kind).map_err(|err| match err {
            RecadminError::InvalidValue { kind, raw, .. } => RecadminError::InvalidValue {
                column: Some(self.name.clone()),
                kind,
                raw,
            },
            other => other,
        })
    }
}

/// A table as introspected at the start of one operation
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Columns in declaration order
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// Introspects a table, failing with `SchemaNotFound` when it has no columns.
    pub fn load(conn: &Connection, table_name: &str) -> Result<Self> {
        let columns = get_columns(conn, table_name)?;
        if columns.is_empty() {
            return Err(RecadminError::SchemaNotFound(table_name.to_string()));
        }
        Ok(TableSchema {
            name: table_name.to_string(),
            columns,
        })
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column by name, failing with `UnknownColumn`.
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| RecadminError::UnknownColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    /// Primary-key columns in key order.
    pub fn primary_key(&self) -> Vec<&Column> {
        let mut keys: Vec<&Column> = self.columns.iter().filter(|c| c.is_primary_key()).collect();
        keys.sort_by_key(|c| c.pk_position);
        keys
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Returns every user table, ordered by name
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type='table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;

    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(tables)
}

/// Returns the ordered columns of a table; empty when the table does not exist
pub fn get_columns(conn: &Connection, table_name: &str) -> Result<Vec<Column>> {
    let mut stmt = conn.prepare(
        "SELECT cid, name, type, \"notnull\", dflt_value, pk
         FROM pragma_table_info(?1)
         ORDER BY cid",
    )?;

    let mut columns = stmt
        .query_map([table_name], |row| Column::from_pragma_row(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let without_rowid = is_without_rowid(conn, table_name)?;
    if without_rowid {
        // Key columns of a WITHOUT ROWID table are NOT NULL whether declared or not.
        for column in columns.iter_mut().filter(|c| c.is_primary_key()) {
            column.nullable = false;
        }
    } else if is_rowid_alias_key(conn, &columns, table_name)? {
        for column in columns.iter_mut().filter(|c| c.is_primary_key()) {
            column.autoincrement = true;
            column.nullable = false;
        }
    }

    Ok(columns)
}

/// Whether the table was declared `WITHOUT ROWID`.
fn is_without_rowid(conn: &Connection, table_name: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT sql FROM sqlite_master WHERE type='table' AND name = ?1")?;
    let sql: Option<String> = stmt
        .query_map([table_name], |row| row.get::<_, Option<String>>(0))?
        .next()
        .transpose()?
        .flatten();
    Ok(sql.map_or(false, |sql| {
        let normalized = sql.split_whitespace().collect::<Vec<_>>().join(" ");
        normalized.to_ascii_uppercase().contains("WITHOUT ROWID")
    }))
}

/// A sole `INTEGER` key column aliases the rowid and is assigned by SQLite,
/// unless SQLite had to back it with its own index (`INTEGER PRIMARY KEY DESC`).
fn is_rowid_alias_key(conn: &Connection, columns: &[Column], table_name: &str) -> Result<bool> {
    let mut keys = columns.iter().filter(|c| c.is_primary_key());
    let (Some(key), None) = (keys.next(), keys.next()) else {
        return Ok(false);
    };
    if !key.type_name.eq_ignore_ascii_case("INTEGER") {
        return Ok(false);
    }
    let pk_indexes: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_index_list(?1) WHERE origin = 'pk'",
        [table_name],
        |row| row.get(0),
    )?;
    Ok(pk_indexes == 0)
}

/// Returns primary-key column names in key order; empty when none is declared
pub fn get_primary_key(conn: &Connection, table_name: &str) -> Result<Vec<String>> {
    let mut keys: Vec<Column> = get_columns(conn, table_name)?
        .into_iter()
        .filter(Column::is_primary_key)
        .collect();
    keys.sort_by_key(|c| c.pk_position);
    Ok(keys.into_iter().map(|c| c.name).collect())
}
