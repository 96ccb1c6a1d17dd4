/// Query Execution Module
///
/// This module runs built statements against a session's connection and
/// turns result rows into typed values, decoded by the column kinds of the
/// introspected table.

use super::connection::Session;
use super::schema::TableSchema;
use crate::core::{RecadminError, Result};
use crate::sql::Statement;
use crate::value::Value;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value as JsonValue};

/// Ordered column names plus rows of typed values
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    /// Column names in table order
    pub columns: Vec<String>,
    /// Rows of values, one per column
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        ResultSet { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up a value in a row by column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }

    /// Renders one tab-separated header line followed by one line per row.
    ///
    /// Nulls render as empty fields.
    pub fn render_tsv(&self) -> String {
        let mut output = String::new();
        output.push_str(&self.columns.join("\t"));
        output.push('\n');
        for row in &self.rows {
            let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            output.push_str(&fields.join("\t"));
            output.push('\n');
        }
        output
    }

    /// Renders the rows as a JSON array of objects keyed by column name.
    pub fn render_json(&self) -> Result<String> {
        let mut objects = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut object = Map::new();
            for (column, value) in self.columns.iter().zip(row) {
                object.insert(column.clone(), serde_json::to_value(value)?);
            }
            objects.push(JsonValue::Object(object));
        }
        Ok(serde_json::to_string(&objects)?)
    }
}

/// Runs a read statement on the session's own connection
pub fn query(session: &Session<'_>, table: &TableSchema, stmt: &Statement) -> Result<ResultSet> {
    session.observe(&stmt.sql);
    let mut prepared = session.connection().prepare(&stmt.sql)?;
    let kinds: Vec<_> = table.columns.iter().map(|c| c.kind).collect();

    let rows = prepared
        .query_map(params_from_iter(stmt.params.iter()), |row| {
            let mut values = Vec::with_capacity(kinds.len());
            for (i, kind) in kinds.iter().enumerate() {
                values.push(kind.decode(row.get_ref(i)?));
            }
            Ok(values)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(ResultSet::new(table.column_names(), rows))
}

/// Runs a write statement on a transaction's connection, returning the
/// number of changed rows.
///
/// Constraint failures come back as `ConstraintViolation` with the driver's
/// message.
pub fn execute(session: &Session<'_>, conn: &Connection, stmt: &Statement) -> Result<usize> {
    session.observe(&stmt.sql);
    conn.execute(&stmt.sql, params_from_iter(stmt.params.iter()))
        .map_err(RecadminError::from_execution)
}
