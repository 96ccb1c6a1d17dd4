//! SQL Statement Builder
//!
//! Builds the handful of statement shapes record operations need. Values
//! are always bound as positional parameters (`?1`, `?2`, ...). Identifiers
//! are only ever taken from an introspected `TableSchema` or `Column`, and
//! are double-quoted with embedded quotes doubled, so neither free-form user
//! text nor values ever reach the SQL string.
//!
//! Reads name their columns explicitly: result positions must line up with
//! the introspected columns, and `SELECT *` would also return generated
//! columns that introspection does not report.

use crate::core::db::{Column, TableSchema};
use crate::value::{ColumnKind, Value};

/// A statement template plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Statement { sql, params }
    }
}

/// Quotes an identifier for SQLite.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// `SELECT` of every introspected column, with an optional single-column
/// equality filter.
///
/// Timestamp columns compare by instant (`julianday`), so stored text with
/// a `T` or a space separator matches the same bound value.
pub fn select(table: &TableSchema, filter: Option<(&Column, Value)>) -> Statement {
    let mut sql = format!("SELECT {} FROM {}", column_list(table), quote_identifier(&table.name));
    let mut params = Vec::new();
    if let Some((column, value)) = filter {
        sql.push_str(&format!(" WHERE {}", equality_term(column, 1)));
        params.push(value);
    }
    Statement::new(sql, params)
}

/// `SELECT` of every introspected column, addressed by AND-ed equality over
/// key columns.
pub fn select_by_key(table: &TableSchema, key: &[(&Column, Value)]) -> Statement {
    let (where_clause, params) = equality_clause(key, 1);
    Statement::new(
        format!(
            "SELECT {} FROM {} WHERE {}",
            column_list(table),
            quote_identifier(&table.name),
            where_clause
        ),
        params,
    )
}

/// `INSERT` with an explicit column list, or `DEFAULT VALUES` when empty.
pub fn insert(table: &TableSchema, values: Vec<(&Column, Value)>) -> Statement {
    if values.is_empty() {
        return Statement::new(
            format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(&table.name)),
            Vec::new(),
        );
    }
    let columns: Vec<String> = values
        .iter()
        .map(|(column, _)| quote_identifier(&column.name))
        .collect();
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
    let params = values.into_iter().map(|(_, value)| value).collect();
    Statement::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(&table.name),
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    )
}

/// `UPDATE ... SET` filtered by AND-ed equality over key columns.
///
/// `set` must not be empty; an empty key is never accepted by callers.
pub fn update(
    table: &TableSchema,
    set: Vec<(&Column, Value)>,
    key: &[(&Column, Value)],
) -> Statement {
    let mut params = Vec::with_capacity(set.len() + key.len());
    let assignments: Vec<String> = set
        .into_iter()
        .enumerate()
        .map(|(i, (column, value))| {
            params.push(value);
            format!("{} = ?{}", quote_identifier(&column.name), i + 1)
        })
        .collect();
    let (where_clause, key_params) = equality_clause(key, params.len() + 1);
    params.extend(key_params);
    Statement::new(
        format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(&table.name),
            assignments.join(", "),
            where_clause
        ),
        params,
    )
}

/// `DROP TABLE` for an introspected table name.
pub fn drop_table(table_name: &str) -> Statement {
    Statement::new(format!("DROP TABLE {}", quote_identifier(table_name)), Vec::new())
}

fn column_list(table: &TableSchema) -> String {
    table
        .columns
        .iter()
        .map(|column| quote_identifier(&column.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn equality_term(column: &Column, placeholder: usize) -> String {
    let name = quote_identifier(&column.name);
    match column.kind {
        ColumnKind::Timestamp => format!("julianday({}) = julianday(?{})", name, placeholder),
        _ => format!("{} = ?{}", name, placeholder),
    }
}

fn equality_clause(key: &[(&Column, Value)], first_placeholder: usize) -> (String, Vec<Value>) {
    let clause = key
        .iter()
        .enumerate()
        .map(|(i, (column, _))| equality_term(column, first_placeholder + i))
        .collect::<Vec<_>>()
        .join(" AND ");
    let params = key.iter().map(|(_, value)| value.clone()).collect();
    (clause, params)
}
