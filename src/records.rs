//! Record operations against tables discovered at runtime.
//!
//! Every call opens its own [`Session`], re-introspects the target table,
//! validates the request against it, and runs at most one data statement.
//! Writes run inside a transaction that commits on success; the session is
//! released when the call returns, whichever way it returns.

use crate::core::db::{self, query, Column, ConnectionProvider, ResultSet, Session, SessionState, TableSchema};
use crate::core::{RecadminError, Result};
use crate::sql;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Column name to value. Keys must name columns of the target table.
pub type Record = BTreeMap<String, Value>;

/// Primary-key column name to value, covering every key column.
pub type KeySelector = BTreeMap<String, Value>;

/// A request that was deliberately not carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// List target has no columns, i.e. does not exist
    NoSuchTable(String),
    /// Insert called with an empty record
    NoRecordData,
    /// Update left with nothing to set once key columns are removed
    NoUpdateData,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::NoSuchTable(table) => write!(f, "no such table: {}", table),
            Skip::NoRecordData => f.write_str("no record data"),
            Skip::NoUpdateData => f.write_str("no update data"),
        }
    }
}

/// Result of a record operation that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(ResultSet),
    Inserted { table: String, rows: usize },
    Updated { table: String, rows: usize },
    Dropped { table: String },
    Skipped(Skip),
}

impl Outcome {
    /// False for skipped requests, which callers report with a non-zero status.
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Skipped(_))
    }
}

/// Entry point for record administration over a connection provider
pub struct Records<P> {
    provider: P,
}

impl<P: ConnectionProvider> Records<P> {
    pub fn new(provider: P) -> Self {
        Records { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn session(&self) -> Result<Session<'_>> {
        Session::open(&self.provider)
    }

    /// Names of all user tables, ordered by name.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let session = self.session()?;
        db::list_tables(session.connection())
    }

    /// Introspects a table's columns.
    ///
    /// # Errors
    ///
    /// `SchemaNotFound` when the table does not exist.
    pub fn describe(&self, table_name: &str) -> Result<TableSchema> {
        let session = self.session()?;
        session.validated(TableSchema::load(session.connection(), table_name))
    }

    /// Returns every row of a table.
    ///
    /// A missing table is reported as `Skip::NoSuchTable` without querying.
    pub fn list(&self, table_name: &str) -> Result<Outcome> {
        let session = self.session()?;
        let table = match TableSchema::load(session.connection(), table_name) {
            Ok(table) => table,
            Err(RecadminError::SchemaNotFound(name)) => {
                session.set_state(SessionState::Rejected);
                warn!(table = %name, "list skipped: no such table");
                return Ok(Outcome::Skipped(Skip::NoSuchTable(name)));
            }
            Err(err) => return Err(err),
        };
        session.set_state(SessionState::Validated);

        let rows = query::query(&session, &table, &sql::select(&table, None))?;
        session.set_state(SessionState::Executed);
        Ok(Outcome::Rows(rows))
    }

    /// Inserts one record.
    ///
    /// An empty record is skipped before any connection is opened.
    /// Autoincrement key columns are left to the database even when present
    /// in the record.
    ///
    /// # Errors
    ///
    /// `SchemaNotFound`, `UnknownColumn`, or `ConstraintViolation` (rolled back).
    pub fn insert(&self, table_name: &str, record: Record) -> Result<Outcome> {
        if record.is_empty() {
            warn!(table = table_name, "insert skipped: no record data");
            return Ok(Outcome::Skipped(Skip::NoRecordData));
        }

        let session = self.session()?;
        let table = session.validated(
            TableSchema::load(session.connection(), table_name)
                .and_then(|table| check_columns(&table, record.keys()).map(|_| table)),
        )?;

        let mut values: Vec<(&Column, Value)> = Vec::with_capacity(record.len());
        for column in &table.columns {
            let Some(value) = record.get(&column.name) else {
                continue;
            };
            if column.is_primary_key() && column.autoincrement {
                debug!(column = %column.name, "omitting autoincrement key");
                continue;
            }
            values.push((column, value.clone()));
        }

        let stmt = sql::insert(&table, values);
        debug!(params = stmt.params.len(), "insert");
        let rows = session.write(|conn| query::execute(&session, conn, &stmt))?;
        info!(table = table_name, rows, "inserted");
        Ok(Outcome::Inserted {
            table: table.name,
            rows,
        })
    }

    /// Returns all rows, or the rows whose `column` equals `value`.
    ///
    /// The value must already be coerced to the column's kind.
    ///
    /// # Errors
    ///
    /// `SchemaNotFound` or `UnknownColumn`.
    pub fn select(&self, table_name: &str, filter: Option<(&str, Value)>) -> Result<ResultSet> {
        let session = self.session()?;
        let table = session.validated(TableSchema::load(session.connection(), table_name))?;

        let stmt = match filter {
            Some((column_name, value)) => {
                let column = session.validated(table.require_column(column_name))?;
                sql::select(&table, Some((column, value)))
            }
            None => sql::select(&table, None),
        };

        let rows = query::query(&session, &table, &stmt)?;
        session.set_state(SessionState::Executed);
        Ok(rows)
    }

    /// Fetches the row addressed by a complete primary-key selector.
    ///
    /// # Errors
    ///
    /// `SchemaNotFound`, `NoPrimaryKey` or `IncompleteKey`.
    pub fn fetch_record(&self, table_name: &str, selector: &KeySelector) -> Result<Option<Record>> {
        let session = self.session()?;
        let table = session.validated(TableSchema::load(session.connection(), table_name))?;
        let key = session.validated(resolve_key(&table, selector))?;
        fetch(&session, &table, &key)
    }

    /// Updates the single row addressed by `selector`.
    ///
    /// Key columns in `data` are ignored. The row is fetched first; nothing
    /// is written when it does not exist or when there is nothing to set.
    ///
    /// # Errors
    ///
    /// `SchemaNotFound`, `NoPrimaryKey` (never an unscoped update),
    /// `IncompleteKey`, `UnknownColumn`, `RecordNotFound`, or
    /// `ConstraintViolation` (rolled back).
    pub fn update(&self, table_name: &str, selector: &KeySelector, data: Record) -> Result<Outcome> {
        let session = self.session()?;
        let table = session.validated(TableSchema::load(session.connection(), table_name))?;
        let key = session.validated(resolve_key(&table, selector))?;
        session.validated(check_columns(&table, data.keys()))?;

        if fetch(&session, &table, &key)?.is_none() {
            session.set_state(SessionState::Rejected);
            warn!(table = table_name, "update rejected: record not found");
            return Err(RecadminError::RecordNotFound);
        }

        let set: Vec<(&Column, Value)> = table
            .columns
            .iter()
            .filter(|column| !column.is_primary_key())
            .filter_map(|column| data.get(&column.name).map(|value| (column, value.clone())))
            .collect();
        if set.is_empty() {
            warn!(table = table_name, "update skipped: no update data");
            return Ok(Outcome::Skipped(Skip::NoUpdateData));
        }

        let stmt = sql::update(&table, set, &key);
        debug!(params = stmt.params.len(), "update");
        let rows = session.write(|conn| query::execute(&session, conn, &stmt))?;
        info!(table = table_name, rows, "updated");
        Ok(Outcome::Updated {
            table: table.name.clone(),
            rows,
        })
    }

    /// Drops a table reported by [`Records::list_tables`].
    ///
    /// # Errors
    ///
    /// `SchemaNotFound` before any DROP is issued when the name is unknown.
    pub fn drop_table(&self, table_name: &str) -> Result<Outcome> {
        let session = self.session()?;
        let tables = db::list_tables(session.connection())?;
        let table = session.validated(
            tables
                .into_iter()
                .find(|name| name == table_name)
                .ok_or_else(|| RecadminError::SchemaNotFound(table_name.to_string())),
        )?;

        let stmt = sql::drop_table(&table);
        session.write(|conn| query::execute(&session, conn, &stmt))?;
        info!(table = %table, "dropped");
        Ok(Outcome::Dropped { table })
    }
}

fn check_columns<'a>(table: &TableSchema, names: impl Iterator<Item = &'a String>) -> Result<()> {
    for name in names {
        table.require_column(name)?;
    }
    Ok(())
}

/// Pairs each key column with its selector value, requiring an exact match
/// between the selector's names and the table's key columns.
fn resolve_key<'t>(table: &'t TableSchema, selector: &KeySelector) -> Result<Vec<(&'t Column, Value)>> {
    let keys = table.primary_key();
    if keys.is_empty() {
        return Err(RecadminError::NoPrimaryKey(table.name.clone()));
    }

    let mut resolved = Vec::with_capacity(keys.len());
    for column in &keys {
        match selector.get(&column.name) {
            Some(value) => resolved.push((*column, value.clone())),
            None => break,
        }
    }
    if resolved.len() != keys.len() || selector.len() != keys.len() {
        return Err(RecadminError::IncompleteKey {
            table: table.name.clone(),
            expected: keys.iter().map(|c| c.name.clone()).collect(),
        });
    }
    Ok(resolved)
}

fn fetch(session: &Session<'_>, table: &TableSchema, key: &[(&Column, Value)]) -> Result<Option<Record>> {
    let rows = query::query(session, table, &sql::select_by_key(table, key))?;
    Ok(rows.rows.into_iter().next().map(|row| {
        rows.columns
            .iter()
            .cloned()
            .zip(row)
            .collect::<Record>()
    }))
}
