//! Prompt-driven front end over [`Records`].
//!
//! Each command asks for a table (and then columns or values), forwards
//! already-coerced arguments to the record operations and prints the rows.
//! Handled failures are printed as a status line and give exit status 1;
//! driver failures are returned to the caller.

use crate::config::OutputFormat;
use crate::core::db::{Column, ConnectionProvider, ResultSet};
use crate::core::{RecadminError, Result};
use crate::records::{KeySelector, Outcome, Record, Records};
use crate::value::{ColumnKind, Value};
use chrono::{Timelike, Utc};
use std::io::{BufRead, Write};
use tracing::debug;

/// One shell command, named after the operation it drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tables,
    Ls,
    Insert,
    Select,
    Update,
    Drop,
}

impl Command {
    /// Parses a command name as typed on the command line.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "tables" => Some(Command::Tables),
            "ls" | "list" => Some(Command::Ls),
            "insert" => Some(Command::Insert),
            "select" => Some(Command::Select),
            "update" => Some(Command::Update),
            "drop" => Some(Command::Drop),
            _ => None,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Command::Tables | Command::Ls => "list",
            Command::Insert => "insert",
            Command::Select => "select",
            Command::Update => "update",
            Command::Drop => "drop",
        }
    }
}

/// Prompt loop bound to an input and an output stream
pub struct Shell<'r, P, R, W> {
    records: &'r Records<P>,
    input: R,
    output: W,
    format: OutputFormat,
}

impl<'r, P, R, W> Shell<'r, P, R, W>
where
    P: ConnectionProvider,
    R: BufRead,
    W: Write,
{
    pub fn new(records: &'r Records<P>, input: R, output: W) -> Self {
        Shell {
            records,
            input,
            output,
            format: OutputFormat::default(),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs one command to completion and returns its exit status.
    pub fn run(&mut self, command: Command) -> Result<i32> {
        debug!(?command, "running shell command");
        match command {
            Command::Tables => self.tables(),
            Command::Ls => self.ls(),
            Command::Insert => self.insert(),
            Command::Select => self.select(),
            Command::Update => self.update(),
            Command::Drop => self.drop_table(),
        }
    }

    fn tables(&mut self) -> Result<i32> {
        let tables = self.records.list_tables()?;
        if tables.is_empty() {
            self.say("tables are nothing")?;
        }
        for table in tables {
            self.say(&table)?;
        }
        Ok(0)
    }

    fn ls(&mut self) -> Result<i32> {
        let Some(table) = self.choose_table(Command::Ls)? else {
            return Ok(1);
        };
        self.list_table(&table)
    }

    fn insert(&mut self) -> Result<i32> {
        let Some(table) = self.choose_table(Command::Insert)? else {
            return Ok(1);
        };
        let schema = match self.records.describe(&table) {
            Ok(schema) => schema,
            Err(err) => return self.report(err),
        };

        let mut record = Record::new();
        for column in schema.columns.iter().filter(|c| !(c.is_primary_key() && c.autoincrement)) {
            match self.prompt_insert_value(column)? {
                Prompted::Value(value) => {
                    record.insert(column.name.clone(), value);
                }
                Prompted::Skip => {}
                Prompted::Eof => return Ok(1),
            }
        }

        match self.records.insert(&table, record) {
            Ok(Outcome::Skipped(skip)) => {
                self.say(&skip.to_string())?;
                Ok(1)
            }
            Ok(_) => self.list_table(&table),
            Err(err) => self.report(err),
        }
    }

    fn select(&mut self) -> Result<i32> {
        let Some(table) = self.choose_table(Command::Select)? else {
            return Ok(1);
        };
        let schema = match self.records.describe(&table) {
            Ok(schema) => schema,
            Err(err) => return self.report(err),
        };

        let Some(column_name) = self.prompt("select column name (blank for all): ")? else {
            return Ok(1);
        };
        let filter = if column_name.is_empty() {
            None
        } else {
            let Some(column) = schema.column(&column_name) else {
                self.say(&format!("column not found: {}", column_name))?;
                return Ok(1);
            };
            let Some(raw) = self.prompt(&format!("value for {}: ", column.name))? else {
                return Ok(1);
            };
            match self.coerce_required(column, &raw)? {
                Some(value) => Some((column.name.clone(), value)),
                None => return Ok(1),
            }
        };

        let filter = filter.as_ref().map(|(name, value)| (name.as_str(), value.clone()));
        match self.records.select(&table, filter) {
            Ok(rows) => {
                self.print_rows(&rows)?;
                Ok(0)
            }
            Err(err) => self.report(err),
        }
    }

    fn update(&mut self) -> Result<i32> {
        let Some(table) = self.choose_table(Command::Update)? else {
            return Ok(1);
        };
        let schema = match self.records.describe(&table) {
            Ok(schema) => schema,
            Err(err) => return self.report(err),
        };
        let keys = schema.primary_key();
        if keys.is_empty() {
            return self.report(RecadminError::NoPrimaryKey(table));
        }

        let mut selector = KeySelector::new();
        for column in keys {
            let Some(raw) = self.prompt(&format!("primary key value for {}: ", column.name))? else {
                return Ok(1);
            };
            match self.coerce_required(column, &raw)? {
                Some(value) => {
                    selector.insert(column.name.clone(), value);
                }
                None => return Ok(1),
            }
        }

        let current = match self.records.fetch_record(&table, &selector) {
            Ok(Some(row)) => row,
            Ok(None) => return self.report(RecadminError::RecordNotFound),
            Err(err) => return self.report(err),
        };

        let mut data = Record::new();
        for column in schema.columns.iter().filter(|c| !c.is_primary_key()) {
            let shown = current.get(&column.name).map(Value::to_string).unwrap_or_default();
            let prompt = if shown.is_empty() {
                format!("{}: ", column.name)
            } else {
                format!("{} [{}]: ", column.name, shown)
            };
            let Some(raw) = self.prompt(&prompt)? else {
                return Ok(1);
            };
            if raw.is_empty() {
                continue;
            }
            match column.coerce(&raw) {
                Ok(value) => {
                    data.insert(column.name.clone(), value);
                }
                Err(_) => {
                    self.say(&format!("invalid value: {}", column.name))?;
                    return Ok(1);
                }
            }
        }

        match self.records.update(&table, &selector, data) {
            Ok(Outcome::Skipped(skip)) => {
                self.say(&skip.to_string())?;
                Ok(1)
            }
            Ok(_) => {
                self.say(&format!("updated: {}", table))?;
                self.list_table(&table)
            }
            Err(err) => self.report(err),
        }
    }

    fn drop_table(&mut self) -> Result<i32> {
        let Some(table) = self.choose_table(Command::Drop)? else {
            return Ok(1);
        };
        match self.records.drop_table(&table) {
            Ok(_) => {
                self.say(&format!("dropped: {}", table))?;
                Ok(0)
            }
            Err(err) => self.report(err),
        }
    }

    /// Prints the table list and asks for one of them.
    fn choose_table(&mut self, command: Command) -> Result<Option<String>> {
        let tables = self.records.list_tables()?;
        if tables.is_empty() {
            self.say("no tables found")?;
            return Ok(None);
        }
        for table in &tables {
            self.say(table)?;
        }
        let Some(name) = self.prompt(&format!("{} table name: ", command.verb()))? else {
            return Ok(None);
        };
        if !tables.contains(&name) {
            self.say(&format!("table not found: {}", name))?;
            return Ok(None);
        }
        Ok(Some(name))
    }

    fn list_table(&mut self, table: &str) -> Result<i32> {
        match self.records.list(table) {
            Ok(Outcome::Rows(rows)) => {
                self.print_rows(&rows)?;
                Ok(0)
            }
            Ok(Outcome::Skipped(skip)) => {
                self.say(&skip.to_string())?;
                Ok(1)
            }
            Ok(_) => Ok(0),
            Err(err) => self.report(err),
        }
    }

    /// Asks for one insert value until it is valid, blank-and-optional, or
    /// input ends. Timestamps default to the current UTC time.
    fn prompt_insert_value(&mut self, column: &Column) -> Result<Prompted> {
        let now = (column.kind == ColumnKind::Timestamp)
            .then(|| Utc::now().naive_utc().with_nanosecond(0))
            .flatten();
        let prompt = match now {
            Some(now) => format!("{} [{}]: ", column.name, now.format("%Y-%m-%dT%H:%M:%S")),
            None => format!("{}: ", column.name),
        };

        loop {
            let Some(raw) = self.prompt(&prompt)? else {
                return Ok(Prompted::Eof);
            };
            if raw.is_empty() {
                if let Some(now) = now {
                    return Ok(Prompted::Value(Value::Timestamp(now)));
                }
                if !column.is_required() {
                    return Ok(Prompted::Skip);
                }
                self.say(&format!("value required: {}", column.name))?;
                continue;
            }
            match column.coerce(&raw) {
                Ok(value) => return Ok(Prompted::Value(value)),
                Err(_) => self.say(&format!("invalid value: {}", column.name))?,
            }
        }
    }

    /// Coerces a token that must not be blank, printing why when it fails.
    fn coerce_required(&mut self, column: &Column, raw: &str) -> Result<Option<Value>> {
        if raw.is_empty() {
            self.say(&format!("value required: {}", column.name))?;
            return Ok(None);
        }
        match column.coerce(raw) {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                self.say(&format!("invalid value: {}", column.name))?;
                Ok(None)
            }
        }
    }

    fn print_rows(&mut self, rows: &ResultSet) -> Result<()> {
        if rows.is_empty() {
            return self.say("no records found");
        }
        match self.format {
            OutputFormat::Tsv => write!(self.output, "{}", rows.render_tsv())?,
            OutputFormat::Json => writeln!(self.output, "{}", rows.render_json()?)?,
        }
        Ok(())
    }

    /// Prints a handled error as a status line; anything else propagates.
    fn report(&mut self, err: RecadminError) -> Result<i32> {
        if !err.is_recoverable() {
            return Err(err);
        }
        self.say(&err.to_string())?;
        Ok(1)
    }

    /// Writes a prompt and reads one trimmed line, `None` at end of input.
    fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&mut self, line: &str) -> Result<()> {
        writeln!(self.output, "{}", line)?;
        Ok(())
    }
}

enum Prompted {
    Value(Value),
    Skip,
    Eof,
}
