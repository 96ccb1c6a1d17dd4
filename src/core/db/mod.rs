/// Database Module
///
/// The database layer is split into three concerns:
/// - **Connection Management** (`connection.rs`): providers and per-operation sessions
/// - **Schema Introspection** (`schema.rs`): tables, columns and primary keys
/// - **Query Execution** (`query.rs`): running built statements and decoding rows
///
/// All operations use `RecadminError` for error propagation.
pub mod connection;
pub mod query;
pub mod schema;

pub use connection::*;
pub use query::*;
pub use schema::*;
