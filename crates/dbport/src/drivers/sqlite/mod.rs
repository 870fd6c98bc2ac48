//! SQLite driver.
//!
//! - [`SqliteDialect`]: SQL spelling for SQLite
//! - [`SqliteConnection`]: sqlx-backed session (file or `:memory:`)
//! - [`SqliteCatalog`]: `sqlite_master` and pragma table-valued functions

mod catalog;
mod connection;
mod dialect;

pub use catalog::SqliteCatalog;
pub use connection::SqliteConnection;
pub use dialect::SqliteDialect;
