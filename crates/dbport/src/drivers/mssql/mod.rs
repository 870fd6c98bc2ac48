//! Microsoft SQL Server driver.
//!
//! - [`SqlServerDialect`]: SQL spelling for SQL Server
//! - [`MssqlConnection`]: tiberius-backed session
//! - [`MssqlCatalog`]: `sys.*` metadata queries

mod catalog;
mod connection;
mod dialect;

pub use catalog::MssqlCatalog;
pub use connection::MssqlConnection;
pub use dialect::SqlServerDialect;
