//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: SQL spelling for PostgreSQL
//! - [`PgConnection`]: tokio-postgres session, TLS through rustls
//! - [`PgCatalog`]: `pg_catalog` / `information_schema` metadata queries

mod catalog;
mod connection;
mod dialect;

pub use catalog::PgCatalog;
pub use connection::PgConnection;
pub use dialect::PostgresDialect;
