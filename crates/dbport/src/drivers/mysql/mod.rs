//! MySQL dialect (translation and script target only).

mod dialect;

pub use dialect::MySqlDialect;
