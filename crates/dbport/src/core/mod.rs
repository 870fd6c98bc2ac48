//! Core abstractions shared by translation and migration.
//!
//! - [`schema`]: schema snapshot records and the fetch filter
//! - [`value`]: SQL value representation, rows and paged data sets
//! - [`traits`]: dialect, connection and metadata catalog contracts
//! - [`context`]: per-run cancellation, error latch and feedback
//! - [`identifier`]: identifier quoting helpers
//! - [`dbtype`]: the supported engines

pub mod context;
pub mod dbtype;
pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use context::{feedback_channel, FeedbackInfo, FeedbackInfoType, FeedbackSender, RunContext};
pub use dbtype::DatabaseType;
pub use schema::{
    DatabaseObjectType, DbObject, SchemaFilter, SchemaSnapshot, ScriptDbObject, ScriptObject,
    Table, TableColumn, TableConstraint, TableForeignKey, TableIndex, TablePrimaryKey,
    TableTrigger,
};
pub use traits::{
    Connection, Dialect, MetadataCatalog, PageQuery, Parameter, RenderMode, ROW_NUMBER_COLUMN,
};
pub use value::{PagedDataSet, Row, SqlValue};
