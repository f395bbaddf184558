//! Core abstractions shared by the readers, writers and orchestrator.
//!
//! - [`schema`]: destination column metadata and source table contents
//! - [`value`]: SQL values and boolean-column conversion
//! - [`plan`]: column intersection between the two sides
//! - [`traits`]: source reader and target writer seams
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod plan;
pub mod schema;
pub mod traits;
pub mod value;

pub use plan::{PlannedColumn, TablePlan};
pub use schema::{SourceTable, TargetColumn};
pub use traits::{SourceReader, TargetWriter};
pub use value::{BooleanColumns, Row, SqlValue};
