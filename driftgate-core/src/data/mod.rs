//! Tabular data: schema definitions and in-memory datasets.

pub mod dataset;
pub mod schema;

pub use dataset::{Column, ColumnValues, Dataset, DatasetRole, read_dataset, write_dataset};
pub use schema::{ColumnSchema, ColumnType, SchemaDefinition, load_schema, parse_schema};
