//! Schema definition, schema file loading and column type inference.

use crate::error::{ErrorKind, Result, ResultExt, ValidationError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    Null,
    Unknown,
}

impl ColumnType {
    /// Map a dtype label from a schema file (`int64`, `float`, `object`, ...) onto a type.
    pub fn from_dtype(dtype: &str) -> Self {
        match dtype.trim().to_ascii_lowercase().as_str() {
            "int" | "int8" | "int16" | "int32" | "int64" | "integer" | "uint8" | "uint16"
            | "uint32" | "uint64" => Self::Integer,
            "float" | "float16" | "float32" | "float64" | "double" | "number" | "numeric" => {
                Self::Float
            }
            "bool" | "boolean" => Self::Boolean,
            "str" | "string" | "object" | "category" | "categorical" | "text" => Self::String,
            "null" | "none" => Self::Null,
            _ => Self::Unknown,
        }
    }

    /// Integer and float columns are compared with a distribution test on values.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Whether a column inferred as `observed` satisfies a declared type of `self`.
    pub fn accepts(self, observed: ColumnType) -> bool {
        match (self, observed) {
            (Self::Unknown, _) | (_, Self::Null) => true,
            (Self::Float, Self::Integer) => true,
            (declared, observed) => declared == observed,
        }
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
}

/// Schema definition for a dataset: the authoritative, ordered column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub columns: Vec<ColumnSchema>,
    /// Columns the schema explicitly marks as numerical features.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numerical_columns: Vec<String>,
}

impl SchemaDefinition {
    /// Build a schema from `(name, dtype)` pairs. Fails on an empty list.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        let columns: Vec<ColumnSchema> = columns
            .into_iter()
            .map(|(name, dtype)| ColumnSchema {
                name: name.into(),
                dtype,
            })
            .collect();
        if columns.is_empty() {
            return Err(ValidationError::new(
                "build_schema",
                ErrorKind::schema("schema must declare at least one column"),
            ));
        }
        Ok(Self {
            columns,
            numerical_columns: Vec::new(),
        })
    }

    /// Number of columns a conforming dataset must have.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// One entry of the `columns:` list in a schema file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColumn {
    Bare(String),
    Typed(IndexMap<String, String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColumns {
    List(Vec<RawColumn>),
    Map(IndexMap<String, String>),
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    columns: RawColumns,
    #[serde(default)]
    numerical_columns: Vec<String>,
}

/// Parse a YAML schema description.
///
/// Accepts `columns:` as a list of single-entry maps (`- age: int64`), a list of
/// bare names, or a plain mapping. An optional `numerical_columns:` list is kept.
pub fn parse_schema(source: &str) -> Result<SchemaDefinition> {
    let raw: RawSchema = serde_yaml::from_str(source).during("parse_schema")?;

    let mut columns = Vec::new();
    match raw.columns {
        RawColumns::Map(map) => {
            for (name, dtype) in map {
                columns.push((name, ColumnType::from_dtype(&dtype)));
            }
        }
        RawColumns::List(list) => {
            for entry in list {
                match entry {
                    RawColumn::Bare(name) => columns.push((name, ColumnType::Unknown)),
                    RawColumn::Typed(map) => {
                        for (name, dtype) in map {
                            columns.push((name, ColumnType::from_dtype(&dtype)));
                        }
                    }
                }
            }
        }
    }

    let mut schema = SchemaDefinition::new(columns)?;
    for name in &raw.numerical_columns {
        if schema.column(name).is_none() {
            return Err(ValidationError::new(
                "parse_schema",
                ErrorKind::schema(format!("numerical column '{name}' is not a declared column")),
            ));
        }
    }
    schema.numerical_columns = raw.numerical_columns;
    Ok(schema)
}

/// Load the schema file at `path`.
pub fn load_schema(path: &Path) -> Result<SchemaDefinition> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ValidationError::new(
            "load_schema",
            ErrorKind::load(path, format!("failed to read schema file: {e}")),
        )
    })?;
    let schema = parse_schema(&content)?;
    tracing::debug!(path = %path.display(), columns = schema.len(), "Loaded schema");
    Ok(schema)
}

/// Tokens that are read as a missing value regardless of column type.
const MISSING_SENTINELS: &[&str] = &[
    "", "na", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "none",
];

/// Whether a raw cell holds a missing-value sentinel.
pub fn is_missing(cell: &str) -> bool {
    MISSING_SENTINELS.contains(&cell.trim())
}

/// Infer column type from raw text cells. Missing sentinels are ignored.
pub fn infer_column_type<'a, I>(cells: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = false;
    let mut has_int = false;
    let mut has_float = false;
    let mut has_bool = false;
    let mut has_string = false;

    for cell in cells {
        if is_missing(cell) {
            continue;
        }
        seen = true;
        let s = cell.trim();
        if s.parse::<i64>().is_ok() {
            has_int = true;
        } else if s.parse::<f64>().is_ok_and(f64::is_finite) {
            has_float = true;
        } else if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
            has_bool = true;
        } else {
            has_string = true;
        }
    }

    if !seen {
        return ColumnType::Null;
    }
    if has_string || (has_bool && (has_int || has_float)) {
        return ColumnType::String;
    }
    if has_float {
        return ColumnType::Float;
    }
    if has_int {
        return ColumnType::Integer;
    }
    if has_bool {
        return ColumnType::Boolean;
    }
    ColumnType::Unknown
}
