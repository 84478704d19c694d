//! The tuple model: scalar types, typed values, rows, and the
//! column-name → position mapping threaded through every operator.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// A scalar column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScalarType {
    #[serde(rename = "STRING")]
    String,
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "FLOAT")]
    Float,
}

/// A decoded scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i32),
    Float(f32),
}

/// Serializes as the bare JSON scalar (string/number), not as a tagged
/// enum, which is what lets a `Row` serialize as a plain `{col: value}`
/// JSON object for the CLI's `run`/`scan` output.
impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i32(*i),
            Value::Float(f) => serializer.serialize_f32(*f),
        }
    }
}

impl Value {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Value::String(_) => ScalarType::String,
            Value::Int(_) => ScalarType::Int,
            Value::Float(_) => ScalarType::Float,
        }
    }

    /// Total order used by `sort` and the join/aggregate key comparisons.
    /// `STRING` compares by UTF-8 code point order; `INT`/`FLOAT` compare
    /// numerically. Comparing values of different types falls back to
    /// comparing their type tag, which never arises in practice since a
    /// column's values all share one `ScalarType`.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f32).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f32)),
            _ => self.scalar_type_rank().cmp(&other.scalar_type_rank()),
        }
    }

    fn scalar_type_rank(&self) -> u8 {
        match self {
            Value::String(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
        }
    }

    /// Parse a string field into a typed value per `ty`. Used both for
    /// CSV rows (every field starts life as a string) and for catalog
    /// driven coercion.
    pub fn parse(ty: ScalarType, raw: &str) -> Result<Value> {
        match ty {
            ScalarType::String => Ok(Value::String(raw.to_string())),
            ScalarType::Int => raw
                .parse::<i32>()
                .map(Value::Int)
                .map_err(|_| Error::SchemaViolation(format!("'{raw}' is not a valid INT"))),
            ScalarType::Float => raw
                .parse::<f32>()
                .map(Value::Float)
                .map_err(|_| Error::SchemaViolation(format!("'{raw}' is not a valid FLOAT"))),
        }
    }
}

/// A positional tuple. Arity and per-position types conform to some
/// `ColumnIndex`'s schema.
pub type Row = Vec<Value>;

/// The ordered list of column names paired with their scalar types, plus
/// the name → position lookup. Insertion order equals column order.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    columns: Vec<String>,
    schema: Vec<ScalarType>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn new(columns: Vec<String>, schema: Vec<ScalarType>) -> Self {
        assert_eq!(
            columns.len(),
            schema.len(),
            "columns and schema must have equal arity"
        );
        let positions = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            columns,
            schema,
            positions,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn schema(&self) -> &[ScalarType] {
        &self.schema
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn position(&self, name: &str) -> Result<usize> {
        self.positions
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn type_of(&self, name: &str) -> Result<ScalarType> {
        Ok(self.schema[self.position(name)?])
    }

    /// Convert a row of raw string fields (e.g. from a CSV reader) into a
    /// typed `Row`, conforming field-by-field to `self.schema()`.
    pub fn string_row_to_types(&self, raw: &[String]) -> Result<Row> {
        if raw.len() != self.arity() {
            return Err(Error::SchemaViolation(format!(
                "row has {} fields, expected {}",
                raw.len(),
                self.arity()
            )));
        }
        raw.iter()
            .zip(self.schema.iter())
            .map(|(field, ty)| Value::parse(*ty, field))
            .collect()
    }
}
