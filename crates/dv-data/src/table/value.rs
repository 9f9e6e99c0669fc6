//! Cell values and the comparison rules used by filtering and sorting

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ColumnCollection, DataTable};

/// A single cell value in a table
#[derive(Debug, Clone)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    /// Reference to a nested table, e.g. a group produced by `GroupModifier`
    Table(Arc<DataTable>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Null => false,
            CellValue::Boolean(b) => *b,
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CellValue::String(s) => !s.is_empty(),
            CellValue::Table(_) => true,
        }
    }

    /// Numeric reading of the cell. Strings are parsed, booleans map to 1/0.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::String(s) => s.trim().parse::<f64>().ok(),
            CellValue::Null | CellValue::Table(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Arc<DataTable>> {
        match self {
            CellValue::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Comparison key with the falsy-as-zero fallback applied
    fn sort_key(&self) -> SortKey<'_> {
        match self {
            CellValue::Null => SortKey::Number(0.0),
            CellValue::Boolean(b) => SortKey::Number(if *b { 1.0 } else { 0.0 }),
            CellValue::Number(n) if n.is_nan() => SortKey::Number(0.0),
            CellValue::Number(n) => SortKey::Number(*n),
            CellValue::String(s) if s.is_empty() => SortKey::Number(0.0),
            CellValue::String(s) => SortKey::Text(s),
            CellValue::Table(_) => SortKey::Opaque,
        }
    }

    /// Inclusive range test. The value and both bounds must land in the same
    /// comparison class (numeric or text) once the falsy fallback is applied.
    pub fn in_range(&self, min: &CellValue, max: &CellValue) -> bool {
        match (self.sort_key(), min.sort_key(), max.sort_key()) {
            (SortKey::Number(v), SortKey::Number(lo), SortKey::Number(hi)) => lo <= v && v <= hi,
            (SortKey::Text(v), SortKey::Text(lo), SortKey::Text(hi)) => lo <= v && v <= hi,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SortKey<'a> {
    Number(f64),
    Text(&'a str),
    Opaque,
}

impl SortKey<'_> {
    fn class(&self) -> u8 {
        match self {
            SortKey::Number(_) => 0,
            SortKey::Text(_) => 1,
            SortKey::Opaque => 2,
        }
    }
}

/// Compare two cells, treating missing or falsy values as zero.
///
/// Numbers compare numerically and strings by code point. Across classes the
/// order is numbers, then strings, then nested tables, so the result is a
/// total order usable by stable sorts.
pub fn compare_cells(a: &CellValue, b: &CellValue) -> Ordering {
    match (a.sort_key(), b.sort_key()) {
        // NaN never reaches here, it is folded into zero
        (SortKey::Number(x), SortKey::Number(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        (x, y) => x.class().cmp(&y.class()),
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a == b,
            (CellValue::Number(a), CellValue::Number(b)) => a == b,
            (CellValue::String(a), CellValue::String(b)) => a == b,
            (CellValue::Table(a), CellValue::Table(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Null
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, ""),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Table(table) => write!(f, "[table {}]", table.id()),
        }
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CellValue {
                fn from(value: $t) -> Self {
                    CellValue::Number(value as f64)
                }
            }
        )*
    }
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<Arc<DataTable>> for CellValue {
    fn from(value: Arc<DataTable>) -> Self {
        CellValue::Table(value)
    }
}

impl From<DataTable> for CellValue {
    fn from(value: DataTable) -> Self {
        CellValue::Table(Arc::new(value))
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Boolean(b) => serializer.serialize_bool(*b),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::String(s) => serializer.serialize_str(s),
            CellValue::Table(table) => table.columns_ref().serialize(serializer),
        }
    }
}

/// Wire shape of a cell; objects are nested tables
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCell {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Table(ColumnCollection),
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawCell::deserialize(deserializer)? {
            RawCell::Null => CellValue::Null,
            RawCell::Boolean(b) => CellValue::Boolean(b),
            RawCell::Number(n) => CellValue::Number(n),
            RawCell::String(s) => CellValue::String(s),
            RawCell::Table(columns) => CellValue::Table(Arc::new(DataTable::from_columns(columns))),
        })
    }
}
