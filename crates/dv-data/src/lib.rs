//! Columnar data tables and the modifier pipeline for the visualization platform
//!
//! A [`DataTable`] owns its columns and, when a [`DataModifier`] is attached,
//! a derived table (`modified`) that is kept current on every mutation.

pub mod convert;
pub mod events;
pub mod modifiers;
pub mod table;

use arrow::error::ArrowError;
use thiserror::Error;

// Re-exports
pub use events::{ModifierEvent, ModifierEventKind, TableEvent, TableEventKind};
pub use modifiers::{
    modifier_from_json, ChainModifier, DataModifier, GroupModifier, ModifierJson, RangeModifier,
    SortModifier,
};
pub use table::{
    column, compare_cells, row_object, CellValue, Column, ColumnCollection, DataTable, Row,
    RowInput, RowObject, TableSnapshot,
};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Arrow error: {0}")]
    Arrow(ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown modifier class: {0}")]
    UnknownModifier(String),

    #[error("Invalid table snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<ArrowError> for DataError {
    fn from(error: ArrowError) -> Self {
        DataError::Arrow(error)
    }
}
