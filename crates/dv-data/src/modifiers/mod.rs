//! Modifiers derive a table from another one.
//!
//! A modifier is configuration only. It receives the table to work on as an
//! argument; [`DataTable`] calls the incremental hooks after each mutation of
//! its own data so the derived table stays current.

mod chain;
mod group;
mod range;
mod sort;

use std::fmt;
use std::sync::Arc;

use dv_core::events::{EventDetail, HandlerId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::events::{ModifierEvent, ModifierEventKind, ModifierEvents, ModifierHandler};
use crate::table::{CellValue, ColumnCollection, DataTable, RowInput};
use crate::DataError;

pub use chain::{ChainModifier, ChainModifierOptions};
pub use group::{GroupModifier, GroupModifierOptions};
pub use range::{RangeCombine, RangeModifier, RangeModifierOptions, RangeOptions};
pub use sort::{SortDirection, SortModifier, SortModifierOptions};

/// Serialized modifier: kind tag plus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierJson {
    #[serde(rename = "$class")]
    pub class: String,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// Transformation producing a derived table from a source table.
///
/// The incremental hooks receive the already updated source `table` and the
/// derived table to patch in place. Whatever they do, `modified` must end up
/// equal to a fresh [`modify`](Self::modify) over a copy of `table`.
pub trait DataModifier: fmt::Debug + Send + Sync {
    /// Kind tag used as `$class` in JSON
    fn class_name(&self) -> &'static str;

    fn events(&self) -> &ModifierEvents;

    /// Transform `table` in place
    fn apply(&self, table: &mut DataTable);

    /// Configuration only, never derived state
    fn to_json(&self) -> ModifierJson;

    fn on(&self, kind: ModifierEventKind, handler: Box<ModifierHandler>) -> HandlerId {
        self.events().on(kind, handler)
    }

    fn off(&self, id: HandlerId) -> bool {
        self.events().off(id)
    }

    fn emit(&self, kind: ModifierEventKind, table: &DataTable, detail: Option<&EventDetail>) {
        self.events().emit_with(kind, |handler| {
            handler(&ModifierEvent {
                kind,
                detail,
                table,
            })
        });
    }

    /// Full, non-incremental run wrapped in `Execute` / `AfterExecute`
    fn modify(&self, table: &mut DataTable, detail: Option<&EventDetail>) {
        self.emit(ModifierEventKind::Execute, table, detail);
        self.apply(table);
        tracing::trace!(
            modifier = self.class_name(),
            table = table.id(),
            rows = table.get_row_count(),
            "modifier executed"
        );
        self.emit(ModifierEventKind::AfterExecute, table, detail);
    }

    /// Re-derive `modified` from scratch, keeping its identity
    fn rebuild(&self, table: &DataTable, modified: &mut DataTable, detail: Option<&EventDetail>) {
        let mut derived = table.detached_copy();
        self.modify(&mut derived, detail);
        let (columns, row_count) = derived.into_parts();
        modified.replace_contents(columns, row_count, detail);
    }

    fn modify_cell(
        &self,
        table: &DataTable,
        modified: &mut DataTable,
        _column: &str,
        _row_index: usize,
        _value: &CellValue,
        detail: Option<&EventDetail>,
    ) {
        self.rebuild(table, modified, detail);
    }

    fn modify_columns(
        &self,
        table: &DataTable,
        modified: &mut DataTable,
        _columns: &ColumnCollection,
        _row_index: Option<usize>,
        detail: Option<&EventDetail>,
    ) {
        self.rebuild(table, modified, detail);
    }

    fn modify_rows(
        &self,
        table: &DataTable,
        modified: &mut DataTable,
        _rows: &[RowInput],
        _row_index: Option<usize>,
        detail: Option<&EventDetail>,
    ) {
        self.rebuild(table, modified, detail);
    }
}

/// Reconstruct a modifier from its JSON form, dispatching on `$class`
pub fn modifier_from_json(json: &ModifierJson) -> Result<Arc<dyn DataModifier>, DataError> {
    let modifier: Arc<dyn DataModifier> = match json.class.as_str() {
        RangeModifier::CLASS_NAME => Arc::new(RangeModifier::new(parse_options(&json.options)?)),
        SortModifier::CLASS_NAME => Arc::new(SortModifier::new(parse_options(&json.options)?)),
        GroupModifier::CLASS_NAME => Arc::new(GroupModifier::new(parse_options(&json.options)?)),
        ChainModifier::CLASS_NAME => {
            Arc::new(ChainModifier::from_options(parse_options(&json.options)?)?)
        }
        other => return Err(DataError::UnknownModifier(other.to_string())),
    };
    Ok(modifier)
}

/// Missing options fall back to the defaults
fn parse_options<T: DeserializeOwned + Default>(options: &serde_json::Value) -> Result<T, DataError> {
    if options.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(options.clone())?)
}
