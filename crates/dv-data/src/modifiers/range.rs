//! Filter rows by inclusive value ranges

use dv_core::events::EventDetail;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DataModifier, ModifierJson};
use crate::events::{ModifierEventKind, ModifierEvents};
use crate::table::{CellValue, ColumnCollection, DataTable, RowInput};

/// One inclusive range on a column. Numeric bounds compare numerically,
/// string bounds lexicographically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeOptions {
    pub column: String,
    pub min_value: CellValue,
    pub max_value: CellValue,
}

impl RangeOptions {
    pub fn new(
        column: impl Into<String>,
        min_value: impl Into<CellValue>,
        max_value: impl Into<CellValue>,
    ) -> Self {
        Self {
            column: column.into(),
            min_value: min_value.into(),
            max_value: max_value.into(),
        }
    }
}

/// How the configured ranges combine per row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeCombine {
    /// Keep a row that falls inside at least one range
    #[default]
    Any,
    /// Keep a row only if it falls inside every range
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RangeModifierOptions {
    pub ranges: Vec<RangeOptions>,
    pub combine: RangeCombine,
}

/// Keeps the rows whose values fall inside the configured ranges, in their
/// original order. Without ranges the table is left as is.
#[derive(Debug, Default)]
pub struct RangeModifier {
    options: RangeModifierOptions,
    events: ModifierEvents,
}

impl RangeModifier {
    pub const CLASS_NAME: &'static str = "RangeModifier";

    pub fn new(options: RangeModifierOptions) -> Self {
        Self {
            options,
            events: ModifierEvents::new(),
        }
    }

    /// Shorthand for the default `any` combination
    pub fn with_ranges(ranges: Vec<RangeOptions>) -> Self {
        Self::new(RangeModifierOptions {
            ranges,
            ..Default::default()
        })
    }

    pub fn options(&self) -> &RangeModifierOptions {
        &self.options
    }

    /// Whether row `row_index` of `table` survives the filter. Cells of
    /// missing columns read as `Null`.
    pub fn retains(&self, table: &DataTable, row_index: usize) -> bool {
        let ranges = &self.options.ranges;
        if ranges.is_empty() {
            return true;
        }

        let inside = |range: &RangeOptions| {
            table
                .get_cell(&range.column, row_index)
                .unwrap_or(&CellValue::Null)
                .in_range(&range.min_value, &range.max_value)
        };

        match self.options.combine {
            RangeCombine::Any => ranges.iter().any(inside),
            RangeCombine::All => ranges.iter().all(inside),
        }
    }

    fn retained_rows(&self, table: &DataTable) -> Vec<usize> {
        (0..table.get_row_count())
            .filter(|&row_index| self.retains(table, row_index))
            .collect()
    }

    fn filtered_columns(table: &DataTable, keep: &[usize]) -> ColumnCollection {
        table
            .iter_columns()
            .map(|(name, cells)| {
                (
                    name.to_string(),
                    keep.iter().map(|&index| cells[index].clone()).collect(),
                )
            })
            .collect()
    }

    /// Re-run the predicate over the whole updated source and write the
    /// surviving rows into `modified`.
    fn refilter(&self, table: &DataTable, modified: &mut DataTable, detail: Option<&EventDetail>) {
        self.emit(ModifierEventKind::Execute, modified, detail);

        let keep = self.retained_rows(table);
        let columns = Self::filtered_columns(table, &keep);
        debug!(
            source = table.id(),
            kept = keep.len(),
            of = table.get_row_count(),
            "range filter refreshed"
        );
        modified.replace_contents(columns, keep.len(), detail);

        self.emit(ModifierEventKind::AfterExecute, modified, detail);
    }
}

impl DataModifier for RangeModifier {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn events(&self) -> &ModifierEvents {
        &self.events
    }

    fn apply(&self, table: &mut DataTable) {
        if self.options.ranges.is_empty() {
            return;
        }

        for range in &self.options.ranges {
            if !table.has_column(&range.column) {
                debug!(column = %range.column, "range column missing, cells read as null");
            }
        }

        let keep = self.retained_rows(table);
        if keep.len() == table.get_row_count() {
            return;
        }

        let columns = Self::filtered_columns(table, &keep);
        if columns.is_empty() {
            // no columns to filter, only the row count shrinks
            table.delete_rows(0, table.get_row_count() - keep.len(), None);
            return;
        }
        table.set_columns(columns, None, None);
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
        self.refilter(table, modified, detail);
    }

    fn modify_columns(
        &self,
        table: &DataTable,
        modified: &mut DataTable,
        _columns: &ColumnCollection,
        _row_index: Option<usize>,
        detail: Option<&EventDetail>,
    ) {
        self.refilter(table, modified, detail);
    }

    fn modify_rows(
        &self,
        table: &DataTable,
        modified: &mut DataTable,
        _rows: &[RowInput],
        _row_index: Option<usize>,
        detail: Option<&EventDetail>,
    ) {
        self.refilter(table, modified, detail);
    }

    fn to_json(&self) -> ModifierJson {
        ModifierJson {
            class: Self::CLASS_NAME.to_string(),
            options: serde_json::to_value(&self.options).unwrap_or_default(),
        }
    }
}
