//! Order rows by one column

use dv_core::events::EventDetail;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DataModifier, ModifierJson};
use crate::events::ModifierEvents;
use crate::table::{compare_cells, CellValue, Column, ColumnCollection, DataTable, RowInput};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SortModifierOptions {
    pub direction: SortDirection,
    /// Column holding the sort key
    pub order_by_column: String,
    /// When set, rows stay in place and this column receives, at sorted
    /// position `i`, the original index of the row sorted there
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_in_column: Option<String>,
}

impl Default for SortModifierOptions {
    fn default() -> Self {
        Self {
            direction: SortDirection::Desc,
            order_by_column: "y".to_string(),
            order_in_column: None,
        }
    }
}

/// Stable sort over a single column using [`compare_cells`]
#[derive(Debug, Default)]
pub struct SortModifier {
    options: SortModifierOptions,
    events: ModifierEvents,
}

impl SortModifier {
    pub const CLASS_NAME: &'static str = "SortModifier";

    pub fn new(options: SortModifierOptions) -> Self {
        Self {
            options,
            events: ModifierEvents::new(),
        }
    }

    pub fn options(&self) -> &SortModifierOptions {
        &self.options
    }

    /// Row indices of `table` in sorted order. A missing sort column keeps
    /// the original order.
    pub fn sorted_order(&self, table: &DataTable) -> Vec<usize> {
        let mut order: Vec<usize> = (0..table.get_row_count()).collect();

        let cells = match table.column(&self.options.order_by_column) {
            Some(cells) => cells,
            None => {
                debug!(
                    column = %self.options.order_by_column,
                    table = table.id(),
                    "sort column missing, keeping row order"
                );
                return order;
            }
        };

        match self.options.direction {
            SortDirection::Asc => order.sort_by(|&a, &b| compare_cells(&cells[a], &cells[b])),
            SortDirection::Desc => order.sort_by(|&a, &b| compare_cells(&cells[b], &cells[a])),
        }
        order
    }

    /// Whether a change to `column` can move rows or ranks
    fn affects_order(&self, column: &str) -> bool {
        column == self.options.order_by_column
            || self.options.order_in_column.as_deref() == Some(column)
    }

    /// Rank mode refresh: `modified` becomes the source columns plus the rank
    /// column, ranks computed on a projection holding only the sort key.
    fn refresh_ranks(
        &self,
        rank_column: &str,
        table: &DataTable,
        modified: &mut DataTable,
        detail: Option<&EventDetail>,
    ) {
        let mut scratch = table.projection(&[self.options.order_by_column.as_str()]);
        self.modify(&mut scratch, detail);
        let ranks = scratch.get_column(rank_column).unwrap_or_default();

        let mut columns = table.get_columns(None);
        columns.insert(rank_column.to_string(), ranks);
        modified.replace_contents(columns, table.get_row_count(), detail);
    }
}

impl DataModifier for SortModifier {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn events(&self) -> &ModifierEvents {
        &self.events
    }

    fn apply(&self, table: &mut DataTable) {
        let order = self.sorted_order(table);

        match &self.options.order_in_column {
            Some(rank_column) => {
                let ranks: Column = order.into_iter().map(CellValue::from).collect();
                table.set_column(rank_column.clone(), ranks, None, None);
            }
            None => {
                if order.iter().enumerate().all(|(position, &index)| position == index) {
                    return;
                }
                let rows = order
                    .iter()
                    .filter_map(|&index| table.get_row(index))
                    .map(RowInput::Positional)
                    .collect();
                table.set_rows(rows, Some(0), None);
            }
        }
    }

    fn modify_cell(
        &self,
        table: &DataTable,
        modified: &mut DataTable,
        column: &str,
        row_index: usize,
        value: &CellValue,
        detail: Option<&EventDetail>,
    ) {
        let Some(rank_column) = self.options.order_in_column.as_deref() else {
            return self.rebuild(table, modified, detail);
        };

        let mirrored = !self.affects_order(column)
            && modified.has_column(column)
            && row_index < modified.get_row_count();
        if mirrored {
            modified.set_cell(column, row_index, value.clone(), detail);
        } else {
            self.refresh_ranks(rank_column, table, modified, detail);
        }
    }

    fn modify_columns(
        &self,
        table: &DataTable,
        modified: &mut DataTable,
        columns: &ColumnCollection,
        row_index: Option<usize>,
        detail: Option<&EventDetail>,
    ) {
        let Some(rank_column) = self.options.order_in_column.as_deref() else {
            return self.rebuild(table, modified, detail);
        };

        let mirrored = table.get_row_count() == modified.get_row_count()
            && columns
                .keys()
                .all(|name| !self.affects_order(name) && modified.has_column(name));
        if mirrored {
            modified.set_columns(columns.clone(), row_index, detail);
        } else {
            self.refresh_ranks(rank_column, table, modified, detail);
        }
    }

    fn modify_rows(
        &self,
        table: &DataTable,
        modified: &mut DataTable,
        rows: &[RowInput],
        row_index: Option<usize>,
        detail: Option<&EventDetail>,
    ) {
        let Some(rank_column) = self.options.order_in_column.as_deref() else {
            return self.rebuild(table, modified, detail);
        };

        // positional rows follow the source column order, which the rank
        // column may not share, so only keyed rows are mirrored
        let mirrored = table.get_row_count() == modified.get_row_count()
            && rows.iter().all(|row| match row {
                RowInput::Object(object) => object
                    .keys()
                    .all(|name| !self.affects_order(name) && modified.has_column(name)),
                RowInput::Positional(_) => false,
            });
        if mirrored {
            modified.set_rows(rows.to_vec(), row_index, detail);
        } else {
            self.refresh_ranks(rank_column, table, modified, detail);
        }
    }

    fn to_json(&self) -> ModifierJson {
        ModifierJson {
            class: Self::CLASS_NAME.to_string(),
            options: serde_json::to_value(&self.options).unwrap_or_default(),
        }
    }
}
