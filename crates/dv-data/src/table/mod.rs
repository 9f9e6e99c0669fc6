//! Columnar in-memory table with an optional derived (`modified`) view

mod snapshot;
mod value;

use std::fmt;
use std::sync::Arc;

use dv_core::events::{EventDetail, HandlerId};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::events::{TableEvent, TableEventKind, TableEvents, TableHandler};
use crate::modifiers::DataModifier;

pub use snapshot::TableSnapshot;
pub use value::{compare_cells, CellValue};

/// Ordered sequence of cell values, one per row
pub type Column = Vec<CellValue>;

/// Columns keyed by name; insertion order is the table's column order
pub type ColumnCollection = IndexMap<String, Column>;

/// Row in positional form, aligned to [`DataTable::get_column_names`]
pub type Row = Vec<CellValue>;

/// Row keyed by column name
pub type RowObject = IndexMap<String, CellValue>;

/// Either row representation, as accepted by [`DataTable::set_rows`]
#[derive(Debug, Clone, PartialEq)]
pub enum RowInput {
    Positional(Row),
    Object(RowObject),
}

impl From<Row> for RowInput {
    fn from(row: Row) -> Self {
        RowInput::Positional(row)
    }
}

impl From<RowObject> for RowInput {
    fn from(row: RowObject) -> Self {
        RowInput::Object(row)
    }
}

/// Build a column from anything convertible into cells
pub fn column<V: Into<CellValue>>(values: impl IntoIterator<Item = V>) -> Column {
    values.into_iter().map(Into::into).collect()
}

/// Build a row object from name/value pairs
pub fn row_object<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> RowObject
where
    K: Into<String>,
    V: Into<CellValue>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect()
}

/// Columnar table of typed cells.
///
/// Column storage is only reachable through the setter methods, which keep
/// every column at exactly [`get_row_count`](Self::get_row_count) cells and
/// bring the derived table up to date before returning.
pub struct DataTable {
    id: String,
    columns: ColumnCollection,
    row_count: usize,
    modifier: Option<Arc<dyn DataModifier>>,
    /// Derived table; `None` means `modified()` aliases the table itself
    modified: Option<Box<DataTable>>,
    events: TableEvents,
}

impl DataTable {
    /// Create an empty table with a random id
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Create an empty table with the given id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            columns: ColumnCollection::new(),
            row_count: 0,
            modifier: None,
            modified: None,
            events: TableEvents::new(),
        }
    }

    /// Create a table from initial columns. Short columns are padded with
    /// `Null` up to the longest one.
    pub fn from_columns<I, K>(columns: I) -> Self
    where
        I: IntoIterator<Item = (K, Column)>,
        K: Into<String>,
    {
        let mut table = Self::new();
        for (name, cells) in columns {
            table.columns.insert(name.into(), cells);
        }
        table.row_count = table.columns.values().map(Vec::len).max().unwrap_or(0);
        table.normalize();
        table
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    // ---------------------------------------------------------------------
    // Read path
    // ---------------------------------------------------------------------

    pub fn get_column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn get_row_count(&self) -> usize {
        self.row_count
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Row at `index` in positional form, `None` when out of range
    pub fn get_row(&self, index: usize) -> Option<Row> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.values().map(|cells| cells[index].clone()).collect())
    }

    /// All rows in positional form
    pub fn get_rows(&self) -> Vec<Row> {
        self.get_row_range(0, self.row_count)
    }

    /// Up to `count` rows starting at `start`; out of range parts are skipped
    pub fn get_row_range(&self, start: usize, count: usize) -> Vec<Row> {
        let end = start.saturating_add(count).min(self.row_count);
        (start..end).filter_map(|index| self.get_row(index)).collect()
    }

    pub fn get_row_object(&self, index: usize) -> Option<RowObject> {
        if index >= self.row_count {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|(name, cells)| (name.clone(), cells[index].clone()))
                .collect(),
        )
    }

    pub fn get_row_objects(&self) -> Vec<RowObject> {
        (0..self.row_count)
            .filter_map(|index| self.get_row_object(index))
            .collect()
    }

    /// Copy of the columns. With a filter list the result follows the order
    /// of the list and unknown names are skipped.
    pub fn get_columns(&self, names: Option<&[&str]>) -> ColumnCollection {
        match names {
            None => self.columns.clone(),
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    self.columns
                        .get_key_value(*name)
                        .map(|(name, cells)| (name.clone(), cells.clone()))
                })
                .collect(),
        }
    }

    /// Copy of a single column
    pub fn get_column(&self, name: &str) -> Option<Column> {
        self.columns.get(name).cloned()
    }

    /// Read-only view of a single column
    pub fn column(&self, name: &str) -> Option<&[CellValue]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Read-only iteration over all columns in order
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[CellValue])> {
        self.columns
            .iter()
            .map(|(name, cells)| (name.as_str(), cells.as_slice()))
    }

    pub fn get_cell(&self, column: &str, row_index: usize) -> Option<&CellValue> {
        self.columns.get(column).and_then(|cells| cells.get(row_index))
    }

    pub fn get_cell_as_number(&self, column: &str, row_index: usize) -> Option<f64> {
        self.get_cell(column, row_index).and_then(CellValue::as_number)
    }

    /// Cell rendered as text; missing cells read as an empty string
    pub fn get_cell_as_string(&self, column: &str, row_index: usize) -> String {
        self.get_cell(column, row_index)
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub fn get_cell_as_boolean(&self, column: &str, row_index: usize) -> bool {
        self.get_cell(column, row_index)
            .map_or(false, CellValue::is_truthy)
    }

    /// Index of the first row at or after `start` whose cell in `column`
    /// equals `value`
    pub fn get_row_index_by(&self, column: &str, value: &CellValue, start: usize) -> Option<usize> {
        let cells = self.columns.get(column)?;
        cells
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, cell)| *cell == value)
            .map(|(index, _)| index)
    }

    /// The derived table, or this table when no modifier is attached
    pub fn modified(&self) -> &DataTable {
        self.modified.as_deref().unwrap_or(self)
    }

    pub fn get_modifier(&self) -> Option<&Arc<dyn DataModifier>> {
        self.modifier.as_ref()
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Subscribe to a table event
    pub fn on(&self, kind: TableEventKind, handler: Box<TableHandler>) -> HandlerId {
        self.events.on(kind, handler)
    }

    /// Unsubscribe a table event handler
    pub fn off(&self, id: HandlerId) -> bool {
        self.events.off(id)
    }

    fn emit(&self, kind: TableEventKind, detail: Option<&EventDetail>) {
        self.events.emit_with(kind, |handler| {
            handler(&TableEvent {
                kind,
                detail,
                table: self,
            })
        });
    }

    // ---------------------------------------------------------------------
    // Mutation path
    // ---------------------------------------------------------------------

    /// Set a single cell. Unknown columns are created and the table grows
    /// when `row_index` is past the last row.
    pub fn set_cell(
        &mut self,
        column: &str,
        row_index: usize,
        value: impl Into<CellValue>,
        detail: Option<&EventDetail>,
    ) {
        if row_index.checked_add(1).is_none() {
            warn!(table = %self.id, column, row_index, "row index out of range, cell ignored");
            return;
        }

        let value = value.into();
        self.emit(TableEventKind::SetCell, detail);

        self.write_cell(column, row_index, value.clone());
        debug!(table = %self.id, column, row_index, "set cell");

        if let Some(modifier) = self.modifier.clone() {
            self.with_modified(|table, modified| {
                modifier.modify_cell(table, modified, column, row_index, &value, detail)
            });
        }

        self.emit(TableEventKind::AfterSetCell, detail);
    }

    /// Merge columns into the table.
    ///
    /// Without `row_index` each supplied column replaces the stored one and
    /// the longest supplied column defines the new row count. With
    /// `row_index` the values are written from that row on and the table only
    /// grows. Columns not mentioned are left alone apart from being padded or
    /// truncated to the row count.
    pub fn set_columns(
        &mut self,
        columns: ColumnCollection,
        row_index: Option<usize>,
        detail: Option<&EventDetail>,
    ) {
        if let Some(start) = row_index {
            if columns.values().any(|cells| start.checked_add(cells.len()).is_none()) {
                warn!(table = %self.id, start, "row index out of range, columns ignored");
                return;
            }
        }

        self.emit(TableEventKind::SetColumns, detail);

        self.write_columns(&columns, row_index);
        debug!(
            table = %self.id,
            columns = columns.len(),
            ?row_index,
            row_count = self.row_count,
            "set columns"
        );

        if let Some(modifier) = self.modifier.clone() {
            self.with_modified(|table, modified| {
                modifier.modify_columns(table, modified, &columns, row_index, detail)
            });
        }

        self.emit(TableEventKind::AfterSetColumns, detail);
    }

    /// Single column form of [`set_columns`](Self::set_columns)
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        cells: Column,
        row_index: Option<usize>,
        detail: Option<&EventDetail>,
    ) {
        let mut columns = ColumnCollection::new();
        columns.insert(name.into(), cells);
        self.set_columns(columns, row_index, detail);
    }

    /// Overwrite rows starting at `row_index` (default: append).
    ///
    /// Positional rows follow the column order. Row objects only touch the
    /// columns they name and create unknown ones.
    pub fn set_rows(
        &mut self,
        rows: Vec<RowInput>,
        row_index: Option<usize>,
        detail: Option<&EventDetail>,
    ) {
        let start = row_index.unwrap_or(self.row_count);
        if start.checked_add(rows.len()).is_none() {
            warn!(table = %self.id, start, "row index out of range, rows ignored");
            return;
        }

        self.emit(TableEventKind::SetRows, detail);

        self.write_rows(&rows, row_index);
        debug!(
            table = %self.id,
            rows = rows.len(),
            ?row_index,
            row_count = self.row_count,
            "set rows"
        );

        if let Some(modifier) = self.modifier.clone() {
            self.with_modified(|table, modified| {
                modifier.modify_rows(table, modified, &rows, row_index, detail)
            });
        }

        self.emit(TableEventKind::AfterSetRows, detail);
    }

    /// Single row form of [`set_rows`](Self::set_rows)
    pub fn set_row(
        &mut self,
        row: impl Into<RowInput>,
        row_index: Option<usize>,
        detail: Option<&EventDetail>,
    ) {
        self.set_rows(vec![row.into()], row_index, detail);
    }

    /// Remove up to `count` rows starting at `row_index` and return them
    pub fn delete_rows(
        &mut self,
        row_index: usize,
        count: usize,
        detail: Option<&EventDetail>,
    ) -> Vec<Row> {
        let end = row_index.saturating_add(count).min(self.row_count);
        if row_index >= end {
            return Vec::new();
        }

        self.emit(TableEventKind::DeleteRows, detail);

        let removed = self.get_row_range(row_index, end - row_index);
        for cells in self.columns.values_mut() {
            cells.drain(row_index..end);
        }
        self.row_count -= end - row_index;
        debug!(table = %self.id, removed = removed.len(), "deleted rows");

        self.refresh_modified(detail);
        self.emit(TableEventKind::AfterDeleteRows, detail);
        removed
    }

    /// Remove the named columns, or every column when `names` is `None`
    pub fn delete_columns(
        &mut self,
        names: Option<&[&str]>,
        detail: Option<&EventDetail>,
    ) -> ColumnCollection {
        self.emit(TableEventKind::DeleteColumns, detail);

        let removed: ColumnCollection = match names {
            None => std::mem::take(&mut self.columns),
            Some(names) => names
                .iter()
                .filter_map(|name| self.columns.shift_remove_entry(*name))
                .collect(),
        };
        if self.columns.is_empty() {
            self.row_count = 0;
        }
        debug!(table = %self.id, removed = removed.len(), "deleted columns");

        self.refresh_modified(detail);
        self.emit(TableEventKind::AfterDeleteColumns, detail);
        removed
    }

    /// Rename a column in place. Fails when `old` is missing or `new` taken.
    pub fn rename_column(&mut self, old: &str, new: &str, detail: Option<&EventDetail>) -> bool {
        if !self.columns.contains_key(old) || self.columns.contains_key(new) {
            return false;
        }

        self.emit(TableEventKind::RenameColumn, detail);

        let columns = std::mem::take(&mut self.columns);
        self.columns = columns
            .into_iter()
            .map(|(name, cells)| {
                if name == old {
                    (new.to_string(), cells)
                } else {
                    (name, cells)
                }
            })
            .collect();

        self.refresh_modified(detail);
        self.emit(TableEventKind::AfterRenameColumn, detail);
        true
    }

    /// Attach, replace or detach the modifier.
    ///
    /// Attaching always builds a new derived table from a full `modify` run;
    /// any previously obtained `modified()` reference is stale afterwards.
    pub fn set_modifier(
        &mut self,
        modifier: Option<Arc<dyn DataModifier>>,
        detail: Option<&EventDetail>,
    ) {
        self.emit(TableEventKind::SetModifier, detail);

        match modifier {
            Some(modifier) => {
                let mut derived = self.detached_copy();
                modifier.modify(&mut derived, detail);
                debug!(
                    table = %self.id,
                    modifier = modifier.class_name(),
                    rows = derived.row_count,
                    "attached modifier"
                );
                // the new slot is allocated before the old one is released
                let previous = self.modified.replace(Box::new(derived));
                drop(previous);
                self.modifier = Some(modifier);
            }
            None => {
                self.modifier = None;
                self.modified = None;
                debug!(table = %self.id, "detached modifier");
            }
        }

        self.emit(TableEventKind::AfterSetModifier, detail);
    }

    /// Copy of this table with a fresh id and the same modifier
    pub fn clone_table(&self, skip_columns: bool) -> DataTable {
        let mut clone = if skip_columns {
            DataTable::new()
        } else {
            self.detached_copy()
        };
        if let Some(modifier) = &self.modifier {
            clone.set_modifier(Some(Arc::clone(modifier)), None);
        }
        clone
    }

    // ---------------------------------------------------------------------
    // Crate internals
    // ---------------------------------------------------------------------

    pub(crate) fn columns_ref(&self) -> &ColumnCollection {
        &self.columns
    }

    /// Copy of the own data without modifier, derived table or handlers
    pub(crate) fn detached_copy(&self) -> DataTable {
        let mut copy = DataTable::new();
        copy.columns = self.columns.clone();
        copy.row_count = self.row_count;
        copy
    }

    /// Copy of the named columns that keeps the full row count, even when
    /// none of the names exist
    pub(crate) fn projection(&self, names: &[&str]) -> DataTable {
        let mut copy = DataTable::new();
        copy.columns = self.get_columns(Some(names));
        copy.row_count = self.row_count;
        copy
    }

    pub(crate) fn into_parts(self) -> (ColumnCollection, usize) {
        (self.columns, self.row_count)
    }

    /// Replace all contents in place, keeping identity and handlers
    pub(crate) fn replace_contents(
        &mut self,
        columns: ColumnCollection,
        row_count: usize,
        detail: Option<&EventDetail>,
    ) {
        self.emit(TableEventKind::SetColumns, detail);
        self.row_count = columns
            .values()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(row_count);
        self.columns = columns;
        self.normalize();
        trace!(table = %self.id, rows = self.row_count, "replaced contents");
        self.emit(TableEventKind::AfterSetColumns, detail);
    }

    /// Run `update` against the derived slot without giving up its heap
    /// allocation, so the identity of `modified()` survives.
    fn with_modified(&mut self, update: impl FnOnce(&DataTable, &mut DataTable)) {
        if let Some(mut modified) = self.modified.take() {
            update(self, &mut modified);
            self.modified = Some(modified);
        }
    }

    fn refresh_modified(&mut self, detail: Option<&EventDetail>) {
        if let Some(modifier) = self.modifier.clone() {
            self.with_modified(|table, modified| modifier.rebuild(table, modified, detail));
        }
    }

    /// Pad or truncate every column to `row_count`
    fn normalize(&mut self) {
        let row_count = self.row_count;
        for cells in self.columns.values_mut() {
            cells.resize(row_count, CellValue::Null);
        }
    }

    fn write_cell(&mut self, column: &str, row_index: usize, value: CellValue) {
        if row_index >= self.row_count {
            self.row_count = row_index + 1;
        }
        if !self.columns.contains_key(column) {
            self.columns.insert(column.to_string(), Column::new());
        }
        self.normalize();
        if let Some(cells) = self.columns.get_mut(column) {
            cells[row_index] = value;
        }
    }

    fn write_columns(&mut self, columns: &ColumnCollection, row_index: Option<usize>) {
        if columns.is_empty() {
            return;
        }

        match row_index {
            None => {
                let mut row_count = 0;
                for (name, cells) in columns {
                    self.columns.insert(name.clone(), cells.clone());
                    row_count = row_count.max(cells.len());
                }
                self.row_count = row_count;
            }
            Some(start) => {
                let mut row_count = self.row_count;
                for (name, cells) in columns {
                    let end = start + cells.len();
                    let stored = self.columns.entry(name.clone()).or_default();
                    if stored.len() < end {
                        stored.resize(end, CellValue::Null);
                    }
                    stored[start..end].clone_from_slice(cells);
                    row_count = row_count.max(end);
                }
                self.row_count = row_count;
            }
        }

        self.normalize();
    }

    fn write_rows(&mut self, rows: &[RowInput], row_index: Option<usize>) {
        let start = row_index.unwrap_or(self.row_count);
        let end = start + rows.len();

        for row in rows {
            if let RowInput::Object(object) = row {
                for name in object.keys() {
                    if !self.columns.contains_key(name) {
                        self.columns.insert(name.clone(), Column::new());
                    }
                }
            }
        }

        self.row_count = self.row_count.max(end);
        self.normalize();

        for (offset, row) in rows.iter().enumerate() {
            let target = start + offset;
            match row {
                RowInput::Positional(values) => {
                    for (cells, value) in self.columns.values_mut().zip(values) {
                        cells[target] = value.clone();
                    }
                }
                RowInput::Object(object) => {
                    for (name, value) in object {
                        if let Some(cells) = self.columns.get_mut(name) {
                            cells[target] = value.clone();
                        }
                    }
                }
            }
        }
    }
}

impl Default for DataTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTable")
            .field("id", &self.id)
            .field("row_count", &self.row_count)
            .field("columns", &self.columns)
            .field("modifier", &self.modifier.as_ref().map(|m| m.class_name()))
            .field("modified", &self.modified)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{RangeModifier, SortModifier};
    use std::sync::Mutex;

    fn sample() -> DataTable {
        DataTable::from_columns([
            ("x", column([-2, -1, 0, 1, 2])),
            ("y", column(["a", "b", "c", "d", "e"])),
        ])
    }

    fn assert_rectangular(table: &DataTable) {
        for (name, cells) in table.iter_columns() {
            assert_eq!(
                cells.len(),
                table.get_row_count(),
                "column {} has wrong length",
                name
            );
        }
    }

    #[test]
    fn test_read_path() {
        let table = sample();
        assert_eq!(table.get_column_names(), vec!["x", "y"]);
        assert_eq!(table.get_row_count(), 5);
        assert_eq!(table.get_row(1), Some(vec![CellValue::from(-1), CellValue::from("b")]));
        assert_eq!(table.get_row(5), None);
        assert_eq!(table.get_row_range(3, 10).len(), 2);
        assert!(table.get_row_range(9, 2).is_empty());
        assert_eq!(table.get_row_object(4), Some(row_object([("x", CellValue::from(2)), ("y", "e".into())])));
        assert_eq!(table.get_cell_as_number("x", 0), Some(-2.0));
        assert_eq!(table.get_cell_as_string("y", 2), "c");
        assert_eq!(table.get_cell_as_string("z", 2), "");
        assert!(table.get_cell_as_boolean("x", 0));
        assert!(!table.get_cell_as_boolean("x", 2));
        assert_eq!(table.get_row_index_by("y", &"d".into(), 0), Some(3));
        assert_eq!(table.get_row_index_by("y", &"a".into(), 1), None);
    }

    #[test]
    fn test_get_columns_follows_filter_order() {
        let table = sample();
        let columns = table.get_columns(Some(&["y", "missing", "x"]));
        let names: Vec<&str> = columns.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["y", "x"]);
        assert_eq!(columns["y"].len(), 5);
    }

    #[test]
    fn test_from_columns_pads_short_columns() {
        let table = DataTable::from_columns([("a", column([1, 2, 3])), ("b", column([true]))]);
        assert_eq!(table.get_row_count(), 3);
        assert_eq!(table.get_cell("b", 2), Some(&CellValue::Null));
        assert_rectangular(&table);
    }

    #[test]
    fn test_set_cell_grows_table_and_creates_columns() {
        let mut table = sample();
        table.set_cell("z", 6, "new", None);
        assert_eq!(table.get_row_count(), 7);
        assert_eq!(table.get_column_names(), vec!["x", "y", "z"]);
        assert_eq!(table.get_cell("z", 6), Some(&CellValue::from("new")));
        assert_eq!(table.get_cell("x", 5), Some(&CellValue::Null));
        assert_rectangular(&table);
    }

    #[test]
    fn test_set_columns_without_index_redefines_row_count() {
        let mut table = sample();
        table.set_column("x", column([-3, -2, 0]), None, None);
        assert_eq!(table.get_row_count(), 3);
        assert_eq!(table.get_column("y"), Some(column(["a", "b", "c"])));
        assert_rectangular(&table);

        table.set_column("w", column([1, 2, 3, 4]), None, None);
        assert_eq!(table.get_row_count(), 4);
        assert_eq!(table.get_cell("y", 3), Some(&CellValue::Null));
        assert_rectangular(&table);
    }

    #[test]
    fn test_set_columns_with_index_only_grows() {
        let mut table = sample();
        table.set_column("x", column([10, 11]), Some(4), None);
        assert_eq!(table.get_row_count(), 6);
        assert_eq!(table.get_column("x"), Some(column([-2, -1, 0, 1, 10, 11])));
        assert_eq!(table.get_cell("y", 5), Some(&CellValue::Null));

        table.set_column("y", column(["q"]), Some(0), None);
        assert_eq!(table.get_row_count(), 6);
        assert_eq!(table.get_cell("y", 0), Some(&CellValue::from("q")));
        assert_rectangular(&table);
    }

    #[test]
    fn test_row_count_invariant_over_mixed_mutations() {
        let mut table = sample();
        table.set_columns(
            ColumnCollection::from([
                ("x".to_string(), column([1])),
                ("k".to_string(), column([1, 2, 3, 4, 5, 6, 7, 8])),
            ]),
            None,
            None,
        );
        assert_rectangular(&table);
        table.set_rows(vec![RowInput::Positional(column([1, 2]))], Some(12), None);
        assert_rectangular(&table);
        assert_eq!(table.get_row_count(), 13);
        table.set_rows(vec![row_object([("fresh", 1)]).into()], None, None);
        assert_rectangular(&table);
        table.delete_rows(2, 3, None);
        assert_rectangular(&table);
        table.set_column("x", Column::new(), Some(20), None);
        assert_rectangular(&table);
    }

    #[test]
    fn test_unrepresentable_row_index_is_ignored() {
        let mut table = sample();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        table.on(
            TableEventKind::SetRows,
            Box::new(move |_: &TableEvent<'_>| *counter.lock().unwrap() += 1),
        );

        table.set_rows(vec![RowInput::Positional(column([1]))], Some(usize::MAX), None);
        table.set_cell("x", usize::MAX, 1, None);
        table.set_column("x", column([1]), Some(usize::MAX), None);

        assert_eq!(*hits.lock().unwrap(), 0);
        assert_eq!(table.get_row_count(), 5);
        assert_eq!(table.get_rows(), sample().get_rows());
        assert_rectangular(&table);
    }

    #[test]
    fn test_set_rows_overwrites_and_appends() {
        let mut table = sample();

        // row objects only touch the named columns
        table.set_rows(vec![row_object([("x", -1.5)]).into()], Some(0), None);
        assert_eq!(table.get_row(0), Some(vec![CellValue::from(-1.5), "a".into()]));

        // positional rows follow column order, extra values are ignored
        table.set_row(vec![CellValue::from(7), "g".into(), "ignored".into()], None, None);
        assert_eq!(table.get_row_count(), 6);
        assert_eq!(table.get_row(5), Some(vec![CellValue::from(7), "g".into()]));

        // short positional rows keep existing values
        table.set_row(column([9]), Some(1), None);
        assert_eq!(table.get_row(1), Some(vec![CellValue::from(9), "b".into()]));

        // unknown columns in row objects are created
        table.set_row(row_object([("z", true)]), Some(2), None);
        assert_eq!(table.get_column_names(), vec!["x", "y", "z"]);
        assert_eq!(table.get_cell("z", 2), Some(&CellValue::Boolean(true)));
        assert_eq!(table.get_cell("z", 0), Some(&CellValue::Null));
    }

    #[test]
    fn test_delete_rows_and_columns() {
        let mut table = sample();
        let removed = table.delete_rows(1, 2, None);
        assert_eq!(
            removed,
            vec![
                vec![CellValue::from(-1), "b".into()],
                vec![CellValue::from(0), "c".into()],
            ]
        );
        assert_eq!(table.get_column("x"), Some(column([-2, 1, 2])));
        assert!(table.delete_rows(10, 1, None).is_empty());

        let removed = table.delete_columns(Some(&["y"]), None);
        assert_eq!(removed.keys().collect::<Vec<_>>(), vec!["y"]);
        assert_eq!(table.get_column_names(), vec!["x"]);
        assert_eq!(table.get_row_count(), 3);

        table.delete_columns(None, None);
        assert_eq!(table.get_row_count(), 0);
        assert!(table.get_column_names().is_empty());
    }

    #[test]
    fn test_rename_column_keeps_position() {
        let mut table = sample();
        assert!(table.rename_column("x", "value", None));
        assert_eq!(table.get_column_names(), vec!["value", "y"]);
        assert!(!table.rename_column("missing", "other", None));
        assert!(!table.rename_column("value", "y", None));
    }

    #[test]
    fn test_modified_aliases_table_without_modifier() {
        let table = sample();
        assert!(std::ptr::eq(table.modified(), &table));
    }

    #[test]
    fn test_modified_identity_survives_mutation_but_not_reattach() {
        let mut table = sample();
        let range: Arc<dyn DataModifier> = Arc::new(RangeModifier::default());
        table.set_modifier(Some(Arc::clone(&range)), None);

        let before = table.modified() as *const DataTable;
        let before_id = table.modified().id().to_string();
        assert!(!std::ptr::eq(before, &table));

        table.set_cell("x", 0, 5, None);
        table.set_column("x", column([1, 2, 3]), None, None);
        table.set_row(vec![CellValue::from(4), "d".into()], None, None);
        table.delete_rows(0, 1, None);
        assert!(std::ptr::eq(before, table.modified()));
        assert_eq!(table.modified().id(), before_id);

        table.set_modifier(Some(Arc::new(SortModifier::default())), None);
        assert!(!std::ptr::eq(before, table.modified()));
        assert_ne!(table.modified().id(), before_id);

        table.set_modifier(None, None);
        assert!(std::ptr::eq(table.modified(), &table));
    }

    #[test]
    fn test_events_wrap_mutation_and_see_updated_modified() {
        let mut table = sample();
        table.set_modifier(Some(Arc::new(SortModifier::default())), None);

        let log = Arc::new(Mutex::new(Vec::new()));
        for kind in [TableEventKind::SetCell, TableEventKind::AfterSetCell] {
            let log = Arc::clone(&log);
            table.on(
                kind,
                Box::new(move |event: &TableEvent<'_>| {
                    let first = event.table.modified().get_cell_as_string("y", 0);
                    let detail = event.detail.cloned().unwrap_or_default();
                    log.lock().unwrap().push((event.kind, first, detail));
                }),
            );
        }

        let detail = serde_json::json!({ "source": "grid" });
        // descending by "y": "e" first, then the new "z" overtakes it
        table.set_cell("y", 1, "z", Some(&detail));

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                (TableEventKind::SetCell, "e".to_string(), detail.clone()),
                (TableEventKind::AfterSetCell, "z".to_string(), detail.clone()),
            ]
        );
    }

    #[test]
    fn test_off_stops_table_events() {
        let mut table = sample();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let id = table.on(
            TableEventKind::AfterSetRows,
            Box::new(move |_: &TableEvent<'_>| *counter.lock().unwrap() += 1),
        );
        table.set_row(vec![CellValue::from(0), "f".into()], None, None);
        assert!(table.off(id));
        table.set_row(vec![CellValue::from(0), "g".into()], None, None);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_clone_table_rederives_modified() {
        let mut table = sample();
        table.set_modifier(Some(Arc::new(SortModifier::default())), None);

        let clone = table.clone_table(false);
        assert_ne!(clone.id(), table.id());
        assert_eq!(clone.get_rows(), table.get_rows());
        assert_eq!(clone.modified().get_rows(), table.modified().get_rows());

        let empty = table.clone_table(true);
        assert_eq!(empty.get_row_count(), 0);
        assert!(empty.get_modifier().is_some());
    }
}
