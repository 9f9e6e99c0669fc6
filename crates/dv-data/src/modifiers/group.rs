//! Group rows by distinct cell values

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DataModifier, ModifierJson};
use crate::events::ModifierEvents;
use crate::table::{CellValue, Column, ColumnCollection, DataTable, RowInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupModifierOptions {
    /// Group by this column only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_column: Option<String>,
    /// Columns to group by when `group_column` is unset; all when empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_columns: Option<Vec<String>>,
    /// Values never forming a group
    pub invalid_values: Vec<CellValue>,
}

impl Default for GroupModifierOptions {
    fn default() -> Self {
        Self {
            group_column: None,
            used_columns: None,
            invalid_values: vec![CellValue::Null, CellValue::from("")],
        }
    }
}

/// Hashable form of a groupable cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Null,
    Boolean(bool),
    Number(u64),
    Text(String),
}

impl GroupKey {
    fn of(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Null => Some(GroupKey::Null),
            CellValue::Boolean(b) => Some(GroupKey::Boolean(*b)),
            CellValue::Number(n) => {
                let n = if *n == 0.0 {
                    0.0
                } else if n.is_nan() {
                    f64::NAN
                } else {
                    *n
                };
                Some(GroupKey::Number(n.to_bits()))
            }
            CellValue::String(s) => Some(GroupKey::Text(s.clone())),
            CellValue::Table(_) => None,
        }
    }
}

struct Group {
    column: String,
    value: CellValue,
    rows: Vec<usize>,
}

/// Replaces the table with one row per distinct value of each grouped
/// column. Output columns are `groupBy` (column name), `table` (nested table
/// of the matching rows) and `value`.
#[derive(Debug, Default)]
pub struct GroupModifier {
    options: GroupModifierOptions,
    events: ModifierEvents,
}

impl GroupModifier {
    pub const CLASS_NAME: &'static str = "GroupModifier";

    pub fn new(options: GroupModifierOptions) -> Self {
        Self {
            options,
            events: ModifierEvents::new(),
        }
    }

    pub fn options(&self) -> &GroupModifierOptions {
        &self.options
    }

    fn grouped_columns(&self, table: &DataTable) -> Vec<String> {
        let requested = match (&self.options.group_column, &self.options.used_columns) {
            (Some(column), _) => vec![column.clone()],
            (None, Some(columns)) if !columns.is_empty() => columns.clone(),
            _ => return table.get_column_names(),
        };

        requested
            .into_iter()
            .filter(|name| {
                let present = table.has_column(name);
                if !present {
                    debug!(column = %name, "group column missing, skipped");
                }
                present
            })
            .collect()
    }

    fn collect_groups(&self, table: &DataTable) -> Vec<Group> {
        let mut groups = Vec::new();

        for name in self.grouped_columns(table) {
            let Some(cells) = table.column(&name) else {
                continue;
            };
            let mut index: AHashMap<GroupKey, usize> = AHashMap::new();

            for (row, cell) in cells.iter().enumerate() {
                if self.options.invalid_values.contains(cell) {
                    continue;
                }
                let Some(key) = GroupKey::of(cell) else {
                    continue;
                };
                let slot = *index.entry(key).or_insert_with(|| {
                    groups.push(Group {
                        column: name.clone(),
                        value: cell.clone(),
                        rows: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[slot].rows.push(row);
            }
        }

        groups
    }
}

impl DataModifier for GroupModifier {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn events(&self) -> &ModifierEvents {
        &self.events
    }

    fn apply(&self, table: &mut DataTable) {
        let groups = self.collect_groups(table);
        debug!(table = table.id(), groups = groups.len(), "grouped rows");

        let mut group_by = Column::with_capacity(groups.len());
        let mut tables = Column::with_capacity(groups.len());
        let mut values = Column::with_capacity(groups.len());

        for group in groups {
            let mut nested = DataTable::new();
            let rows = group
                .rows
                .iter()
                .filter_map(|&row| table.get_row_object(row))
                .map(RowInput::Object)
                .collect();
            nested.set_rows(rows, None, None);

            group_by.push(CellValue::from(group.column));
            tables.push(CellValue::Table(Arc::new(nested)));
            values.push(group.value);
        }

        table.delete_columns(None, None);

        let mut columns = ColumnCollection::new();
        columns.insert("groupBy".to_string(), group_by);
        columns.insert("table".to_string(), tables);
        columns.insert("value".to_string(), values);
        table.set_columns(columns, None, None);
    }

    fn to_json(&self) -> ModifierJson {
        ModifierJson {
            class: Self::CLASS_NAME.to_string(),
            options: serde_json::to_value(&self.options).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column;

    fn sample() -> DataTable {
        DataTable::from_columns([
            ("x", vec![CellValue::from(1), 2.into(), 1.into(), CellValue::Null]),
            ("y", column(["a", "b", "a", ""])),
        ])
    }

    fn nested(table: &DataTable, row: usize) -> Arc<DataTable> {
        match table.get_cell("table", row) {
            Some(CellValue::Table(nested)) => Arc::clone(nested),
            other => panic!("expected nested table, got {:?}", other),
        }
    }

    #[test]
    fn test_groups_every_column_by_default() {
        let mut table = sample();
        GroupModifier::default().modify(&mut table, None);

        assert_eq!(table.get_column_names(), vec!["groupBy", "table", "value"]);
        assert_eq!(table.get_column("groupBy"), Some(column(["x", "x", "y", "y"])));
        assert_eq!(
            table.get_column("value"),
            Some(vec![CellValue::from(1), 2.into(), "a".into(), "b".into()])
        );

        let ones = nested(&table, 0);
        assert_eq!(ones.get_row_count(), 2);
        assert_eq!(ones.get_column("y"), Some(column(["a", "a"])));
        assert_eq!(nested(&table, 3).get_column("x"), Some(column([2])));
    }

    #[test]
    fn test_group_column_wins_over_used_columns() {
        let mut table = sample();
        GroupModifier::new(GroupModifierOptions {
            group_column: Some("y".to_string()),
            used_columns: Some(vec!["x".to_string()]),
            ..Default::default()
        })
        .modify(&mut table, None);
        assert_eq!(table.get_column("value"), Some(column(["a", "b"])));
    }

    #[test]
    fn test_invalid_values_and_nested_tables_are_skipped() {
        let mut table = sample();
        table.set_cell("t", 0, DataTable::new(), None);
        GroupModifier::new(GroupModifierOptions {
            used_columns: Some(vec!["x".to_string(), "t".to_string(), "missing".to_string()]),
            invalid_values: vec![CellValue::from(2)],
            ..Default::default()
        })
        .modify(&mut table, None);

        // null is a valid group once it is not listed as invalid
        assert_eq!(table.get_column("groupBy"), Some(column(["x", "x", "t"])));
        assert_eq!(
            table.get_column("value"),
            Some(vec![CellValue::from(1), CellValue::Null, CellValue::Null])
        );
        assert_eq!(nested(&table, 2).get_row_count(), 3);
    }

    #[test]
    fn test_zero_signs_share_a_group() {
        let mut table = DataTable::from_columns([("x", column([0.0, -0.0, 1.0]))]);
        GroupModifier::default().modify(&mut table, None);
        assert_eq!(table.get_row_count(), 2);
        assert_eq!(nested(&table, 0).get_row_count(), 2);
    }

    #[test]
    fn test_attached_group_follows_source() {
        let mut table = sample();
        table.set_modifier(
            Some(Arc::new(GroupModifier::new(GroupModifierOptions {
                group_column: Some("y".to_string()),
                ..Default::default()
            }))),
            None,
        );
        assert_eq!(table.modified().get_row_count(), 2);

        table.set_cell("y", 3, "c", None);
        assert_eq!(table.modified().get_column("value"), Some(column(["a", "b", "c"])));
        assert_eq!(table.get_column_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_default_options_json() {
        let json = GroupModifier::default().to_json();
        assert_eq!(json.options, serde_json::json!({ "invalidValues": [null, ""] }));
    }
}
