//! Structural snapshot of a table: id, own columns and modifier configuration

use serde::{Deserialize, Serialize};

use super::{ColumnCollection, DataTable};
use crate::modifiers::{modifier_from_json, ModifierJson};
use crate::DataError;

/// Serializable form of a [`DataTable`]. The derived table is never stored;
/// it is re-derived from the modifier when the snapshot is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub id: String,
    pub columns: ColumnCollection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<ModifierJson>,
}

impl DataTable {
    pub fn to_snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            id: self.id.clone(),
            columns: self.columns.clone(),
            modifier: self.modifier.as_ref().map(|modifier| modifier.to_json()),
        }
    }

    /// Rebuild a table from a snapshot. Ragged columns are padded.
    pub fn from_snapshot(snapshot: TableSnapshot) -> Result<Self, DataError> {
        if snapshot.id.is_empty() {
            return Err(DataError::InvalidSnapshot("table id is empty".to_string()));
        }

        let mut table = DataTable::with_id(snapshot.id);
        table.row_count = snapshot.columns.values().map(Vec::len).max().unwrap_or(0);
        table.columns = snapshot.columns;
        table.normalize();

        if let Some(json) = snapshot.modifier {
            let modifier = modifier_from_json(&json)?;
            table.set_modifier(Some(modifier), None);
        }

        Ok(table)
    }

    pub fn to_json(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string(&self.to_snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let snapshot: TableSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }
}
