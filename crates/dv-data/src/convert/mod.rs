//! Arrow `RecordBatch` interchange for store connectors and components

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::array_value_to_string;
use tracing::debug;

use crate::table::{CellValue, Column, ColumnCollection, DataTable};
use crate::DataError;

impl TryFrom<&RecordBatch> for DataTable {
    type Error = DataError;

    /// Numeric arrays become numbers, booleans stay booleans and every other
    /// type is rendered to text. Nulls become [`CellValue::Null`].
    fn try_from(batch: &RecordBatch) -> Result<Self, Self::Error> {
        let schema = batch.schema();
        let mut columns = ColumnCollection::new();

        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            columns.insert(field.name().clone(), array_to_column(array)?);
        }

        debug!(
            columns = columns.len(),
            rows = batch.num_rows(),
            "loaded table from record batch"
        );
        Ok(DataTable::from_columns(columns))
    }
}

impl DataTable {
    /// Export the own columns (not the derived table) as a record batch.
    ///
    /// Columns holding only numbers and nulls map to `Float64`, only booleans
    /// and nulls to `Boolean`, anything else to `Utf8` using the cell's
    /// display form.
    pub fn to_record_batch(&self) -> Result<RecordBatch, DataError> {
        let mut fields = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();

        for (name, cells) in self.iter_columns() {
            let array = column_to_array(cells);
            fields.push(Field::new(name, array.data_type().clone(), true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let options = RecordBatchOptions::new().with_row_count(Some(self.get_row_count()));
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }
}

fn array_to_column(array: &ArrayRef) -> Result<Column, DataError> {
    match array.data_type() {
        DataType::Null => Ok(vec![CellValue::Null; array.len()]),
        DataType::Boolean => {
            let values = array
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| DataError::Other("expected a boolean array".to_string()))?;
            Ok(values.iter().map(CellValue::from).collect())
        }
        data_type if data_type.is_numeric() => {
            let converted = cast(array, &DataType::Float64)?;
            let values = converted
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| DataError::Other("expected a float64 array".to_string()))?;
            Ok(values.iter().map(CellValue::from).collect())
        }
        _ => (0..array.len())
            .map(|index| -> Result<CellValue, DataError> {
                if array.is_null(index) {
                    Ok(CellValue::Null)
                } else {
                    Ok(CellValue::from(array_value_to_string(array, index)?))
                }
            })
            .collect(),
    }
}

fn column_to_array(cells: &[CellValue]) -> ArrayRef {
    let numeric = cells
        .iter()
        .all(|cell| matches!(cell, CellValue::Number(_) | CellValue::Null));
    if numeric {
        return Arc::new(
            cells
                .iter()
                .map(|cell| match cell {
                    CellValue::Number(n) => Some(*n),
                    _ => None,
                })
                .collect::<Float64Array>(),
        );
    }

    let boolean = cells
        .iter()
        .all(|cell| matches!(cell, CellValue::Boolean(_) | CellValue::Null));
    if boolean {
        return Arc::new(
            cells
                .iter()
                .map(|cell| match cell {
                    CellValue::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        );
    }

    Arc::new(
        cells
            .iter()
            .map(|cell| (!cell.is_null()).then(|| cell.to_string()))
            .collect::<StringArray>(),
    )
}
