use crate::schema::DeviceId;

use super::{ColumnValues, Value};

/// A batch of materialized rows for one device: a time column plus one value
/// column per requested output column, all of equal length.
#[derive(Debug, Clone)]
pub struct TsBlock {
    device: DeviceId,
    column_names: Vec<String>,
    times: Vec<i64>,
    columns: Vec<ColumnValues>,
}

impl TsBlock {
    pub(crate) fn new(
        device: DeviceId,
        column_names: Vec<String>,
        times: Vec<i64>,
        columns: Vec<ColumnValues>,
    ) -> Self {
        debug_assert!(columns.iter().all(|c| c.len() == times.len()));
        Self {
            device,
            column_names,
            times,
            columns,
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn row_count(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[i64] {
        &self.times
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column(&self, name: &str) -> Option<&ColumnValues> {
        let index = self.column_names.iter().position(|n| n == name)?;
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[ColumnValues] {
        &self.columns
    }

    /// Whether the named column holds at least one null. The time column
    /// never does.
    pub fn has_null_value(&self, name: &str) -> bool {
        self.column(name).map(|c| c.has_null()).unwrap_or(false)
    }

    /// The cell at (`row`, `name`), or `None` when null or absent.
    pub fn value(&self, row: usize, name: &str) -> Option<Value> {
        self.column(name)?.get(row)
    }
}
