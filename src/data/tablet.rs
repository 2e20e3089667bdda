use crate::error::{Result, TsFileError};
use crate::schema::{ColumnCategory, ColumnSchema, DeviceId, TsDataType};

use super::Value;

/// The values of one column of a batch, typed by the column's physical type.
/// `None` marks a null row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Boolean(Vec<Option<bool>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float(Vec<Option<f32>>),
    Double(Vec<Option<f64>>),
    /// TEXT and BLOB columns.
    Binary(Vec<Option<Vec<u8>>>),
    String(Vec<Option<String>>),
}

impl ColumnValues {
    /// An empty container suitable for `data_type`.
    pub fn empty(data_type: TsDataType) -> Self {
        match data_type {
            TsDataType::Boolean => ColumnValues::Boolean(vec![]),
            TsDataType::Int32 | TsDataType::Date => ColumnValues::Int32(vec![]),
            TsDataType::Int64 | TsDataType::Timestamp | TsDataType::Vector => {
                ColumnValues::Int64(vec![])
            }
            TsDataType::Float => ColumnValues::Float(vec![]),
            TsDataType::Double => ColumnValues::Double(vec![]),
            TsDataType::Text | TsDataType::Blob => ColumnValues::Binary(vec![]),
            TsDataType::String => ColumnValues::String(vec![]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Boolean(v) => v.len(),
            ColumnValues::Int32(v) => v.len(),
            ColumnValues::Int64(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Double(v) => v.len(),
            ColumnValues::Binary(v) => v.len(),
            ColumnValues::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_null(&self) -> bool {
        match self {
            ColumnValues::Boolean(v) => v.iter().any(|x| x.is_none()),
            ColumnValues::Int32(v) => v.iter().any(|x| x.is_none()),
            ColumnValues::Int64(v) => v.iter().any(|x| x.is_none()),
            ColumnValues::Float(v) => v.iter().any(|x| x.is_none()),
            ColumnValues::Double(v) => v.iter().any(|x| x.is_none()),
            ColumnValues::Binary(v) => v.iter().any(|x| x.is_none()),
            ColumnValues::String(v) => v.iter().any(|x| x.is_none()),
        }
    }

    /// The value at `row` as a dynamically-typed [`Value`], or `None` if the
    /// row is null or out of range.
    pub fn get(&self, row: usize) -> Option<Value> {
        match self {
            ColumnValues::Boolean(v) => v.get(row)?.map(Value::Boolean),
            ColumnValues::Int32(v) => v.get(row)?.map(Value::Int32),
            ColumnValues::Int64(v) => v.get(row)?.map(Value::Int64),
            ColumnValues::Float(v) => v.get(row)?.map(Value::Float),
            ColumnValues::Double(v) => v.get(row)?.map(Value::Double),
            ColumnValues::Binary(v) => v.get(row)?.clone().map(Value::Text),
            ColumnValues::String(v) => v.get(row)?.clone().map(Value::String),
        }
    }

    /// Appends a dynamically-typed value, which must match the container.
    pub fn push(&mut self, value: Option<Value>) -> Result<()> {
        match (self, value) {
            (ColumnValues::Boolean(v), Some(Value::Boolean(x))) => v.push(Some(x)),
            (ColumnValues::Int32(v), Some(Value::Int32(x))) => v.push(Some(x)),
            (ColumnValues::Int32(v), Some(Value::Date(x))) => v.push(Some(x)),
            (ColumnValues::Int64(v), Some(Value::Int64(x))) => v.push(Some(x)),
            (ColumnValues::Int64(v), Some(Value::Timestamp(x))) => v.push(Some(x)),
            (ColumnValues::Float(v), Some(Value::Float(x))) => v.push(Some(x)),
            (ColumnValues::Double(v), Some(Value::Double(x))) => v.push(Some(x)),
            (ColumnValues::Binary(v), Some(Value::Text(x))) => v.push(Some(x)),
            (ColumnValues::Binary(v), Some(Value::Blob(x))) => v.push(Some(x)),
            (ColumnValues::String(v), Some(Value::String(x))) => v.push(Some(x)),
            (ColumnValues::Boolean(v), None) => v.push(None),
            (ColumnValues::Int32(v), None) => v.push(None),
            (ColumnValues::Int64(v), None) => v.push(None),
            (ColumnValues::Float(v), None) => v.push(None),
            (ColumnValues::Double(v), None) => v.push(None),
            (ColumnValues::Binary(v), None) => v.push(None),
            (ColumnValues::String(v), None) => v.push(None),
            (_, Some(value)) => {
                return Err(TsFileError::InvalidDataPoint(format!(
                    "value of type {:?} does not fit this column",
                    value.data_type()
                )))
            }
        }
        Ok(())
    }
}

/// A columnar batch: one time column plus parallel value columns.
///
/// For [`crate::write::TsFileWriter::write_tablet`] all columns are FIELD
/// columns of a single device. For
/// [`crate::write::TsFileWriter::write_table`] the batch spans a table and
/// includes its TAG columns, from which the per-row device id is derived.
#[derive(Debug, Clone)]
pub struct Tablet {
    /// The table name (table batches) or device name (tree-style batches).
    pub target: String,
    pub columns: Vec<ColumnSchema>,
    pub timestamps: Vec<i64>,
    pub values: Vec<ColumnValues>,
}

impl Tablet {
    pub fn new(target: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        let values = columns
            .iter()
            .map(|c| ColumnValues::empty(c.measurement.data_type))
            .collect();
        Self {
            target: target.into(),
            columns,
            timestamps: vec![],
            values,
        }
    }

    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Appends one row. `row` must hold one entry per column, in schema
    /// order.
    pub fn add_row(&mut self, timestamp: i64, row: Vec<Option<Value>>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(TsFileError::InvalidArg(format!(
                "row width {} does not match {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (values, value) in self.values.iter_mut().zip(row) {
            values.push(value)?;
        }
        self.timestamps.push(timestamp);
        Ok(())
    }

    /// The device identifier of `row`: the target table name followed by the
    /// TAG column values in schema order. Equality and hashing consider the
    /// whole tuple.
    pub fn device_id(&self, row: usize) -> Result<DeviceId> {
        let mut tags = vec![];
        for (column, values) in self.columns.iter().zip(&self.values) {
            if column.category != ColumnCategory::Tag {
                continue;
            }
            match values.get(row) {
                Some(Value::String(tag)) => tags.push(tag),
                Some(other) => {
                    return Err(TsFileError::InvalidDataPoint(format!(
                        "tag column \"{}\" holds a {:?} value",
                        column.name(),
                        other.data_type()
                    )))
                }
                None => {
                    return Err(TsFileError::InvalidDataPoint(format!(
                        "tag column \"{}\" is null at row {}",
                        column.name(),
                        row
                    )))
                }
            }
        }
        Ok(DeviceId::from_tags(&self.target, &tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::Compression;
    use crate::encoding::Encoding;

    fn table_tablet() -> Tablet {
        let columns = vec![
            ColumnSchema::tag("id1"),
            ColumnSchema::tag("id2"),
            ColumnSchema::field(
                "s1",
                TsDataType::Int32,
                Encoding::Plain,
                Compression::Uncompressed,
            ),
        ];
        Tablet::new("t1", columns)
    }

    #[test]
    fn device_id_uses_the_whole_tag_tuple() -> Result<()> {
        let mut tablet = table_tablet();
        tablet.add_row(
            1,
            vec![
                Some(Value::String("a".to_string())),
                Some(Value::String("x".to_string())),
                Some(Value::Int32(10)),
            ],
        )?;
        let id = tablet.device_id(0)?;
        assert_eq!(id.table_name(), "t1");
        assert_eq!(id.tag_values(), &["a".to_string(), "x".to_string()]);
        Ok(())
    }

    #[test]
    fn mismatched_row_width_rejected() {
        let mut tablet = table_tablet();
        let result = tablet.add_row(1, vec![Some(Value::Int32(10))]);
        assert!(matches!(result, Err(TsFileError::InvalidArg(_))));
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut tablet = table_tablet();
        let result = tablet.add_row(
            1,
            vec![
                Some(Value::String("a".to_string())),
                Some(Value::String("x".to_string())),
                Some(Value::Double(1.0)),
            ],
        );
        assert!(matches!(result, Err(TsFileError::InvalidDataPoint(_))));
    }
}
