use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::compression::Compression;
use crate::encoding::Encoding;
use crate::error::{Result, TsFileError};
use crate::io::{read_u8, read_var_str, read_var_u32, write_u8, write_var_str, write_var_u32};

use super::{ColumnCategory, TsDataType};

/// Describes a single measurement: name, physical type and the codecs its
/// pages are written with.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSchema {
    pub name: String,
    pub data_type: TsDataType,
    pub encoding: Encoding,
    pub compression: Compression,
    pub props: BTreeMap<String, String>,
}

impl MeasurementSchema {
    pub fn new(
        name: impl Into<String>,
        data_type: TsDataType,
        encoding: Encoding,
        compression: Compression,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            encoding,
            compression,
            props: BTreeMap::new(),
        }
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_var_str(writer, &self.name)?;
        write_u8(writer, self.data_type.to_u8())?;
        write_u8(writer, self.encoding.to_u8())?;
        write_u8(writer, self.compression.to_u8())?;
        write_var_u32(writer, self.props.len() as u32)?;
        for (key, value) in &self.props {
            write_var_str(writer, key)?;
            write_var_str(writer, value)?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let name = read_var_str(reader)?;
        let data_type = TsDataType::try_from(read_u8(reader)?)?;
        let encoding = Encoding::try_from(read_u8(reader)?)?;
        let compression = Compression::try_from(read_u8(reader)?)?;
        let prop_count = read_var_u32(reader)? as usize;
        let mut props = BTreeMap::new();
        for _ in 0..prop_count {
            let key = read_var_str(reader)?;
            let value = read_var_str(reader)?;
            props.insert(key, value);
        }
        Ok(Self {
            name,
            data_type,
            encoding,
            compression,
            props,
        })
    }
}

/// A measurement plus its role within the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub measurement: MeasurementSchema,
    pub category: ColumnCategory,
}

impl ColumnSchema {
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            measurement: MeasurementSchema::new(
                name,
                TsDataType::String,
                Encoding::Plain,
                Compression::Uncompressed,
            ),
            category: ColumnCategory::Tag,
        }
    }

    pub fn field(
        name: impl Into<String>,
        data_type: TsDataType,
        encoding: Encoding,
        compression: Compression,
    ) -> Self {
        Self {
            measurement: MeasurementSchema::new(name, data_type, encoding, compression),
            category: ColumnCategory::Field,
        }
    }

    pub fn name(&self) -> &str {
        &self.measurement.name
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_var_str(writer, &self.measurement.name)?;
        write_u8(writer, self.measurement.data_type.to_u8())?;
        write_u8(writer, self.measurement.encoding.to_u8())?;
        write_u8(writer, self.measurement.compression.to_u8())?;
        write_u8(writer, self.category.to_u8())?;
        write_var_u32(writer, self.measurement.props.len() as u32)?;
        for (key, value) in &self.measurement.props {
            write_var_str(writer, key)?;
            write_var_str(writer, value)?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let name = read_var_str(reader)?;
        let data_type = TsDataType::try_from(read_u8(reader)?)?;
        let encoding = Encoding::try_from(read_u8(reader)?)?;
        let compression = Compression::try_from(read_u8(reader)?)?;
        let category = ColumnCategory::try_from(read_u8(reader)?)?;
        let prop_count = read_var_u32(reader)? as usize;
        let mut props = BTreeMap::new();
        for _ in 0..prop_count {
            let key = read_var_str(reader)?;
            let value = read_var_str(reader)?;
            props.insert(key, value);
        }
        let mut measurement = MeasurementSchema::new(name, data_type, encoding, compression);
        measurement.props = props;
        Ok(Self {
            measurement,
            category,
        })
    }
}

/// An ordered set of columns identified by a table name. At most one column
/// may exist per name; the TAG columns, in schema order, define the device
/// identifier of each row.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnSchema>) -> Result<Self> {
        let table_name = table_name.into();
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !seen.insert(column.name().to_string()) {
                return Err(TsFileError::InvalidArg(format!(
                    "duplicate column \"{}\" in table \"{}\"",
                    column.name(),
                    table_name
                )));
            }
        }
        Ok(Self {
            table_name,
            columns,
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn tag_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns
            .iter()
            .filter(|c| c.category == ColumnCategory::Tag)
    }

    pub fn field_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns
            .iter()
            .filter(|c| c.category == ColumnCategory::Field)
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_var_str(writer, &self.table_name)?;
        write_var_u32(writer, self.columns.len() as u32)?;
        for column in &self.columns {
            column.serialize(writer)?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let table_name = read_var_str(reader)?;
        let column_count = read_var_u32(reader)? as usize;
        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            columns.push(ColumnSchema::deserialize(reader)?);
        }
        Ok(Self {
            table_name,
            columns,
        })
    }
}
