use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::bloom_filter::{serialize_absent, BloomFilter};
use crate::error::Result;
use crate::io::{
    read_i64_le, read_var_str, read_var_u32, write_i64_le, write_var_str, write_var_u32,
};
use crate::schema::TableSchema;

use super::index::MetadataIndexNode;

/// The footer: per-table index roots and schemas, the offset of the metadata
/// section, the bloom filter and free-form properties.
#[derive(Debug, Clone, PartialEq)]
pub struct TsFileMeta {
    pub table_index_roots: BTreeMap<String, MetadataIndexNode>,
    pub table_schemas: BTreeMap<String, TableSchema>,
    /// Absolute offset of the first byte after the data section.
    pub meta_offset: i64,
    pub bloom_filter: Option<BloomFilter>,
    pub props: BTreeMap<String, String>,
}

impl TsFileMeta {
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_var_u32(writer, self.table_index_roots.len() as u32)?;
        for (table_name, root) in &self.table_index_roots {
            write_var_str(writer, table_name)?;
            root.serialize(writer)?;
        }
        write_var_u32(writer, self.table_schemas.len() as u32)?;
        for (table_name, schema) in &self.table_schemas {
            write_var_str(writer, table_name)?;
            schema.serialize(writer)?;
        }
        write_i64_le(writer, self.meta_offset)?;
        match &self.bloom_filter {
            Some(filter) => filter.serialize(writer)?,
            None => serialize_absent(writer)?,
        }
        write_var_u32(writer, self.props.len() as u32)?;
        for (key, value) in &self.props {
            write_var_str(writer, key)?;
            write_var_str(writer, value)?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let table_count = read_var_u32(reader)? as usize;
        let mut table_index_roots = BTreeMap::new();
        for _ in 0..table_count {
            let table_name = read_var_str(reader)?;
            let root = MetadataIndexNode::deserialize(reader)?;
            table_index_roots.insert(table_name, root);
        }
        let schema_count = read_var_u32(reader)? as usize;
        let mut table_schemas = BTreeMap::new();
        for _ in 0..schema_count {
            let table_name = read_var_str(reader)?;
            let schema = TableSchema::deserialize(reader)?;
            table_schemas.insert(table_name, schema);
        }
        let meta_offset = read_i64_le(reader)?;
        let bloom_filter = BloomFilter::deserialize(reader)?;
        let prop_count = read_var_u32(reader)? as usize;
        let mut props = BTreeMap::new();
        for _ in 0..prop_count {
            let key = read_var_str(reader)?;
            let value = read_var_str(reader)?;
            props.insert(key, value);
        }
        Ok(Self {
            table_index_roots,
            table_schemas,
            meta_offset,
            bloom_filter,
            props,
        })
    }
}
