use std::cmp::Ordering;
use std::io::{Read, Write};

use crate::error::{Result, TsFileError};
use crate::io::{
    read_i64_le, read_u8, read_var_str, read_var_u32, write_i64_le, write_u8, write_var_str,
    write_var_u32,
};
use crate::schema::DeviceId;

/// The role of one index node. The discriminant is the stable on-disk tag
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataIndexNodeType {
    InternalDevice = 0,
    LeafDevice = 1,
    InternalMeasurement = 2,
    LeafMeasurement = 3,
}

impl MetadataIndexNodeType {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn is_device(&self) -> bool {
        matches!(
            self,
            MetadataIndexNodeType::InternalDevice | MetadataIndexNodeType::LeafDevice
        )
    }
}

impl TryFrom<u8> for MetadataIndexNodeType {
    type Error = TsFileError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => MetadataIndexNodeType::InternalDevice,
            1 => MetadataIndexNodeType::LeafDevice,
            2 => MetadataIndexNodeType::InternalMeasurement,
            3 => MetadataIndexNodeType::LeafMeasurement,
            other => return Err(corrupted_err!("unknown index node type tag {}", other)),
        })
    }
}

/// The sort key of an index entry: a device id in device nodes, a
/// measurement name in measurement nodes. A node's children always hold keys
/// of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKey {
    Device(DeviceId),
    Measurement(String),
}

impl IndexKey {
    fn rank(&self) -> u8 {
        match self {
            IndexKey::Device(_) => 0,
            IndexKey::Measurement(_) => 1,
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::Device(a), IndexKey::Device(b)) => a.cmp(b),
            (IndexKey::Measurement(a), IndexKey::Measurement(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// One child pointer of an index node.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataIndexEntry {
    pub key: IndexKey,
    /// Absolute file offset of the child's byte region.
    pub offset: i64,
}

/// A node of the on-disk index tree over sorted device ids or measurement
/// names. `end_offset` is the exclusive upper bound of the last child's byte
/// region, which is how the reader sizes the region of the final child.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataIndexNode {
    pub children: Vec<MetadataIndexEntry>,
    pub end_offset: i64,
    pub node_type: MetadataIndexNodeType,
}

impl MetadataIndexNode {
    pub fn new(node_type: MetadataIndexNodeType) -> Self {
        Self {
            children: vec![],
            end_offset: 0,
            node_type,
        }
    }

    pub fn is_full(&self, max_degree: usize) -> bool {
        self.children.len() >= max_degree
    }

    /// The first child's key; index construction labels parents with it.
    pub fn first_key(&self) -> Result<IndexKey> {
        self.children
            .first()
            .map(|entry| entry.key.clone())
            .ok_or_else(|| TsFileError::InvalidState("index node has no children".to_string()))
    }

    /// Lower-bound search: the position of the largest key `<= target`.
    /// With `exact`, the key must compare equal.
    pub fn binary_search(&self, target: &IndexKey, exact: bool) -> Result<usize> {
        if self.children.is_empty() {
            return Err(TsFileError::NotExist("index node is empty".to_string()));
        }
        let mut low = 0usize;
        let mut high = self.children.len();
        // invariant: children[..low] <= target < children[high..]
        while low < high {
            let mid = (low + high) / 2;
            match self.children[mid].key.cmp(target) {
                Ordering::Greater => high = mid,
                _ => low = mid + 1,
            }
        }
        if low == 0 {
            return Err(TsFileError::NotExist(format!(
                "no key at or below {:?}",
                target
            )));
        }
        let index = low - 1;
        if exact && self.children[index].key != *target {
            return Err(TsFileError::NotExist(format!("key {:?} not found", target)));
        }
        Ok(index)
    }

    /// The byte region `[offset, end)` of the child at `index`.
    pub fn child_region(&self, index: usize) -> (i64, i64) {
        let start = self.children[index].offset;
        let end = self
            .children
            .get(index + 1)
            .map(|next| next.offset)
            .unwrap_or(self.end_offset);
        (start, end)
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_u8(writer, self.node_type.to_u8())?;
        write_var_u32(writer, self.children.len() as u32)?;
        for entry in &self.children {
            match (&entry.key, self.node_type.is_device()) {
                (IndexKey::Device(device), true) => device.serialize(writer)?,
                (IndexKey::Measurement(name), false) => write_var_str(writer, name)?,
                _ => {
                    return Err(TsFileError::InvalidState(format!(
                        "{:?} node holds a foreign key kind",
                        self.node_type
                    )))
                }
            }
            write_i64_le(writer, entry.offset)?;
        }
        write_i64_le(writer, self.end_offset)?;
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let node_type = MetadataIndexNodeType::try_from(read_u8(reader)?)?;
        let count = read_var_u32(reader)? as usize;
        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            let key = if node_type.is_device() {
                IndexKey::Device(DeviceId::deserialize(reader)?)
            } else {
                IndexKey::Measurement(read_var_str(reader)?)
            };
            let offset = read_i64_le(reader)?;
            children.push(MetadataIndexEntry { key, offset });
        }
        let end_offset = read_i64_le(reader)?;
        Ok(Self {
            children,
            end_offset,
            node_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn measurement_node(keys: &[&str]) -> MetadataIndexNode {
        let mut node = MetadataIndexNode::new(MetadataIndexNodeType::LeafMeasurement);
        for (i, key) in keys.iter().enumerate() {
            node.children.push(MetadataIndexEntry {
                key: IndexKey::Measurement(key.to_string()),
                offset: (i as i64) * 100,
            });
        }
        node.end_offset = keys.len() as i64 * 100;
        node
    }

    #[test]
    fn binary_search_finds_floor_keys() -> Result<()> {
        let node = measurement_node(&["b", "d", "f"]);
        let key = |s: &str| IndexKey::Measurement(s.to_string());

        assert_eq!(node.binary_search(&key("b"), false)?, 0);
        assert_eq!(node.binary_search(&key("c"), false)?, 0);
        assert_eq!(node.binary_search(&key("d"), false)?, 1);
        assert_eq!(node.binary_search(&key("z"), false)?, 2);
        assert!(matches!(
            node.binary_search(&key("a"), false),
            Err(TsFileError::NotExist(_))
        ));
        Ok(())
    }

    #[test]
    fn exact_search_requires_equality() {
        let node = measurement_node(&["b", "d", "f"]);
        let key = |s: &str| IndexKey::Measurement(s.to_string());
        assert!(node.binary_search(&key("d"), true).is_ok());
        assert!(matches!(
            node.binary_search(&key("e"), true),
            Err(TsFileError::NotExist(_))
        ));
    }

    #[test]
    fn child_region_uses_sibling_then_end_offset() {
        let node = measurement_node(&["b", "d", "f"]);
        assert_eq!(node.child_region(0), (0, 100));
        assert_eq!(node.child_region(2), (200, 300));
    }

    #[test]
    fn roundtrip_measurement_node() -> Result<()> {
        let node = measurement_node(&["s1", "s2"]);
        let mut buffer = vec![];
        node.serialize(&mut buffer)?;
        let decoded = MetadataIndexNode::deserialize(&mut Cursor::new(buffer))?;
        assert_eq!(decoded, node);
        Ok(())
    }

    #[test]
    fn roundtrip_device_node() -> Result<()> {
        let mut node = MetadataIndexNode::new(MetadataIndexNodeType::LeafDevice);
        for name in ["a", "b"] {
            node.children.push(MetadataIndexEntry {
                key: IndexKey::Device(DeviceId::from_tags("t", &[name.to_string()])),
                offset: 42,
            });
        }
        node.end_offset = 77;
        let mut buffer = vec![];
        node.serialize(&mut buffer)?;
        let decoded = MetadataIndexNode::deserialize(&mut Cursor::new(buffer))?;
        assert_eq!(decoded, node);
        Ok(())
    }
}
