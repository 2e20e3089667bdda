//! Close-time index construction: timeseries indices in device/measurement
//! order, the bottom-up metadata index tree, and the bloom filter.

use std::collections::BTreeMap;

use crate::bloom_filter::BloomFilter;
use crate::config::TsFileConfig;
use crate::error::Result;
use crate::io::PositionedWrite;
use crate::metadata::{
    ChunkGroupMetadata, IndexKey, MetadataIndexEntry, MetadataIndexNode, MetadataIndexNodeType,
    TimeseriesIndex,
};
use crate::schema::DeviceId;

/// Transforms the recorded chunk-group metadata into the ordered stream of
/// timeseries indices: devices in device-id order, measurements in name
/// order, chunk metas in file-offset order (the temporal order of appends).
pub(crate) struct TsmIterator {
    indices: BTreeMap<DeviceId, Vec<TimeseriesIndex>>,
}

impl TsmIterator {
    pub fn new(groups: &[ChunkGroupMetadata]) -> Result<Self> {
        let mut per_device: BTreeMap<DeviceId, BTreeMap<String, Vec<_>>> = BTreeMap::new();
        for group in groups {
            let measurements = per_device.entry(group.device.clone()).or_default();
            for chunk in &group.chunks {
                measurements
                    .entry(chunk.measurement.clone())
                    .or_default()
                    .push(chunk.clone());
            }
        }

        let mut indices = BTreeMap::new();
        for (device, measurements) in per_device {
            let mut series = Vec::with_capacity(measurements.len());
            for (measurement, mut chunks) in measurements {
                chunks.sort_by_key(|chunk| chunk.offset_of_chunk_header);
                let data_type = chunks[0].data_type;
                let mask = chunks[0].mask;
                series.push(TimeseriesIndex::from_chunks(
                    measurement,
                    data_type,
                    mask,
                    chunks,
                )?);
            }
            indices.insert(device, series);
        }
        Ok(Self { indices })
    }

    pub fn devices(&self) -> impl Iterator<Item = (&DeviceId, &Vec<TimeseriesIndex>)> {
        self.indices.iter()
    }
}

/// Serializes all timeseries indices and builds the per-table index trees.
/// Nodes are written depth-first, children before parents, so every entry's
/// offset is known when its parent is emitted. The returned roots are NOT
/// serialized in the node section; they live in the footer.
pub(crate) fn build_metadata_index<W: PositionedWrite>(
    writer: &mut W,
    iterator: &TsmIterator,
    config: &TsFileConfig,
) -> Result<BTreeMap<String, MetadataIndexNode>> {
    let max_degree = config.max_degree_of_index_node;

    // per-device measurement trees
    let mut device_roots: BTreeMap<DeviceId, MetadataIndexNode> = BTreeMap::new();
    for (device, series) in iterator.devices() {
        if series.is_empty() {
            continue;
        }
        let mut leaves = vec![];
        let mut current = MetadataIndexNode::new(MetadataIndexNodeType::LeafMeasurement);
        for index in series {
            if current.is_full(max_degree) {
                current.end_offset = writer.pos() as i64;
                leaves.push(std::mem::replace(
                    &mut current,
                    MetadataIndexNode::new(MetadataIndexNodeType::LeafMeasurement),
                ));
            }
            current.children.push(MetadataIndexEntry {
                key: IndexKey::Measurement(index.measurement.clone()),
                offset: writer.pos() as i64,
            });
            index.serialize(writer)?;
        }
        if !current.children.is_empty() {
            current.end_offset = writer.pos() as i64;
            leaves.push(current);
        }
        let root = generate_root(
            writer,
            leaves,
            MetadataIndexNodeType::InternalMeasurement,
            max_degree,
        )?;
        device_roots.insert(device.clone(), root);
    }

    // per-table device trees
    let mut grouped: BTreeMap<String, Vec<(DeviceId, MetadataIndexNode)>> = BTreeMap::new();
    for (device, root) in device_roots {
        grouped
            .entry(device.table_name().to_string())
            .or_default()
            .push((device, root));
    }

    let mut table_roots = BTreeMap::new();
    for (table_name, devices) in grouped {
        let mut leaves = vec![];
        let mut current = MetadataIndexNode::new(MetadataIndexNodeType::LeafDevice);
        for (device, measurement_root) in devices {
            if current.is_full(max_degree) {
                current.end_offset = writer.pos() as i64;
                leaves.push(std::mem::replace(
                    &mut current,
                    MetadataIndexNode::new(MetadataIndexNodeType::LeafDevice),
                ));
            }
            current.children.push(MetadataIndexEntry {
                key: IndexKey::Device(device),
                offset: writer.pos() as i64,
            });
            measurement_root.serialize(writer)?;
        }
        if !current.children.is_empty() {
            current.end_offset = writer.pos() as i64;
            leaves.push(current);
        }
        let root = generate_root(
            writer,
            leaves,
            MetadataIndexNodeType::InternalDevice,
            max_degree,
        )?;
        table_roots.insert(table_name, root);
    }
    Ok(table_roots)
}

/// Reduces one level of unserialized nodes at a time until a single root
/// remains. Every consumed node is serialized at the current position and
/// referenced by its first key.
fn generate_root<W: PositionedWrite>(
    writer: &mut W,
    mut nodes: Vec<MetadataIndexNode>,
    node_type: MetadataIndexNodeType,
    max_degree: usize,
) -> Result<MetadataIndexNode> {
    while nodes.len() > 1 {
        let mut parents = vec![];
        let mut current = MetadataIndexNode::new(node_type);
        for node in nodes {
            if current.is_full(max_degree) {
                current.end_offset = writer.pos() as i64;
                parents.push(std::mem::replace(
                    &mut current,
                    MetadataIndexNode::new(node_type),
                ));
            }
            current.children.push(MetadataIndexEntry {
                key: node.first_key()?,
                offset: writer.pos() as i64,
            });
            node.serialize(writer)?;
        }
        if !current.children.is_empty() {
            current.end_offset = writer.pos() as i64;
            parents.push(current);
        }
        nodes = parents;
    }
    nodes
        .pop()
        .ok_or_else(|| crate::error::TsFileError::InvalidState("empty index level".to_string()))
}

/// Builds the bloom filter over every (table, device, measurement) triple.
/// The anonymous time series of aligned groups are not queryable by name and
/// are left out.
pub(crate) fn build_bloom_filter(
    iterator: &TsmIterator,
    config: &TsFileConfig,
) -> Option<BloomFilter> {
    let entries: Vec<Vec<u8>> = iterator
        .devices()
        .flat_map(|(device, series)| {
            series
                .iter()
                .filter(|index| !index.measurement.is_empty())
                .map(|index| {
                    BloomFilter::entry(device.table_name(), device, &index.measurement)
                })
                .collect::<Vec<_>>()
        })
        .collect();
    if entries.is_empty() {
        return None;
    }
    let mut filter = BloomFilter::build(config.bloom_filter_error_rate, entries.len());
    for entry in &entries {
        filter.add(entry);
    }
    Some(filter)
}
